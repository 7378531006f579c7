//! Datasets: a path paired with the storage backend that holds it.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// The storage backend a dataset lives on.
///
/// `Parallel` is the only kind that supports collective transfers; the adhoc
/// kinds name site-local burst-buffer filesystems and `None` leaves the
/// choice to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetKind {
    Posix,
    Parallel,
    None,
    AdhocA,
    AdhocB,
    AdhocC,
    ObjectStore,
}

impl DatasetKind {
    /// Client-visible tag for this kind.
    pub fn tag(&self) -> &'static str {
        match self {
            DatasetKind::Posix => "posix",
            DatasetKind::Parallel => "parallel",
            DatasetKind::None => "none",
            DatasetKind::AdhocA => "adhoc-A",
            DatasetKind::AdhocB => "adhoc-B",
            DatasetKind::AdhocC => "adhoc-C",
            DatasetKind::ObjectStore => "object-store",
        }
    }

    /// Stable numeric representation used on the cohort control plane.
    pub fn as_u32(&self) -> u32 {
        match self {
            DatasetKind::Posix => 0,
            DatasetKind::Parallel => 1,
            DatasetKind::None => 2,
            DatasetKind::AdhocA => 3,
            DatasetKind::AdhocB => 4,
            DatasetKind::AdhocC => 5,
            DatasetKind::ObjectStore => 6,
        }
    }

    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(DatasetKind::Posix),
            1 => Some(DatasetKind::Parallel),
            2 => Some(DatasetKind::None),
            3 => Some(DatasetKind::AdhocA),
            4 => Some(DatasetKind::AdhocB),
            5 => Some(DatasetKind::AdhocC),
            6 => Some(DatasetKind::ObjectStore),
            _ => None,
        }
    }
}

/// Failed to parse a dataset kind tag.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown dataset kind: {0:?}")]
pub struct ParseKindError(pub String);

impl FromStr for DatasetKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "posix" => Ok(DatasetKind::Posix),
            "parallel" => Ok(DatasetKind::Parallel),
            "none" => Ok(DatasetKind::None),
            "adhoc-A" => Ok(DatasetKind::AdhocA),
            "adhoc-B" => Ok(DatasetKind::AdhocB),
            "adhoc-C" => Ok(DatasetKind::AdhocC),
            "object-store" => Ok(DatasetKind::ObjectStore),
            other => Err(ParseKindError(other.to_string())),
        }
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A named collection of data on a specific backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    path: String,
    kind: DatasetKind,
}

impl Dataset {
    pub fn new(path: impl Into<String>, kind: DatasetKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// A POSIX dataset; the common default for client tools.
    pub fn posix(path: impl Into<String>) -> Self {
        Self::new(path, DatasetKind::Posix)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> DatasetKind {
        self.kind
    }

    /// Rewrites the dataset path, keeping the backend kind.
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: self.kind,
        }
    }

    /// True iff this dataset can take part in a collective transfer.
    pub fn supports_parallel_transfer(&self) -> bool {
        self.kind == DatasetKind::Parallel
    }
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{path: {:?}, type: {}}}", self.path, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_parallel_supports_parallel_transfer() {
        assert!(Dataset::new("/a", DatasetKind::Parallel).supports_parallel_transfer());
        for kind in [
            DatasetKind::Posix,
            DatasetKind::None,
            DatasetKind::AdhocA,
            DatasetKind::AdhocB,
            DatasetKind::AdhocC,
            DatasetKind::ObjectStore,
        ] {
            assert!(!Dataset::new("/a", kind).supports_parallel_transfer());
        }
    }

    #[test]
    fn kind_tags_parse_back() {
        for kind in [
            DatasetKind::Posix,
            DatasetKind::Parallel,
            DatasetKind::None,
            DatasetKind::AdhocA,
            DatasetKind::AdhocB,
            DatasetKind::AdhocC,
            DatasetKind::ObjectStore,
        ] {
            assert_eq!(kind.tag().parse::<DatasetKind>().unwrap(), kind);
            assert_eq!(DatasetKind::from_u32(kind.as_u32()), Some(kind));
        }
        assert!("lustre".parse::<DatasetKind>().is_err());
        assert_eq!(DatasetKind::from_u32(42), None);
    }

    #[test]
    fn with_path_keeps_kind() {
        let src = Dataset::new("/src/dir", DatasetKind::AdhocA);
        let rewritten = src.with_path("/src/dir/file");
        assert_eq!(rewritten.path(), "/src/dir/file");
        assert_eq!(rewritten.kind(), DatasetKind::AdhocA);
    }
}
