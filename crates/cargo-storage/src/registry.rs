//! Process-wide backend registry.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use cargo_api::DatasetKind;

use crate::backend::StorageBackend;
use crate::posix::PosixBackend;

fn registry() -> &'static HashMap<DatasetKind, Arc<dyn StorageBackend>> {
    static REGISTRY: OnceLock<HashMap<DatasetKind, Arc<dyn StorageBackend>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        // `posix`, `parallel` and `none` share one instance, like the host
        // filesystem they all resolve to. The ad-hoc and object-store kinds
        // get their own passthrough instances so a vendor-backed build can
        // swap them without touching the callers.
        let posix: Arc<dyn StorageBackend> = Arc::new(PosixBackend::new("posix"));

        let mut map: HashMap<DatasetKind, Arc<dyn StorageBackend>> = HashMap::new();
        map.insert(DatasetKind::Posix, posix.clone());
        map.insert(DatasetKind::Parallel, posix.clone());
        map.insert(DatasetKind::None, posix);
        map.insert(DatasetKind::AdhocA, Arc::new(PosixBackend::new("adhoc-A")));
        map.insert(DatasetKind::AdhocB, Arc::new(PosixBackend::new("adhoc-B")));
        map.insert(DatasetKind::AdhocC, Arc::new(PosixBackend::new("adhoc-C")));
        map.insert(
            DatasetKind::ObjectStore,
            Arc::new(PosixBackend::new("object-store")),
        );
        map
    })
}

/// Returns the process-wide shared backend for `kind`.
pub fn backend_for(kind: DatasetKind) -> Arc<dyn StorageBackend> {
    registry()
        .get(&kind)
        .expect("every dataset kind has a registered backend")
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shared_instance_per_kind() {
        let a = backend_for(DatasetKind::AdhocA);
        let b = backend_for(DatasetKind::AdhocA);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn posix_family_shares_the_host_instance() {
        let posix = backend_for(DatasetKind::Posix);
        let parallel = backend_for(DatasetKind::Parallel);
        let none = backend_for(DatasetKind::None);
        assert!(Arc::ptr_eq(&posix, &parallel));
        assert!(Arc::ptr_eq(&posix, &none));

        let adhoc = backend_for(DatasetKind::AdhocB);
        assert!(!Arc::ptr_eq(&posix, &adhoc));
        assert_eq!(adhoc.name(), "adhoc-B");
    }
}
