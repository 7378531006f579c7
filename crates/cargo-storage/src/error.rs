use thiserror::Error;

use cargo_api::ErrorCode;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bad descriptor: {0}")]
    BadDescriptor(i32),

    #[error("not a directory: {0:?}")]
    NotADirectory(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// The OS errno behind this error, when there is one.
    pub fn errno(&self) -> Option<i32> {
        match self {
            StorageError::BadDescriptor(_) => Some(libc::EBADF),
            StorageError::NotADirectory(_) => Some(libc::ENOTDIR),
            StorageError::Io(e) => e.raw_os_error(),
        }
    }
}

impl From<&StorageError> for ErrorCode {
    fn from(err: &StorageError) -> Self {
        match err.errno() {
            Some(errno) => ErrorCode::system(errno as u32),
            None => ErrorCode::OTHER,
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
