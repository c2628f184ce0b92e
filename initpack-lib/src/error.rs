use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CpioError {
    #[error("'{}' does not exist or is not a directory", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("path is not valid UTF-8: {}", .0.display())]
    InvalidName(PathBuf),

    #[error("'{}' is {size} bytes, larger than a cpio header can describe", path.display())]
    TooLarge { path: PathBuf, size: u64 },

    #[error("malformed archive: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, CpioError>;

/// Attaches a path to a bare `io::Error`.
pub(crate) trait IoContext<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| CpioError::Io {
            path: path.into(),
            source,
        })
    }
}
