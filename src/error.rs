//! Error type shared by every accessor and the kernel query primitive.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Which flavour of kernel-parameter lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Lookup by numeric MIB path
    Sysctl,
    /// Lookup by dotted name
    SysctlByName,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKind::Sysctl => write!(f, "sysctl"),
            QueryKind::SysctlByName => write!(f, "sysctlbyname"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PlatformError {
    /// The kernel rejected a parameter read. `code` is the errno captured
    /// right after the call returned.
    #[error("{call}() returned with error {code}")]
    Kernel { call: QueryKind, code: i32 },

    #[error("{call}() wrote {actual} bytes, expected {expected}")]
    ShortRead {
        call: QueryKind,
        expected: usize,
        actual: usize,
    },

    #[error("invalid kernel parameter name {0:?}")]
    InvalidName(String),

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unexpected format in {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },
}

impl PlatformError {
    /// OS error code carried by the error, if any.
    pub fn code(&self) -> Option<i32> {
        match self {
            PlatformError::Kernel { code, .. } => Some(*code),
            PlatformError::Io { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

impl From<PlatformError> for io::Error {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Kernel { code, .. } => io::Error::from_raw_os_error(code),
            PlatformError::Io { source, .. } => source,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
