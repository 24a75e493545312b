use displaydoc::Display;
use thiserror::Error;

#[derive(Debug, Display, Error)]
pub enum Error {
    /// Invalid argument: {0}
    InvalidArgument(&'static str),
    /// Drive is locked
    PermissionDenied,
    /// File or directory already exists
    AlreadyExists,
    /// No such file or directory
    NotFound,
    /// Out of space: {0}
    OutOfSpace(&'static str),
    /// Out of memory
    OutOfMemory,
    /// IO error: {0}
    IO(#[from] std::io::Error),
    /// Index out of range
    OutOfRange,
    /// No free short name candidate left
    ShortNameExhausted,
    /// Drive layout is stale, recalculation required
    Stale,
}
