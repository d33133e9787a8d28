//! Error type for creating, configuring and deleting input sources.

/// Errors returned by registry and encoder operations.
///
/// Creation failures never leave partial state behind: the caller gets the
/// error and may retry with a different configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// No free slot is left to hold the new instance.
    AllocationFailed,

    /// The hardware line could not be claimed (initial read failed).
    LineClaimFailed,

    /// The handle is not registered.
    NotFound,

    /// The configuration is malformed.
    InvalidArgument,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::AllocationFailed => write!(f, "no free slot for a new instance"),
            Error::LineClaimFailed => write!(f, "input line could not be claimed"),
            Error::NotFound => write!(f, "handle is not registered"),
            Error::InvalidArgument => write!(f, "invalid configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
