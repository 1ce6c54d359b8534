use core::error;
use core::fmt;

/// Result alias used throughout the crate.
///
/// Component hooks return the same type, so a hook status propagates to the
/// caller unchanged.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// An error raised by a port operation or a component hook.
#[non_exhaustive]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    /// Create a new `Error` with the specified kind.
    #[inline]
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind }
    }

    /// The kind of the error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Test the error against a specific kind.
    #[inline]
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl From<ErrorKind> for Error {
    #[inline]
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

/// The failure classes a port operation can report.
///
/// Anything a component hook returns is passed through verbatim, so hooks
/// use the same set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A precondition of the operation does not hold.
    Invalid,
    /// The component does not implement the required hook.
    ///
    /// On the connect hook this doubles as the sentinel that hands the
    /// connection over to the core.
    NotImplemented,
    /// An internal invariant was violated and has been repaired.
    Fault,
    /// An allocation failed.
    NoMemory,
    /// A buffer is too small for the requested payload.
    NoSpace,
    /// The port is already connected.
    AlreadyConnected,
    /// The port is not connected.
    NotConnected,
}

impl error::Error for Error {}

impl fmt::Debug for Error {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl fmt::Display for Error {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::Invalid => write!(f, "Invalid argument or state"),
            ErrorKind::NotImplemented => write!(f, "Not implemented by the component"),
            ErrorKind::Fault => write!(f, "Invariant violation repaired"),
            ErrorKind::NoMemory => write!(f, "Out of memory"),
            ErrorKind::NoSpace => write!(f, "Buffer too small"),
            ErrorKind::AlreadyConnected => write!(f, "Port is already connected"),
            ErrorKind::NotConnected => write!(f, "Port is not connected"),
        }
    }
}
