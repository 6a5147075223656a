use std::{error, fmt, io};

/// Error type shared by all protocol layers.
#[derive(Debug)]
pub enum Error {
    /// An opcode other than the one valid at this point of the protocol.
    UnexpectedOpcode(u8),
    /// A residual tag byte that names no known exchange.
    BadTag(u8),
    /// A request carrying dimension zero.
    ZeroDim,
    /// A dimension that disagrees with the negotiated one.
    DimMismatch { expected: u32, found: u32 },
    /// A residual whose session id differs from the one already seen.
    SidMismatch { expected: u64, found: u64 },
    /// A residual carrying the wrong exchange tag.
    TagMismatch { expected: u8, found: u8 },
    /// An output share was requested before both exchanges completed.
    SessionIncomplete,
    /// Inverse of an even ring element.
    NotInvertible(u32),
    /// Store access beyond the configured number of rows.
    IndexOutOfRange { index: usize, rows: usize },
    /// Vector operands of different lengths.
    LengthMismatch { expected: usize, found: usize },
    /// A triple source ran out of correlated randomness.
    TriplesExhausted,
    /// A write request was not answered with `OK`.
    WriteNotAcknowledged,
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UnexpectedOpcode(op) => write!(f, "unexpected opcode {op:#04x}"),
            Self::BadTag(tag) => write!(f, "unknown residual tag {tag:#04x}"),
            Self::ZeroDim => write!(f, "dimension must be nonzero"),
            Self::DimMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {expected}, found {found}")
            }
            Self::SidMismatch { expected, found } => {
                write!(f, "session id mismatch: expected {expected:#x}, found {found:#x}")
            }
            Self::TagMismatch { expected, found } => {
                write!(f, "residual tag mismatch: expected {expected:#04x}, found {found:#04x}")
            }
            Self::SessionIncomplete => write!(f, "read session is missing a residual exchange"),
            Self::NotInvertible(v) => write!(f, "no inverse modulo 2^31 for even element {v}"),
            Self::IndexOutOfRange { index, rows } => {
                write!(f, "row index {index} out of range for {rows} rows")
            }
            Self::LengthMismatch { expected, found } => {
                write!(f, "vector length mismatch: expected {expected}, found {found}")
            }
            Self::TriplesExhausted => write!(f, "triple source exhausted"),
            Self::WriteNotAcknowledged => write!(f, "party did not acknowledge write"),
            Self::Io(ref err) => err.fmt(f),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}
