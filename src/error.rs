//! Error types for rowpack
//!
//! All errors are `Copy` and carry only primitive context so they can be
//! used in `no_std` environments without allocation.

use core::fmt;

/// Result type alias for rowpack operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Error types returned by compression/decompression operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Output buffer is too small for the compressed/decompressed data
    BufferTooSmall {
        /// Number of bytes required
        required: usize,
    },

    /// Record dimensionality is outside the supported range
    ///
    /// Decoding rejects `ndims == 0`; the run-length mode additionally
    /// requires `ndims < 1024` so that a group's worth of trailing bytes
    /// fits in the 16-bit remainder field.
    InvalidDimensions {
        /// The offending dimensionality
        ndims: u16,
    },

    /// Input length does not fit in the 48-bit metadata length field
    InputTooLarge {
        /// The offending input length
        len: u64,
    },

    /// Compressed input ends before its metadata prefix is complete
    TruncatedInput,
}

impl CodecError {
    /// Convert error to a numeric error code for FFI boundaries
    ///
    /// Error codes are stable and documented.
    pub const fn to_error_code(self) -> i32 {
        match self {
            CodecError::BufferTooSmall { .. } => -1,
            CodecError::InvalidDimensions { .. } => -2,
            CodecError::InputTooLarge { .. } => -3,
            CodecError::TruncatedInput => -4,
        }
    }

    /// Create error from error code (for FFI boundaries)
    pub const fn from_error_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(CodecError::BufferTooSmall { required: 0 }),
            -2 => Some(CodecError::InvalidDimensions { ndims: 0 }),
            -3 => Some(CodecError::InputTooLarge { len: 0 }),
            -4 => Some(CodecError::TruncatedInput),
            _ => None,
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::BufferTooSmall { required } => {
                write!(f, "Buffer too small: {} bytes required", required)
            }
            CodecError::InvalidDimensions { ndims } => {
                write!(f, "Invalid record dimensionality: {}", ndims)
            }
            CodecError::InputTooLarge { len } => {
                write!(f, "Input length {} exceeds 48-bit limit", len)
            }
            CodecError::TruncatedInput => {
                write!(f, "Input truncated before end of metadata header")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CodecError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_roundtrip() {
        let errors = [
            CodecError::BufferTooSmall { required: 1024 },
            CodecError::InvalidDimensions { ndims: 0 },
            CodecError::InputTooLarge { len: 1 << 48 },
            CodecError::TruncatedInput,
        ];

        for error in &errors {
            let code = error.to_error_code();
            let reconstructed = CodecError::from_error_code(code);
            assert!(reconstructed.is_some());
            assert_eq!(reconstructed.unwrap().to_error_code(), code);
        }
    }

    #[test]
    fn test_invalid_error_code() {
        assert!(CodecError::from_error_code(0).is_none());
        assert!(CodecError::from_error_code(42).is_none());
        assert!(CodecError::from_error_code(-100).is_none());
    }

    #[test]
    #[cfg(feature = "std")]
    fn test_error_display() {
        let err = CodecError::BufferTooSmall { required: 2048 };
        assert!(format!("{}", err).contains("2048"));

        let err = CodecError::InvalidDimensions { ndims: 1024 };
        assert!(format!("{}", err).contains("1024"));
    }
}
