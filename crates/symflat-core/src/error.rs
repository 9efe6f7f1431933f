//! # Error Types
//!
//! General error handling for symbol module conversion.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use thiserror::Error;

/// Main error type for serialization and conversion operations
///
/// Each variant corresponds to a specific way a conversion, a buffer load, or
/// a text parse can fail.
///
/// ## Error Categories
///
/// 1. **Resource errors**: AllocationFailure
/// 2. **Lookup errors**: NotFound
/// 3. **Consumer errors**: LoadRejected, Malformed
/// 4. **Input errors**: ParseFailure, InvalidArgument
/// 5. **Internal errors**: SizeWriteMismatch
/// 6. **I/O errors**: Io (for file operations, etc.)
#[derive(Error, Debug)]
pub enum SymflatError
{
    /// The output buffer could not be allocated
    ///
    /// Raised before anything is written, so no partial buffer ever escapes.
    /// Fatal to the conversion that hit it, but `convert_all` keeps going.
    #[error("Failed to allocate {size} bytes for serialized module")]
    AllocationFailure
    {
        /// Number of bytes that were requested
        size: usize,
    },

    /// The requested module id is not present in the source database
    #[error("Module not found: {0}")]
    NotFound(String),

    /// The consumer declined a buffer produced by the serializer
    ///
    /// This points at a format or compatibility defect between the writer
    /// and the loader, so it is always surfaced to the caller.
    #[error("Consumer rejected serialized module: {0}")]
    LoadRejected(String),

    /// Text input is not a symbol file
    ///
    /// Individual malformed records do not produce this error; they mark the
    /// module as corrupt instead. See [`crate::parser`].
    #[error("Failed to parse symbol data at line {line}: {reason}")]
    ParseFailure
    {
        /// 1-based line number of the offending record
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// The size pass and the write pass disagree
    ///
    /// The buffer cannot be trusted by any consumer, so the conversion fails
    /// and the buffer is dropped.
    #[error("Size mismatch in {section}: computed {expected} bytes, wrote {written}")]
    SizeWriteMismatch
    {
        /// Section (or `"module"` for the whole buffer) that disagreed
        section: &'static str,
        /// Size recorded by the size pass
        expected: usize,
        /// Bytes actually produced by the write pass
        written: usize,
    },

    /// A serialized buffer failed validation while decoding
    #[error("Malformed buffer at offset {offset}: {reason}")]
    Malformed
    {
        /// Byte offset into the decoded input where decoding stopped
        offset: usize,
        /// Description of the problem
        reason: String,
    },

    /// Invalid argument passed to a conversion function
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error (for file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SymflatError
{
    /// Short, stable name of the failure kind, used in conversion reports and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str
    {
        match self {
            Self::AllocationFailure { .. } => "allocation_failure",
            Self::NotFound(_) => "not_found",
            Self::LoadRejected(_) => "load_rejected",
            Self::ParseFailure { .. } => "parse_failure",
            Self::SizeWriteMismatch { .. } => "size_write_mismatch",
            Self::Malformed { .. } => "malformed",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Io(_) => "io",
        }
    }

    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self
    {
        Self::Malformed {
            offset,
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for `Result<T, SymflatError>`
///
/// ```rust
/// use symflat_core::error::SymflatResult;
/// fn foo() -> SymflatResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type SymflatResult<T> = std::result::Result<T, SymflatError>;
