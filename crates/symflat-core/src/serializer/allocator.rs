//! Output buffer allocation and serializer configuration.
//!
//! The serializer asks a [`BufferAllocator`] for exactly as many bytes as the
//! size pass computed. Allocation is fallible: a failure surfaces as
//! [`SymflatError::AllocationFailure`] before anything is written.

use std::env;

use tracing::error;

use crate::error::{SymflatError, SymflatResult};

/// Environment variable read by [`SerializerConfig::from_env`].
pub const MAX_BUFFER_SIZE_ENV: &str = "SYMFLAT_MAX_BUFFER_SIZE";

/// Source of output buffers.
///
/// Implementations must be shareable across threads because batch conversion
/// may serialize several modules at once.
pub trait BufferAllocator: Send + Sync
{
    /// Return an empty `Vec` able to hold `size` bytes without reallocating.
    ///
    /// ## Errors
    ///
    /// Returns [`SymflatError::AllocationFailure`] if the memory cannot be
    /// provided.
    fn allocate(&self, size: usize) -> SymflatResult<Vec<u8>>;
}

/// Allocates from the global heap, reporting failure instead of aborting.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocator;

impl BufferAllocator for HeapAllocator
{
    fn allocate(&self, size: usize) -> SymflatResult<Vec<u8>>
    {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(size).map_err(|err| {
            error!(size, %err, "memory allocation failed");
            SymflatError::AllocationFailure { size }
        })?;
        Ok(buffer)
    }
}

/// Heap allocator that refuses any buffer larger than `limit` bytes.
#[derive(Debug, Clone, Copy)]
pub struct LimitedAllocator
{
    limit: usize,
}

impl LimitedAllocator
{
    /// Cap buffers at `limit` bytes.
    #[must_use]
    pub const fn new(limit: usize) -> Self
    {
        Self { limit }
    }

    /// The configured cap.
    pub fn limit(&self) -> usize
    {
        self.limit
    }
}

impl BufferAllocator for LimitedAllocator
{
    fn allocate(&self, size: usize) -> SymflatResult<Vec<u8>>
    {
        if size > self.limit {
            error!(size, limit = self.limit, "buffer exceeds configured maximum");
            return Err(SymflatError::AllocationFailure { size });
        }
        HeapAllocator.allocate(size)
    }
}

/// Serializer settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializerConfig
{
    /// Largest buffer the serializer may allocate. `None` means unbounded.
    pub max_buffer_size: Option<usize>,
}

impl SerializerConfig
{
    /// Cap buffer sizes at `limit` bytes.
    #[must_use]
    pub fn with_max_buffer_size(mut self, limit: usize) -> Self
    {
        self.max_buffer_size = Some(limit);
        self
    }

    /// Read settings from the environment.
    ///
    /// `SYMFLAT_MAX_BUFFER_SIZE` sets [`Self::max_buffer_size`]; unset means
    /// unbounded.
    ///
    /// ## Errors
    ///
    /// Returns [`SymflatError::InvalidArgument`] if the variable is set but is
    /// not a byte count.
    pub fn from_env() -> SymflatResult<Self>
    {
        match env::var(MAX_BUFFER_SIZE_ENV) {
            Ok(raw) => {
                let limit = raw.trim().parse::<usize>().map_err(|err| {
                    SymflatError::InvalidArgument(format!("{MAX_BUFFER_SIZE_ENV}={raw:?} is not a byte count: {err}"))
                })?;
                Ok(Self::default().with_max_buffer_size(limit))
            }
            Err(_) => Ok(Self::default()),
        }
    }

    /// Allocator implementing these settings.
    pub(crate) fn allocator(&self) -> Box<dyn BufferAllocator>
    {
        match self.max_buffer_size {
            Some(limit) => Box::new(LimitedAllocator::new(limit)),
            None => Box::new(HeapAllocator),
        }
    }
}
