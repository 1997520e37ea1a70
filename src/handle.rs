//! The raw-handle boundary.
//!
//! Hosts that cannot hold a Rust value refer to a [`DecodeContext`] through
//! an opaque 64-bit [`RawHandle`] plus a context-type tag. Only tag `0`
//! ([`ContextType::Native`]) exists; every other tag is rejected with
//! [`DecodingError::UnsupportedContext`] before any resource is touched.
//!
//! Ownership crosses the boundary explicitly: [`init_context`] leaks a
//! context into a handle and [`free_context`] reclaims and drops it. The
//! functions in between only borrow.

use crate::{
    adapter::ImageAdapter,
    config::DecodeOptions,
    context::{DecodeContext, RawHandle},
    engine::CodecEngine,
    error::DecodingError,
};

/// The kinds of context a handle can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextType {
    /// A [`DecodeContext`] over the codec engine.
    Native,
}

impl ContextType {
    /// Interpret a boundary tag.
    pub fn from_tag(tag: i32) -> Result<Self, DecodingError> {
        match tag {
            0 => Ok(ContextType::Native),
            other => Err(DecodingError::UnsupportedContext(other)),
        }
    }

    pub fn tag(self) -> i32 {
        match self {
            ContextType::Native => 0,
        }
    }
}

/// Build a context over `data` and leak it into a handle.
///
/// The returned handle is never null. Pass it to [`free_context`] exactly
/// once when done.
pub fn init_context<E: CodecEngine>(
    engine: E,
    data: &[u8],
    context_type: i32,
    options: DecodeOptions,
) -> Result<RawHandle, DecodingError> {
    ContextType::from_tag(context_type)?;
    let context = DecodeContext::open(engine, data, options)?;
    Ok(context.into_raw())
}

/// Decode `total` frames after skipping `offset`, through the context
/// behind `handle`.
///
/// Negative counts are treated as zero.
///
/// # Safety
///
/// `handle` must be null or a live handle returned by [`init_context`] with
/// the same engine type `E`, and must not be in use elsewhere.
pub unsafe fn decode_frames<E: CodecEngine, A: ImageAdapter>(
    handle: RawHandle,
    context_type: i32,
    data: &[u8],
    offset: i32,
    total: i32,
    adapter: &A,
) -> Result<Vec<A::Image>, DecodingError> {
    ContextType::from_tag(context_type)?;
    if handle.is_null() {
        return Err(DecodingError::NullHandle);
    }
    // SAFETY: the caller guarantees a live, unaliased handle of this type.
    let context = unsafe { DecodeContext::<E>::borrow_raw(handle) };
    let offset = usize::try_from(offset).unwrap_or(0);
    let total = usize::try_from(total).unwrap_or(0);
    context.decode_frames(data, offset, total, adapter)
}

/// The declared frame count of the context behind `handle`.
///
/// Counts beyond `i32::MAX` saturate.
///
/// # Safety
///
/// Same requirements as [`decode_frames`].
pub unsafe fn frames<E: CodecEngine>(
    handle: RawHandle,
    context_type: i32,
) -> Result<i32, DecodingError> {
    ContextType::from_tag(context_type)?;
    if handle.is_null() {
        return Err(DecodingError::NullHandle);
    }
    // SAFETY: upheld by the caller.
    let context = unsafe { DecodeContext::<E>::borrow_raw(handle) };
    let frames = context.frames()?;
    Ok(i32::try_from(frames).unwrap_or(i32::MAX))
}

/// Release the context behind `handle`.
///
/// A null handle or an unknown context type is a no-op.
///
/// # Safety
///
/// `handle` must be null or a live handle returned by [`init_context`] with
/// the same engine type `E`. It must not be used again afterwards.
pub unsafe fn free_context<E: CodecEngine>(handle: RawHandle, context_type: i32) {
    if ContextType::from_tag(context_type).is_err() || handle.is_null() {
        log::debug!(
            "Ignoring release of handle {:#x} with context type {}",
            handle.as_u64(),
            context_type
        );
        return;
    }
    // SAFETY: upheld by the caller.
    drop(unsafe { DecodeContext::<E>::from_raw(handle) });
}
