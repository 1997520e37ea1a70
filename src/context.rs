//! The decode context and its frame decode loop.
//!
//! A [`DecodeContext`] is built once per encoded clip and owns everything
//! that survives between decode calls: the open decoder, the RGB24 scaler,
//! reusable packet and frame buffers, and the RGB scratch buffer. Each call
//! to [`DecodeContext::decode_frames`] re-probes the encoded bytes for a
//! call-scoped demux handle and pulls the requested frames through the
//! decoder.
//!
//! Dropping the context releases all of it. [`DecodeContext::into_raw`] and
//! [`DecodeContext::from_raw`] move ownership across an opaque 64-bit handle
//! for callers that cannot hold a Rust value.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    time::Duration,
};

use crate::{
    adapter::ImageAdapter,
    config::{DecodeOptions, RetrievalMode},
    engine::{
        CodecEngine, Decoder, Demuxer, FrameBuffer, NativeError, PacketBuffer, Scaler,
    },
    error::{DecodingError, Step},
    metadata::declared_frame_count,
    pixel::{PixelLayout, pack_rgb24},
    probe::open_probed,
};

/// Code reported when no stream matches the configured selection.
const STREAM_NOT_FOUND: i32 = -1;

/// An opaque handle to a leaked [`DecodeContext`].
///
/// The value is the context's address; `0` is the null handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawHandle(u64);

impl RawHandle {
    pub const NULL: RawHandle = RawHandle(0);

    /// Rebuild a handle from the integer form.
    pub const fn from_u64(value: u64) -> Self {
        RawHandle(value)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Long-lived decoding state for one encoded clip.
///
/// # Example
///
/// ```no_run
/// use framebridge::{DecodeContext, DecodeOptions, FfmpegEngine, PackedImageAdapter};
///
/// let bytes = std::fs::read("clip.mp4")?;
/// let mut context = DecodeContext::open(FfmpegEngine::new(), &bytes, DecodeOptions::new())?;
/// let frames = context.frames()?;
/// let images = context.decode_frames(&bytes, 0, frames as usize, &PackedImageAdapter)?;
/// assert_eq!(images.len() as u64, frames);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct DecodeContext<E: CodecEngine> {
    decoder: E::Decoder,
    scaler: E::Scaler,
    frame: E::Frame,
    packet: E::Packet,
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    stream_index: usize,
    frame_rate_hint: u64,
    options: DecodeOptions,
    engine: E,
}

impl<E: CodecEngine> Debug for DecodeContext<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DecodeContext")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stream_index", &self.stream_index)
            .field("frame_rate_hint", &self.frame_rate_hint)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<E: CodecEngine> DecodeContext<E> {
    /// Build a decode context for the clip in `data`.
    ///
    /// Probes the container, selects the video stream, opens a decoder for
    /// it, and builds a scaler to RGB24 at the stream's size. The demux
    /// handle used for probing is released before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`DecodingError::InitializationFailure`] naming the step that
    /// failed. Everything opened before the failure has been released.
    pub fn open(engine: E, data: &[u8], options: DecodeOptions) -> Result<Self, DecodingError> {
        log::debug!(
            "Opening decode context ({} bytes, {:?})",
            data.len(),
            options
        );

        let (decoder, stream_index, width, height, declared_frames) = {
            let demuxer = open_probed(&engine, data)
                .map_err(|(step, error)| DecodingError::initialization(step, error))?;
            let streams = demuxer.streams();
            let stream = options
                .stream_selection
                .select(&streams)
                .ok_or_else(|| {
                    DecodingError::initialization(
                        Step::StreamSelection,
                        NativeError::failure(STREAM_NOT_FOUND),
                    )
                })?;

            let codec = engine
                .find_decoder(stream)
                .map_err(|error| DecodingError::initialization(Step::DecoderLookup, error))?;
            let decoder = engine
                .open_decoder(codec, &demuxer, stream.index)
                .map_err(|error| DecodingError::initialization(Step::DecoderOpen, error))?;

            (
                decoder,
                stream.index,
                stream.width,
                stream.height,
                stream.declared_frames,
            )
        };

        let scaler = engine
            .scaler(decoder.pixel_format(), width, height, options.scaling)
            .map_err(|error| DecodingError::initialization(Step::ScalerInit, error))?;

        let packet = engine.new_packet();
        let frame = engine.new_frame();
        let pixels = vec![0u8; width as usize * height as usize * 3];
        let frame_rate_hint = declared_frame_count(declared_frames);

        log::info!(
            "Opened decode context: stream={}, {}x{}, declared frames={}",
            stream_index,
            width,
            height,
            frame_rate_hint,
        );

        Ok(Self {
            decoder,
            scaler,
            frame,
            packet,
            pixels,
            width,
            height,
            stream_index,
            frame_rate_hint,
            options,
            engine,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Container index of the stream being decoded.
    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// The stream's declared frame count, used as its frame rate.
    ///
    /// # Errors
    ///
    /// Returns [`DecodingError::UnknownFrameRate`] when the container did
    /// not declare a frame count.
    pub fn frames(&self) -> Result<u64, DecodingError> {
        if self.frame_rate_hint > 0 {
            Ok(self.frame_rate_hint)
        } else {
            Err(DecodingError::UnknownFrameRate)
        }
    }

    /// Display duration of one frame.
    pub fn frame_pace(&self) -> Result<Duration, DecodingError> {
        let frames = self.frames()?;
        Ok(Duration::from_nanos(1_000_000_000 / frames))
    }

    /// Decode `total` frames from `data` after skipping the first `offset`.
    ///
    /// Frames are returned in decode order. The decoder is flushed before
    /// decoding starts, so every call begins at the head of `data`.
    ///
    /// # Errors
    ///
    /// - [`DecodingError::DemuxFailure`] if probing fails, a packet cannot
    ///   be read, or the input ends before `offset + total` frames.
    /// - [`DecodingError::IncompatibleStream`] if the selected stream in
    ///   `data` has different dimensions than this context.
    /// - [`DecodingError::DecodeFailure`] if the decoder or scaler fails.
    /// - Any error from `adapter`.
    ///
    /// No frames are returned when an error occurs.
    pub fn decode_frames<A: ImageAdapter>(
        &mut self,
        data: &[u8],
        offset: usize,
        total: usize,
        adapter: &A,
    ) -> Result<Vec<A::Image>, DecodingError> {
        log::debug!(
            "Decoding {} frames after skipping {} (stream={})",
            total,
            offset,
            self.stream_index
        );

        let mut demuxer = open_probed(&self.engine, data)
            .map_err(|(step, error)| DecodingError::demux(step, error))?;
        self.check_stream(&demuxer)?;

        let mut images = Vec::with_capacity(total);
        if total == 0 {
            return Ok(images);
        }

        self.decoder.flush();
        let result = DecodeLoop::<E> {
            decoder: &mut self.decoder,
            scaler: &mut self.scaler,
            frame: &mut self.frame,
            packet: &mut self.packet,
            pixels: &mut self.pixels,
            width: self.width,
            height: self.height,
            stream_index: self.stream_index,
            mode: self.options.retrieval_mode,
            skip: offset,
            total,
        }
        .run(&mut demuxer, adapter, &mut images);

        self.packet.clear();
        self.frame.clear();
        result.map(|()| images)
    }

    fn check_stream(&self, demuxer: &E::Demuxer<'_>) -> Result<(), DecodingError> {
        let streams = demuxer.streams();
        let stream = streams
            .iter()
            .find(|stream| stream.index == self.stream_index)
            .ok_or_else(|| {
                DecodingError::demux(Step::StreamSelection, NativeError::failure(STREAM_NOT_FOUND))
            })?;

        if stream.width != self.width || stream.height != self.height {
            return Err(DecodingError::IncompatibleStream {
                expected_width: self.width,
                expected_height: self.height,
                width: stream.width,
                height: stream.height,
            });
        }
        Ok(())
    }

    /// Leak the context into an opaque handle.
    ///
    /// The context stays alive until [`DecodeContext::from_raw`] reclaims it.
    pub fn into_raw(self) -> RawHandle {
        let pointer = Box::into_raw(Box::new(self));
        RawHandle(pointer as usize as u64)
    }

    /// Reclaim ownership of a context leaked by [`DecodeContext::into_raw`].
    ///
    /// # Safety
    ///
    /// `handle` must come from `into_raw` on a `DecodeContext<E>` with the
    /// same `E`, must not be null, and must not have been reclaimed before.
    pub unsafe fn from_raw(handle: RawHandle) -> Self {
        // SAFETY: the caller guarantees the handle is a live, unique
        // `Box<DecodeContext<E>>` pointer.
        unsafe { *Box::from_raw(handle.0 as usize as *mut Self) }
    }

    /// Borrow the context behind a handle without taking ownership.
    ///
    /// # Safety
    ///
    /// Same requirements as [`DecodeContext::from_raw`], and no other
    /// reference to the context may exist for `'h`.
    pub unsafe fn borrow_raw<'h>(handle: RawHandle) -> &'h mut Self {
        // SAFETY: upheld by the caller.
        unsafe { &mut *(handle.0 as usize as *mut Self) }
    }
}

impl<E: CodecEngine> Drop for DecodeContext<E> {
    fn drop(&mut self) {
        log::debug!(
            "Releasing decode context (stream={}, {}x{})",
            self.stream_index,
            self.width,
            self.height
        );
    }
}

/// State borrowed from a [`DecodeContext`] for one decode call.
struct DecodeLoop<'c, E: CodecEngine> {
    decoder: &'c mut E::Decoder,
    scaler: &'c mut E::Scaler,
    frame: &'c mut E::Frame,
    packet: &'c mut E::Packet,
    pixels: &'c mut Vec<u8>,
    width: u32,
    height: u32,
    stream_index: usize,
    mode: RetrievalMode,
    skip: usize,
    total: usize,
}

impl<E: CodecEngine> DecodeLoop<'_, E> {
    fn run<A: ImageAdapter>(
        &mut self,
        demuxer: &mut E::Demuxer<'_>,
        adapter: &A,
        images: &mut Vec<A::Image>,
    ) -> Result<(), DecodingError> {
        let mut end_of_input: Option<NativeError> = None;

        while images.len() < self.total {
            if let Some(error) = end_of_input {
                // The decoder has been drained and the input is exhausted.
                return Err(DecodingError::demux(Step::PacketRead, error));
            }

            match demuxer.read_packet(self.packet) {
                Ok(()) => {
                    if self.packet.stream_index() != self.stream_index {
                        self.packet.clear();
                        continue;
                    }
                    let submitted = self.decoder.send_packet(self.packet);
                    if let Err(error) = submitted {
                        self.packet.clear();
                        return Err(DecodingError::decode(Step::PacketSubmit, error));
                    }
                }
                Err(error) if error.is_end_of_stream() && self.mode == RetrievalMode::Drain => {
                    self.decoder
                        .send_eof()
                        .map_err(|eof_error| DecodingError::decode(Step::PacketSubmit, eof_error))?;
                    end_of_input = Some(error);
                }
                Err(error) => return Err(DecodingError::demux(Step::PacketRead, error)),
            }

            let retrieved = self.retrieve(adapter, images);
            self.packet.clear();
            retrieved?;
        }

        Ok(())
    }

    /// Pull decoded frames for the packet just submitted.
    fn retrieve<A: ImageAdapter>(
        &mut self,
        adapter: &A,
        images: &mut Vec<A::Image>,
    ) -> Result<(), DecodingError> {
        loop {
            match self.decoder.receive_frame(self.frame) {
                Ok(()) => {}
                Err(error)
                    if self.mode == RetrievalMode::Drain
                        && (error.is_try_again() || error.is_end_of_stream()) =>
                {
                    return Ok(());
                }
                Err(error) => return Err(DecodingError::decode(Step::FrameRetrieve, error)),
            }

            let emitted = self.emit(adapter, images);
            self.frame.clear();
            emitted?;

            if self.mode == RetrievalMode::Single || images.len() == self.total {
                return Ok(());
            }
        }
    }

    /// Convert the frame held in the scratch buffer, or skip it.
    fn emit<A: ImageAdapter>(
        &mut self,
        adapter: &A,
        images: &mut Vec<A::Image>,
    ) -> Result<(), DecodingError> {
        if self.skip > 0 {
            self.skip -= 1;
            return Ok(());
        }

        self.scaler
            .scale(self.frame, self.pixels)
            .map_err(|error| DecodingError::decode(Step::Scaling, error))?;

        let mut packed = adapter.allocate(self.width as usize * self.height as usize);
        pack_rgb24(self.pixels, &mut packed);
        let image = adapter.create_image(packed, self.width, self.height, PixelLayout::RGB24_PACKED)?;
        images.push(image);
        Ok(())
    }
}
