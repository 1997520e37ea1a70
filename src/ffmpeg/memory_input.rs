//! An FFmpeg demuxer reading from a borrowed byte slice.
//!
//! FFmpeg only knows how to open URLs, so the encoded bytes are exposed
//! through a custom `AVIOContext` whose read and seek callbacks operate on a
//! cursor over the slice. The slice is never copied.

use std::{
    ffi::c_void,
    io::{Cursor, Read, Seek, SeekFrom},
    marker::PhantomData,
    os::raw::c_int,
    ptr,
};

use ffmpeg_next::{Packet, format::context::Input, media::Type};
use ffmpeg_sys_next::{
    AVFMT_FLAG_CUSTOM_IO, AVIOContext, av_freep, av_malloc, avformat_alloc_context,
    avformat_find_stream_info, avformat_open_input, avio_alloc_context, avio_context_free,
};

use crate::engine::{Demuxer, MediaType, NativeError, NativeResult, StreamParameters};

use super::FfmpegEngine;

/// Size of the buffer FFmpeg reads through.
const IO_BUFFER_SIZE: usize = 4096;

// `whence` values passed to the seek callback.
const SEEK_SET: c_int = 0;
const SEEK_CUR: c_int = 1;
const SEEK_END: c_int = 2;
const AVSEEK_SIZE: c_int = 0x10000;
const AVSEEK_FORCE: c_int = 0x20000;

/// A demux handle over an in-memory clip.
pub struct MemoryInput<'a> {
    // Declared first so it is closed before the I/O context it reads from.
    input: Option<Input>,
    io: *mut AVIOContext,
    cursor: *mut Cursor<&'a [u8]>,
    _data: PhantomData<&'a [u8]>,
}

impl<'a> MemoryInput<'a> {
    /// Open a container over `data`.
    pub(crate) fn open(data: &'a [u8]) -> NativeResult<Self> {
        ffmpeg_next::init()?;

        let cursor = Box::into_raw(Box::new(Cursor::new(data)));

        // SAFETY: every pointer handed to FFmpeg below is freshly allocated
        // and owned by the returned value, which releases them in `Drop`.
        unsafe {
            let buffer = av_malloc(IO_BUFFER_SIZE) as *mut u8;
            if buffer.is_null() {
                drop(Box::from_raw(cursor));
                return Err(out_of_memory());
            }

            let io = avio_alloc_context(
                buffer,
                IO_BUFFER_SIZE as c_int,
                0,
                cursor as *mut c_void,
                Some(read_callback),
                None,
                Some(seek_callback),
            );
            if io.is_null() {
                let mut buffer = buffer as *mut c_void;
                av_freep(&mut buffer as *mut *mut c_void as *mut c_void);
                drop(Box::from_raw(cursor));
                return Err(out_of_memory());
            }

            // From here on `Drop` owns the I/O context and the cursor.
            let mut memory_input = MemoryInput {
                input: None,
                io,
                cursor,
                _data: PhantomData,
            };

            let mut format_context = avformat_alloc_context();
            if format_context.is_null() {
                return Err(out_of_memory());
            }
            (*format_context).pb = io;
            (*format_context).flags |= AVFMT_FLAG_CUSTOM_IO as c_int;

            // On failure FFmpeg frees the format context itself.
            let status = avformat_open_input(
                &mut format_context,
                ptr::null(),
                ptr::null(),
                ptr::null_mut(),
            );
            if status < 0 {
                return Err(ffmpeg_next::Error::from(status).into());
            }

            memory_input.input = Some(Input::wrap(format_context));
            Ok(memory_input)
        }
    }

    pub(crate) fn input(&self) -> NativeResult<&Input> {
        self.input.as_ref().ok_or_else(not_open)
    }

    fn input_mut(&mut self) -> NativeResult<&mut Input> {
        self.input.as_mut().ok_or_else(not_open)
    }
}

fn out_of_memory() -> NativeError {
    NativeError::failure(-ffmpeg_next::util::error::ENOMEM)
}

fn not_open() -> NativeError {
    NativeError::failure(i32::from(ffmpeg_next::Error::StreamNotFound))
}

impl Drop for MemoryInput<'_> {
    fn drop(&mut self) {
        // Closing the input leaves a custom I/O context alone.
        drop(self.input.take());

        // SAFETY: `io` and `cursor` were allocated in `open` and nothing else
        // references them once the input is closed.
        unsafe {
            if !self.io.is_null() {
                av_freep(&mut (*self.io).buffer as *mut *mut u8 as *mut c_void);
                avio_context_free(&mut self.io);
            }
            if !self.cursor.is_null() {
                drop(Box::from_raw(self.cursor));
                self.cursor = ptr::null_mut();
            }
        }
    }
}

impl Demuxer<FfmpegEngine> for MemoryInput<'_> {
    fn load_stream_info(&mut self) -> NativeResult<()> {
        let input = self.input_mut()?;
        // SAFETY: the format context is open and owned by `input`.
        let status = unsafe { avformat_find_stream_info(input.as_mut_ptr(), ptr::null_mut()) };
        if status < 0 {
            return Err(ffmpeg_next::Error::from(status).into());
        }
        Ok(())
    }

    fn streams(&self) -> Vec<StreamParameters<ffmpeg_next::codec::Id>> {
        let Ok(input) = self.input() else {
            return Vec::new();
        };

        input
            .streams()
            .map(|stream| {
                let parameters = stream.parameters();
                let codec = parameters.id();
                // SAFETY: the parameters belong to a stream of the open input.
                let (width, height) = unsafe {
                    let raw = parameters.as_ptr();
                    ((*raw).width, (*raw).height)
                };
                StreamParameters {
                    index: stream.index(),
                    media_type: media_type(parameters.medium()),
                    codec,
                    codec_name: codec.name().to_string(),
                    width: u32::try_from(width).unwrap_or(0),
                    height: u32::try_from(height).unwrap_or(0),
                    declared_frames: stream.frames(),
                }
            })
            .collect()
    }

    fn read_packet(&mut self, packet: &mut Packet) -> NativeResult<()> {
        let input = self.input_mut()?;
        packet.read(input)?;
        Ok(())
    }
}

fn media_type(medium: Type) -> MediaType {
    match medium {
        Type::Video => MediaType::Video,
        Type::Audio => MediaType::Audio,
        Type::Subtitle => MediaType::Subtitle,
        _ => MediaType::Other,
    }
}

unsafe extern "C" fn read_callback(opaque: *mut c_void, buffer: *mut u8, size: c_int) -> c_int {
    // SAFETY: `opaque` is the cursor installed in `MemoryInput::open` and
    // `buffer` holds `size` writable bytes.
    let (cursor, destination) = unsafe {
        (
            &mut *(opaque as *mut Cursor<&[u8]>),
            std::slice::from_raw_parts_mut(buffer, usize::try_from(size).unwrap_or(0)),
        )
    };

    match cursor.read(destination) {
        Ok(0) => i32::from(ffmpeg_next::Error::Eof),
        Ok(read) => read as c_int,
        Err(_) => i32::from(ffmpeg_next::Error::Eof),
    }
}

unsafe extern "C" fn seek_callback(opaque: *mut c_void, offset: i64, whence: c_int) -> i64 {
    // SAFETY: see `read_callback`.
    let cursor = unsafe { &mut *(opaque as *mut Cursor<&[u8]>) };
    let length = cursor.get_ref().len() as i64;

    let whence = whence & !AVSEEK_FORCE;
    if whence == AVSEEK_SIZE {
        return length;
    }

    match seek_target(offset, whence).and_then(|target| cursor.seek(target).ok()) {
        Some(position) => position as i64,
        None => -1,
    }
}

/// Translate an FFmpeg seek request; `None` for negative absolute offsets
/// and unknown `whence` values.
fn seek_target(offset: i64, whence: c_int) -> Option<SeekFrom> {
    match whence {
        SEEK_SET => u64::try_from(offset).ok().map(SeekFrom::Start),
        SEEK_CUR => Some(SeekFrom::Current(offset)),
        SEEK_END => Some(SeekFrom::End(offset)),
        _ => None,
    }
}
