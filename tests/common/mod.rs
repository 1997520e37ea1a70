//! A resource-tracking codec engine for integration tests.
//!
//! Clips are byte buffers in a tiny private container format:
//!
//! ```text
//! "MOCK" | stream count: u8 | streams | packets
//! stream: media type u8 (0 video, 1 audio, 2 subtitle) | width u16 | height u16 | declared frames i64
//! packet: stream index u8 | payload (width * height * 3 RGB bytes for video, 1 byte otherwise)
//! ```
//!
//! [`MockEngine`] counts live demuxers, decoders, scalers, packets and
//! frames, counts calls per step, and can fail any step on a chosen call.

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use framebridge::{
    CodecEngine, MediaType, NativeError, ScalingAlgorithm, StreamParameters,
    engine::{Decoder, Demuxer, FrameBuffer, NativeResult, PacketBuffer, Scaler},
};

pub const MOCK_EOF: i32 = -541_478_725;
pub const MOCK_EAGAIN: i32 = -11;
pub const MOCK_INVALID_DATA: i32 = -1_094_995_529;
pub const MOCK_DECODER_NOT_FOUND: i32 = -1_128_613_112;

const MAGIC: &[u8; 4] = b"MOCK";
const VIDEO_CODEC: u8 = 1;
const AUDIO_CODEC: u8 = 2;
const MOCK_PIXEL_FORMAT: u32 = 0x5955_5600;

/// Engine operations that can be counted and failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockStep {
    OpenInput,
    StreamInfo,
    FindDecoder,
    OpenDecoder,
    Scaler,
    ReadPacket,
    SendPacket,
    SendEof,
    ReceiveFrame,
    Flush,
    Scale,
}

/// Counts of engine resources currently alive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveResources {
    pub demuxers: usize,
    pub decoders: usize,
    pub scalers: usize,
    pub packets: usize,
    pub frames: usize,
}

impl LiveResources {
    pub fn is_empty(&self) -> bool {
        *self == LiveResources::default()
    }
}

#[derive(Debug, Clone, Copy)]
struct InjectedFailure {
    step: MockStep,
    code: i32,
    on_call: usize,
}

#[derive(Debug, Default)]
struct MockState {
    live: Mutex<LiveResources>,
    calls: Mutex<HashMap<MockStep, usize>>,
    failures: Mutex<Vec<InjectedFailure>>,
    decoder_delay: Mutex<usize>,
}

impl MockState {
    /// Record a call to `step`, failing it if an injected failure matches.
    fn call(&self, step: MockStep) -> NativeResult<()> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(step).or_insert(0);
            let index = *count;
            *count += 1;
            index
        };
        let failures = self.failures.lock().unwrap();
        match failures
            .iter()
            .find(|failure| failure.step == step && failure.on_call == index)
        {
            Some(failure) => Err(NativeError::failure(failure.code)),
            None => Ok(()),
        }
    }

    fn track(&self, update: impl FnOnce(&mut LiveResources)) {
        update(&mut self.live.lock().unwrap());
    }
}

/// The test double engine. Clones share their counters.
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    state: Arc<MockState>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail call number `on_call` (zero-based) of `step` with `code`.
    pub fn fail(self, step: MockStep, code: i32, on_call: usize) -> Self {
        self.state.failures.lock().unwrap().push(InjectedFailure {
            step,
            code,
            on_call,
        });
        self
    }

    /// Hold back `delay` frames inside the decoder until end of stream.
    pub fn with_decoder_delay(self, delay: usize) -> Self {
        *self.state.decoder_delay.lock().unwrap() = delay;
        self
    }

    pub fn live(&self) -> LiveResources {
        *self.state.live.lock().unwrap()
    }

    pub fn calls(&self, step: MockStep) -> usize {
        self.state
            .calls
            .lock()
            .unwrap()
            .get(&step)
            .copied()
            .unwrap_or(0)
    }

    pub fn reset_calls(&self) {
        self.state.calls.lock().unwrap().clear();
    }
}

// ── clip construction ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct StreamHeader {
    media_type: MediaType,
    width: u16,
    height: u16,
    declared_frames: i64,
}

/// Builds mock clip bytes.
#[derive(Debug, Default)]
pub struct ClipBuilder {
    streams: Vec<StreamHeader>,
    packets: Vec<(u8, Vec<u8>)>,
}

impl ClipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn video(mut self, width: u16, height: u16, declared_frames: i64) -> Self {
        self.streams.push(StreamHeader {
            media_type: MediaType::Video,
            width,
            height,
            declared_frames,
        });
        self
    }

    pub fn audio(mut self) -> Self {
        self.streams.push(StreamHeader {
            media_type: MediaType::Audio,
            width: 0,
            height: 0,
            declared_frames: 0,
        });
        self
    }

    /// Append a packet for `stream`; video payloads are `frame_rgb(index)`.
    pub fn packet(mut self, stream: u8, frame_index: usize) -> Self {
        let header = self.streams[stream as usize];
        let payload = if header.media_type == MediaType::Video {
            frame_rgb(frame_index, header.width as usize * header.height as usize)
        } else {
            vec![frame_index as u8]
        };
        self.packets.push((stream, payload));
        self
    }

    /// Append `count` video packets for `stream`, numbered from zero.
    pub fn frames(mut self, stream: u8, count: usize) -> Self {
        for index in 0..count {
            self = self.packet(stream, index);
        }
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.push(self.streams.len() as u8);
        for stream in &self.streams {
            bytes.push(match stream.media_type {
                MediaType::Video => 0,
                MediaType::Audio => 1,
                MediaType::Subtitle => 2,
                MediaType::Other => 3,
            });
            bytes.extend_from_slice(&stream.width.to_le_bytes());
            bytes.extend_from_slice(&stream.height.to_le_bytes());
            bytes.extend_from_slice(&stream.declared_frames.to_le_bytes());
        }
        for (stream, payload) in self.packets {
            bytes.push(stream);
            bytes.extend_from_slice(&payload);
        }
        bytes
    }
}

/// A single video stream of `count` frames, declaring `count` frames.
pub fn simple_clip(width: u16, height: u16, count: usize) -> Vec<u8> {
    ClipBuilder::new()
        .video(width, height, count as i64)
        .frames(0, count)
        .build()
}

/// RGB bytes of frame `index`: pixel `k` is `(index, k, 0x80)`.
pub fn frame_rgb(index: usize, pixels: usize) -> Vec<u8> {
    (0..pixels)
        .flat_map(|k| [index as u8, k as u8, 0x80])
        .collect()
}

/// The packed pixels [`frame_rgb`] converts to.
pub fn expected_packed(index: usize, pixels: usize) -> Vec<u32> {
    (0..pixels)
        .map(|k| ((index as u32 & 0xff) << 16) | ((k as u32 & 0xff) << 8) | 0x80)
        .collect()
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes(bytes.get(at..at + 2)?.try_into().ok()?))
}

fn read_i64(bytes: &[u8], at: usize) -> Option<i64> {
    Some(i64::from_le_bytes(bytes.get(at..at + 8)?.try_into().ok()?))
}

/// Parse the header; returns the streams and the offset of the first packet.
fn parse_header(bytes: &[u8]) -> Option<(Vec<StreamParameters<u8>>, usize)> {
    if bytes.get(..4)? != MAGIC {
        return None;
    }
    let count = *bytes.get(4)? as usize;
    let mut at = 5;
    let mut streams = Vec::with_capacity(count);
    for index in 0..count {
        let media_type = match *bytes.get(at)? {
            0 => MediaType::Video,
            1 => MediaType::Audio,
            2 => MediaType::Subtitle,
            _ => MediaType::Other,
        };
        let width = read_u16(bytes, at + 1)?;
        let height = read_u16(bytes, at + 3)?;
        let declared_frames = read_i64(bytes, at + 5)?;
        at += 13;

        let codec = if media_type == MediaType::Video {
            VIDEO_CODEC
        } else {
            AUDIO_CODEC
        };
        streams.push(StreamParameters {
            index,
            media_type,
            codec,
            codec_name: if codec == VIDEO_CODEC { "mockvideo" } else { "mockaudio" }.to_string(),
            width: u32::from(width),
            height: u32::from(height),
            declared_frames,
        });
    }
    Some((streams, at))
}

// ── engine resources ──────────────────────────────────────────────

pub struct MockDemuxer<'a> {
    data: &'a [u8],
    streams: Vec<StreamParameters<u8>>,
    position: usize,
    state: Arc<MockState>,
}

impl Drop for MockDemuxer<'_> {
    fn drop(&mut self) {
        self.state.track(|live| live.demuxers -= 1);
    }
}

impl Demuxer<MockEngine> for MockDemuxer<'_> {
    fn load_stream_info(&mut self) -> NativeResult<()> {
        self.state.call(MockStep::StreamInfo)
    }

    fn streams(&self) -> Vec<StreamParameters<u8>> {
        self.streams.clone()
    }

    fn read_packet(&mut self, packet: &mut MockPacket) -> NativeResult<()> {
        self.state.call(MockStep::ReadPacket)?;
        let Some(&stream) = self.data.get(self.position) else {
            return Err(NativeError::end_of_stream(MOCK_EOF));
        };
        let header = self
            .streams
            .get(stream as usize)
            .ok_or(NativeError::failure(MOCK_INVALID_DATA))?;
        let size = if header.media_type == MediaType::Video {
            header.width as usize * header.height as usize * 3
        } else {
            1
        };
        let start = self.position + 1;
        let payload = self
            .data
            .get(start..start + size)
            .ok_or(NativeError::failure(MOCK_INVALID_DATA))?;

        packet.stream = stream as usize;
        packet.payload.clear();
        packet.payload.extend_from_slice(payload);
        self.position = start + size;
        Ok(())
    }
}

pub struct MockPacket {
    stream: usize,
    payload: Vec<u8>,
    state: Arc<MockState>,
}

impl Drop for MockPacket {
    fn drop(&mut self) {
        self.state.track(|live| live.packets -= 1);
    }
}

impl PacketBuffer for MockPacket {
    fn stream_index(&self) -> usize {
        self.stream
    }

    fn clear(&mut self) {
        self.payload.clear();
    }
}

pub struct MockFrame {
    rgb: Vec<u8>,
    state: Arc<MockState>,
}

impl Drop for MockFrame {
    fn drop(&mut self) {
        self.state.track(|live| live.frames -= 1);
    }
}

impl FrameBuffer for MockFrame {
    fn clear(&mut self) {
        self.rgb.clear();
    }
}

pub struct MockDecoder {
    queue: VecDeque<Vec<u8>>,
    delay: usize,
    draining: bool,
    state: Arc<MockState>,
}

impl Drop for MockDecoder {
    fn drop(&mut self) {
        self.state.track(|live| live.decoders -= 1);
    }
}

impl Decoder<MockEngine> for MockDecoder {
    fn pixel_format(&self) -> u32 {
        MOCK_PIXEL_FORMAT
    }

    fn send_packet(&mut self, packet: &MockPacket) -> NativeResult<()> {
        self.state.call(MockStep::SendPacket)?;
        self.queue.push_back(packet.payload.clone());
        Ok(())
    }

    fn send_eof(&mut self) -> NativeResult<()> {
        self.state.call(MockStep::SendEof)?;
        self.draining = true;
        Ok(())
    }

    fn receive_frame(&mut self, frame: &mut MockFrame) -> NativeResult<()> {
        self.state.call(MockStep::ReceiveFrame)?;
        if self.queue.len() > self.delay || (self.draining && !self.queue.is_empty()) {
            if let Some(rgb) = self.queue.pop_front() {
                frame.rgb = rgb;
                return Ok(());
            }
        }
        if self.draining {
            Err(NativeError::end_of_stream(MOCK_EOF))
        } else {
            Err(NativeError::try_again(MOCK_EAGAIN))
        }
    }

    fn flush(&mut self) {
        let _ = self.state.call(MockStep::Flush);
        self.queue.clear();
        self.draining = false;
    }
}

pub struct MockScaler {
    width: u32,
    height: u32,
    state: Arc<MockState>,
}

impl Drop for MockScaler {
    fn drop(&mut self) {
        self.state.track(|live| live.scalers -= 1);
    }
}

impl Scaler<MockEngine> for MockScaler {
    fn scale(&mut self, frame: &MockFrame, destination: &mut [u8]) -> NativeResult<()> {
        self.state.call(MockStep::Scale)?;
        let expected = self.width as usize * self.height as usize * 3;
        if frame.rgb.len() != expected || destination.len() != expected {
            return Err(NativeError::failure(MOCK_INVALID_DATA));
        }
        destination.copy_from_slice(&frame.rgb);
        Ok(())
    }
}

impl CodecEngine for MockEngine {
    type Demuxer<'a> = MockDemuxer<'a>;
    type CodecId = u8;
    type Codec = u8;
    type PixelFormat = u32;
    type Decoder = MockDecoder;
    type Scaler = MockScaler;
    type Packet = MockPacket;
    type Frame = MockFrame;

    fn open_input<'a>(&'a self, data: &'a [u8]) -> NativeResult<MockDemuxer<'a>> {
        self.state.call(MockStep::OpenInput)?;
        let (streams, position) =
            parse_header(data).ok_or(NativeError::failure(MOCK_INVALID_DATA))?;
        self.state.track(|live| live.demuxers += 1);
        Ok(MockDemuxer {
            data,
            streams,
            position,
            state: Arc::clone(&self.state),
        })
    }

    fn find_decoder(&self, stream: &StreamParameters<u8>) -> NativeResult<u8> {
        self.state.call(MockStep::FindDecoder)?;
        if stream.codec == VIDEO_CODEC {
            Ok(stream.codec)
        } else {
            Err(NativeError::failure(MOCK_DECODER_NOT_FOUND))
        }
    }

    fn open_decoder(
        &self,
        _codec: u8,
        demuxer: &MockDemuxer<'_>,
        stream_index: usize,
    ) -> NativeResult<MockDecoder> {
        self.state.call(MockStep::OpenDecoder)?;
        if stream_index >= demuxer.streams.len() {
            return Err(NativeError::failure(MOCK_INVALID_DATA));
        }
        self.state.track(|live| live.decoders += 1);
        Ok(MockDecoder {
            queue: VecDeque::new(),
            delay: *self.state.decoder_delay.lock().unwrap(),
            draining: false,
            state: Arc::clone(&self.state),
        })
    }

    fn scaler(
        &self,
        _format: u32,
        width: u32,
        height: u32,
        _algorithm: ScalingAlgorithm,
    ) -> NativeResult<MockScaler> {
        self.state.call(MockStep::Scaler)?;
        self.state.track(|live| live.scalers += 1);
        Ok(MockScaler {
            width,
            height,
            state: Arc::clone(&self.state),
        })
    }

    fn new_packet(&self) -> MockPacket {
        self.state.track(|live| live.packets += 1);
        MockPacket {
            stream: usize::MAX,
            payload: Vec::new(),
            state: Arc::clone(&self.state),
        }
    }

    fn new_frame(&self) -> MockFrame {
        self.state.track(|live| live.frames += 1);
        MockFrame {
            rgb: Vec::new(),
            state: Arc::clone(&self.state),
        }
    }
}
