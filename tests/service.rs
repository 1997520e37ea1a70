//! FrameDecoder service tests.

mod common;

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, Sender},
    },
    time::Duration,
};

use common::{MockEngine, MockStep, expected_packed, simple_clip};
use framebridge::{
    DecodingError, ErrorKind, FrameDecoder, ImageAdapter, PackedImage, PackedImageAdapter,
    PixelLayout, Step,
};

fn clip() -> Arc<[u8]> {
    simple_clip(2, 2, 4).into()
}

/// Blocks inside the first `create_image` call until released.
struct GatedAdapter {
    started: Mutex<Option<Sender<()>>>,
    release: Mutex<Option<Receiver<()>>>,
}

impl GatedAdapter {
    fn new() -> (Self, Receiver<()>, Sender<()>) {
        let (started_sender, started_receiver) = mpsc::channel();
        let (release_sender, release_receiver) = mpsc::channel();
        let adapter = GatedAdapter {
            started: Mutex::new(Some(started_sender)),
            release: Mutex::new(Some(release_receiver)),
        };
        (adapter, started_receiver, release_sender)
    }
}

impl ImageAdapter for GatedAdapter {
    type Image = PackedImage;

    fn create_image(
        &self,
        pixels: Vec<u32>,
        width: u32,
        height: u32,
        layout: PixelLayout,
    ) -> Result<PackedImage, DecodingError> {
        let started = self.started.lock().unwrap().take();
        if let Some(started) = started {
            started.send(()).unwrap();
            let release = self.release.lock().unwrap().take();
            if let Some(release) = release {
                release.recv().unwrap();
            }
        }
        PackedImageAdapter.create_image(pixels, width, height, layout)
    }
}

/// Panics on the first `create_image` call only.
#[derive(Default)]
struct PanicOnceAdapter {
    panicked: AtomicBool,
}

impl ImageAdapter for PanicOnceAdapter {
    type Image = PackedImage;

    fn create_image(
        &self,
        pixels: Vec<u32>,
        width: u32,
        height: u32,
        layout: PixelLayout,
    ) -> Result<PackedImage, DecodingError> {
        if !self.panicked.swap(true, Ordering::SeqCst) {
            panic!("host image allocation failed");
        }
        PackedImageAdapter.create_image(pixels, width, height, layout)
    }
}

#[test]
fn stream_context_lifecycle() {
    let engine = MockEngine::new();
    let mut decoder = FrameDecoder::new(engine.clone(), PackedImageAdapter);

    decoder.start_stream_context_initialization(clip());
    let context = decoder
        .stream_context_now()
        .expect("Stream context failed to initialize");

    assert!(decoder.stream_context_error().is_none());
    assert!(decoder.stream_context().is_some());
    assert!(!context.is_closed());
    assert_eq!(decoder.frame_rate(&context), Ok(4));
    assert_eq!(decoder.frame_pace(&context), Ok(Duration::from_millis(250)));

    context.close();
    assert!(context.is_closed());
    context.close();
    assert_eq!(decoder.frame_rate(&context), Err(DecodingError::ContextClosed));

    drop(decoder);
    assert!(engine.live().is_empty(), "Leaked: {:?}", engine.live());
}

#[test]
fn initialization_failure_is_reported() {
    let mut decoder = FrameDecoder::new(MockEngine::new(), PackedImageAdapter);

    decoder.start_stream_context_initialization(b"garbage".to_vec());
    assert!(decoder.stream_context_now().is_none());

    let error = decoder
        .stream_context_error()
        .expect("Expected an initialization error");
    assert_eq!(error.kind(), ErrorKind::InitializationFailure);
    assert_eq!(error.step(), Some(Step::Demuxing));
}

#[test]
fn decode_all_frames() {
    let data = clip();
    let mut decoder = FrameDecoder::new(MockEngine::new(), PackedImageAdapter);
    decoder.start_stream_context_initialization(Arc::clone(&data));
    let context = decoder.stream_context_now().expect("No stream context");

    decoder.start_decoding_all(0, &context, Arc::clone(&data));
    let decoded = decoder.decoded_frames_now(0).expect("Decoding failed");

    assert!(decoder.is_decoding_complete(0));
    assert!(decoder.decoding_error(0).is_none());
    assert_eq!(decoded.offset(), 0);
    assert_eq!(decoded.len(), 4);
    for (index, frame) in decoded.frames().iter().enumerate() {
        assert_eq!(frame.pixels(), expected_packed(index, 4).as_slice());
    }

    decoder.free_decoded_frames(0);
    assert!(decoder.decoded_frames(0).is_none());
    assert!(!decoder.is_decoding_complete(0));
    context.close();
}

#[test]
fn decode_a_window_of_frames() {
    let data = clip();
    let mut decoder = FrameDecoder::new(MockEngine::new(), PackedImageAdapter);
    decoder.start_stream_context_initialization(Arc::clone(&data));
    let context = decoder.stream_context_now().expect("No stream context");

    decoder.start_decoding(7, &context, Arc::clone(&data), 1, 2);
    let decoded = decoder.decoded_frames_now(7).expect("Decoding failed");

    assert_eq!(decoded.offset(), 1);
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded.frames()[0].pixels(), expected_packed(1, 4).as_slice());
    assert_eq!(decoded.frames()[1].pixels(), expected_packed(2, 4).as_slice());
    context.close();
}

#[test]
fn jobs_run_in_submission_order() {
    let data = clip();
    let mut decoder = FrameDecoder::new(MockEngine::new(), PackedImageAdapter);
    decoder.start_stream_context_initialization(Arc::clone(&data));
    let context = decoder.stream_context_now().expect("No stream context");

    for id in 0..4 {
        decoder.start_decoding(id, &context, Arc::clone(&data), id as usize, 1);
    }

    // Waiting on the last job means every earlier one has finished.
    let last = decoder.decoded_frames_now(3).expect("Decoding failed");
    assert_eq!(last.frames()[0].pixels(), expected_packed(3, 4).as_slice());
    for id in 0..3 {
        assert!(decoder.is_decoding_complete(id));
        let decoded = decoder.decoded_frames(id).expect("Decoding failed");
        assert_eq!(decoded.offset(), id as usize);
    }
    context.close();
}

#[test]
fn decoding_error_is_reported() {
    let data = clip();
    let mut decoder = FrameDecoder::new(MockEngine::new(), PackedImageAdapter);
    decoder.start_stream_context_initialization(Arc::clone(&data));
    let context = decoder.stream_context_now().expect("No stream context");

    decoder.start_decoding(1, &context, Arc::clone(&data), 0, 10);
    assert!(decoder.decoded_frames_now(1).is_none());
    assert!(decoder.is_decoding_complete(1));

    let error = decoder.decoding_error(1).expect("Expected a decoding error");
    assert_eq!(error.kind(), ErrorKind::DemuxFailure);

    context.close();
    decoder.start_decoding(2, &context, Arc::clone(&data), 0, 1);
    assert!(decoder.decoded_frames_now(2).is_none());
    assert_eq!(decoder.decoding_error(2), Some(DecodingError::ContextClosed));
}

#[test]
fn unknown_job_ids() {
    let decoder = FrameDecoder::new(MockEngine::new(), PackedImageAdapter);

    assert!(decoder.decoded_frames(42).is_none());
    assert!(decoder.decoded_frames_now(42).is_none());
    assert!(decoder.decoding_error(42).is_none());
    assert!(!decoder.is_decoding_complete(42));
    assert!(decoder.stream_context().is_none());
    assert!(decoder.stream_context_now().is_none());
}

#[test]
fn purge_forgets_everything() {
    let data = clip();
    let mut decoder = FrameDecoder::new(MockEngine::new(), PackedImageAdapter);
    decoder.start_stream_context_initialization(Arc::clone(&data));
    let context = decoder.stream_context_now().expect("No stream context");

    decoder.start_decoding_all(0, &context, Arc::clone(&data));
    decoder.decoded_frames_now(0).expect("Decoding failed");

    decoder.purge();
    assert!(decoder.decoded_frames(0).is_none());
    assert!(decoder.stream_context().is_none());

    // The context handed out earlier is still open and the service still runs.
    assert!(!context.is_closed());
    decoder.start_decoding(1, &context, Arc::clone(&data), 0, 1);
    assert!(decoder.decoded_frames_now(1).is_some());
    context.close();
}

#[test]
fn purge_cancels_queued_jobs() {
    let engine = MockEngine::new();
    let data = clip();
    let (adapter, started, release) = GatedAdapter::new();
    let mut decoder = FrameDecoder::new(engine.clone(), adapter);
    decoder.start_stream_context_initialization(Arc::clone(&data));
    let context = decoder.stream_context_now().expect("No stream context");
    engine.reset_calls();

    decoder.start_decoding(0, &context, Arc::clone(&data), 0, 1);
    started.recv().expect("Job 0 never started");

    // Job 0 is running; job 1 is still queued behind it.
    decoder.start_decoding(1, &context, Arc::clone(&data), 0, 1);
    decoder.purge();
    release.send(()).expect("Worker stopped");

    decoder.start_decoding(2, &context, Arc::clone(&data), 0, 1);
    let decoded = decoder.decoded_frames_now(2).expect("Decoding failed");
    assert_eq!(decoded.frames()[0].pixels(), expected_packed(0, 4).as_slice());

    // Only jobs 0 and 2 probed the clip.
    assert_eq!(engine.calls(MockStep::OpenInput), 2);
    assert!(decoder.decoded_frames(0).is_none());
    assert!(decoder.decoded_frames(1).is_none());

    context.close();
    drop(decoder);
    assert!(engine.live().is_empty(), "Leaked: {:?}", engine.live());
}

#[test]
fn panicking_job_reports_error_and_worker_survives() {
    let engine = MockEngine::new();
    let data = clip();
    let mut decoder = FrameDecoder::new(engine.clone(), PanicOnceAdapter::default());
    decoder.start_stream_context_initialization(Arc::clone(&data));
    let context = decoder.stream_context_now().expect("No stream context");

    decoder.start_decoding(0, &context, Arc::clone(&data), 0, 2);
    decoder.start_decoding(1, &context, Arc::clone(&data), 1, 2);

    assert!(decoder.decoded_frames_now(0).is_none());
    assert!(decoder.is_decoding_complete(0));
    let error = decoder.decoding_error(0).expect("Expected a job error");
    assert_eq!(
        error,
        DecodingError::JobPanicked("host image allocation failed".to_string())
    );
    assert_eq!(error.kind(), ErrorKind::Host);

    // The queued job and the shared context both outlive the panic.
    let decoded = decoder.decoded_frames_now(1).expect("Decoding failed");
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded.frames()[0].pixels(), expected_packed(1, 4).as_slice());
    assert_eq!(decoder.frame_rate(&context), Ok(4));

    decoder.start_decoding(2, &context, Arc::clone(&data), 0, 1);
    decoder.purge_and_flush();
    assert!(decoder.decoded_frames(2).is_none());

    context.close();
    drop(decoder);
    assert!(engine.live().is_empty(), "Leaked: {:?}", engine.live());
}

#[test]
fn purge_and_flush_waits_for_jobs() {
    let data = clip();
    let mut decoder = FrameDecoder::new(MockEngine::new(), PackedImageAdapter);
    decoder.start_stream_context_initialization(Arc::clone(&data));
    let context = decoder.stream_context_now().expect("No stream context");

    for id in 0..3 {
        decoder.start_decoding_all(id, &context, Arc::clone(&data));
    }
    decoder.purge_and_flush();

    for id in 0..3 {
        assert!(decoder.decoded_frames(id).is_none());
    }
    assert!(decoder.stream_context().is_none());
    context.close();
}

#[test]
fn dropping_the_service_finishes_queued_work() {
    let engine = MockEngine::new();
    let data = clip();
    let mut decoder = FrameDecoder::new(engine.clone(), PackedImageAdapter);
    decoder.start_stream_context_initialization(Arc::clone(&data));
    let context = decoder.stream_context_now().expect("No stream context");

    decoder.start_decoding_all(0, &context, Arc::clone(&data));
    drop(decoder);

    // The worker has exited, so nothing else touches the context.
    assert_eq!(engine.live().demuxers, 0);
    context.close();
    assert!(engine.live().is_empty());
}
