//! Background decoding service.
//!
//! [`FrameDecoder`] runs context initialization and decode jobs on a single
//! worker thread, in submission order. Each job's result lands in a slot that
//! callers can poll ([`FrameDecoder::decoded_frames`]) or wait on
//! ([`FrameDecoder::decoded_frames_now`]). Decode jobs are keyed by a
//! caller-chosen integer id.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framebridge::{FfmpegEngine, FrameDecoder, PackedImageAdapter};
//!
//! let bytes: Arc<[u8]> = std::fs::read("clip.mp4")?.into();
//! let mut decoder = FrameDecoder::new(FfmpegEngine::new(), PackedImageAdapter);
//!
//! decoder.start_stream_context_initialization(Arc::clone(&bytes));
//! let context = decoder.stream_context_now().expect("context");
//!
//! decoder.start_decoding_all(0, &context, bytes);
//! let decoded = decoder.decoded_frames_now(0).expect("frames");
//! println!("{} frames", decoded.frames().len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::{
    any::Any,
    collections::HashMap,
    fmt::{Debug, Formatter, Result as FmtResult},
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
        mpsc::{self, Sender},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    adapter::ImageAdapter, config::DecodeOptions, context::DecodeContext, engine::CodecEngine,
    error::DecodingError,
};

type Job = Box<dyn FnOnce() + Send + 'static>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Frames produced by one decode job.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrames<I> {
    frames: Vec<I>,
    offset: usize,
}

impl<I> DecodedFrames<I> {
    /// The decoded images, in decode order.
    pub fn frames(&self) -> &[I] {
        &self.frames
    }

    /// How many leading frames of the clip were skipped.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// A shareable, closable [`DecodeContext`].
///
/// Clones refer to the same context. Closing releases it for every clone.
pub struct StreamContext<E: CodecEngine> {
    inner: Arc<Mutex<Option<DecodeContext<E>>>>,
}

impl<E: CodecEngine> Clone for StreamContext<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: CodecEngine> Debug for StreamContext<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("StreamContext")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<E: CodecEngine> StreamContext<E> {
    pub fn new(context: DecodeContext<E>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(context))),
        }
    }

    /// Release the context. Closing twice is a no-op.
    pub fn close(&self) {
        if lock(&self.inner).take().is_some() {
            log::debug!("Stream context closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner).is_none()
    }

    /// The context's declared frame count.
    pub fn frames(&self) -> Result<u64, DecodingError> {
        self.with(|context| context.frames())
    }

    /// Run `operation` against the open context.
    ///
    /// # Errors
    ///
    /// Returns [`DecodingError::ContextClosed`] once the context is closed,
    /// otherwise whatever `operation` returns.
    pub fn with<R>(
        &self,
        operation: impl FnOnce(&mut DecodeContext<E>) -> Result<R, DecodingError>,
    ) -> Result<R, DecodingError> {
        let mut guard = lock(&self.inner);
        let context = guard.as_mut().ok_or(DecodingError::ContextClosed)?;
        operation(context)
    }
}

enum SlotState<T> {
    Pending,
    Cancelled,
    Done(Result<T, DecodingError>),
}

/// The eventual result of one job.
struct JobSlot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

impl<T: Clone> JobSlot<T> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SlotState::Pending),
            ready: Condvar::new(),
        })
    }

    fn complete(&self, result: Result<T, DecodingError>) {
        let mut state = lock(&self.state);
        if matches!(*state, SlotState::Pending) {
            *state = SlotState::Done(result);
        }
        self.ready.notify_all();
    }

    fn cancel(&self) {
        let mut state = lock(&self.state);
        if matches!(*state, SlotState::Pending) {
            *state = SlotState::Cancelled;
        }
        self.ready.notify_all();
    }

    fn is_cancelled(&self) -> bool {
        matches!(*lock(&self.state), SlotState::Cancelled)
    }

    fn is_finished(&self) -> bool {
        !matches!(*lock(&self.state), SlotState::Pending)
    }

    fn result(state: &SlotState<T>) -> Option<Result<T, DecodingError>> {
        match state {
            SlotState::Pending => None,
            SlotState::Cancelled => Some(Err(DecodingError::Purged)),
            SlotState::Done(result) => Some(result.clone()),
        }
    }

    fn try_get(&self) -> Option<Result<T, DecodingError>> {
        Self::result(&lock(&self.state))
    }

    fn wait(&self) -> Result<T, DecodingError> {
        let mut state = lock(&self.state);
        loop {
            if let Some(result) = Self::result(&state) {
                return result;
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Runs decode work on a dedicated worker thread.
///
/// Submitting a job never blocks; results are fetched by id. Dropping the
/// service waits for queued jobs to finish.
pub struct FrameDecoder<E: CodecEngine, A: ImageAdapter> {
    engine: E,
    adapter: Arc<A>,
    options: DecodeOptions,
    sender: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    stream_context: Option<Arc<JobSlot<StreamContext<E>>>>,
    jobs: HashMap<u32, Arc<JobSlot<Arc<DecodedFrames<A::Image>>>>>,
}

impl<E, A> FrameDecoder<E, A>
where
    E: CodecEngine + Clone + Send + 'static,
    A: ImageAdapter + Send + Sync + 'static,
    A::Image: Send + Sync + 'static,
    DecodeContext<E>: Send,
{
    /// Start the service with default [`DecodeOptions`].
    pub fn new(engine: E, adapter: A) -> Self {
        Self::with_options(engine, adapter, DecodeOptions::default())
    }

    /// Start the service; `options` apply to every context it initializes.
    pub fn with_options(engine: E, adapter: A, options: DecodeOptions) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let worker = thread::spawn(move || {
            for job in receiver {
                job();
            }
            log::debug!("Decoding worker stopped");
        });

        log::debug!("Frame decoder started ({options:?})");

        Self {
            engine,
            adapter: Arc::new(adapter),
            options,
            sender: Some(sender),
            worker: Some(worker),
            stream_context: None,
            jobs: HashMap::new(),
        }
    }

    fn submit<T: Clone + Send + 'static>(
        &self,
        slot: &Arc<JobSlot<T>>,
        description: String,
        work: impl FnOnce() -> Result<T, DecodingError> + Send + 'static,
    ) {
        let job_slot = Arc::clone(slot);
        let job: Job = Box::new(move || {
            if job_slot.is_cancelled() {
                log::warn!("Skipping purged job: {description}");
                return;
            }
            log::debug!("Running job: {description}");
            // A panic fails this job only; the worker keeps running.
            let result = panic::catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                log::warn!("Job panicked ({description}): {message}");
                Err(DecodingError::JobPanicked(message))
            });
            job_slot.complete(result);
        });

        let sent = self
            .sender
            .as_ref()
            .is_some_and(|sender| sender.send(job).is_ok());
        if !sent {
            slot.cancel();
        }
    }

    /// Queue initialization of a stream context over `data`.
    ///
    /// Replaces any previous initialization result.
    pub fn start_stream_context_initialization(&mut self, data: impl Into<Arc<[u8]>>) {
        let data: Arc<[u8]> = data.into();
        let engine = self.engine.clone();
        let options = self.options.clone();
        let slot = JobSlot::new();

        log::debug!("Queueing stream context initialization ({} bytes)", data.len());
        self.submit(&slot, "stream context initialization".to_string(), move || {
            DecodeContext::open(engine, &data, options).map(StreamContext::new)
        });
        self.stream_context = Some(slot);
    }

    /// The initialized stream context, if initialization has finished and
    /// succeeded.
    pub fn stream_context(&self) -> Option<StreamContext<E>> {
        self.stream_context.as_ref()?.try_get()?.ok()
    }

    /// Wait for initialization to finish and return the context on success.
    pub fn stream_context_now(&self) -> Option<StreamContext<E>> {
        self.stream_context.as_ref()?.wait().ok()
    }

    /// The initialization error, if initialization has finished and failed.
    pub fn stream_context_error(&self) -> Option<DecodingError> {
        self.stream_context.as_ref()?.try_get()?.err()
    }

    /// Queue decoding of every frame the context declares.
    pub fn start_decoding_all(&mut self, id: u32, context: &StreamContext<E>, data: Arc<[u8]>) {
        let context = context.clone();
        let adapter = Arc::clone(&self.adapter);
        let slot = JobSlot::new();

        log::debug!("Queueing decoding job {id}: all frames");
        self.submit(&slot, format!("decode all frames (job {id})"), move || {
            context.with(|decode_context| {
                let total = usize::try_from(decode_context.frames()?).unwrap_or(usize::MAX);
                let frames = decode_context.decode_frames(&data, 0, total, adapter.as_ref())?;
                Ok(Arc::new(DecodedFrames { frames, offset: 0 }))
            })
        });
        self.jobs.insert(id, slot);
    }

    /// Queue decoding of `total` frames after skipping `offset`.
    pub fn start_decoding(
        &mut self,
        id: u32,
        context: &StreamContext<E>,
        data: Arc<[u8]>,
        offset: usize,
        total: usize,
    ) {
        let context = context.clone();
        let adapter = Arc::clone(&self.adapter);
        let slot = JobSlot::new();

        log::debug!("Queueing decoding job {id}: offset={offset}, total={total}");
        self.submit(&slot, format!("decode {total} frames (job {id})"), move || {
            context.with(|decode_context| {
                let frames = decode_context.decode_frames(&data, offset, total, adapter.as_ref())?;
                Ok(Arc::new(DecodedFrames { frames, offset }))
            })
        });
        self.jobs.insert(id, slot);
    }

    /// The frames of job `id`, if it has finished and succeeded.
    pub fn decoded_frames(&self, id: u32) -> Option<Arc<DecodedFrames<A::Image>>> {
        self.jobs.get(&id)?.try_get()?.ok()
    }

    /// Wait for job `id` and return its frames on success.
    ///
    /// Returns `None` immediately for an unknown id.
    pub fn decoded_frames_now(&self, id: u32) -> Option<Arc<DecodedFrames<A::Image>>> {
        self.jobs.get(&id)?.wait().ok()
    }

    /// Whether job `id` exists and has finished, successfully or not.
    pub fn is_decoding_complete(&self, id: u32) -> bool {
        self.jobs.get(&id).is_some_and(|slot| slot.is_finished())
    }

    /// The error of job `id`, if it has finished and failed.
    pub fn decoding_error(&self, id: u32) -> Option<DecodingError> {
        self.jobs.get(&id)?.try_get()?.err()
    }

    /// Forget the result of job `id`.
    pub fn free_decoded_frames(&mut self, id: u32) {
        self.jobs.remove(&id);
    }

    /// The declared frame count of `context`.
    pub fn frame_rate(&self, context: &StreamContext<E>) -> Result<u64, DecodingError> {
        context.frames()
    }

    /// Display duration of one frame of `context`.
    pub fn frame_pace(&self, context: &StreamContext<E>) -> Result<Duration, DecodingError> {
        context.with(|decode_context| decode_context.frame_pace())
    }

    /// Cancel every job that has not started and forget all results.
    ///
    /// A job already running finishes, but its result is discarded.
    pub fn purge(&mut self) {
        log::debug!("Purging {} decoding jobs", self.jobs.len());
        for slot in self.jobs.values() {
            slot.cancel();
        }
        if let Some(slot) = &self.stream_context {
            slot.cancel();
        }
        self.jobs.clear();
        self.stream_context = None;
    }

    /// Wait for every submitted job to finish, then forget all results.
    pub fn purge_and_flush(&mut self) {
        log::debug!("Flushing {} decoding jobs", self.jobs.len());
        for slot in self.jobs.values() {
            // Failed jobs are discarded along with the rest.
            let _ = slot.wait();
        }
        if let Some(slot) = &self.stream_context {
            let _ = slot.wait();
        }
        self.jobs.clear();
        self.stream_context = None;
    }
}

impl<E: CodecEngine, A: ImageAdapter> Drop for FrameDecoder<E, A> {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain the queue and exit.
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("Decoding worker panicked");
            }
        }
        log::debug!("Frame decoder closed");
    }
}
