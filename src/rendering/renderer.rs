//! The background block renderer.
//!
//! A [`BlockRenderer`] owns the most recently submitted frame and a background thread that
//! flushes it to an output sink at a fixed rate:
//!
//! *   **Submitting:** producers call [`RendererHandle::submit`] (or [`BlockRenderer::submit`])
//!     after every model update. A submission replaces the pending frame; frames are never
//!     queued, so several submissions between two ticks collapse into the last one.
//! *   **Ticking:** every frame interval the background thread sorts the pending frame by `z`,
//!     encodes it with [`encode_frame`] and writes it to the sink in one call.
//! *   **Stopping:** [`BlockRenderer::stop`] makes the thread do one last flush, waits for it to
//!     exit and hands the sink back.
//!
//! All shared state lives behind a single mutex. The lock is held only to swap or copy the
//! frame, never while writing to the sink, so a slow terminal does not block producers.
//!
//! # Example
//! ```
//! use blockterm::{Block, BlockRenderer, RendererConfig};
//!
//! let mut renderer = BlockRenderer::new(Vec::new(), RendererConfig::default()).unwrap();
//! renderer.start().unwrap();
//! renderer.submit(vec![Block::new(1, 1, "Hi\nThere"), Block::new(4, 4, "Hello")]);
//! let output = renderer.stop().unwrap();
//! assert!(String::from_utf8(output).unwrap().contains("Hello"));
//! ```

use crate::config::RendererConfig;
use crate::error::RendererError;
use crate::rendering::block::{sort_by_z, Block};
use crate::rendering::flush::encode_frame;
use crossterm::event::Event;
use log::{debug, trace, warn};
use std::io::Write;
use std::sync::mpsc::{self, RecvTimeoutError, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// State shared between producers and the flush thread.
#[derive(Debug, Default)]
struct RenderState {
    /// The frame the next flush will draw.
    pending: Arc<Vec<Block>>,
    /// Set on submit, cleared once the pending frame has been sorted.
    unsorted: bool,
    /// Rows covered by the last flush.
    lines_rendered: usize,
    /// Rows between where the last flush left the cursor and its lowest drawn line.
    rows_below_cursor: usize,
    /// Whether periodic ticks should flush.
    ticking: bool,
    /// Last known terminal size. Not used for layout yet.
    size: Option<(usize, usize)>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<RenderState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, RenderState> {
        // the state is plain data, so a panic while holding the lock leaves nothing half-updated
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn submit(&self, frame: Vec<Block>) {
        let mut state = self.lock();
        state.pending = Arc::new(frame);
        state.unsorted = true;
    }

    fn resize(&self, width: usize, height: usize) {
        self.lock().size = Some((width, height));
    }

    /// Sorts the pending frame and returns it with the height of the previous flush.
    ///
    /// Returns `None` if this is a periodic tick and ticking has been switched off.
    fn take_frame(&self, forced: bool) -> Option<(Arc<Vec<Block>>, usize)> {
        let mut state = self.lock();
        if !forced && !state.ticking {
            return None;
        }
        if state.unsorted {
            sort_by_z(Arc::make_mut(&mut state.pending).as_mut_slice());
            state.unsorted = false;
        }
        Some((Arc::clone(&state.pending), state.lines_rendered))
    }

    /// Draws the pending frame to `sink`.
    fn flush<W: Write>(&self, sink: &mut W, forced: bool) {
        let Some((frame, previous_lines)) = self.take_frame(forced) else {
            return;
        };
        let encoded = encode_frame(&frame, previous_lines);
        drop(frame);

        if let Err(err) = sink
            .write_all(&encoded.bytes)
            .and_then(|()| sink.flush())
        {
            warn!("failed to write frame: {err}");
        }
        trace!(
            "flushed {} bytes covering {} lines",
            encoded.bytes.len(),
            encoded.lines_rendered
        );
        let mut state = self.lock();
        state.lines_rendered = encoded.lines_rendered;
        state.rows_below_cursor = encoded.rows_below_cursor();
    }
}

/// A cloneable, thread-safe handle for feeding frames to a [`BlockRenderer`].
#[derive(Clone, Debug)]
pub struct RendererHandle {
    shared: Arc<Shared>,
}

impl RendererHandle {
    /// Replaces the pending frame. Never blocks on I/O.
    pub fn submit(&self, frame: Vec<Block>) {
        self.shared.submit(frame);
    }

    /// Records a new terminal size.
    pub fn resize(&self, width: usize, height: usize) {
        self.shared.resize(width, height);
    }

    /// Reacts to terminal events. Only [`Event::Resize`] is of interest to the renderer.
    pub fn handle_event(&self, event: &Event) {
        if let Event::Resize(width, height) = *event {
            self.resize(width as usize, height as usize);
        }
    }

    /// The last size reported through [`resize`](Self::resize), if any.
    pub fn size(&self) -> Option<(usize, usize)> {
        self.shared.lock().size
    }

    /// Rows covered by the most recent flush.
    pub fn lines_rendered(&self) -> usize {
        self.shared.lock().lines_rendered
    }
}

struct Worker<W> {
    stop_signal: Sender<()>,
    handle: JoinHandle<W>,
}

enum Lifecycle<W> {
    Idle(W),
    Running(Worker<W>),
    Stopped,
}

/// Composites [`Block`]s onto a terminal from a background thread.
///
/// The renderer goes through `idle → running → stopped` exactly once; it cannot be restarted.
/// Dropping a running renderer stops it.
pub struct BlockRenderer<W: Write + Send + 'static> {
    config: RendererConfig,
    shared: Arc<Shared>,
    lifecycle: Lifecycle<W>,
}

impl<W: Write + Send + 'static> BlockRenderer<W> {
    /// Creates a renderer that will write to `sink` once started.
    pub fn new(sink: W, config: RendererConfig) -> Result<Self, RendererError> {
        config.validate()?;
        Ok(Self {
            config,
            shared: Arc::new(Shared::default()),
            lifecycle: Lifecycle::Idle(sink),
        })
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Returns a handle producers on other threads can submit frames through.
    pub fn handle(&self) -> RendererHandle {
        RendererHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Running(_))
    }

    /// Replaces the pending frame. See [`RendererHandle::submit`].
    pub fn submit(&self, frame: Vec<Block>) {
        self.shared.submit(frame);
    }

    /// Records a new terminal size. See [`RendererHandle::resize`].
    pub fn resize(&self, width: usize, height: usize) {
        self.shared.resize(width, height);
    }

    /// Rows covered by the most recent flush.
    pub fn lines_rendered(&self) -> usize {
        self.shared.lock().lines_rendered
    }

    /// How far the cursor has to move down after the last flush to sit on the lowest drawn line.
    ///
    /// Useful for placing the cursor below the rendered region once the renderer is stopped.
    pub fn rows_below_cursor(&self) -> usize {
        self.shared.lock().rows_below_cursor
    }

    /// Spawns the background flush thread.
    pub fn start(&mut self) -> Result<(), RendererError> {
        let sink = match std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped) {
            Lifecycle::Idle(sink) => sink,
            Lifecycle::Running(worker) => {
                self.lifecycle = Lifecycle::Running(worker);
                return Err(RendererError::AlreadyRunning);
            }
            Lifecycle::Stopped => return Err(RendererError::Stopped),
        };

        let (stop_signal, stop_receiver) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let frame_interval = self.config.frame_interval;
        shared.lock().ticking = true;

        let handle = std::thread::Builder::new()
            .name("block-renderer".to_string())
            .spawn(move || run(sink, shared, frame_interval, stop_receiver))
            .inspect_err(|_| self.shared.lock().ticking = false)?;

        debug!("block renderer started, frame interval {frame_interval:?}");
        self.lifecycle = Lifecycle::Running(Worker {
            stop_signal,
            handle,
        });
        Ok(())
    }

    /// Flushes the pending frame one last time, stops the background thread and returns
    /// the sink.
    pub fn stop(&mut self) -> Result<W, RendererError> {
        match std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running(worker) => {
                let sink = shutdown(worker)?;
                debug!("block renderer stopped");
                Ok(sink)
            }
            Lifecycle::Idle(sink) => {
                self.lifecycle = Lifecycle::Idle(sink);
                Err(RendererError::NotRunning)
            }
            Lifecycle::Stopped => Err(RendererError::Stopped),
        }
    }
}

impl<W: Write + Send + 'static> Drop for BlockRenderer<W> {
    fn drop(&mut self) {
        if let Lifecycle::Running(worker) =
            std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped)
        {
            if shutdown(worker).is_err() {
                warn!("render thread panicked during shutdown");
            }
        }
    }
}

fn shutdown<W>(worker: Worker<W>) -> Result<W, RendererError> {
    // a send error means the thread is already gone; join reports why
    let _ = worker.stop_signal.send(());
    worker.handle.join().map_err(|_| RendererError::WorkerPanicked)
}

/// The deadline after `tick`. Missed ticks are dropped, not caught up on.
fn reschedule(tick: Instant, frame_interval: Duration) -> Option<Instant> {
    let now = Instant::now();
    match tick.checked_add(frame_interval) {
        Some(next) if next > now => Some(next),
        _ => now.checked_add(frame_interval),
    }
}

/// Body of the flush thread. Returns the sink once told to stop.
fn run<W: Write>(
    mut sink: W,
    shared: Arc<Shared>,
    frame_interval: Duration,
    stop: Receiver<()>,
) -> W {
    // `None` when the interval is too long to ever elapse; then only a stop signal wakes us
    let mut next_tick = Instant::now().checked_add(frame_interval);
    loop {
        let signal = match next_tick {
            Some(deadline) => stop.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => stop.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match signal {
            Err(RecvTimeoutError::Timeout) => {
                shared.flush(&mut sink, false);
                next_tick = next_tick.and_then(|tick| reschedule(tick, frame_interval));
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    shared.flush(&mut sink, true);
    shared.lock().ticking = false;
    sink
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::thread;

    /// Records every write separately so tests can count flushes.
    #[derive(Clone, Default)]
    struct RecordingSink {
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl RecordingSink {
        fn writes(&self) -> Vec<String> {
            self.writes
                .lock()
                .unwrap()
                .iter()
                .map(|w| String::from_utf8(w.clone()).unwrap())
                .collect()
        }
    }

    impl Write for RecordingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes.lock().unwrap().push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Blocks inside its first write until released.
    struct StallingSink {
        entered: Sender<()>,
        release: Receiver<()>,
        stalled: bool,
    }

    impl Write for StallingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if !self.stalled {
                self.stalled = true;
                let _ = self.entered.send(());
                let _ = self.release.recv();
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// No periodic tick fires within a test run.
    fn never_ticks() -> RendererConfig {
        RendererConfig::with_frame_interval(Duration::from_secs(3600)).unwrap()
    }

    fn example_frame() -> Vec<Block> {
        vec![Block::new(1, 1, "Hi\nThere"), Block::new(4, 4, "Hello")]
    }

    #[test]
    fn submissions_between_ticks_coalesce() {
        let sink = RecordingSink::default();
        let mut renderer = BlockRenderer::new(sink.clone(), never_ticks()).unwrap();
        renderer.start().unwrap();
        renderer.submit(vec![Block::new(0, 0, "frame A")]);
        renderer.submit(vec![Block::new(0, 0, "frame B")]);
        renderer.stop().unwrap();

        let writes = sink.writes();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].contains("frame B"));
        assert!(!writes[0].contains("frame A"));
    }

    #[test]
    fn stop_renders_last_frame_exactly_once() {
        let mut renderer = BlockRenderer::new(RecordingSink::default(), never_ticks()).unwrap();
        renderer.start().unwrap();
        renderer.submit(example_frame());
        let sink = renderer.stop().unwrap();

        let writes = sink.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].matches("Hello").count(), 1);
        assert_eq!(
            writes[0].as_bytes(),
            encode_frame(&example_frame(), 0).bytes.as_slice()
        );
        assert_eq!(renderer.lines_rendered(), 5);
    }

    #[test]
    fn ticks_flush_periodically() {
        let sink = RecordingSink::default();
        let config = RendererConfig::with_frame_interval(Duration::from_millis(5)).unwrap();
        let mut renderer = BlockRenderer::new(sink.clone(), config).unwrap();
        let handle = renderer.handle();
        renderer.start().unwrap();
        handle.submit(example_frame());

        let deadline = Instant::now() + Duration::from_secs(5);
        while !sink.writes().iter().any(|w| w.contains("Hello")) {
            assert!(Instant::now() < deadline, "no tick rendered the frame");
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(handle.lines_rendered(), 5);
        renderer.stop().unwrap();
    }

    #[test]
    fn second_flush_returns_to_previous_anchor() {
        let mut renderer = BlockRenderer::new(Vec::new(), never_ticks()).unwrap();
        renderer.submit(example_frame());
        renderer.start().unwrap();
        renderer.stop().unwrap();

        // a stopped renderer keeps its history; encode the follow-up frame by hand
        let next = encode_frame(&[Block::new(0, 0, "x")], renderer.lines_rendered());
        assert!(next.bytes.starts_with(b"\x1b[5A"));
        assert_eq!(next.lines_rendered, 1);
    }

    #[test]
    fn flush_sorts_by_z() {
        let mut renderer = BlockRenderer::new(Vec::new(), never_ticks()).unwrap();
        renderer.start().unwrap();
        renderer.submit(vec![
            Block::new(0, 0, "upper").with_z(10),
            Block::new(0, 0, "lower").with_z(-1),
        ]);
        let out = String::from_utf8(renderer.stop().unwrap()).unwrap();
        assert!(out.find("lower").unwrap() < out.find("upper").unwrap());
    }

    #[test]
    fn concurrent_producers() {
        let sink = RecordingSink::default();
        let config = RendererConfig::with_frame_interval(Duration::from_millis(1)).unwrap();
        let mut renderer = BlockRenderer::new(sink.clone(), config).unwrap();
        renderer.start().unwrap();

        let producers: Vec<_> = (0..4)
            .map(|id| {
                let handle = renderer.handle();
                thread::spawn(move || {
                    for i in 0..200 {
                        handle.submit(vec![Block::new(id, i % 7, format!("p{id}-{i}"))]);
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        renderer.submit(vec![Block::new(2, 2, "final")]);
        renderer.stop().unwrap();

        let writes = sink.writes();
        assert!(writes.last().unwrap().contains("final"));
        assert_eq!(renderer.lines_rendered(), 3);
    }

    #[test]
    fn write_errors_do_not_stop_the_loop() {
        let mut renderer = BlockRenderer::new(BrokenPipe, never_ticks()).unwrap();
        renderer.start().unwrap();
        renderer.submit(example_frame());
        assert!(renderer.stop().is_ok());
        assert_eq!(renderer.lines_rendered(), 5);
    }

    #[test]
    fn slow_writes_do_not_block_submit() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let sink = StallingSink {
            entered: entered_tx,
            release: release_rx,
            stalled: false,
        };
        let config = RendererConfig::with_frame_interval(Duration::from_millis(1)).unwrap();
        let mut renderer = BlockRenderer::new(sink, config).unwrap();
        let handle = renderer.handle();
        renderer.start().unwrap();

        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("no flush reached the sink");

        // the worker is now stuck inside write
        let (done_tx, done_rx) = mpsc::channel();
        let producer = thread::spawn(move || {
            handle.submit(vec![Block::new(0, 0, "while writing")]);
            handle.resize(10, 10);
            let _ = done_tx.send(handle.size());
        });
        let size = done_rx.recv_timeout(Duration::from_secs(5));
        release_tx.send(()).unwrap();
        assert_eq!(size, Ok(Some((10, 10))), "submit waited on the sink write");

        producer.join().unwrap();
        renderer.stop().unwrap();
        assert_eq!(renderer.lines_rendered(), 1);
    }

    #[test]
    fn huge_interval_still_flushes_on_stop() {
        let config = RendererConfig::with_frame_interval(Duration::MAX).unwrap();
        let mut renderer = BlockRenderer::new(RecordingSink::default(), config).unwrap();
        renderer.start().unwrap();
        renderer.submit(vec![Block::new(0, 0, "last")]);
        let sink = renderer.stop().unwrap();

        let writes = sink.writes();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].contains("last"));
    }

    #[test]
    fn reschedule_drops_missed_ticks() {
        let start = Instant::now();
        let interval = Duration::from_millis(10);
        let stale = start.checked_sub(Duration::from_secs(1)).unwrap_or(start);
        let next = reschedule(stale, interval).unwrap();
        assert!(next > start);
        assert!(reschedule(start, Duration::MAX).is_none());
    }

    #[test]
    fn rows_below_cursor_follows_last_frame() {
        let mut renderer = BlockRenderer::new(Vec::new(), never_ticks()).unwrap();
        renderer.start().unwrap();
        renderer.submit(vec![
            Block::new(0, 3, "a\nb"),
            Block::new(0, 0, "top").with_z(1),
        ]);
        renderer.stop().unwrap();
        assert_eq!(renderer.lines_rendered(), 5);
        assert_eq!(renderer.rows_below_cursor(), 3);
    }

    #[test]
    fn lifecycle_misuse_is_rejected() {
        let mut renderer = BlockRenderer::new(Vec::new(), never_ticks()).unwrap();
        assert!(matches!(renderer.stop(), Err(RendererError::NotRunning)));

        renderer.start().unwrap();
        assert!(renderer.is_running());
        assert!(matches!(renderer.start(), Err(RendererError::AlreadyRunning)));

        renderer.stop().unwrap();
        assert!(!renderer.is_running());
        assert!(matches!(renderer.stop(), Err(RendererError::Stopped)));
        assert!(matches!(renderer.start(), Err(RendererError::Stopped)));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = RendererConfig {
            frame_interval: Duration::ZERO,
        };
        assert!(matches!(
            BlockRenderer::new(Vec::new(), config),
            Err(RendererError::InvalidFrameInterval(_))
        ));
    }

    #[test]
    fn resize_events_are_stored() {
        let renderer = BlockRenderer::new(Vec::new(), never_ticks()).unwrap();
        let handle = renderer.handle();
        assert_eq!(handle.size(), None);
        handle.handle_event(&Event::Resize(80, 24));
        assert_eq!(handle.size(), Some((80, 24)));
        handle.handle_event(&Event::FocusGained);
        renderer.resize(100, 30);
        assert_eq!(handle.size(), Some((100, 30)));
    }

    #[test]
    fn dropping_a_running_renderer_flushes() {
        let sink = RecordingSink::default();
        {
            let mut renderer = BlockRenderer::new(sink.clone(), never_ticks()).unwrap();
            renderer.start().unwrap();
            renderer.submit(vec![Block::new(0, 0, "bye")]);
        }
        let writes = sink.writes();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].contains("bye"));
    }
}
