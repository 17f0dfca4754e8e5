//! The batch control surface: one batch at a time, items strictly in order.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use tracing::{info, warn};

use crate::codec::{ImageCodec, JpegCodec};
use crate::error::BatchError;
use crate::fs::{ArchiveSink, output_file_name};
use crate::pipeline::{ModeSettings, TransformEngine, geometry};
use crate::stats::StatsCollector;
use crate::types::SourceImage;

use super::{BatchResult, ItemFailure, OutputArtifact, ProcessingJob, ProgressEvent, ProgressState};

/// Observable lifecycle of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Running,
}

/// Runs batches through a [`TransformEngine`].
///
/// `start` takes `&self`, so a controller can be shared between threads: other threads may query
/// [`is_running`](Self::is_running), request [`cancel`](Self::cancel), or attempt a second
/// `start`, which is rejected with [`BatchError::AlreadyProcessing`].
#[derive(Debug)]
pub struct BatchController<C = JpegCodec> {
    engine: TransformEngine<C>,
    running: AtomicBool,
    cancel_requested: AtomicBool,
    stats: Option<Arc<StatsCollector>>,
}

impl Default for BatchController<JpegCodec> {
    fn default() -> Self {
        Self::new(TransformEngine::default())
    }
}

impl<C: ImageCodec> BatchController<C> {
    pub fn new(engine: TransformEngine<C>) -> Self {
        Self {
            engine,
            running: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
            stats: None,
        }
    }

    pub fn with_stats(mut self, stats: Arc<StatsCollector>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn engine(&self) -> &TransformEngine<C> {
        &self.engine
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn state(&self) -> BatchState {
        if self.is_running() { BatchState::Running } else { BatchState::Idle }
    }

    /// Ask the running batch to stop before its next item. Returns `false` when idle.
    ///
    /// Items not yet started are recorded as [`BatchError::Cancelled`]; the archive still holds
    /// everything finished before the request.
    pub fn cancel(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.cancel_requested.store(true, Ordering::Release);
        true
    }

    /// Transform every source in order and collect the results into `sink`.
    ///
    /// Batch-level problems (a batch already running, no sources, invalid settings) are returned
    /// before any item is touched. Per-item failures are recorded in the result instead.
    /// `on_progress` is called once per item after it finishes.
    pub fn start<S, F>(
        &self,
        sources: &[SourceImage],
        settings: &ModeSettings,
        mut sink: S,
        mut on_progress: F,
    ) -> Result<BatchResult, BatchError>
    where
        S: ArchiveSink,
        F: FnMut(&ProgressEvent<'_>),
    {
        let _guard = RunGuard::acquire(&self.running)?;
        self.cancel_requested.store(false, Ordering::Release);

        if sources.is_empty() {
            return Err(BatchError::EmptyBatch);
        }
        geometry::validate(settings)?;

        let total = sources.len();
        info!(
            target: "batch::controller",
            total,
            mode = ?settings.mode(),
            "starting batch"
        );
        if let Some(stats) = self.stats.as_deref() {
            stats.record_batch_started();
        }

        let mut run = BatchRun::new(total);
        for (index, source) in sources.iter().enumerate() {
            let job = ProcessingJob::new(index, source, settings);
            let filename = output_file_name(source.name());
            run.note_name(&filename);

            let outcome = if self.cancel_requested.load(Ordering::Acquire) {
                Err(BatchError::Cancelled)
            } else {
                self.process(&job, &filename, &mut sink)
            };

            let succeeded = outcome.is_ok();
            run.record(index, filename, outcome, self.stats.as_deref());

            on_progress(&ProgressEvent {
                progress: run.progress,
                index,
                filename: run.last_filename(),
                succeeded,
            });
            thread::yield_now();
        }

        let archive = sink.finalize().map_err(BatchError::ArchiveFailure)?;
        let result = run.finish(archive);
        info!(
            target: "batch::controller",
            succeeded = result.succeeded(),
            failed = result.failed(),
            archive_bytes = result.archive.len(),
            "batch completed"
        );
        Ok(result)
    }

    fn process<S: ArchiveSink>(
        &self,
        job: &ProcessingJob<'_>,
        filename: &str,
        sink: &mut S,
    ) -> Result<OutputArtifact, BatchError> {
        let stats = self.stats.as_deref();

        let decode_started = Instant::now();
        let decoded = self.engine.decode(job.source)?;
        if let Some(stats) = stats {
            stats.record_decode(decode_started.elapsed());
        }

        let plan = self.engine.plan(job.source, &decoded, job.settings)?;

        let render_started = Instant::now();
        let encoded = self.engine.render(&decoded, &plan)?;
        if let Some(stats) = stats {
            stats.record_render(render_started.elapsed());
        }

        sink.add(filename, &encoded.bytes).map_err(BatchError::ArchiveFailure)?;
        if let Some(stats) = stats {
            stats.record_success(job.source.size_bytes(), encoded.bytes.len());
        }

        Ok(OutputArtifact {
            index: job.index,
            filename: filename.to_string(),
            dimensions: encoded.dimensions,
            bytes: encoded.bytes,
        })
    }
}

/// Holds the running flag for the lifetime of one `start` call, on every exit path.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, BatchError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| BatchError::AlreadyProcessing)?;
        Ok(Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Per-batch accumulators, owned by a single `start` call.
struct BatchRun {
    progress: ProgressState,
    artifacts: Vec<OutputArtifact>,
    failures: Vec<ItemFailure>,
    seen_names: HashSet<String>,
    last_filename: String,
}

impl BatchRun {
    fn new(total: usize) -> Self {
        Self {
            progress: ProgressState::new(total),
            artifacts: Vec::with_capacity(total),
            failures: Vec::new(),
            seen_names: HashSet::with_capacity(total),
            last_filename: String::new(),
        }
    }

    fn note_name(&mut self, filename: &str) {
        if !self.seen_names.insert(filename.to_string()) {
            warn!(
                target: "batch::controller",
                filename,
                "duplicate output name; the archive entry will be shadowed"
            );
        }
    }

    fn record(
        &mut self,
        index: usize,
        filename: String,
        outcome: Result<OutputArtifact, BatchError>,
        stats: Option<&StatsCollector>,
    ) {
        match outcome {
            Ok(artifact) => self.artifacts.push(artifact),
            Err(error) => {
                warn!(target: "batch::controller", index, %filename, "item failed: {error}");
                if let Some(stats) = stats {
                    stats.record_failure();
                }
                self.failures.push(ItemFailure { index, filename: filename.clone(), error });
            }
        }
        self.last_filename = filename;
        self.progress.advance();
    }

    fn last_filename(&self) -> &str {
        &self.last_filename
    }

    fn finish(self, archive: Vec<u8>) -> BatchResult {
        BatchResult { artifacts: self.artifacts, failures: self.failures, archive }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{self, DecodedImage};
    use crate::fs::ZipArchiveWriter;
    use crate::types::ImageDimensions;
    use std::sync::Mutex;
    use std::sync::mpsc::{self, Receiver, Sender};

    /// Synthesises a solid image from the source's first byte instead of decoding.
    #[derive(Debug, Default)]
    struct StubCodec;

    impl ImageCodec for StubCodec {
        fn decode(&self, source: &SourceImage) -> codec::Result<DecodedImage> {
            match source.bytes().first() {
                Some(&side) if side > 0 => Ok(DecodedImage {
                    dimensions: ImageDimensions::new(u32::from(side), u32::from(side)),
                    pixels: vec![200; usize::from(side) * usize::from(side) * 4],
                }),
                _ => Err(anyhow::anyhow!("unreadable {}", source.name())),
            }
        }

        fn encode(&self, image: &DecodedImage, _quality: f32) -> codec::Result<Vec<u8>> {
            Ok(vec![1; image.width() as usize])
        }
    }

    /// Blocks the first decode until the test releases it.
    #[derive(Debug)]
    struct GateCodec {
        opened: AtomicBool,
        entered: Mutex<Sender<()>>,
        release: Mutex<Receiver<()>>,
    }

    impl ImageCodec for GateCodec {
        fn decode(&self, source: &SourceImage) -> codec::Result<DecodedImage> {
            if !self.opened.swap(true, Ordering::AcqRel) {
                self.entered.lock().unwrap().send(()).unwrap();
                self.release.lock().unwrap().recv().unwrap();
            }
            StubCodec.decode(source)
        }

        fn encode(&self, image: &DecodedImage, quality: f32) -> codec::Result<Vec<u8>> {
            StubCodec.encode(image, quality)
        }
    }

    #[derive(Debug, Default)]
    struct RejectingSink {
        added: Vec<String>,
    }

    impl ArchiveSink for RejectingSink {
        fn add(&mut self, filename: &str, _bytes: &[u8]) -> crate::Result<()> {
            if filename.starts_with("reject") {
                return Err(anyhow::anyhow!("disk full"));
            }
            self.added.push(filename.to_string());
            Ok(())
        }

        fn finalize(self) -> crate::Result<Vec<u8>> {
            Ok(self.added.join(",").into_bytes())
        }
    }

    fn stub(name: &str, side: u8) -> SourceImage {
        SourceImage::new(name, "image/x-stub", vec![side])
    }

    fn controller() -> BatchController<StubCodec> {
        BatchController::new(TransformEngine::new(StubCodec))
    }

    #[test]
    fn state_returns_to_idle_after_batch() {
        let controller = controller();
        assert_eq!(controller.state(), BatchState::Idle);

        let result = controller
            .start(&[stub("a.png", 8)], &ModeSettings::percent(50), ZipArchiveWriter::default(), |_| {
                assert!(controller.is_running());
            })
            .unwrap();

        assert_eq!(result.succeeded(), 1);
        assert_eq!(result.artifacts[0].dimensions, ImageDimensions::new(4, 4));
        assert_eq!(controller.state(), BatchState::Idle);
    }

    #[test]
    fn state_returns_to_idle_after_rejection() {
        let controller = controller();
        let err = controller
            .start(&[], &ModeSettings::percent(50), ZipArchiveWriter::default(), |_| {})
            .unwrap_err();
        assert!(matches!(err, BatchError::EmptyBatch));
        assert!(!controller.is_running());

        let err = controller
            .start(&[stub("a.png", 4)], &ModeSettings::fixed(0), ZipArchiveWriter::default(), |_| {})
            .unwrap_err();
        assert!(matches!(err, BatchError::InvalidSettings(_)));
        assert!(!controller.is_running());
    }

    #[test]
    fn rejects_second_start_while_running() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let controller = BatchController::new(TransformEngine::new(GateCodec {
            opened: AtomicBool::new(false),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        }));
        let sources = vec![stub("a.png", 4), stub("b.png", 6)];
        let settings = ModeSettings::quality(0.8);

        thread::scope(|scope| {
            let first = scope.spawn(|| {
                controller.start(&sources, &settings, ZipArchiveWriter::default(), |_| {})
            });

            entered_rx.recv().unwrap();
            assert!(controller.is_running());
            let err = controller
                .start(&sources, &settings, ZipArchiveWriter::default(), |_| {})
                .unwrap_err();
            assert!(matches!(err, BatchError::AlreadyProcessing));
            assert!(controller.is_running(), "rejected start must not reset the running batch");

            release_tx.send(()).unwrap();
            let result = first.join().unwrap().unwrap();
            assert_eq!(result.succeeded(), 2);
        });

        assert!(!controller.is_running());
    }

    #[test]
    fn cancel_stops_before_remaining_items() {
        let controller = controller();
        let sources = vec![stub("a.png", 4), stub("b.png", 4), stub("c.png", 4)];
        let mut seen = Vec::new();

        let result = controller
            .start(&sources, &ModeSettings::quality(0.5), ZipArchiveWriter::default(), |event| {
                seen.push(event.progress.completed_count);
                if event.index == 0 {
                    assert!(controller.cancel());
                }
            })
            .unwrap();

        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(result.succeeded(), 1);
        let cancelled: Vec<usize> = result
            .failures
            .iter()
            .filter(|failure| matches!(failure.error, BatchError::Cancelled))
            .map(|failure| failure.index)
            .collect();
        assert_eq!(cancelled, vec![1, 2]);
        assert!(!result.archive.is_empty());
        assert!(!controller.cancel(), "idle controller has nothing to cancel");
    }

    #[test]
    fn cancel_flag_does_not_leak_into_next_batch() {
        let controller = controller();
        let sources = vec![stub("a.png", 4), stub("b.png", 4)];
        controller
            .start(&sources, &ModeSettings::quality(0.5), ZipArchiveWriter::default(), |_| {
                controller.cancel();
            })
            .unwrap();

        let result = controller
            .start(&sources, &ModeSettings::quality(0.5), ZipArchiveWriter::default(), |_| {})
            .unwrap();
        assert_eq!(result.succeeded(), 2);
    }

    #[test]
    fn sink_rejection_is_an_item_failure() {
        let controller = controller();
        let sources = vec![stub("keep.png", 4), stub("reject.png", 4), stub("also.png", 4)];

        let result = controller
            .start(&sources, &ModeSettings::quality(0.9), RejectingSink::default(), |_| {})
            .unwrap();

        assert_eq!(result.succeeded(), 2);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].index, 1);
        assert!(matches!(result.failures[0].error, BatchError::ArchiveFailure(_)));
        assert_eq!(result.archive, b"keep_resize.png,also_resize.png");
    }

    #[test]
    fn oversized_output_fails_only_that_item() {
        let controller = controller();
        let sources = vec![stub("small.png", 1), stub("huge.png", 255), stub("also.png", 2)];
        let settings = ModeSettings::Percentage { factor: 300.0 };

        let result =
            controller.start(&sources, &settings, ZipArchiveWriter::default(), |_| {}).unwrap();

        assert_eq!(result.succeeded(), 2);
        assert_eq!(result.artifacts[0].dimensions, ImageDimensions::new(300, 300));
        assert_eq!(result.artifacts[1].dimensions, ImageDimensions::new(600, 600));
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].index, 1);
        assert!(matches!(result.failures[0].error, BatchError::CodecFailure(_)));
    }

    #[test]
    fn feeds_the_stats_collector() {
        let stats = Arc::new(StatsCollector::new());
        let controller = controller().with_stats(Arc::clone(&stats));
        let sources = vec![stub("a.png", 4), stub("broken.png", 0)];

        let result = controller
            .start(&sources, &ModeSettings::percent(100), ZipArchiveWriter::default(), |_| {})
            .unwrap();
        assert_eq!(result.summary(), "1 of 2 succeeded");

        let snap = stats.snapshot();
        assert_eq!(snap.batches, 1);
        assert_eq!(snap.items_succeeded, 1);
        assert_eq!(snap.items_failed, 1);
        assert_eq!(snap.bytes_in, 1);
        assert_eq!(snap.bytes_out, 4);
    }
}
