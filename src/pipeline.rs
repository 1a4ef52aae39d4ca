// THEORY:
// The `pipeline` module is the top-level, per-frame API of the simulator. A
// `FrameProcessor` takes one raw frame from whatever captured it and turns it into a
// `DisplayFrame`:
//
// 1.  Decode the raw buffer. A buffer that cannot be read as a pixel grid is skipped:
//     no output, a warning in the log, and the next frame is unaffected.
// 2.  Snapshot the live selector once. Everything after this uses the snapshot, so a
//     selector change can never be applied to only part of a frame.
// 3.  Resolve the snapshot through the registry. `Identity` forwards the decoded frame
//     as-is, without touching or copying its pixels.
// 4.  Otherwise render through the `FrameRenderer`. If rendering fails, the unfiltered
//     frame is forwarded instead, so the feed keeps moving.
// 5.  Tag the result with the sensor orientation for the display side.
//
// None of these failures escape the step. The worst visible outcome is one missing or
// one unfiltered frame.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{trace, warn};

use crate::core_modules::color_transform;
use crate::core_modules::frame::{DisplayFrame, Frame, Orientation, RawFrame};
use crate::core_modules::selector_control::SelectorControl;
use crate::core_modules::transform_registry::{Transform, TransformMatrix, TransformSelector, matrix_for};
use crate::error::FrameError;

/// Configuration for the FrameProcessor.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Rotation needed to show sensor frames upright.
    pub sensor_orientation: Orientation,
    /// Upper bound on threads used to render one frame.
    pub worker_threads: usize,
    /// Filter active before anyone touches the control.
    pub initial_selector: TransformSelector,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sensor_orientation: Orientation::Right,
            worker_threads: num_cpus::get(),
            initial_selector: TransformSelector::Protanopia,
        }
    }
}

/// Turns a frame and a matrix into a new, filtered frame.
pub trait FrameRenderer: Send {
    fn render(&self, frame: &Frame, matrix: &TransformMatrix) -> Result<Frame, FrameError>;
}

/// Renders on the CPU, splitting each frame into row bands across threads.
#[derive(Debug, Clone)]
pub struct CpuRenderer {
    workers: usize,
}

impl CpuRenderer {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }
}

impl FrameRenderer for CpuRenderer {
    fn render(&self, frame: &Frame, matrix: &TransformMatrix) -> Result<Frame, FrameError> {
        let data = color_transform::apply(frame, matrix, self.workers);
        frame.with_data(data)
    }
}

/// Live counters, shared by the processor and whoever presents its output.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    processed: AtomicU64,
    skipped: AtomicU64,
    fallbacks: AtomicU64,
    superseded: AtomicU64,
    presented: AtomicU64,
}

impl PipelineCounters {
    pub fn record_superseded(&self) {
        self.superseded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_presented(&self) {
        self.presented.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            processed: self.processed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            presented: self.presented.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Frames that produced output, including fallbacks.
    pub processed: u64,
    /// Frames dropped because their buffer could not be decoded.
    pub skipped: u64,
    /// Frames forwarded unfiltered because rendering failed.
    pub fallbacks: u64,
    /// Outputs replaced by a newer one before they were presented.
    pub superseded: u64,
    /// Outputs handed to a display sink.
    pub presented: u64,
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} skipped={} fallbacks={} superseded={} presented={}",
            self.processed, self.skipped, self.fallbacks, self.superseded, self.presented
        )
    }
}

/// The per-frame orchestrator.
pub struct FrameProcessor {
    config: PipelineConfig,
    selector: SelectorControl,
    renderer: Box<dyn FrameRenderer>,
    counters: Arc<PipelineCounters>,
    next_frame_id: u64,
}

impl FrameProcessor {
    pub fn new(config: PipelineConfig) -> Self {
        let renderer = CpuRenderer::new(config.worker_threads);
        Self::with_renderer(config, renderer)
    }

    pub fn with_renderer(config: PipelineConfig, renderer: impl FrameRenderer + 'static) -> Self {
        Self {
            selector: SelectorControl::new(config.initial_selector),
            config,
            renderer: Box::new(renderer),
            counters: Arc::new(PipelineCounters::default()),
            next_frame_id: 0,
        }
    }

    /// Reads the filter from an existing control instead of a private one.
    pub fn with_selector(mut self, selector: SelectorControl) -> Self {
        self.selector = selector;
        self
    }

    /// A handle for changing the filter from any thread.
    pub fn selector_control(&self) -> SelectorControl {
        self.selector.clone()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn counters(&self) -> Arc<PipelineCounters> {
        Arc::clone(&self.counters)
    }

    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    /// Processes one frame. `None` means the frame was skipped and nothing should be shown.
    pub fn process(&mut self, raw: RawFrame) -> Option<DisplayFrame> {
        let frame_id = self.next_frame_id;
        self.next_frame_id += 1;

        let frame = match Frame::decode(raw, frame_id) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Skipping frame {}: {}", frame_id, e);
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        let selector = self.selector.current();
        let (frame, applied) = match matrix_for(selector) {
            Transform::Identity => (frame, TransformSelector::Identity),
            Transform::Matrix(matrix) => match self.renderer.render(&frame, matrix) {
                Ok(filtered) => (filtered, selector),
                Err(e) => {
                    warn!("Showing frame {} unfiltered: {}", frame_id, e);
                    self.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
                    (frame, TransformSelector::Identity)
                }
            },
        };

        trace!("Frame {} processed with {:?}", frame_id, applied);
        self.counters.processed.fetch_add(1, Ordering::Relaxed);

        Some(DisplayFrame {
            frame,
            orientation: self.config.sensor_orientation,
            applied,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::frame::PixelFormat;
    use crate::core_modules::pixel::pixel::Pixel;

    fn config(selector: TransformSelector) -> PipelineConfig {
        PipelineConfig {
            initial_selector: selector,
            worker_threads: 2,
            ..PipelineConfig::default()
        }
    }

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RawFrame {
        let data = rgba.repeat((width * height) as usize);
        RawFrame::new(data, width, height, PixelFormat::Rgba8)
    }

    struct FailingRenderer;

    impl FrameRenderer for FailingRenderer {
        fn render(&self, _frame: &Frame, _matrix: &TransformMatrix) -> Result<Frame, FrameError> {
            Err(FrameError::Render("context lost".into()))
        }
    }

    /// Flips the selector while a frame is being rendered.
    struct MeddlingRenderer {
        selector: SelectorControl,
        inner: CpuRenderer,
    }

    impl FrameRenderer for MeddlingRenderer {
        fn render(&self, frame: &Frame, matrix: &TransformMatrix) -> Result<Frame, FrameError> {
            self.selector.set(TransformSelector::Identity);
            self.inner.render(frame, matrix)
        }
    }

    #[test]
    fn identity_forwards_the_same_buffer() {
        let mut processor = FrameProcessor::new(config(TransformSelector::Identity));
        let raw = solid(4, 3, [51, 102, 153, 200]);
        let ptr = raw.data.as_ptr();
        let expected = raw.data.clone();

        let output = processor.process(raw).expect("identity frame");
        assert_eq!(output.applied, TransformSelector::Identity);
        assert_eq!(output.frame.as_bytes().as_ptr(), ptr);
        assert_eq!(output.frame.as_bytes(), expected.as_slice());
    }

    #[test]
    fn identity_pixel_is_exact() {
        let mut processor = FrameProcessor::new(config(TransformSelector::Identity));
        let output = processor.process(solid(1, 1, [51, 102, 153, 255])).unwrap();
        // 51/255 = 0.2, 102/255 = 0.4, 153/255 = 0.6
        assert_eq!(output.frame.pixel(0, 0), Some(Pixel::from_bytes(51, 102, 153, 255)));
    }

    #[test]
    fn protanopia_filters_every_pixel() {
        let mut processor = FrameProcessor::new(config(TransformSelector::Protanopia));
        let output = processor.process(solid(5, 4, [255, 0, 0, 90])).unwrap();
        assert_eq!(output.applied, TransformSelector::Protanopia);
        for pixel in output.frame.as_bytes().chunks(4) {
            assert_eq!(pixel, [145, 142, 0, 90]);
        }
    }

    #[test]
    fn output_carries_sensor_orientation() {
        let mut processor = FrameProcessor::new(PipelineConfig {
            sensor_orientation: Orientation::Left,
            ..config(TransformSelector::Tritanopia)
        });
        let output = processor.process(solid(2, 2, [0, 0, 0, 255])).unwrap();
        assert_eq!(output.orientation, Orientation::Left);
    }

    #[test]
    fn malformed_buffer_produces_no_output() {
        let mut processor = FrameProcessor::new(config(TransformSelector::Deuteranopia));
        assert!(processor.process(RawFrame::new(Vec::new(), 640, 480, PixelFormat::Bgra8)).is_none());
        assert!(processor.process(RawFrame::new(vec![0; 10], 640, 480, PixelFormat::Bgra8)).is_none());
        let garbage_stride = RawFrame::with_stride(vec![0; 16], 2, 3, usize::MAX / 2 + 1, PixelFormat::Rgba8);
        assert!(processor.process(garbage_stride).is_none());

        // The next good frame is unaffected.
        let output = processor.process(solid(1, 1, [0, 255, 0, 255])).unwrap();
        assert_eq!(output.frame_id(), 3);
        let stats = processor.stats();
        assert_eq!((stats.skipped, stats.processed), (3, 1));
    }

    #[test]
    fn render_failure_falls_back_to_unfiltered() {
        let mut processor = FrameProcessor::with_renderer(config(TransformSelector::Protanopia), FailingRenderer);
        let raw = solid(3, 3, [10, 20, 30, 40]);
        let expected = raw.data.clone();

        let output = processor.process(raw).expect("fallback keeps the frame");
        assert_eq!(output.applied, TransformSelector::Identity);
        assert_eq!(output.frame.as_bytes(), expected.as_slice());
        assert_eq!(processor.stats().fallbacks, 1);
    }

    #[test]
    fn selector_switch_applies_to_the_next_frame() {
        let mut processor = FrameProcessor::new(config(TransformSelector::Protanopia));
        let control = processor.selector_control();

        let first = processor.process(solid(2, 2, [255, 0, 0, 255])).unwrap();
        control.set(TransformSelector::Identity);
        let second = processor.process(solid(2, 2, [255, 0, 0, 255])).unwrap();

        assert_eq!(first.applied, TransformSelector::Protanopia);
        assert_eq!(first.frame.as_bytes()[..4], [145, 142, 0, 255]);
        assert_eq!(second.applied, TransformSelector::Identity);
        assert_eq!(second.frame.as_bytes()[..4], [255, 0, 0, 255]);
    }

    #[test]
    fn selector_switch_mid_frame_is_not_observed() {
        let cfg = config(TransformSelector::Protanopia);
        let control = SelectorControl::new(cfg.initial_selector);
        let renderer = MeddlingRenderer {
            selector: control.clone(),
            inner: CpuRenderer::new(4),
        };
        let mut processor = FrameProcessor::with_renderer(cfg, renderer).with_selector(control.clone());

        let output = processor.process(solid(8, 8, [255, 0, 0, 255])).unwrap();
        assert_eq!(output.applied, TransformSelector::Protanopia);
        assert!(output.frame.as_bytes().chunks(4).all(|p| p == [145, 142, 0, 255]));
        assert_eq!(control.current(), TransformSelector::Identity);
    }
}
