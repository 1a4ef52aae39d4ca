// THEORY:
// This file is the entry point for the `dichroma_vision` library crate. It exposes the
// per-frame `FrameProcessor` (`pipeline`) and the producer/presentation wiring around it
// (`live_pipeline`) as the public API. The building blocks in `core_modules` (pixels,
// frames, the transform registry, the color math, the shared selector and the
// latest-wins frame slot) are public too, for callers that want to drive them directly.
//
// Capture devices, windows and user controls are not part of this crate. They plug in
// as a `Stream` of `RawFrame`s, a `DisplaySink`, and a `SelectorControl` handle.

pub mod core_modules;
pub mod error;
pub mod live_pipeline;
pub mod pipeline;

pub use crate::core_modules::frame::{DisplayFrame, Frame, Orientation, PixelFormat, RawFrame};
pub use crate::core_modules::frame_slot::FrameSlot;
pub use crate::core_modules::selector_control::SelectorControl;
pub use crate::core_modules::transform_registry::{Transform, TransformMatrix, TransformSelector, matrix_for};
pub use crate::error::{DecodeError, FrameError};
pub use crate::live_pipeline::{DisplaySink, LivePipeline};
pub use crate::pipeline::{CpuRenderer, FrameProcessor, FrameRenderer, PipelineConfig, PipelineStats};
