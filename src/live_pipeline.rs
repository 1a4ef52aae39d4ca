// THEORY:
// `live_pipeline` wires a `FrameProcessor` between a frame source and a display sink
// while keeping them on separate execution contexts:
//
// - The producer context is a dedicated blocking thread. It pulls raw frames from the
//   source stream in arrival order, runs the per-frame step, and posts the result into
//   a `FrameSlot`. Posting never waits for the display.
// - The presentation context is whoever calls `present_into`. It takes the newest
//   pending frame from the slot and hands it to the `DisplaySink`.
//
// When the display is slower than the source, pending outputs are replaced rather than
// queued, so at most one finished frame ever waits for presentation. The source may stall
// or end at any time; ending it closes the slot and lets presentation drain and return.
// Closing the slot from the presentation side stops the producer even while the source
// is stalled.
//
// `DisplaySink::present` is synchronous and runs on the task that calls `present_into`.
// A sink that blocks (a GUI event pump, a video encoder) should be driven from a context
// it may own exclusively, such as the main task or a dedicated thread, not from a task
// sharing a small runtime with other latency-sensitive work.

use std::ops::ControlFlow;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info};

use crate::core_modules::frame::{DisplayFrame, RawFrame};
use crate::core_modules::frame_slot::FrameSlot;
use crate::pipeline::{FrameProcessor, PipelineCounters, PipelineStats};

/// Receives finished frames for presentation.
pub trait DisplaySink {
    /// Shows one frame. Returning `Break` stops the pipeline.
    fn present(&mut self, frame: DisplayFrame) -> ControlFlow<()>;
}

impl<F> DisplaySink for F
where
    F: FnMut(DisplayFrame) -> ControlFlow<()>,
{
    fn present(&mut self, frame: DisplayFrame) -> ControlFlow<()> {
        self(frame)
    }
}

/// A running producer plus the slot it posts into.
pub struct LivePipeline {
    slot: FrameSlot,
    counters: Arc<PipelineCounters>,
    producer: JoinHandle<FrameProcessor>,
}

impl LivePipeline {
    /// Starts consuming `source` on a dedicated producer thread. Must be called from
    /// within a tokio runtime.
    pub fn spawn<S>(mut processor: FrameProcessor, source: S) -> Self
    where
        S: Stream<Item = RawFrame> + Send + Unpin + 'static,
    {
        let slot = FrameSlot::new();
        let counters = processor.counters();
        let runtime = Handle::current();

        let producer_slot = slot.clone();
        let producer_counters = Arc::clone(&counters);
        let producer = tokio::task::spawn_blocking(move || {
            let mut source = source;
            info!("Frame producer started");
            runtime.block_on(async {
                loop {
                    // A stalled source must not keep the producer alive past `close`.
                    let raw = tokio::select! {
                        biased;
                        _ = producer_slot.closed() => break,
                        next = source.next() => match next {
                            Some(raw) => raw,
                            None => break,
                        },
                    };
                    let Some(output) = processor.process(raw) else {
                        continue;
                    };
                    if let Some(dropped) = producer_slot.post(output) {
                        debug!("Frame {} superseded before presentation", dropped.frame_id());
                        producer_counters.record_superseded();
                    }
                }
            });
            producer_slot.close();
            info!("Frame producer stopped: {}", processor.stats());
            processor
        });

        Self {
            slot,
            counters,
            producer,
        }
    }

    /// The slot finished frames are posted into.
    pub fn slot(&self) -> &FrameSlot {
        &self.slot
    }

    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    /// Presents frames until the source ends or the sink asks to stop.
    ///
    /// The sink runs inline on the calling task, so this call is meant to own its
    /// presentation context for as long as it runs.
    pub async fn present_into<D: DisplaySink>(&self, sink: &mut D) {
        while let Some(frame) = self.slot.next().await {
            self.counters.record_presented();
            if sink.present(frame).is_break() {
                info!("Display sink requested stop");
                self.slot.close();
                break;
            }
        }
    }

    /// Stops accepting frames and waits for the producer, returning the processor.
    /// Returns even if the source is stalled; a frame already being processed is
    /// finished first.
    pub async fn finish(self) -> Result<FrameProcessor, JoinError> {
        self.slot.close();
        self.producer.await
    }
}
