// THEORY:
// The `FrameSlot` is the hand-off between the producer (which processes frames) and the
// presentation side (which shows them). It holds at most one frame.
//
// - `post` never blocks. If the presentation side has not picked up the previous frame
//   yet, the new one replaces it and the old one is returned to the caller as dropped.
// - `next` waits until a frame is pending or the slot is closed.
// - `closed` waits only for the close, so a producer stuck on a stalled source can
//   still notice it.
//
// That is the latest-frame-wins policy: bounded memory (one frame waiting, one being
// processed), bounded latency, and frames can only ever be seen in the order they were
// posted because an older frame can never replace a newer one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::core_modules::frame::DisplayFrame;

#[derive(Default)]
struct SlotState {
    frame: Option<DisplayFrame>,
    closed: bool,
}

#[derive(Default)]
struct SlotInner {
    state: Mutex<SlotState>,
    notify: Notify,
    on_close: Notify,
}

/// A single-frame, latest-wins mailbox. Clones share the same slot.
#[derive(Clone, Default)]
pub struct FrameSlot {
    inner: Arc<SlotInner>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SlotState> {
        // The state is a plain Option and flag, always left consistent.
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes `frame` the pending frame, returning the one it superseded, if any.
    /// Frames posted after `close` are handed straight back.
    pub fn post(&self, frame: DisplayFrame) -> Option<DisplayFrame> {
        let superseded = {
            let mut state = self.state();
            if state.closed {
                return Some(frame);
            }
            state.frame.replace(frame)
        };
        self.inner.notify.notify_one();
        superseded
    }

    /// Takes the pending frame without waiting.
    pub fn take(&self) -> Option<DisplayFrame> {
        self.state().frame.take()
    }

    /// Number of frames waiting for presentation: 0 or 1.
    pub fn pending(&self) -> usize {
        usize::from(self.state().frame.is_some())
    }

    /// Stops accepting frames. A frame already pending can still be taken.
    pub fn close(&self) {
        self.state().closed = true;
        self.inner.notify.notify_one();
        self.inner.on_close.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Waits for the next pending frame. Returns `None` once the slot is closed and drained.
    pub async fn next(&self) -> Option<DisplayFrame> {
        loop {
            {
                let mut state = self.state();
                if let Some(frame) = state.frame.take() {
                    return Some(frame);
                }
                if state.closed {
                    return None;
                }
            }
            self.inner.notify.notified().await;
        }
    }

    /// Resolves once the slot is closed.
    pub async fn closed(&self) {
        loop {
            // Registered before the check so a concurrent `close` cannot be missed.
            let notified = self.inner.on_close.notified();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::frame::{Frame, Orientation, PixelFormat, RawFrame};
    use crate::core_modules::transform_registry::TransformSelector;
    use std::time::Duration;

    fn display(frame_id: u64) -> DisplayFrame {
        let frame = Frame::decode(RawFrame::new(vec![0; 4], 1, 1, PixelFormat::Rgba8), frame_id).unwrap();
        DisplayFrame {
            frame,
            orientation: Orientation::Up,
            applied: TransformSelector::Identity,
        }
    }

    #[test]
    fn newer_frame_supersedes_pending_one() {
        let slot = FrameSlot::new();
        assert!(slot.post(display(0)).is_none());
        let dropped = slot.post(display(1)).expect("frame 0 should be dropped");
        assert_eq!(dropped.frame_id(), 0);
        assert_eq!(slot.pending(), 1);
        assert_eq!(slot.take().map(|f| f.frame_id()), Some(1));
        assert_eq!(slot.pending(), 0);
    }

    #[test]
    fn closed_slot_rejects_posts_but_drains() {
        let slot = FrameSlot::new();
        slot.post(display(4));
        slot.close();
        assert_eq!(slot.post(display(5)).map(|f| f.frame_id()), Some(5));
        assert_eq!(slot.take().map(|f| f.frame_id()), Some(4));
    }

    #[tokio::test]
    async fn next_waits_for_a_post() {
        let slot = FrameSlot::new();
        let producer = slot.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            producer.post(display(7));
            producer.close();
        });
        assert_eq!(slot.next().await.map(|f| f.frame_id()), Some(7));
        assert!(slot.next().await.is_none());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn closed_wakes_every_waiter() {
        let slot = FrameSlot::new();
        let waiters: Vec<_> = (0..2)
            .map(|_| {
                let slot = slot.clone();
                tokio::spawn(async move { slot.closed().await })
            })
            .collect();
        tokio::task::yield_now().await;
        slot.close();
        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter missed the close")
                .unwrap();
        }
        // Already closed: returns at once.
        slot.closed().await;
    }
}
