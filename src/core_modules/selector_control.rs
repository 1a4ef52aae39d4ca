// THEORY:
// The selector is the only value shared between the control path (whoever the user is
// poking at) and the frame producer. It is one enumerated value, so it lives in a single
// `AtomicU8`: writes are last-write-wins, reads are a snapshot, and a read can never see
// half of a write. The producer takes one snapshot per frame, which is what keeps a
// selector change from landing halfway through a frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::info;

use crate::core_modules::transform_registry::TransformSelector;

/// A cloneable handle to the live selector. All clones share the same slot.
#[derive(Debug, Clone)]
pub struct SelectorControl {
    slot: Arc<AtomicU8>,
}

impl Default for SelectorControl {
    fn default() -> Self {
        Self::new(TransformSelector::default())
    }
}

impl SelectorControl {
    pub fn new(initial: TransformSelector) -> Self {
        Self {
            slot: Arc::new(AtomicU8::new(initial.index())),
        }
    }

    pub fn current(&self) -> TransformSelector {
        TransformSelector::from_index(self.slot.load(Ordering::Acquire))
    }

    /// Replaces the selector and returns the previous one.
    pub fn set(&self, selector: TransformSelector) -> TransformSelector {
        let previous = TransformSelector::from_index(self.slot.swap(selector.index(), Ordering::AcqRel));
        if previous != selector {
            info!("Filter switched: {} -> {}", previous, selector);
        }
        previous
    }

    /// Sets the selector from a control index. Unknown indices select `Identity`.
    pub fn set_index(&self, index: u8) -> TransformSelector {
        self.set(TransformSelector::from_index(index))
    }
}
