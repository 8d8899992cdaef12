use parking_lot::Mutex;

use crate::common::config::FrameId;

#[derive(Clone, Copy)]
struct FrameFlags {
    pinned: bool,
    referenced: bool,
}

struct ClockState {
    frames: Vec<FrameFlags>,
    hand: usize,
    /// Number of frames currently eligible for victimization.
    unpinned: usize,
}

/// ClockReplacer picks eviction victims among unpinned frames, approximating
/// LRU with a single reference bit per frame. The hand sweeps the frame
/// array cyclically: pinned frames are skipped, referenced frames lose their
/// bit and get a second chance, and the first unreferenced unpinned frame is
/// taken. The hand position persists across calls so eviction stays fair.
pub struct ClockReplacer {
    state: Mutex<ClockState>,
}

impl ClockReplacer {
    /// Creates a replacer tracking `num_pages` frames. Fresh frames count as
    /// pinned; they enter the victim pool only after an explicit `unpin`.
    pub fn new(num_pages: usize) -> Self {
        Self {
            state: Mutex::new(ClockState {
                frames: vec![
                    FrameFlags {
                        pinned: true,
                        referenced: false,
                    };
                    num_pages
                ],
                hand: 0,
                unpinned: 0,
            }),
        }
    }

    /// Selects a victim frame, marks it pinned, and returns its id. Returns
    /// `None` when every frame is pinned.
    pub fn victim(&self) -> Option<FrameId> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        while state.unpinned > 0 {
            state.hand %= state.frames.len();
            let hand = state.hand;
            if state.frames[hand].pinned {
                state.hand += 1;
            } else if state.frames[hand].referenced {
                state.frames[hand].referenced = false;
                state.hand += 1;
            } else {
                state.frames[hand].pinned = true;
                state.unpinned -= 1;
                state.hand += 1;
                return Some(hand);
            }
        }
        None
    }

    /// Removes the frame from the victim pool. Idempotent; out-of-range ids
    /// are ignored.
    pub fn pin(&self, frame_id: FrameId) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if frame_id >= state.frames.len() {
            return;
        }
        if state.frames[frame_id].pinned {
            return;
        }
        state.frames[frame_id].pinned = true;
        state.unpinned -= 1;
    }

    /// Returns the frame to the victim pool and grants it a reference bit.
    /// Out-of-range ids are ignored.
    pub fn unpin(&self, frame_id: FrameId) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if frame_id >= state.frames.len() {
            return;
        }
        if state.frames[frame_id].pinned {
            state.unpinned += 1;
        }
        state.frames[frame_id].pinned = false;
        state.frames[frame_id].referenced = true;
    }

    /// Number of frames currently eligible for victimization.
    pub fn size(&self) -> usize {
        self.state.lock().unpinned
    }
}
