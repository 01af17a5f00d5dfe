//! Frames-in-flight bookkeeping
//!
//! Each slot cycles `Idle -> Acquiring -> Recording -> Submitted -> Presenting
//! -> Idle`. A slot's fence is always waited before anything the GPU may still
//! read for that slot is rewritten, and the ring advances only after a frame
//! was handed to presentation.

/// Number of frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// What one scheduler tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was submitted and queued for presentation
    Presented,
    /// The swapchain was rebuilt; nothing was drawn
    Recreated,
    /// The window has no drawable area; nothing was drawn
    Skipped,
}

/// CPU-visible completion signal of one slot's submission
pub trait SlotFence {
    /// Error raised by the underlying API
    type Error;

    /// Block until the slot's last submission has completed
    fn wait(&self) -> Result<(), Self::Error>;

    /// Return the fence to the unsignaled state before a new submission
    fn reset(&self) -> Result<(), Self::Error>;
}

/// Lifecycle position of a frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Not in use by the CPU
    Idle,
    /// Fence waited; acquiring a swapchain image
    Acquiring,
    /// Fence reset; commands and uniforms being written
    Recording,
    /// Work handed to the graphics queue
    Submitted,
    /// Image handed to the presentation queue
    Presenting,
}

struct Slot<S> {
    sync: S,
    state: SlotState,
    fence_waited: bool,
    /// Fence reset with no submission behind it; waiting would never return
    disarmed: bool,
}

/// Fixed ring of per-frame synchronization sets
pub struct FrameRing<S> {
    slots: Vec<Slot<S>>,
    current: usize,
}

impl<S: SlotFence> FrameRing<S> {
    /// Build [`MAX_FRAMES_IN_FLIGHT`] slots with `create(slot_index)`
    pub fn new<E>(mut create: impl FnMut(usize) -> Result<S, E>) -> Result<Self, E> {
        let slots = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|index| {
                Ok(Slot {
                    sync: create(index)?,
                    state: SlotState::Idle,
                    fence_waited: false,
                    disarmed: false,
                })
            })
            .collect::<Result<Vec<_>, E>>()?;
        Ok(Self { slots, current: 0 })
    }

    /// Number of slots
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false; a ring has at least one slot
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Index of the slot the next frame uses
    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current
    }

    /// Synchronization objects of the current slot
    #[must_use]
    pub fn current(&self) -> &S {
        &self.slots[self.current].sync
    }

    /// Synchronization objects of the current slot, for replacing parts of it
    pub fn current_mut(&mut self) -> &mut S {
        &mut self.slots[self.current].sync
    }

    /// Lifecycle position of slot `index`
    #[must_use]
    pub fn state(&self, index: usize) -> SlotState {
        self.slots[index].state
    }

    /// Wait for the current slot's previous submission and start a frame
    pub fn begin_frame(&mut self) -> Result<usize, S::Error> {
        let slot = &mut self.slots[self.current];
        debug_assert_eq!(slot.state, SlotState::Idle, "frame slot reused while busy");
        if !slot.disarmed {
            slot.sync.wait()?;
        }
        slot.fence_waited = true;
        slot.state = SlotState::Acquiring;
        Ok(self.current)
    }

    /// Drop the frame before anything was submitted.
    ///
    /// The fence was not reset, so the next `begin_frame` on this slot does
    /// not block.
    pub fn abandon_frame(&mut self) {
        let slot = &mut self.slots[self.current];
        debug_assert_eq!(slot.state, SlotState::Acquiring);
        slot.state = SlotState::Idle;
        slot.fence_waited = false;
    }

    /// Reset the fence; the slot's resources may now be rewritten
    pub fn begin_recording(&mut self) -> Result<(), S::Error> {
        let slot = &mut self.slots[self.current];
        debug_assert_eq!(slot.state, SlotState::Acquiring);
        slot.sync.reset()?;
        slot.disarmed = true;
        slot.state = SlotState::Recording;
        Ok(())
    }

    /// Drop the frame after a failure between acquisition and submission.
    ///
    /// The slot goes back to idle without advancing the ring. If its fence was
    /// already reset, nothing will ever signal it, so later waits on this slot
    /// are skipped until a submission re-arms it.
    pub fn fail_frame(&mut self) {
        let slot = &mut self.slots[self.current];
        debug_assert!(matches!(slot.state, SlotState::Acquiring | SlotState::Recording));
        slot.state = SlotState::Idle;
        slot.fence_waited = false;
    }

    /// Slot whose uniforms may be written now.
    ///
    /// # Panics
    /// When called outside recording or before the slot's fence was waited.
    #[must_use]
    pub fn writable_slot(&self) -> usize {
        let slot = &self.slots[self.current];
        assert!(
            slot.state == SlotState::Recording && slot.fence_waited,
            "frame slot {} written before its fence was waited",
            self.current
        );
        self.current
    }

    /// Work for the current slot was submitted
    pub fn mark_submitted(&mut self) {
        let slot = &mut self.slots[self.current];
        debug_assert_eq!(slot.state, SlotState::Recording);
        slot.disarmed = false;
        slot.state = SlotState::Submitted;
    }

    /// The current slot's image was queued for presentation
    pub fn mark_presenting(&mut self) {
        let slot = &mut self.slots[self.current];
        debug_assert_eq!(slot.state, SlotState::Submitted);
        slot.state = SlotState::Presenting;
    }

    /// Close the frame and move to the next slot
    pub fn finish_frame(&mut self) {
        let slot = &mut self.slots[self.current];
        debug_assert_eq!(slot.state, SlotState::Presenting);
        slot.state = SlotState::Idle;
        slot.fence_waited = false;
        self.current = (self.current + 1) % self.slots.len();
    }

    /// Block until every slot's last submission has completed.
    ///
    /// A slot whose fence was reset with nothing submitted behind it, mid
    /// recording or after a failed frame, is skipped.
    pub fn wait_all(&self) -> Result<(), S::Error> {
        for slot in &self.slots {
            if !slot.disarmed {
                slot.sync.wait()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Fence whose pending work completes the moment someone waits on it
    struct MockFence {
        index: usize,
        signaled: Cell<bool>,
        log: Log,
    }

    impl SlotFence for MockFence {
        type Error = ();

        fn wait(&self) -> Result<(), ()> {
            if !self.signaled.get() {
                self.log.borrow_mut().push(format!("gpu done {}", self.index));
                self.signaled.set(true);
            }
            self.log.borrow_mut().push(format!("wait {}", self.index));
            Ok(())
        }

        fn reset(&self) -> Result<(), ()> {
            self.signaled.set(false);
            self.log.borrow_mut().push(format!("reset {}", self.index));
            Ok(())
        }
    }

    fn ring() -> (FrameRing<MockFence>, Log) {
        let log = Log::default();
        let ring = FrameRing::new(|index| {
            Ok::<_, ()>(MockFence {
                index,
                signaled: Cell::new(true),
                log: Rc::clone(&log),
            })
        })
        .unwrap();
        (ring, log)
    }

    fn run_frame(ring: &mut FrameRing<MockFence>) -> usize {
        let slot = ring.begin_frame().unwrap();
        ring.begin_recording().unwrap();
        let written = ring.writable_slot();
        ring.mark_submitted();
        ring.mark_presenting();
        ring.finish_frame();
        assert_eq!(slot, written);
        slot
    }

    #[test]
    fn test_ring_has_fixed_slot_count() {
        let (ring, _) = ring();
        assert_eq!(ring.len(), MAX_FRAMES_IN_FLIGHT);
        assert!((0..ring.len()).all(|i| ring.state(i) == SlotState::Idle));
    }

    #[test]
    fn test_slots_wrap_around() {
        let (mut ring, _) = ring();
        let used: Vec<_> = (0..5).map(|_| run_frame(&mut ring)).collect();
        assert_eq!(used, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_fence_waited_before_reset_each_frame() {
        let (mut ring, log) = ring();
        for _ in 0..3 {
            run_frame(&mut ring);
        }

        let log = log.borrow();
        for slot in 0..MAX_FRAMES_IN_FLIGHT {
            let events: Vec<_> = log
                .iter()
                .filter(|entry| entry.ends_with(&slot.to_string()) && !entry.starts_with("gpu"))
                .cloned()
                .collect();
            for pair in events.chunks(2) {
                assert_eq!(pair[0], format!("wait {slot}"));
                assert_eq!(pair[1], format!("reset {slot}"));
            }
        }
    }

    #[test]
    #[should_panic(expected = "written before its fence was waited")]
    fn test_write_without_recording_panics() {
        let (ring, _) = ring();
        let _ = ring.writable_slot();
    }

    #[test]
    fn test_abandoned_frame_reuses_slot_without_blocking() {
        let (mut ring, log) = ring();
        assert_eq!(ring.begin_frame().unwrap(), 0);
        ring.abandon_frame();

        assert_eq!(ring.current_index(), 0);
        assert_eq!(ring.begin_frame().unwrap(), 0);
        assert!(!log.borrow().iter().any(|entry| entry.starts_with("gpu")));
    }

    #[test]
    fn test_wait_all_blocks_on_in_flight_slot_before_teardown() {
        let (mut ring, log) = ring();
        run_frame(&mut ring);
        // Slot 0's fence is unsignaled: its work is still on the GPU.

        ring.wait_all().unwrap();
        log.borrow_mut().push("destroy swapchain".to_string());

        let log = log.borrow();
        let gpu_done = log.iter().position(|e| e == "gpu done 0").unwrap();
        let destroy = log.iter().position(|e| e == "destroy swapchain").unwrap();
        assert!(gpu_done < destroy);
    }

    #[test]
    fn test_recreate_on_slot_one_waits_for_its_fence() {
        let (mut ring, log) = ring();
        for _ in 0..3 {
            run_frame(&mut ring);
        }
        assert_eq!(ring.current_index(), 1);

        ring.wait_all().unwrap();
        log.borrow_mut().push("destroy swapchain".to_string());

        let log = log.borrow();
        let destroy = log.iter().position(|e| e == "destroy swapchain").unwrap();
        for slot in 0..MAX_FRAMES_IN_FLIGHT {
            let done = log
                .iter()
                .rposition(|e| *e == format!("gpu done {slot}"))
                .unwrap();
            assert!(done < destroy);
        }
    }

    #[test]
    fn test_failed_frame_skips_waits_on_its_reset_fence() {
        let (mut ring, log) = ring();
        assert_eq!(ring.begin_frame().unwrap(), 0);
        ring.begin_recording().unwrap();
        ring.fail_frame();

        assert_eq!(ring.state(0), SlotState::Idle);
        assert_eq!(ring.current_index(), 0);

        log.borrow_mut().clear();
        ring.wait_all().unwrap();
        assert_eq!(ring.begin_frame().unwrap(), 0);
        assert!(!log.borrow().iter().any(|entry| entry == "wait 0"));

        ring.begin_recording().unwrap();
        let _ = ring.writable_slot();
        ring.mark_submitted();
        ring.mark_presenting();
        ring.finish_frame();
        run_frame(&mut ring);

        // The successful submission re-armed slot 0.
        log.borrow_mut().clear();
        assert_eq!(ring.begin_frame().unwrap(), 0);
        assert_eq!(*log.borrow(), vec!["gpu done 0".to_string(), "wait 0".to_string()]);
    }

    #[test]
    fn test_failure_before_reset_still_waits_next_time() {
        let (mut ring, log) = ring();
        run_frame(&mut ring);
        run_frame(&mut ring);
        assert_eq!(ring.begin_frame().unwrap(), 0);
        ring.fail_frame();

        log.borrow_mut().clear();
        assert_eq!(ring.begin_frame().unwrap(), 0);
        assert_eq!(*log.borrow(), vec!["wait 0".to_string()]);
    }
}
