//! The presenter thread and the frame handoff.
//!
//! Rendering is double buffered: the producer composes into one frame
//! buffer while the presenter blits the other to the terminal. The handoff
//! is a condvar pair - "frame ready" wakes the presenter, "frame consumed"
//! releases the producer - so a frame submission blocks only until the
//! *previous* presentation has finished, never for its own.
//!
//! Ordering contract: everything the producer wrote into a frame before
//! submitting it happens-before the presenter callback reads it, and the
//! callback's completion happens-before the producer composes into that
//! buffer again. Both edges come from the state mutex.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crate::render::framebuffer::FrameBuffer;
use crate::render::RenderError;

/// Invoked on the presenter thread with the presentable frame; expected to
/// emit its glyphs to the terminal.
pub type RenderCallback = Box<dyn FnMut(&FrameBuffer) + Send>;

struct PresentState {
    /// Frame submitted but not yet picked up by the presenter.
    pending: Option<Arc<Mutex<FrameBuffer>>>,
    /// True from submission until the callback has returned.
    busy: bool,
}

struct PresentShared {
    state: Mutex<PresentState>,
    frame_ready: Condvar,
    frame_done: Condvar,
    running: AtomicBool,
}

/// Owns the presenter thread. Dropping waits out any in-flight present,
/// then stops and joins the thread.
pub(crate) struct Presenter {
    shared: Arc<PresentShared>,
    thread: Option<JoinHandle<()>>,
}

impl Presenter {
    pub(crate) fn spawn(callback: RenderCallback) -> Result<Self, RenderError> {
        let shared = Arc::new(PresentShared {
            state: Mutex::new(PresentState {
                pending: None,
                busy: false,
            }),
            frame_ready: Condvar::new(),
            frame_done: Condvar::new(),
            running: AtomicBool::new(true),
        });

        let thread = thread::Builder::new()
            .name("presenter".into())
            .spawn({
                let shared = Arc::clone(&shared);
                move || run(shared, callback)
            })
            .map_err(RenderError::PresenterSpawn)?;

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// Hand a frame to the presenter. Blocks while the previous
    /// presentation is still in flight, then signals and returns without
    /// waiting for this one.
    pub(crate) fn submit(&self, frame: Arc<Mutex<FrameBuffer>>) {
        let mut state = self.shared.state.lock().unwrap();
        while state.busy {
            state = self.shared.frame_done.wait(state).unwrap();
        }
        state.pending = Some(frame);
        state.busy = true;
        drop(state);
        self.shared.frame_ready.notify_one();
    }

    /// Block until no presentation is in flight.
    pub(crate) fn wait_idle(&self) {
        let mut state = self.shared.state.lock().unwrap();
        while state.busy {
            state = self.shared.frame_done.wait(state).unwrap();
        }
    }
}

impl Drop for Presenter {
    fn drop(&mut self) {
        self.wait_idle();
        self.shared.running.store(false, Ordering::Release);
        self.shared.frame_ready.notify_all();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run(shared: Arc<PresentShared>, mut callback: RenderCallback) {
    loop {
        let frame = {
            let mut state = shared.state.lock().unwrap();
            loop {
                if let Some(frame) = state.pending.take() {
                    break frame;
                }
                if !shared.running.load(Ordering::Acquire) {
                    return;
                }
                state = shared.frame_ready.wait(state).unwrap();
            }
        };

        callback(&frame.lock().unwrap());

        let mut state = shared.state.lock().unwrap();
        state.busy = false;
        drop(state);
        shared.frame_done.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn frame() -> Arc<Mutex<FrameBuffer>> {
        Arc::new(Mutex::new(FrameBuffer::new(2, 2).expect("allocation")))
    }

    #[test]
    fn callback_runs_once_per_submission() {
        let count = Arc::new(AtomicUsize::new(0));
        let presenter = {
            let count = Arc::clone(&count);
            Presenter::spawn(Box::new(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            }))
            .expect("spawn")
        };

        let frame = frame();
        presenter.submit(Arc::clone(&frame));
        presenter.submit(Arc::clone(&frame));
        presenter.wait_idle();

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn submit_waits_for_the_previous_present_only() {
        // A slow callback: the second submit must wait for the first
        // presentation, and afterwards exactly one present is in flight.
        let count = Arc::new(AtomicUsize::new(0));
        let presenter = {
            let count = Arc::clone(&count);
            Presenter::spawn(Box::new(move |_| {
                thread::sleep(Duration::from_millis(20));
                count.fetch_add(1, Ordering::SeqCst);
            }))
            .expect("spawn")
        };

        let frame = frame();
        presenter.submit(Arc::clone(&frame));
        presenter.submit(Arc::clone(&frame));
        assert!(count.load(Ordering::SeqCst) >= 1);

        presenter.wait_idle();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn frame_writes_are_visible_to_the_callback() {
        let seen = Arc::new(AtomicUsize::new(0));
        let presenter = {
            let seen = Arc::clone(&seen);
            Presenter::spawn(Box::new(move |fb: &FrameBuffer| {
                seen.store(fb.pattern(0, 0) as usize, Ordering::SeqCst);
            }))
            .expect("spawn")
        };

        let frame = frame();
        frame.lock().unwrap().set_pattern(0, 0, 0x2A, 0x100, 0xFF);
        presenter.submit(Arc::clone(&frame));
        presenter.wait_idle();

        assert_eq!(seen.load(Ordering::SeqCst), 0x2A);
    }

    #[test]
    fn drop_without_submissions_terminates_cleanly() {
        let presenter = Presenter::spawn(Box::new(|_| {})).expect("spawn");
        drop(presenter);
    }
}
