//! Shared animation scheduler
//!
//! One [`Scheduler`] drives every registered interactor once per animation
//! frame. It runs while at least one interactor is registered and keeps a
//! frame-rate estimate over one-second windows.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::interactor::{Interactor, Signal, Topic};

/// Interactor shared between its owner and the scheduler
pub type SharedInteractor = Arc<Mutex<Interactor>>;

/// Frame-rate estimation window in milliseconds
pub const FPS_WINDOW_MS: f64 = 1000.0;

/// Frame loop over registered interactors
#[derive(Debug, Default)]
pub struct Scheduler {
    subscribers: Vec<SharedInteractor>,
    fps: Option<u32>,
    fps_origin: f64,
    frames: u32,
}

impl Scheduler {
    /// Create an idle scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `interactor`. The first registration starts the loop and
    /// ticks immediately at `now`.
    pub fn add(&mut self, interactor: SharedInteractor, now: f64) {
        let id = interactor.lock().id();
        if self.contains(id) {
            return;
        }
        let first = self.subscribers.is_empty();
        self.subscribers.push(interactor.clone());
        if first {
            debug!("scheduler started");
            self.fps_origin = now;
            self.frames = 0;
            interactor.lock().tick(now);
        }
        interactor.lock().notify(Topic::TimerStart, &Signal::TimerStart);
    }

    /// Deregister the interactor with `id`. Returns whether it was
    /// registered.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let Some(index) = self.subscribers.iter().position(|s| s.lock().id() == id) else {
            return false;
        };
        let interactor = self.subscribers.remove(index);
        {
            let mut interactor = interactor.lock();
            let t = interactor.last_tick().unwrap_or(0.0) / 1000.0;
            interactor.notify(Topic::TimerEnd, &Signal::TimerEnd(t));
        }
        if self.subscribers.is_empty() {
            debug!("scheduler stopped");
            self.frames = 0;
        }
        true
    }

    /// Deregister `interactor`, then drop its listeners and stop its input
    pub fn teardown(&mut self, interactor: &SharedInteractor) {
        let id = interactor.lock().id();
        self.remove(id);
        interactor.lock().teardown();
    }

    /// One animation frame at `time` milliseconds
    pub fn tick(&mut self, time: f64) {
        if self.subscribers.is_empty() {
            return;
        }
        self.frames += 1;
        let elapsed = time - self.fps_origin;
        if elapsed > FPS_WINDOW_MS {
            let fps = (f64::from(self.frames) * 1000.0 / elapsed + 0.5).floor() as u32;
            self.fps_origin = time;
            self.frames = 0;
            if self.fps != Some(fps) {
                self.fps = Some(fps);
                for subscriber in &self.subscribers {
                    subscriber.lock().notify(Topic::Fps, &Signal::Fps(fps));
                }
            }
        }
        for subscriber in &self.subscribers {
            subscriber.lock().tick(time);
        }
    }

    /// Whether any interactor is registered
    pub fn is_running(&self) -> bool {
        !self.subscribers.is_empty()
    }

    /// Latest frame-rate estimate
    pub fn fps(&self) -> Option<u32> {
        self.fps
    }

    /// Number of registered interactors
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// No interactor registered
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Whether the interactor with `id` is registered
    pub fn contains(&self, id: Uuid) -> bool {
        self.subscribers.iter().any(|s| s.lock().id() == id)
    }
}
