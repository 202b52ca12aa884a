use std::cell::Cell;
use std::rc::Rc;

use cfg_if::cfg_if;
use tracing::warn;

use crate::error::{Result, SceneError};

/// Simulation time of one frame, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTime {
    /// Time since the first frame.
    pub t: f32,
    /// Time since the previous frame.
    pub dt: f32,
}

/// Wall-clock milliseconds.
pub trait TimeSource {
    fn now_ms(&self) -> f64;
}

/// Monotonic milliseconds: `performance.now()` in the browser, an
/// `Instant` anchor natively.
pub struct WallClock {
    #[cfg(not(target_arch = "wasm32"))]
    start: std::time::Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_arch = "wasm32"))]
            start: std::time::Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for WallClock {
    fn now_ms(&self) -> f64 {
        cfg_if! {
            if #[cfg(target_arch = "wasm32")] {
                web_sys::window()
                    .and_then(|w| w.performance())
                    .map(|p| p.now())
                    .unwrap_or_else(js_sys::Date::now)
            } else {
                self.start.elapsed().as_secs_f64() * 1000.0
            }
        }
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualTime(Rc<Cell<f64>>);

impl ManualTime {
    pub fn new(start_ms: f64) -> Self {
        Self(Rc::new(Cell::new(start_ms)))
    }

    pub fn set(&self, ms: f64) {
        self.0.set(ms);
    }

    pub fn advance(&self, ms: f64) {
        self.0.set(self.0.get() + ms);
    }
}

impl TimeSource for ManualTime {
    fn now_ms(&self) -> f64 {
        self.0.get()
    }
}

pub struct FrameClock {
    source: Box<dyn TimeSource>,
    first_ms: f64,
    last_ms: f64,
    max_dt: f64,
}

impl FrameClock {
    /// Starts counting at construction.
    pub fn new(source: Box<dyn TimeSource>, max_dt: f64) -> Self {
        let now = source.now_ms();
        Self {
            source,
            first_ms: now,
            last_ms: now,
            max_dt,
        }
    }

    /// Start counting again from now.
    pub fn restart(&mut self) {
        let now = self.source.now_ms();
        self.first_ms = now;
        self.last_ms = now;
    }

    pub fn tick(&mut self) -> Result<FrameTime> {
        let now = self.source.now_ms();
        let mut dt = (now - self.last_ms) / 1000.0;
        if !dt.is_finite() || dt < 0.0 {
            // Rebase on a finite reading so only this frame is lost and
            // `t` carries on from where it was.
            if now.is_finite() {
                self.first_ms = now - (self.last_ms - self.first_ms);
                self.last_ms = now;
            }
            return Err(SceneError::InvalidFrameTiming { dt });
        }
        if dt > self.max_dt {
            warn!("frame took {dt:.3}s, integrating {:.3}s", self.max_dt);
            dt = self.max_dt;
        }
        self.last_ms = now;

        Ok(FrameTime {
            t: ((now - self.first_ms) / 1000.0) as f32,
            dt: dt as f32,
        })
    }
}
