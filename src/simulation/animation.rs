//! Frame loop shared by all apps
//!
//! Every app implements [`FrameApp`]. An [`AnimationLoop`] calls `update`
//! once per frame while running and always re-renders, which is all the
//! windowed viewer and the headless runner need.

use tracing::debug;

use crate::simulation::states::NVec2;
use crate::visualization::canvas::Canvas;

/// Coarse per-app mode used to gate what input does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Idle,
    Playing,
    Ended,
}

/// A self-contained teaching app driven one frame at a time
pub trait FrameApp {
    fn name(&self) -> &'static str;

    /// Advance the simulation by `dt`
    fn update(&mut self, dt: f64);

    /// Draw the current state
    fn render(&self, canvas: &mut Canvas);

    /// Back to the initial state
    fn reset(&mut self);

    /// One-line summary for logs and the window title
    fn status(&self) -> String;

    /// Pointer input in world coordinates
    fn pointer_down(&mut self, _p: NVec2) {}
    fn pointer_move(&mut self, _p: NVec2) {}
    fn pointer_up(&mut self, _p: NVec2) {}

    /// Canvas size changed. The default rebuilds from scratch.
    fn resize(&mut self, _width: usize, _height: usize) {
        self.reset();
    }
}

#[derive(Debug, Clone)]
pub struct AnimationLoop {
    pub running: bool,
    pub frame: u64,
    pub time: f64, // simulated time
    pub dt: f64, // fixed step per frame
}

impl AnimationLoop {
    pub fn new(dt: f64) -> Self {
        Self {
            running: true,
            frame: 0,
            time: 0.0,
            dt,
        }
    }

    pub fn toggle(&mut self) {
        self.running = !self.running;
    }

    /// One frame: step when running, then render
    pub fn tick(&mut self, app: &mut dyn FrameApp, canvas: &mut Canvas) {
        if self.running {
            app.update(self.dt);
            self.time += self.dt;
            self.frame += 1;
        }
        app.render(canvas);
    }

    pub fn reset(&mut self, app: &mut dyn FrameApp) {
        app.reset();
        self.frame = 0;
        self.time = 0.0;
    }

    /// Rebuild the raster and let the app react
    pub fn resize(&mut self, app: &mut dyn FrameApp, canvas: &mut Canvas, width: usize, height: usize) {
        canvas.resize(width, height);
        app.resize(width, height);
    }

    /// Drive `frames` frames back to back (fixed-interval timer without the waiting)
    pub fn run_headless(&mut self, app: &mut dyn FrameApp, canvas: &mut Canvas, frames: u64) {
        for _ in 0..frames {
            self.tick(app, canvas);
            if self.frame % 60 == 0 {
                debug!(frame = self.frame, t = self.time, status = %app.status(), "{}", app.name());
            }
        }
    }
}
