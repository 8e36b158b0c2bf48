//! Mean free path game
//!
//! The player steers one particle through a box of moving obstacles. Player
//! and obstacle collide elastically; obstacles pass through each other. The
//! score is how far the player got from the start per collision.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::configuration::config::CollisionsConfig;
use crate::simulation::animation::{FrameApp, PlayState};
use crate::simulation::states::{Body, Domain, NVec2, System};
use crate::visualization::canvas::{Canvas, ACCENT, BACKGROUND, BLUE, GRID, WHITE};

/// Resolve an overlap between `a` and `b`.
///
/// When `|a.x - b.x|^2 < (ra + rb)^2` the bodies are pushed apart along the
/// collision normal, each by its share `r_i / (ra + rb)` of the overlap, and if
/// they are approaching an elastic impulse is exchanged along the normal:
///   j = -2 (v_a - v_b).n / (1/m_a + 1/m_b)
/// Returns true when an impulse was applied (a counted collision).
pub fn resolve_collision(a: &mut Body, b: &mut Body) -> bool {
    let d = a.x - b.x;
    let r_sum = a.radius + b.radius;
    let dist2 = d.norm_squared();
    if dist2 >= r_sum * r_sum {
        return false;
    }

    let dist = dist2.sqrt();
    let n = if dist > 1e-12 { d / dist } else { NVec2::new(1.0, 0.0) };

    let v_rel = (a.v - b.v).dot(&n);
    let approaching = v_rel < 0.0;
    if approaching {
        let j = -2.0 * v_rel / (1.0 / a.m + 1.0 / b.m);
        a.v += (j / a.m) * n;
        b.v -= (j / b.m) * n;
    }

    let overlap = r_sum - dist;
    if r_sum > 0.0 {
        a.x += overlap * (a.radius / r_sum) * n;
        b.x -= overlap * (b.radius / r_sum) * n;
    }

    approaching
}

/// Keep a body inside `domain`, bouncing off the walls
pub fn reflect_body(body: &mut Body, domain: &Domain) {
    let r = body.radius;
    if body.x.x - r < domain.min.x {
        body.x.x = domain.min.x + r;
        body.v.x = body.v.x.abs();
    } else if body.x.x + r > domain.max.x {
        body.x.x = domain.max.x - r;
        body.v.x = -body.v.x.abs();
    }
    if body.x.y - r < domain.min.y {
        body.x.y = domain.min.y + r;
        body.v.y = body.v.y.abs();
    } else if body.x.y + r > domain.max.y {
        body.x.y = domain.max.y - r;
        body.v.y = -body.v.y.abs();
    }
}

pub struct MeanFreePathApp {
    domain: Domain,
    cfg: CollisionsConfig,
    seed: u64,
    pub system: System, // bodies[0] is the player
    pub state: PlayState,
    pub collisions: usize,
    start: NVec2,
    steer: NVec2,
    path_length: f64, // total distance travelled by the player
    since_collision: f64, // distance since the last collision
    free_paths: Vec<f64>,
}

impl MeanFreePathApp {
    pub fn new(domain: Domain, cfg: CollisionsConfig, seed: u64) -> Self {
        let mut app = Self {
            domain,
            cfg,
            seed,
            system: System { bodies: Vec::new(), t: 0.0 },
            state: PlayState::Idle,
            collisions: 0,
            start: NVec2::zeros(),
            steer: NVec2::zeros(),
            path_length: 0.0,
            since_collision: 0.0,
            free_paths: Vec::new(),
        };
        app.reset();
        app
    }

    pub fn player(&self) -> &Body {
        &self.system.bodies[0]
    }

    pub fn start(&mut self) {
        if self.state == PlayState::Idle {
            self.state = PlayState::Playing;
            info!(obstacles = self.system.bodies.len() - 1, "mean free path round started");
        }
    }

    /// Steering direction; zero lets the player coast
    pub fn steer(&mut self, dir: NVec2) {
        let n = dir.norm();
        self.steer = if n > 1e-12 && n.is_finite() { dir / n } else { NVec2::zeros() };
    }

    pub fn elapsed(&self) -> f64 {
        self.system.t
    }

    pub fn path_length(&self) -> f64 {
        self.path_length
    }

    /// Straight-line distance from the start divided by the collision count
    pub fn displacement_per_collision(&self) -> f64 {
        if self.collisions == 0 {
            return f64::INFINITY;
        }
        (self.player().x - self.start).norm() / self.collisions as f64
    }

    /// Mean distance travelled between consecutive collisions
    pub fn mean_free_path(&self) -> f64 {
        if self.free_paths.is_empty() {
            return f64::INFINITY;
        }
        self.free_paths.iter().sum::<f64>() / self.free_paths.len() as f64
    }

    fn step(&mut self, dt: f64) {
        let domain = self.domain;
        let Some((player, obstacles)) = self.system.bodies.split_first_mut() else {
            return;
        };

        player.v += self.cfg.player_accel * dt * self.steer;
        let speed = player.v.norm();
        if speed > self.cfg.max_speed {
            player.v *= self.cfg.max_speed / speed;
        }

        let before = player.x;
        player.x += dt * player.v;
        reflect_body(player, &domain);
        let travelled = (player.x - before).norm();
        self.path_length += travelled;
        self.since_collision += travelled;

        for obstacle in obstacles.iter_mut() {
            obstacle.x += dt * obstacle.v;
            reflect_body(obstacle, &domain);
        }

        for obstacle in obstacles.iter_mut() {
            if resolve_collision(player, obstacle) {
                self.collisions += 1;
                self.free_paths.push(self.since_collision);
                self.since_collision = 0.0;
            }
        }
        // separation may push the player through a wall
        reflect_body(player, &domain);

        self.system.t += dt;
    }
}

impl FrameApp for MeanFreePathApp {
    fn name(&self) -> &'static str {
        "mean_free_path"
    }

    fn update(&mut self, dt: f64) {
        if self.state != PlayState::Playing {
            return;
        }
        self.step(dt);
        if self.system.t >= self.cfg.time_limit {
            self.state = PlayState::Ended;
            info!(
                collisions = self.collisions,
                path_length = self.path_length,
                displacement_per_collision = self.displacement_per_collision(),
                mean_free_path = self.mean_free_path(),
                "mean free path round ended"
            );
        }
    }

    fn render(&self, canvas: &mut Canvas) {
        canvas.clear(BACKGROUND);
        canvas.draw_rect_outline(&self.domain.min, &self.domain.max, GRID);
        let scale = canvas.viewport.scale();
        for obstacle in &self.system.bodies[1..] {
            canvas.fill_disc(&obstacle.x, obstacle.radius * scale, BLUE);
        }
        let player = self.player();
        canvas.draw_line(&self.start, &player.x, GRID);
        canvas.fill_disc(&self.start, 3.0, WHITE);
        canvas.fill_disc(&player.x, player.radius * scale, ACCENT);
    }

    fn reset(&mut self) {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let cfg = &self.cfg;
        let player = Body {
            x: self.domain.center(),
            v: NVec2::zeros(),
            m: cfg.player_mass,
            radius: cfg.player_radius,
        };
        let clearance = cfg.player_radius + cfg.obstacle_radius;
        let mut bodies = vec![player];
        let mut attempts = 0;
        while bodies.len() < cfg.obstacles + 1 {
            let x = self.domain.random_point(&mut rng);
            attempts += 1;
            // never start on top of the player, unless the box is too small to avoid it
            if (x - self.domain.center()).norm() < 2.0 * clearance && attempts < 100 * (cfg.obstacles + 1) {
                continue;
            }
            let angle = rng.gen::<f64>() * std::f64::consts::TAU;
            bodies.push(Body {
                x,
                v: cfg.obstacle_speed * NVec2::new(angle.cos(), angle.sin()),
                m: cfg.obstacle_mass,
                radius: cfg.obstacle_radius,
            });
        }
        self.system = System { bodies, t: 0.0 };
        self.start = self.domain.center();
        self.state = PlayState::Idle;
        self.collisions = 0;
        self.steer = NVec2::zeros();
        self.path_length = 0.0;
        self.since_collision = 0.0;
        self.free_paths.clear();
    }

    fn status(&self) -> String {
        format!(
            "{:?}  t = {:.1}/{:.0}  collisions = {}  displacement/collision = {:.3}  mean free path = {:.3}",
            self.state,
            self.system.t,
            self.cfg.time_limit,
            self.collisions,
            self.displacement_per_collision(),
            self.mean_free_path()
        )
    }

    fn pointer_down(&mut self, p: NVec2) {
        match self.state {
            PlayState::Idle => self.start(),
            PlayState::Playing => {
                let dir = p - self.player().x;
                self.steer(dir);
            }
            PlayState::Ended => self.reset(),
        }
    }

    fn pointer_move(&mut self, p: NVec2) {
        if self.state == PlayState::Playing && self.steer != NVec2::zeros() {
            let dir = p - self.player().x;
            self.steer(dir);
        }
    }

    fn pointer_up(&mut self, _p: NVec2) {
        self.steer = NVec2::zeros();
    }
}
