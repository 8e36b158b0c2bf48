//! Core state types shared by the simulations.
//!
//! - `Particle` / `Trail` for advected tracers (bounded position history)
//! - `Domain` / `ControlVolume` / `Injector` for geometry picked by the user
//! - `Body` / `System` for the collision model
//!
//! Positions use `NVec2` (2d) and the deformation lattice uses `NVec3` (3d).

use std::collections::VecDeque;

use nalgebra::{Vector2, Vector3};
use rand::Rng;
pub type NVec2 = Vector2<f64>;
pub type NVec3 = Vector3<f64>;

/// Ring buffer of the most recent positions of a particle
#[derive(Debug, Clone, Default)]
pub struct Trail {
    points: VecDeque<NVec2>,
    capacity: usize,
}

impl Trail {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a point, evicting the oldest once full
    pub fn push(&mut self, p: NVec2) {
        if self.capacity == 0 {
            return;
        }
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(p);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest to newest
    pub fn points(&self) -> impl Iterator<Item = &NVec2> {
        self.points.iter()
    }
}

#[derive(Debug, Clone)]
pub struct Particle {
    pub x: NVec2, // position
    pub v: Option<NVec2>, // velocity, for particles that carry their own
    pub trail: Trail, // recent positions
    pub age: f64, // time since (re)spawn
    pub lifetime: f64, // respawn once age exceeds this
    pub weight: f64, // visual weight (local density proxy)
}

impl Particle {
    pub fn new(x: NVec2, lifetime: f64, trail_len: usize) -> Self {
        Self {
            x,
            v: None,
            trail: Trail::new(trail_len),
            age: 0.0,
            lifetime,
            weight: 1.0,
        }
    }

    pub fn with_velocity(mut self, v: NVec2) -> Self {
        self.v = Some(v);
        self
    }

    /// Move to `x` as a fresh particle: trail cleared, age reset
    pub fn respawn_at(&mut self, x: NVec2) {
        self.x = x;
        self.age = 0.0;
        self.trail.clear();
    }

    pub fn expired(&self) -> bool {
        self.age > self.lifetime
    }
}

/// Axis-aligned rectangular region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    pub min: NVec2,
    pub max: NVec2,
}

impl Domain {
    pub fn new(min: NVec2, max: NVec2) -> Self {
        Self { min, max }
    }

    /// Square `[-half, half]^2`
    pub fn centered(half: f64) -> Self {
        Self::new(NVec2::new(-half, -half), NVec2::new(half, half))
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> NVec2 {
        0.5 * (self.min + self.max)
    }

    pub fn contains(&self, p: &NVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn clamp(&self, p: NVec2) -> NVec2 {
        NVec2::new(p.x.clamp(self.min.x, self.max.x), p.y.clamp(self.min.y, self.max.y))
    }

    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> NVec2 {
        NVec2::new(
            self.min.x + rng.gen::<f64>() * self.width(),
            self.min.y + rng.gen::<f64>() * self.height(),
        )
    }

    /// Evenly spaced interior points on an `nx` by `ny` lattice (cell centers)
    pub fn lattice(&self, nx: usize, ny: usize) -> Vec<NVec2> {
        let mut out = Vec::with_capacity(nx * ny);
        for j in 0..ny {
            for i in 0..nx {
                out.push(NVec2::new(
                    self.min.x + (i as f64 + 0.5) * self.width() / nx as f64,
                    self.min.y + (j as f64 + 0.5) * self.height() / ny as f64,
                ));
            }
        }
        out
    }
}

/// Rectangle dragged out by the user, normalized so `min <= max`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlVolume {
    pub min: NVec2,
    pub max: NVec2,
}

impl ControlVolume {
    pub fn from_corners(a: NVec2, b: NVec2) -> Self {
        Self {
            min: NVec2::new(a.x.min(b.x), a.y.min(b.y)),
            max: NVec2::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Square of side `size` centered on `c`
    pub fn square(c: NVec2, size: f64) -> Self {
        let h = 0.5 * size;
        Self::from_corners(c - NVec2::new(h, h), c + NVec2::new(h, h))
    }

    pub fn area(&self) -> f64 {
        (self.max.x - self.min.x) * (self.max.y - self.min.y)
    }

    pub fn contains(&self, p: &NVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Fixed streakline emission point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Injector {
    pub x: NVec2,
}

#[derive(Debug, Clone)]
pub struct Body {
    pub x: NVec2, // position
    pub v: NVec2, // velocity
    pub m: f64, // mass
    pub radius: f64, // collision radius
}

#[derive(Debug, Clone)]
pub struct System {
    pub bodies: Vec<Body>, // 2d collection of bodies
    pub t: f64, // time
}
