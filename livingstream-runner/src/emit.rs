//! Synthetic sensor: people wandering across the camera frame, sent in the
//! same wire format the tracking process uses.

use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use glam::{Vec2, Vec3};
use livingstream_transport::{encode_batch, Detection, DetectionId, Sender};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::Rng;

use crate::error::RunnerError;

#[derive(Debug, Clone, PartialEq)]
pub struct EmitOptions {
    pub walkers: usize,
    pub rate_hz: f32,
    pub duration: Option<Duration>,
    /// Emit 3D `position` readings in meters instead of pixel `center`s
    pub metric: bool,
    pub frame_size: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Walker {
    id: DetectionId,
    position: Vec2,
    velocity: Vec2,
    expires_at: f64,
}

/// A fixed-size crowd with churn: walkers leave after a while and are
/// replaced by newcomers carrying fresh ids.
pub struct Crowd {
    walkers: Vec<Walker>,
    frame_size: Vec2,
    next_id: DetectionId,
    rng: StdRng,
}

impl Crowd {
    pub fn new(size: usize, frame_size: Vec2, rng: StdRng) -> Self {
        let mut crowd = Crowd {
            walkers: Vec::with_capacity(size),
            frame_size,
            next_id: 1,
            rng,
        };
        for _ in 0..size {
            let walker = crowd.newcomer(0.0);
            crowd.walkers.push(walker);
        }
        crowd
    }

    fn newcomer(&mut self, now: f64) -> Walker {
        let id = self.next_id;
        self.next_id += 1;
        let speed = self.rng.gen_range(20.0..80.0_f32);
        let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
        Walker {
            id,
            position: Vec2::new(
                self.rng.gen_range(0.0..self.frame_size.x),
                self.rng.gen_range(0.0..self.frame_size.y),
            ),
            velocity: Vec2::new(angle.cos(), angle.sin()) * speed,
            expires_at: now + self.rng.gen_range(5.0..20.0),
        }
    }

    /// Move everyone by `dt`, bouncing off the frame edges
    pub fn advance(&mut self, now: f64, dt: f32) {
        for index in 0..self.walkers.len() {
            if self.walkers[index].expires_at <= now {
                self.walkers[index] = self.newcomer(now);
                continue;
            }
            let frame = self.frame_size;
            let walker = &mut self.walkers[index];
            walker.position += walker.velocity * dt;
            if walker.position.x < 0.0 || walker.position.x > frame.x {
                walker.velocity.x = -walker.velocity.x;
            }
            if walker.position.y < 0.0 || walker.position.y > frame.y {
                walker.velocity.y = -walker.velocity.y;
            }
            walker.position = walker.position.clamp(Vec2::ZERO, frame);
        }
    }

    /// Current readings; metric mode maps the frame onto a few meters ahead
    /// of the camera.
    pub fn detections(&self, metric: bool) -> Vec<Detection> {
        self.walkers
            .iter()
            .map(|walker| {
                if metric {
                    let normalized = walker.position / self.frame_size;
                    Detection::metric(
                        walker.id,
                        Vec3::new((normalized.x - 0.5) * 6.0, 0.0, 1.0 + normalized.y * 5.0),
                    )
                } else {
                    Detection::pixel_with_depth(walker.id, walker.position.x, walker.position.y, 1.0)
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.walkers.len()
    }
}

pub fn emit<S: Sender>(
    sender: &S,
    options: &EmitOptions,
    rng: StdRng,
    shutdown: &Receiver<()>,
) -> Result<u64, RunnerError> {
    let interval = Duration::from_secs_f32(1.0 / options.rate_hz.max(0.1));
    let dt = interval.as_secs_f32();
    let mut crowd = Crowd::new(options.walkers, options.frame_size, rng);
    let start = Instant::now();
    let mut sent: u64 = 0;

    info!("Emitting {} walkers at {} Hz", crowd.len(), options.rate_hz);
    loop {
        if shutdown.try_recv().is_ok() {
            break;
        }
        let elapsed = start.elapsed();
        if options.duration.map_or(false, |limit| elapsed >= limit) {
            break;
        }

        let tick_start = Instant::now();
        crowd.advance(elapsed.as_secs_f64(), dt);
        let payload = encode_batch(&crowd.detections(options.metric))?;
        match sender.send(&payload) {
            Ok(()) => sent += 1,
            Err(e) => warn!("Send failed: {}", e),
        }

        let spent = tick_start.elapsed();
        if spent < interval {
            spin_sleep::sleep(interval - spent);
        }
    }

    info!("Sent {} batches", sent);
    Ok(sent)
}
