//! Autonomous fish: swim, sway, bounce off the pool edges and come back in
//! from the far side when something shoves them out.

use crossbeam_channel::{unbounded, Receiver, Sender};
use glam::{Vec2, Vec3};
use livingstream_core::{ActorDesc, ActorHandle, Scene, Transition};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

/// Rectangle on the ground plane (X/Z) the fish stay inside
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwimBounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_z: f32,
    pub max_z: f32,
}

impl Default for SwimBounds {
    fn default() -> Self {
        SwimBounds {
            min_x: -15.0,
            max_x: 15.0,
            min_z: -15.0,
            max_z: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FishParams {
    pub tag: String,
    pub count: usize,
    pub speed: f32,
    pub swim_height: f32,
    pub bounds: SwimBounds,
    pub sway_amplitude: f32,
    pub sway_frequency: f32,
    /// How far past the bounds a fish may be pushed before it respawns
    pub respawn_margin: f32,
    pub fade_in_seconds: f32,
}

impl Default for FishParams {
    fn default() -> Self {
        FishParams {
            tag: "Fish".to_string(),
            count: 12,
            speed: 2.0,
            swim_height: -0.5,
            bounds: SwimBounds::default(),
            sway_amplitude: 0.5,
            sway_frequency: 2.0,
            respawn_margin: 1.0,
            fade_in_seconds: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnRequest {
    pub position: Vec3,
    /// Heading sign per axis: `x` for scene X, `y` for scene Z
    pub direction: Vec2,
}

/// Per-fish swimming state plus the respawn callback it was built with.
#[derive(Debug, Clone)]
pub struct FishMovement {
    direction: Vec2,
    phase_offset: f32,
    yaw_degrees: f32,
    spawner: Sender<SpawnRequest>,
}

impl FishMovement {
    pub fn new(direction: Vec2, phase_offset: f32, spawner: Sender<SpawnRequest>) -> Self {
        FishMovement {
            direction,
            phase_offset,
            yaw_degrees: if direction.x >= 0.0 { 0.0 } else { 180.0 },
            spawner,
        }
    }

    pub fn direction(&self) -> Vec2 {
        self.direction
    }

    pub fn yaw_degrees(&self) -> f32 {
        self.yaw_degrees
    }

    /// Position after one tick of swimming from `position`
    pub fn step(&mut self, params: &FishParams, position: Vec3, now: f64, dt: f32) -> Vec3 {
        let wave = (now as f32 * params.sway_frequency + self.phase_offset).sin();
        let forward = Vec3::new(self.direction.x, 0.0, self.direction.y) * params.speed;
        let heading = forward.normalize_or_zero();
        let right = Vec3::new(heading.z, 0.0, -heading.x);

        let next = position + (forward + right * wave * params.sway_amplitude) * dt;

        let bounds = &params.bounds;
        if (next.x >= bounds.max_x && self.direction.x > 0.0)
            || (next.x <= bounds.min_x && self.direction.x < 0.0)
        {
            self.direction.x = -self.direction.x;
        }
        if (next.z >= bounds.max_z && self.direction.y > 0.0)
            || (next.z <= bounds.min_z && self.direction.y < 0.0)
        {
            self.direction.y = -self.direction.y;
        }

        let base = if self.direction.x >= 0.0 { 0.0 } else { 180.0 };
        self.yaw_degrees = base + wave * 10.0;
        next
    }

    /// A respawn on the opposite edge if `position` is further than the
    /// margin outside the bounds. The new fish heads back into the pool.
    pub fn escape_request(&self, params: &FishParams, position: Vec3) -> Option<SpawnRequest> {
        let bounds = &params.bounds;
        let margin = params.respawn_margin;
        let mut position = Vec3::new(
            position.x.clamp(bounds.min_x - margin, bounds.max_x + margin),
            params.swim_height,
            position.z.clamp(bounds.min_z - margin, bounds.max_z + margin),
        );
        let mut direction = self.direction;

        let escaped_x = if position.x >= bounds.max_x + margin {
            position.x = bounds.min_x;
            direction.x = 1.0;
            true
        } else if position.x <= bounds.min_x - margin {
            position.x = bounds.max_x;
            direction.x = -1.0;
            true
        } else {
            false
        };
        let escaped_z = if position.z >= bounds.max_z + margin {
            position.z = bounds.min_z;
            direction.y = 1.0;
            true
        } else if position.z <= bounds.min_z - margin {
            position.z = bounds.max_z;
            direction.y = -1.0;
            true
        } else {
            false
        };

        if !(escaped_x || escaped_z) {
            return None;
        }
        position.x = position.x.clamp(bounds.min_x, bounds.max_x);
        position.z = position.z.clamp(bounds.min_z, bounds.max_z);
        Some(SpawnRequest { position, direction })
    }

    /// Hand a respawn to whoever owns the school. False if nobody is listening.
    pub fn request_respawn(&self, request: SpawnRequest) -> bool {
        self.spawner.send(request).is_ok()
    }
}

struct Fish {
    handle: ActorHandle,
    movement: FishMovement,
    fade: Option<Transition<f32>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FishReport {
    pub escaped: usize,
    pub spawned: usize,
    pub lost: usize,
}

pub struct FishSchool {
    params: FishParams,
    fish: Vec<Fish>,
    spawn_tx: Sender<SpawnRequest>,
    spawn_rx: Receiver<SpawnRequest>,
    rng: StdRng,
    spawned_total: u64,
}

impl FishSchool {
    pub fn new(params: FishParams, rng: StdRng) -> Self {
        let (spawn_tx, spawn_rx) = unbounded();
        FishSchool {
            params,
            fish: Vec::new(),
            spawn_tx,
            spawn_rx,
            rng,
            spawned_total: 0,
        }
    }

    pub fn with_seed(params: FishParams, seed: u64) -> Self {
        Self::new(params, StdRng::seed_from_u64(seed))
    }

    pub fn params(&self) -> &FishParams {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.fish.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fish.is_empty()
    }

    /// Another handle on the respawn queue; requests are served on the next update
    pub fn spawner(&self) -> Sender<SpawnRequest> {
        self.spawn_tx.clone()
    }

    /// Current yaw of every fish, for renderers that orient them
    pub fn headings(&self) -> impl Iterator<Item = (ActorHandle, f32)> + '_ {
        self.fish
            .iter()
            .map(|fish| (fish.handle, fish.movement.yaw_degrees()))
    }

    /// Spawn the configured number of fish at random spots inside the bounds
    pub fn populate<S: Scene + ?Sized>(&mut self, now: f64, scene: &mut S) -> usize {
        let bounds = self.params.bounds;
        let mut spawned = 0;
        for _ in 0..self.params.count {
            let position = Vec3::new(
                self.rng.gen_range(bounds.min_x..bounds.max_x),
                self.params.swim_height,
                self.rng.gen_range(bounds.min_z..bounds.max_z),
            );
            let direction = Vec2::new(self.random_sign(), self.random_sign());
            if self.spawn(SpawnRequest { position, direction }, now, scene) {
                spawned += 1;
            }
        }
        debug!("Populated {} fish", spawned);
        spawned
    }

    fn random_sign(&mut self) -> f32 {
        if self.rng.gen_bool(0.5) {
            1.0
        } else {
            -1.0
        }
    }

    fn spawn<S: Scene + ?Sized>(&mut self, request: SpawnRequest, now: f64, scene: &mut S) -> bool {
        self.spawned_total += 1;
        let fading = self.params.fade_in_seconds > 0.0;
        let desc = ActorDesc::new(
            format!("{}_{}", self.params.tag, self.spawned_total),
            self.params.tag.as_str(),
            request.position,
        )
        .with_opacity(if fading { 0.0 } else { 1.0 });

        match scene.create(desc) {
            Ok(handle) => {
                let phase_offset = self.rng.gen_range(0.0..TAU);
                let fade = fading.then(|| Transition::new(0.0, 1.0, now, self.params.fade_in_seconds as f64));
                self.fish.push(Fish {
                    handle,
                    movement: FishMovement::new(request.direction, phase_offset, self.spawn_tx.clone()),
                    fade,
                });
                true
            }
            Err(e) => {
                warn!("Could not spawn fish at {}: {}", request.position, e);
                false
            }
        }
    }

    /// Swim every fish one tick, respawn escapees and serve queued spawns
    pub fn update<S: Scene + ?Sized>(&mut self, now: f64, dt: f32, scene: &mut S) -> FishReport {
        let mut report = FishReport::default();
        let mut gone = Vec::new();

        for fish in self.fish.iter_mut() {
            let position = match scene.position(fish.handle) {
                Ok(position) => position,
                Err(e) => {
                    warn!("Fish {} vanished: {}", fish.handle, e);
                    gone.push(fish.handle);
                    report.lost += 1;
                    continue;
                }
            };

            if let Some(request) = fish.movement.escape_request(&self.params, position) {
                if let Err(e) = scene.destroy(fish.handle) {
                    warn!("Could not remove escaped fish {}: {}", fish.handle, e);
                }
                if !fish.movement.request_respawn(request) {
                    warn!("Respawn queue closed, fish {} not replaced", fish.handle);
                }
                debug!("Fish {} escaped at {}, respawning at {}", fish.handle, position, request.position);
                gone.push(fish.handle);
                report.escaped += 1;
                continue;
            }

            let next = fish.movement.step(&self.params, position, now, dt);
            if let Err(e) = scene.set_position(fish.handle, next) {
                warn!("Fish {} vanished: {}", fish.handle, e);
                gone.push(fish.handle);
                report.lost += 1;
                continue;
            }

            if let Some(fade) = fish.fade {
                if let Err(e) = scene.set_opacity(fish.handle, fade.value_at(now)) {
                    warn!("Could not fade fish {}: {}", fish.handle, e);
                }
                if fade.is_finished(now) {
                    fish.fade = None;
                }
            }
        }

        if !gone.is_empty() {
            self.fish.retain(|fish| !gone.contains(&fish.handle));
        }

        let queued: Vec<SpawnRequest> = self.spawn_rx.try_iter().collect();
        for request in queued {
            if self.spawn(request, now, scene) {
                report.spawned += 1;
            }
        }

        report
    }
}
