//! Splash and foam for proxies crossing the water surface.

use std::collections::HashMap;

use glam::Vec3;
use livingstream_core::{ActorHandle, WaterLevel};
use log::{debug, warn};

/// Height of the water surface under a ground position
pub trait WaterSurface {
    /// `None` when the surface could not be sampled
    fn height_at(&self, x: f32, z: f32) -> Option<f32>;
}

impl WaterSurface for WaterLevel {
    fn height_at(&self, _x: f32, _z: f32) -> Option<f32> {
        Some(self.0)
    }
}

/// Particle and decal side of the water interaction.
pub trait WaterEffects {
    fn splash(&mut self, at: Vec3);

    fn show_foam(&mut self, owner: ActorHandle, at: Vec3);

    fn hide_foam(&mut self, owner: ActorHandle);
}

/// Headless effects sink: every effect becomes a debug log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEffects;

impl WaterEffects for LogEffects {
    fn splash(&mut self, at: Vec3) {
        debug!("Splash at {}", at);
    }

    fn show_foam(&mut self, owner: ActorHandle, at: Vec3) {
        debug!("Foam for {} at {}", owner, at);
    }

    fn hide_foam(&mut self, owner: ActorHandle) {
        debug!("Foam hidden for {}", owner);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaterReport {
    pub splashes: usize,
    pub submerged: usize,
    pub failed_queries: usize,
}

/// Remembers which actors were below the surface last tick.
#[derive(Debug, Clone)]
pub struct WaterInteraction {
    foam_offset: f32,
    in_water: HashMap<ActorHandle, bool>,
}

impl WaterInteraction {
    pub fn new(foam_offset: f32) -> Self {
        WaterInteraction {
            foam_offset,
            in_water: HashMap::new(),
        }
    }

    pub fn is_in_water(&self, handle: ActorHandle) -> bool {
        self.in_water.get(&handle).copied().unwrap_or(false)
    }

    /// Evaluate every actor in `actors`. Actors missing from the list are
    /// forgotten and their foam hidden.
    pub fn update<S, E>(&mut self, actors: &[(ActorHandle, Vec3)], surface: &S, effects: &mut E) -> WaterReport
    where
        S: WaterSurface + ?Sized,
        E: WaterEffects + ?Sized,
    {
        let mut report = WaterReport::default();

        for &(handle, position) in actors {
            let Some(height) = surface.height_at(position.x, position.z) else {
                warn!("Water surface query failed at ({}, {})", position.x, position.z);
                report.failed_queries += 1;
                continue;
            };

            let was_in_water = self.is_in_water(handle);
            let in_water = position.y < height;

            if in_water {
                if !was_in_water {
                    effects.splash(Vec3::new(position.x, height, position.z));
                    report.splashes += 1;
                }
                effects.show_foam(handle, Vec3::new(position.x, height + self.foam_offset, position.z));
                report.submerged += 1;
            } else if was_in_water {
                effects.hide_foam(handle);
            }
            self.in_water.insert(handle, in_water);
        }

        let live: Vec<ActorHandle> = actors.iter().map(|(handle, _)| *handle).collect();
        self.in_water.retain(|handle, in_water| {
            let keep = live.contains(handle);
            if !keep && *in_water {
                effects.hide_foam(*handle);
            }
            keep
        });

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livingstream_core::HandleAllocator;

    #[derive(Default)]
    struct Recorder {
        splashes: Vec<Vec3>,
        foam: Vec<(ActorHandle, Vec3)>,
        hidden: Vec<ActorHandle>,
    }

    impl WaterEffects for Recorder {
        fn splash(&mut self, at: Vec3) {
            self.splashes.push(at);
        }

        fn show_foam(&mut self, owner: ActorHandle, at: Vec3) {
            self.foam.push((owner, at));
        }

        fn hide_foam(&mut self, owner: ActorHandle) {
            self.hidden.push(owner);
        }
    }

    struct Broken;

    impl WaterSurface for Broken {
        fn height_at(&self, _x: f32, _z: f32) -> Option<f32> {
            None
        }
    }

    #[test]
    fn splash_once_on_entry_then_foam_while_submerged() {
        let handle = HandleAllocator::new().allocate();
        let mut water = WaterInteraction::new(0.1);
        let mut effects = Recorder::default();
        let surface = WaterLevel(0.5);

        let report = water.update(&[(handle, Vec3::new(1.0, 0.0, 2.0))], &surface, &mut effects);
        assert_eq!(report.splashes, 1);
        water.update(&[(handle, Vec3::new(1.0, 0.0, 3.0))], &surface, &mut effects);

        assert_eq!(effects.splashes, vec![Vec3::new(1.0, 0.5, 2.0)]);
        assert_eq!(effects.foam.len(), 2);
        assert!(effects.foam[1].1.abs_diff_eq(Vec3::new(1.0, 0.6, 3.0), 1e-6));
        assert!(water.is_in_water(handle));
    }

    #[test]
    fn leaving_water_hides_foam_and_reentry_splashes_again() {
        let handle = HandleAllocator::new().allocate();
        let mut water = WaterInteraction::new(0.1);
        let mut effects = Recorder::default();

        water.update(&[(handle, Vec3::ZERO)], &WaterLevel(0.5), &mut effects);
        water.update(&[(handle, Vec3::ZERO)], &WaterLevel(-0.5), &mut effects);
        assert_eq!(effects.hidden, vec![handle]);
        assert!(!water.is_in_water(handle));

        water.update(&[(handle, Vec3::ZERO)], &WaterLevel(0.5), &mut effects);
        assert_eq!(effects.splashes.len(), 2);
    }

    #[test]
    fn failed_query_leaves_state_alone() {
        let handle = HandleAllocator::new().allocate();
        let mut water = WaterInteraction::new(0.1);
        let mut effects = Recorder::default();

        water.update(&[(handle, Vec3::ZERO)], &WaterLevel(1.0), &mut effects);
        let report = water.update(&[(handle, Vec3::ZERO)], &Broken, &mut effects);

        assert_eq!(report.failed_queries, 1);
        assert!(water.is_in_water(handle));
        assert!(effects.hidden.is_empty());
    }

    #[test]
    fn removed_actors_are_forgotten() {
        let mut allocator = HandleAllocator::new();
        let kept = allocator.allocate();
        let gone = allocator.allocate();
        let mut water = WaterInteraction::new(0.1);
        let mut effects = Recorder::default();

        water.update(&[(kept, Vec3::ZERO), (gone, Vec3::ZERO)], &WaterLevel(1.0), &mut effects);
        water.update(&[(kept, Vec3::ZERO)], &WaterLevel(1.0), &mut effects);

        assert_eq!(effects.hidden, vec![gone]);
        assert!(!water.is_in_water(gone));
        assert_eq!(effects.splashes.len(), 2);
    }
}
