use crate::resources::Time;
use crate::World;
use log::trace;
use std::time::{Duration, Instant};

/// A per-frame participant driven explicitly by the host.
///
/// `on_tick` runs for every system first, then `on_late_tick` for every
/// system, so late work sees the positions all regular ticks produced.
pub trait System {
    fn name(&self) -> &'static str;

    fn on_tick(&mut self, world: &mut World, dt: f32);

    fn on_late_tick(&mut self, world: &mut World, dt: f32) {
        let _ = (world, dt);
    }
}

/// Runs registered systems in registration order
pub struct Scheduler {
    systems: Vec<Box<dyn System>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self { systems: Vec::new() }
    }

    /// Add a system to the scheduler
    pub fn add_system<T: System + 'static>(&mut self, system: T) -> &mut Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Advance the [`Time`] resource by `dt` and run one frame.
    ///
    /// Returns how long the systems took.
    pub fn execute_once(&mut self, world: &mut World, dt: f32) -> Duration {
        let start = Instant::now();

        match world.get_resource_mut::<Time>() {
            Some(time) => time.advance(dt),
            None => {
                let mut time = Time::default();
                time.advance(dt);
                world.add_resource(time);
            }
        }

        for system in &mut self.systems {
            let system_start = Instant::now();
            system.on_tick(world, dt);
            trace!("{} on_tick took {:?}", system.name(), system_start.elapsed());
        }

        for system in &mut self.systems {
            let system_start = Instant::now();
            system.on_late_tick(world, dt);
            trace!("{} on_late_tick took {:?}", system.name(), system_start.elapsed());
        }

        start.elapsed()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl System for Recorder {
        fn name(&self) -> &'static str {
            self.label
        }

        fn on_tick(&mut self, world: &mut World, _dt: f32) {
            let frame = world.get_resource::<Time>().map_or(0, |t| t.frame);
            self.log.lock().unwrap().push(format!("{}:tick:{}", self.label, frame));
        }

        fn on_late_tick(&mut self, _world: &mut World, _dt: f32) {
            self.log.lock().unwrap().push(format!("{}:late", self.label));
        }
    }

    #[test]
    fn ticks_run_before_late_ticks_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = Scheduler::new();
        scheduler
            .add_system(Recorder { label: "a", log: log.clone() })
            .add_system(Recorder { label: "b", log: log.clone() });

        let mut world = World::new();
        scheduler.execute_once(&mut world, 0.5);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:tick:1", "b:tick:1", "a:late", "b:late"]
        );
    }

    #[test]
    fn time_resource_accumulates() {
        let mut scheduler = Scheduler::new();
        let mut world = World::new();
        for _ in 0..4 {
            scheduler.execute_once(&mut world, 0.25);
        }
        let time = world.get_resource::<Time>().unwrap();
        assert_eq!(time.frame, 4);
        assert!((time.elapsed_seconds - 1.0).abs() < 1e-9);
        assert_eq!(time.delta_seconds, 0.25);
    }
}
