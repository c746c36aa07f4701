//! Tick systems wiring the tracking pipeline and scene behaviors into the
//! [`Scheduler`](livingstream_core::Scheduler).

use std::sync::Arc;

use crossbeam_channel::Receiver;
use livingstream_core::{ActorQuery, System, Time, WaterLevel, World};
use livingstream_transport::InboundChannel;
use log::{info, warn};

use crate::fish::FishSchool;
use crate::mapping::CoordinateMapper;
use crate::proxy::ProxyReconciler;
use crate::repulsion::RepulsionEffect;
use crate::tide::TideController;
use crate::water::{WaterEffects, WaterInteraction};

fn elapsed(world: &World) -> f64 {
    world.get_resource::<Time>().map_or(0.0, |time| time.elapsed_seconds)
}

/// Drains the inbound channel once per tick, reconciles proxies and pushes
/// reactive actors away from every mapped detection.
pub struct TrackingSystem<M, E> {
    channel: Arc<InboundChannel>,
    reconciler: ProxyReconciler<M>,
    repulsion: Option<RepulsionEffect>,
    splash_on_detection: bool,
    effects: E,
}

impl<M: CoordinateMapper, E: WaterEffects> TrackingSystem<M, E> {
    pub fn new(channel: Arc<InboundChannel>, reconciler: ProxyReconciler<M>, effects: E) -> Self {
        TrackingSystem {
            channel,
            reconciler,
            repulsion: None,
            splash_on_detection: false,
            effects,
        }
    }

    pub fn with_repulsion(mut self, repulsion: RepulsionEffect) -> Self {
        self.repulsion = Some(repulsion);
        self
    }

    pub fn with_splash_on_detection(mut self, enabled: bool) -> Self {
        self.splash_on_detection = enabled;
        self
    }

    pub fn reconciler(&self) -> &ProxyReconciler<M> {
        &self.reconciler
    }
}

impl<M: CoordinateMapper, E: WaterEffects> System for TrackingSystem<M, E> {
    fn name(&self) -> &'static str {
        "tracking"
    }

    fn on_tick(&mut self, world: &mut World, dt: f32) {
        let batch = self.channel.take();
        let now = elapsed(world);
        let report = self.reconciler.reconcile(batch.as_ref(), now, dt, world);

        if let Some(repulsion) = &self.repulsion {
            repulsion.apply(&report.points, dt, world);
        }
        if self.splash_on_detection {
            for point in &report.points {
                self.effects.splash(*point);
            }
        }
    }
}

pub struct FishSystem {
    school: FishSchool,
}

impl FishSystem {
    pub fn new(school: FishSchool) -> Self {
        FishSystem { school }
    }

    pub fn school(&self) -> &FishSchool {
        &self.school
    }
}

impl System for FishSystem {
    fn name(&self) -> &'static str {
        "fish"
    }

    fn on_tick(&mut self, world: &mut World, dt: f32) {
        let now = elapsed(world);
        let report = self.school.update(now, dt, world);
        if report.lost > 0 {
            warn!("{} fish lost their renderable this tick", report.lost);
        }
    }
}

/// Advances the tide and publishes the ocean height as the [`WaterLevel`]
/// resource, plus the full [`TideState`](crate::tide::TideState).
///
/// Toggle requests (the installation's tide button) arrive on an optional
/// channel and are applied at the start of the next tick.
pub struct TideSystem {
    controller: TideController,
    toggle_requests: Option<Receiver<()>>,
    last_label: &'static str,
}

impl TideSystem {
    pub fn new(controller: TideController) -> Self {
        let last_label = controller.label();
        TideSystem {
            controller,
            toggle_requests: None,
            last_label,
        }
    }

    pub fn with_toggle_requests(mut self, requests: Receiver<()>) -> Self {
        self.toggle_requests = Some(requests);
        self
    }
}

impl System for TideSystem {
    fn name(&self) -> &'static str {
        "tide"
    }

    fn on_tick(&mut self, world: &mut World, _dt: f32) {
        let now = elapsed(world);
        if let Some(requests) = &self.toggle_requests {
            for () in requests.try_iter() {
                self.controller.toggle(now);
            }
        }

        let state = self.controller.update(now);
        world.add_resource(WaterLevel(state.ocean_height));
        world.add_resource(state);

        let label = self.controller.label();
        if label != self.last_label {
            info!("Tide button reads '{}'", label);
            self.last_label = label;
        }
    }
}

/// Splash/foam for tagged actors against the current [`WaterLevel`].
/// Runs late so it sees this tick's proxy positions.
pub struct WaterSystem<E> {
    tag: String,
    interaction: WaterInteraction,
    effects: E,
}

impl<E: WaterEffects> WaterSystem<E> {
    pub fn new(tag: impl Into<String>, interaction: WaterInteraction, effects: E) -> Self {
        WaterSystem {
            tag: tag.into(),
            interaction,
            effects,
        }
    }

    pub fn interaction(&self) -> &WaterInteraction {
        &self.interaction
    }
}

impl<E: WaterEffects> System for WaterSystem<E> {
    fn name(&self) -> &'static str {
        "water"
    }

    fn on_tick(&mut self, _world: &mut World, _dt: f32) {}

    fn on_late_tick(&mut self, world: &mut World, _dt: f32) {
        let actors = world.query_tagged(&self.tag);
        match world.get_resource::<WaterLevel>() {
            Some(level) => {
                self.interaction.update(&actors, level, &mut self.effects);
            }
            None => {
                if !actors.is_empty() {
                    warn!("No water level available, skipping water interaction");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fish::{FishParams, SwimBounds};
    use crate::mapping::PlanarMapper;
    use crate::proxy::{ReconcilerSettings, RemovalPolicy};
    use crate::tide::{TideSettings, TideState};
    use glam::Vec3;
    use livingstream_core::{ActorDesc, ActorHandle, Scheduler};
    use livingstream_transport::{Batch, Detection};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct SharedEffects(Arc<Mutex<Vec<String>>>);

    impl WaterEffects for SharedEffects {
        fn splash(&mut self, at: Vec3) {
            self.0.lock().unwrap().push(format!("splash {}", at));
        }

        fn show_foam(&mut self, owner: ActorHandle, _at: Vec3) {
            self.0.lock().unwrap().push(format!("foam {}", owner));
        }

        fn hide_foam(&mut self, owner: ActorHandle) {
            self.0.lock().unwrap().push(format!("hide {}", owner));
        }
    }

    fn tracking(channel: Arc<InboundChannel>, effects: SharedEffects) -> TrackingSystem<PlanarMapper, SharedEffects> {
        let reconciler = ProxyReconciler::new(
            PlanarMapper::default(),
            ReconcilerSettings {
                removal: RemovalPolicy::Immediate,
                ..ReconcilerSettings::default()
            },
        );
        TrackingSystem::new(channel, reconciler, effects).with_repulsion(RepulsionEffect::default())
    }

    #[test]
    fn tracking_tick_creates_proxies_and_pushes_fish() {
        let channel = Arc::new(InboundChannel::new());
        let mut world = World::new();
        let fish = world.spawn(ActorDesc::new("Fish_1", "Fish", Vec3::new(6.0, -0.5, 3.75)));

        let mut scheduler = Scheduler::new();
        scheduler.add_system(tracking(channel.clone(), SharedEffects::default()));

        channel.publish(Batch::new(vec![Detection::pixel(1, 320.0, 240.0)]));
        scheduler.execute_once(&mut world, 0.1);

        assert_eq!(world.count_tagged("TrackedBox"), 1);
        let pushed = world.position(fish).unwrap();
        assert!(pushed.abs_diff_eq(Vec3::new(6.5, -0.5, 3.75), 1e-5));

        // No new batch: nothing removed, nothing pushed
        scheduler.execute_once(&mut world, 0.1);
        assert_eq!(world.count_tagged("TrackedBox"), 1);
        assert!(world.position(fish).unwrap().abs_diff_eq(pushed, 1e-6));

        channel.publish(Batch::default());
        scheduler.execute_once(&mut world, 0.1);
        assert_eq!(world.count_tagged("TrackedBox"), 0);
    }

    #[test]
    fn splash_on_detection_fires_per_mapped_point() {
        let channel = Arc::new(InboundChannel::new());
        let effects = SharedEffects::default();
        let mut world = World::new();
        let mut scheduler = Scheduler::new();
        scheduler.add_system(tracking(channel.clone(), effects.clone()).with_splash_on_detection(true));

        channel.publish(Batch::new(vec![
            Detection::pixel(1, 0.0, 0.0),
            Detection::pixel(2, 640.0, 480.0),
        ]));
        scheduler.execute_once(&mut world, 0.1);

        let log = effects.0.lock().unwrap();
        assert_eq!(log.iter().filter(|line| line.starts_with("splash")).count(), 2);
    }

    #[test]
    fn tide_drives_water_level_and_water_reacts_late() {
        let channel = Arc::new(InboundChannel::new());
        let effects = SharedEffects::default();
        let mut world = World::new();
        let mut scheduler = Scheduler::new();
        scheduler
            .add_system(tracking(channel.clone(), effects.clone()))
            .add_system(TideSystem::new(TideController::new(TideSettings::default(), 0.0)))
            .add_system(WaterSystem::new("TrackedBox", WaterInteraction::new(0.1), effects.clone()));

        channel.publish(Batch::new(vec![Detection::pixel(1, 320.0, 240.0)]));
        scheduler.execute_once(&mut world, 0.1);

        assert_eq!(world.get_resource::<WaterLevel>(), Some(&WaterLevel(0.5)));
        assert!(world.get_resource::<TideState>().is_some());
        let log = effects.0.lock().unwrap().clone();
        assert!(log[0].starts_with("splash"));
        assert!(log[1].starts_with("foam"));
    }

    #[test]
    fn toggle_requests_lower_the_tide() {
        let (requests, toggles) = crossbeam_channel::unbounded();
        let mut world = World::new();
        let mut scheduler = Scheduler::new();
        scheduler.add_system(
            TideSystem::new(TideController::new(TideSettings::default(), 0.0)).with_toggle_requests(toggles),
        );

        scheduler.execute_once(&mut world, 0.5);
        assert_eq!(world.get_resource::<WaterLevel>(), Some(&WaterLevel(0.5)));

        requests.send(()).unwrap();
        // Toggled at t=1.0, the default two second transition ends at t=3.0
        for _ in 0..5 {
            scheduler.execute_once(&mut world, 0.5);
        }
        assert_eq!(world.get_resource::<WaterLevel>(), Some(&WaterLevel(-0.5)));
        assert_eq!(world.get_resource::<TideState>().unwrap().volume, 0.0);

        // Two presses in one tick cancel out
        requests.send(()).unwrap();
        requests.send(()).unwrap();
        scheduler.execute_once(&mut world, 0.5);
        assert_eq!(world.get_resource::<WaterLevel>(), Some(&WaterLevel(-0.5)));
    }

    #[test]
    fn fish_system_keeps_school_swimming() {
        let params = FishParams {
            count: 4,
            bounds: SwimBounds {
                min_x: -3.0,
                max_x: 3.0,
                min_z: -3.0,
                max_z: 3.0,
            },
            ..FishParams::default()
        };
        let mut school = FishSchool::with_seed(params, 11);
        let mut world = World::new();
        school.populate(0.0, &mut world);
        let before = world.query_tagged("Fish");

        let mut scheduler = Scheduler::new();
        scheduler.add_system(FishSystem::new(school));
        for _ in 0..30 {
            scheduler.execute_once(&mut world, 1.0 / 30.0);
        }

        assert_eq!(world.count_tagged("Fish"), 4);
        let after = world.query_tagged("Fish");
        for (handle, position) in before {
            let (_, moved) = after.iter().find(|(h, _)| *h == handle).copied().unwrap();
            assert_ne!(moved, position);
            assert!(moved.x.abs() < 4.0 && moved.z.abs() < 4.0);
        }
    }
}
