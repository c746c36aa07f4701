//! Turns the loaded [`Config`] into runtime settings and a ready-to-tick
//! world and scheduler.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use glam::{Vec2, Vec3};
use livingstream_config::{
    Config, FishConfig, GroundPlane as PlaneConfig, MappingConfig, MotionConfig, ReceiverConfig,
    ReconcilerConfig, RemovalConfig, RepulsionConfig, TideConfig,
};
use livingstream_core::{Scheduler, World};
use livingstream_simulation::{
    FishParams, FishSchool, FishSystem, GroundPlane, LogEffects, MappingStrategy, MotionPolicy,
    PixelScaleMapper, PlanarMapper, ProxyReconciler, ReconcilerSettings, RemovalPolicy,
    RepulsionEffect, SpatialMapper, SwimBounds, TideController, TideSettings, TideState,
    TideSystem, TrackingSystem, WaterInteraction, WaterSystem,
};
use livingstream_transport::{InboundChannel, ReceiverSettings};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::RunnerError;

/// Seconds from config or the command line, rejecting negative and
/// non-finite values instead of panicking
pub fn seconds(what: &'static str, value: f32) -> Result<Duration, RunnerError> {
    Duration::try_from_secs_f32(value).map_err(|source| RunnerError::Duration { what, value, source })
}

pub fn plane(config: PlaneConfig) -> GroundPlane {
    match config {
        PlaneConfig::Xy => GroundPlane::Xy,
        PlaneConfig::Xz => GroundPlane::Xz,
    }
}

pub fn receiver_settings(config: &ReceiverConfig) -> ReceiverSettings {
    ReceiverSettings {
        bind_address: config.bind_address.clone(),
        port: config.port,
        poll_interval: Duration::from_millis(config.poll_interval_ms),
        max_datagram_bytes: config.max_datagram_bytes,
    }
}

pub fn mapping_strategy(config: &MappingConfig) -> MappingStrategy {
    match config {
        MappingConfig::Planar(options) => MappingStrategy::Planar(PlanarMapper {
            sensor_size: Vec2::new(options.sensor_width, options.sensor_height),
            scene_size: Vec2::new(options.scene_width, options.scene_height),
            origin: Vec2::from(options.scene_origin),
            ground_height: options.ground_height,
            plane: plane(options.plane),
        }),
        MappingConfig::Spatial(options) => MappingStrategy::Spatial(SpatialMapper {
            preserve_vertical: options.preserve_vertical,
            scale: options.scale,
            offset: Vec3::from(options.offset),
            ground_height: options.ground_height,
            ..SpatialMapper::with_tilt_degrees(options.tilt_degrees)
        }),
        MappingConfig::PixelScale(options) => MappingStrategy::PixelScale(PixelScaleMapper {
            scale_factor: options.scale_factor,
            ground_height: options.ground_height,
            plane: plane(options.plane),
        }),
    }
}

pub fn reconciler_settings(config: &ReconcilerConfig) -> ReconcilerSettings {
    let removal = match config.removal {
        RemovalConfig::Immediate => RemovalPolicy::Immediate,
        RemovalConfig::Timeout {
            timeout_seconds,
            check_interval_ticks,
        } => RemovalPolicy::Timeout {
            timeout: timeout_seconds as f64,
            check_interval_ticks,
        },
    };
    let motion = match config.motion {
        MotionConfig::Direct => MotionPolicy::Direct,
        MotionConfig::Smoothed { rate } => MotionPolicy::Smoothed { rate },
    };
    ReconcilerSettings {
        proxy_tag: config.proxy_tag.clone(),
        removal,
        motion,
    }
}

pub fn repulsion_effect(config: &RepulsionConfig) -> Option<RepulsionEffect> {
    config.enabled.then(|| RepulsionEffect {
        tag: config.tag.clone(),
        influence_radius: config.influence_radius,
        push_speed: config.push_speed,
        plane: plane(config.plane),
    })
}

pub fn fish_params(config: &FishConfig) -> FishParams {
    FishParams {
        tag: config.tag.clone(),
        count: config.count as usize,
        speed: config.speed,
        swim_height: config.swim_height,
        bounds: SwimBounds {
            min_x: config.bounds.min_x,
            max_x: config.bounds.max_x,
            min_z: config.bounds.min_z,
            max_z: config.bounds.max_z,
        },
        sway_amplitude: config.sway_amplitude,
        sway_frequency: config.sway_frequency,
        respawn_margin: config.respawn_margin,
        fade_in_seconds: config.fade_in_seconds,
    }
}

pub fn tide_settings(config: &TideConfig) -> TideSettings {
    TideSettings {
        raised: TideState {
            ocean_height: config.ocean_height,
            light_intensity: config.light_intensity,
            volume: config.volume,
            logo_position: Vec3::from(config.logo_position),
        },
        ocean_lower_amount: config.ocean_lower_amount,
        light_intensity_change: config.light_intensity_change,
        logo_move_amount: config.logo_move_amount,
        duration_seconds: config.duration_seconds as f64,
        auto_toggle_seconds: config.auto_toggle_seconds.map(f64::from),
    }
}

/// Build the headless world and register every system in tick order:
/// tide, tracking, fish, then water in the late phase.
pub fn build_scene(
    config: &Config,
    channel: Arc<InboundChannel>,
    tide_toggles: Option<Receiver<()>>,
    seed: Option<u64>,
) -> (World, Scheduler) {
    let mut world = World::new();
    let mut scheduler = Scheduler::new();

    let mut tide = TideSystem::new(TideController::new(tide_settings(&config.tide), 0.0));
    if let Some(toggles) = tide_toggles {
        tide = tide.with_toggle_requests(toggles);
    }
    scheduler.add_system(tide);

    let reconciler = ProxyReconciler::new(
        mapping_strategy(&config.mapping),
        reconciler_settings(&config.reconciler),
    );
    let mut tracking = TrackingSystem::new(channel, reconciler, LogEffects)
        .with_splash_on_detection(config.repulsion.splash_on_detection);
    if let Some(repulsion) = repulsion_effect(&config.repulsion) {
        tracking = tracking.with_repulsion(repulsion);
    }
    scheduler.add_system(tracking);

    if config.fish.count > 0 {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut school = FishSchool::new(fish_params(&config.fish), rng);
        let spawned = school.populate(0.0, &mut world);
        info!("Spawned {} fish", spawned);
        scheduler.add_system(FishSystem::new(school));
    }

    if config.water.enabled {
        scheduler.add_system(WaterSystem::new(
            config.reconciler.proxy_tag.clone(),
            WaterInteraction::new(config.water.foam_offset),
            LogEffects,
        ));
    }

    (world, scheduler)
}
