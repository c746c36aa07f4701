//! The installation host loop: receive in the background, tick the scene at
//! the configured framerate, report status periodically.

use std::io::BufRead;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, TryRecvError};
use hdrhistogram::Histogram;
use livingstream_config::Config;
use livingstream_core::{Scheduler, World};
use livingstream_simulation::TideState;
use livingstream_transport::{spawn_receiver, InboundChannel, ReceiverHandle};
use log::{debug, info, warn};

use crate::error::RunnerError;
use crate::setup::{build_scene, receiver_settings, seconds};

/// Longest step a single tick may advance the scene clock, so a stall does
/// not turn into one huge repulsion push
pub const MAX_FRAME_DELTA: f32 = 0.25;

pub struct RunOptions {
    /// Stop after this many frames instead of waiting for Ctrl+C
    pub max_frames: Option<u64>,
    pub seed: Option<u64>,
    /// Toggle the tide every time a line is read from stdin
    pub tide_on_enter: bool,
}

/// Scene time step derived from wall time between tick starts.
///
/// The first tick advances by the nominal frame length.
pub struct FrameClock {
    nominal: f32,
    max_delta: f32,
    last_tick: Option<Instant>,
}

impl FrameClock {
    pub fn new(nominal: Duration, max_delta: f32) -> Self {
        FrameClock {
            nominal: nominal.as_secs_f32(),
            max_delta,
            last_tick: None,
        }
    }

    pub fn tick(&mut self, now: Instant) -> f32 {
        let dt = match self.last_tick {
            Some(last) => now.saturating_duration_since(last).as_secs_f32(),
            None => self.nominal,
        };
        self.last_tick = Some(now);
        dt.min(self.max_delta)
    }
}

/// Every line on stdin becomes a tide toggle request.
///
/// The reader thread is detached; it ends at EOF or once the scene drops the
/// receiving side.
fn stdin_tide_toggles() -> Receiver<()> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            if line.is_err() || tx.send(()).is_err() {
                break;
            }
        }
        debug!("Stopped reading tide toggles from stdin");
    });
    rx
}

/// Ctrl+C as a channel the loop can poll
pub fn shutdown_signal() -> Result<Receiver<()>, RunnerError> {
    let (tx, rx) = bounded(1);
    ctrlc::set_handler(move || {
        // A second press while the first is pending changes nothing
        let _ = tx.try_send(());
    })?;
    Ok(rx)
}

pub fn run(config: &Config, options: RunOptions, shutdown: Receiver<()>) -> Result<(), RunnerError> {
    let channel = Arc::new(InboundChannel::new());
    let receiver = spawn_receiver(receiver_settings(&config.receiver), channel.clone())?;
    let tide_toggles = options.tide_on_enter.then(stdin_tide_toggles);
    if tide_toggles.is_some() {
        info!("Press Enter to toggle the tide");
    }
    let (mut world, mut scheduler) = build_scene(config, channel.clone(), tide_toggles, options.seed);

    info!(
        "Running at {} FPS with {} systems, listening on {}",
        config.framerate,
        scheduler.len(),
        receiver.local_addr()
    );

    let outcome = tick_loop(config, &options, &shutdown, &mut world, &mut scheduler, &channel, &receiver);

    let stats = receiver.stats();
    receiver.shutdown()?;
    info!(
        "Stopped: {} datagrams received, {} published, {} decode errors, {} socket errors",
        stats.datagrams, stats.published, stats.decode_errors, stats.socket_errors
    );
    outcome
}

fn tick_loop(
    config: &Config,
    options: &RunOptions,
    shutdown: &Receiver<()>,
    world: &mut World,
    scheduler: &mut Scheduler,
    channel: &InboundChannel,
    receiver: &ReceiverHandle,
) -> Result<(), RunnerError> {
    let frame_duration = Duration::from_secs_f64(1.0 / config.framerate as f64);
    let status_interval = seconds("status interval", config.status_interval_seconds)?;
    let mut clock = FrameClock::new(frame_duration, MAX_FRAME_DELTA);

    let mut tick_micros = Histogram::<u64>::new_with_bounds(1, 60_000_000, 3)
        .map_err(|e| RunnerError::Stats(format!("{:?}", e)))?;
    let mut last_status = Instant::now();
    let mut frames: u64 = 0;

    loop {
        match shutdown.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                info!("Shutdown requested");
                break;
            }
            Err(TryRecvError::Empty) => {}
        }
        if options.max_frames.map_or(false, |max| frames >= max) {
            break;
        }

        let frame_start = Instant::now();
        let took = scheduler.execute_once(world, clock.tick(frame_start));
        tick_micros.saturating_record(took.as_micros() as u64);
        frames += 1;

        if last_status.elapsed() >= status_interval {
            report_status(config, world, channel, receiver, &tick_micros);
            tick_micros.reset();
            last_status = Instant::now();
        }

        let elapsed = frame_start.elapsed();
        if elapsed < frame_duration {
            spin_sleep::sleep(frame_duration - elapsed);
        } else if config.framerate > 10 {
            warn!("Frame time exceeded budget: {:?} > {:?}", elapsed, frame_duration);
        }
    }

    debug!("Tick loop ran {} frames", frames);
    Ok(())
}

fn report_status(
    config: &Config,
    world: &World,
    channel: &InboundChannel,
    receiver: &ReceiverHandle,
    tick_micros: &Histogram<u64>,
) {
    let stats = receiver.stats();
    let tide = world
        .get_resource::<TideState>()
        .map_or(f32::NAN, |state| state.ocean_height);
    info!(
        "{} proxies, {} fish, ocean at {:.2} | {} datagrams, {} decode errors, {} batches overwritten | tick p50 {}us p99 {}us max {}us",
        world.count_tagged(&config.reconciler.proxy_tag),
        world.count_tagged(&config.fish.tag),
        tide,
        stats.datagrams,
        stats.decode_errors,
        channel.overwritten_count(),
        tick_micros.value_at_quantile(0.5),
        tick_micros.value_at_quantile(0.99),
        tick_micros.max(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use livingstream_core::{System, Time};
    use livingstream_simulation::{
        LogEffects, PlanarMapper, ProxyReconciler, ReconcilerSettings, RemovalPolicy, TrackingSystem,
    };
    use livingstream_transport::{spawn_receiver, Batch, Detection};

    struct Stall(Duration);

    impl System for Stall {
        fn name(&self) -> &'static str {
            "stall"
        }

        fn on_tick(&mut self, _world: &mut World, _dt: f32) {
            thread::sleep(self.0);
        }
    }

    #[test]
    fn frame_clock_follows_wall_time_with_a_cap() {
        let mut clock = FrameClock::new(Duration::from_millis(20), MAX_FRAME_DELTA);
        let start = Instant::now();

        assert!((clock.tick(start) - 0.02).abs() < 1e-6);
        assert!((clock.tick(start + Duration::from_millis(45)) - 0.045).abs() < 1e-6);
        assert_eq!(clock.tick(start + Duration::from_secs(3)), MAX_FRAME_DELTA);
        // An out-of-order instant never produces a negative step
        assert_eq!(clock.tick(start), 0.0);
    }

    #[test]
    fn slow_frames_still_age_out_unseen_proxies() {
        let mut config = Config::default();
        config.receiver.bind_address = "127.0.0.1".to_string();
        config.receiver.port = 0;
        config.framerate = 60;

        let channel = Arc::new(InboundChannel::new());
        let receiver = spawn_receiver(receiver_settings(&config.receiver), channel.clone()).unwrap();

        let reconciler = ProxyReconciler::new(
            PlanarMapper::default(),
            ReconcilerSettings {
                removal: RemovalPolicy::Timeout {
                    timeout: 0.2,
                    check_interval_ticks: 1,
                },
                ..ReconcilerSettings::default()
            },
        );
        let mut world = World::new();
        let mut scheduler = Scheduler::new();
        scheduler
            .add_system(TrackingSystem::new(channel.clone(), reconciler, LogEffects))
            .add_system(Stall(Duration::from_millis(50)));

        channel.publish(Batch::new(vec![Detection::pixel(1, 320.0, 240.0)]));
        let (_tx, rx) = bounded(1);
        let options = RunOptions {
            max_frames: Some(10),
            seed: None,
            tide_on_enter: false,
        };
        let start = Instant::now();
        tick_loop(&config, &options, &rx, &mut world, &mut scheduler, &channel, &receiver).unwrap();
        let wall = start.elapsed();
        receiver.shutdown().unwrap();

        let elapsed = world.get_resource::<Time>().unwrap().elapsed_seconds;
        assert!(wall >= Duration::from_millis(450));
        assert!(elapsed >= 0.4, "scene clock only reached {}s", elapsed);
        assert_eq!(world.count_tagged("TrackedBox"), 0);
    }

    #[test]
    fn invalid_status_interval_is_an_error() {
        let mut config = Config::default();
        config.receiver.bind_address = "127.0.0.1".to_string();
        config.receiver.port = 0;
        config.status_interval_seconds = 1e30;

        let (_tx, rx) = bounded(1);
        let options = RunOptions {
            max_frames: Some(1),
            seed: Some(2),
            tide_on_enter: false,
        };
        assert!(matches!(run(&config, options, rx), Err(RunnerError::Duration { .. })));
    }

    #[test]
    fn bounded_run_exits_and_releases_the_socket() {
        let mut config = Config::default();
        config.receiver.bind_address = "127.0.0.1".to_string();
        config.receiver.port = 0;
        config.framerate = 120;
        config.fish.count = 3;

        let (_tx, rx) = bounded(1);
        let options = RunOptions {
            max_frames: Some(10),
            seed: Some(5),
            tide_on_enter: false,
        };
        run(&config, options, rx).unwrap();
    }

    #[test]
    fn shutdown_signal_stops_the_loop() {
        let mut config = Config::default();
        config.receiver.bind_address = "127.0.0.1".to_string();
        config.receiver.port = 0;

        let (tx, rx) = bounded(1);
        tx.send(()).unwrap();
        let start = Instant::now();
        run(&config, RunOptions { max_frames: None, seed: Some(1), tide_on_enter: false }, rx).unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
