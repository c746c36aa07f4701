//! Per-id proxy lifecycle.
//!
//! Each tick the reconciler folds the latest [`Batch`] (if any) into a map of
//! detection id to renderable handle: new ids get a proxy, known ids are
//! moved and their last-seen time refreshed, and ids that fall out of the
//! removal policy are destroyed. Renderables are only touched through the
//! [`RenderableFactory`] passed in for the tick.

use std::collections::{HashMap, HashSet};

use glam::Vec3;
use livingstream_core::{ActorDesc, ActorHandle, RenderableFactory, SceneError};
use livingstream_transport::{Batch, DetectionId};
use log::{debug, warn};

use crate::mapping::CoordinateMapper;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemovalPolicy {
    /// Drop any proxy whose id is missing from a newly delivered batch
    Immediate,
    /// Drop proxies not seen for longer than `timeout` seconds, checked every
    /// `check_interval_ticks` ticks
    Timeout { timeout: f64, check_interval_ticks: u32 },
}

impl Default for RemovalPolicy {
    fn default() -> Self {
        RemovalPolicy::Timeout {
            timeout: 2.0,
            check_interval_ticks: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MotionPolicy {
    #[default]
    Direct,
    /// Exponential approach toward the last sighting at `rate` per second
    Smoothed { rate: f32 },
}

impl MotionPolicy {
    /// Position after one tick of motion from `current` toward `target`
    pub fn step(self, current: Vec3, target: Vec3, dt: f32) -> Vec3 {
        match self {
            MotionPolicy::Direct => target,
            MotionPolicy::Smoothed { rate } => {
                let alpha = 1.0 - (-rate * dt).exp();
                current.lerp(target, alpha.clamp(0.0, 1.0))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilerSettings {
    pub proxy_tag: String,
    pub removal: RemovalPolicy,
    pub motion: MotionPolicy,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        ReconcilerSettings {
            proxy_tag: "TrackedBox".to_string(),
            removal: RemovalPolicy::default(),
            motion: MotionPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedProxy {
    pub id: DetectionId,
    pub handle: ActorHandle,
    pub last_seen: f64,
    /// Where the renderable currently is
    pub position: Vec3,
    /// Where the latest sighting put it
    pub target: Vec3,
}

/// What one tick changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub created: Vec<DetectionId>,
    pub updated: usize,
    pub removed: Vec<DetectionId>,
    /// Entries dropped because the renderable had been invalidated elsewhere
    pub stale: usize,
    /// Mapped scene position of every located detection, in batch order
    pub points: Vec<Vec3>,
}

/// Evenly spaced hue per id, full saturation and value
pub fn proxy_color(id: DetectionId) -> [f32; 3] {
    let hue = id.rem_euclid(10) as f32 / 10.0;
    hsv_to_rgb(hue, 1.0, 1.0)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    let scaled = (h.rem_euclid(1.0)) * 6.0;
    let sector = scaled.floor();
    let f = scaled - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match sector as u32 {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

pub struct ProxyReconciler<M> {
    mapper: M,
    settings: ReconcilerSettings,
    proxies: HashMap<DetectionId, TrackedProxy>,
    ticks_since_check: u32,
}

impl<M: CoordinateMapper> ProxyReconciler<M> {
    pub fn new(mapper: M, settings: ReconcilerSettings) -> Self {
        ProxyReconciler {
            mapper,
            settings,
            proxies: HashMap::new(),
            ticks_since_check: 0,
        }
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn get(&self, id: DetectionId) -> Option<&TrackedProxy> {
        self.proxies.get(&id)
    }

    /// Tracked ids in ascending order
    pub fn tracked_ids(&self) -> Vec<DetectionId> {
        let mut ids: Vec<_> = self.proxies.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Run one tick. `batch` is whatever the inbound channel yielded, `now`
    /// the host clock in seconds.
    pub fn reconcile<F: RenderableFactory + ?Sized>(
        &mut self,
        batch: Option<&Batch>,
        now: f64,
        dt: f32,
        scene: &mut F,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let seen = batch.map(|batch| self.apply_batch(batch, now, scene, &mut report));

        if let MotionPolicy::Smoothed { .. } = self.settings.motion {
            self.advance_motion(dt, scene, &mut report);
        }

        match self.settings.removal {
            RemovalPolicy::Immediate => {
                if let Some(seen) = seen {
                    self.remove_where(|proxy| !seen.contains(&proxy.id), scene, &mut report);
                }
            }
            RemovalPolicy::Timeout {
                timeout,
                check_interval_ticks,
            } => {
                self.ticks_since_check += 1;
                if self.ticks_since_check >= check_interval_ticks.max(1) {
                    self.ticks_since_check = 0;
                    self.remove_where(|proxy| now - proxy.last_seen > timeout, scene, &mut report);
                }
            }
        }

        report
    }

    /// Destroy every proxy, e.g. on shutdown
    pub fn clear<F: RenderableFactory + ?Sized>(&mut self, scene: &mut F) -> Vec<DetectionId> {
        let mut report = ReconcileReport::default();
        self.remove_where(|_| true, scene, &mut report);
        report.removed
    }

    fn apply_batch<F: RenderableFactory + ?Sized>(
        &mut self,
        batch: &Batch,
        now: f64,
        scene: &mut F,
        report: &mut ReconcileReport,
    ) -> HashSet<DetectionId> {
        let mut seen = HashSet::with_capacity(batch.detections.len() + batch.unlocated.len());

        for detection in &batch.detections {
            seen.insert(detection.id);
            match self.mapper.map(&detection.point) {
                Some(position) if position.is_finite() => {
                    report.points.push(position);
                    self.sight(detection.id, position, now, scene, report);
                }
                Some(position) => {
                    debug!("Detection {} mapped off the scene to {}, not placing", detection.id, position);
                    self.touch(detection.id, now);
                }
                None => {
                    debug!("Detection {} has a point kind the mapper cannot place", detection.id);
                    self.touch(detection.id, now);
                }
            }
        }

        for &id in &batch.unlocated {
            seen.insert(id);
            self.touch(id, now);
        }

        seen
    }

    /// Refresh last-seen without moving
    fn touch(&mut self, id: DetectionId, now: f64) {
        if let Some(proxy) = self.proxies.get_mut(&id) {
            proxy.last_seen = now;
        }
    }

    fn sight<F: RenderableFactory + ?Sized>(
        &mut self,
        id: DetectionId,
        position: Vec3,
        now: f64,
        scene: &mut F,
        report: &mut ReconcileReport,
    ) {
        if let Some(proxy) = self.proxies.get_mut(&id) {
            proxy.target = position;
            proxy.last_seen = now;
            if self.settings.motion != MotionPolicy::Direct {
                report.updated += 1;
                return;
            }
            match scene.set_position(proxy.handle, position) {
                Ok(()) => {
                    proxy.position = position;
                    report.updated += 1;
                    return;
                }
                Err(e) => {
                    warn!("Proxy for id {} lost its renderable ({}), recreating", id, e);
                    self.proxies.remove(&id);
                    report.stale += 1;
                }
            }
        }

        let tag = &self.settings.proxy_tag;
        let desc = ActorDesc::new(format!("{}_{}", tag, id), tag.as_str(), position)
            .with_color(proxy_color(id));
        match scene.create(desc) {
            Ok(handle) => {
                debug!("Created proxy {} for id {} at {}", handle, id, position);
                self.proxies.insert(
                    id,
                    TrackedProxy {
                        id,
                        handle,
                        last_seen: now,
                        position,
                        target: position,
                    },
                );
                report.created.push(id);
            }
            Err(e) => warn!("Could not create proxy for id {}: {}", id, e),
        }
    }

    fn advance_motion<F: RenderableFactory + ?Sized>(
        &mut self,
        dt: f32,
        scene: &mut F,
        report: &mut ReconcileReport,
    ) {
        let motion = self.settings.motion;
        let mut lost = Vec::new();

        for proxy in self.proxies.values_mut() {
            if proxy.position == proxy.target {
                continue;
            }
            let next = motion.step(proxy.position, proxy.target, dt);
            match scene.set_position(proxy.handle, next) {
                Ok(()) => proxy.position = next,
                Err(e) => {
                    warn!("Dropping proxy for id {}: {}", proxy.id, e);
                    lost.push(proxy.id);
                }
            }
        }

        for id in lost {
            self.proxies.remove(&id);
            report.stale += 1;
        }
    }

    fn remove_where<F: RenderableFactory + ?Sized>(
        &mut self,
        mut condition: impl FnMut(&TrackedProxy) -> bool,
        scene: &mut F,
        report: &mut ReconcileReport,
    ) {
        let mut doomed: Vec<DetectionId> = self
            .proxies
            .values()
            .filter(|proxy| condition(proxy))
            .map(|proxy| proxy.id)
            .collect();
        doomed.sort_unstable();

        for id in doomed {
            let Some(proxy) = self.proxies.remove(&id) else {
                continue;
            };
            match scene.destroy(proxy.handle) {
                Ok(()) => debug!("Removed proxy {} for id {}", proxy.handle, id),
                Err(SceneError::StaleHandle(handle)) => {
                    warn!("Proxy {} for id {} was already gone", handle, id);
                    report.stale += 1;
                }
                Err(e) => warn!("Failed to destroy proxy for id {}: {}", id, e),
            }
            report.removed.push(id);
        }
    }
}
