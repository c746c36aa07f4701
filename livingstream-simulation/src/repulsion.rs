use glam::Vec3;
use livingstream_core::ActorQuery;
use log::warn;

use crate::mapping::GroundPlane;

/// Pushes tagged actors away from detection points.
///
/// A positional nudge per tick with no velocity carried over. Actors are
/// looked up by tag on every call, and each detection pushes independently,
/// so two detections near the same actor add up.
#[derive(Debug, Clone, PartialEq)]
pub struct RepulsionEffect {
    pub tag: String,
    pub influence_radius: f32,
    pub push_speed: f32,
    pub plane: GroundPlane,
}

impl Default for RepulsionEffect {
    fn default() -> Self {
        RepulsionEffect {
            tag: "Fish".to_string(),
            influence_radius: 2.0,
            push_speed: 5.0,
            plane: GroundPlane::Xz,
        }
    }
}

impl RepulsionEffect {
    /// Displace actors near each of `points`. Returns the number of nudges.
    pub fn apply<Q: ActorQuery + ?Sized>(&self, points: &[Vec3], dt: f32, scene: &mut Q) -> usize {
        if points.is_empty() || self.influence_radius <= 0.0 {
            return 0;
        }

        let mut actors = scene.query_tagged(&self.tag);
        let step = self.push_speed * dt;
        let mut nudges = 0;

        for point in points {
            let origin = self.plane.project(*point);
            for (handle, position) in actors.iter_mut() {
                let away = self.plane.project(*position) - origin;
                let distance = away.length();
                // Direction is undefined at zero distance
                if distance >= self.influence_radius || distance <= f32::EPSILON {
                    continue;
                }
                let delta = self.plane.lift(away / distance * step);
                match scene.displace(*handle, delta) {
                    Ok(()) => {
                        *position += delta;
                        nudges += 1;
                    }
                    Err(e) => warn!("Could not push {} '{}': {}", handle, self.tag, e),
                }
            }
        }

        nudges
    }
}
