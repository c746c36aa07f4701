//! Multi-frame interpolation as plain data.
//!
//! A [`Transition`] remembers where it started, where it is going, when it
//! started and how long it takes. Systems sample it with the current clock
//! each tick; nothing is suspended between frames.

use glam::Vec3;

/// Linear interpolation between two values of the same type
pub trait Lerp: Copy {
    fn lerp(self, target: Self, t: f32) -> Self;
}

impl Lerp for f32 {
    fn lerp(self, target: Self, t: f32) -> Self {
        self + (target - self) * t
    }
}

impl Lerp for Vec3 {
    fn lerp(self, target: Self, t: f32) -> Self {
        Vec3::lerp(self, target, t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition<T: Lerp> {
    pub start_value: T,
    pub target_value: T,
    pub start_time: f64,
    pub duration: f64,
}

impl<T: Lerp> Transition<T> {
    pub fn new(start_value: T, target_value: T, start_time: f64, duration: f64) -> Self {
        Self {
            start_value,
            target_value,
            start_time,
            duration,
        }
    }

    /// Fraction of the transition elapsed at `now`, clamped to `0.0..=1.0`
    pub fn progress(&self, now: f64) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.start_time) / self.duration).clamp(0.0, 1.0) as f32
    }

    pub fn value_at(&self, now: f64) -> T {
        let t = self.progress(now);
        if t >= 1.0 {
            // Land exactly on the target instead of trusting float accumulation
            return self.target_value;
        }
        self.start_value.lerp(self.target_value, t)
    }

    pub fn is_finished(&self, now: f64) -> bool {
        self.progress(now) >= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_linearly_and_lands_on_target() {
        let transition = Transition::new(0.0_f32, 10.0, 1.0, 2.0);
        assert_eq!(transition.value_at(0.0), 0.0);
        assert_eq!(transition.value_at(1.0), 0.0);
        assert!((transition.value_at(2.0) - 5.0).abs() < 1e-6);
        assert!(!transition.is_finished(2.9));
        assert_eq!(transition.value_at(3.0), 10.0);
        assert_eq!(transition.value_at(50.0), 10.0);
        assert!(transition.is_finished(3.0));
    }

    #[test]
    fn zero_duration_jumps_to_target() {
        let transition = Transition::new(Vec3::ZERO, Vec3::ONE, 4.0, 0.0);
        assert_eq!(transition.value_at(4.0), Vec3::ONE);
        assert!(transition.is_finished(4.0));
    }
}
