//! Raise/lower tide toggle.
//!
//! Ocean height, light intensity, ambient volume and the logo position move
//! together between a raised and a lowered state. Each toggle starts a fresh
//! transition from wherever the values currently are.

use glam::Vec3;
use livingstream_core::{Lerp, Transition};
use log::info;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TideState {
    pub ocean_height: f32,
    pub light_intensity: f32,
    pub volume: f32,
    pub logo_position: Vec3,
}

impl Lerp for TideState {
    fn lerp(self, target: Self, t: f32) -> Self {
        TideState {
            ocean_height: self.ocean_height.lerp(target.ocean_height, t),
            light_intensity: self.light_intensity.lerp(target.light_intensity, t),
            volume: self.volume.lerp(target.volume, t),
            logo_position: self.logo_position.lerp(target.logo_position, t),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TidePhase {
    Raised,
    Lowered,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TideSettings {
    pub raised: TideState,
    pub ocean_lower_amount: f32,
    pub light_intensity_change: f32,
    pub logo_move_amount: f32,
    pub duration_seconds: f64,
    pub auto_toggle_seconds: Option<f64>,
}

impl Default for TideSettings {
    fn default() -> Self {
        TideSettings {
            raised: TideState {
                ocean_height: 0.5,
                light_intensity: 1.0,
                volume: 1.0,
                logo_position: Vec3::new(0.0, 2.0, 0.0),
            },
            ocean_lower_amount: 1.0,
            light_intensity_change: 0.5,
            logo_move_amount: 2.0,
            duration_seconds: 2.0,
            auto_toggle_seconds: None,
        }
    }
}

impl TideSettings {
    pub fn lowered(&self) -> TideState {
        TideState {
            ocean_height: self.raised.ocean_height - self.ocean_lower_amount,
            light_intensity: self.raised.light_intensity + self.light_intensity_change,
            volume: 0.0,
            logo_position: self.raised.logo_position - Vec3::new(0.0, self.logo_move_amount, 0.0),
        }
    }
}

pub struct TideController {
    settings: TideSettings,
    lowered: TideState,
    phase: TidePhase,
    current: TideState,
    transition: Option<Transition<TideState>>,
    last_toggle: f64,
}

impl TideController {
    /// Starts raised at `now`
    pub fn new(settings: TideSettings, now: f64) -> Self {
        TideController {
            lowered: settings.lowered(),
            current: settings.raised,
            settings,
            phase: TidePhase::Raised,
            transition: None,
            last_toggle: now,
        }
    }

    pub fn phase(&self) -> TidePhase {
        self.phase
    }

    pub fn state(&self) -> TideState {
        self.current
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    /// Button caption for the action the next toggle performs
    pub fn label(&self) -> &'static str {
        match self.phase {
            TidePhase::Lowered => "Raise Tide",
            TidePhase::Raised => "Lower Tide",
        }
    }

    fn sample(&self, now: f64) -> TideState {
        self.transition
            .map_or(self.current, |transition| transition.value_at(now))
    }

    pub fn toggle(&mut self, now: f64) -> TidePhase {
        let from = self.sample(now);
        let (phase, target) = match self.phase {
            TidePhase::Raised => (TidePhase::Lowered, self.lowered),
            TidePhase::Lowered => (TidePhase::Raised, self.settings.raised),
        };
        self.current = from;
        self.phase = phase;
        self.transition = Some(Transition::new(from, target, now, self.settings.duration_seconds));
        self.last_toggle = now;
        info!("Tide {:?}, button now reads '{}'", phase, self.label());
        phase
    }

    /// Advance to `now`, toggling first if the auto interval has elapsed
    pub fn update(&mut self, now: f64) -> TideState {
        if let Some(interval) = self.settings.auto_toggle_seconds {
            if now - self.last_toggle >= interval {
                self.toggle(now);
            }
        }

        self.current = self.sample(now);
        if self.transition.map_or(false, |transition| transition.is_finished(now)) {
            self.transition = None;
        }
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowering_reaches_the_lowered_state_after_duration() {
        let settings = TideSettings::default();
        let mut tide = TideController::new(settings, 0.0);
        assert_eq!(tide.label(), "Lower Tide");

        tide.toggle(1.0);
        assert_eq!(tide.label(), "Raise Tide");

        let midway = tide.update(2.0);
        assert!((midway.ocean_height - 0.0).abs() < 1e-6);
        assert!((midway.volume - 0.5).abs() < 1e-6);
        assert!(tide.is_transitioning());

        let done = tide.update(3.0);
        assert_eq!(done, settings.lowered());
        assert_eq!(done.ocean_height, -0.5);
        assert_eq!(done.light_intensity, 1.5);
        assert_eq!(done.volume, 0.0);
        assert_eq!(done.logo_position, Vec3::ZERO);
        assert!(!tide.is_transitioning());
    }

    #[test]
    fn raising_restores_originals() {
        let settings = TideSettings::default();
        let mut tide = TideController::new(settings, 0.0);
        tide.toggle(0.0);
        tide.update(5.0);
        tide.toggle(5.0);
        assert_eq!(tide.phase(), TidePhase::Raised);
        assert_eq!(tide.update(7.0), settings.raised);
    }

    #[test]
    fn toggle_mid_transition_starts_from_current_values() {
        let mut tide = TideController::new(TideSettings::default(), 0.0);
        tide.toggle(0.0);
        tide.toggle(1.0);

        // Halfway down, now heading back up over a full duration
        let restart = tide.update(1.0);
        assert!((restart.ocean_height - 0.0).abs() < 1e-6);
        let later = tide.update(2.0);
        assert!((later.ocean_height - 0.25).abs() < 1e-6);
        assert_eq!(tide.update(3.0).ocean_height, 0.5);
    }

    #[test]
    fn auto_toggle_fires_on_interval() {
        let settings = TideSettings {
            auto_toggle_seconds: Some(10.0),
            ..TideSettings::default()
        };
        let mut tide = TideController::new(settings, 0.0);

        tide.update(9.9);
        assert_eq!(tide.phase(), TidePhase::Raised);
        tide.update(10.0);
        assert_eq!(tide.phase(), TidePhase::Lowered);
        tide.update(15.0);
        assert_eq!(tide.phase(), TidePhase::Lowered);
        tide.update(20.0);
        assert_eq!(tide.phase(), TidePhase::Raised);
    }
}
