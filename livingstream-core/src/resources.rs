/// Frame clock advanced by the scheduler before any system runs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Time {
    pub delta_seconds: f32,
    pub elapsed_seconds: f64,
    pub frame: u64,
}

impl Default for Time {
    fn default() -> Self {
        Self {
            delta_seconds: 1.0 / 60.0, // Default 60 FPS
            elapsed_seconds: 0.0,
            frame: 0,
        }
    }
}

impl Time {
    pub fn advance(&mut self, delta_seconds: f32) {
        self.delta_seconds = delta_seconds;
        self.elapsed_seconds += delta_seconds as f64;
        self.frame += 1;
    }
}

/// Height of the water surface in world units, written by whatever drives the tide
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterLevel(pub f32);
