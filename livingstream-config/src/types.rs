use serde::{Deserialize, Serialize};

// --- Top-Level Config Struct ---

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_framerate")]
    pub framerate: u32,
    #[serde(default)]
    pub receiver: ReceiverConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
    #[serde(default)]
    pub repulsion: RepulsionConfig,
    #[serde(default)]
    pub water: WaterConfig,
    #[serde(default)]
    pub fish: FishConfig,
    #[serde(default)]
    pub tide: TideConfig,
    /// Seconds between status log lines in the runner
    #[serde(default = "default_status_interval")]
    pub status_interval_seconds: f32,
}

fn default_framerate() -> u32 { 60 }
fn default_status_interval() -> f32 { 5.0 }

impl Default for Config {
    fn default() -> Self {
        Self {
            framerate: default_framerate(),
            receiver: ReceiverConfig::default(),
            mapping: MappingConfig::default(),
            reconciler: ReconcilerConfig::default(),
            repulsion: RepulsionConfig::default(),
            water: WaterConfig::default(),
            fish: FishConfig::default(),
            tide: TideConfig::default(),
            status_interval_seconds: default_status_interval(),
        }
    }
}

// --- Receiver ---

/// UDP listener settings. The port must match the sensor emitter's target port.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReceiverConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on how long a blocked receive waits before re-checking for shutdown
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_datagram_bytes")]
    pub max_datagram_bytes: usize,
}

fn default_bind_address() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 5005 }
fn default_poll_interval_ms() -> u64 { 100 }
fn default_max_datagram_bytes() -> usize { 65_507 }

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            poll_interval_ms: default_poll_interval_ms(),
            max_datagram_bytes: default_max_datagram_bytes(),
        }
    }
}

// --- Mapping ---

/// Which world plane the 2D scene is laid out on
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GroundPlane {
    /// Scene X/Y with the Z axis held at the ground height
    Xy,
    /// Scene X/Z with the Y axis held at the ground height
    #[default]
    Xz,
}

/// Enum defining the mapping strategy and its specific configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", content = "options", rename_all = "snake_case")]
pub enum MappingConfig {
    Planar(PlanarMappingConfig),
    Spatial(SpatialMappingConfig),
    PixelScale(PixelScaleMappingConfig),
}

impl Default for MappingConfig {
    fn default() -> Self {
        MappingConfig::Planar(PlanarMappingConfig::default())
    }
}

/// Sensor pixels to a rectangle of the scene, Y flipped
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlanarMappingConfig {
    #[serde(default = "default_sensor_width")]
    pub sensor_width: f32,
    #[serde(default = "default_sensor_height")]
    pub sensor_height: f32,
    #[serde(default = "default_scene_width")]
    pub scene_width: f32,
    #[serde(default = "default_scene_height")]
    pub scene_height: f32,
    /// Bottom-left corner of the mapped rectangle
    #[serde(default)]
    pub scene_origin: [f32; 2],
    #[serde(default)]
    pub ground_height: f32,
    #[serde(default)]
    pub plane: GroundPlane,
}

fn default_sensor_width() -> f32 { 640.0 }
fn default_sensor_height() -> f32 { 480.0 }
fn default_scene_width() -> f32 { 10.0 }
fn default_scene_height() -> f32 { 7.5 }

impl Default for PlanarMappingConfig {
    fn default() -> Self {
        Self {
            sensor_width: default_sensor_width(),
            sensor_height: default_sensor_height(),
            scene_width: default_scene_width(),
            scene_height: default_scene_height(),
            scene_origin: [0.0, 0.0],
            ground_height: 0.0,
            plane: GroundPlane::default(),
        }
    }
}

/// Depth-camera meters to the scene ground plane
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SpatialMappingConfig {
    /// Rotation about the sensor's X axis, in degrees
    #[serde(default = "default_tilt_degrees")]
    pub tilt_degrees: f32,
    /// Keep the rotated vertical component instead of pinning to the ground
    #[serde(default)]
    pub preserve_vertical: bool,
    #[serde(default = "default_unit_scale")]
    pub scale: f32,
    #[serde(default)]
    pub offset: [f32; 3],
    #[serde(default)]
    pub ground_height: f32,
}

fn default_tilt_degrees() -> f32 { -30.0 }
fn default_unit_scale() -> f32 { 1.0 }

impl Default for SpatialMappingConfig {
    fn default() -> Self {
        Self {
            tilt_degrees: default_tilt_degrees(),
            preserve_vertical: false,
            scale: default_unit_scale(),
            offset: [0.0; 3],
            ground_height: 0.0,
        }
    }
}

/// Pixels divided by a constant, no flip
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PixelScaleMappingConfig {
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f32,
    #[serde(default)]
    pub ground_height: f32,
    #[serde(default)]
    pub plane: GroundPlane,
}

fn default_scale_factor() -> f32 { 100.0 }

impl Default for PixelScaleMappingConfig {
    fn default() -> Self {
        Self {
            scale_factor: default_scale_factor(),
            ground_height: 0.0,
            plane: GroundPlane::default(),
        }
    }
}

// --- Reconciler ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReconcilerConfig {
    /// Tag and name prefix given to every proxy
    #[serde(default = "default_proxy_tag")]
    pub proxy_tag: String,
    #[serde(default)]
    pub removal: RemovalConfig,
    #[serde(default)]
    pub motion: MotionConfig,
}

fn default_proxy_tag() -> String { "TrackedBox".to_string() }

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            proxy_tag: default_proxy_tag(),
            removal: RemovalConfig::default(),
            motion: MotionConfig::default(),
        }
    }
}

/// When a proxy whose ID stopped appearing gets removed
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RemovalConfig {
    /// Remove as soon as a new batch arrives without the ID
    Immediate,
    /// Remove once the ID has not been seen for `timeout_seconds`
    Timeout {
        #[serde(default = "default_timeout_seconds")]
        timeout_seconds: f32,
        /// Evaluate the timeout every N ticks
        #[serde(default = "default_check_interval_ticks")]
        check_interval_ticks: u32,
    },
}

fn default_timeout_seconds() -> f32 { 2.0 }
fn default_check_interval_ticks() -> u32 { 1 }

impl Default for RemovalConfig {
    fn default() -> Self {
        RemovalConfig::Timeout {
            timeout_seconds: default_timeout_seconds(),
            check_interval_ticks: default_check_interval_ticks(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MotionConfig {
    /// Snap proxies to each new detection
    #[default]
    Direct,
    /// Ease toward the latest detection; higher rates converge faster
    Smoothed { rate: f32 },
}

// --- Repulsion ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RepulsionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Actors carrying this tag get pushed away from detections
    #[serde(default = "default_fish_tag")]
    pub tag: String,
    #[serde(default = "default_influence_radius")]
    pub influence_radius: f32,
    #[serde(default = "default_push_speed")]
    pub push_speed: f32,
    #[serde(default)]
    pub plane: GroundPlane,
    /// Play a splash at every detection point each tick
    #[serde(default)]
    pub splash_on_detection: bool,
}

fn default_true() -> bool { true }
fn default_fish_tag() -> String { "Fish".to_string() }
fn default_influence_radius() -> f32 { 2.0 }
fn default_push_speed() -> f32 { 5.0 }

impl Default for RepulsionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tag: default_fish_tag(),
            influence_radius: default_influence_radius(),
            push_speed: default_push_speed(),
            plane: GroundPlane::default(),
            splash_on_detection: false,
        }
    }
}

// --- Water ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WaterConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Foam sits this far above the water surface
    #[serde(default = "default_foam_offset")]
    pub foam_offset: f32,
}

fn default_foam_offset() -> f32 { 0.1 }

impl Default for WaterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            foam_offset: default_foam_offset(),
        }
    }
}

// --- Fish ---

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct SwimBoundsConfig {
    pub min_x: f32,
    pub max_x: f32,
    pub min_z: f32,
    pub max_z: f32,
}

impl Default for SwimBoundsConfig {
    fn default() -> Self {
        Self {
            min_x: -15.0,
            max_x: 15.0,
            min_z: -15.0,
            max_z: 15.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FishConfig {
    #[serde(default = "default_fish_count")]
    pub count: u32,
    #[serde(default = "default_fish_tag")]
    pub tag: String,
    #[serde(default = "default_fish_speed")]
    pub speed: f32,
    /// Height the school swims at
    #[serde(default = "default_swim_height")]
    pub swim_height: f32,
    #[serde(default)]
    pub bounds: SwimBoundsConfig,
    #[serde(default = "default_sway_amplitude")]
    pub sway_amplitude: f32,
    #[serde(default = "default_sway_frequency")]
    pub sway_frequency: f32,
    /// How far past the bounds a fish may be pushed before it is respawned
    #[serde(default = "default_respawn_margin")]
    pub respawn_margin: f32,
    #[serde(default = "default_fade_in_seconds")]
    pub fade_in_seconds: f32,
}

fn default_fish_count() -> u32 { 12 }
fn default_fish_speed() -> f32 { 2.0 }
fn default_swim_height() -> f32 { -0.5 }
fn default_sway_amplitude() -> f32 { 0.5 }
fn default_sway_frequency() -> f32 { 2.0 }
fn default_respawn_margin() -> f32 { 1.0 }
fn default_fade_in_seconds() -> f32 { 1.0 }

impl Default for FishConfig {
    fn default() -> Self {
        Self {
            count: default_fish_count(),
            tag: default_fish_tag(),
            speed: default_fish_speed(),
            swim_height: default_swim_height(),
            bounds: SwimBoundsConfig::default(),
            sway_amplitude: default_sway_amplitude(),
            sway_frequency: default_sway_frequency(),
            respawn_margin: default_respawn_margin(),
            fade_in_seconds: default_fade_in_seconds(),
        }
    }
}

// --- Tide ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TideConfig {
    /// Water surface height with the tide raised
    #[serde(default = "default_ocean_height")]
    pub ocean_height: f32,
    #[serde(default = "default_ocean_lower_amount")]
    pub ocean_lower_amount: f32,
    #[serde(default = "default_light_intensity")]
    pub light_intensity: f32,
    #[serde(default = "default_light_intensity_change")]
    pub light_intensity_change: f32,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default = "default_logo_position")]
    pub logo_position: [f32; 3],
    #[serde(default = "default_logo_move_amount")]
    pub logo_move_amount: f32,
    #[serde(default = "default_tide_duration")]
    pub duration_seconds: f32,
    /// Toggle the tide on its own every N seconds
    #[serde(default)]
    pub auto_toggle_seconds: Option<f32>,
}

fn default_ocean_height() -> f32 { 0.5 }
fn default_ocean_lower_amount() -> f32 { 1.0 }
fn default_light_intensity() -> f32 { 1.0 }
fn default_light_intensity_change() -> f32 { 0.5 }
fn default_volume() -> f32 { 1.0 }
fn default_logo_position() -> [f32; 3] { [0.0, 2.0, 0.0] }
fn default_logo_move_amount() -> f32 { 2.0 }
fn default_tide_duration() -> f32 { 2.0 }

impl Default for TideConfig {
    fn default() -> Self {
        Self {
            ocean_height: default_ocean_height(),
            ocean_lower_amount: default_ocean_lower_amount(),
            light_intensity: default_light_intensity(),
            light_intensity_change: default_light_intensity_change(),
            volume: default_volume(),
            logo_position: default_logo_position(),
            logo_move_amount: default_logo_move_amount(),
            duration_seconds: default_tide_duration(),
            auto_toggle_seconds: None,
        }
    }
}
