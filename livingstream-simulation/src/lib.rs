//! Scene-side behavior of the installation: mapping sensor points into the
//! scene, reconciling tracked proxies, and the effects that react to them.

pub mod fish;
pub mod mapping;
pub mod proxy;
pub mod repulsion;
pub mod systems;
pub mod tide;
pub mod water;

pub use fish::{FishMovement, FishParams, FishReport, FishSchool, SpawnRequest, SwimBounds};
pub use mapping::{
    CoordinateMapper, GroundPlane, MappingStrategy, PixelScaleMapper, PlanarMapper, SpatialMapper,
};
pub use proxy::{
    proxy_color, MotionPolicy, ProxyReconciler, ReconcileReport, ReconcilerSettings, RemovalPolicy,
    TrackedProxy,
};
pub use repulsion::RepulsionEffect;
pub use systems::{FishSystem, TideSystem, TrackingSystem, WaterSystem};
pub use tide::{TideController, TidePhase, TideSettings, TideState};
pub use water::{LogEffects, WaterEffects, WaterInteraction, WaterReport, WaterSurface};
