//! Headless scene host for the LivingStream installation.
//!
//! Provides the pieces every tick system builds on: generational actor
//! handles, the [`World`] that stores tagged actors and typed resources, the
//! renderable/actor collaborator traits, an explicit [`Scheduler`], and
//! tween state for multi-frame transitions.

pub mod entity;
pub mod error;
pub mod resources;
pub mod scene;
pub mod scheduler;
pub mod transition;
pub mod world;

pub use entity::{ActorHandle, HandleAllocator};
pub use error::{SceneError, SceneResult};
pub use resources::{Time, WaterLevel};
pub use scene::{ActorDesc, ActorQuery, RenderableFactory, Scene};
pub use scheduler::{Scheduler, System};
pub use transition::{Lerp, Transition};
pub use world::{Actor, World};

// Re-export the vector types used across the public API
pub use glam::{Quat, Vec2, Vec3};
