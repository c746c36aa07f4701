//! Collaborator contracts between the tick systems and whatever renders the scene.
//!
//! The tracking core never owns renderables directly. It asks a
//! [`RenderableFactory`] to create, move and destroy them, and reads other
//! scene actors through [`ActorQuery`]. [`crate::World`] implements both for
//! headless runs and tests; an engine binding would implement them against its
//! own object model.

use crate::entity::ActorHandle;
use crate::error::SceneResult;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Everything a factory needs to instantiate one renderable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorDesc {
    pub name: String,
    pub tag: String,
    pub position: Vec3,
    /// Linear RGB in `0.0..=1.0`, `None` keeps the prefab's material
    pub color: Option<[f32; 3]>,
    pub opacity: f32,
}

impl ActorDesc {
    pub fn new(name: impl Into<String>, tag: impl Into<String>, position: Vec3) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
            position,
            color: None,
            opacity: 1.0,
        }
    }

    pub fn with_color(mut self, color: [f32; 3]) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }
}

/// Creates, positions and releases renderable objects.
pub trait RenderableFactory {
    fn create(&mut self, desc: ActorDesc) -> SceneResult<ActorHandle>;

    fn set_position(&mut self, handle: ActorHandle, position: Vec3) -> SceneResult<()>;

    fn destroy(&mut self, handle: ActorHandle) -> SceneResult<()>;

    /// Renderers without transparency support may ignore this.
    fn set_opacity(&mut self, handle: ActorHandle, opacity: f32) -> SceneResult<()> {
        let _ = (handle, opacity);
        Ok(())
    }
}

/// Read access to tagged scene actors plus the single mutation the
/// repulsion effect needs.
pub trait ActorQuery {
    /// Current positions of every live actor carrying `tag`, re-evaluated on each call.
    fn query_tagged(&self, tag: &str) -> Vec<(ActorHandle, Vec3)>;

    fn position(&self, handle: ActorHandle) -> SceneResult<Vec3>;

    /// Moves an actor by `delta`.
    fn displace(&mut self, handle: ActorHandle, delta: Vec3) -> SceneResult<()>;
}

/// Convenience bound for systems that need both sides of the contract.
pub trait Scene: RenderableFactory + ActorQuery {}

impl<T: RenderableFactory + ActorQuery> Scene for T {}
