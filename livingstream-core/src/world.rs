use std::any::{Any, TypeId};
use std::collections::HashMap;

use glam::Vec3;
use log::trace;

use crate::entity::{ActorHandle, HandleAllocator};
use crate::error::{SceneError, SceneResult};
use crate::scene::{ActorDesc, ActorQuery, RenderableFactory};

/// One renderable stand-in held by the headless [`World`].
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub name: String,
    pub tag: String,
    pub position: Vec3,
    pub color: Option<[f32; 3]>,
    pub opacity: f32,
}

impl From<ActorDesc> for Actor {
    fn from(desc: ActorDesc) -> Self {
        Actor {
            name: desc.name,
            tag: desc.tag,
            position: desc.position,
            color: desc.color,
            opacity: desc.opacity,
        }
    }
}

/// Headless scene: tagged actors addressed by generational handles, plus
/// global resources keyed by type.
pub struct World {
    actors: HashMap<ActorHandle, Actor>,
    allocator: HandleAllocator,
    resources: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl World {
    pub fn new() -> Self {
        World {
            actors: HashMap::new(),
            allocator: HandleAllocator::new(),
            resources: HashMap::new(),
        }
    }

    /// Spawn an actor and return its handle
    pub fn spawn(&mut self, desc: ActorDesc) -> ActorHandle {
        let handle = self.allocator.allocate();
        trace!("Spawned actor {} '{}' ({}) at {}", handle, desc.name, desc.tag, desc.position);
        self.actors.insert(handle, Actor::from(desc));
        handle
    }

    /// Remove an actor, returning it if the handle was live
    pub fn despawn(&mut self, handle: ActorHandle) -> Option<Actor> {
        if !self.allocator.release(handle) {
            return None;
        }
        self.actors.remove(&handle)
    }

    pub fn is_live(&self, handle: ActorHandle) -> bool {
        self.allocator.is_live(handle)
    }

    pub fn actor(&self, handle: ActorHandle) -> Option<&Actor> {
        self.actors.get(&handle)
    }

    pub fn actor_mut(&mut self, handle: ActorHandle) -> Option<&mut Actor> {
        self.actors.get_mut(&handle)
    }

    /// Iterate every live actor
    pub fn actors(&self) -> impl Iterator<Item = (ActorHandle, &Actor)> {
        self.actors.iter().map(|(handle, actor)| (*handle, actor))
    }

    pub fn count_tagged(&self, tag: &str) -> usize {
        self.actors.values().filter(|actor| actor.tag == tag).count()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    fn live_actor_mut(&mut self, handle: ActorHandle) -> SceneResult<&mut Actor> {
        self.actors
            .get_mut(&handle)
            .ok_or(SceneError::StaleHandle(handle))
    }

    /// Add a resource to the world, replacing any previous value of the same type
    pub fn add_resource<T: Any + Send>(&mut self, resource: T) {
        self.resources.insert(TypeId::of::<T>(), Box::new(resource));
    }

    /// Get a reference to a resource
    pub fn get_resource<T: Any + Send>(&self) -> Option<&T> {
        self.resources
            .get(&TypeId::of::<T>())
            .and_then(|res| res.downcast_ref::<T>())
    }

    /// Get a mutable reference to a resource
    pub fn get_resource_mut<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.resources
            .get_mut(&TypeId::of::<T>())
            .and_then(|res| res.downcast_mut::<T>())
    }

    /// Remove a resource from the world
    pub fn remove_resource<T: Any + Send>(&mut self) -> Option<T> {
        self.resources
            .remove(&TypeId::of::<T>())
            .and_then(|res| res.downcast::<T>().ok())
            .map(|res| *res)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderableFactory for World {
    fn create(&mut self, desc: ActorDesc) -> SceneResult<ActorHandle> {
        if !desc.position.is_finite() {
            return Err(SceneError::InvalidActor(format!(
                "non-finite position {} for '{}'",
                desc.position, desc.name
            )));
        }
        Ok(self.spawn(desc))
    }

    fn set_position(&mut self, handle: ActorHandle, position: Vec3) -> SceneResult<()> {
        self.live_actor_mut(handle)?.position = position;
        Ok(())
    }

    fn destroy(&mut self, handle: ActorHandle) -> SceneResult<()> {
        self.despawn(handle)
            .map(|_| ())
            .ok_or(SceneError::StaleHandle(handle))
    }

    fn set_opacity(&mut self, handle: ActorHandle, opacity: f32) -> SceneResult<()> {
        self.live_actor_mut(handle)?.opacity = opacity.clamp(0.0, 1.0);
        Ok(())
    }
}

impl ActorQuery for World {
    fn query_tagged(&self, tag: &str) -> Vec<(ActorHandle, Vec3)> {
        self.actors
            .iter()
            .filter(|(_, actor)| actor.tag == tag)
            .map(|(handle, actor)| (*handle, actor.position))
            .collect()
    }

    fn position(&self, handle: ActorHandle) -> SceneResult<Vec3> {
        self.actors
            .get(&handle)
            .map(|actor| actor.position)
            .ok_or(SceneError::StaleHandle(handle))
    }

    fn displace(&mut self, handle: ActorHandle, delta: Vec3) -> SceneResult<()> {
        self.live_actor_mut(handle)?.position += delta;
        Ok(())
    }
}
