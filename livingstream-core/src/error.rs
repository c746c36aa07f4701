use crate::entity::ActorHandle;
use thiserror::Error;

/// Failures reported by scene collaborators.
///
/// All of these are recoverable from the tick path: callers drop whatever
/// state referenced the handle and carry on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("actor handle {0} is stale or was never issued")]
    StaleHandle(ActorHandle),

    #[error("actor description rejected: {0}")]
    InvalidActor(String),
}

pub type SceneResult<T> = Result<T, SceneError>;
