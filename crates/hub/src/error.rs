//! Error type for hub operations.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("user {user_id} already has the maximum of {max} connected devices")]
    TooManyConnections { user_id: uuid::Uuid, max: usize },

    #[error("hub actor is no longer running")]
    ActorGone,
}

pub type Result<T> = std::result::Result<T, Error>;
