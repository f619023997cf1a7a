use outpost_core::PlanError;
use thiserror::Error;

/// Error surface of the scene service and its collaborators. The HTTP layer
/// maps these onto status codes; the message text is what clients see in
/// the `error` field.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("invalid scene config: {0}")]
    InvalidSceneConfig(String),

    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    #[error("invalid scene entity: {0}")]
    InvalidSceneEntity(String),

    #[error("{0}")]
    SceneNotFound(String),

    #[error("solar tower template missing or misconfigured")]
    SolarTemplateMissing,

    #[error("no available placement for solar towers")]
    NoAvailablePlacement,

    #[error("scene load timed out")]
    LoadTimeout,

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl From<PlanError> for GameError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::SolarTemplateMissing => Self::SolarTemplateMissing,
            PlanError::NoAvailablePlacement => Self::NoAvailablePlacement,
        }
    }
}
