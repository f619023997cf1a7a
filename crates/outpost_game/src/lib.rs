//! outpost_game: everything between the pure scene model and Postgres.
//!
//! [`SceneStore`] owns the SQL, [`SceneService`] owns the in-memory scene
//! and the single-writer discipline, [`ActionLog`] owns the append-only
//! agent action audit.

mod actions;
mod error;
mod service;
mod store;

pub use actions::{ActionEvent, ActionLog, AgentActionState, LogActionInput};
pub use error::GameError;
pub use service::SceneService;
pub use store::{BuildingPreviewRow, BuildingsPreview, SceneStore};
