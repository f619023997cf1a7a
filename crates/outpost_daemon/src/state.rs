//! Shared application state and the service seams the HTTP layer consumes.

use std::sync::Arc;

use async_trait::async_trait;

use outpost_core::{
    MaintenanceResult, Scene, SceneAgent, SceneBuilding, Snapshot, UpdateAgentTemplateInput,
    UpdateBuildingTemplateInput, UpdateSceneAgentInput, UpdateSceneBuildingInput,
    UpdateSceneConfigInput,
};
use outpost_game::{
    ActionEvent, ActionLog, AgentActionState, BuildingsPreview, GameError, LogActionInput,
    SceneService,
};

use crate::stream::SceneBroadcaster;

/// Capabilities the routes and the ticker need from the scene service.
/// Router tests substitute a mock; production wires in [`SceneService`].
#[async_trait]
pub trait GameApi: Send + Sync {
    fn scene(&self) -> Scene;
    fn snapshot(&self) -> Snapshot;
    async fn update_scene_config(&self, input: UpdateSceneConfigInput)
        -> Result<Snapshot, GameError>;
    async fn update_building_template(
        &self,
        input: UpdateBuildingTemplateInput,
    ) -> Result<Snapshot, GameError>;
    async fn update_agent_template(
        &self,
        input: UpdateAgentTemplateInput,
    ) -> Result<Snapshot, GameError>;
    async fn update_scene_building(
        &self,
        input: UpdateSceneBuildingInput,
    ) -> Result<Snapshot, GameError>;
    async fn delete_scene_building(&self, id: &str) -> Result<Snapshot, GameError>;
    async fn update_scene_agent(&self, input: UpdateSceneAgentInput)
        -> Result<Snapshot, GameError>;
    async fn update_building_energy_current(
        &self,
        id: &str,
        value: f64,
    ) -> Result<SceneBuilding, GameError>;
    async fn update_agent_runtime_position(
        &self,
        id: &str,
        x: f64,
        y: f64,
    ) -> Result<SceneAgent, GameError>;
    async fn advance_energy_state(
        &self,
        seconds: f64,
        drain_factor: f64,
    ) -> Result<Scene, GameError>;
    async fn maintain_energy_non_negative(
        &self,
        agent_id: &str,
    ) -> Result<MaintenanceResult, GameError>;
    async fn preview_scene_buildings(
        &self,
        scene_id: Option<&str>,
        limit: Option<i64>,
    ) -> Result<BuildingsPreview, GameError>;
}

#[async_trait]
impl GameApi for SceneService {
    fn scene(&self) -> Scene {
        (*self.current_scene()).clone()
    }

    fn snapshot(&self) -> Snapshot {
        SceneService::snapshot(self)
    }

    async fn update_scene_config(
        &self,
        input: UpdateSceneConfigInput,
    ) -> Result<Snapshot, GameError> {
        SceneService::update_scene_config(self, input).await
    }

    async fn update_building_template(
        &self,
        input: UpdateBuildingTemplateInput,
    ) -> Result<Snapshot, GameError> {
        SceneService::update_building_template(self, input).await
    }

    async fn update_agent_template(
        &self,
        input: UpdateAgentTemplateInput,
    ) -> Result<Snapshot, GameError> {
        SceneService::update_agent_template(self, input).await
    }

    async fn update_scene_building(
        &self,
        input: UpdateSceneBuildingInput,
    ) -> Result<Snapshot, GameError> {
        SceneService::update_scene_building(self, input).await
    }

    async fn delete_scene_building(&self, id: &str) -> Result<Snapshot, GameError> {
        SceneService::delete_scene_building(self, id).await
    }

    async fn update_scene_agent(
        &self,
        input: UpdateSceneAgentInput,
    ) -> Result<Snapshot, GameError> {
        SceneService::update_scene_agent(self, input).await
    }

    async fn update_building_energy_current(
        &self,
        id: &str,
        value: f64,
    ) -> Result<SceneBuilding, GameError> {
        SceneService::update_building_energy_current(self, id, value).await
    }

    async fn update_agent_runtime_position(
        &self,
        id: &str,
        x: f64,
        y: f64,
    ) -> Result<SceneAgent, GameError> {
        SceneService::update_agent_runtime_position(self, id, x, y).await
    }

    async fn advance_energy_state(
        &self,
        seconds: f64,
        drain_factor: f64,
    ) -> Result<Scene, GameError> {
        let scene = SceneService::advance_energy_state(self, seconds, drain_factor).await?;
        Ok((*scene).clone())
    }

    async fn maintain_energy_non_negative(
        &self,
        agent_id: &str,
    ) -> Result<MaintenanceResult, GameError> {
        SceneService::maintain_energy_non_negative(self, agent_id).await
    }

    async fn preview_scene_buildings(
        &self,
        scene_id: Option<&str>,
        limit: Option<i64>,
    ) -> Result<BuildingsPreview, GameError> {
        SceneService::preview_scene_buildings(self, scene_id, limit).await
    }
}

/// Agent action-log seam, mockable the same way.
#[async_trait]
pub trait ActionApi: Send + Sync {
    async fn log_action(&self, input: LogActionInput) -> Result<(), GameError>;
    async fn list_events(&self, agent_id: &str, limit: i64)
        -> Result<Vec<ActionEvent>, GameError>;
    async fn state(&self, agent_id: &str) -> Result<AgentActionState, GameError>;
}

#[async_trait]
impl ActionApi for ActionLog {
    async fn log_action(&self, input: LogActionInput) -> Result<(), GameError> {
        ActionLog::log_action(self, input).await
    }

    async fn list_events(
        &self,
        agent_id: &str,
        limit: i64,
    ) -> Result<Vec<ActionEvent>, GameError> {
        ActionLog::list_events(self, agent_id, limit).await
    }

    async fn state(&self, agent_id: &str) -> Result<AgentActionState, GameError> {
        ActionLog::state(self, agent_id).await
    }
}

#[derive(Clone)]
pub struct AppState {
    pub game: Arc<dyn GameApi>,
    pub actions: Arc<dyn ActionApi>,
    pub broadcaster: Arc<SceneBroadcaster>,
    pub environment: String,
}
