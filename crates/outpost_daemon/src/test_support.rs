//! Mock services for router and ticker tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use outpost_core::test_fixtures::base_scene;
use outpost_core::{
    MaintenanceResult, Scene, SceneAgent, SceneBuilding, Snapshot, UpdateAgentTemplateInput,
    UpdateBuildingTemplateInput, UpdateSceneAgentInput, UpdateSceneBuildingInput,
    UpdateSceneConfigInput,
};
use outpost_game::{ActionEvent, AgentActionState, BuildingsPreview, GameError, LogActionInput};

use crate::state::{ActionApi, AppState, GameApi};
use crate::stream::SceneBroadcaster;

pub struct MockGame {
    pub scene: Scene,
    advance_calls: Mutex<u32>,
    last_advance: Mutex<Option<(f64, f64)>>,
    advance_failures: Mutex<Vec<GameError>>,
    maintain_failures: Mutex<Vec<GameError>>,
    last_energy_update: Mutex<Option<(String, f64)>>,
    last_position_update: Mutex<Option<(String, f64, f64)>>,
    last_config: Mutex<Option<UpdateSceneConfigInput>>,
    config_failures: Mutex<Vec<GameError>>,
}

impl MockGame {
    pub fn new() -> Self {
        Self {
            scene: base_scene(),
            advance_calls: Mutex::new(0),
            last_advance: Mutex::new(None),
            advance_failures: Mutex::new(Vec::new()),
            maintain_failures: Mutex::new(Vec::new()),
            last_energy_update: Mutex::new(None),
            last_position_update: Mutex::new(None),
            last_config: Mutex::new(None),
            config_failures: Mutex::new(Vec::new()),
        }
    }

    pub fn advance_calls(&self) -> u32 {
        *self.advance_calls.lock()
    }

    pub fn last_advance_input(&self) -> Option<(f64, f64)> {
        *self.last_advance.lock()
    }

    pub fn fail_advances(&self, count: usize, make: impl Fn() -> GameError) {
        let mut failures = self.advance_failures.lock();
        for _ in 0..count {
            failures.push(make());
        }
    }

    pub fn fail_next_maintain(&self, err: GameError) {
        self.maintain_failures.lock().push(err);
    }

    pub fn fail_next_config(&self, err: GameError) {
        self.config_failures.lock().push(err);
    }

    pub fn last_energy_update(&self) -> Option<(String, f64)> {
        self.last_energy_update.lock().clone()
    }

    pub fn last_position_update(&self) -> Option<(String, f64, f64)> {
        self.last_position_update.lock().clone()
    }

    pub fn last_config(&self) -> Option<UpdateSceneConfigInput> {
        self.last_config.lock().clone()
    }
}

#[async_trait]
impl GameApi for MockGame {
    fn scene(&self) -> Scene {
        self.scene.clone()
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::of(&self.scene)
    }

    async fn update_scene_config(
        &self,
        input: UpdateSceneConfigInput,
    ) -> Result<Snapshot, GameError> {
        if let Some(err) = self.config_failures.lock().pop() {
            return Err(err);
        }
        *self.last_config.lock() = Some(input);
        Ok(self.snapshot())
    }

    async fn update_building_template(
        &self,
        _input: UpdateBuildingTemplateInput,
    ) -> Result<Snapshot, GameError> {
        Ok(self.snapshot())
    }

    async fn update_agent_template(
        &self,
        _input: UpdateAgentTemplateInput,
    ) -> Result<Snapshot, GameError> {
        Ok(self.snapshot())
    }

    async fn update_scene_building(
        &self,
        _input: UpdateSceneBuildingInput,
    ) -> Result<Snapshot, GameError> {
        Ok(self.snapshot())
    }

    async fn delete_scene_building(&self, _id: &str) -> Result<Snapshot, GameError> {
        Ok(self.snapshot())
    }

    async fn update_scene_agent(
        &self,
        _input: UpdateSceneAgentInput,
    ) -> Result<Snapshot, GameError> {
        Ok(self.snapshot())
    }

    async fn update_building_energy_current(
        &self,
        id: &str,
        value: f64,
    ) -> Result<SceneBuilding, GameError> {
        *self.last_energy_update.lock() = Some((id.to_string(), value));
        self.scene
            .building(id)
            .cloned()
            .ok_or_else(|| GameError::InvalidSceneEntity(format!("building {id} not found")))
    }

    async fn update_agent_runtime_position(
        &self,
        id: &str,
        x: f64,
        y: f64,
    ) -> Result<SceneAgent, GameError> {
        *self.last_position_update.lock() = Some((id.to_string(), x, y));
        self.scene
            .agent(id)
            .cloned()
            .ok_or_else(|| GameError::InvalidSceneEntity(format!("agent {id} not found in scene")))
    }

    async fn advance_energy_state(
        &self,
        seconds: f64,
        drain_factor: f64,
    ) -> Result<Scene, GameError> {
        *self.advance_calls.lock() += 1;
        *self.last_advance.lock() = Some((seconds, drain_factor));
        if let Some(err) = self.advance_failures.lock().pop() {
            return Err(err);
        }
        Ok(self.scene.clone())
    }

    async fn maintain_energy_non_negative(
        &self,
        agent_id: &str,
    ) -> Result<MaintenanceResult, GameError> {
        if let Some(err) = self.maintain_failures.lock().pop() {
            return Err(err);
        }
        if self.scene.agent(agent_id).is_none() {
            return Err(GameError::InvalidSceneEntity(format!(
                "agent {agent_id} not found in scene"
            )));
        }
        Ok(MaintenanceResult {
            scene: self.scene.clone(),
            created: Vec::new(),
            net_flow_before: -40.0,
            net_flow_after: 0.0,
            towers_built: 2,
            relocation: None,
        })
    }

    async fn preview_scene_buildings(
        &self,
        scene_id: Option<&str>,
        limit: Option<i64>,
    ) -> Result<BuildingsPreview, GameError> {
        let _ = limit;
        Ok(BuildingsPreview {
            scene_id: scene_id.unwrap_or(&self.scene.id).to_string(),
            count: 0,
            buildings: Vec::new(),
        })
    }
}

#[derive(Default)]
pub struct MockActions {
    pub last_logged: Mutex<Option<LogActionInput>>,
    pub events: Mutex<Vec<ActionEvent>>,
    pub last_list: Mutex<Option<(String, i64)>>,
}

#[async_trait]
impl ActionApi for MockActions {
    async fn log_action(&self, input: LogActionInput) -> Result<(), GameError> {
        if input.agent_id.trim().is_empty() {
            return Err(GameError::InvalidSceneEntity(
                "agent_id is required".to_string(),
            ));
        }
        if input.action_type.trim().is_empty() {
            return Err(GameError::InvalidSceneEntity(
                "action_type is required".to_string(),
            ));
        }
        *self.last_logged.lock() = Some(input);
        Ok(())
    }

    async fn list_events(
        &self,
        agent_id: &str,
        limit: i64,
    ) -> Result<Vec<ActionEvent>, GameError> {
        *self.last_list.lock() = Some((agent_id.to_string(), limit));
        Ok(self.events.lock().clone())
    }

    async fn state(&self, agent_id: &str) -> Result<AgentActionState, GameError> {
        Ok(AgentActionState {
            agent_id: agent_id.to_string(),
            actions: vec!["scan".to_string()],
            updated_at: None,
        })
    }
}

pub fn test_state(game: Arc<MockGame>, actions: Arc<MockActions>) -> AppState {
    AppState {
        game,
        actions,
        broadcaster: Arc::new(SceneBroadcaster::new()),
        environment: "test".to_string(),
    }
}
