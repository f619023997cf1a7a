//! The scene service: sole owner of the in-memory scene.
//!
//! Every mutation validates first, then runs the store transaction, then
//! reloads the scene from the store and swaps the shared `Arc`, so the
//! in-memory model always equals the durable truth. A single async mutex
//! serializes mutations; readers clone the current `Arc` and keep their
//! snapshot across a concurrent swap.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use outpost_core::{
    energy_balance, plan_energy_tick, plan_solar_towers, MaintenanceResult, Scene, SceneAgent,
    SceneBuilding, Snapshot, UpdateAgentTemplateInput, UpdateBuildingTemplateInput,
    UpdateSceneAgentInput, UpdateSceneBuildingInput, UpdateSceneConfigInput,
};

#[cfg(test)]
use crate::store::clamp_preview_limit;
use crate::{BuildingsPreview, GameError, SceneStore};

pub struct SceneService {
    store: SceneStore,
    scene_id: String,
    scene: RwLock<Arc<Scene>>,
    write_gate: Mutex<()>,
}

impl SceneService {
    /// Load the scene once and take ownership of it.
    pub async fn new(store: SceneStore, scene_id: impl Into<String>) -> Result<Self, GameError> {
        let scene_id = scene_id.into();
        let scene = store.load_scene(&scene_id).await?;
        Ok(Self {
            store,
            scene_id,
            scene: RwLock::new(Arc::new(scene)),
            write_gate: Mutex::new(()),
        })
    }

    /// The current consistent snapshot.
    pub fn current_scene(&self) -> Arc<Scene> {
        self.scene.read().clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::of(&self.current_scene())
    }

    async fn reload(&self) -> Result<Arc<Scene>, GameError> {
        let scene = Arc::new(self.store.load_scene(&self.scene_id).await?);
        *self.scene.write() = scene.clone();
        Ok(scene)
    }

    pub async fn update_scene_config(
        &self,
        input: UpdateSceneConfigInput,
    ) -> Result<Snapshot, GameError> {
        validate_scene_config(&input)?;
        let _gate = self.write_gate.lock().await;
        self.store.update_scene_config(&input).await?;
        let scene = self.reload().await?;
        Ok(Snapshot::of(&scene))
    }

    pub async fn update_building_template(
        &self,
        input: UpdateBuildingTemplateInput,
    ) -> Result<Snapshot, GameError> {
        validate_building_template(&input)?;
        let _gate = self.write_gate.lock().await;
        self.store.upsert_building_template(&input).await?;
        let scene = self.reload().await?;
        Ok(Snapshot::of(&scene))
    }

    pub async fn update_agent_template(
        &self,
        input: UpdateAgentTemplateInput,
    ) -> Result<Snapshot, GameError> {
        validate_agent_template(&input)?;
        let _gate = self.write_gate.lock().await;
        self.store.upsert_agent_template(&input).await?;
        let scene = self.reload().await?;
        Ok(Snapshot::of(&scene))
    }

    pub async fn update_scene_building(
        &self,
        input: UpdateSceneBuildingInput,
    ) -> Result<Snapshot, GameError> {
        let _gate = self.write_gate.lock().await;
        let scene = self.current_scene();
        validate_scene_building(&scene, &input)?;
        self.store.upsert_scene_building(&self.scene_id, &input).await?;
        let scene = self.reload().await?;
        Ok(Snapshot::of(&scene))
    }

    pub async fn delete_scene_building(&self, id: &str) -> Result<Snapshot, GameError> {
        if id.trim().is_empty() {
            return Err(GameError::InvalidSceneEntity("id is required".to_string()));
        }
        let _gate = self.write_gate.lock().await;
        self.store.delete_scene_building(id).await?;
        let scene = self.reload().await?;
        Ok(Snapshot::of(&scene))
    }

    pub async fn update_scene_agent(
        &self,
        input: UpdateSceneAgentInput,
    ) -> Result<Snapshot, GameError> {
        let _gate = self.write_gate.lock().await;
        let scene = self.current_scene();
        validate_scene_agent(&scene, &input)?;
        self.store.upsert_scene_agent(&self.scene_id, &input).await?;
        let scene = self.reload().await?;
        Ok(Snapshot::of(&scene))
    }

    /// Round to the nearest integer, clamp at zero, and persist the
    /// building's charge level.
    pub async fn update_building_energy_current(
        &self,
        id: &str,
        value: f64,
    ) -> Result<SceneBuilding, GameError> {
        if id.trim().is_empty() {
            return Err(GameError::InvalidSceneEntity("id is required".to_string()));
        }
        let current = normalize_energy_current(value);
        let _gate = self.write_gate.lock().await;
        self.store.update_building_energy_current(id, current).await?;
        let scene = self.reload().await?;
        scene
            .building(id)
            .cloned()
            .ok_or_else(|| GameError::InvalidSceneEntity(format!("building {id} not found")))
    }

    pub async fn update_agent_runtime_position(
        &self,
        id: &str,
        x: f64,
        y: f64,
    ) -> Result<SceneAgent, GameError> {
        if id.trim().is_empty() {
            return Err(GameError::InvalidSceneEntity("id is required".to_string()));
        }
        let _gate = self.write_gate.lock().await;
        self.store.upsert_agent_runtime_position(id, x, y).await?;
        let scene = self.reload().await?;
        scene
            .agent(id)
            .cloned()
            .ok_or_else(|| GameError::InvalidSceneEntity(format!("agent {id} not found in scene")))
    }

    /// One energy tick: drain or charge every storage by the scene's net
    /// load. Returns the scene unchanged, without opening a transaction,
    /// when the tick is a no-op.
    pub async fn advance_energy_state(
        &self,
        seconds: f64,
        drain_factor: f64,
    ) -> Result<Arc<Scene>, GameError> {
        let _gate = self.write_gate.lock().await;
        let scene = self.current_scene();
        let levels = plan_energy_tick(&scene, seconds, drain_factor);
        if levels.is_empty() {
            return Ok(scene);
        }
        self.store.apply_storage_levels(&levels).await?;
        self.reload().await
    }

    /// Plan and persist enough solar towers around `agent_id` to restore
    /// non-negative net flow, relocating the agent through the grid when
    /// every adjacent placement is taken. All towers commit in one
    /// transaction; the relocation is reported, not persisted.
    pub async fn maintain_energy_non_negative(
        &self,
        agent_id: &str,
    ) -> Result<MaintenanceResult, GameError> {
        if agent_id.trim().is_empty() {
            return Err(GameError::InvalidSceneEntity(
                "agent id is required".to_string(),
            ));
        }

        let _gate = self.write_gate.lock().await;
        let scene = self.current_scene();
        let agent = scene.agent(agent_id).cloned().ok_or_else(|| {
            GameError::InvalidSceneEntity(format!("agent {agent_id} not found in scene"))
        })?;

        let plan = plan_solar_towers(&scene, &agent)?;
        if plan.towers.is_empty() {
            return Ok(MaintenanceResult {
                scene: (*scene).clone(),
                created: Vec::new(),
                net_flow_before: plan.net_flow_before,
                net_flow_after: plan.net_flow_before,
                towers_built: 0,
                relocation: None,
            });
        }

        tracing::info!(
            agent = agent_id,
            net_flow = plan.net_flow_before,
            towers = plan.towers.len(),
            relocated = plan.relocation.is_some(),
            "building solar towers against energy deficit"
        );

        self.store
            .insert_planned_towers(&self.scene_id, &plan.towers)
            .await?;
        let scene = self.reload().await?;

        let planned_ids: HashSet<&str> = plan.towers.iter().map(|t| t.id.as_str()).collect();
        let created: Vec<SceneBuilding> = scene
            .buildings
            .iter()
            .filter(|b| planned_ids.contains(b.id.as_str()))
            .cloned()
            .collect();
        let net_flow_after = energy_balance(&scene).net_flow();

        Ok(MaintenanceResult {
            scene: (*scene).clone(),
            created: created.clone(),
            net_flow_before: plan.net_flow_before,
            net_flow_after,
            towers_built: created.len(),
            relocation: plan.relocation,
        })
    }

    pub async fn preview_scene_buildings(
        &self,
        scene_id: Option<&str>,
        limit: Option<i64>,
    ) -> Result<BuildingsPreview, GameError> {
        let scene_id = match scene_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => &self.scene_id,
        };
        let buildings = self
            .store
            .preview_scene_buildings(scene_id, limit.unwrap_or(0))
            .await?;
        Ok(BuildingsPreview {
            scene_id: scene_id.to_string(),
            count: buildings.len(),
            buildings,
        })
    }
}

// ---------------------------------------------------------------------------
// Validation: all checks run before any transaction is opened
// ---------------------------------------------------------------------------

fn validate_scene_config(input: &UpdateSceneConfigInput) -> Result<(), GameError> {
    if input.scene_id.trim().is_empty() {
        return Err(GameError::InvalidSceneConfig(
            "scene_id is required".to_string(),
        ));
    }
    if input.name.trim().is_empty() {
        return Err(GameError::InvalidSceneConfig("name is required".to_string()));
    }
    if input.grid.cols <= 0 || input.grid.rows <= 0 || input.grid.tile_size <= 0 {
        return Err(GameError::InvalidSceneConfig(
            "grid cols, rows and tileSize must be positive".to_string(),
        ));
    }
    if input.dimensions.width <= 0 || input.dimensions.height <= 0 {
        return Err(GameError::InvalidSceneConfig(
            "dimensions width and height must be positive".to_string(),
        ));
    }
    Ok(())
}

fn valid_energy_type(energy_type: &Option<String>) -> bool {
    match energy_type.as_deref() {
        None => true,
        Some(value) => matches!(value.to_ascii_lowercase().as_str(), "storage" | "consumer"),
    }
}

fn validate_building_template(input: &UpdateBuildingTemplateInput) -> Result<(), GameError> {
    if input.id.trim().is_empty() {
        return Err(GameError::InvalidTemplate("id is required".to_string()));
    }
    if input.label.trim().is_empty() {
        return Err(GameError::InvalidTemplate("label is required".to_string()));
    }
    if let Some(energy) = &input.energy {
        if !valid_energy_type(&energy.energy_type) {
            return Err(GameError::InvalidTemplate(format!(
                "energy type must be storage or consumer, got {:?}",
                energy.energy_type
            )));
        }
    }
    Ok(())
}

fn validate_agent_template(input: &UpdateAgentTemplateInput) -> Result<(), GameError> {
    if input.id.trim().is_empty() {
        return Err(GameError::InvalidTemplate("id is required".to_string()));
    }
    if input.label.trim().is_empty() {
        return Err(GameError::InvalidTemplate("label is required".to_string()));
    }
    Ok(())
}

fn validate_scene_building(
    scene: &Scene,
    input: &UpdateSceneBuildingInput,
) -> Result<(), GameError> {
    if input.id.trim().is_empty() {
        return Err(GameError::InvalidSceneEntity("id is required".to_string()));
    }
    if input.label.trim().is_empty() {
        return Err(GameError::InvalidSceneEntity(
            "label is required".to_string(),
        ));
    }
    if let Some(template_id) = &input.template_id {
        if scene.building_template(template_id).is_none() {
            return Err(GameError::InvalidTemplate(format!(
                "building template {template_id} does not exist"
            )));
        }
    }
    if let Some(energy) = &input.energy {
        if !valid_energy_type(&energy.energy_type) {
            return Err(GameError::InvalidSceneEntity(format!(
                "energy type must be storage or consumer, got {:?}",
                energy.energy_type
            )));
        }
    }
    if input.rect.w <= 0 || input.rect.h <= 0 {
        return Err(GameError::InvalidSceneEntity(
            "rect width and height must be positive".to_string(),
        ));
    }
    if !input.rect.fits_within(&scene.dimensions) {
        return Err(GameError::InvalidSceneEntity(format!(
            "rect {:?} exceeds scene dimensions {}x{}",
            <[i32; 4]>::from(input.rect),
            scene.dimensions.width,
            scene.dimensions.height
        )));
    }
    for other in &scene.buildings {
        if other.id != input.id && input.rect.overlaps(&other.rect) {
            return Err(GameError::InvalidSceneEntity(format!(
                "building {} overlaps {}",
                input.id, other.id
            )));
        }
    }
    Ok(())
}

fn validate_scene_agent(scene: &Scene, input: &UpdateSceneAgentInput) -> Result<(), GameError> {
    if input.id.trim().is_empty() {
        return Err(GameError::InvalidSceneEntity("id is required".to_string()));
    }
    if input.label.trim().is_empty() {
        return Err(GameError::InvalidSceneEntity(
            "label is required".to_string(),
        ));
    }
    if let Some(template_id) = &input.template_id {
        if scene.agent_template(template_id).is_none() {
            return Err(GameError::InvalidTemplate(format!(
                "agent template {template_id} does not exist"
            )));
        }
    }
    Ok(())
}

fn normalize_energy_current(value: f64) -> i32 {
    value.round().max(0.0) as i32
}
