//! Postgres persistence for scenes.
//!
//! Reads assemble a [`Scene`] by joining the `system_*` tables; writes are
//! id-keyed `INSERT … ON CONFLICT DO UPDATE` upserts so client retries are
//! safe. Multi-statement mutations run inside one transaction and roll
//! back on drop.

use std::time::Duration;

use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};

use outpost_core::{
    AgentTemplate, BuildingEnergy, BuildingTemplate, PlannedTower, Rect, Scene, SceneAgent,
    SceneBuilding, SceneDims, SceneGrid, StorageLevel, UpdateAgentTemplateInput,
    UpdateBuildingTemplateInput, UpdateSceneAgentInput, UpdateSceneBuildingInput,
    UpdateSceneConfigInput, SOLAR_TOWER_TEMPLATE_ID,
};

use crate::GameError;

/// Upper bound for the composite scene load.
const LOAD_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_PREVIEW_LIMIT: i64 = 25;
const MAX_PREVIEW_LIMIT: i64 = 200;

#[derive(Clone)]
pub struct SceneStore {
    pool: PgPool,
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct BuildingRow {
    id: String,
    template_id: Option<String>,
    label: String,
    position_x: i32,
    position_y: i32,
    size_width: i32,
    size_height: i32,
    energy_type: Option<String>,
    energy_capacity: Option<i32>,
    energy_current: Option<i32>,
    energy_output: Option<i32>,
    energy_rate: Option<i32>,
}

impl BuildingRow {
    fn into_building(self) -> SceneBuilding {
        SceneBuilding {
            id: self.id,
            template_id: self.template_id,
            label: self.label,
            rect: Rect::new(
                self.position_x,
                self.position_y,
                self.size_width,
                self.size_height,
            ),
            energy: energy_from_columns(
                self.energy_type,
                self.energy_capacity,
                self.energy_current,
                self.energy_output,
                self.energy_rate,
            ),
        }
    }
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: String,
    template_id: Option<String>,
    label: String,
    pos_x: f64,
    pos_y: f64,
    color: Option<i32>,
}

#[derive(sqlx::FromRow)]
struct BuildingTemplateRow {
    id: String,
    label: String,
    energy_type: Option<String>,
    energy_capacity: Option<i32>,
    energy_current: Option<i32>,
    energy_output: Option<i32>,
    energy_rate: Option<i32>,
}

#[derive(sqlx::FromRow)]
struct AgentTemplateRow {
    id: String,
    label: String,
    color: Option<i32>,
    default_position_x: Option<i32>,
    default_position_y: Option<i32>,
}

/// Raw `system_scene_buildings` row for the preview endpoint; nullable
/// columns stay nullable instead of being coalesced with the template.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BuildingPreviewRow {
    pub id: String,
    pub scene_id: String,
    pub template_id: Option<String>,
    pub label: Option<String>,
    pub position_x: i32,
    pub position_y: i32,
    pub size_width: i32,
    pub size_height: i32,
    pub energy_type: Option<String>,
    pub energy_capacity: Option<i32>,
    pub energy_current: Option<i32>,
    pub energy_output: Option<i32>,
    pub energy_rate: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingsPreview {
    pub scene_id: String,
    pub count: usize,
    pub buildings: Vec<BuildingPreviewRow>,
}

/// Translate the nullable `energy_*` columns into the domain sum type.
/// Rows with an unrecognized type load as if they had no energy role.
fn energy_from_columns(
    energy_type: Option<String>,
    capacity: Option<i32>,
    current: Option<i32>,
    output: Option<i32>,
    rate: Option<i32>,
) -> Option<BuildingEnergy> {
    match energy_type?.to_ascii_lowercase().as_str() {
        "storage" => Some(BuildingEnergy::Storage {
            capacity: capacity.unwrap_or(0),
            current: current.unwrap_or(0),
            output: output.unwrap_or(0),
        }),
        "consumer" => Some(BuildingEnergy::Consumer {
            rate: rate.unwrap_or(0),
        }),
        _ => None,
    }
}

impl SceneStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Assemble a scene from the relational store. Bounded by a 5 s overall
    /// timeout; a missing meta, grid, or dimensions row is `SceneNotFound`.
    pub async fn load_scene(&self, scene_id: &str) -> Result<Scene, GameError> {
        tokio::time::timeout(LOAD_TIMEOUT, self.load_scene_inner(scene_id))
            .await
            .map_err(|_| GameError::LoadTimeout)?
    }

    async fn load_scene_inner(&self, scene_id: &str) -> Result<Scene, GameError> {
        let meta = sqlx::query_as::<_, (String, String)>(
            "SELECT id, name FROM system_scenes WHERE id = $1",
        )
        .bind(scene_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| GameError::SceneNotFound(format!("scene {scene_id} not found")))?;

        let grid = sqlx::query_as::<_, (i32, i32, i32)>(
            "SELECT cols, rows, tile_size FROM system_scene_grid WHERE scene_id = $1",
        )
        .bind(scene_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            GameError::SceneNotFound(format!("grid configuration missing for scene {scene_id}"))
        })?;

        let dims = sqlx::query_as::<_, (i32, i32)>(
            "SELECT width, height FROM system_scene_dimensions WHERE scene_id = $1",
        )
        .bind(scene_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            GameError::SceneNotFound(format!(
                "dimensions configuration missing for scene {scene_id}"
            ))
        })?;

        let buildings = sqlx::query_as::<_, BuildingRow>(
            r"
            SELECT b.id,
                   b.template_id,
                   COALESCE(b.label, t.label) AS label,
                   b.position_x,
                   b.position_y,
                   b.size_width,
                   b.size_height,
                   COALESCE(b.energy_type, t.energy_type) AS energy_type,
                   COALESCE(b.energy_capacity, t.energy_capacity) AS energy_capacity,
                   COALESCE(b.energy_current, t.energy_current) AS energy_current,
                   COALESCE(b.energy_output, t.energy_output) AS energy_output,
                   COALESCE(b.energy_rate, t.energy_rate) AS energy_rate
              FROM system_scene_buildings b
              LEFT JOIN system_template_buildings t ON t.id = b.template_id
             WHERE b.scene_id = $1
             ORDER BY b.id
            ",
        )
        .bind(scene_id)
        .fetch_all(&self.pool)
        .await?;

        let agent_rows = sqlx::query_as::<_, AgentRow>(
            r"
            SELECT s.id,
                   s.template_id,
                   COALESCE(s.label, t.label) AS label,
                   COALESCE(r.pos_x, s.position_x::double precision) AS pos_x,
                   COALESCE(r.pos_y, s.position_y::double precision) AS pos_y,
                   COALESCE(s.color, t.color) AS color
              FROM system_scene_agents s
              LEFT JOIN system_template_agents t ON t.id = s.template_id
              LEFT JOIN agent_runtime_state r ON r.agent_id = s.id
             WHERE s.scene_id = $1
             ORDER BY s.id
            ",
        )
        .bind(scene_id)
        .fetch_all(&self.pool)
        .await?;

        let mut agents: Vec<SceneAgent> = agent_rows
            .into_iter()
            .map(|row| SceneAgent {
                id: row.id,
                template_id: row.template_id,
                label: row.label,
                position: [row.pos_x, row.pos_y],
                color: row.color,
                actions: Vec::new(),
            })
            .collect();

        if !agents.is_empty() {
            let action_rows = sqlx::query_as::<_, (String, String)>(
                r"
                SELECT agent_id, action
                  FROM system_scene_agent_actions
                 WHERE agent_id = ANY (SELECT id FROM system_scene_agents WHERE scene_id = $1)
                 ORDER BY agent_id, action
                ",
            )
            .bind(scene_id)
            .fetch_all(&self.pool)
            .await?;

            for (agent_id, action) in action_rows {
                if let Some(agent) = agents.iter_mut().find(|a| a.id == agent_id) {
                    agent.actions.push(action);
                }
            }
        }

        let building_templates = sqlx::query_as::<_, BuildingTemplateRow>(
            r"
            SELECT id, label, energy_type, energy_capacity, energy_current, energy_output, energy_rate
              FROM system_template_buildings
             ORDER BY id
            ",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| BuildingTemplate {
            id: row.id,
            label: row.label,
            energy: energy_from_columns(
                row.energy_type,
                row.energy_capacity,
                row.energy_current,
                row.energy_output,
                row.energy_rate,
            ),
        })
        .collect();

        let agent_templates = sqlx::query_as::<_, AgentTemplateRow>(
            r"
            SELECT id, label, color, default_position_x, default_position_y
              FROM system_template_agents
             ORDER BY id
            ",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| AgentTemplate {
            id: row.id,
            label: row.label,
            color: row.color,
            position: match (row.default_position_x, row.default_position_y) {
                (Some(x), Some(y)) => Some([x, y]),
                _ => None,
            },
        })
        .collect();

        Ok(Scene {
            id: meta.0,
            name: meta.1,
            grid: SceneGrid {
                cols: grid.0,
                rows: grid.1,
                tile_size: grid.2,
            },
            dimensions: SceneDims {
                width: dims.0,
                height: dims.1,
            },
            buildings: buildings.into_iter().map(BuildingRow::into_building).collect(),
            agents,
            building_templates,
            agent_templates,
        })
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    pub async fn update_scene_config(
        &self,
        input: &UpdateSceneConfigInput,
    ) -> Result<(), GameError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE system_scenes SET name = $2 WHERE id = $1")
            .bind(&input.scene_id)
            .bind(&input.name)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(GameError::InvalidSceneConfig(format!(
                "scene {} does not exist",
                input.scene_id
            )));
        }

        sqlx::query(
            r"
            INSERT INTO system_scene_grid (scene_id, cols, rows, tile_size)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (scene_id)
            DO UPDATE SET cols = EXCLUDED.cols,
                          rows = EXCLUDED.rows,
                          tile_size = EXCLUDED.tile_size
            ",
        )
        .bind(&input.scene_id)
        .bind(input.grid.cols)
        .bind(input.grid.rows)
        .bind(input.grid.tile_size)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO system_scene_dimensions (scene_id, width, height)
            VALUES ($1, $2, $3)
            ON CONFLICT (scene_id)
            DO UPDATE SET width = EXCLUDED.width,
                          height = EXCLUDED.height
            ",
        )
        .bind(&input.scene_id)
        .bind(input.dimensions.width)
        .bind(input.dimensions.height)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn upsert_building_template(
        &self,
        input: &UpdateBuildingTemplateInput,
    ) -> Result<(), GameError> {
        let energy = input.energy.clone().unwrap_or_default();
        sqlx::query(
            r"
            INSERT INTO system_template_buildings
                (id, label, energy_type, energy_capacity, energy_current, energy_output, energy_rate)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id)
            DO UPDATE SET label = EXCLUDED.label,
                          energy_type = EXCLUDED.energy_type,
                          energy_capacity = EXCLUDED.energy_capacity,
                          energy_current = EXCLUDED.energy_current,
                          energy_output = EXCLUDED.energy_output,
                          energy_rate = EXCLUDED.energy_rate
            ",
        )
        .bind(&input.id)
        .bind(&input.label)
        .bind(&energy.energy_type)
        .bind(energy.capacity)
        .bind(energy.current)
        .bind(energy.output)
        .bind(energy.rate)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_agent_template(
        &self,
        input: &UpdateAgentTemplateInput,
    ) -> Result<(), GameError> {
        let position = input.default_position;
        sqlx::query(
            r"
            INSERT INTO system_template_agents
                (id, label, color, default_position_x, default_position_y)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id)
            DO UPDATE SET label = EXCLUDED.label,
                          color = EXCLUDED.color,
                          default_position_x = EXCLUDED.default_position_x,
                          default_position_y = EXCLUDED.default_position_y
            ",
        )
        .bind(&input.id)
        .bind(&input.label)
        .bind(input.color)
        .bind(position.map(|p| p[0]))
        .bind(position.map(|p| p[1]))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_scene_building(
        &self,
        scene_id: &str,
        input: &UpdateSceneBuildingInput,
    ) -> Result<(), GameError> {
        let energy = input.energy.clone().unwrap_or_default();
        sqlx::query(
            r"
            INSERT INTO system_scene_buildings
                (id, scene_id, template_id, label,
                 position_x, position_y, size_width, size_height,
                 energy_type, energy_capacity, energy_current, energy_output, energy_rate)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id)
            DO UPDATE SET scene_id = EXCLUDED.scene_id,
                          template_id = EXCLUDED.template_id,
                          label = EXCLUDED.label,
                          position_x = EXCLUDED.position_x,
                          position_y = EXCLUDED.position_y,
                          size_width = EXCLUDED.size_width,
                          size_height = EXCLUDED.size_height,
                          energy_type = EXCLUDED.energy_type,
                          energy_capacity = EXCLUDED.energy_capacity,
                          energy_current = EXCLUDED.energy_current,
                          energy_output = EXCLUDED.energy_output,
                          energy_rate = EXCLUDED.energy_rate
            ",
        )
        .bind(&input.id)
        .bind(scene_id)
        .bind(&input.template_id)
        .bind(&input.label)
        .bind(input.rect.x)
        .bind(input.rect.y)
        .bind(input.rect.w)
        .bind(input.rect.h)
        .bind(&energy.energy_type)
        .bind(energy.capacity)
        .bind(energy.current)
        .bind(energy.output)
        .bind(energy.rate)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_scene_building(&self, id: &str) -> Result<(), GameError> {
        sqlx::query("DELETE FROM system_scene_buildings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Upsert the agent row and replace its action set, atomically.
    pub async fn upsert_scene_agent(
        &self,
        scene_id: &str,
        input: &UpdateSceneAgentInput,
    ) -> Result<(), GameError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO system_scene_agents
                (id, scene_id, template_id, label, position_x, position_y, color)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id)
            DO UPDATE SET scene_id = EXCLUDED.scene_id,
                          template_id = EXCLUDED.template_id,
                          label = EXCLUDED.label,
                          position_x = EXCLUDED.position_x,
                          position_y = EXCLUDED.position_y,
                          color = EXCLUDED.color
            ",
        )
        .bind(&input.id)
        .bind(scene_id)
        .bind(&input.template_id)
        .bind(&input.label)
        .bind(input.position[0])
        .bind(input.position[1])
        .bind(input.color)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM system_scene_agent_actions WHERE agent_id = $1")
            .bind(&input.id)
            .execute(&mut *tx)
            .await?;

        for action in &input.actions {
            sqlx::query(
                r"
                INSERT INTO system_scene_agent_actions (agent_id, action)
                VALUES ($1, $2)
                ON CONFLICT (agent_id, action) DO NOTHING
                ",
            )
            .bind(&input.id)
            .bind(action)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// `rows=0` means the building does not exist.
    pub async fn update_building_energy_current(
        &self,
        id: &str,
        current: i32,
    ) -> Result<(), GameError> {
        let updated =
            sqlx::query("UPDATE system_scene_buildings SET energy_current = $1 WHERE id = $2")
                .bind(current)
                .bind(id)
                .execute(&self.pool)
                .await?;
        if updated.rows_affected() == 0 {
            return Err(GameError::InvalidSceneEntity(format!(
                "building {id} not found"
            )));
        }
        Ok(())
    }

    pub async fn upsert_agent_runtime_position(
        &self,
        agent_id: &str,
        x: f64,
        y: f64,
    ) -> Result<(), GameError> {
        sqlx::query(
            r"
            INSERT INTO agent_runtime_state (agent_id, pos_x, pos_y, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (agent_id)
            DO UPDATE SET pos_x = EXCLUDED.pos_x,
                          pos_y = EXCLUDED.pos_y,
                          updated_at = now()
            ",
        )
        .bind(agent_id)
        .bind(x)
        .bind(y)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist one tick's worth of storage levels in a single transaction.
    pub async fn apply_storage_levels(&self, levels: &[StorageLevel]) -> Result<(), GameError> {
        let mut tx = self.pool.begin().await?;
        for level in levels {
            sqlx::query("UPDATE system_scene_buildings SET energy_current = $1 WHERE id = $2")
                .bind(level.current)
                .bind(&level.building_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Persist every planned tower, or none. Energy columns stay NULL so
    /// the towers inherit their energy from the template at load time.
    pub async fn insert_planned_towers(
        &self,
        scene_id: &str,
        towers: &[PlannedTower],
    ) -> Result<(), GameError> {
        let mut tx = self.pool.begin().await?;
        for tower in towers {
            insert_tower(&mut tx, scene_id, tower).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Preview
    // -----------------------------------------------------------------------

    pub async fn preview_scene_buildings(
        &self,
        scene_id: &str,
        limit: i64,
    ) -> Result<Vec<BuildingPreviewRow>, GameError> {
        let rows = sqlx::query_as::<_, BuildingPreviewRow>(
            r"
            SELECT id, scene_id, template_id, label,
                   position_x, position_y, size_width, size_height,
                   energy_type, energy_capacity, energy_current, energy_output, energy_rate
              FROM system_scene_buildings
             WHERE scene_id = $1
             ORDER BY id
             LIMIT $2
            ",
        )
        .bind(scene_id)
        .bind(clamp_preview_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

async fn insert_tower(
    tx: &mut Transaction<'_, Postgres>,
    scene_id: &str,
    tower: &PlannedTower,
) -> Result<(), GameError> {
    sqlx::query(
        r"
        INSERT INTO system_scene_buildings
            (id, scene_id, template_id, label, position_x, position_y, size_width, size_height)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id)
        DO UPDATE SET scene_id = EXCLUDED.scene_id,
                      template_id = EXCLUDED.template_id,
                      label = EXCLUDED.label,
                      position_x = EXCLUDED.position_x,
                      position_y = EXCLUDED.position_y,
                      size_width = EXCLUDED.size_width,
                      size_height = EXCLUDED.size_height
        ",
    )
    .bind(&tower.id)
    .bind(scene_id)
    .bind(SOLAR_TOWER_TEMPLATE_ID)
    .bind(&tower.label)
    .bind(tower.rect.x)
    .bind(tower.rect.y)
    .bind(tower.rect.w)
    .bind(tower.rect.h)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub(crate) fn clamp_preview_limit(limit: i64) -> i64 {
    if limit <= 0 {
        DEFAULT_PREVIEW_LIMIT
    } else {
        limit.min(MAX_PREVIEW_LIMIT)
    }
}
