//! Type definitions for `outpost_core`.
//!
//! The scene aggregate and everything reachable from it, plus the input
//! types consumed by the scene service. JSON field names follow the wire
//! format the viewers already speak (camelCase, rect as a 4-array).

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Well-known ids and defaults
// ---------------------------------------------------------------------------

/// Template id the maintenance planner builds from.
pub const SOLAR_TOWER_TEMPLATE_ID: &str = "solar_tower";

/// Drain factor applied by the energy tick when the caller passes none.
pub const DEFAULT_DRAIN_FACTOR: f64 = 1.0;

// ---------------------------------------------------------------------------
// Scene aggregate
// ---------------------------------------------------------------------------

/// Static and slowly-mutating world definition for one map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    pub name: String,
    pub grid: SceneGrid,
    pub dimensions: SceneDims,
    pub buildings: Vec<SceneBuilding>,
    pub agents: Vec<SceneAgent>,
    pub building_templates: Vec<BuildingTemplate>,
    pub agent_templates: Vec<AgentTemplate>,
}

impl Scene {
    pub fn building(&self, id: &str) -> Option<&SceneBuilding> {
        self.buildings.iter().find(|b| b.id == id)
    }

    pub fn agent(&self, id: &str) -> Option<&SceneAgent> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn building_template(&self, id: &str) -> Option<&BuildingTemplate> {
        self.building_templates.iter().find(|t| t.id == id)
    }

    pub fn agent_template(&self, id: &str) -> Option<&AgentTemplate> {
        self.agent_templates.iter().find(|t| t.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneGrid {
    pub cols: i32,
    pub rows: i32,
    pub tile_size: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneDims {
    pub width: i32,
    pub height: i32,
}

/// Axis-aligned tile rectangle occupying `[x, x+w) × [y, y+h)`.
///
/// Serialized as the 4-array `[x, y, w, h]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Half-open overlap test.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.w
            && self.x + self.w > other.x
            && self.y < other.y + other.h
            && self.y + self.h > other.y
    }

    /// Half-open containment of a single tile.
    pub fn contains_tile(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.w && y >= self.y && y < self.y + self.h
    }

    pub fn fits_within(&self, dims: &SceneDims) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.x + self.w <= dims.width
            && self.y + self.h <= dims.height
    }
}

impl From<[i32; 4]> for Rect {
    fn from([x, y, w, h]: [i32; 4]) -> Self {
        Self { x, y, w, h }
    }
}

impl From<Rect> for [i32; 4] {
    fn from(rect: Rect) -> Self {
        [rect.x, rect.y, rect.w, rect.h]
    }
}

/// Energy role of a building. Storages accumulate output, consumers drain
/// at `rate`. Buildings without a role carry `None` at the scene level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BuildingEnergy {
    Storage {
        #[serde(default)]
        capacity: i32,
        #[serde(default)]
        current: i32,
        #[serde(default)]
        output: i32,
    },
    Consumer {
        #[serde(default)]
        rate: i32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneBuilding {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    pub label: String,
    pub rect: Rect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<BuildingEnergy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneAgent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    pub label: String,
    /// Floating-point position; the agent's tile is `⌊position⌋` clamped
    /// to the scene dimensions.
    pub position: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<i32>,
    /// Action names currently assigned to the agent (distinct from the
    /// append-only action-event log).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingTemplate {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<BuildingEnergy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTemplate {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[i32; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMeta {
    pub id: String,
    pub name: String,
}

/// Consolidated view over the `system_*` tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub scene: SceneMeta,
    pub grid: SceneGrid,
    pub dimensions: SceneDims,
    pub buildings: Vec<SceneBuilding>,
    pub agents: Vec<SceneAgent>,
    pub building_templates: Vec<BuildingTemplate>,
    pub agent_templates: Vec<AgentTemplate>,
}

impl Snapshot {
    pub fn of(scene: &Scene) -> Self {
        Self {
            scene: SceneMeta {
                id: scene.id.clone(),
                name: scene.name.clone(),
            },
            grid: scene.grid,
            dimensions: scene.dimensions,
            buildings: scene.buildings.clone(),
            agents: scene.agents.clone(),
            building_templates: scene.building_templates.clone(),
            agent_templates: scene.agent_templates.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Mutation inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct UpdateSceneConfigInput {
    pub scene_id: String,
    pub name: String,
    pub grid: SceneGrid,
    pub dimensions: SceneDims,
}

/// Per-column energy patch. Instance columns are nullable independently of
/// the template, so this is a patch over columns rather than a
/// [`BuildingEnergy`] value; the two meet again at load time via COALESCE.
#[derive(Debug, Clone, Default)]
pub struct EnergyOverride {
    pub energy_type: Option<String>,
    pub capacity: Option<i32>,
    pub current: Option<i32>,
    pub output: Option<i32>,
    pub rate: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct UpdateBuildingTemplateInput {
    pub id: String,
    pub label: String,
    pub energy: Option<EnergyOverride>,
}

#[derive(Debug, Clone)]
pub struct UpdateAgentTemplateInput {
    pub id: String,
    pub label: String,
    pub color: Option<i32>,
    pub default_position: Option<[i32; 2]>,
}

#[derive(Debug, Clone)]
pub struct UpdateSceneBuildingInput {
    pub id: String,
    pub label: String,
    pub template_id: Option<String>,
    pub rect: Rect,
    pub energy: Option<EnergyOverride>,
}

#[derive(Debug, Clone)]
pub struct UpdateSceneAgentInput {
    pub id: String,
    pub label: String,
    pub template_id: Option<String>,
    pub position: [i32; 2],
    pub color: Option<i32>,
    pub actions: Vec<String>,
}

// ---------------------------------------------------------------------------
// Maintenance result
// ---------------------------------------------------------------------------

/// New tile chosen for an agent when adjacent placements were exhausted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRelocation {
    pub agent_id: String,
    pub position: [f64; 2],
}

/// Outcome of the maintain-energy behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceResult {
    pub scene: Scene,
    pub created: Vec<SceneBuilding>,
    pub net_flow_before: f64,
    pub net_flow_after: f64,
    pub towers_built: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relocation: Option<AgentRelocation>,
}
