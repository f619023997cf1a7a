//! HTTP surface of the daemon.
//!
//! Thin handlers: decode the request, call the service seam, map the error
//! kind onto a status code. The scene stream upgrade lives in
//! [`crate::stream`].

use axum::{
    extract::rejection::JsonRejection,
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use outpost_core::{
    EnergyOverride, MaintenanceResult, Rect, Scene, SceneAgent, SceneBuilding, SceneDims,
    SceneGrid, Snapshot, UpdateAgentTemplateInput, UpdateBuildingTemplateInput,
    UpdateSceneAgentInput, UpdateSceneBuildingInput, UpdateSceneConfigInput,
};
use outpost_game::{ActionEvent, AgentActionState, BuildingsPreview, GameError, LogActionInput};

use crate::state::AppState;
use crate::stream::scene_stream_handler;

pub fn make_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/game/scene", get(get_game_scene))
        .route("/v1/game/scene/stream", get(scene_stream_handler))
        .route(
            "/v1/game/scene/buildings/{building_id}/energy",
            post(update_building_energy),
        )
        .route(
            "/v1/game/scene/agents/{agent_id}/position",
            put(update_agent_position),
        )
        .route(
            "/v1/game/scene/agents/{agent_id}/behaviors/maintain-energy",
            post(maintain_energy),
        )
        .route(
            "/v1/system/scene",
            get(get_system_scene).put(update_system_scene),
        )
        .route(
            "/v1/system/templates/buildings/{id}",
            put(update_building_template),
        )
        .route(
            "/v1/system/templates/agents/{id}",
            put(update_agent_template),
        )
        .route(
            "/v1/system/scene/buildings/preview",
            get(preview_scene_buildings),
        )
        .route(
            "/v1/system/scene/buildings/{id}",
            put(update_scene_building).delete(delete_scene_building),
        )
        .route("/v1/system/scene/agents/{id}", put(update_scene_agent))
        .route(
            "/v1/agents/{agent_id}/actions",
            post(create_agent_action).get(list_agent_actions),
        )
        .route("/v1/agents/{agent_id}/state", get(get_agent_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

pub enum ApiError {
    Game(GameError),
    BadRequest(String),
}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        Self::Game(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Game(err) => {
                let status = match &err {
                    GameError::InvalidSceneConfig(_)
                    | GameError::InvalidTemplate(_)
                    | GameError::InvalidSceneEntity(_) => StatusCode::BAD_REQUEST,
                    GameError::SolarTemplateMissing => StatusCode::FAILED_DEPENDENCY,
                    GameError::NoAvailablePlacement => StatusCode::CONFLICT,
                    GameError::SceneNotFound(_)
                    | GameError::LoadTimeout
                    | GameError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!("request failed: {err}");
                }
                (status, err.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SystemSceneUpdateRequest {
    scene_id: String,
    name: String,
    grid: SceneGrid,
    dimensions: SceneDims,
}

#[derive(Debug, Default, Deserialize)]
struct TemplateEnergyRequest {
    #[serde(rename = "type")]
    energy_type: Option<String>,
    capacity: Option<i32>,
    current: Option<i32>,
    output: Option<i32>,
    rate: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct TemplateBuildingRequest {
    #[serde(default)]
    label: String,
    energy: Option<TemplateEnergyRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemplateAgentRequest {
    #[serde(default)]
    label: String,
    color: Option<i32>,
    default_position: Option<Vec<i32>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneBuildingRequest {
    #[serde(default)]
    label: String,
    template_id: Option<String>,
    #[serde(default)]
    rect: Vec<i32>,
    energy: Option<TemplateEnergyRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneAgentRequest {
    #[serde(default)]
    label: String,
    template_id: Option<String>,
    #[serde(default)]
    position: Vec<i32>,
    color: Option<i32>,
    #[serde(default)]
    actions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BuildingEnergyUpdateRequest {
    current: f64,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPositionUpdateRequest {
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
}

#[derive(Debug, Deserialize)]
struct AgentActionRequest {
    label: Option<String>,
    #[serde(default)]
    action_type: String,
    payload: Option<serde_json::Value>,
    issued_by: Option<String>,
    source: Option<String>,
    correlation_id: Option<String>,
    result_status: Option<String>,
    result_message: Option<String>,
    actions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct PreviewQuery {
    #[serde(rename = "sceneId")]
    scene_id: Option<String>,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ListActionsQuery {
    limit: Option<i64>,
}

fn energy_override(request: Option<TemplateEnergyRequest>) -> Option<EnergyOverride> {
    request.map(|energy| EnergyOverride {
        energy_type: normalize_opt(energy.energy_type),
        capacity: energy.capacity,
        current: energy.current,
        output: energy.output,
        rate: energy.rate,
    })
}

fn normalize_opt(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "environment": state.environment,
        "dependencies": ["game", "database"],
    }))
}

async fn get_game_scene(State(state): State<AppState>) -> Json<Scene> {
    Json(state.game.scene())
}

async fn get_system_scene(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.game.snapshot())
}

async fn update_system_scene(
    State(state): State<AppState>,
    payload: Result<Json<SystemSceneUpdateRequest>, JsonRejection>,
) -> Result<Json<Snapshot>, ApiError> {
    let Json(req) = payload?;
    let snapshot = state
        .game
        .update_scene_config(UpdateSceneConfigInput {
            scene_id: req.scene_id,
            name: req.name,
            grid: req.grid,
            dimensions: req.dimensions,
        })
        .await?;
    state.broadcaster.publish_scene(&state.game.scene());
    Ok(Json(snapshot))
}

async fn update_building_energy(
    State(state): State<AppState>,
    Path(building_id): Path<String>,
    payload: Result<Json<BuildingEnergyUpdateRequest>, JsonRejection>,
) -> Result<Json<SceneBuilding>, ApiError> {
    if building_id.trim().is_empty() {
        return Err(ApiError::BadRequest("buildingID is required".to_string()));
    }
    let Json(req) = payload?;
    let building = state
        .game
        .update_building_energy_current(&building_id, req.current)
        .await?;
    Ok(Json(building))
}

async fn update_agent_position(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    payload: Result<Json<AgentPositionUpdateRequest>, JsonRejection>,
) -> Result<Json<SceneAgent>, ApiError> {
    if agent_id.trim().is_empty() {
        return Err(ApiError::BadRequest("agentID is required".to_string()));
    }
    let Json(req) = payload?;
    let agent = state
        .game
        .update_agent_runtime_position(&agent_id, req.x, req.y)
        .await?;
    Ok(Json(agent))
}

async fn maintain_energy(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<Json<MaintenanceResult>, ApiError> {
    if agent_id.trim().is_empty() {
        return Err(ApiError::BadRequest("agentID is required".to_string()));
    }
    let result = state.game.maintain_energy_non_negative(&agent_id).await?;
    state.broadcaster.publish_scene(&result.scene);
    Ok(Json(result))
}

async fn update_building_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TemplateBuildingRequest>, JsonRejection>,
) -> Result<Json<Snapshot>, ApiError> {
    if id.trim().is_empty() {
        return Err(ApiError::BadRequest("id is required".to_string()));
    }
    let Json(req) = payload?;
    let snapshot = state
        .game
        .update_building_template(UpdateBuildingTemplateInput {
            id,
            label: req.label,
            energy: energy_override(req.energy),
        })
        .await?;
    Ok(Json(snapshot))
}

async fn update_agent_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TemplateAgentRequest>, JsonRejection>,
) -> Result<Json<Snapshot>, ApiError> {
    if id.trim().is_empty() {
        return Err(ApiError::BadRequest("id is required".to_string()));
    }
    let Json(req) = payload?;
    let default_position = match req.default_position.as_deref() {
        Some([x, y]) => Some([*x, *y]),
        _ => None,
    };
    let snapshot = state
        .game
        .update_agent_template(UpdateAgentTemplateInput {
            id,
            label: req.label,
            color: req.color,
            default_position,
        })
        .await?;
    Ok(Json(snapshot))
}

async fn update_scene_building(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<SceneBuildingRequest>, JsonRejection>,
) -> Result<Json<Snapshot>, ApiError> {
    if id.trim().is_empty() {
        return Err(ApiError::BadRequest("id is required".to_string()));
    }
    let Json(req) = payload?;
    let [x, y, w, h] = req.rect.as_slice() else {
        return Err(ApiError::BadRequest(
            "rect must contain [x, y, width, height]".to_string(),
        ));
    };
    let snapshot = state
        .game
        .update_scene_building(UpdateSceneBuildingInput {
            id,
            label: req.label,
            template_id: normalize_opt(req.template_id),
            rect: Rect::new(*x, *y, *w, *h),
            energy: energy_override(req.energy),
        })
        .await?;
    Ok(Json(snapshot))
}

async fn delete_scene_building(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Snapshot>, ApiError> {
    if id.trim().is_empty() {
        return Err(ApiError::BadRequest("id is required".to_string()));
    }
    let snapshot = state.game.delete_scene_building(&id).await?;
    Ok(Json(snapshot))
}

async fn update_scene_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<SceneAgentRequest>, JsonRejection>,
) -> Result<Json<Snapshot>, ApiError> {
    if id.trim().is_empty() {
        return Err(ApiError::BadRequest("id is required".to_string()));
    }
    let Json(req) = payload?;
    let [x, y] = req.position.as_slice() else {
        return Err(ApiError::BadRequest(
            "position must contain [x, y]".to_string(),
        ));
    };
    let snapshot = state
        .game
        .update_scene_agent(UpdateSceneAgentInput {
            id,
            label: req.label,
            template_id: normalize_opt(req.template_id),
            position: [*x, *y],
            color: req.color,
            actions: req.actions,
        })
        .await?;
    Ok(Json(snapshot))
}

async fn preview_scene_buildings(
    State(state): State<AppState>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<BuildingsPreview>, ApiError> {
    let preview = state
        .game
        .preview_scene_buildings(query.scene_id.as_deref(), query.limit)
        .await?;
    Ok(Json(preview))
}

async fn create_agent_action(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    payload: Result<Json<AgentActionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if agent_id.trim().is_empty() {
        return Err(ApiError::BadRequest("agentID is required".to_string()));
    }
    let Json(req) = payload?;
    if req.action_type.trim().is_empty() {
        return Err(ApiError::BadRequest("action_type is required".to_string()));
    }
    state
        .actions
        .log_action(LogActionInput {
            agent_id,
            label: normalize_opt(req.label),
            action_type: req.action_type,
            payload: req.payload,
            issued_by: normalize_opt(req.issued_by),
            source: normalize_opt(req.source),
            correlation_id: normalize_opt(req.correlation_id),
            result_status: normalize_opt(req.result_status),
            result_message: normalize_opt(req.result_message),
            actions: req.actions,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "status": "logged" }))))
}

async fn list_agent_actions(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Query(query): Query<ListActionsQuery>,
) -> Result<Json<Vec<ActionEvent>>, ApiError> {
    if agent_id.trim().is_empty() {
        return Err(ApiError::BadRequest("agentID is required".to_string()));
    }
    let events = state
        .actions
        .list_events(&agent_id, query.limit.unwrap_or(0))
        .await?;
    Ok(Json(events))
}

async fn get_agent_state(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<Json<AgentActionState>, ApiError> {
    if agent_id.trim().is_empty() {
        return Err(ApiError::BadRequest("agentID is required".to_string()));
    }
    let agent_state = state.actions.state(&agent_id).await?;
    Ok(Json(agent_state))
}
