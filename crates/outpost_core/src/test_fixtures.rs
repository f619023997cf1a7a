//! Shared test fixtures for outpost_core and downstream crates.
//!
//! `base_scene()` is a 16×16 scene with one consumer, one storage, one
//! solar-tower template, and one agent at the center: the smallest scene
//! the planner and the tick both act on. The builder helpers compose
//! variations without repeating struct literals in every test.

use crate::{
    AgentTemplate, BuildingEnergy, BuildingTemplate, Rect, Scene, SceneAgent, SceneBuilding,
    SceneDims, SceneGrid, SOLAR_TOWER_TEMPLATE_ID,
};

pub fn empty_scene(width: i32, height: i32) -> Scene {
    Scene {
        id: "scene_test".to_string(),
        name: "Test Outpost".to_string(),
        grid: SceneGrid {
            cols: width,
            rows: height,
            tile_size: 32,
        },
        dimensions: SceneDims { width, height },
        buildings: Vec::new(),
        agents: Vec::new(),
        building_templates: Vec::new(),
        agent_templates: Vec::new(),
    }
}

/// 16×16 scene: consumer rate 60, storage output 20, solar template
/// output 20, agent at (8, 8).
pub fn base_scene() -> Scene {
    let mut scene = empty_scene(16, 16);
    scene.buildings.push(consumer("habitat", Rect::new(0, 0, 2, 2), 60));
    scene
        .buildings
        .push(storage("power_cell", Rect::new(2, 0, 2, 2), 100, 0, 20));
    scene.building_templates.push(solar_template(20));
    scene.agents.push(agent("ares_01", 8.0, 8.0));
    scene
}

pub fn building(id: &str, rect: Rect) -> SceneBuilding {
    SceneBuilding {
        id: id.to_string(),
        template_id: None,
        label: id.to_string(),
        rect,
        energy: None,
    }
}

pub fn consumer(id: &str, rect: Rect, rate: i32) -> SceneBuilding {
    SceneBuilding {
        energy: Some(BuildingEnergy::Consumer { rate }),
        ..building(id, rect)
    }
}

pub fn storage(id: &str, rect: Rect, capacity: i32, current: i32, output: i32) -> SceneBuilding {
    SceneBuilding {
        energy: Some(BuildingEnergy::Storage {
            capacity,
            current,
            output,
        }),
        ..building(id, rect)
    }
}

pub fn agent(id: &str, x: f64, y: f64) -> SceneAgent {
    SceneAgent {
        id: id.to_string(),
        template_id: None,
        label: id.to_string(),
        position: [x, y],
        color: None,
        actions: Vec::new(),
    }
}

pub fn solar_template(output: i32) -> BuildingTemplate {
    BuildingTemplate {
        id: SOLAR_TOWER_TEMPLATE_ID.to_string(),
        label: "Solar Tower".to_string(),
        energy: Some(BuildingEnergy::Storage {
            capacity: 0,
            current: 0,
            output,
        }),
    }
}

pub fn agent_template(id: &str) -> AgentTemplate {
    AgentTemplate {
        id: id.to_string(),
        label: id.to_string(),
        color: Some(0x00ff_cc00),
        position: Some([1, 1]),
    }
}
