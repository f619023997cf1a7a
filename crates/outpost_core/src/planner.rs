//! Solar-tower placement planner behind the maintain-energy behavior.
//!
//! Everything here runs in memory against an immutable scene snapshot; the
//! caller persists the planned towers and reports the relocation.

use std::collections::{HashSet, VecDeque};

use thiserror::Error;

use crate::{
    energy_balance, AgentRelocation, Rect, Scene, SceneAgent, SceneDims,
    BuildingEnergy, SOLAR_TOWER_TEMPLATE_ID,
};

/// Footprint used when no existing solar tower reveals one.
const FALLBACK_FOOTPRINT: (i32, i32) = (4, 4);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("solar tower template missing or misconfigured")]
    SolarTemplateMissing,
    #[error("no available placement for solar towers")]
    NoAvailablePlacement,
}

/// A tower the planner wants persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTower {
    pub id: String,
    pub label: String,
    pub rect: Rect,
}

/// Output of [`plan_solar_towers`]. An empty `towers` list means the scene
/// already has non-negative net flow and nothing needs to be built.
#[derive(Debug, Clone, PartialEq)]
pub struct TowerPlan {
    pub towers: Vec<PlannedTower>,
    pub relocation: Option<AgentRelocation>,
    pub net_flow_before: f64,
}

/// Plan enough solar towers around `agent` to lift the scene's net energy
/// flow back to non-negative.
///
/// Deterministic for a given `(scene, agent)`: the adjacency probe order is
/// fixed (left, right, top, bottom) and the BFS expands neighbors in fixed
/// (−x, +x, −y, +y) order.
pub fn plan_solar_towers(scene: &Scene, agent: &SceneAgent) -> Result<TowerPlan, PlanError> {
    let balance = energy_balance(scene);
    let net_flow = balance.net_flow();

    let mut plan = TowerPlan {
        towers: Vec::new(),
        relocation: None,
        net_flow_before: net_flow,
    };
    if net_flow >= 0.0 {
        return Ok(plan);
    }

    let tower_output = solar_template_output(scene).ok_or(PlanError::SolarTemplateMissing)?;

    let deficit = balance.consumption - balance.output;
    if deficit <= 0.0 {
        return Ok(plan);
    }
    let towers_needed = (deficit / tower_output).ceil() as usize;
    if towers_needed == 0 {
        return Ok(plan);
    }

    let (width, height) = solar_tower_footprint(scene);
    let mut occupied: Vec<Rect> = scene.buildings.iter().map(|b| b.rect).collect();
    let mut next_index = next_solar_tower_index(scene);

    let agent_tile = clamp_tile(agent.position, &scene.dimensions);
    let mut current_tile = agent_tile;
    let mut visited_tiles: HashSet<(i32, i32)> = HashSet::new();
    visited_tiles.insert(agent_tile);

    while plan.towers.len() < towers_needed {
        let placement = match find_adjacent_placement(
            current_tile,
            width,
            height,
            &occupied,
            &scene.dimensions,
        ) {
            Some(placement) => placement,
            None => {
                let (tile, placement) = find_relocation_and_placement(
                    current_tile,
                    width,
                    height,
                    &occupied,
                    &scene.dimensions,
                )
                .ok_or(PlanError::NoAvailablePlacement)?;
                // A tile the agent already stood on this invocation means
                // the search is cycling, not progressing.
                if !visited_tiles.insert(tile) {
                    return Err(PlanError::NoAvailablePlacement);
                }
                current_tile = tile;
                plan.relocation = Some(AgentRelocation {
                    agent_id: agent.id.clone(),
                    position: [f64::from(tile.0), f64::from(tile.1)],
                });
                placement
            }
        };

        next_index += 1;
        let rect = Rect::new(placement.0, placement.1, width, height);
        plan.towers.push(PlannedTower {
            id: format!("solar_tower_auto_{next_index:02}"),
            label: format!("Solar Tower Auto {next_index:02}"),
            rect,
        });
        occupied.push(rect);
    }

    Ok(plan)
}

fn solar_template_output(scene: &Scene) -> Option<f64> {
    let template = scene.building_template(SOLAR_TOWER_TEMPLATE_ID)?;
    match template.energy {
        Some(BuildingEnergy::Storage { output, .. }) if output > 0 => Some(f64::from(output)),
        _ => None,
    }
}

/// Adopt the footprint of an existing solar tower, falling back to 4×4.
fn solar_tower_footprint(scene: &Scene) -> (i32, i32) {
    for building in &scene.buildings {
        let is_tower = building.template_id.as_deref() == Some(SOLAR_TOWER_TEMPLATE_ID)
            || building.id.starts_with(SOLAR_TOWER_TEMPLATE_ID);
        if is_tower {
            return (building.rect.w, building.rect.h);
        }
    }
    FALLBACK_FOOTPRINT
}

/// Highest trailing index among `solar_tower*` building ids, defaulting to
/// zero. Tolerates zero-padded and unpadded `_`-delimited suffixes.
fn next_solar_tower_index(scene: &Scene) -> i32 {
    let mut max_index = 0;
    for building in &scene.buildings {
        if !building.id.starts_with(SOLAR_TOWER_TEMPLATE_ID) {
            continue;
        }
        let Some(last) = building.id.split('_').next_back() else {
            continue;
        };
        let value = last
            .trim_start_matches('0')
            .parse::<i32>()
            .or_else(|_| last.parse::<i32>());
        if let Ok(value) = value {
            max_index = max_index.max(value);
        }
    }
    max_index
}

/// The agent's tile: `⌊position⌋` clamped into the scene dimensions.
pub fn clamp_tile(position: [f64; 2], dims: &SceneDims) -> (i32, i32) {
    let clamp = |raw: f64, upper: i32| {
        let mut tile = raw.floor() as i32;
        if tile < 0 {
            tile = 0;
        }
        if upper > 0 && tile >= upper {
            tile = upper - 1;
        }
        tile
    };
    (clamp(position[0], dims.width), clamp(position[1], dims.height))
}

/// Try the four tile-aligned candidates around `tile`, in fixed order:
/// left, right, top, bottom.
fn find_adjacent_placement(
    tile: (i32, i32),
    width: i32,
    height: i32,
    occupied: &[Rect],
    dims: &SceneDims,
) -> Option<(i32, i32)> {
    let candidates = [
        (tile.0 - width, tile.1),
        (tile.0 + 1, tile.1),
        (tile.0, tile.1 - height),
        (tile.0, tile.1 + 1),
    ];

    candidates.into_iter().find(|&(x, y)| {
        let rect = Rect::new(x, y, width, height);
        rect.fits_within(dims) && area_is_free(occupied, &rect)
    })
}

/// BFS over the grid from `start`, 4-connected, FIFO. For each dequeued
/// tile not covered by an occupied rect, rerun the adjacency probe with
/// that tile standing in for the agent. Returns the first
/// `(tile, placement)` pair found.
fn find_relocation_and_placement(
    start: (i32, i32),
    width: i32,
    height: i32,
    occupied: &[Rect],
    dims: &SceneDims,
) -> Option<((i32, i32), (i32, i32))> {
    if dims.width <= 0 || dims.height <= 0 {
        return None;
    }

    let in_bounds = |(x, y): (i32, i32)| x >= 0 && x < dims.width && y >= 0 && y < dims.height;

    let mut visited: HashSet<(i32, i32)> = HashSet::new();
    let mut queue: VecDeque<(i32, i32)> = VecDeque::new();
    queue.push_back(start);
    if in_bounds(start) {
        visited.insert(start);
    }

    while let Some(tile) = queue.pop_front() {
        if !in_bounds(tile) {
            continue;
        }

        if !tile_is_blocked(tile.0, tile.1, occupied) {
            if let Some(placement) =
                find_adjacent_placement(tile, width, height, occupied, dims)
            {
                return Some((tile, placement));
            }
        }

        let neighbors = [
            (tile.0 - 1, tile.1),
            (tile.0 + 1, tile.1),
            (tile.0, tile.1 - 1),
            (tile.0, tile.1 + 1),
        ];
        for neighbor in neighbors {
            if in_bounds(neighbor) && visited.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }

    None
}

fn tile_is_blocked(x: i32, y: i32, occupied: &[Rect]) -> bool {
    occupied.iter().any(|rect| rect.contains_tile(x, y))
}

fn area_is_free(occupied: &[Rect], rect: &Rect) -> bool {
    !occupied.iter().any(|other| rect.overlaps(other))
}
