//! Scene-wide energy bookkeeping.
//!
//! Pure functions only; persistence of the computed storage levels is the
//! store's business.

use crate::{BuildingEnergy, Scene, SceneBuilding};

/// Aggregated energy picture of a scene.
#[derive(Debug, Clone, Default)]
pub struct EnergyBalance {
    pub consumption: f64,
    pub output: f64,
    pub storage: Vec<SceneBuilding>,
}

impl EnergyBalance {
    /// `output − consumption`. Positive = surplus, negative = deficit.
    pub fn net_flow(&self) -> f64 {
        self.output - self.consumption
    }
}

/// Sum consumption and output over every building with an energy role and
/// collect the storage buildings in scene order.
pub fn energy_balance(scene: &Scene) -> EnergyBalance {
    let mut balance = EnergyBalance::default();
    for building in &scene.buildings {
        match building.energy {
            Some(BuildingEnergy::Consumer { rate }) => {
                balance.consumption += f64::from(rate);
            }
            Some(BuildingEnergy::Storage { output, .. }) => {
                balance.output += f64::from(output);
                balance.storage.push(building.clone());
            }
            None => {}
        }
    }
    balance
}

/// A storage building's post-tick charge level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLevel {
    pub building_id: String,
    pub current: i32,
}

/// Compute the storage updates one energy tick produces.
///
/// `change = (consumption − output) · drain_factor · seconds` is applied in
/// full to every storage building (each reservoir drains or charges at the
/// global net rate; the change is not divided among them). Deficits clamp
/// at zero, surpluses clamp at capacity, and buildings whose level would
/// not move are skipped. An empty result means the tick is a no-op and no
/// transaction should be opened.
pub fn plan_energy_tick(scene: &Scene, seconds: f64, drain_factor: f64) -> Vec<StorageLevel> {
    let balance = energy_balance(scene);
    if balance.storage.is_empty() {
        return Vec::new();
    }

    let net_load = balance.consumption - balance.output;
    if net_load == 0.0 {
        return Vec::new();
    }
    let change = net_load * drain_factor * seconds;
    if change == 0.0 {
        return Vec::new();
    }

    let mut updates = Vec::new();
    for building in &balance.storage {
        let Some(BuildingEnergy::Storage {
            capacity, current, ..
        }) = building.energy
        else {
            continue;
        };

        let updated = if net_load > 0.0 {
            (f64::from(current) - change).round().max(0.0) as i32
        } else {
            if capacity <= 0 {
                continue;
            }
            let gain = -change;
            (f64::from(current) + gain).round().min(f64::from(capacity)) as i32
        };

        if updated != current {
            updates.push(StorageLevel {
                building_id: building.id.clone(),
                current: updated,
            });
        }
    }
    updates
}
