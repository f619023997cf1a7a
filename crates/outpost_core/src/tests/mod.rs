use crate::test_fixtures::*;
use crate::*;

mod planner;

// --- Shared test helpers ------------------------------------------------

/// Write a batch of storage levels back into an in-memory scene, the way
/// the store's tick transaction would.
fn apply_levels(scene: &mut Scene, levels: &[StorageLevel]) {
    for level in levels {
        let building = scene
            .buildings
            .iter_mut()
            .find(|b| b.id == level.building_id)
            .unwrap();
        let Some(BuildingEnergy::Storage {
            capacity, output, ..
        }) = building.energy
        else {
            panic!("level update targeted a non-storage building");
        };
        building.energy = Some(BuildingEnergy::Storage {
            capacity,
            current: level.current,
            output,
        });
    }
}

fn storage_current(scene: &Scene, id: &str) -> i32 {
    match scene.building(id).unwrap().energy {
        Some(BuildingEnergy::Storage { current, .. }) => current,
        other => panic!("expected storage energy on {id}, got {other:?}"),
    }
}
