//! Shape reconciliation.
//!
//! Applies incremental add/update/remove diffs of named map regions to the
//! client-held map. Entries are independent (ordering across distinct
//! names is irrelevant) and every operation is idempotent per name, so a
//! replayed diff leaves the map exactly as a single application would.

use crate::map::GameMap;
use atlas_event_system::{Shape, ShapeDiff};
use tracing::trace;

/// Applies one shape diff to the local map.
///
/// Per entry, keyed by name:
/// * removal marker (`None`): delete the local shape; an absent name is a
///   no-op
/// * name exists locally: mutate the existing shape's fields in place,
///   preserving its identity and accumulated metadata
/// * unseen name with a payload: create a new shape, deriving position and
///   size from the payload's hitbox region, with empty extended metadata
pub fn apply_shape_diff(map: &mut GameMap, diff: &ShapeDiff) {
    for (name, entry) in diff {
        match entry {
            None => {
                if map.remove_shape(name).is_none() {
                    trace!("Removal of unknown shape '{}' ignored", name);
                }
            }
            Some(payload) => {
                if let Some(shape) = map.shape_mut(name) {
                    shape.apply_payload(payload);
                } else {
                    map.create_shape(Shape::from_payload(name.clone(), payload));
                }
            }
        }
    }
}
