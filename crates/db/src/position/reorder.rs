//! Pure ordering math used by the position manager. Nothing here touches the
//! database, so the rules can be tested without a pool.

use std::collections::HashSet;

use uuid::Uuid;

use super::{PositionError, PositionUpdate};

/// New ordering of every container touched by a move.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct MovePlan {
    pub source: Vec<Uuid>,
    /// `None` when the item stays in its own container.
    pub destination: Option<Vec<Uuid>>,
}

/// Remove the item at `from` and insert it at `destination_index`.
///
/// `destination_index` is measured after the removal, so for a move inside one
/// container the valid range is `0..=len - 1`, and for a move into another
/// container it is `0..=destination.len()`.
pub(crate) fn plan_move(
    mut source: Vec<Uuid>,
    destination: Option<Vec<Uuid>>,
    from: usize,
    destination_index: usize,
) -> Result<MovePlan, PositionError> {
    let item_id = source.remove(from);

    let target = destination.as_ref().map_or(source.len(), Vec::len);
    if destination_index > target {
        return Err(PositionError::DestinationOutOfRange {
            index: destination_index as i64,
            max: target,
        });
    }

    match destination {
        None => {
            source.insert(destination_index, item_id);
            Ok(MovePlan {
                source,
                destination: None,
            })
        }
        Some(mut destination) => {
            destination.insert(destination_index, item_id);
            Ok(MovePlan {
                source,
                destination: Some(destination),
            })
        }
    }
}

/// Check that `updates` assigns every member exactly one position in `0..n`.
pub(crate) fn validate_permutation(
    members: &[Uuid],
    updates: &[PositionUpdate],
) -> Result<(), PositionError> {
    let n = members.len();
    if updates.len() != n {
        return Err(PositionError::InconsistentPositions(format!(
            "expected {n} positions, got {}",
            updates.len()
        )));
    }

    let members: HashSet<&Uuid> = members.iter().collect();
    let mut seen_ids = HashSet::with_capacity(n);
    let mut taken = vec![false; n];

    for update in updates {
        if !members.contains(&update.id) {
            return Err(PositionError::InconsistentPositions(format!(
                "{} does not belong to this container",
                update.id
            )));
        }
        if !seen_ids.insert(update.id) {
            return Err(PositionError::InconsistentPositions(format!(
                "{} listed more than once",
                update.id
            )));
        }
        let slot = usize::try_from(update.position)
            .ok()
            .filter(|&p| p < n)
            .ok_or_else(|| {
                PositionError::InconsistentPositions(format!(
                    "position {} out of range for {n} items",
                    update.position
                ))
            })?;
        if std::mem::replace(&mut taken[slot], true) {
            return Err(PositionError::InconsistentPositions(format!(
                "position {} assigned twice",
                update.position
            )));
        }
    }

    Ok(())
}

/// True when `positions` is exactly `{0, .., n-1}`, in any order.
pub fn is_dense(positions: &[i64]) -> bool {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    sorted.iter().zip(0_i64..).all(|(p, expected)| *p == expected)
}
