//! Retrieval ordering and consolidation grouping.

use std::cmp::Ordering;

use chrono::Duration;

use waypoint_contracts::memory::Memory;

/// Importance descending; importances closer than `tie_band` are ordered by
/// `last_accessed_at` descending instead.
///
/// This is not a total order (ties do not chain), so it must only be used
/// with `rank`, never with `slice::sort_by`.
pub fn retrieval_order(a: &Memory, b: &Memory, tie_band: f64) -> Ordering {
    if (a.importance - b.importance).abs() < tie_band {
        b.last_accessed_at.cmp(&a.last_accessed_at)
    } else {
        b.importance.total_cmp(&a.importance)
    }
}

/// Stable insertion sort by `retrieval_order`.
pub fn rank(memories: &mut [Memory], tie_band: f64) {
    for i in 1..memories.len() {
        let mut j = i;
        while j > 0 && retrieval_order(&memories[j], &memories[j - 1], tie_band) == Ordering::Less {
            memories.swap(j, j - 1);
            j -= 1;
        }
    }
}

/// Split memories already sorted by `created_at` into runs whose
/// consecutive gaps are strictly shorter than `window`.
pub fn time_groups(sorted: Vec<Memory>, window: Duration) -> Vec<Vec<Memory>> {
    let mut groups: Vec<Vec<Memory>> = Vec::new();

    for memory in sorted {
        let joins_last = groups
            .last()
            .and_then(|g| g.last())
            .map(|prev| memory.created_at - prev.created_at < window)
            .unwrap_or(false);

        match groups.last_mut() {
            Some(group) if joins_last => group.push(memory),
            _ => groups.push(vec![memory]),
        }
    }

    groups
}
