//! Constrained randomized assignment of submitted values.

use std::cmp::Reverse;
use std::collections::HashMap;

use rand::Rng;
use rand::seq::SliceRandom;

use super::session::SessionId;

/// One member's contribution to a shuffle round.
#[derive(Debug, Clone)]
pub struct Entry {
    pub id: SessionId,
    pub value: String,
    pub group: String,
}

/// Deal every entry's value to some other entry, such that nobody receives
/// their own value and nobody receives a value from a member of their own
/// non-empty group. An empty group means untagged: exempt from the group
/// rule in both directions.
///
/// Greedy single pass, no backtracking: members of the largest groups pick
/// first, while the donor pool is widest; untagged members always pick
/// last. The pool order is uniformly random, so a failed round may well
/// succeed when retried. Returns `None` as soon as any member has no
/// eligible donor left; no partial assignment escapes.
pub fn assign<R: Rng>(entries: &[Entry], rng: &mut R) -> Option<HashMap<SessionId, String>> {
    let mut group_sizes: HashMap<&str, usize> = HashMap::new();
    for entry in entries {
        *group_sizes.entry(entry.group.as_str()).or_insert(0) += 1;
    }

    let mut tags: Vec<(&str, usize)> = group_sizes.into_iter().collect();
    tags.sort_by_key(|&(tag, count)| (tag.is_empty(), Reverse(count)));

    let mut pool: Vec<&Entry> = entries.iter().collect();
    pool.shuffle(rng);

    let mut assignments = HashMap::with_capacity(entries.len());
    for (tag, _) in tags {
        for target in entries.iter().filter(|entry| entry.group == tag) {
            let found = pool.iter().position(|donor| {
                donor.id != target.id
                    && (target.group.is_empty() || donor.group != target.group)
            })?;
            let donor = pool.remove(found);
            assignments.insert(target.id, donor.value.clone());
        }
    }
    Some(assignments)
}
