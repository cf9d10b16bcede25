use std::collections::{HashSet, VecDeque};

use wrgl_objects::ObjectStore;
use wrgl_types::ObjectSum;

use crate::error::{load_commit, DagResult};

/// Returns `true` if `ancestor` is reachable from `descendant` by following
/// parent pointers. A commit counts as its own ancestor.
pub fn is_ancestor_of(
    store: &dyn ObjectStore,
    ancestor: &ObjectSum,
    descendant: &ObjectSum,
) -> DagResult<bool> {
    if ancestor == descendant {
        return Ok(true);
    }
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([*descendant]);
    while let Some(sum) = queue.pop_front() {
        if !visited.insert(sum) {
            continue;
        }
        let commit = load_commit(store, &sum)?;
        for parent in commit.parents {
            if parent == *ancestor {
                return Ok(true);
            }
            if !visited.contains(&parent) {
                queue.push_back(parent);
            }
        }
    }
    Ok(false)
}

/// All commits reachable from `sum`, including `sum` itself.
pub fn ancestors(store: &dyn ObjectStore, sum: &ObjectSum) -> DagResult<HashSet<ObjectSum>> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([*sum]);
    while let Some(current) = queue.pop_front() {
        if !visited.insert(current) {
            continue;
        }
        let commit = load_commit(store, &current)?;
        queue.extend(commit.parents.into_iter().filter(|p| !visited.contains(p)));
    }
    Ok(visited)
}
