//! Closed-set negotiation.
//!
//! Given the commits a peer wants and the commits it claims to have, the
//! finder works out which of the haves this side also holds (the *commons*)
//! and the smallest set of commits and tables that completes the wants on
//! the other side. Negotiation may span several rounds: each round brings
//! more haves until the peer runs out of history and says `done`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::debug;
use wrgl_dag::CommitsQueue;
use wrgl_objects::{Commit, ObjectStore};
use wrgl_types::ObjectSum;

use crate::error::{SyncError, SyncResult};
use crate::types::DEFAULT_MAX_NEGOTIATION_ROUNDS;

/// Commits reached from one want, with their distance in hops.
struct Walk {
    hops: HashMap<ObjectSum, u32>,
    commits: HashMap<ObjectSum, Commit>,
    reached_root: bool,
}

pub struct ClosedSetsFinder {
    db: Arc<dyn ObjectStore>,
    queue: CommitsQueue,
    depth: u32,
    max_rounds: u32,
    rounds: u32,
    require_full_wants: bool,
    trust_haves: bool,
    commons: HashSet<ObjectSum>,
    /// Accepted wants whose closure is not final yet.
    wants: Vec<ObjectSum>,
    accepted_wants: HashSet<ObjectSum>,
    commit_lists: Vec<Vec<ObjectSum>>,
    table_lists: Vec<Vec<ObjectSum>>,
    emitted_commits: HashSet<ObjectSum>,
    emitted_tables: HashSet<ObjectSum>,
}

impl ClosedSetsFinder {
    /// Create a finder over `db`. Wants are only accepted when reachable
    /// from `tips`, normally the values of every local ref.
    pub fn new(
        db: Arc<dyn ObjectStore>,
        tips: impl IntoIterator<Item = ObjectSum>,
    ) -> SyncResult<Self> {
        let queue = CommitsQueue::new(db.clone(), tips)?;
        Ok(Self {
            db,
            queue,
            depth: 0,
            max_rounds: DEFAULT_MAX_NEGOTIATION_ROUNDS,
            rounds: 0,
            require_full_wants: true,
            trust_haves: false,
            commons: HashSet::new(),
            wants: Vec::new(),
            accepted_wants: HashSet::new(),
            commit_lists: Vec::new(),
            table_lists: Vec::new(),
            emitted_commits: HashSet::new(),
            emitted_tables: HashSet::new(),
        })
    }

    /// Only the tables of commits fewer than `depth` hops from a want are
    /// sent. Zero means no limit.
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Round after which the peer is treated as `done`.
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Whether a want must have its table present to be accepted.
    pub fn require_full_wants(mut self, require: bool) -> Self {
        self.require_full_wants = require;
        self
    }

    /// Acknowledge every stored have, even one no tip reaches. Used when the
    /// haves are the peer's advertised refs rather than its claims.
    pub fn trust_haves(mut self, trust: bool) -> Self {
        self.trust_haves = trust;
        self
    }

    /// Run one negotiation round and return the haves acknowledged as
    /// common.
    ///
    /// Fails with [`SyncError::UnrecognizedWants`] without changing any
    /// state if a want is unknown or shallow here.
    pub fn process(
        &mut self,
        wants: &[ObjectSum],
        haves: &[ObjectSum],
        done: bool,
    ) -> SyncResult<Vec<ObjectSum>> {
        self.ensure_wants_are_reachable(wants)?;
        self.rounds += 1;
        let done = done || self.rounds >= self.max_rounds;
        let acks = self.find_commons(haves)?;
        self.find_closed_set(done)?;
        debug!(
            round = self.rounds,
            wants = wants.len(),
            haves = haves.len(),
            acks = acks.len(),
            done,
            pending = self.wants.len(),
            "negotiation round"
        );
        Ok(acks)
    }

    /// `true` once no want is waiting for more haves.
    pub fn is_closed(&self) -> bool {
        self.wants.is_empty()
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Commits to send, parents before children. Finalizes any want still
    /// waiting for haves.
    pub fn commits_to_send(&mut self) -> SyncResult<Vec<ObjectSum>> {
        self.find_closed_set(true)?;
        Ok(self
            .commit_lists
            .iter()
            .flatten()
            .filter(|sum| !self.commons.contains(*sum))
            .copied()
            .collect())
    }

    /// Tables of the commits to send within the depth limit, each once.
    /// Finalizes any want still waiting for haves.
    pub fn tables_to_send(&mut self) -> SyncResult<Vec<ObjectSum>> {
        self.find_closed_set(true)?;
        Ok(self.table_lists.iter().flatten().copied().collect())
    }

    /// Every commit known to be on both sides.
    pub fn common_commits(&self) -> Vec<ObjectSum> {
        self.commons.iter().copied().collect()
    }

    fn ensure_wants_are_reachable(&mut self, wants: &[ObjectSum]) -> SyncResult<()> {
        let mut unrecognized = Vec::new();
        let mut accepted = Vec::new();
        for want in wants {
            if self.accepted_wants.contains(want) || accepted.contains(want) {
                continue;
            }
            if !self.queue.seen(want) {
                self.queue.pop_until(want)?;
            }
            if !self.queue.seen(want) {
                unrecognized.push(*want);
                continue;
            }
            if self.require_full_wants {
                let commit = self.db.get_commit(want)?;
                if !self.db.table_exists(&commit.table)? {
                    unrecognized.push(*want);
                    continue;
                }
            }
            accepted.push(*want);
        }
        if !unrecognized.is_empty() {
            return Err(SyncError::UnrecognizedWants(unrecognized));
        }
        for want in accepted {
            self.accepted_wants.insert(want);
            self.wants.push(want);
        }
        Ok(())
    }

    fn find_commons(&mut self, haves: &[ObjectSum]) -> SyncResult<Vec<ObjectSum>> {
        let mut acks = Vec::new();
        for have in haves {
            if self.commons.contains(have) {
                acks.push(*have);
                continue;
            }
            if !self.db.commit_exists(have)? {
                continue;
            }
            if !self.trust_haves {
                if !self.queue.seen(have) {
                    self.queue.pop_until(have)?;
                }
                if !self.queue.seen(have) {
                    continue;
                }
            }
            acks.push(*have);
            self.mark_common(*have)?;
        }
        Ok(acks)
    }

    /// Record `sum` and all of its ancestors as common.
    fn mark_common(&mut self, sum: ObjectSum) -> SyncResult<()> {
        let mut stack = vec![sum];
        while let Some(current) = stack.pop() {
            if !self.commons.insert(current) {
                continue;
            }
            let commit = self.db.get_commit(&current)?;
            stack.extend(
                commit
                    .parents
                    .into_iter()
                    .filter(|p| !self.commons.contains(p)),
            );
        }
        Ok(())
    }

    fn find_closed_set(&mut self, done: bool) -> SyncResult<()> {
        for want in std::mem::take(&mut self.wants) {
            if self.commons.contains(&want) {
                continue;
            }
            let walk = self.walk(&want)?;
            // Without any common commit a root means the peer may simply not
            // have told us enough yet.
            if walk.reached_root && self.commons.is_empty() && !done {
                debug!(want = %want.short_hex(), "deferring want to next round");
                self.wants.push(want);
                continue;
            }
            self.emit(want, &walk);
        }
        Ok(())
    }

    /// Breadth-first walk from `want`, stopping at common commits.
    fn walk(&self, want: &ObjectSum) -> SyncResult<Walk> {
        let mut walk = Walk {
            hops: HashMap::new(),
            commits: HashMap::new(),
            reached_root: false,
        };
        let mut queue = VecDeque::from([(*want, 0u32)]);
        while let Some((sum, hop)) = queue.pop_front() {
            if walk.hops.contains_key(&sum) {
                continue;
            }
            walk.hops.insert(sum, hop);
            let commit = self.db.get_commit(&sum)?;
            if commit.is_root() {
                walk.reached_root = true;
            }
            for parent in &commit.parents {
                if !self.commons.contains(parent) && !walk.hops.contains_key(parent) {
                    queue.push_back((*parent, hop + 1));
                }
            }
            walk.commits.insert(sum, commit);
        }
        Ok(walk)
    }

    /// Append the walked commits in post-order, so every parent precedes
    /// its children, along with the tables within depth.
    fn emit(&mut self, want: ObjectSum, walk: &Walk) {
        let mut commits = Vec::new();
        let mut tables = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![(want, false)];
        while let Some((sum, expanded)) = stack.pop() {
            let commit = &walk.commits[&sum];
            if expanded {
                if self.emitted_commits.insert(sum) {
                    commits.push(sum);
                }
                if (self.depth == 0 || walk.hops[&sum] < self.depth)
                    && self.emitted_tables.insert(commit.table)
                {
                    tables.push(commit.table);
                }
                continue;
            }
            if !visited.insert(sum) {
                continue;
            }
            stack.push((sum, true));
            for parent in commit.parents.iter().rev() {
                if walk.commits.contains_key(parent) && !visited.contains(parent) {
                    stack.push((*parent, false));
                }
            }
        }
        debug!(
            want = %want.short_hex(),
            commits = commits.len(),
            tables = tables.len(),
            "closed set for want"
        );
        self.commit_lists.push(commits);
        self.table_lists.push(tables);
    }
}
