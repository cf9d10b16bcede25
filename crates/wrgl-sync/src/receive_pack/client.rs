use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info};
use wrgl_objects::ObjectStore;
use wrgl_protocol::{ReceivePackBody, ReceivePackRequest, ReceivePackResponse, Update};
use wrgl_types::ObjectSum;

use crate::error::{SyncError, SyncResult};
use crate::finder::ClosedSetsFinder;
use crate::sender::ObjectSender;
use crate::types::PushOptions;

/// Client half of a push.
///
/// The closure to send is computed up front from the remote's advertised
/// refs. The client then offers its tables in batches, sends packfiles, and
/// waits for the server's final report.
pub struct ReceivePackClient {
    db: Arc<dyn ObjectStore>,
    updates: BTreeMap<String, Update>,
    commits: Vec<ObjectSum>,
    tables: Vec<ObjectSum>,
    table_candidates: VecDeque<ObjectSum>,
    acked_tables: Vec<ObjectSum>,
    common_commits: Vec<ObjectSum>,
    table_haves_per_round: usize,
    max_packfile_size: u64,
    sender: Option<ObjectSender>,
    objects_sent: usize,
}

impl ReceivePackClient {
    /// `remote_refs` is the remote's ref advertisement. Every update with a
    /// new sum must name a local commit.
    pub fn new(
        db: Arc<dyn ObjectStore>,
        remote_refs: &BTreeMap<String, ObjectSum>,
        updates: BTreeMap<String, Update>,
        options: &PushOptions,
    ) -> SyncResult<Self> {
        let mut wants: Vec<ObjectSum> = Vec::new();
        for sum in updates.values().filter_map(|u| u.sum) {
            if !wants.contains(&sum) {
                wants.push(sum);
            }
        }
        let mut haves = Vec::new();
        for sum in remote_refs.values() {
            if db.commit_exists(sum)? {
                haves.push(*sum);
            }
        }
        let mut finder = ClosedSetsFinder::new(db.clone(), wants.iter().copied())?
            .require_full_wants(false)
            .trust_haves(true);
        finder.process(&wants, &haves, true)?;
        let commits = finder.commits_to_send()?;
        let tables = finder.tables_to_send()?;
        debug!(
            commits = commits.len(),
            tables = tables.len(),
            commons = haves.len(),
            "computed objects to push"
        );
        Ok(Self {
            db,
            updates,
            commits,
            table_candidates: tables.iter().copied().collect(),
            tables,
            acked_tables: Vec::new(),
            common_commits: finder.common_commits(),
            table_haves_per_round: options.table_haves_per_round.max(1),
            max_packfile_size: options.max_packfile_size,
            sender: None,
            objects_sent: 0,
        })
    }

    /// Commits the server does not have yet, parents first.
    pub fn commits(&self) -> &[ObjectSum] {
        &self.commits
    }

    pub fn objects_sent(&self) -> usize {
        self.objects_sent
    }

    /// First request: the ref updates and the first batch of table haves.
    pub fn start(&mut self) -> ReceivePackBody {
        info!(
            updates = self.updates.len(),
            commits = self.commits.len(),
            "starting receive-pack"
        );
        ReceivePackBody::Negotiation(ReceivePackRequest {
            updates: self.updates.clone(),
            table_haves: self.next_table_haves(),
        })
    }

    /// Handle one server response. Returns the next request, or the final
    /// per-ref report once the server has applied the updates.
    pub fn step(&mut self, resp: ReceivePackResponse) -> SyncResult<PushStep> {
        if let Some(updates) = resp.updates {
            if let Some(sender) = &self.sender {
                self.objects_sent = sender.objects_sent();
            }
            info!(objects_sent = self.objects_sent, "receive-pack finished");
            return Ok(PushStep::Finished(updates));
        }
        if self.sender.is_none() {
            self.acked_tables.extend(resp.table_acks);
            if !self.table_candidates.is_empty() {
                return Ok(PushStep::Send(ReceivePackBody::Negotiation(
                    ReceivePackRequest {
                        updates: BTreeMap::new(),
                        table_haves: self.next_table_haves(),
                    },
                )));
            }
            self.start_sending()?;
        }
        let sender = self
            .sender
            .as_mut()
            .ok_or_else(|| SyncError::protocol("no objects to send"))?;
        if sender.is_done() {
            return Err(SyncError::protocol(
                "server wants more objects after the last packfile",
            ));
        }
        let (bytes, _) = sender.write_packfile()?;
        Ok(PushStep::Send(ReceivePackBody::Packfile(bytes)))
    }

    fn next_table_haves(&mut self) -> Vec<ObjectSum> {
        let n = self.table_haves_per_round.min(self.table_candidates.len());
        self.table_candidates.drain(..n).collect()
    }

    /// Refuse to send commits whose table neither side has.
    fn start_sending(&mut self) -> SyncResult<()> {
        let acked: HashSet<&ObjectSum> = self.acked_tables.iter().collect();
        let mut shallow = Vec::new();
        for sum in &self.commits {
            let commit = self.db.get_commit(sum)?;
            if !acked.contains(&commit.table) && !self.db.table_exists(&commit.table)? {
                shallow.push(*sum);
            }
        }
        if !shallow.is_empty() {
            return Err(SyncError::ShallowCommit(shallow));
        }
        let mut sender = ObjectSender::new(
            self.db.clone(),
            self.commits.clone(),
            self.tables.iter().copied(),
            &self.common_commits,
            self.max_packfile_size,
        )?;
        sender.add_common_tables(&self.acked_tables)?;
        self.sender = Some(sender);
        Ok(())
    }
}

/// Outcome of [`ReceivePackClient::step`].
#[derive(Debug)]
pub enum PushStep {
    Send(ReceivePackBody),
    Finished(BTreeMap<String, Update>),
}
