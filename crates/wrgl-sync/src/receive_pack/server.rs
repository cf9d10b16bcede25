use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};
use wrgl_dag::is_ancestor_of;
use wrgl_objects::ObjectStore;
use wrgl_protocol::{ReceivePackBody, ReceivePackRequest, ReceivePackResponse, Update};
use wrgl_refs::{validate_ref_name, RefChange, RefStore};
use wrgl_types::ObjectSum;

use crate::error::{SyncError, SyncResult};
use crate::receiver::ObjectReceiver;
use crate::types::SessionOptions;

pub(crate) const ERR_STALE_REF: &str = "remote ref updated since checkout";
pub(crate) const ERR_DENY_DELETES: &str = "remote does not support deleting refs";
pub(crate) const ERR_DENY_NON_FAST_FORWARDS: &str = "remote does not support non-fast-forwards";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceivePackState {
    /// Waiting for the ref updates.
    Greet,
    /// Answering table haves until the first packfile arrives.
    AskForMore,
    /// Consuming packfiles until every pushed commit is stored.
    ReceiveObjects,
    Done,
}

/// Server half of a push.
///
/// Objects are stored as they arrive. Refs only move once every pushed
/// commit is present, and each ref update succeeds or fails on its own.
pub struct ReceivePackSession {
    db: Arc<dyn ObjectStore>,
    refs: Arc<dyn RefStore>,
    options: SessionOptions,
    state: ReceivePackState,
    updates: BTreeMap<String, Update>,
    receiver: Option<ObjectReceiver>,
}

impl ReceivePackSession {
    pub fn new(db: Arc<dyn ObjectStore>, refs: Arc<dyn RefStore>, options: SessionOptions) -> Self {
        Self {
            db,
            refs,
            options,
            state: ReceivePackState::Greet,
            updates: BTreeMap::new(),
            receiver: None,
        }
    }

    pub fn state(&self) -> ReceivePackState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == ReceivePackState::Done
    }

    /// Advance the session by one client request. A response carrying
    /// `updates` is final.
    pub fn step(&mut self, body: ReceivePackBody) -> SyncResult<ReceivePackResponse> {
        match (self.state, body) {
            (ReceivePackState::Greet, ReceivePackBody::Negotiation(req)) => self.greet(req),
            (ReceivePackState::AskForMore, ReceivePackBody::Negotiation(req)) => {
                self.ack_tables(&req.table_haves)
            }
            (
                ReceivePackState::AskForMore | ReceivePackState::ReceiveObjects,
                ReceivePackBody::Packfile(bytes),
            ) => self.receive_objects(&bytes),
            (ReceivePackState::Done, _) => {
                Err(SyncError::protocol("receive-pack session is finished"))
            }
            (state, ReceivePackBody::Packfile(_)) => Err(SyncError::protocol(format!(
                "unexpected packfile in state {state:?}"
            ))),
            (state, ReceivePackBody::Negotiation(_)) => Err(SyncError::protocol(format!(
                "expected packfile in state {state:?}"
            ))),
        }
    }

    fn greet(&mut self, req: ReceivePackRequest) -> SyncResult<ReceivePackResponse> {
        if req.updates.is_empty() {
            return Err(SyncError::protocol("receive-pack request has no updates"));
        }
        let mut updates = req.updates;
        let mut expected = Vec::new();
        for (name, update) in updates.iter_mut() {
            update.err_msg = None;
            if let Err(e) = validate_ref_name(name) {
                update.err_msg = Some(e.to_string());
                continue;
            }
            if self.refs.get_ref(name)? != update.old_sum {
                update.err_msg = Some(ERR_STALE_REF.to_string());
                continue;
            }
            if let Some(sum) = update.sum {
                if !self.db.commit_exists(&sum)? && !expected.contains(&sum) {
                    expected.push(sum);
                }
            }
        }
        info!(
            updates = updates.len(),
            expected_commits = expected.len(),
            "receive-pack session started"
        );
        self.updates = updates;
        if expected.is_empty() {
            return self.finish();
        }
        self.receiver = Some(ObjectReceiver::new(self.db.clone(), expected).require_tables(true));
        self.ack_tables(&req.table_haves)
    }

    fn ack_tables(&mut self, table_haves: &[ObjectSum]) -> SyncResult<ReceivePackResponse> {
        let mut table_acks = Vec::new();
        for sum in table_haves {
            if self.db.table_exists(sum)? {
                table_acks.push(*sum);
            }
        }
        self.state = ReceivePackState::AskForMore;
        Ok(ReceivePackResponse {
            updates: None,
            table_acks,
        })
    }

    fn receive_objects(&mut self, packfile: &[u8]) -> SyncResult<ReceivePackResponse> {
        let receiver = self
            .receiver
            .as_mut()
            .ok_or_else(|| SyncError::protocol("no objects expected"))?;
        let done = receiver.receive(packfile)?;
        if done {
            return self.finish();
        }
        self.state = ReceivePackState::ReceiveObjects;
        Ok(ReceivePackResponse::default())
    }

    fn finish(&mut self) -> SyncResult<ReceivePackResponse> {
        self.save_refs()?;
        self.state = ReceivePackState::Done;
        self.receiver = None;
        Ok(ReceivePackResponse {
            updates: Some(std::mem::take(&mut self.updates)),
            table_acks: Vec::new(),
        })
    }

    fn save_refs(&mut self) -> SyncResult<()> {
        let mut saved = 0;
        for (name, update) in self.updates.iter_mut() {
            if update.is_rejected() {
                continue;
            }
            match check_update(self.db.as_ref(), self.refs.as_ref(), &self.options, name, update)? {
                Some(reason) => {
                    warn!(ref_name = %name, reason, "ref update rejected");
                    update.err_msg = Some(reason.to_string());
                }
                None => {
                    match update.sum {
                        Some(sum) => {
                            let change = RefChange::new("receive-pack", "update ref");
                            self.refs.save_ref(name, sum, change)?;
                        }
                        None => {
                            self.refs.delete_ref(name)?;
                        }
                    }
                    saved += 1;
                }
            }
        }
        info!(saved, rejected = self.updates.len() - saved, "refs updated");
        Ok(())
    }
}

/// Reason to refuse `update`, if any.
fn check_update(
    db: &dyn ObjectStore,
    refs: &dyn RefStore,
    options: &SessionOptions,
    name: &str,
    update: &Update,
) -> SyncResult<Option<&'static str>> {
    if refs.get_ref(name)? != update.old_sum {
        return Ok(Some(ERR_STALE_REF));
    }
    match (update.old_sum, update.sum) {
        (_, None) if options.deny_deletes => Ok(Some(ERR_DENY_DELETES)),
        (Some(old), Some(new))
            if options.deny_non_fast_forwards && !is_ancestor_of(db, &old, &new)? =>
        {
            Ok(Some(ERR_DENY_NON_FAST_FORWARDS))
        }
        _ => Ok(None),
    }
}
