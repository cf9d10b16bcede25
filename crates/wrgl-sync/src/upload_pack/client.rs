use std::sync::Arc;

use tracing::{debug, info};
use wrgl_dag::CommitsQueue;
use wrgl_objects::ObjectStore;
use wrgl_protocol::{UploadPackReply, UploadPackRequest, UploadPackResponse};
use wrgl_types::ObjectSum;

use crate::error::{SyncError, SyncResult};
use crate::receiver::ObjectReceiver;
use crate::types::{FetchOptions, ReceiveStats};

/// Client half of a fetch.
///
/// Call [`start`](Self::start) for the first request, then feed every server
/// reply to [`step`](Self::step) until it returns `None`.
pub struct UploadPackClient {
    db: Arc<dyn ObjectStore>,
    wants: Vec<ObjectSum>,
    depth: u32,
    haves_per_round: usize,
    queue: CommitsQueue,
    done_sent: bool,
    receiver: ObjectReceiver,
}

impl UploadPackClient {
    /// `tips` are the local refs whose history is offered as haves. Wants
    /// already present locally are dropped.
    pub fn new(
        db: Arc<dyn ObjectStore>,
        tips: impl IntoIterator<Item = ObjectSum>,
        wants: impl IntoIterator<Item = ObjectSum>,
        options: &FetchOptions,
    ) -> SyncResult<Self> {
        let mut missing = Vec::new();
        for want in wants {
            if !missing.contains(&want) && !db.commit_exists(&want)? {
                missing.push(want);
            }
        }
        let queue = CommitsQueue::new(db.clone(), tips)?;
        let receiver = ObjectReceiver::new(db.clone(), missing.clone());
        Ok(Self {
            db,
            wants: missing,
            depth: options.depth,
            haves_per_round: options.haves_per_round.max(1),
            queue,
            done_sent: false,
            receiver,
        })
    }

    /// The wants still to be fetched.
    pub fn wants(&self) -> &[ObjectSum] {
        &self.wants
    }

    /// First request of the session, or `None` if there is nothing to fetch.
    pub fn start(&mut self) -> SyncResult<Option<UploadPackRequest>> {
        if self.wants.is_empty() {
            return Ok(None);
        }
        info!(wants = self.wants.len(), depth = self.depth, "starting upload-pack");
        let mut req = self.next_haves()?;
        req.wants = self.wants.clone();
        req.depth = self.depth;
        Ok(Some(req))
    }

    /// Handle one server reply. Returns the next request, or `None` once the
    /// last expected commit has been stored.
    pub fn step(&mut self, reply: UploadPackReply) -> SyncResult<Option<UploadPackRequest>> {
        match reply {
            UploadPackReply::Negotiation(resp) => self.negotiate(resp).map(Some),
            UploadPackReply::Packfile(bytes) => {
                if self.receiver.receive(bytes.as_slice())? {
                    let stats = self.receiver.stats();
                    info!(
                        commits = stats.commits,
                        tables = stats.tables,
                        blocks = stats.blocks,
                        "upload-pack finished"
                    );
                    Ok(None)
                } else {
                    Ok(Some(UploadPackRequest::default()))
                }
            }
        }
    }

    pub fn stats(&self) -> ReceiveStats {
        self.receiver.stats()
    }

    fn negotiate(&mut self, resp: UploadPackResponse) -> SyncResult<UploadPackRequest> {
        if !resp.acks.is_empty() {
            self.queue.remove_ancestors(&resp.acks)?;
        }
        if !resp.table_haves.is_empty() {
            let mut table_acks = Vec::new();
            for sum in resp.table_haves {
                if self.db.table_exists(&sum)? {
                    table_acks.push(sum);
                }
            }
            debug!(acks = table_acks.len(), "answering table haves");
            return Ok(UploadPackRequest {
                table_acks,
                ..Default::default()
            });
        }
        if self.done_sent {
            return Err(SyncError::protocol(
                "server kept negotiating after done was sent",
            ));
        }
        self.next_haves()
    }

    fn next_haves(&mut self) -> SyncResult<UploadPackRequest> {
        let mut haves = Vec::with_capacity(self.haves_per_round);
        while haves.len() < self.haves_per_round {
            match self.queue.pop_insert_parents()? {
                Some((sum, _)) => haves.push(sum),
                None => break,
            }
        }
        let done = self.queue.is_empty();
        self.done_sent = done;
        Ok(UploadPackRequest {
            haves,
            done,
            ..Default::default()
        })
    }
}
