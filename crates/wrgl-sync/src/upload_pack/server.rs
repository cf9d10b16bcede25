use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info};
use wrgl_objects::ObjectStore;
use wrgl_protocol::{UploadPackReply, UploadPackRequest, UploadPackResponse};
use wrgl_refs::RefStore;
use wrgl_types::ObjectSum;

use crate::error::{SyncError, SyncResult};
use crate::finder::ClosedSetsFinder;
use crate::sender::ObjectSender;
use crate::types::SessionOptions;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadPackState {
    /// Waiting for the first request carrying the wants.
    Greet,
    /// Exchanging commit haves and acks.
    Negotiate,
    /// Advertising candidate tables, waiting for table acks.
    NegotiateTables,
    /// Streaming packfiles, one per request.
    SendPackfile,
    Done,
}

/// Server half of a fetch, driven once per HTTP request.
pub struct UploadPackSession {
    db: Arc<dyn ObjectStore>,
    refs: Arc<dyn RefStore>,
    options: SessionOptions,
    state: UploadPackState,
    finder: Option<ClosedSetsFinder>,
    table_candidates: VecDeque<ObjectSum>,
    advertised_tables: HashSet<ObjectSum>,
    acked_tables: Vec<ObjectSum>,
    sender: Option<ObjectSender>,
}

impl UploadPackSession {
    pub fn new(db: Arc<dyn ObjectStore>, refs: Arc<dyn RefStore>, options: SessionOptions) -> Self {
        Self {
            db,
            refs,
            options,
            state: UploadPackState::Greet,
            finder: None,
            table_candidates: VecDeque::new(),
            advertised_tables: HashSet::new(),
            acked_tables: Vec::new(),
            sender: None,
        }
    }

    pub fn state(&self) -> UploadPackState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == UploadPackState::Done
    }

    /// Advance the session by one client request.
    ///
    /// A request rejected with [`SyncError::UnrecognizedWants`] leaves the
    /// session where it was.
    pub fn step(&mut self, req: UploadPackRequest) -> SyncResult<UploadPackReply> {
        match self.state {
            UploadPackState::Greet => self.greet(req),
            UploadPackState::Negotiate => self.negotiate(req),
            UploadPackState::NegotiateTables => self.negotiate_tables(req),
            UploadPackState::SendPackfile => self.send_packfile(),
            UploadPackState::Done => Err(SyncError::protocol("upload-pack session is finished")),
        }
    }

    fn greet(&mut self, req: UploadPackRequest) -> SyncResult<UploadPackReply> {
        if req.wants.is_empty() {
            return Err(SyncError::protocol("first upload-pack request has no wants"));
        }
        let tips = self.refs.list_all_refs()?.into_values();
        let mut finder = ClosedSetsFinder::new(self.db.clone(), tips)?
            .with_depth(req.depth)
            .with_max_rounds(self.options.max_negotiation_rounds);
        let acks = finder.process(&req.wants, &req.haves, req.done)?;
        info!(wants = req.wants.len(), depth = req.depth, "upload-pack session started");
        self.finder = Some(finder);
        self.after_round(acks)
    }

    fn negotiate(&mut self, req: UploadPackRequest) -> SyncResult<UploadPackReply> {
        let acks = self
            .finder_mut()?
            .process(&req.wants, &req.haves, req.done)?;
        self.after_round(acks)
    }

    fn after_round(&mut self, acks: Vec<ObjectSum>) -> SyncResult<UploadPackReply> {
        let finder = self.finder_mut()?;
        if !finder.is_closed() {
            self.state = UploadPackState::Negotiate;
            return Ok(UploadPackReply::Negotiation(UploadPackResponse {
                acks,
                table_haves: Vec::new(),
            }));
        }
        self.table_candidates = finder.tables_to_send()?.into();
        self.advertise_tables(acks)
    }

    fn negotiate_tables(&mut self, req: UploadPackRequest) -> SyncResult<UploadPackReply> {
        let acked = req
            .table_acks
            .into_iter()
            .filter(|sum| self.advertised_tables.contains(sum));
        self.acked_tables.extend(acked);
        self.advertise_tables(Vec::new())
    }

    /// Offer the next batch of candidate tables, or start sending once
    /// every candidate has been offered.
    fn advertise_tables(&mut self, acks: Vec<ObjectSum>) -> SyncResult<UploadPackReply> {
        if self.table_candidates.is_empty() {
            return self.start_sending();
        }
        let n = self.options.table_haves_per_round.min(self.table_candidates.len());
        let table_haves: Vec<ObjectSum> = self.table_candidates.drain(..n).collect();
        self.advertised_tables.extend(table_haves.iter().copied());
        self.state = UploadPackState::NegotiateTables;
        debug!(tables = table_haves.len(), "advertising table haves");
        Ok(UploadPackReply::Negotiation(UploadPackResponse { acks, table_haves }))
    }

    fn start_sending(&mut self) -> SyncResult<UploadPackReply> {
        let max_packfile_size = self.options.max_packfile_size;
        let finder = self.finder_mut()?;
        let commits = finder.commits_to_send()?;
        let tables = finder.tables_to_send()?;
        let commons = finder.common_commits();
        let mut sender =
            ObjectSender::new(self.db.clone(), commits, tables, &commons, max_packfile_size)?;
        sender.add_common_tables(&self.acked_tables)?;
        self.sender = Some(sender);
        self.finder = None;
        self.send_packfile()
    }

    fn send_packfile(&mut self) -> SyncResult<UploadPackReply> {
        let sender = self
            .sender
            .as_mut()
            .ok_or_else(|| SyncError::protocol("no objects to send"))?;
        let (bytes, done) = sender.write_packfile()?;
        if done {
            info!(objects = sender.objects_sent(), "upload-pack session finished");
            self.state = UploadPackState::Done;
            self.sender = None;
        } else {
            self.state = UploadPackState::SendPackfile;
        }
        Ok(UploadPackReply::Packfile(bytes))
    }

    fn finder_mut(&mut self) -> SyncResult<&mut ClosedSetsFinder> {
        self.finder
            .as_mut()
            .ok_or_else(|| SyncError::protocol("negotiation has not started"))
    }
}
