use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;
use wrgl_objects::ObjectStore;
use wrgl_protocol::{ReceivePackBody, ReceivePackResponse, UploadPackReply, UploadPackRequest};
use wrgl_refs::RefStore;
use wrgl_types::ObjectSum;

use crate::error::{SyncError, SyncResult};
use crate::receive_pack::ReceivePackSession;
use crate::sender::pack_tables;
use crate::types::SessionOptions;
use crate::upload_pack::UploadPackSession;

/// Transport interface for remote wrgl repositories.
///
/// Each call is one request/response exchange. The remote keeps session
/// state between calls of the same fetch or push.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn get_refs(&self) -> SyncResult<BTreeMap<String, ObjectSum>>;
    async fn upload_pack(&self, req: UploadPackRequest) -> SyncResult<UploadPackReply>;
    async fn receive_pack(&self, body: ReceivePackBody) -> SyncResult<ReceivePackResponse>;
    /// Packfile holding the given tables and their blocks.
    async fn get_objects(&self, tables: Vec<ObjectSum>) -> SyncResult<Vec<u8>>;
}

/// Talks to a repository in the same process, one session at a time.
///
/// A request carrying wants or ref updates opens a new session, replacing
/// any session an earlier aborted exchange left behind.
pub struct LocalTransport {
    db: Arc<dyn ObjectStore>,
    refs: Arc<dyn RefStore>,
    options: SessionOptions,
    upload: Mutex<Option<UploadPackSession>>,
    receive: Mutex<Option<ReceivePackSession>>,
}

impl LocalTransport {
    pub fn new(db: Arc<dyn ObjectStore>, refs: Arc<dyn RefStore>, options: SessionOptions) -> Self {
        Self {
            db,
            refs,
            options,
            upload: Mutex::new(None),
            receive: Mutex::new(None),
        }
    }
}

/// Keep a session only while it can take another request.
fn retain<S, T>(slot: &mut Option<S>, done: bool, result: &SyncResult<T>) {
    let keep = match result {
        Ok(_) => !done,
        Err(e) => e.keeps_session(),
    };
    if !keep {
        debug!("dropping session");
        *slot = None;
    }
}

#[async_trait]
impl RemoteTransport for LocalTransport {
    async fn get_refs(&self) -> SyncResult<BTreeMap<String, ObjectSum>> {
        Ok(self.refs.list_all_refs()?)
    }

    async fn upload_pack(&self, req: UploadPackRequest) -> SyncResult<UploadPackReply> {
        let mut slot = self.upload.lock().expect("lock poisoned");
        if !req.wants.is_empty() {
            *slot = None;
        }
        let session = slot.get_or_insert_with(|| {
            UploadPackSession::new(self.db.clone(), self.refs.clone(), self.options.clone())
        });
        let result = session.step(req);
        let done = session.is_done();
        retain(&mut *slot, done, &result);
        result
    }

    async fn receive_pack(&self, body: ReceivePackBody) -> SyncResult<ReceivePackResponse> {
        let mut slot = self.receive.lock().expect("lock poisoned");
        if matches!(&body, ReceivePackBody::Negotiation(req) if !req.updates.is_empty()) {
            *slot = None;
        }
        let session = slot.get_or_insert_with(|| {
            ReceivePackSession::new(self.db.clone(), self.refs.clone(), self.options.clone())
        });
        let result = session.step(body);
        let done = session.is_done();
        retain(&mut *slot, done, &result);
        result
    }

    async fn get_objects(&self, tables: Vec<ObjectSum>) -> SyncResult<Vec<u8>> {
        if tables.is_empty() {
            return Err(SyncError::protocol("no tables requested"));
        }
        pack_tables(self.db.clone(), &tables)
    }
}
