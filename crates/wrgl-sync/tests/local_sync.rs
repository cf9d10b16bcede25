//! Fetch and push between two in-memory repositories over `LocalTransport`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use wrgl_objects::{build_table, Commit, InMemoryObjectStore, ObjectKind, ObjectStore};
use wrgl_refs::{InMemoryRefStore, RefStore};
use wrgl_sync::{
    fetch, fetch_tables, push, FetchOptions, LocalTransport, PushOptions, RemoteTransport,
    SessionOptions, SyncError,
};
use wrgl_types::ObjectSum;

static CLOCK: AtomicI64 = AtomicI64::new(1_700_000_000);

struct Repo {
    db: Arc<InMemoryObjectStore>,
    refs: Arc<InMemoryRefStore>,
}

impl Repo {
    fn new() -> Self {
        Self {
            db: Arc::new(InMemoryObjectStore::new()),
            refs: Arc::new(InMemoryRefStore::new()),
        }
    }

    fn commit(&self, parents: &[ObjectSum]) -> ObjectSum {
        let ts = CLOCK.fetch_add(1, Ordering::SeqCst);
        let rows = (0..4)
            .map(|i| vec![format!("{ts}-{i}"), format!("{}", i * 10)])
            .collect();
        let table = build_table(
            self.db.as_ref(),
            vec!["id".into(), "n".into()],
            vec![0],
            rows,
        )
        .unwrap();
        self.db
            .save_commit(&Commit {
                table,
                parents: parents.to_vec(),
                author_name: "Jane Roe".into(),
                author_email: "jane@example.com".into(),
                time: Utc.timestamp_opt(ts, 0).unwrap(),
                message: format!("commit {ts}"),
            })
            .unwrap()
    }

    fn chain(&self, from: Option<ObjectSum>, n: usize) -> Vec<ObjectSum> {
        let mut sums = Vec::new();
        let mut parent = from;
        for _ in 0..n {
            let sum = self.commit(&parent.into_iter().collect::<Vec<_>>());
            sums.push(sum);
            parent = Some(sum);
        }
        sums
    }

    fn set_head(&self, branch: &str, sum: ObjectSum) {
        self.refs
            .commit_head(branch, sum, "Jane Roe", "jane@example.com", "commit")
            .unwrap();
    }

    fn table_of(&self, commit: &ObjectSum) -> ObjectSum {
        self.db.get_commit(commit).unwrap().table
    }

    fn transport(&self, options: SessionOptions) -> LocalTransport {
        LocalTransport::new(self.db.clone(), self.refs.clone(), options)
    }
}

#[tokio::test]
async fn fetch_then_fetch_again() {
    let remote = Repo::new();
    let main = remote.chain(None, 3);
    let dev = remote.chain(Some(main[1]), 2);
    remote.set_head("main", main[2]);
    remote.set_head("dev", dev[1]);

    let local = Repo::new();
    let transport = remote.transport(SessionOptions::default());
    let result = fetch(
        &transport,
        local.db.clone(),
        local.refs.clone(),
        "origin",
        &FetchOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(result.received.commits, 5);
    assert_eq!(result.refs_updated.len(), 2);
    assert_eq!(
        local.refs.get_ref("remotes/origin/main").unwrap(),
        Some(main[2])
    );
    assert_eq!(local.refs.get_ref("remotes/origin/dev").unwrap(), Some(dev[1]));
    let log = local.refs.logs("remotes/origin/dev").unwrap();
    assert_eq!(log.last().unwrap().action, "fetch");

    let more = remote.chain(Some(main[2]), 2);
    remote.set_head("main", more[1]);
    let result = fetch(
        &transport,
        local.db.clone(),
        local.refs.clone(),
        "origin",
        &FetchOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(result.received.commits, 2);
    assert_eq!(result.received.tables, 2);
    assert_eq!(
        result.refs_updated.keys().collect::<Vec<_>>(),
        vec!["remotes/origin/main"]
    );
}

#[tokio::test]
async fn fetch_with_nothing_new_sends_no_requests() {
    let remote = Repo::new();
    let c = remote.chain(None, 2);
    remote.set_head("main", c[1]);
    let local = Repo::new();
    let transport = remote.transport(SessionOptions::default());
    let opts = FetchOptions::default();
    fetch(&transport, local.db.clone(), local.refs.clone(), "origin", &opts)
        .await
        .unwrap();
    let result = fetch(&transport, local.db.clone(), local.refs.clone(), "origin", &opts)
        .await
        .unwrap();
    assert_eq!(result.received.commits, 0);
    assert!(result.refs_updated.is_empty());
}

#[tokio::test]
async fn shallow_fetch_then_fill_tables() {
    let remote = Repo::new();
    let c = remote.chain(None, 4);
    remote.set_head("main", c[3]);

    let local = Repo::new();
    let transport = remote.transport(SessionOptions::default());
    let options = FetchOptions {
        depth: 1,
        ..Default::default()
    };
    let result = fetch(
        &transport,
        local.db.clone(),
        local.refs.clone(),
        "origin",
        &options,
    )
    .await
    .unwrap();
    assert_eq!(result.received.commits, 4);
    assert_eq!(result.received.tables, 1);
    assert_eq!(local.db.count(ObjectKind::Table), 1);

    let withheld: Vec<ObjectSum> = c[..3].iter().map(|s| remote.table_of(s)).collect();
    let stats = fetch_tables(&transport, local.db.clone(), &withheld)
        .await
        .unwrap();
    assert_eq!(stats.tables, 3);
    for table in &withheld {
        assert!(local.db.table_exists(table).unwrap());
    }
}

#[tokio::test]
async fn unknown_tables_are_a_client_error() {
    let remote = Repo::new();
    let transport = remote.transport(SessionOptions::default());
    let local = Repo::new();
    let err = fetch_tables(&transport, local.db.clone(), &[ObjectSum::digest(b"nope")])
        .await
        .unwrap_err();
    assert!(err.is_client_error());
}

#[tokio::test]
async fn push_isolates_stale_ref() {
    let local = Repo::new();
    let base = local.chain(None, 2);
    local.set_head("main", base[1]);

    let remote = Repo::new();
    let transport = remote.transport(SessionOptions::default());
    let updates = |sum: ObjectSum| {
        ["heads/a", "heads/b", "heads/c"]
            .iter()
            .map(|n| (n.to_string(), Some(sum)))
            .collect::<Vec<_>>()
    };
    let result = push(
        &transport,
        local.db.clone(),
        updates(base[1]),
        &PushOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(result.refs_updated.len(), 3);
    assert!(result.rejected.is_empty());

    // heads/b moves between the ref advertisement and the push.
    let next = local.chain(Some(base[1]), 1)[0];
    let other = remote.commit(&[]);
    let stale = StaleRefs {
        inner: &transport,
        refs: remote.refs.clone(),
        name: "heads/b",
        sum: other,
    };
    let result = push(&stale, local.db.clone(), updates(next), &PushOptions::default())
        .await
        .unwrap();

    assert_eq!(result.refs_updated, vec!["heads/a", "heads/c"]);
    assert_eq!(
        result.rejected["heads/b"],
        "remote ref updated since checkout"
    );
    assert_eq!(remote.refs.get_ref("heads/a").unwrap(), Some(next));
    assert_eq!(remote.refs.get_ref("heads/b").unwrap(), Some(other));
    assert_eq!(remote.refs.logs("heads/c").unwrap().len(), 2);
}

#[tokio::test]
async fn push_of_shallow_history_changes_no_refs() {
    let remote = Repo::new();
    let c = remote.chain(None, 3);
    remote.set_head("main", c[2]);

    let local = Repo::new();
    let transport = remote.transport(SessionOptions::default());
    fetch(
        &transport,
        local.db.clone(),
        local.refs.clone(),
        "origin",
        &FetchOptions {
            depth: 1,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let tip = local.chain(Some(c[2]), 1)[0];

    let elsewhere = Repo::new();
    let target = elsewhere.transport(SessionOptions::default());
    let err = push(
        &target,
        local.db.clone(),
        vec![("heads/main".into(), Some(tip))],
        &PushOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SyncError::ShallowCommit(ref s) if s.contains(&c[0])));
    assert!(elsewhere.refs.list_all_refs().unwrap().is_empty());

    // The origin still has the withheld tables.
    let ok = push(
        &transport,
        local.db.clone(),
        vec![("heads/main".into(), Some(tip))],
        &PushOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(ok.refs_updated, vec!["heads/main"]);
    assert_eq!(ok.objects_sent, 3);
}

#[tokio::test]
async fn push_delete_respects_server_config() {
    let local = Repo::new();
    let c = local.chain(None, 1);
    let remote = Repo::new();
    let options = SessionOptions {
        deny_deletes: true,
        ..Default::default()
    };
    let transport = remote.transport(options);
    push(
        &transport,
        local.db.clone(),
        vec![("heads/main".into(), Some(c[0]))],
        &PushOptions::default(),
    )
    .await
    .unwrap();

    let result = push(
        &transport,
        local.db.clone(),
        vec![("heads/main".into(), None)],
        &PushOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(
        result.rejected["heads/main"],
        "remote does not support deleting refs"
    );
    assert_eq!(remote.refs.get_head("main").unwrap(), Some(c[0]));
}

/// Moves one remote ref right after the ref advertisement is served.
struct StaleRefs<'a> {
    inner: &'a LocalTransport,
    refs: Arc<InMemoryRefStore>,
    name: &'static str,
    sum: ObjectSum,
}

#[async_trait::async_trait]
impl RemoteTransport for StaleRefs<'_> {
    async fn get_refs(
        &self,
    ) -> Result<std::collections::BTreeMap<String, ObjectSum>, SyncError> {
        let refs = self.inner.get_refs().await?;
        let change = wrgl_refs::RefChange::new("commit", "concurrent update");
        self.refs.save_ref(self.name, self.sum, change)?;
        Ok(refs)
    }

    async fn upload_pack(
        &self,
        req: wrgl_protocol::UploadPackRequest,
    ) -> Result<wrgl_protocol::UploadPackReply, SyncError> {
        self.inner.upload_pack(req).await
    }

    async fn receive_pack(
        &self,
        body: wrgl_protocol::ReceivePackBody,
    ) -> Result<wrgl_protocol::ReceivePackResponse, SyncError> {
        self.inner.receive_pack(body).await
    }

    async fn get_objects(&self, tables: Vec<ObjectSum>) -> Result<Vec<u8>, SyncError> {
        self.inner.get_objects(tables).await
    }
}
