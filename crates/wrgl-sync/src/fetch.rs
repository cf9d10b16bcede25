use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};
use wrgl_objects::ObjectStore;
use wrgl_refs::names::HEADS_PREFIX;
use wrgl_refs::{remote_ref, RefStore};
use wrgl_types::ObjectSum;

use crate::error::{SyncError, SyncResult};
use crate::receiver::ObjectReceiver;
use crate::transport::RemoteTransport;
use crate::types::{FetchOptions, FetchResult, ReceiveStats};
use crate::upload_pack::UploadPackClient;

/// Fetch `wants` and everything they need, offering the history of `tips`
/// as haves.
pub async fn fetch_objects(
    transport: &dyn RemoteTransport,
    db: Arc<dyn ObjectStore>,
    tips: impl IntoIterator<Item = ObjectSum>,
    wants: impl IntoIterator<Item = ObjectSum>,
    options: &FetchOptions,
) -> SyncResult<ReceiveStats> {
    let mut client = UploadPackClient::new(db, tips, wants, options)?;
    let mut next = client.start()?;
    while let Some(req) = next {
        let reply = transport.upload_pack(req).await?;
        next = client.step(reply)?;
    }
    Ok(client.stats())
}

/// Fetch every branch of a remote and record the branch tips under
/// `remotes/<remote>/`.
pub async fn fetch(
    transport: &dyn RemoteTransport,
    db: Arc<dyn ObjectStore>,
    refs: Arc<dyn RefStore>,
    remote: &str,
    options: &FetchOptions,
) -> SyncResult<FetchResult> {
    let remote_refs = transport.get_refs().await?;
    let heads: BTreeMap<&str, ObjectSum> = remote_refs
        .iter()
        .filter_map(|(name, sum)| Some((name.strip_prefix(HEADS_PREFIX)?, *sum)))
        .collect();
    debug!(remote, heads = heads.len(), "fetched ref advertisement");

    let tips: Vec<ObjectSum> = refs.list_all_refs()?.into_values().collect();
    let received = fetch_objects(
        transport,
        db,
        tips,
        heads.values().copied(),
        options,
    )
    .await?;

    let refs_updated = save_fetched_refs(refs.as_ref(), remote, &heads)?;
    info!(
        remote,
        commits = received.commits,
        refs = refs_updated.len(),
        "fetch finished"
    );
    Ok(FetchResult {
        received,
        refs_updated,
    })
}

/// Point `remotes/<remote>/<branch>` at each fetched branch tip. Returns the
/// refs that moved.
pub fn save_fetched_refs(
    refs: &dyn RefStore,
    remote: &str,
    heads: &BTreeMap<&str, ObjectSum>,
) -> SyncResult<BTreeMap<String, ObjectSum>> {
    let mut updated = BTreeMap::new();
    for (branch, sum) in heads {
        let name = remote_ref(remote, branch);
        if refs.get_ref(&name)? != Some(*sum) {
            refs.save_fetched_ref(remote, branch, *sum)?;
            updated.insert(name, *sum);
        }
    }
    Ok(updated)
}

/// Fill in tables withheld by a shallow fetch.
pub async fn fetch_tables(
    transport: &dyn RemoteTransport,
    db: Arc<dyn ObjectStore>,
    tables: &[ObjectSum],
) -> SyncResult<ReceiveStats> {
    let mut missing = Vec::new();
    for sum in tables {
        if !db.table_exists(sum)? && !missing.contains(sum) {
            missing.push(*sum);
        }
    }
    if missing.is_empty() {
        return Ok(ReceiveStats::default());
    }
    let packfile = transport.get_objects(missing.clone()).await?;
    let mut receiver = ObjectReceiver::new(db.clone(), Vec::new());
    receiver.receive(packfile.as_slice())?;
    for sum in &missing {
        if !db.table_exists(sum)? {
            return Err(SyncError::protocol(format!(
                "remote did not send table {}",
                sum.short_hex()
            )));
        }
    }
    info!(tables = missing.len(), "filled in shallow tables");
    Ok(receiver.stats())
}
