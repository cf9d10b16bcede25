use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};
use wrgl_objects::ObjectStore;
use wrgl_protocol::Update;
use wrgl_types::ObjectSum;

use crate::error::SyncResult;
use crate::receive_pack::{PushStep, ReceivePackClient};
use crate::transport::RemoteTransport;
use crate::types::{PushOptions, PushResult};

/// Point remote refs at local commits, or delete them when the new sum is
/// `None`. Old sums are taken from the remote's current advertisement.
///
/// Refs the remote refuses are reported in [`PushResult::rejected`]; the
/// others are still applied.
pub async fn push(
    transport: &dyn RemoteTransport,
    db: Arc<dyn ObjectStore>,
    updates: Vec<(String, Option<ObjectSum>)>,
    options: &PushOptions,
) -> SyncResult<PushResult> {
    let remote_refs = transport.get_refs().await?;
    let updates: BTreeMap<String, Update> = updates
        .into_iter()
        .filter_map(|(name, sum)| {
            let old = remote_refs.get(&name).copied();
            (old != sum).then(|| (name, Update::new(old, sum)))
        })
        .collect();
    if updates.is_empty() {
        info!("remote is up to date");
        return Ok(PushResult::default());
    }

    let mut client = ReceivePackClient::new(db, &remote_refs, updates, options)?;
    let mut body = client.start();
    let report = loop {
        let resp = transport.receive_pack(body).await?;
        match client.step(resp)? {
            PushStep::Send(next) => body = next,
            PushStep::Finished(report) => break report,
        }
    };

    let mut result = PushResult {
        objects_sent: client.objects_sent(),
        ..Default::default()
    };
    for (name, update) in report {
        match update.err_msg {
            Some(reason) => {
                warn!(ref_name = %name, %reason, "remote rejected ref update");
                result.rejected.insert(name, reason);
            }
            None => result.refs_updated.push(name),
        }
    }
    info!(
        objects = result.objects_sent,
        updated = result.refs_updated.len(),
        rejected = result.rejected.len(),
        "push finished"
    );
    Ok(result)
}
