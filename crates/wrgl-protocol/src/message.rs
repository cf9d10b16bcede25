use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use wrgl_types::ObjectSum;

fn is_zero(v: &u32) -> bool {
    *v == 0
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// One upload-pack round sent by the fetching client.
///
/// `wants` and `depth` are only meaningful on the first round. Later rounds
/// carry `haves` (and `done` once the client's history is exhausted), or
/// `tableACKs` in answer to the server's `tableHaves`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPackRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wants: Vec<ObjectSum>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub haves: Vec<ObjectSum>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub depth: u32,
    #[serde(default, skip_serializing_if = "is_false")]
    pub done: bool,
    #[serde(default, rename = "tableACKs", skip_serializing_if = "Vec::is_empty")]
    pub table_acks: Vec<ObjectSum>,
}

/// Negotiation answer from the upload-pack server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPackResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acks: Vec<ObjectSum>,
    #[serde(default, rename = "tableHaves", skip_serializing_if = "Vec::is_empty")]
    pub table_haves: Vec<ObjectSum>,
}

/// A ref update requested by a push, and its outcome in the final report.
///
/// `old_sum` is `None` when the ref is being created and `sum` is `None`
/// when it is being deleted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_sum: Option<ObjectSum>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<ObjectSum>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_msg: Option<String>,
}

impl Update {
    pub fn new(old_sum: Option<ObjectSum>, sum: Option<ObjectSum>) -> Self {
        Self {
            old_sum,
            sum,
            err_msg: None,
        }
    }

    pub fn is_delete(&self) -> bool {
        self.sum.is_none()
    }

    pub fn is_rejected(&self) -> bool {
        self.err_msg.is_some()
    }
}

/// One receive-pack round sent by the pushing client as JSON.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivePackRequest {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub updates: BTreeMap<String, Update>,
    #[serde(default, rename = "tableHaves", skip_serializing_if = "Vec::is_empty")]
    pub table_haves: Vec<ObjectSum>,
}

/// Answer from the receive-pack server.
///
/// The response carrying `updates` is the final report; every earlier one
/// carries only `tableACKs`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivePackResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updates: Option<BTreeMap<String, Update>>,
    #[serde(default, rename = "tableACKs", skip_serializing_if = "Vec::is_empty")]
    pub table_acks: Vec<ObjectSum>,
}

impl ReceivePackResponse {
    pub fn is_final(&self) -> bool {
        self.updates.is_some()
    }
}

/// Ref advertisement returned by `GET /refs/`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefsResponse {
    pub refs: BTreeMap<String, ObjectSum>,
}

/// Body of `POST /objects/`: tables to fill in after a shallow fetch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectsRequest {
    pub tables: Vec<ObjectSum>,
}

/// Body of every non-2xx response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// What the upload-pack server answers a round with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadPackReply {
    Negotiation(UploadPackResponse),
    /// Raw (uncompressed) packfile bytes.
    Packfile(Vec<u8>),
}

/// What a pushing client sends the receive-pack server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReceivePackBody {
    Negotiation(ReceivePackRequest),
    /// Raw (uncompressed) packfile bytes.
    Packfile(Vec<u8>),
}
