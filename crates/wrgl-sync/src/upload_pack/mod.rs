//! Fetch: the client offers haves until the server has found the closed set
//! of objects to send, then receives them as packfiles.

mod client;
mod server;

pub use client::UploadPackClient;
pub use server::{UploadPackSession, UploadPackState};
