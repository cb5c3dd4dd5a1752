//! Tutor service API: wire types, async client, and the request worker

pub mod client;
pub mod types;
pub mod worker;

pub use client::ApiClient;
pub use types::*;
pub use worker::{ApiCall, ApiHandle, ApiReply, ApiRequest, ApiResponse, ApiWorker, RequestId};
