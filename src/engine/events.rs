//! Commands sent from the worker shell to the pipeline thread.

use std::fmt::{Debug, Display};

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::message::WorkerReply;

/// Identifies one handled request in the logs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // the first group is plenty to tell requests apart in a log
        let id = self.0.simple().to_string();
        write!(f, "{}", &id[..8])
    }
}

/// Commands handled by the pipeline thread, one at a time.
pub enum PipelineCommand {
    /// Render (or health-check) one parsed HTTP request
    Render {
        request: http::Request<Vec<u8>>,
        reply: oneshot::Sender<WorkerReply>,
    },
}

impl Debug for PipelineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineCommand::Render { request, .. } => f
                .debug_struct("Render")
                .field("method", request.method())
                .field("uri", request.uri())
                .field("body_len", &request.body().len())
                .finish(),
        }
    }
}
