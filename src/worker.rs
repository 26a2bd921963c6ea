//! The worker shell: reads requests from the upstream connection, runs them through the
//! pipeline and writes the replies to the loopback connection.

pub mod endpoint;
pub mod transport;

use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use http::Version;
use log::{info, warn};

use crate::engine::PipelineHandle;
use crate::errors::WorkerError;
use crate::message::{parse_raw_request, WorkerReply};

pub use endpoint::Endpoint;

pub struct Worker {
    upstream: Endpoint,
    loopback: Endpoint,
    pipeline: PipelineHandle,
}

impl Worker {
    pub fn new(upstream: Endpoint, loopback: Endpoint, pipeline: PipelineHandle) -> Self {
        Self { upstream, loopback, pipeline }
    }

    /// Connects both endpoints and serves until upstream closes or the process is interrupted.
    ///
    /// Ctrl-C returns immediately; a request in flight is abandoned.
    pub async fn run(self) -> Result<(), WorkerError> {
        let mut upstream = transport::connect(&self.upstream).await?;
        let mut loopback = transport::connect(&self.loopback).await?;
        info!("worker serving {} -> {}", self.upstream, self.loopback);

        tokio::select! {
            res = serve(&self.pipeline, &mut upstream, &mut loopback) => res,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                Ok(())
            }
        }
    }
}

/// Answers every frame from `upstream` with a heart-beat frame and a response frame on
/// `loopback`. Returns when `upstream` ends.
pub async fn serve<U, L>(pipeline: &PipelineHandle, upstream: &mut U, loopback: &mut L) -> Result<(), WorkerError>
where
    U: Stream<Item = Result<bytes::BytesMut, std::io::Error>> + Unpin,
    L: Sink<Bytes, Error = std::io::Error> + Unpin,
{
    while let Some(frame) = upstream.next().await {
        let frame = frame?;
        let reply = dispatch(pipeline, &frame).await?;
        for frame in frames_within(reply, transport::MAX_FRAME_LEN) {
            loopback.feed(frame).await?;
        }
        loopback.flush().await?;
    }

    info!("upstream closed");
    Ok(())
}

/// Runs one raw request through the pipeline. Frames that are not HTTP get a `400`.
pub async fn dispatch(pipeline: &PipelineHandle, raw: &[u8]) -> Result<WorkerReply, WorkerError> {
    match parse_raw_request(raw) {
        Ok(request) => pipeline.render(request).await,
        Err(e) => {
            warn!("dropping malformed frame of {} bytes: {e}", raw.len());
            Ok(WorkerReply::bad_request(Version::HTTP_11, e.to_string()))
        }
    }
}

/// Serializes `reply`, swapping a response too large for one frame for a `400` that keeps the
/// heart-beat.
fn frames_within(reply: WorkerReply, max_len: usize) -> [Bytes; 2] {
    let version = reply.response.version();
    let heart_beat = reply.heart_beat.clone();
    let frames = reply.into_frames();
    if frames[1].len() <= max_len {
        return frames;
    }

    warn!("response of {} bytes exceeds the {max_len} byte frame limit", frames[1].len());
    let mut fallback = WorkerReply::bad_request(
        version,
        format!("image too large to send: {} bytes, limit is {max_len}", frames[1].len()),
    );
    fallback.heart_beat = heart_beat;
    fallback.into_frames()
}
