use std::thread::JoinHandle;

use log::{debug, error, info};
use tokio::sync::{mpsc, oneshot};

use crate::config::WorkerConfig;
use crate::engine::events::PipelineCommand;
use crate::engine::pipeline::RenderPipeline;
use crate::errors::WorkerError;
use crate::message::WorkerReply;
use crate::render::backend::{GlContext, MapEngine};

/// Async front of the pipeline thread.
///
/// The engine and GL context are created on, and never leave, a dedicated OS thread. Requests
/// reach it through a bounded channel with a single consumer, so they are handled strictly one
/// after the other.
pub struct PipelineHandle {
    cmd_tx: mpsc::Sender<PipelineCommand>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for PipelineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineHandle")
            .field("cmd_tx", &self.cmd_tx)
            .field("running", &self.thread.is_some())
            .finish()
    }
}

impl PipelineHandle {
    /// Starts the pipeline thread and waits until it is ready to take requests.
    ///
    /// `factory` runs on the new thread and builds the engine and GL context there.
    pub async fn spawn<F, E, G>(config: WorkerConfig, factory: F) -> Result<Self, WorkerError>
    where
        F: FnOnce(&WorkerConfig) -> anyhow::Result<(E, G)> + Send + 'static,
        E: MapEngine + 'static,
        G: GlContext + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_capacity);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), WorkerError>>();

        let thread = std::thread::Builder::new()
            .name("render-pipeline".into())
            .spawn(move || {
                let pipeline = factory(&config)
                    .map_err(|e| WorkerError::ContextInit(format!("{e:#}")))
                    .and_then(|(engine, gl)| RenderPipeline::new(config, engine, gl));

                match pipeline {
                    Ok(pipeline) => {
                        let _ = ready_tx.send(Ok(()));
                        run(pipeline, cmd_rx);
                    }
                    Err(e) => {
                        error!("render pipeline failed to start: {e}");
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| WorkerError::ContextInit(format!("could not start pipeline thread: {e}")))?;

        let handle = Self { cmd_tx, thread: Some(thread) };
        ready_rx.await.map_err(|_| WorkerError::PipelineGone)??;
        Ok(handle)
    }

    /// Queues `request` behind any in-flight one and waits for its reply.
    pub async fn render(&self, request: http::Request<Vec<u8>>) -> Result<WorkerReply, WorkerError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(PipelineCommand::Render { request, reply: tx })
            .await
            .map_err(|_| WorkerError::PipelineGone)?;

        rx.await.map_err(|_| WorkerError::PipelineGone)
    }

    /// Stops taking requests and waits for the pipeline thread to finish the current one.
    pub fn shutdown(mut self) {
        let thread = self.thread.take();
        drop(self);
        if let Some(thread) = thread {
            if thread.join().is_err() {
                error!("render pipeline thread panicked");
            }
        }
    }
}

fn run<E: MapEngine, G: GlContext>(mut pipeline: RenderPipeline<E, G>, mut cmd_rx: mpsc::Receiver<PipelineCommand>) {
    while let Some(cmd) = cmd_rx.blocking_recv() {
        match cmd {
            PipelineCommand::Render { request, reply } => {
                let response = pipeline.handle(&request);
                if reply.send(response).is_err() {
                    debug!("requester went away before the reply was ready");
                }
            }
        }
    }
    info!("render pipeline stopped");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::anyhow;
    use http::StatusCode;

    use super::*;
    use crate::render::backends::null::HeadlessContext;
    use crate::testing::{take_calls, Call, CallLog, RecordingContext, RecordingEngine};

    fn config(dir: &tempfile::TempDir) -> WorkerConfig {
        WorkerConfig::builder().cache_dir(dir.path()).channel_capacity(4).build().unwrap()
    }

    #[tokio::test]
    async fn factory_failure_is_reported_from_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let res = PipelineHandle::spawn(config(&dir), |_| {
            Err::<(RecordingEngine, HeadlessContext), _>(anyhow!("no display"))
        })
        .await;

        match res {
            Err(WorkerError::ContextInit(msg)) => assert!(msg.contains("no display")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn health_check_round_trips_through_the_thread() {
        let dir = tempfile::tempdir().unwrap();
        let log = CallLog::default();
        let factory_log = log.clone();
        let handle = PipelineHandle::spawn(config(&dir), move |_| {
            Ok((RecordingEngine::new(factory_log.clone()), RecordingContext::new(factory_log)))
        })
        .await
        .unwrap();

        let req = http::Request::builder().uri("/check").body(Vec::new()).unwrap();
        let reply = handle.render(req).await.unwrap();
        assert_eq!(reply.status(), StatusCode::OK);
        handle.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let log = CallLog::default();
        let factory_log = log.clone();
        let handle = PipelineHandle::spawn(config(&dir), move |_| {
            let mut engine = RecordingEngine::new(factory_log.clone());
            engine.update_delay = Duration::from_millis(2);
            Ok((engine, RecordingContext::new(factory_log)))
        })
        .await
        .unwrap();
        take_calls(&log);

        let handle = std::sync::Arc::new(handle);
        let mut tasks = Vec::new();
        for zoom in 1..=8 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                let uri = format!("/?scene=s{zoom}&width=64&height=64&lat=1&lon=1&zoom={zoom}");
                let req = http::Request::builder().uri(uri).body(Vec::new()).unwrap();
                handle.render(req).await.unwrap()
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().status(), StatusCode::OK);
        }

        // every request is one contiguous batch ending in its readback
        let calls = take_calls(&log);
        let batches: Vec<&[Call]> = calls.split_inclusive(|c| *c == Call::ReadPixels).collect();
        assert_eq!(batches.len(), 8);
        for batch in batches {
            let loads = batch.iter().filter(|c| matches!(c, Call::LoadScene(_))).count();
            let zooms = batch.iter().filter(|c| matches!(c, Call::SetZoom(_))).count();
            let renders = batch.iter().filter(|c| **c == Call::Render).count();
            assert_eq!((loads, zooms, renders), (1, 1, 1), "interleaved batch: {batch:?}");
            assert_eq!(batch.last(), Some(&Call::ReadPixels));
        }
    }
}
