use std::sync::Arc;

use log::debug;
use tokio::runtime::Runtime;
use tokio::sync::Semaphore;

use crate::net::{fetch, Response};

const DEFAULT_USER_AGENT: &str = "GosubTileRenderer/0.1";

#[derive(Debug, Clone)]
pub struct UrlClientOptions {
    /// Worker threads servicing fetches; also the number of requests in flight at once
    pub number_of_threads: usize,
    pub user_agent: String,
}

impl Default for UrlClientOptions {
    fn default() -> Self {
        Self {
            number_of_threads: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// HTTP client with its own bounded pool of worker threads.
///
/// Completed fetches are delivered through a callback on one of the pool threads; the caller
/// decides how to queue them (the engine pushes them onto a channel drained by `update`).
pub struct UrlClient {
    runtime: Option<Runtime>,
    http: reqwest::Client,
    permits: Arc<Semaphore>,
}

impl UrlClient {
    pub fn new(options: UrlClientOptions) -> anyhow::Result<Self> {
        let threads = options.number_of_threads.max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(threads)
            .thread_name("url-client")
            .enable_all()
            .build()?;

        let http = {
            let _guard = runtime.enter();
            reqwest::Client::builder().user_agent(options.user_agent).build()?
        };

        Ok(Self {
            runtime: Some(runtime),
            http,
            permits: Arc::new(Semaphore::new(threads)),
        })
    }

    /// Fetches `url` in the background and hands the result to `on_done`.
    pub fn fetch_with<F>(&self, url: String, on_done: F)
    where
        F: FnOnce(Result<Response, reqwest::Error>) + Send + 'static,
    {
        let Some(runtime) = self.runtime.as_ref() else {
            return;
        };

        let http = self.http.clone();
        let permits = self.permits.clone();
        runtime.spawn(async move {
            // The semaphore is never closed, so acquiring only fails if it is dropped
            let _permit = permits.acquire_owned().await;
            debug!("fetching {url}");
            on_done(fetch(&http, &url).await);
        });
    }
}

impl Drop for UrlClient {
    fn drop(&mut self) {
        // A runtime may not be dropped from within async context; detach its threads instead
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve_once;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn fetch_with_delivers_body_to_callback() {
        let url = serve_once("200 OK", "sources: {}");
        let client = UrlClient::new(UrlClientOptions { number_of_threads: 2, ..Default::default() }).unwrap();

        let (tx, rx) = mpsc::channel();
        client.fetch_with(url, move |res| {
            let _ = tx.send(res.map(|r| (r.status, r.body)));
        });

        let (status, body) = rx.recv_timeout(Duration::from_secs(10)).unwrap().unwrap();
        assert_eq!(status, 200);
        assert_eq!(body, b"sources: {}");
    }

    #[test]
    fn error_status_carries_its_reason_phrase() {
        let url = serve_once("404 Not Found", "");
        let client = UrlClient::new(UrlClientOptions::default()).unwrap();

        let (tx, rx) = mpsc::channel();
        client.fetch_with(url, move |res| {
            let _ = tx.send(res.map(|r| (r.is_success(), r.status, r.status_text)));
        });

        let (ok, status, text) = rx.recv_timeout(Duration::from_secs(10)).unwrap().unwrap();
        assert!(!ok);
        assert_eq!(status, 404);
        assert_eq!(text, "Not Found");
    }

    #[test]
    fn zero_threads_is_bumped_to_one() {
        let client = UrlClient::new(UrlClientOptions { number_of_threads: 0, ..Default::default() }).unwrap();
        assert_eq!(client.permits.available_permits(), 1);
    }
}
