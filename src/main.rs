use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::Parser;
use log::error;

use gosub_tiles::config::WorkerConfig;
use gosub_tiles::engine::PipelineHandle;
use gosub_tiles::errors::WorkerError;
use gosub_tiles::net::{UrlClient, UrlClientOptions};
use gosub_tiles::render::backends::null::{HeadlessContext, NullMapEngine};
use gosub_tiles::worker::{Endpoint, Worker};

/// Background the headless context clears to before each frame.
const CLEAR_COLOR: [u8; 4] = [0, 0, 0, 255];

#[derive(Parser, Debug)]
#[command(name = "tile-worker", version, about = "Renders map images for requests read from a transport endpoint")]
struct Args {
    /// Endpoint requests are read from (tcp://host:port or ipc:///path)
    upstream_endpoint: Endpoint,

    /// Endpoint replies are written to (tcp://host:port or ipc:///path)
    loopback_endpoint: Endpoint,

    /// Directory for scenes posted as request bodies
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Longest time, in seconds, a request waits for tiles before rendering
    #[arg(long)]
    pump_deadline_secs: Option<u64>,

    /// Threads fetching scenes and tiles
    #[arg(long)]
    url_client_threads: Option<usize>,
}

fn init_logging() {
    let mut builder = env_logger::Builder::new();
    match std::env::var("RUST_LOG") {
        Ok(filter) => builder.parse_filters(&filter),
        Err(_) => builder.filter_level(log::LevelFilter::Info),
    };
    builder.init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    init_logging();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), WorkerError> {
    let config = WorkerConfig::builder()
        .with(|c| {
            if let Some(dir) = args.cache_dir {
                c.cache_dir = dir;
            }
            if let Some(secs) = args.pump_deadline_secs {
                c.pump_deadline = Duration::from_secs(secs);
            }
            if let Some(n) = args.url_client_threads {
                c.url_client_threads = n;
            }
        })
        .build()?;

    let pipeline = PipelineHandle::spawn(config, |config| {
        let client = UrlClient::new(UrlClientOptions {
            number_of_threads: config.url_client_threads,
            ..Default::default()
        })?;
        Ok((NullMapEngine::new(Some(client)), HeadlessContext::new(CLEAR_COLOR)))
    })
    .await?;

    Worker::new(args.upstream_endpoint, args.loopback_endpoint, pipeline).run().await
}
