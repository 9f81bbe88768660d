use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use pagebridge::bridge::stdio::{writer_loop, StdioChannel};
use pagebridge::bridge::BridgeSession;
use pagebridge::config::BridgeConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const TIMER_TICK: Duration = Duration::from_millis(10);
const WRITER_GRACE: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    let page_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: pagebridge <page.html>")?;

    // stdout carries the wire protocol
    let subscriber_result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
    if subscriber_result.is_err() {
        // tracing was already initialised; continue silently
    }

    let config = BridgeConfig::load(BridgeConfig::default_path()).unwrap_or_else(|err| {
        warn!(error = %err, "failed to load bridge configuration, using defaults");
        BridgeConfig::default()
    });
    let html = fs::read_to_string(&page_path)
        .with_context(|| format!("failed to read page {}", page_path.display()))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let result = runtime.block_on(run(html, config));
    // a pending stdin read cannot be cancelled
    runtime.shutdown_background();
    result
}

async fn run(html: String, config: BridgeConfig) -> Result<()> {
    let (channel, outbound) = StdioChannel::new(config.session_id());
    info!(session = %channel.session_id(), "starting bridge");
    let writer = tokio::spawn(writer_loop(outbound, tokio::io::stdout()));

    let session = BridgeSession::new(&html, Rc::new(channel.clone()), &config)
        .context("failed to create bridge session")?;
    if let Err(err) = session.connect() {
        error!(error = %err, "bridge connection failed");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tick = tokio::time::interval(TIMER_TICK);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => channel.handle_line(&line),
                Ok(None) => {
                    debug!("stdin closed");
                    break;
                }
                Err(err) => {
                    error!(error = %err, "failed to read from stdin");
                    break;
                }
            },
            _ = tick.tick() => {
                session.settle();
            }
            _ = &mut shutdown => {
                info!("interrupted");
                break;
            }
        }
    }

    if let Some(path) = &config.snapshot_path {
        fs::write(path, session.document_html())
            .with_context(|| format!("failed to write snapshot to {}", path.display()))?;
        info!(path = %path.display(), "wrote document snapshot");
    }

    drop(session);
    channel.shutdown();
    match tokio::time::timeout(WRITER_GRACE, writer).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => warn!(error = %err, "stdout writer failed"),
        Ok(Err(err)) => warn!(error = %err, "stdout writer task failed"),
        Err(_) => warn!("stdout writer did not finish in time"),
    }
    Ok(())
}
