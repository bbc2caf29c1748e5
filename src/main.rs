//! # fenrelay
//!
//! Command-line relay. Reads observed positions from stdin, confirms them,
//! sends novel ones to the engine over WebSocket and prints every display
//! event as a JSON line on stdout.
//!
//! Input lines:
//!
//! ```text
//! <session> <fen...>     report a raw position for a session
//! :start <session>       session started
//! :end <session>         session ended
//! :restart <session>     detector restart (page reload)
//! :status <session>      print the session's status
//! ```

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use fenrelay_core::SessionId;
use fenrelay_detector::LatestValueObserver;
use fenrelay_link::{ConnectionManager, LinkConfig, WsConnector};
use fenrelay_relay::{ChannelSink, RelayConfig, RelayHandle, Router};
use fenrelay_settings::{load_settings_with, settings_path, RelaySettings};
use fenrelay_telemetry::{init_telemetry, parse_level, TelemetryConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

/// FEN position relay.
#[derive(Parser, Debug)]
#[command(name = "fenrelay", about = "Relay confirmed chess positions to an analysis engine")]
struct Cli {
    /// Engine WebSocket URL (overrides settings).
    #[arg(long)]
    url: Option<String>,

    /// Search depth, 1-30 (overrides settings).
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=30))]
    depth: Option<u32>,

    /// Settings file. Defaults to `~/.fenrelay/settings.json`.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log as JSON lines on stderr.
    #[arg(long)]
    json_logs: bool,

    /// Confirm the current position as soon as a session starts.
    #[arg(long)]
    prime: bool,

    /// Keep running this long after stdin closes so pending rounds and
    /// replies can finish.
    #[arg(long, default_value = "2000")]
    linger_ms: u64,
}

impl Cli {
    fn settings(&self) -> Result<RelaySettings> {
        self.settings_with_env(|name| std::env::var(name).ok())
    }

    /// Settings file, then `FENRELAY_*` variables from `env`, then flags.
    fn settings_with_env<F>(&self, env: F) -> Result<RelaySettings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = self.settings.clone().unwrap_or_else(settings_path);
        let mut settings = load_settings_with(&path, env)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;

        if let Some(url) = &self.url {
            settings.engine.url.clone_from(url);
        }
        if let Some(depth) = self.depth {
            settings.engine.search_depth = depth;
        }
        if self.json_logs {
            settings.logging.json = true;
        }
        if self.prime {
            settings.stability.prime_on_start = true;
        }
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Blank,
    Report { session: &'a str, fen: &'a str },
    Start(&'a str),
    End(&'a str),
    Restart(&'a str),
    Status(&'a str),
}

fn parse_line(line: &str) -> Result<Line<'_>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(Line::Blank);
    }

    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    if let Some(command) = head.strip_prefix(':') {
        if rest.is_empty() || rest.contains(char::is_whitespace) {
            bail!("`:{command}` takes exactly one session id");
        }
        return match command {
            "start" => Ok(Line::Start(rest)),
            "end" => Ok(Line::End(rest)),
            "restart" => Ok(Line::Restart(rest)),
            "status" => Ok(Line::Status(rest)),
            other => bail!("unknown command `:{other}`"),
        };
    }

    if rest.is_empty() {
        bail!("missing position after session `{head}`");
    }
    Ok(Line::Report {
        session: head,
        fen: rest,
    })
}

async fn handle_line(
    line: Line<'_>,
    relay: &RelayHandle,
    observer: &LatestValueObserver,
) -> Result<()> {
    match line {
        Line::Blank => {}
        Line::Report { session, fen } => {
            let session_id = SessionId::from_raw(session);
            observer.set(&session_id, fen);
            relay.report_raw_position(session_id, fen);
        }
        Line::Start(session) => relay.session_started(SessionId::from_raw(session)),
        Line::End(session) => {
            let session_id = SessionId::from_raw(session);
            observer.clear(&session_id);
            relay.session_ended(session_id);
        }
        Line::Restart(session) => relay.restart_detector(SessionId::from_raw(session)),
        Line::Status(session) => {
            let status = relay.status(SessionId::from_raw(session)).await;
            let json = serde_json::to_string(&status).context("Failed to encode status")?;
            println!("{json}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings()?;

    let telemetry = init_telemetry(TelemetryConfig {
        log_level: parse_level(&settings.logging.level),
        module_levels: Vec::new(),
        json: settings.logging.json,
    });
    let metrics = telemetry.metrics();

    info!(
        url = %settings.engine.url,
        depth = settings.engine.search_depth,
        "starting fenrelay"
    );

    let observer = Arc::new(LatestValueObserver::new());
    let link = ConnectionManager::spawn(
        LinkConfig::from(&settings.engine),
        Arc::new(WsConnector::default()),
        Arc::clone(&metrics),
    );
    let (sink, mut events) = ChannelSink::new();
    let relay = Router::spawn(
        RelayConfig::from(&settings),
        observer.clone(),
        link.clone(),
        Arc::new(sink),
        Arc::clone(&metrics),
    );

    let printer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(event) = events.recv().await {
            let Ok(mut json) = serde_json::to_string(&event) else {
                continue;
            };
            json.push('\n');
            if stdout.write_all(json.as_bytes()).await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    debug!("stdin closed");
                    tokio::time::sleep(Duration::from_millis(cli.linger_ms)).await;
                    break;
                };
                match parse_line(&line) {
                    Ok(parsed) => handle_line(parsed, &relay, &observer).await?,
                    Err(e) => warn!(error = %e, "ignoring input line"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    relay.shutdown();
    link.shutdown();
    let _ = tokio::time::timeout(Duration::from_secs(1), printer).await;

    for sample in metrics.snapshot() {
        debug!(name = %sample.name, value = sample.value, labels = ?sample.labels, "metric");
    }
    info!("fenrelay stopped");
    Ok(())
}
