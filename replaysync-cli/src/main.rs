// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Replaysync CLI
//!
//! Inspect a recorded session against its backend timeline and traces.

mod render;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use replaysync_client::{ClientConfig, HttpSource, SessionSource};
use replaysync_core::{ClockAligner, SyncConfig};
use replaysync_index::{TimelineIndex, WindowFilter};
use replaysync_player::{EventStreamCursor, HeadlessEngine, PlaybackEvent, PullOutcome, SessionSync};
use replaysync_telemetry::LogConfig;
use replaysync_trace::{TraceCatalog, TraceFilter};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "replaysync")]
#[command(about = "Replaysync - session replay inspector", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Session API base URL, overrides the configuration
    #[arg(long)]
    api_url: Option<String>,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Output as JSON (machine-readable)
    #[arg(long)]
    json: bool,

    /// Write logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the backend timeline of a session
    Timeline {
        /// Session ID
        session: String,

        /// Only ticks around this server time (ms)
        #[arg(long, conflicts_with = "playback")]
        at: Option<i64>,

        /// Only ticks around this playback time (ms), mapped through the recording
        #[arg(long)]
        playback: Option<i64>,

        /// Show every tick regardless of position
        #[arg(long)]
        all: bool,
    },

    /// Show the call tree of one request
    Trace {
        /// Session ID
        session: String,

        /// Request ID
        rid: String,

        /// Hide frames shorter than this (ms)
        #[arg(long)]
        floor: Option<f64>,

        /// Hide vendor frames without children
        #[arg(long)]
        collapse_vendor: bool,

        /// Mark the frame active at this trace time (ms)
        #[arg(long)]
        at: Option<f64>,
    },

    /// Pull the whole recorded stream and report what it contains
    Stream {
        /// Session ID
        session: String,

        /// Chunks per request
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Play a session headlessly and follow the visible timeline
    Play {
        /// Session ID
        session: String,

        /// Seek to this server time (ms) after loading
        #[arg(long)]
        seek: Option<i64>,

        /// Wall-clock seconds to play for
        #[arg(long, default_value = "10")]
        seconds: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log = LogConfig::default().with_json(cli.log_json);
    if cli.verbose {
        log = log.with_level("replaysync=debug,replaysync_player=debug,replaysync_client=debug,warn");
    }
    replaysync_telemetry::init_logging(&log)?;

    let mut config = SyncConfig::from_env_or_file(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
        config.validate()?;
    }
    debug!("Configuration: {:?}", config);

    let http = HttpSource::new(ClientConfig::from(&config)).context("Invalid API URL")?;
    let source: Arc<dyn SessionSource> = Arc::new(http);

    match cli.command {
        Commands::Timeline {
            session,
            at,
            playback,
            all,
        } => timeline(&config, source, &session, at, playback, all, cli.json).await,
        Commands::Trace {
            session,
            rid,
            floor,
            collapse_vendor,
            at,
        } => {
            let mut filter = TraceFilter::from_config(&config.trace);
            filter.collapse_vendor |= collapse_vendor;
            if let Some(floor) = floor {
                filter.duration_floor_ms = floor;
            }
            trace(&config, source, &session, &rid, &filter, at, cli.json).await
        }
        Commands::Stream { session, limit } => {
            let limit = limit.unwrap_or(config.pull_limit).max(1);
            stream(source, &session, limit, cli.json).await
        }
        Commands::Play {
            session,
            seek,
            seconds,
        } => play(config, source, &session, seek, seconds, cli.json).await,
    }
}

async fn timeline(
    config: &SyncConfig,
    source: Arc<dyn SessionSource>,
    session: &str,
    at: Option<i64>,
    playback: Option<i64>,
    all: bool,
    json: bool,
) -> Result<()> {
    let full = source
        .load_session(session)
        .await
        .with_context(|| format!("Failed to load session {}", session))?;
    let index = TimelineIndex::from_values(&full.actions);
    info!(session, ticks = index.len(), dropped = index.dropped(), "Timeline loaded");

    let now = match (at, playback) {
        (Some(at), _) => Some(at),
        (None, Some(playback)) => {
            let epoch = recording_epoch(source, session).await?;
            let mut clock = ClockAligner::new();
            clock.set_recording_epoch(epoch);
            clock.observe_earliest_tick(index.earliest());
            match clock.to_server_time(playback) {
                Some(now) => Some(now),
                None => bail!("Session {} has no backend records to align with", session),
            }
        }
        (None, None) => None,
    };

    let window = WindowFilter::new(config.window_half_width_ms).with_show_all(all || now.is_none());
    let ticks = window.select(&index, now);

    if json {
        let body = json!({
            "session": session,
            "at": now,
            "halfWidthMs": window.half_width_ms(),
            "showAll": window.show_all(),
            "dropped": index.dropped(),
            "ticks": ticks,
            "groups": index.groups(),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print!("{}", render::timeline(&index, &ticks, now, window.half_width_ms()));
    }
    Ok(())
}

/// Timestamp of the first recorded event of a session.
async fn recording_epoch(source: Arc<dyn SessionSource>, session: &str) -> Result<i64> {
    let cursor = EventStreamCursor::new(session, source, CancellationToken::new());
    cursor.load_meta().await?;
    while cursor.first_timestamp().is_none() {
        match cursor.pull_more(1).await? {
            PullOutcome::Done => break,
            PullOutcome::Appended { .. } | PullOutcome::Busy => {}
        }
    }
    cursor
        .first_timestamp()
        .with_context(|| format!("Session {} has no recorded events", session))
}

async fn trace(
    config: &SyncConfig,
    source: Arc<dyn SessionSource>,
    session: &str,
    rid: &str,
    filter: &TraceFilter,
    at: Option<f64>,
    json: bool,
) -> Result<()> {
    let response = source
        .fetch_traces(session)
        .await
        .with_context(|| format!("Failed to load traces for session {}", session))?;
    let catalog = TraceCatalog::from_response(&response, &config.trace);
    let entry = catalog
        .get(rid)
        .with_context(|| format!("No trace for request {} ({} requests traced)", rid, catalog.len()))?;

    let forest = filter.apply(&entry.build());
    let active = at.and_then(|t| forest.active_frame(t));

    if json {
        let body = json!({
            "requestRid": rid,
            "group": entry.group_key,
            "request": entry.request,
            "failedBatches": entry.failed_batches,
            "stats": forest.stats(),
            "activeFrame": active.map(|f| f.id),
            "frames": forest,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print!("{}", render::trace(entry, &forest, active.map(|f| f.id)));
    }
    Ok(())
}

async fn stream(source: Arc<dyn SessionSource>, session: &str, limit: usize, json: bool) -> Result<()> {
    let cursor = EventStreamCursor::new(session, source, CancellationToken::new());
    cursor
        .load_meta()
        .await
        .with_context(|| format!("Failed to load session {}", session))?;

    let mut first = None;
    let mut last = None;
    loop {
        match cursor.pull_more(limit).await? {
            PullOutcome::Done => break,
            PullOutcome::Busy => continue,
            PullOutcome::Appended { .. } => {
                for event in cursor.take_events(usize::MAX) {
                    first = Some(first.map_or(event.timestamp, |f: i64| f.min(event.timestamp)));
                    last = Some(last.map_or(event.timestamp, |l: i64| l.max(event.timestamp)));
                }
            }
        }
    }

    let progress = cursor.progress();
    let duration = first.zip(last).map(|(f, l)| l - f);
    if json {
        let body = json!({
            "session": session,
            "progress": progress,
            "firstTimestamp": first,
            "lastTimestamp": last,
            "durationMs": duration,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print!("{}", render::stream(session, &progress, duration));
    }
    Ok(())
}

async fn play(
    config: SyncConfig,
    source: Arc<dyn SessionSource>,
    session: &str,
    seek: Option<i64>,
    seconds: f64,
    json: bool,
) -> Result<()> {
    let mut sync = SessionSync::new(config, source, HeadlessEngine::new);
    let status = sync
        .open(session)
        .await
        .with_context(|| format!("Failed to open session {}", session))?;
    info!(session, status = status.as_str(), "Session opened");
    if !status.has_engine() {
        println!("{}: {}", session, status.as_str());
        return Ok(());
    }
    if let Some(server_ms) = seek {
        sync.seek(server_ms)?;
    }

    let deadline = tokio::time::sleep(Duration::from_secs_f64(seconds.max(0.0)));
    tokio::pin!(deadline);
    loop {
        let event = tokio::select! {
            _ = &mut deadline => None,
            event = sync.next_event() => event,
        };
        match event {
            Some(PlaybackEvent::Position(_)) => {
                let view = sync.view();
                if json {
                    let line = json!({
                        "position": view.position(),
                        "serverTime": view.server_time(),
                        "visible": view.visible(),
                    });
                    println!("{}", serde_json::to_string(&line)?);
                } else {
                    println!("{}", render::position(view));
                }
            }
            Some(PlaybackEvent::Failed(message)) => bail!("Playback failed: {}", message),
            Some(PlaybackEvent::Status(status)) => debug!(status = status.as_str(), "Status changed"),
            Some(PlaybackEvent::StreamFinished) => debug!("Recording fully loaded"),
            None => break,
        }
    }

    if let Some(snapshot) = sync.playback() {
        if json {
            println!("{}", serde_json::to_string(&snapshot)?);
        } else {
            println!(
                "{} at {} of {} ms ({} events streamed)",
                snapshot.status.as_str(),
                snapshot.position.unwrap_or(0),
                snapshot.total_time.unwrap_or(0),
                snapshot.fed_events
            );
        }
    }
    sync.close();
    Ok(())
}
