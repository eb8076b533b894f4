//! Provider Replay
//!
//! Drives a single [`ProviderStream`] from a JSON-lines event script and
//! prints every dispatched packet as one JSON line on stdout. Logs go to
//! stderr.
//!
//! # Usage
//!
//! ```text
//! provider-replay [--metrics] [SCRIPT]
//! ```
//!
//! Without `SCRIPT` events are read from stdin. `--metrics` prints the
//! Prometheus rendering after the last event.
//!
//! # Events
//!
//! ```text
//! {"op":"track","id":0,"media_type":"video","num":1,"den":90000}
//! {"op":"start"}
//! {"op":"base","track":0,"pts":3000,"dts":3000,"max":8589934591}
//! {"op":"delta","track":1,"ts":960,"max":4294967295}
//! {"op":"sleep_ms","ms":5000}
//! {"op":"stop"}
//! ```
//!
//! `sleep_ms` advances a virtual clock; no real time passes. A failing event
//! is logged and the replay continues with the next one.

#![warn(clippy::pedantic)]

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use bytes::Bytes;
use common::config::ObservabilityConfig;
use common::types::{StreamId, TrackId};
use ingest_provider::application::Application;
use ingest_provider::config::{Config, TimestampConfig};
use ingest_provider::errors::ProviderError;
use ingest_provider::observability::{init_metrics_recorder, PrometheusIngressMetrics};
use ingest_provider::stream::ProviderStream;
use media_protocol::packet::{BitstreamFormat, MediaPacket, MediaType, PacketType};
use media_protocol::stream::{SourceType, StreamInfo};
use media_protocol::timebase::Timebase;
use media_protocol::track::{Track, TrackDirectory};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// One line of a replay script.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Event {
    Track {
        id: u32,
        media_type: MediaType,
        num: u32,
        den: u32,
    },
    Start,
    Stop,
    Base {
        track: u32,
        pts: i64,
        dts: i64,
        max: i64,
        #[serde(default)]
        format: Option<BitstreamFormat>,
        #[serde(default)]
        size: usize,
    },
    Delta {
        track: u32,
        ts: i64,
        max: i64,
        #[serde(default)]
        format: Option<BitstreamFormat>,
        #[serde(default)]
        size: usize,
    },
    SleepMs {
        ms: u64,
    },
}

/// Application that writes every packet it receives to stdout.
struct PrintingApplication;

impl Application for PrintingApplication {
    fn name(&self) -> &str {
        "replay"
    }

    fn type_name(&self) -> &str {
        "Printing"
    }

    fn ingest(&self, stream: &ProviderStream, packet: MediaPacket) -> bool {
        let line = serde_json::json!({
            "stream": stream.name(),
            "track": packet.track_id,
            "media_type": packet.media_type,
            "format": packet.bitstream_format,
            "pts": packet.pts,
            "dts": packet.dts,
            "bytes": packet.len(),
        });
        println!("{line}");
        true
    }
}

/// Format assumed when an event does not name one.
const fn default_format(media_type: MediaType) -> BitstreamFormat {
    match media_type {
        MediaType::Video => BitstreamFormat::H264AnnexB,
        MediaType::Audio => BitstreamFormat::AacAdts,
        MediaType::Data => BitstreamFormat::Id3v2,
        MediaType::Subtitle => BitstreamFormat::Webvtt,
        MediaType::Unknown => BitstreamFormat::Unknown,
    }
}

/// Replay state: the stream under test and its virtual clock.
struct Replay {
    stream: ProviderStream,
    epoch: Instant,
    elapsed: Duration,
}

impl Replay {
    fn new(application: &Arc<dyn Application>, config: TimestampConfig) -> Self {
        let mut info = StreamInfo::new(StreamId(1), "replay", SourceType::File);
        info.msid = 1;
        Self {
            stream: ProviderStream::with_application(
                application,
                info,
                config,
                Arc::new(PrometheusIngressMetrics),
            ),
            epoch: Instant::now(),
            elapsed: Duration::ZERO,
        }
    }

    /// Parse and apply one script line. Blank lines are skipped.
    fn apply_line(&mut self, line: &str) -> anyhow::Result<()> {
        if line.trim().is_empty() {
            return Ok(());
        }
        let event: Event = serde_json::from_str(line)?;
        self.apply(event)
    }

    fn now(&self) -> Instant {
        self.epoch + self.elapsed
    }

    fn dispatch(
        &mut self,
        track_id: TrackId,
        pts: i64,
        dts: i64,
        format: Option<BitstreamFormat>,
        size: usize,
    ) -> Result<(), ProviderError> {
        let media_type = self
            .stream
            .tracks()
            .track(track_id)
            .map_or(MediaType::Unknown, |track| track.media_type);
        let packet_type = if media_type == MediaType::Video {
            PacketType::Nalu
        } else {
            PacketType::Raw
        };

        let packet = MediaPacket::new(
            self.stream.msid(),
            media_type,
            track_id,
            Bytes::from(vec![0u8; size]),
            pts,
            dts,
            format.unwrap_or(default_format(media_type)),
            packet_type,
        );
        let now = self.now();
        self.stream.send_frame_at(packet, now)
    }

    fn apply(&mut self, event: Event) -> anyhow::Result<()> {
        match event {
            Event::Track {
                id,
                media_type,
                num,
                den,
            } => {
                let timebase = Timebase::new(num, den)?;
                self.stream
                    .add_track(Track::new(TrackId(id), media_type, timebase));
            }
            Event::Start => {
                let now = self.now();
                self.stream.start_at(now);
            }
            Event::Stop => self.stream.stop(),
            Event::Base {
                track,
                pts,
                dts,
                max,
                format,
                size,
            } => {
                let track = TrackId(track);
                let adjusted = self.stream.adjust_timestamp_by_base(track, pts, dts, max)?;
                self.dispatch(track, adjusted.pts, adjusted.dts, format, size)?;
            }
            Event::Delta {
                track,
                ts,
                max,
                format,
                size,
            } => {
                let track = TrackId(track);
                let clock = self.stream.adjust_timestamp_by_delta(track, ts, max)?;
                self.dispatch(track, clock, clock, format, size)?;
            }
            Event::SleepMs { ms } => {
                self.elapsed += Duration::from_millis(ms);
            }
        }
        Ok(())
    }
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

    if config.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(&config.observability);

    let mut render_metrics = false;
    let mut script = None;
    for arg in std::env::args().skip(1) {
        if arg == "--metrics" {
            render_metrics = true;
        } else {
            script = Some(arg);
        }
    }

    let metrics_handle = if render_metrics {
        Some(init_metrics_recorder().map_err(anyhow::Error::msg)?)
    } else {
        None
    };

    let input: Box<dyn BufRead> = match &script {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {path}"))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    info!(
        target: "provider.replay",
        script = script.as_deref().unwrap_or("-"),
        conversion = config.timestamp.conversion.as_str(),
        "Starting replay"
    );

    let application: Arc<dyn Application> = Arc::new(PrintingApplication);
    let mut replay = Replay::new(&application, config.timestamp);

    for (index, line) in input.lines().enumerate() {
        let line = line.context("Failed to read script")?;

        if let Err(e) = replay.apply_line(&line) {
            let kind = e
                .downcast_ref::<ProviderError>()
                .map_or("invalid_event", ProviderError::kind);
            warn!(
                target: "provider.replay",
                line = index + 1,
                kind,
                error = %e,
                "Event failed"
            );
        }
    }

    info!(
        target: "provider.replay",
        state = %replay.stream.state(),
        "Replay finished"
    );

    if let Some(handle) = metrics_handle {
        print!("{}", handle.render());
    }

    Ok(())
}
