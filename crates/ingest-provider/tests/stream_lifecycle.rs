//! End-to-end tests of a provider stream.
//!
//! Drives `ProviderStream` the way a protocol producer and the control path
//! do, and verifies:
//! - Rebase and delta timestamp continuity, including counter wraps
//! - Stop idempotence and the `set_state` guard
//! - Reconnect bridging across a stop/start cycle
//! - Ingress and discontinuity metrics

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use common::types::{StreamId, TrackId};
use ingest_provider::application::Application;
use ingest_provider::config::TimestampConfig;
use ingest_provider::errors::ProviderError;
use ingest_provider::observability::{IngressMetrics, PrometheusIngressMetrics};
use ingest_provider::stream::{ProviderStream, StreamState};
use ingest_provider::timestamp::TimestampField;
use media_protocol::packet::{BitstreamFormat, MediaPacket, MediaType, PacketType};
use media_protocol::stream::{SourceType, StreamInfo};
use media_protocol::timebase::Timebase;
use media_protocol::track::Track;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

const MPEG_TS_MAX: i64 = (1 << 33) - 1;
const RTP_MAX: i64 = 4_294_967_295;

const VIDEO: TrackId = TrackId(0);
const AUDIO: TrackId = TrackId(1);

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Default)]
struct CollectingApplication {
    packets: Mutex<Vec<MediaPacket>>,
}

impl Application for CollectingApplication {
    fn name(&self) -> &str {
        "live"
    }

    fn type_name(&self) -> &str {
        "Collecting"
    }

    fn ingest(&self, _stream: &ProviderStream, packet: MediaPacket) -> bool {
        self.packets.lock().unwrap().push(packet);
        true
    }
}

struct NoopMetrics;

impl IngressMetrics for NoopMetrics {
    fn record_ingress(&self, _stream: &StreamInfo, _bytes: u64) {}
}

fn stream_info() -> StreamInfo {
    StreamInfo::new(StreamId(7), "studio", SourceType::Srt)
        .with_track(Track::new(VIDEO, MediaType::Video, Timebase::MPEG_TS))
        .with_track(Track::new(
            AUDIO,
            MediaType::Audio,
            Timebase::new(1, 48_000).unwrap(),
        ))
}

fn stream_with(
    metrics: Arc<dyn IngressMetrics>,
) -> (ProviderStream, Arc<CollectingApplication>) {
    let app = Arc::new(CollectingApplication::default());
    let handle: Arc<dyn Application> = app.clone();
    let stream = ProviderStream::with_application(
        &handle,
        stream_info(),
        TimestampConfig::default(),
        metrics,
    );
    (stream, app)
}

fn stream() -> (ProviderStream, Arc<CollectingApplication>) {
    stream_with(Arc::new(NoopMetrics))
}

fn packet(track_id: TrackId, media_type: MediaType, pts: i64, dts: i64) -> MediaPacket {
    let format = if media_type == MediaType::Video {
        BitstreamFormat::H264AnnexB
    } else {
        BitstreamFormat::AacAdts
    };
    MediaPacket::new(
        0,
        media_type,
        track_id,
        Bytes::from_static(&[0u8; 188]),
        pts,
        dts,
        format,
        PacketType::Raw,
    )
}

/// Rebase a raw video timestamp and dispatch the result at `now`.
fn push_video(stream: &mut ProviderStream, pts: i64, dts: i64, now: Instant) -> i64 {
    let adjusted = stream
        .adjust_timestamp_by_base(VIDEO, pts, dts, MPEG_TS_MAX)
        .unwrap();
    stream
        .send_frame_at(packet(VIDEO, MediaType::Video, adjusted.pts, adjusted.dts), now)
        .unwrap();
    adjusted.pts
}

// ============================================================================
// Rebase strategy
// ============================================================================

#[test]
fn test_linear_rebase_without_wrap() {
    let (mut stream, _app) = stream();

    let first = stream
        .adjust_timestamp_by_base(VIDEO, 1000, 1000, MPEG_TS_MAX)
        .unwrap();
    let second = stream
        .adjust_timestamp_by_base(VIDEO, 2000, 2000, MPEG_TS_MAX)
        .unwrap();

    // Start captured from the first DTS: 1000 ticks at 90 kHz
    assert_eq!(stream.timestamps().start_timestamp(), Some(11_111));
    assert_eq!((first.pts, first.dts), (0, 0));
    assert_eq!((second.pts, second.dts), (1000, 1000));
}

#[test]
fn test_forward_wraparound_keeps_clock_monotonic() {
    let (mut stream, _app) = stream();
    let now = Instant::now();

    let adjusted: Vec<i64> = [MPEG_TS_MAX - 10, MPEG_TS_MAX - 5, 3, 10]
        .into_iter()
        .map(|raw| push_video(&mut stream, raw, raw, now))
        .collect();

    assert_eq!(adjusted, vec![0, 5, 13, 20]);
    assert_eq!(stream.timestamps().wraparound_count(VIDEO, TimestampField::Pts), 1);
    assert_eq!(stream.timestamps().wraparound_count(VIDEO, TimestampField::Dts), 1);
    assert!(adjusted.windows(2).all(|w| w[1] > w[0]));
}

#[test]
fn test_tracks_share_epoch_origin() {
    let (mut stream, _app) = stream();

    stream
        .adjust_timestamp_by_base(VIDEO, 90_000, 90_000, MPEG_TS_MAX)
        .unwrap();
    // One second later in the audio clock domain
    let audio = stream
        .adjust_timestamp_by_base(AUDIO, 96_000, 96_000, MPEG_TS_MAX)
        .unwrap();

    assert_eq!(audio.pts, 48_000);
}

// ============================================================================
// Delta strategy
// ============================================================================

#[test]
fn test_delta_source_restart_absorbed() {
    let (mut stream, _app) = stream();

    assert_eq!(stream.delta_timestamp(AUDIO, 1000, RTP_MAX), Ok(0));
    assert_eq!(stream.delta_timestamp(AUDIO, 500, RTP_MAX), Ok(0));
    // Baseline moved to 500
    assert_eq!(stream.delta_timestamp(AUDIO, 600, RTP_MAX), Ok(100));
}

#[test]
fn test_delta_wraparound_near_max() {
    let (mut stream, _app) = stream();

    stream.delta_timestamp(AUDIO, 4_294_967_290, RTP_MAX).unwrap();

    assert_eq!(
        stream.delta_timestamp(AUDIO, 10, RTP_MAX),
        Ok((RTP_MAX - 4_294_967_290) + 10)
    );
}

#[test]
fn test_delta_clock_runs_through_wrap() {
    let (mut stream, _app) = stream();

    let clock: Vec<i64> = [4_294_967_290, 10, 20]
        .into_iter()
        .map(|ts| stream.adjust_timestamp_by_delta(AUDIO, ts, RTP_MAX).unwrap())
        .collect();

    assert_eq!(clock, vec![0, 15, 25]);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_stop_twice_rebases_once() {
    let (mut stream, _app) = stream();
    stream.adjust_timestamp_by_base(VIDEO, 0, 0, MPEG_TS_MAX).unwrap();
    stream
        .adjust_timestamp_by_base(VIDEO, 90_000, 90_000, MPEG_TS_MAX)
        .unwrap();
    stream
        .adjust_timestamp_by_base(AUDIO, 24_000, 24_000, MPEG_TS_MAX)
        .unwrap();

    stream.stop();
    // Anchored on the smaller last timestamp (audio, 0.5 s)
    assert_eq!(stream.timestamps().base_timestamp_us(VIDEO), 500_000);
    assert_eq!(stream.timestamps().base_timestamp_us(AUDIO), 500_000);
    assert_eq!(stream.base_timestamp(VIDEO), Ok(45_000));
    assert_eq!(stream.base_timestamp(AUDIO), Ok(24_000));

    stream.stop();
    assert_eq!(stream.state(), StreamState::Stopped);
    assert_eq!(stream.timestamps().base_timestamp_us(VIDEO), 500_000);
    assert_eq!(stream.timestamps().base_timestamp_us(AUDIO), 500_000);
}

#[test]
fn test_set_state_stopped_always_rejected() {
    let states = [
        StreamState::Idle,
        StreamState::Connected,
        StreamState::Described,
        StreamState::Playing,
        StreamState::Error,
        StreamState::Terminated,
    ];

    for state in states {
        let (mut stream, _app) = stream();
        stream.set_state(state).unwrap();

        assert_eq!(
            stream.set_state(StreamState::Stopped),
            Err(ProviderError::RejectedTransition(state))
        );
        assert_eq!(stream.state(), state);
    }

    let (mut stream, _app) = stream();
    stream.stop();
    assert!(stream.set_state(StreamState::Stopped).is_err());
    assert_eq!(stream.state(), StreamState::Stopped);
}

#[test]
fn test_reconnect_bridges_gap_on_every_track() {
    let (mut stream, _app) = stream();
    let t0 = Instant::now();
    push_video(&mut stream, 0, 0, t0);

    stream.start_at(t0 + Duration::from_micros(5_000_000));

    assert_eq!(stream.timestamps().base_timestamp_us(VIDEO), 5_000_000);
    assert_eq!(stream.timestamps().base_timestamp_us(AUDIO), 5_000_000);
    assert_eq!(stream.base_timestamp(VIDEO), Ok(450_000));
    assert_eq!(stream.base_timestamp(AUDIO), Ok(240_000));
}

#[test]
fn test_stop_start_cycle_continues_timeline() {
    let (mut stream, app) = stream();
    let t0 = Instant::now();
    push_video(&mut stream, 0, 0, t0);
    push_video(&mut stream, 90_000, 90_000, t0);

    stream.stop();
    stream.start_at(t0 + Duration::from_secs(5));
    stream.set_state(StreamState::Playing).unwrap();

    // The new session restarts its raw clock at an unrelated origin
    let resumed = push_video(&mut stream, 777_000, 777_000, t0 + Duration::from_secs(5));

    // 1 s of media before the outage, 5 s of outage
    assert_eq!(resumed, 540_000);
    assert_eq!(app.packets.lock().unwrap().len(), 3);
}

#[test]
fn test_silent_track_stays_aligned_across_reconnect() {
    let (mut stream, _app) = stream();
    let t0 = Instant::now();
    // Only video emits in the first session
    push_video(&mut stream, 0, 0, t0);
    push_video(&mut stream, 90_000, 90_000, t0);

    stream.stop();
    stream.start_at(t0 + Duration::from_secs(5));

    assert_eq!(stream.timestamps().base_timestamp_us(VIDEO), 6_000_000);
    assert_eq!(stream.timestamps().base_timestamp_us(AUDIO), 6_000_000);
    assert_eq!(stream.base_timestamp(VIDEO), Ok(540_000));
    assert_eq!(stream.base_timestamp(AUDIO), Ok(288_000));
}

// ============================================================================
// Dispatch and metrics
// ============================================================================

#[test]
fn test_dispatch_records_ingress_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let (mut stream, app) = stream_with(Arc::new(PrometheusIngressMetrics));

    metrics::with_local_recorder(&recorder, || {
        let now = Instant::now();
        push_video(&mut stream, MPEG_TS_MAX - 1, MPEG_TS_MAX - 1, now);
        push_video(&mut stream, 1, 1, now);
        let mut bad = packet(AUDIO, MediaType::Audio, 0, 0);
        bad.packet_type = PacketType::Unknown;
        assert!(stream.send_frame_at(bad, now).is_err());
    });

    let counters: Vec<(String, u64)> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter_map(|(key, _, _, value)| match value {
            DebugValue::Counter(v) => Some((key.key().name().to_string(), v)),
            _ => None,
        })
        .collect();

    let value = |name: &str| {
        counters
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| *v)
            .sum::<u64>()
    };
    assert_eq!(value("provider_ingress_packets_total"), 2);
    assert_eq!(value("provider_ingress_bytes_total"), 376);
    // PTS and DTS both wrapped once
    assert_eq!(value("provider_timestamp_wraparound_total"), 2);
    assert_eq!(app.packets.lock().unwrap().len(), 2);
}
