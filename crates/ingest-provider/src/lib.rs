//! Ingest Provider Stream Core
//!
//! This library provides the provider-side stream shared by every protocol
//! producer (RTMP, RTSP, SRT, MPEG-TS, WebRTC) of a live media server:
//!
//! - Per-track timestamp continuity across origins, counter wraparound and
//!   reconnects
//! - A small stream lifecycle state machine
//! - Validation and dispatch of media packets to the owning application
//!
//! # Architecture
//!
//! ```text
//! protocol producer
//!   │  raw pts/dts ──▶ ProviderStream::adjust_timestamp_by_*  (TimestampEngine)
//!   │  MediaPacket ──▶ ProviderStream::send_frame ──▶ IngressMetrics
//!   │                                            └──▶ Application::ingest
//! control path
//!      start / stop / terminate / set_state
//! ```
//!
//! # Modules
//!
//! - [`application`] - Contract of the application owning a stream
//! - [`config`] - Configuration from environment
//! - [`errors`] - Error types
//! - [`observability`] - Metrics
//! - [`stream`] - Stream lifecycle and dispatch
//! - [`timestamp`] - Timestamp continuity engine

#![warn(clippy::pedantic)]

pub mod application;
pub mod config;
pub mod errors;
pub mod observability;
pub mod stream;
pub mod timestamp;
