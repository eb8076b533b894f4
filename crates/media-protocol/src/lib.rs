//! Media vocabulary shared between protocol producers and the ingest provider.
//!
//! This crate defines the data that crosses the provider boundary: track
//! timebases, the track directory a stream exposes, the stream descriptor
//! and the media packets handed to the owning application.

#![warn(clippy::pedantic)]

pub mod packet;
pub mod stream;
pub mod timebase;
pub mod track;
