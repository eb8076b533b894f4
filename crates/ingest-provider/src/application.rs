//! Owning-application contract.
//!
//! An application owns its streams. Streams only keep a [`Weak`] handle back
//! to it, so dropping the application detaches every stream instead of
//! forming an ownership cycle.
//!
//! [`Weak`]: std::sync::Weak

use media_protocol::packet::MediaPacket;

use crate::stream::ProviderStream;

/// Name reported for a stream that has no live application.
pub const UNKNOWN_APPLICATION: &str = "Unknown";

/// Application that receives the packets of its streams.
pub trait Application: Send + Sync {
    /// Application name, used in logs.
    fn name(&self) -> &str;

    /// Application type name, used in logs.
    fn type_name(&self) -> &str;

    /// Ingest one packet of `stream`. Returns false if the packet was refused.
    fn ingest(&self, stream: &ProviderStream, packet: MediaPacket) -> bool;
}
