//! Audio packets and the units they are measured in.
//!
//! This module provides the [`AudioPacket`] capability trait and the wire
//! parser trait ([`PacketParser`]) that convert received datagrams into
//! shareable, timestamped sample records.
//!
//! ## Units
//!
//! - **Sequence number** ([`Seqnum`], 16-bit, wrapping) — position of a
//!   packet in its stream, for reordering and duplicate detection.
//! - **Timestamp** ([`Timestamp`], 32-bit, wrapping) — index of the packet's
//!   first sample in the stream's media clock.
//! - **Source id** ([`SourceId`]) — identifies the client stream; sequence
//!   numbers and timestamps are numbered independently per source.
//! - **Channel mask** ([`ChannelMask`]) — bitset over channel indices 0..32;
//!   iteration order is always ascending index.
//!
//! ## Wrap-aware ordering
//!
//! Both sequence numbers and timestamps overflow in normal operation, so
//! ordering is defined by signed difference at the type's natural width:
//! `a` is before `b` iff `a.wrapping_sub(b)`, reinterpreted as signed, is
//! negative. Comparing after widening to a larger integer type gives wrong
//! answers near the wrap point and must not be used.

pub mod rtp;

use std::sync::Arc;

/// Packet sequence number (wraps at 65535).
pub type Seqnum = u16;

/// Sample-clock timestamp (wraps at 2^32).
pub type Timestamp = u32;

/// Client stream identifier.
pub type SourceId = u32;

/// Bitset of channel indices 0..32.
pub type ChannelMask = u32;

/// One audio sample.
pub type Sample = f32;

/// Signed distance from `b` to `a` in sequence numbers.
///
/// Positive when `a` is ahead of `b`, negative when behind.
pub fn seqnum_diff(a: Seqnum, b: Seqnum) -> i16 {
    a.wrapping_sub(b) as i16
}

/// Whether seqnum `a` is strictly before seqnum `b`, wrap-aware.
pub fn seqnum_before(a: Seqnum, b: Seqnum) -> bool {
    seqnum_diff(a, b) < 0
}

/// Signed distance from `b` to `a` in timestamp units.
pub fn timestamp_diff(a: Timestamp, b: Timestamp) -> i32 {
    a.wrapping_sub(b) as i32
}

/// Whether timestamp `a` is strictly before timestamp `b`, wrap-aware.
pub fn timestamp_before(a: Timestamp, b: Timestamp) -> bool {
    timestamp_diff(a, b) < 0
}

/// Number of channels present in a mask.
pub fn num_channels(mask: ChannelMask) -> usize {
    mask.count_ones() as usize
}

/// Position of channel `index` among the channels of `mask`.
///
/// The rank of a channel is its slot in an interleaved frame carrying
/// exactly the channels of `mask`. `index` must be present in the mask.
pub fn channel_rank(mask: ChannelMask, index: u32) -> usize {
    (mask & ((1u32 << index) - 1)).count_ones() as usize
}

/// A parsed audio packet.
///
/// Packets are immutable once parsed and shared by reference counting
/// ([`PacketPtr`]): the session store, the renderer, and (transiently) the
/// parser may all hold the same packet. Implementations carry the payload in
/// whatever form suits the wire format and decode on
/// [`read_samples`](Self::read_samples).
pub trait AudioPacket: Send + Sync {
    /// Source id of the client stream this packet belongs to.
    fn source(&self) -> SourceId;

    /// Sequence number within the stream.
    fn seqnum(&self) -> Seqnum;

    /// Timestamp of the packet's first sample.
    fn timestamp(&self) -> Timestamp;

    /// Timestamp units per second, or 0 if the timestamp is meaningless.
    fn rate(&self) -> u32;

    /// Marker bit; meaning depends on the wire format.
    fn marker(&self) -> bool;

    /// Bitmask of channels present in the packet.
    fn channels(&self) -> ChannelMask;

    /// Number of samples per channel.
    fn num_samples(&self) -> usize;

    /// Copy samples into `out`, interleaved over the channels of `ch_mask`.
    ///
    /// `offset` is a per-channel sample offset into the packet. Channels
    /// requested by `ch_mask` but absent from the packet are left untouched
    /// in `out`; channels present in the packet but not requested are
    /// skipped. Returns the number of samples per channel copied, which is
    /// `min(out.len() / num_channels(ch_mask), num_samples() - offset)`.
    fn read_samples(&self, ch_mask: ChannelMask, offset: usize, out: &mut [Sample]) -> usize;
}

/// Shared packet handle.
pub type PacketPtr = Arc<dyn AudioPacket>;

/// Wire parser attached to a local port.
///
/// One parser instance serves every datagram addressed to its port; parsers
/// therefore hold no per-stream state.
pub trait PacketParser: Send + Sync {
    /// Parse a datagram payload into a packet.
    ///
    /// Returns `None` on malformed input (and on transient buffer
    /// exhaustion); the caller drops the datagram.
    fn parse(&self, data: &[u8]) -> Option<PacketPtr>;
}
