use std::sync::Arc;

use crate::audio::ByteBufferComposer;
use crate::error::{Error, Result};
use crate::packet::{
    AudioPacket, ChannelMask, PacketParser, PacketPtr, Sample, Seqnum, SourceId, Timestamp,
    channel_rank, num_channels,
};

/// RTP fixed header fields (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Only version 2 is accepted. CSRC entries and the header extension are
/// skipped; padding is honored when computing the payload length.
#[derive(Debug)]
struct RtpHeader {
    padding: bool,
    extension: bool,
    csrc_count: u8,
    marker: bool,
    seqnum: Seqnum,
    timestamp: Timestamp,
    ssrc: SourceId,
}

impl RtpHeader {
    /// Parse the 12-byte fixed header. `None` on short input or wrong version.
    fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        if (data[0] >> 6) != 2 {
            return None;
        }

        Some(Self {
            padding: (data[0] & 0x20) != 0,
            extension: (data[0] & 0x10) != 0,
            csrc_count: data[0] & 0x0f,
            marker: (data[1] & 0x80) != 0,
            seqnum: u16::from_be_bytes([data[2], data[3]]),
            timestamp: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            ssrc: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
        })
    }

    /// Total header size including CSRC list and extension, if present.
    fn size(&self, data: &[u8]) -> Option<usize> {
        let mut size = 12 + self.csrc_count as usize * 4;

        if self.extension {
            if data.len() < size + 4 {
                return None;
            }
            let ext_words = u16::from_be_bytes([data[size + 2], data[size + 3]]) as usize;
            size += 4 + ext_words * 4;
        }

        (size <= data.len()).then_some(size)
    }
}

/// Parser for RTP datagrams carrying linear 16-bit PCM (RFC 3551 §4.5.11).
///
/// The channel count and sample rate are not carried on the wire; they come
/// from out-of-band stream configuration and are fixed per parser, one
/// parser per local port. The payload is copied through the byte buffer
/// composer; composer exhaustion fails the parse, which the router treats as
/// a transient drop.
pub struct RtpParser {
    channels: ChannelMask,
    rate: u32,
    composer: Arc<dyn ByteBufferComposer>,
}

impl RtpParser {
    /// Create a parser for streams with the given channel mask and rate.
    ///
    /// An empty channel mask is rejected as a config error, the same
    /// policy [`Server::new`](crate::Server::new) applies to its output
    /// mask.
    pub fn new(
        channels: ChannelMask,
        rate: u32,
        composer: Arc<dyn ByteBufferComposer>,
    ) -> Result<Self> {
        if num_channels(channels) == 0 {
            return Err(Error::Config("parser channel mask is empty"));
        }
        Ok(Self {
            channels,
            rate,
            composer,
        })
    }
}

impl PacketParser for RtpParser {
    fn parse(&self, data: &[u8]) -> Option<PacketPtr> {
        let header = RtpHeader::parse(data)?;
        let header_size = header.size(data)?;

        let payload_end = if header.padding {
            let pad = *data.last()? as usize;
            if pad == 0 || pad > data.len() - header_size {
                return None;
            }
            data.len() - pad
        } else {
            data.len()
        };

        let n_channels = num_channels(self.channels);
        let bytes_per_frame = 2 * n_channels;
        let n_samples = (payload_end - header_size) / bytes_per_frame;
        if n_samples == 0 {
            return None;
        }

        let Some(mut payload) = self.composer.compose(n_samples * bytes_per_frame) else {
            tracing::debug!(len = n_samples * bytes_per_frame, "rtp: byte buffer exhausted");
            return None;
        };
        payload.copy_from_slice(&data[header_size..header_size + n_samples * bytes_per_frame]);

        Some(Arc::new(RtpAudioPacket {
            seqnum: header.seqnum,
            timestamp: header.timestamp,
            ssrc: header.ssrc,
            marker: header.marker,
            channels: self.channels,
            rate: self.rate,
            payload,
        }))
    }
}

/// An RTP audio packet with an L16 payload.
///
/// Samples stay in network byte order until
/// [`read_samples`](AudioPacket::read_samples) decodes them to `f32` in
/// [-1.0, 1.0).
pub struct RtpAudioPacket {
    seqnum: Seqnum,
    timestamp: Timestamp,
    ssrc: SourceId,
    marker: bool,
    channels: ChannelMask,
    rate: u32,
    payload: Vec<u8>,
}

impl AudioPacket for RtpAudioPacket {
    fn source(&self) -> SourceId {
        self.ssrc
    }

    fn seqnum(&self) -> Seqnum {
        self.seqnum
    }

    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn rate(&self) -> u32 {
        self.rate
    }

    fn marker(&self) -> bool {
        self.marker
    }

    fn channels(&self) -> ChannelMask {
        self.channels
    }

    fn num_samples(&self) -> usize {
        self.payload.len() / (2 * num_channels(self.channels))
    }

    fn read_samples(&self, ch_mask: ChannelMask, offset: usize, out: &mut [Sample]) -> usize {
        let out_channels = num_channels(ch_mask);
        if out_channels == 0 || offset >= self.num_samples() {
            return 0;
        }

        let pkt_channels = num_channels(self.channels);
        let n = (out.len() / out_channels).min(self.num_samples() - offset);

        for index in 0..32 {
            if ch_mask & (1 << index) == 0 || self.channels & (1 << index) == 0 {
                continue;
            }
            let out_slot = channel_rank(ch_mask, index);
            let pkt_slot = channel_rank(self.channels, index);

            for i in 0..n {
                let at = ((offset + i) * pkt_channels + pkt_slot) * 2;
                let raw = i16::from_be_bytes([self.payload[at], self.payload[at + 1]]);
                out[i * out_channels + out_slot] = Sample::from(raw) / 32768.0;
            }
        }

        n
    }
}
