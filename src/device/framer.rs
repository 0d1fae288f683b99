//! Resynchronising framer turning a noisy serial byte stream into validated [`Packet`]s.

use tracing::trace;

use super::packet::{PACKET_HEADER, PACKET_LEN, Packet};

/// Bytes kept when no header is present, in case one is split across chunks.
const SPLIT_HEADER_TAIL: usize = PACKET_HEADER.len() - 1;

/// Counters describing what the framer has done with the stream so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramerStats {
    /// Packets that passed validation and were yielded.
    pub accepted: u64,
    /// 28-byte candidates dropped because of a wrong type byte.
    pub rejected: u64,
    /// Bytes discarded while hunting for a header.
    pub discarded_bytes: u64,
}

/// Rolling-buffer packet framer.
///
/// Bytes are pushed as they arrive; packets are pulled lazily from the returned iterator.
/// Malformed input is dropped silently and never surfaces as an error.
#[derive(Debug, Default)]
pub struct PacketFramer {
    buffer: Vec<u8>,
    stats: FramerStats,
}

impl PacketFramer {
    /// Create an empty framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and iterate over every complete packet now available.
    ///
    /// Packets not consumed from the iterator stay buffered for the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Frames<'_> {
        self.buffer.extend_from_slice(chunk);
        Frames { framer: self }
    }

    /// Extract the next valid packet from the buffer, if any.
    pub fn next_packet(&mut self) -> Option<Packet> {
        while self.buffer.len() >= PACKET_LEN {
            let Some(start) = find_header(&self.buffer) else {
                let discard = self.buffer.len() - SPLIT_HEADER_TAIL;
                self.discard(discard);
                return None;
            };

            if start > 0 {
                self.discard(start);
            }

            if self.buffer.len() < PACKET_LEN {
                return None;
            }

            let mut frame = [0u8; PACKET_LEN];
            frame.copy_from_slice(&self.buffer[..PACKET_LEN]);
            self.buffer.drain(..PACKET_LEN);

            match Packet::parse(frame) {
                Some(packet) => {
                    self.stats.accepted += 1;
                    return Some(packet);
                }
                None => {
                    self.stats.rejected += 1;
                    trace!(packet_type = frame[11], "dropping non-sensor packet");
                }
            }
        }

        None
    }

    /// Drop everything buffered, e.g. after the device disconnected.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Number of bytes currently waiting in the buffer.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Running counters for diagnostics.
    pub fn stats(&self) -> FramerStats {
        self.stats
    }

    fn discard(&mut self, count: usize) {
        self.buffer.drain(..count);
        self.stats.discarded_bytes += count as u64;
    }
}

/// Lazy iterator over the packets made available by [`PacketFramer::push`].
pub struct Frames<'a> {
    framer: &'a mut PacketFramer,
}

impl Iterator for Frames<'_> {
    type Item = Packet;

    fn next(&mut self) -> Option<Self::Item> {
        self.framer.next_packet()
    }
}

fn find_header(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(PACKET_HEADER.len())
        .position(|window| window == PACKET_HEADER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(seed: u16) -> Packet {
        Packet::encode([seed, seed + 1, seed + 2, seed + 3], (seed % 16) as u8)
    }

    fn with_type(packet: Packet, packet_type: u8) -> Vec<u8> {
        let mut bytes = packet.as_bytes().to_vec();
        bytes[11] = packet_type;
        bytes
    }

    #[test]
    fn yields_packets_surrounded_by_garbage_in_order() {
        let packets = [sample(100), sample(200), sample(300)];
        let mut stream = vec![0x00, 0x13, 0xBB, 0x01, 0x42];
        stream.extend_from_slice(packets[0].as_bytes());
        stream.extend_from_slice(&[0x55, 0x66]);
        stream.extend_from_slice(packets[1].as_bytes());
        stream.extend_from_slice(packets[2].as_bytes());
        stream.extend_from_slice(&[0x01, 0x02, 0x03]);

        let mut framer = PacketFramer::new();
        let framed: Vec<Packet> = framer.push(&stream).collect();

        assert_eq!(framed, packets.to_vec());
        assert_eq!(framer.stats().accepted, 3);
        assert_eq!(framer.stats().rejected, 0);
    }

    #[test]
    fn reassembles_packets_fed_one_byte_at_a_time() {
        let packets = [sample(7), sample(9)];
        let mut stream = vec![0x10, 0x20];
        for packet in &packets {
            stream.extend_from_slice(packet.as_bytes());
            stream.push(0x33);
        }

        let mut framer = PacketFramer::new();
        let mut framed = Vec::new();
        for byte in stream {
            framed.extend(framer.push(&[byte]));
        }

        assert_eq!(framed, packets.to_vec());
    }

    #[test]
    fn drops_candidates_with_wrong_type_byte() {
        let mut stream = with_type(sample(1), 0x03);
        stream.extend_from_slice(sample(2).as_bytes());

        let mut framer = PacketFramer::new();
        let framed: Vec<Packet> = framer.push(&stream).collect();

        assert_eq!(framed, vec![sample(2)]);
        assert_eq!(framer.stats().rejected, 1);
    }

    #[test]
    fn keeps_only_a_possible_header_prefix_when_no_header_found() {
        let mut framer = PacketFramer::new();
        let mut noise = vec![0x11; 40];
        noise.extend_from_slice(&[0xAA, 0xBB]);

        assert_eq!(framer.push(&noise).count(), 0);
        assert_eq!(framer.buffered(), 2);

        let mut rest = vec![0x01];
        rest.extend_from_slice(&sample(5).as_bytes()[3..]);
        let framed: Vec<Packet> = framer.push(&rest).collect();

        assert_eq!(framed, vec![sample(5)]);
    }

    #[test]
    fn waits_for_remaining_bytes_of_a_partial_packet() {
        let packet = sample(11);
        let mut framer = PacketFramer::new();
        let mut stream = vec![0x44; 5];
        stream.extend_from_slice(&packet.as_bytes()[..20]);

        assert_eq!(framer.push(&stream).count(), 0);
        let framed: Vec<Packet> = framer.push(&packet.as_bytes()[20..]).collect();
        assert_eq!(framed, vec![packet]);
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn reset_discards_partial_data() {
        let packet = sample(3);
        let mut framer = PacketFramer::new();
        assert_eq!(framer.push(&packet.as_bytes()[..10]).count(), 0);

        framer.reset();
        assert_eq!(framer.buffered(), 0);

        let framed: Vec<Packet> = framer.push(packet.as_bytes()).collect();
        assert_eq!(framed, vec![packet]);
    }
}
