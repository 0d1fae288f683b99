//! Wire formats exchanged with the kick-pad controller.
//!
//! Inbound sensor packets are fixed 28-byte frames:
//!
//! ```text
//! offset  0..=2   header AA BB 01
//! offset  3..=10  four big-endian u16 forces (channel N at 3 + 2 * (N - 1))
//! offset 11       packet type, 0x02 for sensor readings
//! offset 12       trigger bitmask (bit 0 = channel 1 .. bit 3 = channel 4)
//! offset 13..=27  unused by this station
//! ```
//!
//! Outbound control packets are fixed 10-byte frames setting the hardware-side sensitivity.

use crate::state::roster::Channel;

/// Length of every sensor packet.
pub const PACKET_LEN: usize = 28;
/// Three-byte sync header opening every sensor packet.
pub const PACKET_HEADER: [u8; 3] = [0xAA, 0xBB, 0x01];
/// Packet type value carried by sensor readings.
pub const SENSOR_PACKET_TYPE: u8 = 0x02;

const FORCE_OFFSET: usize = 3;
const TYPE_OFFSET: usize = 11;
const TRIGGER_OFFSET: usize = 12;

/// Length of the outbound control packet.
pub const CONTROL_PACKET_LEN: usize = 10;
const CONTROL_THRESHOLD_OFFSET: usize = 7;

/// A validated 28-byte sensor packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    bytes: [u8; PACKET_LEN],
}

impl Packet {
    /// Validate a candidate frame, returning `None` when the header or type byte is wrong.
    pub fn parse(bytes: [u8; PACKET_LEN]) -> Option<Self> {
        if bytes[..PACKET_HEADER.len()] != PACKET_HEADER {
            return None;
        }
        if bytes[TYPE_OFFSET] != SENSOR_PACKET_TYPE {
            return None;
        }
        Some(Self { bytes })
    }

    /// Raw bytes of the frame.
    pub fn as_bytes(&self) -> &[u8; PACKET_LEN] {
        &self.bytes
    }

    /// Force magnitude reported for `channel`, decoded as `(high << 8) | low`.
    pub fn force(&self, channel: Channel) -> u16 {
        let offset = FORCE_OFFSET + 2 * channel.index();
        u16::from_be_bytes([self.bytes[offset], self.bytes[offset + 1]])
    }

    /// Raw trigger bitmask byte.
    pub fn trigger_flags(&self) -> u8 {
        self.bytes[TRIGGER_OFFSET]
    }

    /// Whether the controller flagged `channel` as struck in this frame.
    pub fn is_triggered(&self, channel: Channel) -> bool {
        let mask = channel.mask();
        self.trigger_flags() & mask == mask
    }

    /// Build a sensor packet from per-channel forces and a trigger mask.
    ///
    /// Simulated strikes (`device_service::test_hit`) are built this way; real frames come
    /// from the framer.
    pub fn encode(forces: [u16; 4], trigger_flags: u8) -> Self {
        let mut bytes = [0u8; PACKET_LEN];
        bytes[..PACKET_HEADER.len()].copy_from_slice(&PACKET_HEADER);
        for (index, force) in forces.iter().enumerate() {
            let offset = FORCE_OFFSET + 2 * index;
            bytes[offset..offset + 2].copy_from_slice(&force.to_be_bytes());
        }
        bytes[TYPE_OFFSET] = SENSOR_PACKET_TYPE;
        bytes[TRIGGER_OFFSET] = trigger_flags;
        Self { bytes }
    }
}

/// Outbound frame adjusting the controller's hardware sensitivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlPacket {
    bytes: [u8; CONTROL_PACKET_LEN],
}

impl ControlPacket {
    /// Encode a "set sensitivity" command for the given threshold.
    pub const fn force_threshold(threshold: u8) -> Self {
        let mut bytes = [0xAA, 0xBB, 0x00, 0x34, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00];
        bytes[CONTROL_THRESHOLD_OFFSET] = threshold;
        Self { bytes }
    }

    /// Threshold value carried by the frame.
    pub fn threshold(&self) -> u8 {
        self.bytes[CONTROL_THRESHOLD_OFFSET]
    }

    /// Bytes to write to the device.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(n: u8) -> Channel {
        Channel::new(n).unwrap()
    }

    #[test]
    fn decodes_big_endian_forces_per_channel() {
        let packet = Packet::encode([0x0102, 0x0304, 0x00FF, 0xFF00], 0b1010);

        assert_eq!(packet.force(channel(1)), 0x0102);
        assert_eq!(packet.force(channel(2)), 0x0304);
        assert_eq!(packet.force(channel(3)), 0x00FF);
        assert_eq!(packet.force(channel(4)), 0xFF00);
        assert_eq!(packet.as_bytes()[3], 0x01);
        assert_eq!(packet.as_bytes()[4], 0x02);
    }

    #[test]
    fn trigger_bits_map_to_channels() {
        let packet = Packet::encode([0; 4], 0b1010);

        assert!(!packet.is_triggered(channel(1)));
        assert!(packet.is_triggered(channel(2)));
        assert!(!packet.is_triggered(channel(3)));
        assert!(packet.is_triggered(channel(4)));
    }

    #[test]
    fn rejects_wrong_type_or_header() {
        let mut bytes = *Packet::encode([1, 2, 3, 4], 0x0F).as_bytes();
        assert!(Packet::parse(bytes).is_some());

        bytes[11] = 0x03;
        assert!(Packet::parse(bytes).is_none());

        let mut bytes = *Packet::encode([1, 2, 3, 4], 0x0F).as_bytes();
        bytes[2] = 0x00;
        assert!(Packet::parse(bytes).is_none());
    }

    #[test]
    fn control_packet_layout() {
        let packet = ControlPacket::force_threshold(0x64);
        assert_eq!(
            packet.as_bytes(),
            &[0xAA, 0xBB, 0x00, 0x34, 0x00, 0x02, 0x00, 0x64, 0x00, 0x00]
        );
        assert_eq!(packet.threshold(), 100);
    }
}
