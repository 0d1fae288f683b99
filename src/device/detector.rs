//! Threshold and debounce stage turning sensor packets into discrete kicks.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::packet::Packet;
use crate::state::roster::{CHANNEL_COUNT, Channel};

/// Default minimum spacing between two accepted kicks on one channel.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(80);
/// Default software difficulty (threshold 200).
pub const DEFAULT_DIFFICULTY: u16 = 10;
/// Scale applied to the difficulty to obtain the force threshold.
pub const DIFFICULTY_SCALE: u32 = 20;

/// A single accepted strike on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KickEvent {
    /// Channel the strike was registered on.
    pub channel: Channel,
    /// Force magnitude reported by the sensor.
    pub force: u16,
    /// Monotonic time the packet carrying the strike was processed.
    #[serde(skip)]
    pub observed_at: Instant,
}

/// Runtime-adjustable detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorSettings {
    /// Difficulty level; the force threshold is `difficulty * 20`.
    pub difficulty: u16,
    /// Minimum spacing between accepted kicks on one channel.
    pub debounce: Duration,
}

impl DetectorSettings {
    /// Force a reading must strictly exceed to count.
    pub fn threshold(&self) -> u32 {
        u32::from(self.difficulty) * DIFFICULTY_SCALE
    }
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Per-channel kick detector.
///
/// Owns the debounce state exclusively; nothing outside reads or mutates it.
#[derive(Debug, Clone)]
pub struct KickDetector {
    settings: DetectorSettings,
    last_accepted: [Option<Instant>; CHANNEL_COUNT],
}

impl KickDetector {
    /// Create a detector with the given settings and no kick history.
    pub fn new(settings: DetectorSettings) -> Self {
        Self {
            settings,
            last_accepted: [None; CHANNEL_COUNT],
        }
    }

    /// Current detection settings.
    pub fn settings(&self) -> DetectorSettings {
        self.settings
    }

    /// Replace the settings; applies from the next packet on.
    pub fn set_settings(&mut self, settings: DetectorSettings) {
        debug!(
            difficulty = settings.difficulty,
            debounce_ms = settings.debounce.as_millis() as u64,
            "kick detector settings updated"
        );
        self.settings = settings;
    }

    /// Forget every channel's kick history.
    pub fn reset(&mut self) {
        self.last_accepted = [None; CHANNEL_COUNT];
    }

    /// Evaluate all four channels of `packet` as one step observed at `now`.
    pub fn process(&mut self, packet: &Packet, now: Instant) -> Vec<KickEvent> {
        let threshold = self.settings.threshold();
        let debounce = self.settings.debounce;

        Channel::ALL
            .into_iter()
            .filter_map(|channel| {
                let force = packet.force(channel);
                if !packet.is_triggered(channel) || u32::from(force) <= threshold {
                    return None;
                }

                let slot = &mut self.last_accepted[channel.index()];
                if let Some(last) = *slot {
                    if now.saturating_duration_since(last) <= debounce {
                        trace!(%channel, force, "kick suppressed by debounce");
                        return None;
                    }
                }

                *slot = Some(now);
                Some(KickEvent {
                    channel,
                    force,
                    observed_at: now,
                })
            })
            .collect()
    }
}

impl Default for KickDetector {
    fn default() -> Self {
        Self::new(DetectorSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(forces: [u16; 4], flags: u8) -> Packet {
        Packet::encode(forces, flags)
    }

    #[test]
    fn force_equal_to_threshold_does_not_trigger() {
        let mut detector = KickDetector::default();
        let now = Instant::now();

        assert!(detector.process(&packet([200, 0, 0, 0], 0b0001), now).is_empty());

        let kicks = detector.process(&packet([201, 0, 0, 0], 0b0001), now);
        assert_eq!(kicks.len(), 1);
        assert_eq!(kicks[0].channel, Channel::ALL[0]);
        assert_eq!(kicks[0].force, 201);
    }

    #[test]
    fn requires_trigger_bit() {
        let mut detector = KickDetector::default();
        let kicks = detector.process(&packet([0, 900, 900, 0], 0b0100), Instant::now());

        assert_eq!(kicks.len(), 1);
        assert_eq!(kicks[0].channel, Channel::ALL[2]);
    }

    #[test]
    fn debounce_collapses_close_frames() {
        let mut detector = KickDetector::default();
        let start = Instant::now();
        let frame = packet([500, 0, 0, 0], 0b0001);

        assert_eq!(detector.process(&frame, start).len(), 1);
        assert!(
            detector
                .process(&frame, start + Duration::from_millis(10))
                .is_empty()
        );

        let mut detector = KickDetector::default();
        assert_eq!(detector.process(&frame, start).len(), 1);
        assert_eq!(
            detector
                .process(&frame, start + Duration::from_millis(90))
                .len(),
            1
        );
    }

    #[test]
    fn window_boundary_is_exclusive() {
        let mut detector = KickDetector::default();
        let start = Instant::now();
        let frame = packet([500, 0, 0, 0], 0b0001);

        detector.process(&frame, start);
        assert!(
            detector
                .process(&frame, start + Duration::from_millis(80))
                .is_empty()
        );
        assert_eq!(
            detector
                .process(&frame, start + Duration::from_millis(81))
                .len(),
            1
        );
    }

    #[test]
    fn channels_debounce_independently() {
        let mut detector = KickDetector::default();
        let start = Instant::now();

        let first = detector.process(&packet([500, 0, 0, 0], 0b0001), start);
        let second = detector.process(
            &packet([500, 500, 0, 0], 0b0011),
            start + Duration::from_millis(5),
        );

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].channel, Channel::ALL[1]);
    }

    #[test]
    fn settings_change_applies_to_next_packet() {
        let mut detector = KickDetector::default();
        let frame = packet([300, 0, 0, 0], 0b0001);
        let now = Instant::now();

        detector.set_settings(DetectorSettings {
            difficulty: 20,
            debounce: DEFAULT_DEBOUNCE,
        });
        assert!(detector.process(&frame, now).is_empty());

        detector.set_settings(DetectorSettings {
            difficulty: 14,
            debounce: DEFAULT_DEBOUNCE,
        });
        assert_eq!(detector.process(&frame, now).len(), 1);
    }
}
