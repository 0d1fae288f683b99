use std::time::Duration;

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    device::detector::KickEvent,
    state::roster::{Channel, Group, Player},
};

/// Fixed step of the match clock.
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);
const TICK_MS: i32 = 50;
const WRAP_MS: u16 = 950;

/// Lifecycle of one timed round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Nothing prepared yet since the station started or a group was selected from idle.
    Idle,
    /// Scores cleared and clock armed; waiting for the start request.
    Prepared,
    /// The countdown cue is playing; kicks do not count yet.
    CountingDown,
    /// The clock runs and kicks are scored.
    Playing,
    /// The round ended, manually or because the clock expired.
    Stopped,
}

impl MatchStatus {
    fn is_active(self) -> bool {
        matches!(self, MatchStatus::CountingDown | MatchStatus::Playing)
    }
}

/// Remaining time as whole seconds plus a sub-second part in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct MatchClock {
    /// Whole seconds left.
    pub seconds: u32,
    /// Milliseconds left within the current second (0..=999).
    pub millis: u16,
}

impl MatchClock {
    /// A clock armed with a full duration.
    pub fn full(duration_secs: u32) -> Self {
        Self {
            seconds: duration_secs,
            millis: 0,
        }
    }

    /// Clock showing no time left.
    pub const ZERO: MatchClock = MatchClock {
        seconds: 0,
        millis: 0,
    };

    /// Whether the clock reached zero.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

/// Direction used when stepping through groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupDirection {
    /// The following group.
    Next,
    /// The preceding group.
    Previous,
}

/// Side effects a transition asks collaborators to perform (audio sink, presentation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "cue", rename_all = "snake_case")]
pub enum MatchCue {
    /// Play the countdown jingle; report back once it finished.
    Countdown,
    /// Start the background music.
    StartAmbient,
    /// Halt the background music.
    StopAmbient,
    /// The clock ran out.
    TimerExpired,
    /// A different group became active.
    GroupChanged {
        /// Index of the newly active group.
        index: usize,
    },
}

/// A kick that counted, with the player's updated match score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredKick {
    /// Channel the kick landed on.
    pub channel: Channel,
    /// Remote identifier of the player on that channel.
    pub player_id: u32,
    /// The player's score after this kick.
    pub score: u32,
}

/// Result of applying a transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    /// Whether any state changed; `false` marks a documented no-op.
    pub changed: bool,
    /// Side effects requested by the transition, in emission order.
    pub cues: Vec<MatchCue>,
}

impl Transition {
    fn noop() -> Self {
        Self::default()
    }

    fn changed(cues: Vec<MatchCue>) -> Self {
        Self {
            changed: true,
            cues,
        }
    }
}

/// Static parameters a match starts from.
#[derive(Debug, Clone)]
pub struct MatchSettings {
    /// Round length in whole seconds.
    pub duration_secs: u32,
    /// Software difficulty (threshold = difficulty * 20).
    pub difficulty: u16,
    /// Hardware sensitivity last sent to the controller.
    pub force_threshold: u8,
    /// Whether clock expiry advances to the next group.
    pub auto_advance: bool,
    /// Ordered groups; an empty list falls back to a single placeholder group.
    pub groups: Vec<Group>,
    /// Offset applied to channel numbers for placeholder player ids.
    pub player_id_offset: u32,
}

/// Read-only view of the match handed to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSnapshot {
    /// Current lifecycle status.
    pub status: MatchStatus,
    /// Remaining time.
    pub clock: MatchClock,
    /// Configured round length.
    pub duration_secs: u32,
    /// Software difficulty.
    pub difficulty: u16,
    /// Hardware sensitivity.
    pub force_threshold: u8,
    /// Active roster with scores.
    pub players: Vec<Player>,
    /// Index of the active group.
    pub current_group: usize,
    /// Number of configured groups.
    pub group_count: usize,
    /// Whether expiry advances groups automatically.
    pub auto_advance: bool,
    /// Incremented on every state change.
    pub version: u64,
}

/// State machine owning the match lifecycle, the clock and the active roster.
///
/// Every operation is total: it either performs its transition or is a no-op reported through
/// [`Transition::changed`].
#[derive(Debug, Clone)]
pub struct MatchStateMachine {
    status: MatchStatus,
    clock: MatchClock,
    duration_secs: u32,
    difficulty: u16,
    force_threshold: u8,
    auto_advance: bool,
    groups: Vec<Group>,
    current_group: usize,
    active: Group,
    version: u64,
}

impl MatchStateMachine {
    /// Create a machine in [`MatchStatus::Idle`] with the first group active.
    pub fn new(settings: MatchSettings) -> Self {
        let groups = if settings.groups.is_empty() {
            vec![Group::placeholder(settings.player_id_offset)]
        } else {
            settings.groups
        };
        let active = groups[0].with_cleared_scores();

        Self {
            status: MatchStatus::Idle,
            clock: MatchClock::full(settings.duration_secs),
            duration_secs: settings.duration_secs,
            difficulty: settings.difficulty,
            force_threshold: settings.force_threshold,
            auto_advance: settings.auto_advance,
            groups,
            current_group: 0,
            active,
            version: 0,
        }
    }

    /// Current lifecycle status.
    pub fn status(&self) -> MatchStatus {
        self.status
    }

    /// Remaining time.
    pub fn clock(&self) -> MatchClock {
        self.clock
    }

    /// Software difficulty.
    pub fn difficulty(&self) -> u16 {
        self.difficulty
    }

    /// Capture an immutable view of the current state.
    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            status: self.status,
            clock: self.clock,
            duration_secs: self.duration_secs,
            difficulty: self.difficulty,
            force_threshold: self.force_threshold,
            players: self.active.players.clone(),
            current_group: self.current_group,
            group_count: self.groups.len(),
            auto_advance: self.auto_advance,
            version: self.version,
        }
    }

    /// Clear scores, arm the clock and wait for a start request. Valid from any state.
    pub fn prepare(&mut self) -> Transition {
        let mut cues = Vec::new();
        if self.status.is_active() {
            cues.push(MatchCue::StopAmbient);
        }

        self.active = self.active.with_cleared_scores();
        self.clock = MatchClock::full(self.duration_secs);
        self.status = MatchStatus::Prepared;
        self.bump();
        Transition::changed(cues)
    }

    /// Start the countdown from `Prepared`, or skip the rest of a running countdown.
    ///
    /// No-op from `Idle`, `Playing` and `Stopped`.
    pub fn request_start(&mut self) -> Transition {
        match self.status {
            MatchStatus::Prepared => {
                self.status = MatchStatus::CountingDown;
                self.bump();
                Transition::changed(vec![MatchCue::Countdown])
            }
            MatchStatus::CountingDown => self.begin_play(),
            MatchStatus::Idle | MatchStatus::Playing | MatchStatus::Stopped => Transition::noop(),
        }
    }

    /// The countdown cue finished playing. No-op unless counting down.
    pub fn countdown_finished(&mut self) -> Transition {
        match self.status {
            MatchStatus::CountingDown => self.begin_play(),
            _ => Transition::noop(),
        }
    }

    /// End the round early. No-op unless counting down or playing.
    pub fn stop(&mut self) -> Transition {
        if !self.status.is_active() {
            return Transition::noop();
        }
        self.status = MatchStatus::Stopped;
        self.bump();
        Transition::changed(vec![MatchCue::StopAmbient])
    }

    /// Advance the clock by one 50ms step. No-op unless playing.
    pub fn tick(&mut self) -> Transition {
        if self.status != MatchStatus::Playing {
            return Transition::noop();
        }

        let mut seconds = i64::from(self.clock.seconds);
        let mut millis = i32::from(self.clock.millis) - TICK_MS;
        if millis < 0 {
            millis = i32::from(WRAP_MS);
            seconds -= 1;
        }

        if seconds < 0 || (seconds == 0 && millis == 0) {
            return self.expire();
        }

        self.clock = MatchClock {
            seconds: seconds as u32,
            millis: millis as u16,
        };
        self.bump();
        Transition::changed(Vec::new())
    }

    /// Step to the neighbouring group. No-op at either end of the list.
    pub fn advance_group(&mut self, direction: GroupDirection) -> Transition {
        let target = match direction {
            GroupDirection::Next => self.current_group.checked_add(1),
            GroupDirection::Previous => self.current_group.checked_sub(1),
        };
        match target {
            Some(index) => self.select_group(index),
            None => Transition::noop(),
        }
    }

    /// Make `index` the active group, resetting the clock and leaving any running round.
    ///
    /// Lands in `Idle` when nothing was prepared yet, in `Stopped` otherwise; the caller must
    /// `prepare` again before starting. No-op for an out-of-range index.
    pub fn select_group(&mut self, index: usize) -> Transition {
        let Some(group) = self.groups.get(index) else {
            return Transition::noop();
        };

        let mut cues = Vec::new();
        if self.status.is_active() {
            cues.push(MatchCue::StopAmbient);
        }

        self.active = group.with_cleared_scores();
        self.current_group = index;
        self.clock = MatchClock::full(self.duration_secs);
        if self.status != MatchStatus::Idle {
            self.status = MatchStatus::Stopped;
        }
        self.bump();
        cues.push(MatchCue::GroupChanged { index });
        Transition::changed(cues)
    }

    /// Count a kick for the player on its channel. Dropped unless playing.
    pub fn apply_kick(&mut self, kick: &KickEvent) -> Option<ScoredKick> {
        if self.status != MatchStatus::Playing {
            return None;
        }

        let player = self.active.player_mut(kick.channel)?;
        player.score += 1;
        let scored = ScoredKick {
            channel: kick.channel,
            player_id: player.id,
            score: player.score,
        };
        self.bump();
        Some(scored)
    }

    /// Undo a kick previously returned by [`Self::apply_kick`] that could not be persisted.
    pub fn revoke_kick(&mut self, scored: &ScoredKick) {
        if let Some(player) = self.active.player_mut(scored.channel) {
            if player.id == scored.player_id {
                player.score = player.score.saturating_sub(1);
                self.bump();
            }
        }
    }

    /// Change the round length; the clock is re-armed unless a round is running.
    pub fn set_duration(&mut self, duration_secs: u32) -> Transition {
        self.duration_secs = duration_secs;
        if !self.status.is_active() {
            self.clock = MatchClock::full(duration_secs);
        }
        self.bump();
        Transition::changed(Vec::new())
    }

    /// Change the software difficulty.
    pub fn set_difficulty(&mut self, difficulty: u16) -> Transition {
        self.difficulty = difficulty;
        self.bump();
        Transition::changed(Vec::new())
    }

    /// Record the hardware sensitivity sent to the controller.
    pub fn set_force_threshold(&mut self, threshold: u8) -> Transition {
        self.force_threshold = threshold;
        self.bump();
        Transition::changed(Vec::new())
    }

    /// Toggle automatic group advance on expiry.
    pub fn set_auto_advance(&mut self, enabled: bool) -> Transition {
        self.auto_advance = enabled;
        self.bump();
        Transition::changed(Vec::new())
    }

    /// Rename the player on `channel` in the active group and its stored roster.
    pub fn rename_player(&mut self, channel: Channel, name: String) -> Transition {
        let Some(player) = self.active.player_mut(channel) else {
            return Transition::noop();
        };
        player.name = name.clone();
        if let Some(stored) = self
            .groups
            .get_mut(self.current_group)
            .and_then(|group| group.player_mut(channel))
        {
            stored.name = name;
        }
        self.bump();
        Transition::changed(Vec::new())
    }

    fn begin_play(&mut self) -> Transition {
        self.status = MatchStatus::Playing;
        self.bump();
        Transition::changed(vec![MatchCue::StartAmbient])
    }

    fn expire(&mut self) -> Transition {
        self.clock = MatchClock::ZERO;
        let mut cues = vec![MatchCue::TimerExpired];

        if self.auto_advance {
            let advanced = self.advance_group(GroupDirection::Next);
            cues.extend(
                advanced
                    .cues
                    .into_iter()
                    .filter(|cue| *cue != MatchCue::StopAmbient),
            );
        }

        self.status = MatchStatus::Stopped;
        cues.push(MatchCue::StopAmbient);
        self.bump();
        Transition::changed(cues)
    }

    fn bump(&mut self) {
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;

    fn settings(duration_secs: u32, groups: usize) -> MatchSettings {
        MatchSettings {
            duration_secs,
            difficulty: 10,
            force_threshold: 100,
            auto_advance: false,
            groups: (0..groups)
                .map(|g| Group::from_names(["a", "b", "c", "d"].map(|n| format!("{n}{g}")), 0))
                .collect(),
            player_id_offset: 0,
        }
    }

    fn kick(channel: u8) -> KickEvent {
        KickEvent {
            channel: Channel::new(channel).unwrap(),
            force: 500,
            observed_at: Instant::now(),
        }
    }

    fn playing(sm: &mut MatchStateMachine) {
        sm.prepare();
        sm.request_start();
        sm.countdown_finished();
        assert_eq!(sm.status(), MatchStatus::Playing);
    }

    #[test]
    fn starts_idle_with_full_clock() {
        let sm = MatchStateMachine::new(settings(30, 2));
        assert_eq!(sm.status(), MatchStatus::Idle);
        assert_eq!(sm.clock(), MatchClock::full(30));
    }

    #[test]
    fn countdown_flow_emits_cues() {
        let mut sm = MatchStateMachine::new(settings(10, 1));

        assert!(sm.prepare().changed);
        assert_eq!(sm.request_start().cues, vec![MatchCue::Countdown]);
        assert_eq!(sm.status(), MatchStatus::CountingDown);
        assert_eq!(sm.countdown_finished().cues, vec![MatchCue::StartAmbient]);
        assert_eq!(sm.status(), MatchStatus::Playing);
        assert!(!sm.request_start().changed);
        assert_eq!(sm.stop().cues, vec![MatchCue::StopAmbient]);
        assert_eq!(sm.status(), MatchStatus::Stopped);
    }

    #[test]
    fn start_request_during_countdown_skips_to_playing() {
        let mut sm = MatchStateMachine::new(settings(10, 1));
        sm.prepare();
        sm.request_start();

        assert_eq!(sm.request_start().cues, vec![MatchCue::StartAmbient]);
        assert_eq!(sm.status(), MatchStatus::Playing);
    }

    #[test]
    fn start_requires_prepare() {
        let mut sm = MatchStateMachine::new(settings(10, 1));
        assert!(!sm.request_start().changed);
        assert!(!sm.countdown_finished().changed);
        assert!(!sm.stop().changed);
        assert_eq!(sm.status(), MatchStatus::Idle);
    }

    #[test]
    fn ten_second_round_expires_on_the_200th_tick() {
        let mut sm = MatchStateMachine::new(settings(10, 1));
        playing(&mut sm);

        for tick in 1..200 {
            sm.tick();
            assert_eq!(sm.status(), MatchStatus::Playing, "tick {tick}");
        }
        assert_eq!(
            sm.clock(),
            MatchClock {
                seconds: 0,
                millis: 50
            }
        );

        let last = sm.tick();
        assert_eq!(sm.clock(), MatchClock::ZERO);
        assert_eq!(sm.status(), MatchStatus::Stopped);
        assert_eq!(
            last.cues,
            vec![MatchCue::TimerExpired, MatchCue::StopAmbient]
        );
        assert!(!sm.tick().changed);
    }

    #[test]
    fn first_tick_wraps_sub_seconds() {
        let mut sm = MatchStateMachine::new(settings(3, 1));
        playing(&mut sm);

        sm.tick();
        assert_eq!(
            sm.clock(),
            MatchClock {
                seconds: 2,
                millis: 950
            }
        );
    }

    #[test]
    fn kicks_only_count_while_playing() {
        let mut sm = MatchStateMachine::new(settings(10, 1));

        assert!(sm.apply_kick(&kick(1)).is_none());
        sm.prepare();
        assert!(sm.apply_kick(&kick(1)).is_none());
        sm.request_start();
        assert!(sm.apply_kick(&kick(1)).is_none());
        sm.countdown_finished();

        let scored = sm.apply_kick(&kick(2)).unwrap();
        assert_eq!(scored.player_id, 2);
        assert_eq!(scored.score, 1);

        sm.stop();
        assert!(sm.apply_kick(&kick(2)).is_none());
        let scores: Vec<u32> = sm.snapshot().players.iter().map(|p| p.score).collect();
        assert_eq!(scores, vec![0, 1, 0, 0]);
    }

    #[test]
    fn prepare_clears_scores_and_rearms_clock() {
        let mut sm = MatchStateMachine::new(settings(5, 1));
        playing(&mut sm);
        sm.apply_kick(&kick(1));
        sm.tick();

        sm.prepare();
        let snapshot = sm.snapshot();
        assert_eq!(snapshot.status, MatchStatus::Prepared);
        assert_eq!(snapshot.clock, MatchClock::full(5));
        assert!(snapshot.players.iter().all(|p| p.score == 0));
    }

    #[test]
    fn advance_is_bounded_and_resets_play() {
        let mut sm = MatchStateMachine::new(settings(10, 2));
        playing(&mut sm);
        sm.tick();

        let moved = sm.advance_group(GroupDirection::Next);
        assert!(moved.changed);
        assert_eq!(
            moved.cues,
            vec![MatchCue::StopAmbient, MatchCue::GroupChanged { index: 1 }]
        );
        let snapshot = sm.snapshot();
        assert_eq!(snapshot.current_group, 1);
        assert_eq!(snapshot.status, MatchStatus::Stopped);
        assert_eq!(snapshot.clock, MatchClock::full(10));
        assert_eq!(snapshot.players[0].name, "a1");

        let version = sm.snapshot().version;
        assert!(!sm.advance_group(GroupDirection::Next).changed);
        assert_eq!(sm.snapshot().version, version);
        assert_eq!(sm.snapshot().current_group, 1);

        assert!(sm.advance_group(GroupDirection::Previous).changed);
        assert!(!sm.advance_group(GroupDirection::Previous).changed);
        assert_eq!(sm.snapshot().current_group, 0);
    }

    #[test]
    fn selecting_from_idle_stays_idle() {
        let mut sm = MatchStateMachine::new(settings(10, 3));
        sm.select_group(2);
        assert_eq!(sm.status(), MatchStatus::Idle);
        assert!(!sm.select_group(3).changed);
    }

    #[test]
    fn expiry_with_auto_advance_moves_to_next_group() {
        let mut config = settings(1, 2);
        config.auto_advance = true;
        let mut sm = MatchStateMachine::new(config);
        playing(&mut sm);

        let mut last = Transition::default();
        for _ in 0..20 {
            last = sm.tick();
        }

        assert_eq!(sm.status(), MatchStatus::Stopped);
        assert_eq!(sm.snapshot().current_group, 1);
        assert_eq!(sm.clock(), MatchClock::full(1));
        assert_eq!(
            last.cues,
            vec![
                MatchCue::TimerExpired,
                MatchCue::GroupChanged { index: 1 },
                MatchCue::StopAmbient
            ]
        );
    }

    #[test]
    fn rename_updates_stored_roster() {
        let mut sm = MatchStateMachine::new(settings(10, 2));
        sm.rename_player(Channel::new(3).unwrap(), "Zoe".into());
        sm.advance_group(GroupDirection::Next);
        sm.advance_group(GroupDirection::Previous);

        assert_eq!(sm.snapshot().players[2].name, "Zoe");
    }

    #[test]
    fn revoke_undoes_a_kick() {
        let mut sm = MatchStateMachine::new(settings(10, 1));
        playing(&mut sm);
        let scored = sm.apply_kick(&kick(4)).unwrap();

        sm.revoke_kick(&scored);
        assert_eq!(sm.snapshot().players[3].score, 0);
    }
}
