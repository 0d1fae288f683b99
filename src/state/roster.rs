use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of sensor channels (and player positions) on one station.
pub const CHANNEL_COUNT: usize = 4;

/// One of the four physical sensor inputs, numbered 1 to 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Channel(u8);

impl Channel {
    /// Every channel in evaluation order.
    pub const ALL: [Channel; CHANNEL_COUNT] = [Channel(1), Channel(2), Channel(3), Channel(4)];

    /// Build a channel from its 1-based number.
    pub fn new(number: u8) -> Option<Self> {
        (1..=CHANNEL_COUNT as u8)
            .contains(&number)
            .then_some(Self(number))
    }

    /// 1-based channel number.
    pub fn number(self) -> u8 {
        self.0
    }

    /// 0-based position, used for roster slots and packet offsets.
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    /// Bit of the trigger byte flagging this channel.
    pub fn mask(self) -> u8 {
        1 << (self.0 - 1)
    }
}

impl TryFrom<u8> for Channel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Channel::new(value).ok_or_else(|| format!("channel must be between 1 and 4, got {value}"))
    }
}

impl From<Channel> for u8 {
    fn from(value: Channel) -> Self {
        value.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Player occupying one channel of the active group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Identifier of the player in the remote leaderboard.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Kicks scored during the current match.
    pub score: u32,
}

/// Ordered roster of up to four players competing together in one timed round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Players indexed by channel position; shorter rosters leave trailing channels idle.
    pub players: Vec<Player>,
}

impl Group {
    /// Build a group from display names, deriving remote ids as `channel + id_offset`.
    pub fn from_names<I, S>(names: I, id_offset: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let players = names
            .into_iter()
            .take(CHANNEL_COUNT)
            .enumerate()
            .map(|(index, name)| Player {
                id: index as u32 + 1 + id_offset,
                name: name.into(),
                score: 0,
            })
            .collect();
        Self { players }
    }

    /// Placeholder group used before any roster is configured.
    pub fn placeholder(id_offset: u32) -> Self {
        Self::from_names(
            (1..=CHANNEL_COUNT).map(|n| format!("Player {n}")),
            id_offset,
        )
    }

    /// Player mapped to `channel`, if that position is occupied.
    pub fn player(&self, channel: Channel) -> Option<&Player> {
        self.players.get(channel.index())
    }

    /// Mutable access to the player mapped to `channel`.
    pub fn player_mut(&mut self, channel: Channel) -> Option<&mut Player> {
        self.players.get_mut(channel.index())
    }

    /// Copy of the roster with every score reset to zero.
    pub fn with_cleared_scores(&self) -> Self {
        let players = self
            .players
            .iter()
            .cloned()
            .map(|player| Player { score: 0, ..player })
            .collect();
        Self { players }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_bounds_and_masks() {
        assert!(Channel::new(0).is_none());
        assert!(Channel::new(5).is_none());
        let masks: Vec<u8> = Channel::ALL.iter().map(|c| c.mask()).collect();
        assert_eq!(masks, vec![1, 2, 4, 8]);
    }

    #[test]
    fn group_ids_follow_station_offset() {
        let group = Group::from_names(["Ana", "Bo", "Cy", "Di", "Extra"], 4);
        let ids: Vec<u32> = group.players.iter().map(|p| p.id).collect();

        assert_eq!(ids, vec![5, 6, 7, 8]);
        assert_eq!(group.player(Channel::ALL[1]).map(|p| p.name.as_str()), Some("Bo"));
    }
}
