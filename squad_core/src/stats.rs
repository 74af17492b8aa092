use squad_schema::{EventKind, MatchEvent, PlayerStats, Timestamp};

use crate::{
    error::Result,
    store::{ScopedStore, StorageKey},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatCounter {
    Goals,
    Assists,
    Saves,
    Fouls,
    Cards,
    MatchesPlayed,
}

impl StatCounter {
    pub const ALL: [StatCounter; 6] = [
        StatCounter::Goals,
        StatCounter::Assists,
        StatCounter::Saves,
        StatCounter::Fouls,
        StatCounter::Cards,
        StatCounter::MatchesPlayed,
    ];

    pub fn for_kind(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::Goal => Some(Self::Goals),
            EventKind::Assist => Some(Self::Assists),
            EventKind::Save => Some(Self::Saves),
            EventKind::Foul => Some(Self::Fouls),
            EventKind::Card => Some(Self::Cards),
            EventKind::Appearance => Some(Self::MatchesPlayed),
            EventKind::Substitution | EventKind::Other => None,
        }
    }

    fn slot(self, stats: &mut PlayerStats) -> &mut u32 {
        match self {
            Self::Goals => &mut stats.total_goals,
            Self::Assists => &mut stats.total_assists,
            Self::Saves => &mut stats.total_saves,
            Self::Fouls => &mut stats.total_fouls,
            Self::Cards => &mut stats.total_cards,
            Self::MatchesPlayed => &mut stats.matches_played,
        }
    }

    pub fn bump(self, stats: &mut PlayerStats) {
        *self.slot(stats) += 1;
    }

    pub fn read(self, stats: &PlayerStats) -> u32 {
        match self {
            Self::Goals => stats.total_goals,
            Self::Assists => stats.total_assists,
            Self::Saves => stats.total_saves,
            Self::Fouls => stats.total_fouls,
            Self::Cards => stats.total_cards,
            Self::MatchesPlayed => stats.matches_played,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Goals => "goals",
            Self::Assists => "assists",
            Self::Saves => "saves",
            Self::Fouls => "fouls",
            Self::Cards => "cards",
            Self::MatchesPlayed => "matches",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

/// Per-player aggregates, kept in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsBook {
    players: Vec<PlayerStats>,
}

impl StatsBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(store: &ScopedStore) -> Self {
        Self {
            players: store.get(StorageKey::PlayerStats, Vec::new()),
        }
    }

    pub fn try_load(store: &ScopedStore) -> Result<Self> {
        Ok(Self {
            players: store.try_get(StorageKey::PlayerStats)?.unwrap_or_default(),
        })
    }

    pub fn save(&self, store: &ScopedStore) -> bool {
        store.set(StorageKey::PlayerStats, &self.players)
    }

    /// Bumps the counter `kind` maps to. Kinds without a counter leave the book untouched.
    pub fn update_player_stats(
        &mut self,
        player_id: &str,
        player_name: &str,
        kind: EventKind,
        at: Timestamp,
    ) -> Option<&PlayerStats> {
        let counter = StatCounter::for_kind(kind)?;

        let idx = match self.players.iter().position(|p| p.player_id == player_id) {
            Some(idx) => idx,
            None => {
                self.players.push(PlayerStats::empty(player_id, player_name, at));
                self.players.len() - 1
            }
        };

        let entry = &mut self.players[idx];
        counter.bump(entry);
        entry.last_updated = at;
        Some(entry)
    }

    pub fn record(&mut self, event: &MatchEvent) {
        self.update_player_stats(&event.player_id, &event.player_name, event.kind, event.timestamp);
    }

    pub fn get(&self, player_id: &str) -> Option<&PlayerStats> {
        self.players.iter().find(|p| p.player_id == player_id)
    }

    pub fn players(&self) -> &[PlayerStats] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Leaderboard for one counter, highest first, ties by name.
    pub fn sorted_by(&self, counter: StatCounter) -> Vec<&PlayerStats> {
        let mut out: Vec<&PlayerStats> = self.players.iter().collect();
        out.sort_by(|a, b| {
            counter
                .read(b)
                .cmp(&counter.read(a))
                .then_with(|| a.player_name.cmp(&b.player_name))
        });
        out
    }
}

pub fn aggregate_player_stats(events: &[MatchEvent]) -> StatsBook {
    events.iter().fold(StatsBook::new(), |mut book, event| {
        book.record(event);
        book
    })
}
