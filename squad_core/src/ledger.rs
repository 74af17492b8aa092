use chrono::Utc;
use squad_schema::{EventKind, EventMetadata, MatchEvent, Team};
use uuid::Uuid;

use crate::{
    error::{Result, SquadError},
    store::{ScopedStore, StorageKey},
};

/// What a caller supplies for a new event; id and timestamp are assigned by the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub kind: EventKind,
    pub player_id: String,
    pub player_name: String,
    pub team: Team,
    pub half: u8,
    pub metadata: EventMetadata,
}

impl NewEvent {
    pub fn new(kind: EventKind, player_id: impl Into<String>, player_name: impl Into<String>) -> Self {
        Self {
            kind,
            player_id: player_id.into(),
            player_name: player_name.into(),
            team: Team::Home,
            half: 1,
            metadata: EventMetadata::default(),
        }
    }

    pub fn team(mut self, team: Team) -> Self {
        self.team = team;
        self
    }

    pub fn half(mut self, half: u8) -> Self {
        self.half = half;
        self
    }

    pub fn metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Append-only list of match events in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLedger {
    events: Vec<MatchEvent>,
}

impl EventLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<MatchEvent>) -> Self {
        Self { events }
    }

    pub fn load(store: &ScopedStore) -> Self {
        Self::from_events(store.get(StorageKey::PlayerActions, Vec::new()))
    }

    /// Like [`EventLedger::load`], but an unreadable stored value is an error.
    pub fn try_load(store: &ScopedStore) -> Result<Self> {
        Ok(Self::from_events(store.try_get(StorageKey::PlayerActions)?.unwrap_or_default()))
    }

    pub fn save(&self, store: &ScopedStore) -> bool {
        store.set(StorageKey::PlayerActions, &self.events)
    }

    pub fn add_event(&mut self, new: NewEvent) -> MatchEvent {
        let event = MatchEvent {
            id: Uuid::new_v4().to_string(),
            kind: new.kind,
            player_id: new.player_id,
            player_name: new.player_name,
            team: new.team,
            half: new.half,
            timestamp: Utc::now(),
            metadata: new.metadata,
        };
        tracing::debug!(id = %event.id, kind = event.kind.as_str(), player = %event.player_id, "event added");
        self.events.push(event.clone());
        event
    }

    pub fn remove_event(&mut self, id: &str) -> Result<MatchEvent> {
        let Some(pos) = self.events.iter().position(|e| e.id == id) else {
            return Err(SquadError::not_found("E2002", "event", id));
        };
        let removed = self.events.remove(pos);
        tracing::debug!(id = %removed.id, "event removed");
        Ok(removed)
    }

    pub fn get(&self, id: &str) -> Option<&MatchEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn events(&self) -> &[MatchEvent] {
        &self.events
    }

    /// Newest first, as shown in the live feed.
    pub fn live_feed(&self) -> impl Iterator<Item = &MatchEvent> {
        self.events.iter().rev()
    }

    pub fn events_for<'a>(&'a self, player_id: &'a str) -> impl Iterator<Item = &'a MatchEvent> {
        self.events.iter().filter(move |e| e.player_id == player_id)
    }

    pub fn events_in_half(&self, half: u8) -> impl Iterator<Item = &MatchEvent> {
        self.events.iter().filter(move |e| e.half == half)
    }

    pub fn count_of(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
