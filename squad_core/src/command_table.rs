use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use squad_schema::{EventKind, EventMetadata, MatchEvent, Team};

use crate::{
    error::{Result, SquadError},
    ledger::{EventLedger, NewEvent},
    stats::{aggregate_player_stats, StatsBook},
    store::{ScopedStore, StorageKey},
};

pub const LIVE_FEED_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquadMember {
    pub id: String,
    pub name: String,
    pub number: u32,
    pub position: String,
    #[serde(default)]
    pub team: Team,
}

/// State behind the live match screen: squad, who is on the field, which action
/// buttons are shown, and the events recorded so far.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandTable {
    squad: Vec<SquadMember>,
    on_field: BTreeSet<String>,
    visibility: BTreeMap<EventKind, bool>,
    custom_actions: Vec<String>,
    ledger: EventLedger,
    stats: StatsBook,
}

impl CommandTable {
    pub fn new(squad: Vec<SquadMember>) -> Self {
        Self {
            squad,
            on_field: BTreeSet::new(),
            visibility: EventKind::ALL.into_iter().map(|k| (k, true)).collect(),
            custom_actions: Vec::new(),
            ledger: EventLedger::new(),
            stats: StatsBook::new(),
        }
    }

    pub fn load(store: &ScopedStore) -> Self {
        let mut table = Self::new(store.get(StorageKey::CommandTablePlayers, Vec::new()));
        table.on_field = store.get(StorageKey::CommandTableOnField, BTreeSet::new());
        table
            .visibility
            .extend(store.get(StorageKey::CommandTableVisibility, BTreeMap::<EventKind, bool>::new()));
        table.custom_actions = store.get(StorageKey::CommandTableActions, Vec::new());
        table.ledger = EventLedger::load(store);
        table.stats = StatsBook::load(store);
        table
    }

    /// Restores a session, failing if any of its stored values is unreadable.
    pub fn try_load(store: &ScopedStore) -> Result<Self> {
        let mut table = Self::new(store.try_get(StorageKey::CommandTablePlayers)?.unwrap_or_default());
        table.on_field = store.try_get(StorageKey::CommandTableOnField)?.unwrap_or_default();
        let visibility: BTreeMap<EventKind, bool> =
            store.try_get(StorageKey::CommandTableVisibility)?.unwrap_or_default();
        table.visibility.extend(visibility);
        table.custom_actions = store.try_get(StorageKey::CommandTableActions)?.unwrap_or_default();
        table.ledger = EventLedger::try_load(store)?;
        table.stats = StatsBook::try_load(store)?;
        Ok(table)
    }

    /// Writes every command-table key; returns false if any write failed.
    pub fn save(&self, store: &ScopedStore) -> bool {
        let feed: Vec<&MatchEvent> = self.live_feed(LIVE_FEED_LEN);
        [
            store.set(StorageKey::CommandTablePlayers, &self.squad),
            store.set(StorageKey::CommandTableOnField, &self.on_field),
            store.set(StorageKey::CommandTableVisibility, &self.visibility),
            store.set(StorageKey::CommandTableActions, &self.custom_actions),
            store.set(StorageKey::CommandTableLiveActions, &feed),
            self.ledger.save(store),
            self.stats.save(store),
        ]
        .into_iter()
        .all(|ok| ok)
    }

    fn member(&self, player_id: &str) -> Result<&SquadMember> {
        self.squad
            .iter()
            .find(|m| m.id == player_id)
            .ok_or_else(|| SquadError::not_found("E2006", "squad member", player_id))
    }

    fn push(&mut self, member: SquadMember, kind: EventKind, half: u8, metadata: EventMetadata) -> MatchEvent {
        let event = self.ledger.add_event(
            NewEvent::new(kind, member.id, member.name)
                .team(member.team)
                .half(half)
                .metadata(metadata),
        );
        self.stats.record(&event);
        event
    }

    /// Puts the starting players on the field and credits each with an appearance.
    /// Nothing is recorded unless every starter is in the squad and off the field.
    pub fn kick_off(&mut self, starters: &[&str]) -> Result<Vec<MatchEvent>> {
        let mut seen = BTreeSet::new();
        let mut members = Vec::with_capacity(starters.len());
        for id in starters {
            let member = self.member(id)?;
            if self.on_field.contains(*id) || !seen.insert(*id) {
                return Err(SquadError::new("E1005", format!("{} is already on the field", member.name))
                    .with_id(*id));
            }
            members.push(member.clone());
        }
        let mut events = Vec::with_capacity(members.len());
        for member in members {
            self.on_field.insert(member.id.clone());
            events.push(self.push(member, EventKind::Appearance, 1, EventMetadata::default()));
        }
        Ok(events)
    }

    pub fn record(
        &mut self,
        player_id: &str,
        kind: EventKind,
        half: u8,
        metadata: EventMetadata,
    ) -> Result<MatchEvent> {
        let member = self.member(player_id)?.clone();
        Ok(self.push(member, kind, half, metadata))
    }

    /// Records a user-defined action; the name is remembered as a button.
    pub fn record_custom(&mut self, player_id: &str, action_name: &str, half: u8) -> Result<MatchEvent> {
        let action_name = action_name.trim();
        if action_name.is_empty() {
            return Err(SquadError::new("E1003", "custom action needs a name"));
        }
        if !self.custom_actions.iter().any(|a| a == action_name) {
            self.custom_actions.push(action_name.to_string());
        }
        self.record(
            player_id,
            EventKind::Other,
            half,
            EventMetadata {
                action_name: Some(action_name.to_string()),
                ..EventMetadata::default()
            },
        )
    }

    /// Removes an event and refolds the statistics from what remains.
    pub fn undo(&mut self, event_id: &str) -> Result<MatchEvent> {
        let removed = self.ledger.remove_event(event_id)?;
        self.stats = aggregate_player_stats(self.ledger.events());
        Ok(removed)
    }

    pub fn substitute(&mut self, out_id: &str, in_id: &str, half: u8) -> Result<MatchEvent> {
        let outgoing = self.member(out_id)?.clone();
        let incoming = self.member(in_id)?.clone();
        if !self.on_field.contains(out_id) {
            return Err(SquadError::new("E1005", format!("{} is not on the field", outgoing.name))
                .with_id(out_id));
        }
        if self.on_field.contains(in_id) {
            return Err(SquadError::new("E1005", format!("{} is already on the field", incoming.name))
                .with_id(in_id));
        }

        self.on_field.remove(out_id);
        self.on_field.insert(in_id.to_string());

        let first_appearance = !self
            .ledger
            .events_for(in_id)
            .any(|e| e.kind == EventKind::Appearance);
        let event = self.push(
            incoming.clone(),
            EventKind::Substitution,
            half,
            EventMetadata {
                action_name: Some(format!("replaces {}", outgoing.name)),
                ..EventMetadata::default()
            },
        );
        if first_appearance {
            self.push(incoming, EventKind::Appearance, half, EventMetadata::default());
        }
        Ok(event)
    }

    pub fn set_visible(&mut self, kind: EventKind, visible: bool) {
        self.visibility.insert(kind, visible);
    }

    pub fn visible_kinds(&self) -> Vec<EventKind> {
        EventKind::ALL
            .into_iter()
            .filter(|k| self.visibility.get(k).copied().unwrap_or(true))
            .collect()
    }

    pub fn live_feed(&self, limit: usize) -> Vec<&MatchEvent> {
        self.ledger.live_feed().take(limit).collect()
    }

    pub fn on_field(&self) -> impl Iterator<Item = &SquadMember> {
        self.squad.iter().filter(|m| self.on_field.contains(&m.id))
    }

    pub fn bench(&self) -> impl Iterator<Item = &SquadMember> {
        self.squad.iter().filter(|m| !self.on_field.contains(&m.id))
    }

    pub fn squad(&self) -> &[SquadMember] {
        &self.squad
    }

    pub fn custom_actions(&self) -> &[String] {
        &self.custom_actions
    }

    pub fn ledger(&self) -> &EventLedger {
        &self.ledger
    }

    pub fn stats(&self) -> &StatsBook {
        &self.stats
    }

    /// Goals per team, counted from the ledger.
    pub fn score(&self) -> (usize, usize) {
        self.ledger
            .events()
            .iter()
            .filter(|e| e.kind == EventKind::Goal)
            .fold((0, 0), |(home, away), e| match e.team {
                Team::Home => (home + 1, away),
                Team::Away => (home, away + 1),
            })
    }
}
