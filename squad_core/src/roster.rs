use std::{cmp::Ordering, fmt};

use serde::{de::DeserializeOwned, Serialize};
use squad_schema::{Club, Player};
use uuid::Uuid;

use crate::{
    error::{Result, SquadError},
    store::{ScopedStore, StorageKey},
};

/// A numeric column a roster can be ordered by.
pub trait SortField: Copy + fmt::Debug + 'static {
    const ALL: &'static [Self];

    /// Field name as it appears in JSON and CSV.
    fn as_str(self) -> &'static str;

    fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.iter().copied().find(|k| k.as_str().eq_ignore_ascii_case(s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerSortKey {
    Age,
    Goals,
    Rating,
    Salary,
    MarketValue,
}

impl SortField for PlayerSortKey {
    const ALL: &'static [Self] = &[
        PlayerSortKey::Age,
        PlayerSortKey::Goals,
        PlayerSortKey::Rating,
        PlayerSortKey::Salary,
        PlayerSortKey::MarketValue,
    ];

    fn as_str(self) -> &'static str {
        match self {
            PlayerSortKey::Age => "age",
            PlayerSortKey::Goals => "goals",
            PlayerSortKey::Rating => "rating",
            PlayerSortKey::Salary => "salary",
            PlayerSortKey::MarketValue => "marketValue",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClubSortKey {
    Founded,
    Revenue,
    Trophies,
}

impl SortField for ClubSortKey {
    const ALL: &'static [Self] = &[ClubSortKey::Founded, ClubSortKey::Revenue, ClubSortKey::Trophies];

    fn as_str(self) -> &'static str {
        match self {
            ClubSortKey::Founded => "founded",
            ClubSortKey::Revenue => "revenue",
            ClubSortKey::Trophies => "trophies",
        }
    }
}

/// A flat data-management record (player or club).
pub trait Record: Clone + Serialize + DeserializeOwned {
    const STORAGE_KEY: StorageKey;
    /// Top-level key in JSON exports.
    const COLLECTION: &'static str;
    type SortKey: SortField;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn name(&self) -> &str;
    fn sort_value(&self, key: Self::SortKey) -> f64;
    fn matches(&self, query: &str) -> bool;
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

impl Record for Player {
    const STORAGE_KEY: StorageKey = StorageKey::Players;
    const COLLECTION: &'static str = "players";
    type SortKey = PlayerSortKey;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn sort_value(&self, key: PlayerSortKey) -> f64 {
        match key {
            PlayerSortKey::Age => f64::from(self.age),
            PlayerSortKey::Goals => f64::from(self.goals),
            PlayerSortKey::Rating => self.rating,
            PlayerSortKey::Salary => self.salary,
            PlayerSortKey::MarketValue => self.market_value,
        }
    }

    fn matches(&self, query: &str) -> bool {
        contains_ci(&self.name, query)
            || contains_ci(&self.club, query)
            || contains_ci(&self.position, query)
            || contains_ci(&self.nationality, query)
    }
}

impl Record for Club {
    const STORAGE_KEY: StorageKey = StorageKey::Clubs;
    const COLLECTION: &'static str = "clubs";
    type SortKey = ClubSortKey;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn sort_value(&self, key: ClubSortKey) -> f64 {
        match key {
            ClubSortKey::Founded => f64::from(self.founded),
            ClubSortKey::Revenue => self.revenue,
            ClubSortKey::Trophies => f64::from(self.trophies),
        }
    }

    fn matches(&self, query: &str) -> bool {
        contains_ci(&self.name, query)
            || contains_ci(&self.country, query)
            || contains_ci(&self.league, query)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Roster<T: Record> {
    records: Vec<T>,
}

impl<T: Record> Default for Roster<T> {
    fn default() -> Self {
        Self { records: Vec::new() }
    }
}

impl<T: Record> Roster<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<T>) -> Self {
        Self { records }
    }

    pub fn load(store: &ScopedStore) -> Self {
        Self::from_records(store.get(T::STORAGE_KEY, Vec::new()))
    }

    pub fn try_load(store: &ScopedStore) -> Result<Self> {
        Ok(Self::from_records(store.try_get(T::STORAGE_KEY)?.unwrap_or_default()))
    }

    pub fn save(&self, store: &ScopedStore) -> bool {
        store.set(T::STORAGE_KEY, &self.records)
    }

    /// Inserts a record, generating an id when it has none.
    pub fn add(&mut self, mut record: T) -> Result<&T> {
        if record.name().trim().is_empty() {
            return Err(SquadError::new("E1003", format!("{} record needs a name", T::COLLECTION)));
        }
        if record.id().trim().is_empty() {
            record.set_id(Uuid::new_v4().to_string());
        } else if self.get(record.id()).is_some() {
            return Err(SquadError::new("E1003", format!("duplicate id: {}", record.id()))
                .with_id(record.id()));
        }
        tracing::debug!(collection = T::COLLECTION, id = record.id(), "record added");
        self.records.push(record);
        Ok(&self.records[self.records.len() - 1])
    }

    pub fn update(&mut self, record: T) -> Result<&T> {
        if record.name().trim().is_empty() {
            return Err(SquadError::new("E1003", format!("{} record needs a name", T::COLLECTION)));
        }
        let Some(pos) = self.records.iter().position(|r| r.id() == record.id()) else {
            return Err(SquadError::not_found("E2005", T::COLLECTION, record.id()));
        };
        self.records[pos] = record;
        Ok(&self.records[pos])
    }

    pub fn remove(&mut self, id: &str) -> Result<T> {
        let Some(pos) = self.records.iter().position(|r| r.id() == id) else {
            return Err(SquadError::not_found("E2005", T::COLLECTION, id));
        };
        Ok(self.records.remove(pos))
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    /// Swaps in a whole collection, applying the same rules as [`Roster::add`].
    /// On error nothing changes and the error carries the 1-based record number.
    pub fn replace_all(&mut self, records: Vec<T>) -> Result<()> {
        let mut fresh = Self::new();
        for (idx, record) in records.into_iter().enumerate() {
            fresh.add(record).map_err(|e| e.with_row(idx + 1))?;
        }
        self.records = fresh.records;
        Ok(())
    }

    pub fn filter(&self, query: &str) -> Vec<&T> {
        let q = query.trim().to_lowercase();
        self.records.iter().filter(|r| q.is_empty() || r.matches(&q)).collect()
    }

    /// Stable numeric sort; NaN compares equal to everything.
    pub fn sort_by(&self, key: T::SortKey, descending: bool) -> Vec<&T> {
        let mut out: Vec<&T> = self.records.iter().collect();
        out.sort_by(|a, b| {
            let ord = a
                .sort_value(key)
                .partial_cmp(&b.sort_value(key))
                .unwrap_or(Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });
        out
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
