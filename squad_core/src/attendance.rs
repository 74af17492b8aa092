use std::{cmp::Ordering, collections::HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use squad_schema::{Attendance, Training, TrainingPlayer, TrainingStatus};
use uuid::Uuid;

use crate::{
    error::{Result, SquadError},
    store::{ScopedStore, StorageKey},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceSummary {
    pub present: usize,
    pub absent: usize,
    pub justified: usize,
    pub pending: usize,
}

pub fn summarize(training: &Training) -> AttendanceSummary {
    training
        .players
        .iter()
        .fold(AttendanceSummary::default(), |mut acc, p| {
            match p.attendance {
                Attendance::Present => acc.present += 1,
                Attendance::Absent => acc.absent += 1,
                Attendance::Justified => acc.justified += 1,
                Attendance::Pending => acc.pending += 1,
            }
            acc
        })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoricFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub search: Option<String>,
}

impl HistoricFilter {
    fn admits_date(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }

    fn admits_name(&self, name: &str) -> bool {
        match self.search.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => name.to_lowercase().contains(&q.to_lowercase()),
            _ => true,
        }
    }
}

/// One player's record across completed trainings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAttendance {
    pub player_id: String,
    pub player_name: String,
    pub present: u32,
    pub absent: u32,
    pub justified: u32,
    pub total: u32,
    pub attendance_pct: f64,
    pub consecutive_present: u32,
    pub last_absence: Option<NaiveDate>,
}

impl PlayerAttendance {
    fn new(player_id: &str, player_name: &str) -> Self {
        Self {
            player_id: player_id.to_string(),
            player_name: player_name.to_string(),
            present: 0,
            absent: 0,
            justified: 0,
            total: 0,
            attendance_pct: 0.0,
            consecutive_present: 0,
            last_absence: None,
        }
    }

    fn observe(&mut self, attendance: Attendance, date: NaiveDate) {
        match attendance {
            Attendance::Present => {
                self.present += 1;
                self.consecutive_present += 1;
            }
            Attendance::Absent => {
                self.absent += 1;
                self.consecutive_present = 0;
                self.last_absence = Some(date);
            }
            Attendance::Justified => {
                self.justified += 1;
                self.consecutive_present = 0;
            }
            Attendance::Pending => return,
        }
        self.total += 1;
    }

    /// Higher present/total first, ties by name.
    fn rank_cmp(&self, other: &Self) -> Ordering {
        let lhs = u64::from(other.present) * u64::from(self.total);
        let rhs = u64::from(self.present) * u64::from(other.total);
        lhs.cmp(&rhs)
            .then_with(|| self.player_name.cmp(&other.player_name))
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttendanceTracker {
    trainings: Vec<Training>,
}

impl AttendanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_trainings(mut trainings: Vec<Training>) -> Self {
        for t in &mut trainings {
            let derived = TrainingStatus::derive(&t.players);
            if t.status != derived {
                tracing::warn!(training = %t.id, stored = ?t.status, derived = ?derived, "stale training status");
                t.status = derived;
            }
        }
        Self { trainings }
    }

    pub fn load(store: &ScopedStore) -> Self {
        Self::from_trainings(store.get(StorageKey::Trainings, Vec::new()))
    }

    pub fn try_load(store: &ScopedStore) -> Result<Self> {
        Ok(Self::from_trainings(store.try_get(StorageKey::Trainings)?.unwrap_or_default()))
    }

    pub fn save(&self, store: &ScopedStore) -> bool {
        store.set(StorageKey::Trainings, &self.trainings)
    }

    /// Schedules a training; every roster entry starts out pending.
    pub fn add_training(
        &mut self,
        date: NaiveDate,
        time: impl Into<String>,
        roster: Vec<TrainingPlayer>,
    ) -> Result<&Training> {
        if roster.is_empty() {
            return Err(SquadError::new("E1004", "a training needs at least one player"));
        }
        let players: Vec<TrainingPlayer> = roster
            .into_iter()
            .map(|p| TrainingPlayer {
                attendance: Attendance::Pending,
                ..p
            })
            .collect();
        let training = Training {
            id: Uuid::new_v4().to_string(),
            date,
            time: time.into(),
            status: TrainingStatus::derive(&players),
            players,
        };
        tracing::debug!(id = %training.id, date = %training.date, "training added");
        self.trainings.push(training);
        Ok(&self.trainings[self.trainings.len() - 1])
    }

    pub fn update_attendance(
        &mut self,
        training_id: &str,
        player_id: &str,
        attendance: Attendance,
    ) -> Result<&Training> {
        let training = self.training_mut(training_id)?;
        let Some(player) = training.players.iter_mut().find(|p| p.id == player_id) else {
            return Err(SquadError::not_found("E2004", "player in training", player_id)
                .with_key(training_id));
        };
        player.attendance = attendance;
        training.status = TrainingStatus::derive(&training.players);
        Ok(&*training)
    }

    pub fn mark_all(&mut self, training_id: &str, attendance: Attendance) -> Result<&Training> {
        let training = self.training_mut(training_id)?;
        for p in &mut training.players {
            p.attendance = attendance;
        }
        training.status = TrainingStatus::derive(&training.players);
        Ok(&*training)
    }

    pub fn training(&self, id: &str) -> Option<&Training> {
        self.trainings.iter().find(|t| t.id == id)
    }

    fn training_mut(&mut self, id: &str) -> Result<&mut Training> {
        self.trainings
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| SquadError::not_found("E2003", "training", id))
    }

    /// Trainings ordered by date, then start time.
    pub fn trainings(&self) -> Vec<&Training> {
        let mut out: Vec<&Training> = self.trainings.iter().collect();
        out.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.time.cmp(&b.time)));
        out
    }

    pub fn len(&self) -> usize {
        self.trainings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trainings.is_empty()
    }

    /// Per-player attendance over completed trainings, best attendance first.
    /// Players who never took part in a completed training are left out.
    pub fn historic(&self, filter: &HistoricFilter) -> Vec<PlayerAttendance> {
        let mut records: HashMap<&str, PlayerAttendance> = HashMap::new();
        for t in &self.trainings {
            for p in &t.players {
                records
                    .entry(p.id.as_str())
                    .or_insert_with(|| PlayerAttendance::new(&p.id, &p.name));
            }
        }

        for t in self.trainings() {
            if t.status != TrainingStatus::Completed || !filter.admits_date(t.date) {
                continue;
            }
            for p in &t.players {
                if let Some(record) = records.get_mut(p.id.as_str()) {
                    record.observe(p.attendance, t.date);
                }
            }
        }

        let mut out: Vec<PlayerAttendance> = records
            .into_values()
            .filter(|r| r.total > 0 && filter.admits_name(&r.player_name))
            .map(|mut r| {
                r.attendance_pct = round1(f64::from(r.present) / f64::from(r.total) * 100.0);
                r
            })
            .collect();
        out.sort_by(PlayerAttendance::rank_cmp);
        out
    }
}
