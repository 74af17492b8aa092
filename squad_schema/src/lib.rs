use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type Timestamp = DateTime<Utc>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub player_id: String,
    pub player_name: String,
    pub team: Team,
    pub half: u8,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub metadata: EventMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Goal,
    Assist,
    Save,
    Foul,
    Card,
    Appearance,
    Substitution,
    Other,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::Goal,
        EventKind::Assist,
        EventKind::Save,
        EventKind::Foul,
        EventKind::Card,
        EventKind::Appearance,
        EventKind::Substitution,
        EventKind::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Goal => "goal",
            EventKind::Assist => "assist",
            EventKind::Save => "save",
            EventKind::Foul => "foul",
            EventKind::Card => "card",
            EventKind::Appearance => "appearance",
            EventKind::Substitution => "substitution",
            EventKind::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    #[default]
    Home,
    Away,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_name: Option<String>,
}

/// Cumulative per-player counters folded from [`MatchEvent`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub player_id: String,
    pub player_name: String,
    pub total_goals: u32,
    pub total_assists: u32,
    pub total_saves: u32,
    pub total_fouls: u32,
    pub total_cards: u32,
    pub matches_played: u32,
    pub last_updated: Timestamp,
}

impl PlayerStats {
    pub fn empty(player_id: impl Into<String>, player_name: impl Into<String>, at: Timestamp) -> Self {
        Self {
            player_id: player_id.into(),
            player_name: player_name.into(),
            total_goals: 0,
            total_assists: 0,
            total_saves: 0,
            total_fouls: 0,
            total_cards: 0,
            matches_played: 0,
            last_updated: at,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attendance {
    Present,
    Absent,
    Justified,
    #[default]
    Pending,
}

impl Attendance {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            "justified" => Some(Self::Justified),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrainingStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TrainingStatus {
    /// All pending is `Pending`, none pending is `Completed`, anything else is
    /// `InProgress`. An empty roster counts as all pending.
    pub fn derive(players: &[TrainingPlayer]) -> Self {
        let pending = players
            .iter()
            .filter(|p| p.attendance == Attendance::Pending)
            .count();
        if pending == players.len() {
            TrainingStatus::Pending
        } else if pending == 0 {
            TrainingStatus::Completed
        } else {
            TrainingStatus::InProgress
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPlayer {
    pub id: String,
    pub name: String,
    pub position: String,
    pub number: u32,
    #[serde(default)]
    pub attendance: Attendance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Training {
    pub id: String,
    pub date: NaiveDate,
    /// Wall-clock start, `HH:MM`.
    pub time: String,
    #[serde(default)]
    pub status: TrainingStatus,
    pub players: Vec<TrainingPlayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub pinned: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    pub position: String,
    pub club: String,
    pub nationality: String,
    pub age: u32,
    pub goals: u32,
    pub rating: f64,
    pub salary: f64,
    pub market_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    pub id: String,
    pub name: String,
    pub country: String,
    pub league: String,
    pub founded: u32,
    pub revenue: f64,
    pub trophies: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn match_event_serialization_uses_type_tag_and_camel_case() {
        let event = MatchEvent {
            id: "e1".to_string(),
            kind: EventKind::Goal,
            player_id: "p7".to_string(),
            player_name: "Rui".to_string(),
            team: Team::Home,
            half: 2,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 18, 30, 0).unwrap(),
            metadata: EventMetadata {
                goal_zone: Some("top-left".to_string()),
                goal_origin: None,
                action_name: None,
            },
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "goal");
        assert_eq!(json["playerId"], "p7");
        assert_eq!(json["half"], 2);
        assert_eq!(json["metadata"]["goalZone"], "top-left");
        assert!(json["metadata"].get("goalOrigin").is_none());
    }

    #[test]
    fn event_without_metadata_defaults_empty() {
        let v = serde_json::json!({
            "id": "e2",
            "type": "foul",
            "playerId": "p1",
            "playerName": "Ana",
            "team": "away",
            "half": 1,
            "timestamp": "2024-03-01T18:00:00Z"
        });

        let event: MatchEvent = serde_json::from_value(v).unwrap();
        assert_eq!(event.kind, EventKind::Foul);
        assert_eq!(event.team, Team::Away);
        assert_eq!(event.metadata, EventMetadata::default());
    }

    #[test]
    fn training_status_uses_kebab_case() {
        let json = serde_json::to_value(TrainingStatus::InProgress).unwrap();
        assert_eq!(json, "in-progress");
        let back: TrainingStatus = serde_json::from_value(json).unwrap();
        assert_eq!(back, TrainingStatus::InProgress);
    }

    #[test]
    fn status_is_derived_from_pending_count() {
        let player = |attendance| TrainingPlayer {
            id: "p".to_string(),
            name: "P".to_string(),
            position: "DF".to_string(),
            number: 4,
            attendance,
        };

        assert_eq!(TrainingStatus::derive(&[]), TrainingStatus::Pending);
        assert_eq!(
            TrainingStatus::derive(&[player(Attendance::Pending), player(Attendance::Pending)]),
            TrainingStatus::Pending
        );
        assert_eq!(
            TrainingStatus::derive(&[player(Attendance::Absent), player(Attendance::Pending)]),
            TrainingStatus::InProgress
        );
        assert_eq!(
            TrainingStatus::derive(&[player(Attendance::Justified), player(Attendance::Present)]),
            TrainingStatus::Completed
        );
    }

    #[test]
    fn event_kind_parse_is_case_insensitive() {
        assert_eq!(EventKind::parse("Goal"), Some(EventKind::Goal));
        assert_eq!(EventKind::parse(" SUBSTITUTION "), Some(EventKind::Substitution));
        assert_eq!(EventKind::parse("offside"), None);
    }

    #[test]
    fn training_player_attendance_defaults_pending() {
        let v = serde_json::json!({
            "id": "p1",
            "name": "Ana",
            "position": "GK",
            "number": 1
        });
        let player: TrainingPlayer = serde_json::from_value(v).unwrap();
        assert_eq!(player.attendance, Attendance::Pending);
    }
}
