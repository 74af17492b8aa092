use super::*;
use chrono::NaiveDate;
use squad_schema::{Attendance, EventKind, Note, TrainingPlayer, TrainingStatus};
use std::{
    collections::HashSet,
    fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

fn temp_dir(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "squad_core_{tag}_{}_{}",
        std::process::id(),
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

/// Small deterministic generator so the sequence tests are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

fn roster(ids: &[&str]) -> Vec<TrainingPlayer> {
    ids.iter()
        .map(|id| TrainingPlayer {
            id: id.to_string(),
            name: id.to_string(),
            position: "DF".to_string(),
            number: 2,
            attendance: Attendance::Pending,
        })
        .collect()
}

#[test]
fn ledger_length_is_adds_minus_removes_for_mixed_sequences() {
    let mut rng = Lcg(7);
    let mut ledger = EventLedger::new();
    let mut live: Vec<String> = Vec::new();
    let mut removed: HashSet<String> = HashSet::new();
    let (mut adds, mut removes) = (0usize, 0usize);

    for _ in 0..500 {
        if live.is_empty() || rng.next() % 3 != 0 {
            let kind = EventKind::ALL[(rng.next() % EventKind::ALL.len() as u64) as usize];
            let player = format!("p{}", rng.next() % 5);
            live.push(ledger.add_event(NewEvent::new(kind, player.clone(), player)).id);
            adds += 1;
        } else {
            let idx = (rng.next() % live.len() as u64) as usize;
            let id = live.swap_remove(idx);
            ledger.remove_event(&id).unwrap();
            removed.insert(id);
            removes += 1;
        }
        assert_eq!(ledger.len(), adds - removes);
    }

    assert!(ledger.events().iter().all(|e| !removed.contains(&e.id)));
}

#[test]
fn training_status_always_matches_attendance() {
    let mut rng = Lcg(42);
    let ids = ["a", "b", "c", "d"];
    let marks = [
        Attendance::Present,
        Attendance::Absent,
        Attendance::Justified,
        Attendance::Pending,
    ];
    let mut tracker = AttendanceTracker::new();
    let training = tracker
        .add_training(NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(), "19:30", roster(&ids))
        .unwrap()
        .id
        .clone();

    for _ in 0..200 {
        let player = ids[(rng.next() % ids.len() as u64) as usize];
        let mark = marks[(rng.next() % marks.len() as u64) as usize];
        let t = tracker.update_attendance(&training, player, mark).unwrap();

        let pending = t.players.iter().filter(|p| p.attendance == Attendance::Pending).count();
        let expected = if pending == t.players.len() {
            TrainingStatus::Pending
        } else if pending == 0 {
            TrainingStatus::Completed
        } else {
            TrainingStatus::InProgress
        };
        assert_eq!(t.status, expected);
    }
}

#[test]
fn match_session_survives_reload_from_disk() {
    let dir = temp_dir("session");
    let scope = Scope::from_user(Some("coach-7"));

    let squad = vec![
        SquadMember {
            id: "5".to_string(),
            name: "Pepe".to_string(),
            number: 5,
            position: "DF".to_string(),
            team: squad_schema::Team::Home,
        },
        SquadMember {
            id: "17".to_string(),
            name: "Conceicao".to_string(),
            number: 17,
            position: "FW".to_string(),
            team: squad_schema::Team::Home,
        },
    ];

    {
        let store = ScopedStore::new(FileBackend::open(&dir).unwrap(), scope.clone());
        let mut table = CommandTable::new(squad);
        table.kick_off(&["5", "17"]).unwrap();
        table
            .record(
                "17",
                EventKind::Goal,
                1,
                squad_schema::EventMetadata {
                    goal_zone: Some("bottom-right".to_string()),
                    goal_origin: Some("counter".to_string()),
                    action_name: None,
                },
            )
            .unwrap();
        let foul = table
            .record("5", EventKind::Foul, 2, Default::default())
            .unwrap();
        table.record("5", EventKind::Card, 2, Default::default()).unwrap();
        table.undo(&foul.id).unwrap();
        assert!(table.save(&store));
    }

    let store = ScopedStore::new(FileBackend::open(&dir).unwrap(), scope);
    let table = CommandTable::load(&store);
    assert_eq!(table.ledger().len(), 4);
    assert_eq!(table.stats(), &aggregate_player_stats(table.ledger().events()));

    let pepe = table.stats().get("5").unwrap();
    assert_eq!((pepe.total_fouls, pepe.total_cards, pepe.matches_played), (0, 1, 1));

    let ledger = EventLedger::load(&store);
    assert_eq!(ledger.events_for("17").count(), 2);

    let guest = ScopedStore::new(FileBackend::open(&dir).unwrap(), Scope::Guest);
    assert!(EventLedger::load(&guest).is_empty());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn notes_json_export_reimports_into_fresh_book() {
    let store = ScopedStore::in_memory(Scope::Guest);
    let mut book = NoteBook::new();
    let pinned = book
        .create("Derby plan", "high line, press the 6", vec!["tactics".to_string()])
        .unwrap()
        .id
        .clone();
    book.create("Injuries", "Otavio: hamstring", vec![]).unwrap();
    book.toggle_pin(&pinned).unwrap();

    let text = codec::export_json("notes", book.notes()).unwrap();

    let mut fresh = NoteBook::load(&store);
    assert!(fresh.is_empty());
    fresh
        .replace_all(codec::import_json::<Note>("notes", &text).unwrap())
        .unwrap();
    assert!(fresh.save(&store));

    let reloaded = NoteBook::load(&store);
    assert_eq!(reloaded, book);
    assert_eq!(reloaded.sorted()[0].id, pinned);
}

#[test]
fn three_trainings_export_history_csv() {
    let mut tracker = AttendanceTracker::new();
    let days = [1, 8, 15];
    for (i, day) in days.iter().enumerate() {
        let id = tracker
            .add_training(NaiveDate::from_ymd_opt(2024, 11, *day).unwrap(), "18:00", roster(&["A", "B"]))
            .unwrap()
            .id
            .clone();
        tracker.update_attendance(&id, "A", Attendance::Present).unwrap();
        let b = if i == 0 { Attendance::Absent } else { Attendance::Present };
        tracker.update_attendance(&id, "B", b).unwrap();
    }

    let history = tracker.historic(&HistoricFilter::default());
    let csv = codec::export_csv(&history).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "A,A,3,0,0,3,100.0,3,");
    assert_eq!(lines[2], "B,B,2,1,0,3,66.7,2,2024-11-01");
}
