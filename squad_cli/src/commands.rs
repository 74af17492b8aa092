use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use squad_core::{
    aggregate_player_stats, codec, summarize, AttendanceTracker, CsvTable, EventLedger,
    ExportFormat, HistoricFilter, NewEvent, NoteBook, NoteUpdate, Record, Roster, ScopedStore,
    SortField, StatCounter, StatsBook,
};
use squad_schema::{Club, EventMetadata, Note, Player};

use crate::config::{self, Config};
use crate::{Collection, EventAction, NoteAction, RosterAction, TrainingAction};

fn persisted(ok: bool, what: &str) -> anyhow::Result<()> {
    if !ok {
        bail!("failed to persist {what} (see log for details)");
    }
    Ok(())
}

pub fn event(store: &ScopedStore, action: EventAction) -> anyhow::Result<()> {
    let mut ledger = EventLedger::try_load(store).context("failed to load events")?;

    match action {
        EventAction::Add {
            player_id,
            player_name,
            kind,
            team,
            half,
            zone,
            origin,
            action,
        } => {
            let event = ledger.add_event(
                NewEvent::new(kind, player_id, player_name)
                    .team(team)
                    .half(half)
                    .metadata(EventMetadata {
                        goal_zone: zone,
                        goal_origin: origin,
                        action_name: action,
                    }),
            );
            let mut stats = StatsBook::try_load(store).context("failed to load player stats")?;
            stats.record(&event);

            persisted(ledger.save(store), "events")?;
            persisted(stats.save(store), "player stats")?;
            println!("{}", event.id);
        }
        EventAction::Remove { id } => {
            let removed = ledger
                .remove_event(&id)
                .with_context(|| format!("remove failed: {id}"))?;
            persisted(ledger.save(store), "events")?;
            persisted(aggregate_player_stats(ledger.events()).save(store), "player stats")?;
            println!("removed {} ({} by {})", removed.id, removed.kind.as_str(), removed.player_name);
        }
        EventAction::List { live } => {
            let events: Vec<_> = if live {
                ledger.live_feed().collect()
            } else {
                ledger.events().iter().collect()
            };
            if events.is_empty() {
                println!("No events recorded.");
                return Ok(());
            }
            for e in events {
                let mut info = Vec::new();
                if let Some(zone) = &e.metadata.goal_zone {
                    info.push(format!("zone={zone}"));
                }
                if let Some(origin) = &e.metadata.goal_origin {
                    info.push(format!("origin={origin}"));
                }
                if let Some(name) = &e.metadata.action_name {
                    info.push(format!("action={name}"));
                }
                println!(
                    "{} | H{} | {:<12} | {} ({}) | {:?} | {}",
                    e.id,
                    e.half,
                    e.kind.as_str(),
                    e.player_name,
                    e.player_id,
                    e.team,
                    info.join(", ")
                );
            }
        }
    }
    Ok(())
}

pub fn stats(store: &ScopedStore, by: &str) -> anyhow::Result<()> {
    let Some(counter) = StatCounter::parse(by) else {
        let known: Vec<_> = StatCounter::ALL.iter().map(|c| c.as_str()).collect();
        bail!("unknown stat '{by}' (expected one of {})", known.join(", "));
    };

    let book = StatsBook::try_load(store).context("failed to load player stats")?;
    if book.is_empty() {
        println!("No stats yet.");
        return Ok(());
    }
    println!("Player               |  G |  A |  S |  F |  C |  M");
    println!("---------------------|----|----|----|----|----|----");
    for s in book.sorted_by(counter) {
        println!(
            "{:<20} | {:>2} | {:>2} | {:>2} | {:>2} | {:>2} | {:>2}",
            s.player_name,
            s.total_goals,
            s.total_assists,
            s.total_saves,
            s.total_fouls,
            s.total_cards,
            s.matches_played
        );
    }
    Ok(())
}

pub fn training(store: &ScopedStore, action: TrainingAction) -> anyhow::Result<()> {
    let mut tracker = AttendanceTracker::try_load(store).context("failed to load trainings")?;

    match action {
        TrainingAction::Add { date, time, players } => {
            let id = tracker.add_training(date, time, players)?.id.clone();
            persisted(tracker.save(store), "trainings")?;
            println!("{id}");
        }
        TrainingAction::Mark {
            training,
            player,
            attendance,
        } => {
            let status = tracker.update_attendance(&training, &player, attendance)?.status;
            persisted(tracker.save(store), "trainings")?;
            println!("{training}: {status:?}");
        }
        TrainingAction::MarkAll {
            training,
            attendance,
        } => {
            let status = tracker.mark_all(&training, attendance)?.status;
            persisted(tracker.save(store), "trainings")?;
            println!("{training}: {status:?}");
        }
        TrainingAction::List => {
            if tracker.is_empty() {
                println!("No trainings scheduled.");
            }
            for t in tracker.trainings() {
                let s = summarize(t);
                println!(
                    "{} | {} {} | {:?} | present {} absent {} justified {} pending {}",
                    t.id, t.date, t.time, t.status, s.present, s.absent, s.justified, s.pending
                );
            }
        }
        TrainingAction::History { from, to, search } => {
            let history = tracker.historic(&HistoricFilter { from, to, search });
            if history.is_empty() {
                println!("No completed trainings.");
                return Ok(());
            }
            for r in history {
                let last = r
                    .last_absence
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<20} | {:>5.1}% | {}/{} | streak {} | last absence {}",
                    r.player_name, r.attendance_pct, r.present, r.total, r.consecutive_present, last
                );
            }
        }
    }
    Ok(())
}

pub fn note(store: &ScopedStore, action: NoteAction) -> anyhow::Result<()> {
    let mut book = NoteBook::try_load(store).context("failed to load notes")?;

    match action {
        NoteAction::Add {
            title,
            content,
            tags,
        } => {
            let id = book.create(&title, &content, tags)?.id.clone();
            persisted(book.save(store), "notes")?;
            println!("{id}");
        }
        NoteAction::Edit {
            id,
            title,
            content,
            tags,
        } => {
            book.update(&id, NoteUpdate { title, content, tags })?;
            persisted(book.save(store), "notes")?;
        }
        NoteAction::List { search, tag } => {
            let notes = match (&search, &tag) {
                (_, Some(tag)) => book.with_tag(tag),
                (Some(q), None) => book.search(q),
                (None, None) => book.sorted(),
            };
            if notes.is_empty() {
                println!("No notes.");
            }
            for n in notes {
                let pin = if n.pinned { "*" } else { " " };
                println!(
                    "{pin} {} | {} | {} | [{}]",
                    n.id,
                    n.updated_at.format("%Y-%m-%d %H:%M"),
                    n.title,
                    n.tags.join(", ")
                );
            }
        }
        NoteAction::Pin { id } => {
            let pinned = book.toggle_pin(&id)?;
            persisted(book.save(store), "notes")?;
            println!("{id}: {}", if pinned { "pinned" } else { "unpinned" });
        }
        NoteAction::Delete { id } => {
            book.delete(&id)?;
            persisted(book.save(store), "notes")?;
        }
    }
    Ok(())
}

fn load_roster<T: Record>(store: &ScopedStore) -> anyhow::Result<Roster<T>> {
    Roster::try_load(store).with_context(|| format!("failed to load {}", T::COLLECTION))
}

fn parse_sort_key<T: Record>(field: &str) -> anyhow::Result<T::SortKey> {
    match <T::SortKey as SortField>::parse(field) {
        Some(key) => Ok(key),
        None => {
            let known: Vec<_> = <T::SortKey as SortField>::ALL.iter().map(|k| k.as_str()).collect();
            bail!(
                "unknown sort field '{field}' for {} (expected one of {})",
                T::COLLECTION,
                known.join(", ")
            )
        }
    }
}

pub fn roster<T: Record>(store: &ScopedStore, action: RosterAction) -> anyhow::Result<()> {
    let mut roster: Roster<T> = load_roster(store)?;

    match action {
        RosterAction::List { search, sort, desc } => {
            let key = sort.as_deref().map(parse_sort_key::<T>).transpose()?;
            let mut records = match key {
                Some(key) => roster.sort_by(key, desc),
                None => roster.records().iter().collect(),
            };
            if let Some(q) = &search {
                let matching: Vec<&str> = roster.filter(q).into_iter().map(|r| r.id()).collect();
                records.retain(|r| matching.contains(&r.id()));
            }
            if records.is_empty() {
                println!("No {}.", T::COLLECTION);
            }
            for r in records {
                match key {
                    Some(key) => println!("{} | {} | {}", r.id(), r.name(), r.sort_value(key)),
                    None => println!("{} | {}", r.id(), r.name()),
                }
            }
        }
        RosterAction::Remove { id } => {
            let removed = roster.remove(&id)?;
            persisted(roster.save(store), T::COLLECTION)?;
            println!("removed {} ({})", removed.id(), removed.name());
        }
    }
    Ok(())
}

/// Keeps the extension if it names a format, otherwise appends the configured default.
fn export_target(path: PathBuf, fallback: ExportFormat) -> anyhow::Result<(PathBuf, ExportFormat)> {
    if path.extension().is_some() {
        let format = ExportFormat::from_path(&path)?;
        return Ok((path, format));
    }
    let ext = match fallback {
        ExportFormat::Json => "json",
        ExportFormat::Csv => "csv",
    };
    Ok((path.with_extension(ext), fallback))
}

fn export_collection<T: CsvTable + serde::Serialize>(
    name: &str,
    items: &[T],
    format: ExportFormat,
    path: &Path,
) -> anyhow::Result<()> {
    let text = codec::export(name, items, format)
        .with_context(|| format!("failed to export {name}"))?;
    codec::write_export(path, &text).with_context(|| format!("failed to write: {}", path.display()))?;
    println!("exported {} {name} to {}", items.len(), path.display());
    Ok(())
}

pub fn export(
    store: &ScopedStore,
    cfg: &Config,
    collection: Collection,
    path: PathBuf,
) -> anyhow::Result<()> {
    let (path, format) = export_target(path, cfg.export_format())?;

    match collection {
        Collection::Players => {
            let roster: Roster<Player> = load_roster(store)?;
            export_collection(Player::COLLECTION, roster.records(), format, &path)
        }
        Collection::Clubs => {
            let roster: Roster<Club> = load_roster(store)?;
            export_collection(Club::COLLECTION, roster.records(), format, &path)
        }
        Collection::Notes => {
            let book = NoteBook::try_load(store).context("failed to load notes")?;
            export_collection("notes", book.notes(), format, &path)
        }
        Collection::Attendance => {
            let tracker = AttendanceTracker::try_load(store).context("failed to load trainings")?;
            export_collection("attendance", &tracker.historic(&HistoricFilter::default()), format, &path)
        }
    }
}

fn import_records<T: Record + CsvTable>(
    store: &ScopedStore,
    text: &str,
    format: ExportFormat,
) -> anyhow::Result<usize> {
    let records: Vec<T> = codec::import(T::COLLECTION, text, format)?;
    let count = records.len();
    let mut roster: Roster<T> = load_roster(store)?;
    roster.replace_all(records)?;
    persisted(roster.save(store), T::COLLECTION)?;
    Ok(count)
}

fn import_notes(store: &ScopedStore, text: &str, format: ExportFormat) -> anyhow::Result<usize> {
    let notes: Vec<Note> = codec::import("notes", text, format)?;
    let count = notes.len();
    let mut book = NoteBook::try_load(store).context("failed to load notes")?;
    book.replace_all(notes)?;
    persisted(book.save(store), "notes")?;
    Ok(count)
}

pub fn import(store: &ScopedStore, collection: Collection, path: &Path) -> anyhow::Result<()> {
    let format = ExportFormat::from_path(path)?;
    let text = codec::read_import(path)?;

    let count = match collection {
        Collection::Players => import_records::<Player>(store, &text, format),
        Collection::Clubs => import_records::<Club>(store, &text, format),
        Collection::Notes => import_notes(store, &text, format),
        Collection::Attendance => bail!("attendance history is derived and cannot be imported"),
    }
    .with_context(|| format!("import failed: {}", path.display()))?;

    println!("imported {count} records from {}", path.display());
    Ok(())
}

pub fn show_config(cfg: &Config) -> anyhow::Result<()> {
    let (path_str, exists) = match config::get_config_path() {
        Some(path) => {
            let exists = path.exists();
            (path.display().to_string(), exists)
        }
        None => ("Unable to determine config path".to_string(), false),
    };

    println!("Config file: {path_str}{}", if exists { "" } else { " (not found, using defaults)" });
    println!(
        "Data dir:    {}",
        cfg.data_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!();
    let text = toml::to_string_pretty(cfg).context("failed to render config")?;
    print!("{text}");
    Ok(())
}
