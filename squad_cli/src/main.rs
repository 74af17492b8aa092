mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use squad_core::{FileBackend, Scope, ScopedStore};
use squad_schema::{Attendance, EventKind, Team, TrainingPlayer};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const LOG_ENV: &str = "SQUAD_LOG";

#[derive(Debug, Parser)]
#[command(name = "squad")]
#[command(about = "Team management data CLI", long_about = None)]
struct Cli {
    /// Directory holding the stored JSON files (default: XDG data home)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// User id used to scope stored data (default: guest)
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, global = true)]
    log_level: Option<String>,

    /// Log file path (default: /dev/null for no logging)
    #[arg(short = 'F', long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record and inspect match events
    Event {
        #[command(subcommand)]
        action: EventAction,
    },
    /// Player leaderboard folded from recorded events
    Stats {
        #[arg(long, default_value = "goals")]
        by: String,
    },
    /// Trainings and attendance
    Training {
        #[command(subcommand)]
        action: TrainingAction,
    },
    Note {
        #[command(subcommand)]
        action: NoteAction,
    },
    Players {
        #[command(subcommand)]
        action: RosterAction,
    },
    Clubs {
        #[command(subcommand)]
        action: RosterAction,
    },
    /// Write a collection to a .json or .csv file
    Export {
        collection: Collection,
        path: PathBuf,
    },
    /// Replace a collection with the contents of a .json or .csv file
    Import {
        collection: Collection,
        path: PathBuf,
    },
    /// Show the resolved configuration
    Config,
}

#[derive(Debug, Subcommand)]
enum EventAction {
    Add {
        #[arg(long)]
        player_id: String,
        #[arg(long)]
        player_name: String,
        #[arg(long, value_parser = parse_kind)]
        kind: EventKind,
        #[arg(long, value_parser = parse_team, default_value = "home")]
        team: Team,
        #[arg(long, default_value_t = 1)]
        half: u8,
        #[arg(long)]
        zone: Option<String>,
        #[arg(long)]
        origin: Option<String>,
        #[arg(long)]
        action: Option<String>,
    },
    Remove {
        id: String,
    },
    List {
        /// Newest first
        #[arg(long)]
        live: bool,
    },
}

#[derive(Debug, Subcommand)]
enum TrainingAction {
    Add {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, default_value = "18:00")]
        time: String,
        /// Roster entry as id:name:position:number (repeatable)
        #[arg(long = "player", value_parser = parse_roster_entry, required = true)]
        players: Vec<TrainingPlayer>,
    },
    Mark {
        training: String,
        player: String,
        #[arg(value_parser = parse_attendance)]
        attendance: Attendance,
    },
    MarkAll {
        training: String,
        #[arg(value_parser = parse_attendance)]
        attendance: Attendance,
    },
    List,
    History {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        search: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum NoteAction {
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long = "tag")]
        tags: Option<Vec<String>>,
    },
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        tag: Option<String>,
    },
    Pin {
        id: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
enum RosterAction {
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        desc: bool,
    },
    Remove {
        id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Collection {
    Players,
    Clubs,
    Notes,
    Attendance,
}

fn parse_kind(s: &str) -> Result<EventKind, String> {
    EventKind::parse(s).ok_or_else(|| {
        let known: Vec<_> = EventKind::ALL.iter().map(|k| k.as_str()).collect();
        format!("unknown event kind '{s}' (expected one of {})", known.join(", "))
    })
}

fn parse_team(s: &str) -> Result<Team, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "home" => Ok(Team::Home),
        "away" => Ok(Team::Away),
        _ => Err(format!("unknown team '{s}' (expected home or away)")),
    }
}

fn parse_attendance(s: &str) -> Result<Attendance, String> {
    Attendance::parse(s)
        .ok_or_else(|| format!("unknown attendance '{s}' (expected present, absent, justified or pending)"))
}

fn parse_roster_entry(s: &str) -> Result<TrainingPlayer, String> {
    let parts: Vec<&str> = s.split(':').map(str::trim).collect();
    let [id, name, position, number] = parts.as_slice() else {
        return Err(format!("expected id:name:position:number, got '{s}'"));
    };
    if id.is_empty() || name.is_empty() {
        return Err(format!("roster entry needs an id and a name: '{s}'"));
    }
    let number = number
        .parse::<u32>()
        .map_err(|e| format!("bad shirt number in '{s}': {e}"))?;
    Ok(TrainingPlayer {
        id: id.to_string(),
        name: name.to_string(),
        position: position.to_string(),
        number,
        attendance: Attendance::Pending,
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::read();

    let log_level = cli.log_level.as_deref().unwrap_or(&cfg.log_level);
    let log_file = cli.log_file.as_deref().unwrap_or(&cfg.log_file);
    init_logging(log_level, log_file);

    if let Command::Config = cli.command {
        return commands::show_config(&cfg);
    }

    let data_dir = cli
        .data_dir
        .clone()
        .or_else(|| cfg.data_dir())
        .context("no data directory: pass --data-dir or set data_dir in config.toml")?;
    let scope = Scope::from_user(cli.user.as_deref().or(cfg.user_id.as_deref()));
    tracing::info!(data_dir = %data_dir.display(), scope = scope.suffix(), "opening store");

    let backend = FileBackend::open(&data_dir)
        .with_context(|| format!("failed to open data dir: {}", data_dir.display()))?;
    let store = ScopedStore::new(backend, scope);

    match cli.command {
        Command::Event { action } => commands::event(&store, action),
        Command::Stats { by } => commands::stats(&store, &by),
        Command::Training { action } => commands::training(&store, action),
        Command::Note { action } => commands::note(&store, action),
        Command::Players { action } => commands::roster::<squad_schema::Player>(&store, action),
        Command::Clubs { action } => commands::roster::<squad_schema::Club>(&store, action),
        Command::Export { collection, path } => commands::export(&store, &cfg, collection, path),
        Command::Import { collection, path } => commands::import(&store, collection, &path),
        Command::Config => commands::show_config(&cfg),
    }
}

/// Maps a configured level onto a filter directive; unknown names mean `info`.
fn level_directive(log_level: &str) -> &'static str {
    match log_level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
}

/// Sends library tracing output to `log_file`. `SQUAD_LOG` takes `EnvFilter`
/// directives (e.g. `squad_core::store=debug`) and overrides `log_level`.
fn init_logging(log_level: &str, log_file: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level_directive(log_level)));

    let file = match std::fs::OpenOptions::new().create(true).append(true).open(log_file) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("logging disabled, cannot open {log_file}: {e}");
            return;
        }
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("logging disabled: {e}");
    }
}
