pub mod attendance;
pub mod codec;
pub mod command_table;
pub mod error;
pub mod ledger;
pub mod notes;
pub mod roster;
pub mod stats;
pub mod store;

pub use attendance::{summarize, AttendanceSummary, AttendanceTracker, HistoricFilter, PlayerAttendance};
pub use codec::{CsvTable, ExportFormat};
pub use command_table::{CommandTable, SquadMember};
pub use error::{ErrorKind, Result, SquadError};
pub use ledger::{EventLedger, NewEvent};
pub use notes::{NoteBook, NoteUpdate};
pub use roster::{ClubSortKey, PlayerSortKey, Record, Roster, SortField};
pub use stats::{aggregate_player_stats, StatCounter, StatsBook};
pub use store::{FileBackend, MemoryBackend, Migrations, Scope, ScopedStore, StorageBackend, StorageKey};

#[cfg(test)]
mod tests;
