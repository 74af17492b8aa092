//! CSV and JSON export/import for the data-management collections.

use std::{fs, path::Path};

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use squad_schema::{Club, Note, Player, Timestamp};

use crate::{
    attendance::PlayerAttendance,
    error::{Result, SquadError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => Ok(Self::Json),
            Some("csv") => Ok(Self::Csv),
            _ => Err(SquadError::new(
                "E4004",
                format!("unsupported file type (expected .json or .csv): {}", path.display()),
            )
            .with_path(path.display().to_string())),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// A collection with a fixed CSV layout.
pub trait CsvTable: Sized {
    const HEADER: &'static [&'static str];
    type Row: Serialize + DeserializeOwned;

    fn to_row(&self) -> Self::Row;
    fn from_row(row: Self::Row) -> Self;
}

impl CsvTable for Player {
    const HEADER: &'static [&'static str] = &[
        "id",
        "name",
        "position",
        "club",
        "nationality",
        "age",
        "goals",
        "rating",
        "salary",
        "marketValue",
    ];
    type Row = Player;

    fn to_row(&self) -> Player {
        self.clone()
    }

    fn from_row(row: Player) -> Self {
        row
    }
}

impl CsvTable for Club {
    const HEADER: &'static [&'static str] =
        &["id", "name", "country", "league", "founded", "revenue", "trophies"];
    type Row = Club;

    fn to_row(&self) -> Club {
        self.clone()
    }

    fn from_row(row: Club) -> Self {
        row
    }
}

impl CsvTable for PlayerAttendance {
    const HEADER: &'static [&'static str] = &[
        "playerId",
        "playerName",
        "present",
        "absent",
        "justified",
        "total",
        "attendancePct",
        "consecutivePresent",
        "lastAbsence",
    ];
    type Row = PlayerAttendance;

    fn to_row(&self) -> PlayerAttendance {
        self.clone()
    }

    fn from_row(row: PlayerAttendance) -> Self {
        row
    }
}

const TAG_SEPARATOR: char = ';';

#[derive(Debug, Serialize, Deserialize)]
pub struct NoteRow {
    id: String,
    title: String,
    content: String,
    tags: String,
    created_at: Timestamp,
    updated_at: Timestamp,
    pinned: bool,
}

impl CsvTable for Note {
    const HEADER: &'static [&'static str] =
        &["id", "title", "content", "tags", "created_at", "updated_at", "pinned"];
    type Row = NoteRow;

    fn to_row(&self) -> NoteRow {
        NoteRow {
            id: self.id.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
            tags: self.tags.join(&TAG_SEPARATOR.to_string()),
            created_at: self.created_at,
            updated_at: self.updated_at,
            pinned: self.pinned,
        }
    }

    fn from_row(row: NoteRow) -> Self {
        Note {
            id: row.id,
            title: row.title,
            content: row.content,
            tags: row
                .tags
                .split(TAG_SEPARATOR)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            pinned: row.pinned,
        }
    }
}

pub fn export_csv<T: CsvTable>(items: &[T]) -> Result<String> {
    let csv_err = |e: csv::Error| SquadError::new("E5002", format!("failed to build csv: {e}"));

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(T::HEADER).map_err(csv_err)?;
    for item in items {
        writer.serialize(item.to_row()).map_err(csv_err)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| SquadError::new("E5002", format!("failed to flush csv: {e}")))?;
    String::from_utf8(bytes).map_err(|e| SquadError::new("E5002", format!("csv is not utf-8: {e}")))
}

/// Parses CSV text whose header row matches `T::HEADER` exactly.
pub fn import_csv<T: CsvTable>(text: &str) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| SquadError::new("E4002", format!("unreadable csv header: {e}")).with_row(0))?;
    if headers.iter().ne(T::HEADER.iter().copied()) {
        return Err(SquadError::new(
            "E4002",
            format!(
                "unexpected csv header: got [{}], expected [{}]",
                headers.iter().collect::<Vec<_>>().join(","),
                T::HEADER.join(",")
            ),
        )
        .with_row(0));
    }

    let mut out = Vec::new();
    for (idx, row) in reader.deserialize::<T::Row>().enumerate() {
        let row = row.map_err(|e| {
            SquadError::new("E4002", format!("bad csv row {}: {e}", idx + 1)).with_row(idx + 1)
        })?;
        out.push(T::from_row(row));
    }
    Ok(out)
}

/// Pretty JSON of the shape `{ "exportDate": ..., "<collection>": [...] }`.
pub fn export_json<T: Serialize>(collection: &str, items: &[T]) -> Result<String> {
    export_json_at(collection, items, Utc::now())
}

pub fn export_json_at<T: Serialize>(collection: &str, items: &[T], at: Timestamp) -> Result<String> {
    let items = serde_json::to_value(items)
        .map_err(|e| SquadError::new("E5002", format!("failed to serialize {collection}: {e}")))?;
    let mut doc = Map::new();
    doc.insert("exportDate".to_string(), Value::String(at.to_rfc3339()));
    doc.insert(collection.to_string(), items);
    serde_json::to_string_pretty(&Value::Object(doc))
        .map_err(|e| SquadError::new("E5002", format!("failed to serialize {collection}: {e}")))
}

pub fn import_json<T: DeserializeOwned>(collection: &str, text: &str) -> Result<Vec<T>> {
    let mut doc: Value = serde_json::from_str(text)
        .map_err(|e| SquadError::new("E4001", format!("invalid json: {e}")))?;
    let Some(items) = doc.get_mut(collection).map(Value::take) else {
        return Err(SquadError::new(
            "E4003",
            format!("json import has no top-level \"{collection}\" key"),
        )
        .with_key(collection));
    };
    serde_json::from_value(items)
        .map_err(|e| SquadError::new("E4001", format!("invalid {collection} entries: {e}")).with_key(collection))
}

pub fn export<T: CsvTable + Serialize>(collection: &str, items: &[T], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => export_json(collection, items),
        ExportFormat::Csv => export_csv(items),
    }
}

pub fn import<T: CsvTable + DeserializeOwned>(
    collection: &str,
    text: &str,
    format: ExportFormat,
) -> Result<Vec<T>> {
    match format {
        ExportFormat::Json => import_json(collection, text),
        ExportFormat::Csv => import_csv(text),
    }
}

pub fn write_export(path: impl AsRef<Path>, contents: &str) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, contents).map_err(|e| {
        SquadError::new("E5002", format!("failed to write export: {e}"))
            .with_path(path.display().to_string())
    })?;
    tracing::info!(path = %path.display(), bytes = contents.len(), "export written");
    Ok(())
}

pub fn read_import(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    fs::read_to_string(path).map_err(|e| {
        SquadError::new("E5001", format!("failed to read import: {e}"))
            .with_path(path.display().to_string())
    })
}
