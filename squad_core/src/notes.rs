use chrono::Utc;
use squad_schema::Note;
use uuid::Uuid;

use crate::{
    error::{Result, SquadError},
    store::{ScopedStore, StorageKey},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

fn require(value: &str, code: &'static str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SquadError::new(code, format!("note {field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteBook {
    notes: Vec<Note>,
}

impl NoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_notes(notes: Vec<Note>) -> Self {
        Self { notes }
    }

    pub fn load(store: &ScopedStore) -> Self {
        Self::from_notes(store.get(StorageKey::Notes, Vec::new()))
    }

    /// Fails on an unreadable stored value instead of starting empty.
    pub fn try_load(store: &ScopedStore) -> Result<Self> {
        Ok(Self::from_notes(store.try_get(StorageKey::Notes)?.unwrap_or_default()))
    }

    pub fn save(&self, store: &ScopedStore) -> bool {
        store.set(StorageKey::Notes, &self.notes)
    }

    pub fn create(&mut self, title: &str, content: &str, tags: Vec<String>) -> Result<&Note> {
        let title = require(title, "E1001", "title")?;
        let content = require(content, "E1002", "content")?;
        let now = Utc::now();
        self.notes.push(Note {
            id: Uuid::new_v4().to_string(),
            title,
            content,
            tags: clean_tags(tags),
            created_at: now,
            updated_at: now,
            pinned: false,
        });
        let note = &self.notes[self.notes.len() - 1];
        tracing::debug!(id = %note.id, "note created");
        Ok(note)
    }

    pub fn update(&mut self, id: &str, update: NoteUpdate) -> Result<&Note> {
        let title = update.title.as_deref().map(|t| require(t, "E1001", "title")).transpose()?;
        let content = update
            .content
            .as_deref()
            .map(|c| require(c, "E1002", "content"))
            .transpose()?;

        let note = self.note_mut(id)?;
        if let Some(title) = title {
            note.title = title;
        }
        if let Some(content) = content {
            note.content = content;
        }
        if let Some(tags) = update.tags {
            note.tags = clean_tags(tags);
        }
        note.updated_at = Utc::now();
        Ok(&*note)
    }

    pub fn delete(&mut self, id: &str) -> Result<Note> {
        let Some(pos) = self.notes.iter().position(|n| n.id == id) else {
            return Err(SquadError::not_found("E2001", "note", id));
        };
        Ok(self.notes.remove(pos))
    }

    /// Flips the pin and returns the new state. Pinning does not touch `updated_at`.
    pub fn toggle_pin(&mut self, id: &str) -> Result<bool> {
        let note = self.note_mut(id)?;
        note.pinned = !note.pinned;
        Ok(note.pinned)
    }

    pub fn get(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    fn note_mut(&mut self, id: &str) -> Result<&mut Note> {
        self.notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| SquadError::not_found("E2001", "note", id))
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Swaps in imported notes. Titles and contents must be non-empty and ids
    /// unique; blank ids are generated. On error nothing changes.
    pub fn replace_all(&mut self, notes: Vec<Note>) -> Result<()> {
        let mut fresh: Vec<Note> = Vec::with_capacity(notes.len());
        for (idx, note) in notes.into_iter().enumerate() {
            let row = idx + 1;
            let title = require(&note.title, "E1001", "title").map_err(|e| e.with_row(row))?;
            let content = require(&note.content, "E1002", "content").map_err(|e| e.with_row(row))?;
            let id = match note.id.trim() {
                "" => Uuid::new_v4().to_string(),
                id if fresh.iter().any(|n| n.id == id) => {
                    return Err(SquadError::new("E1003", format!("duplicate note id: {id}"))
                        .with_id(id)
                        .with_row(row));
                }
                id => id.to_string(),
            };
            fresh.push(Note {
                id,
                title,
                content,
                tags: clean_tags(note.tags),
                ..note
            });
        }
        self.notes = fresh;
        Ok(())
    }

    /// Pinned first, then most recently updated.
    pub fn sorted(&self) -> Vec<&Note> {
        let mut out: Vec<&Note> = self.notes.iter().collect();
        out.sort_by(|a, b| {
            b.pinned
                .cmp(&a.pinned)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        });
        out
    }

    pub fn search(&self, query: &str) -> Vec<&Note> {
        let q = query.trim().to_lowercase();
        self.sorted()
            .into_iter()
            .filter(|n| {
                q.is_empty()
                    || n.title.to_lowercase().contains(&q)
                    || n.content.to_lowercase().contains(&q)
                    || n.tags.iter().any(|t| t.to_lowercase().contains(&q))
            })
            .collect()
    }

    pub fn with_tag(&self, tag: &str) -> Vec<&Note> {
        self.sorted()
            .into_iter()
            .filter(|n| n.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn create_trims_and_validates() {
        let mut book = NoteBook::new();
        let note = book
            .create("  Set pieces ", "Near post runs", tags(&["tactics", " tactics", ""]))
            .unwrap();
        assert_eq!(note.title, "Set pieces");
        assert_eq!(note.tags, tags(&["tactics"]));
        assert!(!note.pinned);
        assert_eq!(note.created_at, note.updated_at);

        assert_eq!(book.create("  ", "x", vec![]).unwrap_err().code, "E1001");
        assert_eq!(book.create("t", "\n", vec![]).unwrap_err().code, "E1002");
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn update_rejects_blank_fields_without_partial_writes() {
        let mut book = NoteBook::new();
        let id = book.create("t", "c", vec![]).unwrap().id.clone();

        let err = book
            .update(
                &id,
                NoteUpdate {
                    title: Some("new".to_string()),
                    content: Some(" ".to_string()),
                    tags: None,
                },
            )
            .unwrap_err();
        assert_eq!(err.code, "E1002");
        assert_eq!(book.get(&id).unwrap().title, "t");

        let note = book
            .update(
                &id,
                NoteUpdate {
                    tags: Some(tags(&["fitness"])),
                    ..NoteUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(note.tags, tags(&["fitness"]));
        assert!(note.updated_at >= note.created_at);
    }

    #[test]
    fn toggle_pin_twice_is_identity() {
        let mut book = NoteBook::new();
        let id = book.create("t", "c", vec![]).unwrap().id.clone();

        assert!(book.toggle_pin(&id).unwrap());
        assert!(!book.toggle_pin(&id).unwrap());
        assert!(!book.get(&id).unwrap().pinned);
        assert_eq!(book.toggle_pin("missing").unwrap_err().code, "E2001");
    }

    #[test]
    fn sorted_puts_pinned_first_then_newest() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let note = |id: &str, pinned: bool, mins: i64| Note {
            id: id.to_string(),
            title: id.to_string(),
            content: "c".to_string(),
            tags: vec![],
            created_at: base,
            updated_at: base + Duration::minutes(mins),
            pinned,
        };
        let book = NoteBook::from_notes(vec![
            note("old", false, 1),
            note("pinned-old", true, 0),
            note("new", false, 30),
            note("pinned-new", true, 10),
        ]);

        let order: Vec<_> = book.sorted().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(order, vec!["pinned-new", "pinned-old", "new", "old"]);
    }

    #[test]
    fn search_matches_title_content_and_tags() {
        let mut book = NoteBook::new();
        book.create("Keeper drills", "reflex work", tags(&["GK"])).unwrap();
        book.create("Pressing", "trigger on back pass", tags(&["tactics"])).unwrap();

        assert_eq!(book.search("keeper").len(), 1);
        assert_eq!(book.search("BACK PASS").len(), 1);
        assert_eq!(book.search("tact").len(), 1);
        assert_eq!(book.search("").len(), 2);
        assert_eq!(book.with_tag("gk").len(), 1);
    }

    #[test]
    fn delete_removes_only_that_note() {
        let mut book = NoteBook::new();
        let a = book.create("a", "a", vec![]).unwrap().id.clone();
        let b = book.create("b", "b", vec![]).unwrap().id.clone();

        assert_eq!(book.delete(&a).unwrap().title, "a");
        assert!(book.get(&a).is_none());
        assert!(book.get(&b).is_some());
        assert_eq!(book.delete(&a).unwrap_err().code, "E2001");
    }

    #[test]
    fn replace_all_validates_every_note_or_changes_nothing() {
        let mut source = NoteBook::new();
        source.create("a", "a", vec![]).unwrap();
        source.create("b", "b", vec![]).unwrap();
        let mut imported = source.notes().to_vec();

        let mut book = NoteBook::new();
        book.create("kept", "kept", vec![]).unwrap();

        let mut dup = imported.clone();
        dup[1].id = dup[0].id.clone();
        let err = book.replace_all(dup).unwrap_err();
        assert_eq!((err.code, err.row), ("E1003", Some(2)));

        let mut blank = imported.clone();
        blank[0].title = " ".to_string();
        let err = book.replace_all(blank).unwrap_err();
        assert_eq!((err.code, err.row), ("E1001", Some(1)));
        assert_eq!(book.notes()[0].title, "kept");

        imported[1].id = String::new();
        book.replace_all(imported).unwrap();
        assert_eq!(book.len(), 2);
        assert!(!book.notes()[1].id.is_empty());
        assert_ne!(book.notes()[0].id, book.notes()[1].id);
    }

    #[test]
    fn try_load_refuses_future_schema_and_keeps_it() {
        let store = ScopedStore::in_memory(crate::store::Scope::Guest);
        let raw = r#"{"schemaVersion":2,"payload":[{"id":"keep"}]}"#;
        store.backend().set_raw("notes_guest", raw).unwrap();

        assert_eq!(NoteBook::try_load(&store).unwrap_err().code, "E3004");
        assert!(NoteBook::load(&store).is_empty());
        assert_eq!(store.backend().get_raw("notes_guest").unwrap().as_deref(), Some(raw));
    }
}
