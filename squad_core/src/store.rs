//! Scoped, versioned key-value persistence.
//!
//! Every feature persists its state under `<feature>_<user-or-guest>`. Values are
//! wrapped in a `{ "schemaVersion", "payload" }` envelope; unwrapped values written
//! by older releases are read as version 0 and migrated forward on first read.

use std::{
    collections::{BTreeMap, HashMap},
    fmt, fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SquadError};

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageKey {
    Notes,
    PlayerActions,
    PlayerStats,
    Trainings,
    Players,
    Clubs,
    CommandTableActions,
    CommandTablePlayers,
    CommandTableVisibility,
    CommandTableOnField,
    CommandTableLiveActions,
}

impl StorageKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::Notes => "notes",
            StorageKey::PlayerActions => "player_actions",
            StorageKey::PlayerStats => "player_stats",
            StorageKey::Trainings => "trainings",
            StorageKey::Players => "players",
            StorageKey::Clubs => "clubs",
            StorageKey::CommandTableActions => "commandTableActions",
            StorageKey::CommandTablePlayers => "commandTablePlayers",
            StorageKey::CommandTableVisibility => "commandTableVisibility",
            StorageKey::CommandTableOnField => "commandTableOnField",
            StorageKey::CommandTableLiveActions => "commandTableLiveActions",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    User(String),
    Guest,
}

impl Scope {
    /// Blank or missing user ids fall back to the shared guest scope.
    pub fn from_user(user_id: Option<&str>) -> Self {
        match user_id.map(str::trim) {
            Some(id) if !id.is_empty() => Scope::User(id.to_string()),
            _ => Scope::Guest,
        }
    }

    pub fn suffix(&self) -> &str {
        match self {
            Scope::User(id) => id,
            Scope::Guest => "guest",
        }
    }

    pub fn key(&self, key: StorageKey) -> String {
        format!("{}_{}", key.as_str(), self.suffix())
    }
}

/// Raw string storage under fully scoped keys.
pub trait StorageBackend: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<String>>;
    fn set_raw(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn keys(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| SquadError::new("E3001", "memory backend lock poisoned"))
    }
}

impl StorageBackend for MemoryBackend {
    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}

/// One `<key>.json` file per key inside a data directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            SquadError::new("E3002", format!("failed to create data dir: {e}"))
                .with_path(dir.display().to_string())
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_file_stem(key)))
    }
}

fn is_plain_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Percent-encodes every byte outside `[A-Za-z0-9_-]`, so distinct keys never
/// share a file.
fn encode_file_stem(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        if is_plain_byte(b) {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn decode_file_stem(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = stem.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b if is_plain_byte(b) => {
                out.push(b);
                i += 1;
            }
            _ => return None,
        }
    }
    String::from_utf8(out).ok()
}

impl StorageBackend for FileBackend {
    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SquadError::new("E3001", format!("failed to read {key}: {e}"))
                .with_key(key)
                .with_path(path.display().to_string())),
        }
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| {
                SquadError::new("E3002", format!("failed to write {key}: {e}"))
                    .with_key(key)
                    .with_path(path.display().to_string())
            })
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SquadError::new("E3002", format!("failed to remove {key}: {e}"))
                .with_key(key)
                .with_path(path.display().to_string())),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            SquadError::new("E3001", format!("failed to list data dir: {e}"))
                .with_path(self.dir.display().to_string())
        })?;
        let mut keys: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                decode_file_stem(name.strip_suffix(".json")?)
            })
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    schema_version: u32,
    payload: Value,
}

/// Splits a stored value into `(version, payload)`. Anything that is not an
/// envelope is a legacy bare payload at version 0.
fn open_envelope(value: Value) -> (u32, Value) {
    let is_envelope = value.as_object().is_some_and(|obj| {
        obj.len() == 2
            && obj.get("schemaVersion").is_some_and(Value::is_u64)
            && obj.contains_key("payload")
    });
    if is_envelope {
        if let Ok(env) = serde_json::from_value::<Envelope>(value.clone()) {
            return (env.schema_version, env.payload);
        }
    }
    (0, value)
}

pub type MigrationFn = fn(Value) -> anyhow::Result<Value>;

/// Upgrade steps per feature key. A step registered at `from` turns a version
/// `from` payload into version `from + 1`; missing steps keep the shape as is.
#[derive(Default, Clone)]
pub struct Migrations {
    steps: HashMap<(StorageKey, u32), MigrationFn>,
}

impl Migrations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, key: StorageKey, from: u32, step: MigrationFn) -> Self {
        self.steps.insert((key, from), step);
        self
    }

    pub fn apply(&self, key: StorageKey, from: u32, mut payload: Value) -> Result<Value> {
        for version in from..CURRENT_SCHEMA_VERSION {
            if let Some(step) = self.steps.get(&(key, version)) {
                payload = step(payload).map_err(|e| {
                    SquadError::new(
                        "E3005",
                        format!("migration of {key} from v{version} failed: {e:#}"),
                    )
                    .with_key(key.as_str())
                })?;
            }
        }
        Ok(payload)
    }
}

impl fmt::Debug for Migrations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migrations")
            .field("steps", &self.steps.len())
            .finish()
    }
}

pub struct ScopedStore {
    backend: Box<dyn StorageBackend>,
    scope: Scope,
    migrations: Migrations,
}

impl ScopedStore {
    pub fn new(backend: impl StorageBackend + 'static, scope: Scope) -> Self {
        Self {
            backend: Box::new(backend),
            scope,
            migrations: Migrations::default(),
        }
    }

    pub fn in_memory(scope: Scope) -> Self {
        Self::new(MemoryBackend::new(), scope)
    }

    pub fn with_migrations(mut self, migrations: Migrations) -> Self {
        self.migrations = migrations;
        self
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    pub fn try_get<T: DeserializeOwned>(&self, key: StorageKey) -> Result<Option<T>> {
        let full = self.scope.key(key);
        let Some(raw) = self.backend.get_raw(&full)? else {
            return Ok(None);
        };

        let value: Value = serde_json::from_str(&raw).map_err(|e| {
            SquadError::new("E3003", format!("stored value for {full} is not json: {e}"))
                .with_key(full.clone())
        })?;
        let (version, payload) = open_envelope(value);
        if version > CURRENT_SCHEMA_VERSION {
            return Err(SquadError::new(
                "E3004",
                format!(
                    "{full} has schema v{version}, newer than supported v{CURRENT_SCHEMA_VERSION}"
                ),
            )
            .with_key(full));
        }

        let payload = self.migrations.apply(key, version, payload)?;
        let typed: T = serde_json::from_value(payload.clone()).map_err(|e| {
            SquadError::new("E3003", format!("stored value for {full} has wrong shape: {e}"))
                .with_key(full.clone())
        })?;

        if version < CURRENT_SCHEMA_VERSION {
            tracing::info!(key = %full, from = version, "migrated stored value");
            if let Err(e) = self.write_envelope(&full, payload) {
                tracing::warn!(key = %full, error = %e, "failed to rewrite migrated value");
            }
        }
        Ok(Some(typed))
    }

    pub fn try_set<T: Serialize>(&self, key: StorageKey, value: &T) -> Result<()> {
        let full = self.scope.key(key);
        let payload = serde_json::to_value(value).map_err(|e| {
            SquadError::new("E3002", format!("failed to serialize {full}: {e}")).with_key(full.clone())
        })?;
        self.write_envelope(&full, payload)
    }

    /// Reads `key`, falling back to `default` when it is missing or unreadable.
    /// Failures are logged, never propagated.
    pub fn get<T: DeserializeOwned>(&self, key: StorageKey, default: T) -> T {
        match self.try_get(key) {
            Ok(Some(v)) => v,
            Ok(None) => default,
            Err(e) => {
                tracing::warn!(key = %self.scope.key(key), error = %e, "using default for unreadable value");
                default
            }
        }
    }

    /// Writes `key`, logging instead of propagating failures.
    pub fn set<T: Serialize>(&self, key: StorageKey, value: &T) -> bool {
        match self.try_set(key, value) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(key = %self.scope.key(key), error = %e, "failed to persist value");
                false
            }
        }
    }

    pub fn remove(&self, key: StorageKey) -> Result<()> {
        self.backend.remove(&self.scope.key(key))
    }

    fn write_envelope(&self, full: &str, payload: Value) -> Result<()> {
        let env = Envelope {
            schema_version: CURRENT_SCHEMA_VERSION,
            payload,
        };
        let json = serde_json::to_string(&env).map_err(|e| {
            SquadError::new("E3002", format!("failed to serialize {full}: {e}")).with_key(full)
        })?;
        tracing::debug!(key = %full, bytes = json.len(), "write");
        self.backend.set_raw(full, &json)
    }
}

impl fmt::Debug for ScopedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedStore")
            .field("scope", &self.scope)
            .field("migrations", &self.migrations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn keys_are_namespaced_by_scope() {
        assert_eq!(Scope::Guest.key(StorageKey::Notes), "notes_guest");
        assert_eq!(
            Scope::from_user(Some("u42")).key(StorageKey::PlayerStats),
            "player_stats_u42"
        );
        assert_eq!(Scope::from_user(Some("  ")), Scope::Guest);
        assert_eq!(Scope::from_user(None), Scope::Guest);
    }

    #[test]
    fn set_then_get_roundtrips_inside_envelope() {
        let store = ScopedStore::in_memory(Scope::Guest);
        store.try_set(StorageKey::Notes, &vec!["a".to_string()]).unwrap();

        let raw = store.backend().get_raw("notes_guest").unwrap().unwrap();
        let v: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["schemaVersion"], CURRENT_SCHEMA_VERSION);
        assert_eq!(v["payload"][0], "a");

        let back: Vec<String> = store.get(StorageKey::Notes, vec![]);
        assert_eq!(back, vec!["a".to_string()]);
    }

    #[test]
    fn scopes_do_not_see_each_other() {
        let backend = std::sync::Arc::new(MemoryBackend::new());
        struct Shared(std::sync::Arc<MemoryBackend>);
        impl StorageBackend for Shared {
            fn get_raw(&self, key: &str) -> Result<Option<String>> {
                self.0.get_raw(key)
            }
            fn set_raw(&self, key: &str, value: &str) -> Result<()> {
                self.0.set_raw(key, value)
            }
            fn remove(&self, key: &str) -> Result<()> {
                self.0.remove(key)
            }
            fn keys(&self) -> Result<Vec<String>> {
                self.0.keys()
            }
        }

        let alice = ScopedStore::new(Shared(backend.clone()), Scope::from_user(Some("alice")));
        let guest = ScopedStore::new(Shared(backend.clone()), Scope::Guest);
        alice.try_set(StorageKey::Notes, &1u32).unwrap();

        assert_eq!(guest.get(StorageKey::Notes, 0u32), 0);
        assert_eq!(alice.get(StorageKey::Notes, 0u32), 1);
        assert_eq!(backend.keys().unwrap(), vec!["notes_alice".to_string()]);
    }

    #[test]
    fn legacy_bare_value_is_migrated_and_rewritten() {
        let store = ScopedStore::in_memory(Scope::Guest);
        store.backend().set_raw("notes_guest", r#"["legacy"]"#).unwrap();

        let back: Vec<String> = store.try_get(StorageKey::Notes).unwrap().unwrap();
        assert_eq!(back, vec!["legacy".to_string()]);

        let raw = store.backend().get_raw("notes_guest").unwrap().unwrap();
        let v: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["schemaVersion"], 1);
        assert_eq!(v["payload"][0], "legacy");
    }

    #[test]
    fn registered_migration_reshapes_legacy_payload() {
        fn wrap_strings(v: Value) -> anyhow::Result<Value> {
            let items = v.as_array().ok_or_else(|| anyhow::anyhow!("expected array"))?;
            Ok(Value::Array(
                items.iter().map(|s| serde_json::json!({ "name": s })).collect(),
            ))
        }

        #[derive(Debug, Deserialize, PartialEq)]
        struct Named {
            name: String,
        }

        let store = ScopedStore::in_memory(Scope::Guest)
            .with_migrations(Migrations::new().register(StorageKey::Players, 0, wrap_strings));
        store.backend().set_raw("players_guest", r#"["Ana","Rui"]"#).unwrap();

        let players: Vec<Named> = store.try_get(StorageKey::Players).unwrap().unwrap();
        assert_eq!(players[1], Named { name: "Rui".to_string() });

        store.backend().set_raw("players_guest", r#"{"not":"an array"}"#).unwrap();
        let err = store.try_get::<Vec<Named>>(StorageKey::Players).unwrap_err();
        assert_eq!(err.code, "E3005");
    }

    #[test]
    fn future_schema_version_is_rejected() {
        let store = ScopedStore::in_memory(Scope::Guest);
        store
            .backend()
            .set_raw("notes_guest", r#"{"schemaVersion":9,"payload":[]}"#)
            .unwrap();

        let err = store.try_get::<Vec<String>>(StorageKey::Notes).unwrap_err();
        assert_eq!(err.code, "E3004");
        assert_eq!(err.kind, ErrorKind::Storage);
    }

    #[test]
    fn corrupted_value_falls_back_to_default() {
        let store = ScopedStore::in_memory(Scope::Guest);
        store.backend().set_raw("trainings_guest", "{not json").unwrap();

        let err = store.try_get::<Vec<u32>>(StorageKey::Trainings).unwrap_err();
        assert_eq!(err.code, "E3003");
        assert_eq!(store.get(StorageKey::Trainings, vec![7u32]), vec![7]);

        store.try_set(StorageKey::Trainings, &"text").unwrap();
        assert_eq!(store.get(StorageKey::Trainings, vec![7u32]), vec![7]);
    }

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "squad_core_store_{tag}_{}_{}",
            std::process::id(),
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[test]
    fn file_backend_persists_across_instances() {
        let dir = temp_dir("persist");

        let first = ScopedStore::new(FileBackend::open(&dir).unwrap(), Scope::from_user(Some("a@b")));
        assert!(first.set(StorageKey::Clubs, &vec![1, 2, 3]));

        let second = ScopedStore::new(FileBackend::open(&dir).unwrap(), Scope::from_user(Some("a@b")));
        assert_eq!(second.get(StorageKey::Clubs, Vec::<i32>::new()), vec![1, 2, 3]);
        assert_eq!(second.backend().keys().unwrap(), vec!["clubs_a@b".to_string()]);
        assert!(dir.join("clubs_a%40b.json").exists());

        second.remove(StorageKey::Clubs).unwrap();
        assert_eq!(second.get(StorageKey::Clubs, Vec::<i32>::new()), Vec::<i32>::new());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn punctuated_user_ids_get_separate_files() {
        let dir = temp_dir("punct");
        let users = ["a.b", "a_b", "a@b", "a%2Eb", "a/b"];

        for user in users {
            let store = ScopedStore::new(FileBackend::open(&dir).unwrap(), Scope::from_user(Some(user)));
            assert!(store.set(StorageKey::Notes, &vec![user.to_string()]));
        }
        for user in users {
            let store = ScopedStore::new(FileBackend::open(&dir).unwrap(), Scope::from_user(Some(user)));
            assert_eq!(store.get(StorageKey::Notes, Vec::<String>::new()), vec![user.to_string()]);
        }

        let mut expected: Vec<String> = users.iter().map(|u| format!("notes_{u}")).collect();
        expected.sort();
        let backend = FileBackend::open(&dir).unwrap();
        assert_eq!(backend.keys().unwrap(), expected);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn file_stem_encoding_is_reversible() {
        for key in ["notes_guest", "notes_a.b", "clubs_ünï", "x%y", "-_-"] {
            assert_eq!(decode_file_stem(&encode_file_stem(key)).as_deref(), Some(key));
        }
        assert_eq!(encode_file_stem("notes_a.b"), "notes_a%2Eb");
        assert_eq!(decode_file_stem("bad%G1"), None);
        assert_eq!(decode_file_stem("trailing%4"), None);
        assert_eq!(decode_file_stem("a.b"), None);
    }
}
