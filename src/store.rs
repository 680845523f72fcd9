use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use fs2::FileExt;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::models::{RunRecord, SessionRecord};

pub const SESSION_PREFIX: &str = "game-gen-";

/// Stable session key for a description: repeated runs of the same
/// description land in the same session.
pub fn session_key(description: &str) -> String {
    let digest = Sha256::digest(description.trim().as_bytes());
    format!("{SESSION_PREFIX}{}", hex::encode(digest))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Atomically write content to a file using a temporary file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let temp = temp_path(path);
    let mut file = File::create(&temp)
        .with_context(|| format!("Failed to create temporary file: {}", temp.display()))?;
    file.lock_exclusive()
        .context("Failed to acquire file lock")?;
    file.write_all(content)
        .context("Failed to write file content")?;
    file.sync_all().context("Failed to sync file")?;
    file.unlock().context("Failed to unlock file")?;
    fs::rename(&temp, path).with_context(|| format!("Failed to rename to {}", path.display()))?;
    Ok(())
}

fn read_session(path: &Path) -> Result<SessionRecord> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Run history, one TOML file per session.
pub struct SessionStore {
    path: PathBuf,
    sessions: HashMap<String, SessionRecord>,
}

impl SessionStore {
    fn create(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create session directory: {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            sessions: HashMap::new(),
        })
    }

    /// Open the store at `path` with every session loaded, creating the
    /// directory on first use.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut store = Self::create(path.as_ref())?;
        store.load_all()?;
        Ok(store)
    }

    /// Open the store at `path` with only `session_id` loaded. No other file
    /// in the directory is read.
    pub fn open_session<P: AsRef<Path>>(path: P, session_id: &str) -> Result<Self> {
        let mut store = Self::create(path.as_ref())?;
        let file = store.path.join(format!("{session_id}.toml"));
        if file.is_file() {
            store.load_file(&file);
        }
        Ok(store)
    }

    pub fn base_path(&self) -> &Path {
        &self.path
    }

    fn load_all(&mut self) -> Result<()> {
        let dir = fs::read_dir(&self.path).context("Failed to read session directory")?;

        for entry in dir {
            let Ok(entry) = entry else {
                continue;
            };
            let path = entry.path();

            if path.extension() != Some(std::ffi::OsStr::new("toml")) {
                continue;
            }

            self.load_file(&path);
        }

        debug!(count = self.sessions.len(), "Loaded sessions");
        Ok(())
    }

    /// Unreadable or foreign files are logged and skipped.
    fn load_file(&mut self, path: &Path) {
        match read_session(path) {
            Ok(session) => {
                self.sessions.insert(session.session_id.clone(), session);
            }
            Err(e) => warn!(path = %path.display(), error = %format!("{e:#}"), "Skipping session file"),
        }
    }

    pub fn get(&self, session_id: &str) -> Option<&SessionRecord> {
        self.sessions.get(session_id)
    }

    /// Find a session by its full key or an unambiguous prefix of it.
    pub fn resolve(&self, key: &str) -> Result<&SessionRecord> {
        if let Some(session) = self.sessions.get(key) {
            return Ok(session);
        }

        let matches: Vec<&SessionRecord> = self
            .sessions
            .values()
            .filter(|s| {
                s.session_id.starts_with(key)
                    || s.session_id
                        .strip_prefix(SESSION_PREFIX)
                        .is_some_and(|hash| hash.starts_with(key))
            })
            .collect();

        match matches.as_slice() {
            [] => bail!("Session not found: {key}"),
            [session] => Ok(*session),
            _ => bail!(
                "Session key is ambiguous: {key} matches {} sessions",
                matches.len()
            ),
        }
    }

    /// All sessions, most recently updated first.
    pub fn list(&self) -> Vec<&SessionRecord> {
        let mut sessions: Vec<&SessionRecord> = self.sessions.values().collect();
        sessions.sort_by_key(|s| std::cmp::Reverse(s.updated_at));
        sessions
    }

    /// Save a snapshot of `run` under `session_id`, creating the session on
    /// its first run.
    pub fn record_run(&mut self, session_id: &str, description: &str, run: &RunRecord) -> Result<()> {
        let session = self
            .sessions
            .entry(session_id.to_owned())
            .or_insert_with(|| SessionRecord::new(session_id.to_owned(), description.to_owned()));

        session.upsert_run(run);
        session.write_file(&self.path)?;

        debug!(session = session_id, run = %run.run_id, state = run.state.as_ref(), "Recorded run");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunState;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn store() -> (TempDir, SessionStore) {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        (dir, store)
    }

    // -- atomic_write --

    #[rstest]
    #[case::plain_text(b"hello" as &[u8], "hello")]
    #[case::with_newlines(b"line1\nline2", "line1\nline2")]
    #[case::empty(b"", "")]
    fn atomic_write_persists_content(#[case] input: &[u8], #[case] expected: &str) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("game.html");
        atomic_write(&path, input).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), expected);
        assert!(!temp_path(&path).exists());
    }

    #[rstest]
    fn atomic_write_overwrites_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.toml");
        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    // -- session_key --

    #[rstest]
    fn session_key_is_stable_sha256() {
        let key = session_key("An asteroids game.");
        assert_eq!(key, session_key("An asteroids game."));
        assert!(key.starts_with(SESSION_PREFIX));

        let hash = key.strip_prefix(SESSION_PREFIX).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[rstest]
    fn session_key_ignores_surrounding_whitespace_only() {
        assert_eq!(session_key("pong"), session_key("  pong\n"));
        assert_ne!(session_key("pong"), session_key("Pong"));
        assert_ne!(session_key("pong"), session_key("snake"));
    }

    // -- record_run --

    // The first run of a description creates its session file; later
    // snapshots of the same run replace it rather than appending.
    #[rstest]
    fn record_run_creates_then_updates(store: (TempDir, SessionStore)) {
        let (dir, mut store) = store;
        let key = session_key("pong");
        let mut run = RunRecord::start("r1".into());

        store.record_run(&key, "pong", &run).unwrap();
        assert!(dir.path().join(format!("{key}.toml")).exists());

        run.finish(RunState::Accepted);
        store.record_run(&key, "pong", &run).unwrap();

        let session = store.get(&key).unwrap();
        assert_eq!(session.description, "pong");
        assert_eq!(session.runs.len(), 1);
        assert_eq!(session.runs[0].state, RunState::Accepted);
    }

    #[rstest]
    fn open_loads_persisted_sessions(store: (TempDir, SessionStore)) {
        let (dir, mut store) = store;
        let key = session_key("snake");
        store
            .record_run(&key, "snake", &RunRecord::start("r1".into()))
            .unwrap();
        store
            .record_run(&key, "snake", &RunRecord::start("r2".into()))
            .unwrap();

        let reloaded = SessionStore::open(dir.path()).unwrap();
        let session = reloaded.get(&key).unwrap();
        assert_eq!(session.runs.len(), 2);
        assert_eq!(session.last_run().unwrap().run_id, "r2");
    }

    // Files that are not session records never stop the store from opening.
    #[rstest]
    fn open_skips_foreign_toml_files(store: (TempDir, SessionStore)) {
        let (dir, mut store) = store;
        let key = session_key("pong");
        store
            .record_run(&key, "pong", &RunRecord::start("r1".into()))
            .unwrap();
        fs::write(dir.path().join("notes.toml"), "title = \"x\"\n").unwrap();
        fs::write(dir.path().join("broken.toml"), "not [valid toml").unwrap();

        let reloaded = SessionStore::open(dir.path()).unwrap();
        assert_eq!(reloaded.list().len(), 1);
        assert!(reloaded.get(&key).is_some());
    }

    // open_session reads only the requested session's file.
    #[rstest]
    fn open_session_loads_only_its_own_file(store: (TempDir, SessionStore)) {
        let (dir, mut store) = store;
        let pong = session_key("pong");
        let snake = session_key("snake");
        store
            .record_run(&pong, "pong", &RunRecord::start("r1".into()))
            .unwrap();
        store
            .record_run(&snake, "snake", &RunRecord::start("r1".into()))
            .unwrap();
        fs::write(dir.path().join("notes.toml"), "title = \"x\"\n").unwrap();

        let scoped = SessionStore::open_session(dir.path(), &pong).unwrap();
        assert_eq!(scoped.list().len(), 1);
        assert_eq!(scoped.get(&pong).unwrap().runs.len(), 1);
        assert!(scoped.get(&snake).is_none());
    }

    #[rstest]
    fn open_session_starts_fresh_without_a_file() {
        let dir = TempDir::new().unwrap();
        let key = session_key("tetris");
        let mut store = SessionStore::open_session(dir.path(), &key).unwrap();
        assert!(store.get(&key).is_none());

        store
            .record_run(&key, "tetris", &RunRecord::start("r1".into()))
            .unwrap();
        assert!(dir.path().join(format!("{key}.toml")).exists());
    }

    #[rstest]
    fn open_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("tmp").join("sessions");
        let store = SessionStore::open(&nested).unwrap();
        assert!(nested.is_dir());
        assert!(store.list().is_empty());
    }

    // -- resolve --

    #[rstest]
    fn resolve_accepts_full_key_and_hash_prefix(store: (TempDir, SessionStore)) {
        let (_dir, mut store) = store;
        let key = session_key("tetris");
        store
            .record_run(&key, "tetris", &RunRecord::start("r1".into()))
            .unwrap();

        let hash = key.strip_prefix(SESSION_PREFIX).unwrap();
        assert_eq!(store.resolve(&key).unwrap().session_id, key);
        assert_eq!(store.resolve(&hash[..8]).unwrap().session_id, key);
        assert!(store.resolve("zzzz").is_err());
    }

    #[rstest]
    fn resolve_rejects_ambiguous_prefix(store: (TempDir, SessionStore)) {
        let (_dir, mut store) = store;
        for description in ["pong", "snake"] {
            store
                .record_run(
                    &session_key(description),
                    description,
                    &RunRecord::start("r1".into()),
                )
                .unwrap();
        }

        let err = store.resolve(SESSION_PREFIX).unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }
}
