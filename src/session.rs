//! Per-session state: predicates, bounded input/output history, and the
//! input stack used during a single respond call.
//!
//! Sessions are created lazily on first reference. In persistent mode each
//! session is backed by one JSON file named `<dir>/<id>.db`, loaded when the
//! session is first touched and written back after every respond.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// History rings never hold more than this many entries.
pub const MAX_HISTORY: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    predicates: HashMap<String, String>,
    input_history: VecDeque<String>,
    output_history: VecDeque<String>,
    /// Live only inside a single respond call, so it is not persisted.
    #[serde(skip)]
    input_stack: Vec<String>,
}

impl Session {
    pub fn get_predicate(&self, name: &str) -> &str {
        self.predicates.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn set_predicate(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.predicates.insert(name.into(), value.into());
    }

    pub fn push_input(&mut self, input: impl Into<String>) {
        self.input_history.push_back(input.into());
        while self.input_history.len() > MAX_HISTORY {
            self.input_history.pop_front();
        }
    }

    pub fn push_output(&mut self, output: impl Into<String>) {
        self.output_history.push_back(output.into());
        while self.output_history.len() > MAX_HISTORY {
            self.output_history.pop_front();
        }
    }

    /// Input `index` turns back, 1 being the current turn.
    pub fn input(&self, index: usize) -> Option<&str> {
        if index == 0 || index > self.input_history.len() {
            return None;
        }
        self.input_history
            .get(self.input_history.len() - index)
            .map(String::as_str)
    }

    /// Response `index` turns back, 1 being the most recent.
    pub fn output(&self, index: usize) -> Option<&str> {
        if index == 0 || index > self.output_history.len() {
            return None;
        }
        self.output_history
            .get(self.output_history.len() - index)
            .map(String::as_str)
    }

    pub fn last_output(&self) -> Option<&str> {
        self.output_history.back().map(String::as_str)
    }

    pub fn push_stack(&mut self, input: impl Into<String>) {
        self.input_stack.push(input.into());
    }

    pub fn pop_stack(&mut self) -> Option<String> {
        self.input_stack.pop()
    }

    pub fn stack_top(&self) -> Option<&str> {
        self.input_stack.last().map(String::as_str)
    }

    pub fn stack_depth(&self) -> usize {
        self.input_stack.len()
    }

    pub fn history_len(&self) -> (usize, usize) {
        (self.input_history.len(), self.output_history.len())
    }
}

#[derive(Debug)]
pub enum SessionError {
    Io(io::Error),
    Codec(String),
    /// The session id cannot name a file.
    BadSessionId(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Io(e) => write!(f, "session storage error: {}", e),
            SessionError::Codec(detail) => write!(f, "session encoding error: {}", detail),
            SessionError::BadSessionId(id) => {
                write!(f, "session id {:?} cannot be used as a file name", id)
            }
        }
    }
}

impl std::error::Error for SessionError {}

impl From<io::Error> for SessionError {
    fn from(e: io::Error) -> SessionError {
        SessionError::Io(e)
    }
}

pub struct SessionStore {
    sessions: HashMap<String, Session>,
    persistent: bool,
    dir: PathBuf,
}

impl Default for SessionStore {
    fn default() -> SessionStore {
        SessionStore::new()
    }
}

impl SessionStore {
    pub fn new() -> SessionStore {
        SessionStore {
            sessions: HashMap::new(),
            persistent: false,
            dir: PathBuf::from("sessions"),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// Switch between in-memory and file-backed sessions. Existing sessions
    /// are dropped either way, so this belongs shortly after startup.
    pub fn set_persistent(&mut self, enable: bool, dir: Option<&Path>) -> Result<(), SessionError> {
        if enable == self.persistent && dir.is_none() {
            return Ok(());
        }
        if let Some(dir) = dir {
            self.dir = dir.to_path_buf();
        }
        if enable {
            fs::create_dir_all(&self.dir)?;
        }
        self.persistent = enable;
        self.sessions.clear();
        Ok(())
    }

    /// Fetch a session, creating it (or loading its backing file) on first
    /// reference.
    pub fn session_mut(&mut self, id: &str) -> &mut Session {
        if !self.sessions.contains_key(id) {
            let session = if self.persistent {
                self.load_or_default(id)
            } else {
                Session::default()
            };
            self.sessions.insert(id.to_string(), session);
        }
        self.sessions.get_mut(id).expect("session was just inserted")
    }

    fn load_or_default(&self, id: &str) -> Session {
        let path = match self.session_path(id) {
            Ok(path) => path,
            Err(e) => {
                warn!("{}; keeping session in memory only", e);
                return Session::default();
            }
        };
        if !path.exists() {
            return Session::default();
        }
        match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(session) => session,
                Err(e) => {
                    warn!("session file {} unreadable: {}; starting fresh", path.display(), e);
                    Session::default()
                }
            },
            Err(e) => {
                warn!("session file {} unreadable: {}; starting fresh", path.display(), e);
                Session::default()
            }
        }
    }

    /// Write one session's backing file. A no-op when persistence is off or
    /// the session does not exist.
    pub fn sync(&self, id: &str) -> Result<(), SessionError> {
        if !self.persistent {
            return Ok(());
        }
        let Some(session) = self.sessions.get(id) else {
            return Ok(());
        };
        let path = self.session_path(id)?;
        fs::create_dir_all(&self.dir)?;
        let text = serde_json::to_string_pretty(session)
            .map_err(|e| SessionError::Codec(e.to_string()))?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Write every live session's backing file, used at kernel teardown.
    pub fn sync_all(&self) -> Result<(), SessionError> {
        if !self.persistent {
            return Ok(());
        }
        for id in self.sessions.keys() {
            self.sync(id)?;
        }
        Ok(())
    }

    pub fn remove(&mut self, id: &str) {
        self.sessions.remove(id);
    }

    fn session_path(&self, id: &str) -> Result<PathBuf, SessionError> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(SessionError::BadSessionId(id.to_string()));
        }
        Ok(self.dir.join(format!("{}.db", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_predicates_read_as_empty() {
        let mut store = SessionStore::new();
        let session = store.session_mut("s");
        assert_eq!(session.get_predicate("anything"), "");
    }

    #[test]
    fn predicates_round_trip() {
        let mut store = SessionStore::new();
        let session = store.session_mut("s");
        session.set_predicate("fav", "cheese");
        assert_eq!(session.get_predicate("fav"), "cheese");
    }

    #[test]
    fn histories_are_capped() {
        let mut session = Session::default();
        for i in 0..15 {
            session.push_input(format!("in {}", i));
            session.push_output(format!("out {}", i));
        }
        assert_eq!(session.history_len(), (MAX_HISTORY, MAX_HISTORY));
        // The oldest entries were discarded from the front.
        assert_eq!(session.input(MAX_HISTORY), Some("in 5"));
        assert_eq!(session.input(1), Some("in 14"));
        assert_eq!(session.output(1), Some("out 14"));
    }

    #[test]
    fn history_index_out_of_range_is_none() {
        let mut session = Session::default();
        session.push_input("only");
        assert_eq!(session.input(1), Some("only"));
        assert_eq!(session.input(2), None);
        assert_eq!(session.input(0), None);
        assert_eq!(session.output(1), None);
    }

    #[test]
    fn stack_is_lifo() {
        let mut session = Session::default();
        session.push_stack("outer");
        session.push_stack("inner");
        assert_eq!(session.stack_top(), Some("inner"));
        assert_eq!(session.pop_stack().as_deref(), Some("inner"));
        assert_eq!(session.stack_top(), Some("outer"));
        assert_eq!(session.stack_depth(), 1);
    }

    #[test]
    fn persistent_sessions_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::new();
        store.set_persistent(true, Some(dir.path())).unwrap();
        {
            let session = store.session_mut("alice");
            session.set_predicate("fav", "cheese");
            session.push_input("hello");
        }
        store.sync("alice").unwrap();

        let mut reloaded = SessionStore::new();
        reloaded.set_persistent(true, Some(dir.path())).unwrap();
        let session = reloaded.session_mut("alice");
        assert_eq!(session.get_predicate("fav"), "cheese");
        assert_eq!(session.input(1), Some("hello"));
        assert_eq!(session.stack_depth(), 0, "input stack never persists");
    }

    #[test]
    fn enabling_persistence_drops_in_memory_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::new();
        store.session_mut("s").set_predicate("k", "v");
        store.set_persistent(true, Some(dir.path())).unwrap();
        assert_eq!(store.session_mut("s").get_predicate("k"), "");
    }

    #[test]
    fn hostile_session_ids_do_not_become_paths() {
        let store = SessionStore::new();
        assert!(store.session_path("../escape").is_err());
        assert!(store.session_path("a/b").is_err());
        assert!(store.session_path("").is_err());
        assert!(store.session_path("fine-id_01").is_ok());
    }
}
