//! The kernel: everything a chat bot needs behind one façade.
//!
//! A `Kernel` owns the category store, the session store, the bot predicate
//! table and the substituters, all guarded by a single mutex. The lock is
//! taken once per public call; the recursive rewrite path used by `<srai>`
//! and `<sr>` runs on the already-borrowed state inside the guard, so
//! reentrancy never touches the lock. Per-turn history mutations are
//! therefore atomic with respect to other callers.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::brain::{Brain, BrainError};
use crate::normalize;
use crate::parser;
use crate::session::{SessionError, SessionStore};
use crate::subs::{self, SubsError};
use crate::wordsub::WordSub;

/// Session used when the caller does not keep per-user sessions.
pub const GLOBAL_SESSION: &str = "_global";

/// Interpreter identification, reported by the `<version>` element.
pub const VERSION: &str = concat!("aimlbot ", env!("CARGO_PKG_VERSION"));

pub struct Kernel {
    state: Mutex<KernelState>,
}

pub(crate) struct KernelState {
    pub(crate) brain: Brain,
    pub(crate) sessions: SessionStore,
    pub(crate) bot_predicates: HashMap<String, String>,
    pub(crate) subbers: HashMap<String, WordSub>,
}

impl Default for Kernel {
    fn default() -> Kernel {
        Kernel::new()
    }
}

impl Kernel {
    pub fn new() -> Kernel {
        let mut state = KernelState {
            brain: Brain::new(),
            sessions: SessionStore::new(),
            bot_predicates: HashMap::new(),
            subbers: subs::default_subbers(),
        };
        state.set_bot_predicate("name", "Nameless");
        state.sessions.session_mut(GLOBAL_SESSION);
        Kernel {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, KernelState> {
        // A panic inside a previous call cannot corrupt the stores in a way
        // that is worth refusing service over.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Load a brain, learn AIML files, then feed startup commands through
    /// `respond`. Returns the command responses.
    pub fn bootstrap(
        &self,
        brain_file: Option<&Path>,
        learn_patterns: &[String],
        commands: &[String],
    ) -> Result<Vec<String>, KernelError> {
        let start = Instant::now();
        if let Some(path) = brain_file {
            self.load_brain(path)?;
        }
        for pattern in learn_patterns {
            self.learn(pattern)?;
        }
        let outputs = commands
            .iter()
            .map(|command| self.respond(command, GLOBAL_SESSION))
            .collect();
        info!("kernel bootstrap completed in {:.2?}", start.elapsed());
        Ok(outputs)
    }

    /// Learn every AIML file matching `pattern` (glob syntax). Files that
    /// fail to parse are logged and skipped; they contribute no categories.
    pub fn learn(&self, pattern: &str) -> Result<(), KernelError> {
        self.lock().learn(pattern)
    }

    /// Produce the bot's reply to `input` within the given session.
    pub fn respond(&self, input: &str, session_id: &str) -> String {
        self.lock().respond_all(input, session_id)
    }

    pub fn get_predicate(&self, name: &str, session_id: &str) -> String {
        self.lock()
            .sessions
            .session_mut(session_id)
            .get_predicate(name)
            .to_string()
    }

    pub fn set_predicate(&self, name: &str, value: &str, session_id: &str) {
        self.lock()
            .sessions
            .session_mut(session_id)
            .set_predicate(name, value);
    }

    pub fn get_bot_predicate(&self, name: &str) -> String {
        self.lock()
            .bot_predicates
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_bot_predicate(&self, name: &str, value: &str) {
        self.lock().set_bot_predicate(name, value);
    }

    /// Replace substituters from a Windows-INI substitution file, one
    /// section per substituter.
    pub fn load_subs(&self, path: &Path) -> Result<(), KernelError> {
        let sections = subs::load_subs_file(path)?;
        let mut state = self.lock();
        for (name, subber) in sections {
            state.subbers.insert(name, subber);
        }
        Ok(())
    }

    /// Switch between in-memory and file-backed sessions. Existing session
    /// data is dropped, so call this shortly after startup.
    pub fn persistent_sessions(&self, enable: bool, dir: Option<&Path>) -> Result<(), KernelError> {
        Ok(self.lock().sessions.set_persistent(enable, dir)?)
    }

    pub fn delete_session(&self, session_id: &str) {
        self.lock().sessions.remove(session_id);
    }

    pub fn save_brain(&self, path: &Path) -> Result<(), KernelError> {
        let state = self.lock();
        let start = Instant::now();
        state.brain.save(path)?;
        info!(
            "saved brain to {} ({} categories in {:.2?})",
            path.display(),
            state.brain.num_templates(),
            start.elapsed()
        );
        Ok(())
    }

    /// Discard the current categories and load a previously saved brain.
    pub fn load_brain(&self, path: &Path) -> Result<(), KernelError> {
        let mut state = self.lock();
        let start = Instant::now();
        state.brain.restore(path)?;
        info!(
            "loaded brain from {} ({} categories in {:.2?})",
            path.display(),
            state.brain.num_templates(),
            start.elapsed()
        );
        Ok(())
    }

    /// Erase all learned categories.
    pub fn reset_brain(&self) {
        self.lock().brain.clear();
    }

    /// The number of categories learned. Categories and templates map one
    /// to one.
    pub fn num_categories(&self) -> u64 {
        self.lock().brain.num_templates()
    }

    pub fn version(&self) -> &'static str {
        VERSION
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        let state = match self.state.get_mut() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = state.sessions.sync_all() {
            warn!("failed to sync sessions at teardown: {}", e);
        }
    }
}

impl KernelState {
    pub(crate) fn set_bot_predicate(&mut self, name: &str, value: &str) {
        self.bot_predicates.insert(name.to_string(), value.to_string());
        // The matcher resolves BOT_NAME edges against the name predicate.
        if name == "name" {
            self.brain.set_bot_name(value);
        }
    }

    pub(crate) fn learn(&mut self, pattern: &str) -> Result<(), KernelError> {
        let mut matched_any = false;
        for entry in glob::glob(pattern)? {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("skipping unreadable path under {:?}: {}", pattern, e);
                    continue;
                }
            };
            matched_any = true;
            let start = Instant::now();
            let source = fs::read_to_string(&path)?;
            match parser::parse(&source) {
                Ok(categories) => {
                    let count = categories.len();
                    for category in categories {
                        self.brain.add(
                            &category.pattern,
                            &category.that,
                            &category.topic,
                            category.template,
                        );
                    }
                    info!(
                        "loaded {} ({} categories in {:.2?})",
                        path.display(),
                        count,
                        start.elapsed()
                    );
                }
                Err(e) => {
                    warn!("parse error in {}:\n{}", path.display(), e.display_with_source(&source));
                }
            }
        }
        if !matched_any {
            debug!("no files matched {:?}", pattern);
        }
        Ok(())
    }

    /// The full per-turn pipeline: split into sentences, update histories
    /// around each inner respond, join the replies.
    pub(crate) fn respond_all(&mut self, input: &str, session_id: &str) -> String {
        if input.is_empty() {
            return String::new();
        }

        let mut responses = Vec::new();
        for sentence in normalize::sentences(input) {
            self.sessions
                .session_mut(session_id)
                .push_input(sentence.clone());
            let response = self.respond_one(&sentence, session_id);
            self.sessions
                .session_mut(session_id)
                .push_output(response.clone());
            responses.push(response);
        }
        let combined = responses.join(" ").trim().to_string();

        if let Err(e) = self.sessions.sync(session_id) {
            warn!("failed to sync session {:?}: {}", session_id, e);
        }
        debug_assert_eq!(
            self.sessions.session_mut(session_id).stack_depth(),
            0,
            "input stack must be empty between respond calls"
        );
        combined
    }

    /// Match and evaluate a single sentence. Histories are untouched here;
    /// this is the reentry point for `<srai>` and `<sr>`.
    pub(crate) fn respond_one(&mut self, input: &str, session_id: &str) -> String {
        if input.is_empty() {
            return String::new();
        }
        self.sessions.session_mut(session_id).push_stack(input);

        let subbed_input = self.sub_normal(input);
        let (that_raw, topic_raw) = {
            let session = self.sessions.session_mut(session_id);
            (
                session.last_output().unwrap_or("").to_string(),
                session.get_predicate("topic").to_string(),
            )
        };
        let subbed_that = self.sub_normal(&that_raw);
        let subbed_topic = self.sub_normal(&topic_raw);

        let template = self
            .brain
            .find(&subbed_input, &subbed_that, &subbed_topic)
            .cloned();
        let response = match template {
            Some(template) => self.process(&template, session_id).trim().to_string(),
            None => {
                debug!("no match found for input: {:?}", input);
                String::new()
            }
        };

        self.sessions.session_mut(session_id).pop_stack();
        response
    }

    pub(crate) fn sub_normal(&self, text: &str) -> String {
        match self.subbers.get(subs::NORMAL) {
            Some(subber) => subber.sub(text),
            None => text.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum KernelError {
    Brain(BrainError),
    Session(SessionError),
    Subs(SubsError),
    Io(io::Error),
    BadGlob(glob::PatternError),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::Brain(e) => write!(f, "{}", e),
            KernelError::Session(e) => write!(f, "{}", e),
            KernelError::Subs(e) => write!(f, "{}", e),
            KernelError::Io(e) => write!(f, "{}", e),
            KernelError::BadGlob(e) => write!(f, "bad file pattern: {}", e),
        }
    }
}

impl std::error::Error for KernelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KernelError::Brain(e) => Some(e),
            KernelError::Session(e) => Some(e),
            KernelError::Subs(e) => Some(e),
            KernelError::Io(e) => Some(e),
            KernelError::BadGlob(e) => Some(e),
        }
    }
}

impl From<BrainError> for KernelError {
    fn from(e: BrainError) -> KernelError {
        KernelError::Brain(e)
    }
}

impl From<SessionError> for KernelError {
    fn from(e: SessionError) -> KernelError {
        KernelError::Session(e)
    }
}

impl From<SubsError> for KernelError {
    fn from(e: SubsError) -> KernelError {
        KernelError::Subs(e)
    }
}

impl From<io::Error> for KernelError {
    fn from(e: io::Error) -> KernelError {
        KernelError::Io(e)
    }
}

impl From<glob::PatternError> for KernelError {
    fn from(e: glob::PatternError) -> KernelError {
        KernelError::BadGlob(e)
    }
}
