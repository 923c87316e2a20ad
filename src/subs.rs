//! Built-in substitution tables and the INI substitution-file loader.
//!
//! Four substituters are conventional: `normal` cleans user input before
//! matching (contraction expansion, common typos), `gender` swaps
//! third-person pronoun gender, `person` swaps first and second person, and
//! `person2` swaps first and third person. Substitution files can replace
//! any of them, or add sections of their own.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use once_cell::sync::Lazy;

use crate::wordsub::WordSub;

pub const GENDER: &str = "gender";
pub const PERSON: &str = "person";
pub const PERSON2: &str = "person2";
pub const NORMAL: &str = "normal";

pub static DEFAULT_GENDER: &[(&str, &str)] = &[
    ("he", "she"),
    ("him", "her"),
    ("his", "her"),
    ("himself", "herself"),
    ("she", "he"),
    ("her", "him"),
    ("hers", "his"),
    ("herself", "himself"),
];

// First person to second person and back. Multi-word keys carry the verb
// along so "I was" does not decay into "you was".
pub static DEFAULT_PERSON: &[(&str, &str)] = &[
    ("I was", "you were"),
    ("you were", "I was"),
    ("I am", "you are"),
    ("you are", "I am"),
    ("I", "you"),
    ("me", "you"),
    ("my", "your"),
    ("mine", "yours"),
    ("myself", "yourself"),
    ("you", "me"),
    ("your", "my"),
    ("yours", "mine"),
    ("yourself", "myself"),
];

// First person to third person and back.
pub static DEFAULT_PERSON2: &[(&str, &str)] = &[
    ("I was", "he or she was"),
    ("I am", "he or she is"),
    ("I", "he or she"),
    ("me", "him or her"),
    ("my", "his or her"),
    ("mine", "his or hers"),
    ("myself", "himself or herself"),
    ("he was", "I was"),
    ("she was", "I was"),
    ("he", "I"),
    ("him", "me"),
    ("his", "my"),
    ("himself", "myself"),
    ("she", "I"),
    ("her", "me"),
    ("hers", "mine"),
    ("herself", "myself"),
];

// Applied to raw input before matching, so patterns can be authored against
// the expanded forms.
pub static DEFAULT_NORMAL: &[(&str, &str)] = &[
    ("wanna", "want to"),
    ("gonna", "going to"),
    ("gotta", "got to"),
    ("I'm", "I am"),
    ("I'd", "I would"),
    ("I'll", "I will"),
    ("I've", "I have"),
    ("you'd", "you would"),
    ("you're", "you are"),
    ("you've", "you have"),
    ("you'll", "you will"),
    ("he's", "he is"),
    ("he'd", "he would"),
    ("he'll", "he will"),
    ("she's", "she is"),
    ("she'd", "she would"),
    ("she'll", "she will"),
    ("we're", "we are"),
    ("we'd", "we would"),
    ("we'll", "we will"),
    ("we've", "we have"),
    ("they're", "they are"),
    ("they'd", "they would"),
    ("they'll", "they will"),
    ("they've", "they have"),
    ("it's", "it is"),
    ("it'd", "it would"),
    ("it'll", "it will"),
    ("that's", "that is"),
    ("there's", "there is"),
    ("what's", "what is"),
    ("where's", "where is"),
    ("who's", "who is"),
    ("let's", "let us"),
    ("can't", "can not"),
    ("cannot", "can not"),
    ("won't", "will not"),
    ("shan't", "shall not"),
    ("don't", "do not"),
    ("doesn't", "does not"),
    ("didn't", "did not"),
    ("isn't", "is not"),
    ("aren't", "are not"),
    ("wasn't", "was not"),
    ("weren't", "were not"),
    ("haven't", "have not"),
    ("hasn't", "has not"),
    ("hadn't", "had not"),
    ("wouldn't", "would not"),
    ("couldn't", "could not"),
    ("shouldn't", "should not"),
    ("mustn't", "must not"),
];

static DEFAULT_SUBBERS: Lazy<HashMap<String, WordSub>> = Lazy::new(|| {
    let mut subbers = HashMap::new();
    subbers.insert(GENDER.to_string(), WordSub::new(DEFAULT_GENDER.iter().copied()));
    subbers.insert(PERSON.to_string(), WordSub::new(DEFAULT_PERSON.iter().copied()));
    subbers.insert(PERSON2.to_string(), WordSub::new(DEFAULT_PERSON2.iter().copied()));
    subbers.insert(NORMAL.to_string(), WordSub::new(DEFAULT_NORMAL.iter().copied()));
    subbers
});

/// The four conventional substituters, built from the default tables.
pub fn default_subbers() -> HashMap<String, WordSub> {
    DEFAULT_SUBBERS.clone()
}

#[derive(Debug)]
pub enum SubsError {
    Io(io::Error),
    /// A line that is neither a section header, a `key = value` pair,
    /// a comment, nor blank.
    Syntax { line: usize, text: String },
    /// A `key = value` pair before any section header.
    PairOutsideSection { line: usize },
}

impl fmt::Display for SubsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubsError::Io(e) => write!(f, "substitution file unreadable: {}", e),
            SubsError::Syntax { line, text } => {
                write!(f, "substitution file line {}: cannot parse {:?}", line, text)
            }
            SubsError::PairOutsideSection { line } => {
                write!(f, "substitution file line {}: pair before any [section]", line)
            }
        }
    }
}

impl std::error::Error for SubsError {}

impl From<io::Error> for SubsError {
    fn from(e: io::Error) -> SubsError {
        SubsError::Io(e)
    }
}

/// Parse a Windows-INI substitution file into per-section pair lists.
/// Sections keep their file order; keys and values are taken literally.
pub fn parse_ini(text: &str) -> Result<Vec<(String, Vec<(String, String)>)>, SubsError> {
    let mut sections: Vec<(String, Vec<(String, String)>)> = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(inner) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            sections.push((inner.trim().to_lowercase(), Vec::new()));
        } else if let Some((key, value)) = line.split_once('=') {
            let Some((_, pairs)) = sections.last_mut() else {
                return Err(SubsError::PairOutsideSection { line: idx + 1 });
            };
            pairs.push((key.trim().to_string(), value.trim().to_string()));
        } else {
            return Err(SubsError::Syntax { line: idx + 1, text: line.to_string() });
        }
    }
    Ok(sections)
}

/// Load a substitution file, one `WordSub` per section.
pub fn load_subs_file(path: &Path) -> Result<Vec<(String, WordSub)>, SubsError> {
    let text = fs::read_to_string(path)?;
    let sections = parse_ini(&text)?;
    Ok(sections
        .into_iter()
        .map(|(name, pairs)| (name, WordSub::new(pairs)))
        .collect())
}
