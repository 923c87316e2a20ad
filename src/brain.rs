//! The category store.
//!
//! All learned categories live in one trie keyed by `Edge`. A category
//! `(pattern, that, topic)` is inserted as its pattern words, a `That`
//! separator, its that words, a `Topic` separator, its topic words, and
//! finally the template payload. Empty that and topic sections default to
//! `*`, so every stored path has the same three-section shape.
//!
//! Matching is a recursive descent that tries, at every node, the
//! high-priority wildcard, then the literal word, then the bot name, then
//! `*`. Wildcards consume one or more tokens, shortest consumption first; a
//! wildcard sitting at the end of its section also matches zero remaining
//! tokens, which is how an empty previous response or topic satisfies a `*`
//! context pattern.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::node::Node;
use crate::normalize;
use crate::token::Edge;

const MAGIC: &[u8; 4] = b"AMLB";
const FORMAT_VERSION: u32 = 1;
/// Magic, format version, payload length, payload crc32.
const HEADER_LEN: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct PatternNode {
    children: HashMap<Edge, PatternNode>,
    template: Option<Node>,
}

/// Which wildcard capture to extract from the last match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StarKind {
    Star,
    ThatStar,
    TopicStar,
}

/// One edge taken during a match, with the number of tokens it consumed.
/// Section boundaries and zero-width trailing wildcards consume none.
/// Captures are sliced straight out of these counts, so extraction always
/// agrees with whatever consumption the backtracking search settled on.
#[derive(Debug, Clone, PartialEq)]
struct PathStep {
    edge: Edge,
    consumed: usize,
}

impl PathStep {
    fn new(edge: Edge, consumed: usize) -> PathStep {
        PathStep { edge, consumed }
    }
}

/// The three sections of a stored path, in match order.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Ctx {
    Input,
    That,
    Topic,
}

pub struct Brain {
    root: PatternNode,
    template_count: u64,
    /// Normalized bot name, matched against single input tokens wherever a
    /// pattern used `<bot name="name"/>`.
    bot_name: String,
}

impl Default for Brain {
    fn default() -> Brain {
        Brain::new()
    }
}

impl Brain {
    pub fn new() -> Brain {
        Brain {
            root: PatternNode::default(),
            template_count: 0,
            bot_name: "NAMELESS".to_string(),
        }
    }

    pub fn num_templates(&self) -> u64 {
        self.template_count
    }

    /// Set the name matched by `BOT_NAME` edges. Only a single-word name can
    /// ever match, since the placeholder consumes exactly one token.
    pub fn set_bot_name(&mut self, name: &str) {
        self.bot_name = normalize::normalize(name);
    }

    /// Drop every learned category.
    pub fn clear(&mut self) {
        self.root = PatternNode::default();
        self.template_count = 0;
    }

    /// Insert a category. Overwriting the template at an existing
    /// `(pattern, that, topic)` path does not bump the template count.
    pub fn add(&mut self, pattern: &str, that: &str, topic: &str, template: Node) {
        let mut node = &mut self.root;
        for word in pattern.split_whitespace() {
            node = node.children.entry(Edge::from_pattern_word(word)).or_default();
        }

        node = node.children.entry(Edge::That).or_default();
        if that.trim().is_empty() {
            node = node.children.entry(Edge::Star).or_default();
        } else {
            for word in that.split_whitespace() {
                node = node.children.entry(Edge::from_pattern_word(word)).or_default();
            }
        }

        node = node.children.entry(Edge::Topic).or_default();
        if topic.trim().is_empty() {
            node = node.children.entry(Edge::Star).or_default();
        } else {
            for word in topic.split_whitespace() {
                node = node.children.entry(Edge::from_pattern_word(word)).or_default();
            }
        }

        if node.template.is_none() {
            self.template_count += 1;
        }
        node.template = Some(template);
    }

    /// Find the best-matching template for an utterance, given the previous
    /// bot response and the current topic. All three are normalized here.
    pub fn find(&self, input: &str, that: &str, topic: &str) -> Option<&Node> {
        self.lookup(input, that, topic).map(|(_, template)| template)
    }

    /// Extract the text captured by the first wildcard of the selected
    /// section in the last match. The capture is rebuilt from the original
    /// words behind the consumed tokens, so its case and punctuation
    /// survive.
    pub fn star(&self, kind: StarKind, input: &str, that: &str, topic: &str) -> String {
        let input_pairs = normalize::tokenize_aligned(input);
        let that_pairs = normalize::tokenize_aligned(that);
        let topic_pairs = normalize::tokenize_aligned(topic);
        let input_words: Vec<&str> = input_pairs.iter().map(|(t, _)| t.as_str()).collect();
        let that_words: Vec<&str> = that_pairs.iter().map(|(t, _)| t.as_str()).collect();
        let topic_words: Vec<&str> = topic_pairs.iter().map(|(t, _)| t.as_str()).collect();

        let Some((path, _)) =
            self.walk(&self.root, &input_words, &that_words, &topic_words, Ctx::Input)
        else {
            return String::new();
        };
        let Some(that_pos) = path.iter().position(|step| step.edge == Edge::That) else {
            return String::new();
        };
        let Some(topic_pos) = path.iter().position(|step| step.edge == Edge::Topic) else {
            return String::new();
        };

        let (section, pairs) = match kind {
            StarKind::Star => (&path[..that_pos], &input_pairs),
            StarKind::ThatStar => (&path[that_pos + 1..topic_pos], &that_pairs),
            StarKind::TopicStar => (&path[topic_pos + 1..], &topic_pairs),
        };

        // Walk the section up to its first wildcard; the consumption counts
        // place the capture exactly where the matcher put it.
        let mut start = 0;
        for step in section {
            if step.edge.is_wildcard() {
                return pairs[start..start + step.consumed]
                    .iter()
                    .map(|(_, word)| *word)
                    .collect::<Vec<_>>()
                    .join(" ");
            }
            start += step.consumed;
        }
        String::new()
    }

    fn lookup(&self, input: &str, that: &str, topic: &str) -> Option<(Vec<PathStep>, &Node)> {
        let input_tokens = normalize::tokenize(input);
        let that_tokens = normalize::tokenize(that);
        let topic_tokens = normalize::tokenize(topic);
        let input_words: Vec<&str> = input_tokens.iter().map(String::as_str).collect();
        let that_words: Vec<&str> = that_tokens.iter().map(String::as_str).collect();
        let topic_words: Vec<&str> = topic_tokens.iter().map(String::as_str).collect();
        self.walk(&self.root, &input_words, &that_words, &topic_words, Ctx::Input)
    }

    fn walk<'a>(
        &self,
        node: &'a PatternNode,
        words: &[&str],
        that: &[&str],
        topic: &[&str],
        ctx: Ctx,
    ) -> Option<(Vec<PathStep>, &'a Node)> {
        if words.is_empty() {
            return self.finish_section(node, that, topic, ctx);
        }
        let first = words[0];
        let suffix = &words[1..];

        #[cfg(feature = "underscore-wildcard")]
        if let Some(child) = node.children.get(&Edge::Underscore) {
            for skip in 0..=suffix.len() {
                if let Some((mut path, template)) = self.walk(child, &suffix[skip..], that, topic, ctx) {
                    path.insert(0, PathStep::new(Edge::Underscore, 1 + skip));
                    return Some((path, template));
                }
            }
        }

        if let Some(child) = node.children.get(&Edge::Word(first.to_string())) {
            if let Some((mut path, template)) = self.walk(child, suffix, that, topic, ctx) {
                path.insert(0, PathStep::new(Edge::Word(first.to_string()), 1));
                return Some((path, template));
            }
        }

        if first == self.bot_name {
            if let Some(child) = node.children.get(&Edge::BotName) {
                if let Some((mut path, template)) = self.walk(child, suffix, that, topic, ctx) {
                    path.insert(0, PathStep::new(Edge::Word(first.to_string()), 1));
                    return Some((path, template));
                }
            }
        }

        if let Some(child) = node.children.get(&Edge::Star) {
            for skip in 0..=suffix.len() {
                if let Some((mut path, template)) = self.walk(child, &suffix[skip..], that, topic, ctx) {
                    path.insert(0, PathStep::new(Edge::Star, 1 + skip));
                    return Some((path, template));
                }
            }
        }

        None
    }

    /// The current section is out of tokens. A trailing wildcard may still
    /// close it with a zero-token match before the path crosses into the
    /// next section or reaches the template.
    fn finish_section<'a>(
        &self,
        node: &'a PatternNode,
        that: &[&str],
        topic: &[&str],
        ctx: Ctx,
    ) -> Option<(Vec<PathStep>, &'a Node)> {
        #[cfg(feature = "underscore-wildcard")]
        if let Some(child) = node.children.get(&Edge::Underscore) {
            if let Some((mut path, template)) = self.finish_section(child, that, topic, ctx) {
                path.insert(0, PathStep::new(Edge::Underscore, 0));
                return Some((path, template));
            }
        }

        match ctx {
            Ctx::Input => {
                if let Some(child) = node.children.get(&Edge::That) {
                    if let Some((mut path, template)) = self.walk(child, that, &[], topic, Ctx::That) {
                        path.insert(0, PathStep::new(Edge::That, 0));
                        return Some((path, template));
                    }
                }
            }
            Ctx::That => {
                if let Some(child) = node.children.get(&Edge::Topic) {
                    if let Some((mut path, template)) = self.walk(child, topic, &[], &[], Ctx::Topic) {
                        path.insert(0, PathStep::new(Edge::Topic, 0));
                        return Some((path, template));
                    }
                }
            }
            Ctx::Topic => {
                if let Some(template) = &node.template {
                    return Some((Vec::new(), template));
                }
            }
        }

        if let Some(child) = node.children.get(&Edge::Star) {
            if let Some((mut path, template)) = self.finish_section(child, that, topic, ctx) {
                path.insert(0, PathStep::new(Edge::Star, 0));
                return Some((path, template));
            }
        }

        None
    }

    /// Write the template count and the trie to a versioned binary file.
    pub fn save(&self, path: &Path) -> Result<(), BrainError> {
        let payload = bincode::serialize(&(self.template_count, &self.root))
            .map_err(|e| BrainError::Codec(e.to_string()))?;
        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        buf.extend_from_slice(&payload);
        fs::write(path, buf)?;
        Ok(())
    }

    /// Replace the current contents with a previously saved brain.
    /// Mismatched magic or format version fails without touching state.
    pub fn restore(&mut self, path: &Path) -> Result<(), BrainError> {
        let data = fs::read(path)?;
        if data.len() < HEADER_LEN || &data[0..4] != MAGIC {
            return Err(BrainError::BadMagic);
        }
        let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        if version != FORMAT_VERSION {
            return Err(BrainError::UnsupportedVersion(version));
        }
        let length = u32::from_le_bytes([data[8], data[9], data[10], data[11]]) as usize;
        let checksum = u32::from_le_bytes([data[12], data[13], data[14], data[15]]);
        let payload = &data[HEADER_LEN..];
        if payload.len() != length {
            return Err(BrainError::Corrupted("payload length mismatch".to_string()));
        }
        if crc32fast::hash(payload) != checksum {
            return Err(BrainError::Corrupted("payload checksum mismatch".to_string()));
        }
        let (template_count, root): (u64, PatternNode) =
            bincode::deserialize(payload).map_err(|e| BrainError::Codec(e.to_string()))?;
        self.template_count = template_count;
        self.root = root;
        Ok(())
    }
}

#[derive(Debug)]
pub enum BrainError {
    Io(io::Error),
    /// The file does not start with the brain magic bytes.
    BadMagic,
    /// The file was written by a different format version.
    UnsupportedVersion(u32),
    /// Length or checksum mismatch.
    Corrupted(String),
    /// Serialization failure.
    Codec(String),
}

impl fmt::Display for BrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrainError::Io(e) => write!(f, "brain file unreadable: {}", e),
            BrainError::BadMagic => write!(f, "not a brain file (bad magic)"),
            BrainError::UnsupportedVersion(v) => {
                write!(f, "brain file format version {} is not supported", v)
            }
            BrainError::Corrupted(detail) => write!(f, "brain file corrupted: {}", detail),
            BrainError::Codec(detail) => write!(f, "brain encoding error: {}", detail),
        }
    }
}

impl std::error::Error for BrainError {}

impl From<io::Error> for BrainError {
    fn from(e: io::Error) -> BrainError {
        BrainError::Io(e)
    }
}
