use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A parsed template tree.
///
/// Text leaves carry raw character data exactly as it appeared between tags.
/// Element nodes carry their tag, their attributes, and their children in
/// document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Text(String),
    Element {
        tag: Tag,
        attrs: HashMap<String, String>,
        children: Vec<Node>,
    },
}

impl Node {
    pub fn element(tag: Tag) -> Node {
        Node::Element {
            tag,
            attrs: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn text(content: impl Into<String>) -> Node {
        Node::Text(content.into())
    }

    pub fn tag(&self) -> Option<Tag> {
        match self {
            Node::Text(_) => None,
            Node::Element { tag, .. } => Some(*tag),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            Node::Text(_) => None,
            Node::Element { attrs, .. } => attrs.get(name).map(String::as_str),
        }
    }
}

/// Template element names recognized by AIML 1.0.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    Bot,
    Condition,
    Date,
    Formal,
    Gender,
    Get,
    Gossip,
    Id,
    Input,
    Javascript,
    Learn,
    Li,
    Lowercase,
    Person,
    Person2,
    Random,
    Sentence,
    Set,
    Size,
    Sr,
    Srai,
    Star,
    System,
    Template,
    That,
    Thatstar,
    Think,
    Topicstar,
    Uppercase,
    Version,
}

/// Per-element validation data: required attributes, optional attributes,
/// and whether the element may contain children or text at all. Elements
/// with `may_contain_content == false` are atomic, like `<date/>`.
pub struct TagInfo {
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
    pub may_contain_content: bool,
}

impl Tag {
    pub fn from_name(name: &str) -> Option<Tag> {
        Some(match name {
            "bot" => Tag::Bot,
            "condition" => Tag::Condition,
            "date" => Tag::Date,
            "formal" => Tag::Formal,
            "gender" => Tag::Gender,
            "get" => Tag::Get,
            "gossip" => Tag::Gossip,
            "id" => Tag::Id,
            "input" => Tag::Input,
            "javascript" => Tag::Javascript,
            "learn" => Tag::Learn,
            "li" => Tag::Li,
            "lowercase" => Tag::Lowercase,
            "person" => Tag::Person,
            "person2" => Tag::Person2,
            "random" => Tag::Random,
            "sentence" => Tag::Sentence,
            "set" => Tag::Set,
            "size" => Tag::Size,
            "sr" => Tag::Sr,
            "srai" => Tag::Srai,
            "star" => Tag::Star,
            "system" => Tag::System,
            "template" => Tag::Template,
            "that" => Tag::That,
            "thatstar" => Tag::Thatstar,
            "think" => Tag::Think,
            "topicstar" => Tag::Topicstar,
            "uppercase" => Tag::Uppercase,
            "version" => Tag::Version,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Tag::Bot => "bot",
            Tag::Condition => "condition",
            Tag::Date => "date",
            Tag::Formal => "formal",
            Tag::Gender => "gender",
            Tag::Get => "get",
            Tag::Gossip => "gossip",
            Tag::Id => "id",
            Tag::Input => "input",
            Tag::Javascript => "javascript",
            Tag::Learn => "learn",
            Tag::Li => "li",
            Tag::Lowercase => "lowercase",
            Tag::Person => "person",
            Tag::Person2 => "person2",
            Tag::Random => "random",
            Tag::Sentence => "sentence",
            Tag::Set => "set",
            Tag::Size => "size",
            Tag::Sr => "sr",
            Tag::Srai => "srai",
            Tag::Star => "star",
            Tag::System => "system",
            Tag::Template => "template",
            Tag::That => "that",
            Tag::Thatstar => "thatstar",
            Tag::Think => "think",
            Tag::Topicstar => "topicstar",
            Tag::Uppercase => "uppercase",
            Tag::Version => "version",
        }
    }

    pub fn info(self) -> TagInfo {
        // The "mode" attribute on <system> is a common extension rather
        // than part of the 1.0.1 grammar.
        match self {
            Tag::Bot => TagInfo { required: &["name"], optional: &[], may_contain_content: false },
            Tag::Condition => TagInfo { required: &[], optional: &["name", "value"], may_contain_content: true },
            Tag::Date => TagInfo { required: &[], optional: &[], may_contain_content: false },
            Tag::Formal => TagInfo { required: &[], optional: &[], may_contain_content: true },
            Tag::Gender => TagInfo { required: &[], optional: &[], may_contain_content: true },
            Tag::Get => TagInfo { required: &["name"], optional: &[], may_contain_content: false },
            Tag::Gossip => TagInfo { required: &[], optional: &[], may_contain_content: true },
            Tag::Id => TagInfo { required: &[], optional: &[], may_contain_content: false },
            Tag::Input => TagInfo { required: &[], optional: &["index"], may_contain_content: false },
            Tag::Javascript => TagInfo { required: &[], optional: &[], may_contain_content: true },
            Tag::Learn => TagInfo { required: &[], optional: &[], may_contain_content: true },
            Tag::Li => TagInfo { required: &[], optional: &["name", "value"], may_contain_content: true },
            Tag::Lowercase => TagInfo { required: &[], optional: &[], may_contain_content: true },
            Tag::Person => TagInfo { required: &[], optional: &[], may_contain_content: true },
            Tag::Person2 => TagInfo { required: &[], optional: &[], may_contain_content: true },
            Tag::Random => TagInfo { required: &[], optional: &[], may_contain_content: true },
            Tag::Sentence => TagInfo { required: &[], optional: &[], may_contain_content: true },
            Tag::Set => TagInfo { required: &["name"], optional: &[], may_contain_content: true },
            Tag::Size => TagInfo { required: &[], optional: &[], may_contain_content: false },
            Tag::Sr => TagInfo { required: &[], optional: &[], may_contain_content: false },
            Tag::Srai => TagInfo { required: &[], optional: &[], may_contain_content: true },
            Tag::Star => TagInfo { required: &[], optional: &["index"], may_contain_content: false },
            Tag::System => TagInfo { required: &[], optional: &["mode"], may_contain_content: true },
            Tag::Template => TagInfo { required: &[], optional: &[], may_contain_content: true },
            Tag::That => TagInfo { required: &[], optional: &["index"], may_contain_content: false },
            Tag::Thatstar => TagInfo { required: &[], optional: &["index"], may_contain_content: false },
            Tag::Think => TagInfo { required: &[], optional: &[], may_contain_content: true },
            Tag::Topicstar => TagInfo { required: &[], optional: &["index"], may_contain_content: false },
            Tag::Uppercase => TagInfo { required: &[], optional: &[], may_contain_content: true },
            Tag::Version => TagInfo { required: &[], optional: &[], may_contain_content: false },
        }
    }
}
