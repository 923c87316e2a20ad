//! The template interpreter.
//!
//! `process` walks a template tree and produces the reply text, dispatching
//! on the element tag. Recovery policy: a tag that cannot do its job (bad
//! attribute, missing history, failed subprocess) produces the empty string
//! and logs, so template processing never fails outward. Side effects on
//! predicates always stick, even when the surrounding tag discards its
//! output.

use std::collections::HashMap;
use std::process::{Command, Stdio};

use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::brain::StarKind;
use crate::kernel::KernelState;
use crate::node::{Node, Tag};
use crate::subs;

impl KernelState {
    pub(crate) fn process(&mut self, node: &Node, session_id: &str) -> String {
        match node {
            Node::Text(text) => text.clone(),
            Node::Element { tag, attrs, children } => {
                self.process_element(*tag, attrs, children, session_id)
            }
        }
    }

    fn process_children(&mut self, children: &[Node], session_id: &str) -> String {
        let mut out = String::new();
        for child in children {
            out.push_str(&self.process(child, session_id));
        }
        out
    }

    fn process_element(
        &mut self,
        tag: Tag,
        attrs: &HashMap<String, String>,
        children: &[Node],
        session_id: &str,
    ) -> String {
        match tag {
            Tag::Template | Tag::Li => self.process_children(children, session_id),

            Tag::Bot => match attrs.get("name") {
                Some(name) => self.bot_predicate(name),
                None => {
                    warn!("<bot> element without name attribute");
                    String::new()
                }
            },

            Tag::Condition => self.process_condition(attrs, children, session_id),

            Tag::Date => chrono::Local::now().format("%a %b %e %H:%M:%S %Y").to_string(),

            Tag::Formal => {
                let processed = self.process_children(children, session_id);
                processed
                    .split_whitespace()
                    .map(capitalize)
                    .collect::<Vec<_>>()
                    .join(" ")
            }

            Tag::Gender => {
                let processed = self.process_children(children, session_id);
                self.apply_subber(subs::GENDER, &processed)
            }

            Tag::Get => match attrs.get("name") {
                Some(name) => self.predicate(session_id, name),
                None => {
                    warn!("<get> element without name attribute");
                    String::new()
                }
            },

            // Neither a gossip store nor a javascript engine is wired in, so
            // both behave like <think>: children run for their side effects.
            Tag::Gossip | Tag::Javascript | Tag::Think => {
                self.process_children(children, session_id);
                String::new()
            }

            Tag::Id => session_id.to_string(),

            Tag::Input => {
                let index = index_attr(attrs, "input");
                match self.sessions.session_mut(session_id).input(index) {
                    Some(text) => text.to_string(),
                    None => {
                        debug!("no input history entry {} for <input> element", index);
                        String::new()
                    }
                }
            }

            Tag::Learn => {
                let filename = self.process_children(children, session_id);
                if let Err(e) = self.learn(filename.trim()) {
                    warn!("<learn> failed for {:?}: {}", filename.trim(), e);
                }
                String::new()
            }

            Tag::Lowercase => self.process_children(children, session_id).to_lowercase(),

            Tag::Person => {
                let mut processed = self.process_children(children, session_id);
                // Atomic <person/> shorthand for <person><star/></person>.
                if children.is_empty() {
                    processed = self.star_capture(StarKind::Star, session_id);
                }
                self.apply_subber(subs::PERSON, &processed)
            }

            Tag::Person2 => {
                let mut processed = self.process_children(children, session_id);
                if children.is_empty() {
                    processed = self.star_capture(StarKind::Star, session_id);
                }
                self.apply_subber(subs::PERSON2, &processed)
            }

            Tag::Random => {
                let items: Vec<&Node> = children
                    .iter()
                    .filter(|child| child.tag() == Some(Tag::Li))
                    .collect();
                match items.choose(&mut rand::thread_rng()) {
                    Some(choice) => self.process(choice, session_id),
                    None => String::new(),
                }
            }

            Tag::Sentence => {
                let processed = self.process_children(children, session_id);
                sentence_case(processed.trim())
            }

            Tag::Set => {
                let value = self.process_children(children, session_id);
                match attrs.get("name") {
                    Some(name) => {
                        self.sessions
                            .session_mut(session_id)
                            .set_predicate(name.clone(), value.clone());
                        value
                    }
                    None => {
                        warn!("<set> element without name attribute");
                        String::new()
                    }
                }
            }

            Tag::Size => self.brain.num_templates().to_string(),

            Tag::Sr => {
                let star = self.star_capture(StarKind::Star, session_id);
                self.respond_one(&star, session_id)
            }

            Tag::Srai => {
                let rewritten = self.process_children(children, session_id);
                self.respond_one(&rewritten, session_id)
            }

            Tag::Star => self.star_element(StarKind::Star, attrs, session_id),
            Tag::Thatstar => self.star_element(StarKind::ThatStar, attrs, session_id),
            Tag::Topicstar => self.star_element(StarKind::TopicStar, attrs, session_id),

            Tag::System => self.process_system(attrs, children, session_id),

            Tag::That => {
                let index = index_attr(attrs, "that");
                match self.sessions.session_mut(session_id).output(index) {
                    Some(text) => text.to_string(),
                    None => {
                        debug!("no output history entry {} for <that> element", index);
                        String::new()
                    }
                }
            }

            Tag::Uppercase => self.process_children(children, session_id).to_uppercase(),

            Tag::Version => crate::kernel::VERSION.to_string(),
        }
    }

    /// The three condition shapes: block (name and value on the condition),
    /// single-predicate (name on the condition, value per item), and
    /// multi-predicate (name and value per item). The list shapes scan top
    /// to bottom and fall back to a trailing attribute-less default item.
    fn process_condition(
        &mut self,
        attrs: &HashMap<String, String>,
        children: &[Node],
        session_id: &str,
    ) -> String {
        if let (Some(name), Some(value)) = (attrs.get("name"), attrs.get("value")) {
            if self.predicate(session_id, name) == *value {
                return self.process_children(children, session_id);
            }
            return String::new();
        }

        let condition_name = attrs.get("name").cloned();
        let items: Vec<&Node> = children
            .iter()
            .filter(|child| child.tag() == Some(Tag::Li))
            .collect();
        if items.is_empty() {
            return String::new();
        }

        let last = items.len() - 1;
        for (idx, item) in items.iter().enumerate() {
            let Node::Element { attrs: li_attrs, .. } = item else {
                continue;
            };
            if li_attrs.is_empty() && idx == last {
                continue;
            }
            let Some(li_value) = li_attrs.get("value") else {
                warn!("skipping <li> without a value attribute inside <condition>");
                continue;
            };
            let name = match condition_name.as_ref().or_else(|| li_attrs.get("name")) {
                Some(name) => name.clone(),
                None => {
                    warn!("skipping <li> without a name attribute inside <condition>");
                    continue;
                }
            };
            if self.predicate(session_id, &name) == *li_value {
                return self.process(item, session_id);
            }
        }

        let default = items[last];
        if default.attr("name").is_none() && default.attr("value").is_none() {
            return self.process(default, session_id);
        }
        String::new()
    }

    fn star_element(
        &mut self,
        kind: StarKind,
        attrs: &HashMap<String, String>,
        session_id: &str,
    ) -> String {
        let index = index_attr(attrs, "star");
        if index != 1 {
            warn!("index {} has no meaning in wildcard capture elements", index);
            return String::new();
        }
        self.star_capture(kind, session_id)
    }

    /// Re-run the last match and pull out the requested wildcard capture.
    fn star_capture(&mut self, kind: StarKind, session_id: &str) -> String {
        let (stack_top, that_raw, topic_raw) = {
            let session = self.sessions.session_mut(session_id);
            (
                session.stack_top().map(str::to_string),
                session.last_output().unwrap_or("").to_string(),
                session.get_predicate("topic").to_string(),
            )
        };
        let Some(input) = stack_top else {
            warn!("wildcard capture requested outside of a respond call");
            return String::new();
        };
        let input = self.sub_normal(&input);
        let that = self.sub_normal(&that_raw);
        let topic = self.sub_normal(&topic_raw);
        self.brain.star(kind, &input, &that, &topic)
    }

    fn process_system(
        &mut self,
        attrs: &HashMap<String, String>,
        children: &[Node],
        session_id: &str,
    ) -> String {
        let command = self.process_children(children, session_id);
        let command = command.trim();
        if command.is_empty() {
            return String::new();
        }

        if attrs.get("mode").map(String::as_str) == Some("async") {
            // Fire and forget. Output is dropped unconditionally.
            if let Err(e) = shell(command)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
            {
                warn!("failed to spawn {:?}: {}", command, e);
            }
            return String::new();
        }

        // Sync mode blocks until the child exits. There is no timeout, so a
        // command that never exits hangs the turn.
        match shell(command).stdin(Stdio::null()).output() {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                stdout.lines().collect::<Vec<_>>().join(" ")
            }
            Err(e) => {
                warn!("failed to run {:?}: {}", command, e);
                String::new()
            }
        }
    }

    fn predicate(&mut self, session_id: &str, name: &str) -> String {
        self.sessions
            .session_mut(session_id)
            .get_predicate(name)
            .to_string()
    }

    fn bot_predicate(&self, name: &str) -> String {
        self.bot_predicates.get(name).cloned().unwrap_or_default()
    }

    fn apply_subber(&self, name: &str, text: &str) -> String {
        match self.subbers.get(name) {
            Some(subber) => subber.sub(text),
            None => {
                warn!("no {:?} substituter is loaded", name);
                text.to_string()
            }
        }
    }
}

/// Parse an `index` attribute. `<that>` style `"n,m"` values contribute only
/// `n`; the sentence selector is accepted and ignored.
fn index_attr(attrs: &HashMap<String, String>, element: &str) -> usize {
    let Some(raw) = attrs.get("index") else {
        return 1;
    };
    let first = raw.split(',').next().unwrap_or("").trim();
    match first.parse::<usize>() {
        Ok(index) => index,
        Err(_) => {
            warn!("bad index attribute {:?} in <{}> element", raw, element);
            1
        }
    }
}

/// Run `command` through the platform shell.
fn shell(command: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    }
    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

/// First letter uppercase, rest lowercase.
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Capitalize the first word, leave the rest untouched.
fn sentence_case(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    match text.find(' ') {
        Some(pos) => format!("{} {}", capitalize(&text[..pos]), &text[pos + 1..]),
        None => capitalize(text),
    }
}
