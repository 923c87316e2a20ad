//! AIML 1.0.1 parser and validator.
//!
//! Drives a state machine over the XML event stream and emits one
//! `Category` per `<category>` element. Validation is structural: element
//! nesting, required and optional attributes, and the `<li>` shape rules
//! inside `<condition>`. A file that declares a version other than 1.0.1
//! (or none, which defaults to 1.0) is read in forward-compatible mode,
//! where unknown elements and their contents are skipped instead of
//! rejected.
//!
//! Categories are emitted as a batch: a parse error anywhere in the file
//! discards the whole file, so the category store never sees partial input.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{ParseError, ParseErrorKind};
use crate::node::{Node, Tag};

/// One `(pattern, that, topic) -> template` rule, keys whitespace-trimmed.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub pattern: String,
    pub that: String,
    pub topic: String,
    pub template: Node,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    OutsideAiml,
    InsideAiml,
    InsideCategory,
    InsidePattern,
    AfterPattern,
    InsideThat,
    AfterThat,
    InsideTemplate,
    AfterTemplate,
}

/// Parse a whole AIML document.
pub fn parse(source: &str) -> Result<Vec<Category>, ParseError> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().expand_empty_elements = true;
    let mut parser = AimlParser::new();

    loop {
        let offset = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = element_name(&e);
                let attrs = element_attrs(&e, offset)?;
                parser.start_element(&name, attrs, offset)?;
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                parser.end_element(&name, offset)?;
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| ParseError::new(ParseErrorKind::Xml(e.to_string()), offset))?;
                parser.characters(&text, offset)?;
            }
            Ok(Event::CData(t)) => {
                let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                parser.characters(&text, offset)?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ParseError::new(ParseErrorKind::Xml(e.to_string()), offset));
            }
        }
    }

    Ok(parser.categories)
}

fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn element_attrs(e: &BytesStart, offset: usize) -> Result<HashMap<String, String>, ParseError> {
    let mut attrs = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ParseError::new(ParseErrorKind::Xml(err.to_string()), offset))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| ParseError::new(ParseErrorKind::Xml(err.to_string()), offset))?
            .into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

struct AimlParser {
    categories: Vec<Category>,
    state: State,
    forward_compatible: bool,
    current_pattern: String,
    current_that: String,
    current_topic: String,
    inside_topic: bool,
    /// Name and nesting depth of the unknown element being skipped.
    skipping: Option<(String, usize)>,
    elem_stack: Vec<Node>,
    /// One entry per open `<condition>`: has its default `<li>` been seen.
    found_default_li: Vec<bool>,
}

impl AimlParser {
    fn new() -> AimlParser {
        AimlParser {
            categories: Vec::new(),
            state: State::OutsideAiml,
            forward_compatible: false,
            current_pattern: String::new(),
            current_that: String::new(),
            current_topic: String::new(),
            inside_topic: false,
            skipping: None,
            elem_stack: Vec::new(),
            found_default_li: Vec::new(),
        }
    }

    fn start_element(
        &mut self,
        name: &str,
        attrs: HashMap<String, String>,
        offset: usize,
    ) -> Result<(), ParseError> {
        if let Some((skipped, depth)) = &mut self.skipping {
            if name == skipped {
                *depth += 1;
            }
            return Ok(());
        }

        match name {
            "aiml" => {
                if self.state != State::OutsideAiml {
                    return Err(ParseError::new(
                        ParseErrorKind::UnexpectedTag { tag: name.to_string() },
                        offset,
                    ));
                }
                self.state = State::InsideAiml;
                self.inside_topic = false;
                self.current_topic.clear();
                // Many published sets omit the version attribute; they are
                // read as 1.0 rather than rejected.
                let version = attrs.get("version").map(String::as_str).unwrap_or("1.0");
                self.forward_compatible = version != "1.0.1";
                Ok(())
            }
            _ if self.state == State::OutsideAiml => Ok(()),
            "topic" if self.state == State::InsideAiml && !self.inside_topic => {
                let topic = attrs.get("name").ok_or_else(|| {
                    ParseError::new(
                        ParseErrorKind::MissingAttribute {
                            tag: "topic".to_string(),
                            attr: "name".to_string(),
                        },
                        offset,
                    )
                })?;
                self.current_topic = topic.clone();
                self.inside_topic = true;
                Ok(())
            }
            "topic" => Err(ParseError::new(
                ParseErrorKind::UnexpectedTag { tag: name.to_string() },
                offset,
            )),
            "category" => {
                if self.state != State::InsideAiml {
                    return Err(ParseError::new(
                        ParseErrorKind::UnexpectedTag { tag: name.to_string() },
                        offset,
                    ));
                }
                self.state = State::InsideCategory;
                self.current_pattern.clear();
                self.current_that.clear();
                if !self.inside_topic {
                    self.current_topic = "*".to_string();
                }
                self.elem_stack.clear();
                Ok(())
            }
            "pattern" => {
                if self.state != State::InsideCategory {
                    return Err(ParseError::new(
                        ParseErrorKind::UnexpectedTag { tag: name.to_string() },
                        offset,
                    ));
                }
                self.state = State::InsidePattern;
                Ok(())
            }
            "that" if self.state == State::AfterPattern => {
                self.state = State::InsideThat;
                Ok(())
            }
            "template" => {
                if self.state != State::AfterPattern && self.state != State::AfterThat {
                    return Err(ParseError::new(
                        ParseErrorKind::UnexpectedTag { tag: name.to_string() },
                        offset,
                    ));
                }
                // A category with no <that> element behaves as <that>*</that>.
                if self.state == State::AfterPattern {
                    self.current_that = "*".to_string();
                }
                self.state = State::InsideTemplate;
                self.elem_stack.push(Node::element(Tag::Template));
                Ok(())
            }
            _ if self.state == State::InsidePattern => {
                if name == "bot" && attrs.get("name").map(String::as_str) == Some("name") {
                    self.current_pattern.push_str(" BOT_NAME ");
                    Ok(())
                } else {
                    Err(ParseError::new(
                        ParseErrorKind::UnexpectedTag { tag: name.to_string() },
                        offset,
                    ))
                }
            }
            _ if self.state == State::InsideThat => {
                if name == "bot" && attrs.get("name").map(String::as_str) == Some("name") {
                    self.current_that.push_str(" BOT_NAME ");
                    Ok(())
                } else {
                    Err(ParseError::new(
                        ParseErrorKind::UnexpectedTag { tag: name.to_string() },
                        offset,
                    ))
                }
            }
            _ if self.state == State::InsideTemplate && Tag::from_name(name).is_some() => {
                let tag = Tag::from_name(name).unwrap();
                self.validate_element_start(tag, &attrs, offset)?;
                self.elem_stack.push(Node::Element {
                    tag,
                    attrs,
                    children: Vec::new(),
                });
                if tag == Tag::Condition {
                    self.found_default_li.push(false);
                }
                Ok(())
            }
            _ => {
                if self.forward_compatible {
                    self.skipping = Some((name.to_string(), 1));
                    Ok(())
                } else {
                    Err(ParseError::new(
                        ParseErrorKind::UnexpectedTag { tag: name.to_string() },
                        offset,
                    ))
                }
            }
        }
    }

    fn characters(&mut self, text: &str, offset: usize) -> Result<(), ParseError> {
        if self.state == State::OutsideAiml || self.skipping.is_some() {
            return Ok(());
        }
        match self.state {
            State::InsidePattern => {
                self.current_pattern.push_str(text);
                Ok(())
            }
            State::InsideThat => {
                self.current_that.push_str(text);
                Ok(())
            }
            State::InsideTemplate => self.template_characters(text, offset),
            _ => Ok(()),
        }
    }

    fn template_characters(&mut self, text: &str, offset: usize) -> Result<(), ParseError> {
        let Some(Node::Element { tag, attrs, children }) = self.elem_stack.last_mut() else {
            return Err(ParseError::new(
                ParseErrorKind::Xml("element stack empty while reading text".to_string()),
                offset,
            ));
        };
        let parent = *tag;
        let list_style_condition =
            parent == Tag::Condition && !(attrs.contains_key("name") && attrs.contains_key("value"));

        if !parent.info().may_contain_content {
            return Err(ParseError::new(
                ParseErrorKind::UnexpectedText { parent: parent.name().to_string() },
                offset,
            ));
        }
        if parent == Tag::Random || list_style_condition {
            // Only the whitespace used to indent <li> children is tolerated.
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(ParseError::new(
                ParseErrorKind::UnexpectedText { parent: parent.name().to_string() },
                offset,
            ));
        }

        // Coalesce adjacent character data into one text leaf.
        if let Some(Node::Text(existing)) = children.last_mut() {
            existing.push_str(text);
        } else {
            children.push(Node::text(text));
        }
        Ok(())
    }

    fn end_element(&mut self, name: &str, offset: usize) -> Result<(), ParseError> {
        if self.state == State::OutsideAiml {
            return Ok(());
        }
        if let Some((skipped, depth)) = &mut self.skipping {
            if name == skipped {
                *depth -= 1;
                if *depth == 0 {
                    self.skipping = None;
                }
            }
            return Ok(());
        }

        match name {
            "aiml" => {
                if self.state != State::InsideAiml {
                    return Err(ParseError::new(
                        ParseErrorKind::UnexpectedClosingTag { tag: name.to_string() },
                        offset,
                    ));
                }
                self.state = State::OutsideAiml;
                Ok(())
            }
            "topic" if self.state == State::InsideAiml && self.inside_topic => {
                self.inside_topic = false;
                self.current_topic.clear();
                Ok(())
            }
            "category" => {
                if self.state != State::AfterTemplate {
                    return Err(ParseError::new(
                        ParseErrorKind::UnexpectedClosingTag { tag: name.to_string() },
                        offset,
                    ));
                }
                self.state = State::InsideAiml;
                let template = self.elem_stack.pop().ok_or_else(|| {
                    ParseError::new(
                        ParseErrorKind::Xml("element stack empty at </category>".to_string()),
                        offset,
                    )
                })?;
                self.categories.push(Category {
                    pattern: self.current_pattern.trim().to_string(),
                    that: self.current_that.trim().to_string(),
                    topic: self.current_topic.trim().to_string(),
                    template,
                });
                Ok(())
            }
            "pattern" => {
                if self.state != State::InsidePattern {
                    return Err(ParseError::new(
                        ParseErrorKind::UnexpectedClosingTag { tag: name.to_string() },
                        offset,
                    ));
                }
                self.state = State::AfterPattern;
                Ok(())
            }
            "that" if self.state == State::InsideThat => {
                self.state = State::AfterThat;
                Ok(())
            }
            "template" => {
                if self.state != State::InsideTemplate {
                    return Err(ParseError::new(
                        ParseErrorKind::UnexpectedClosingTag { tag: name.to_string() },
                        offset,
                    ));
                }
                self.state = State::AfterTemplate;
                Ok(())
            }
            "bot" if self.state == State::InsidePattern || self.state == State::InsideThat => Ok(()),
            _ if self.state == State::InsideTemplate => {
                let elem = self.elem_stack.pop().ok_or_else(|| {
                    ParseError::new(
                        ParseErrorKind::Xml("element stack empty at closing tag".to_string()),
                        offset,
                    )
                })?;
                if elem.tag() == Some(Tag::Condition) {
                    self.found_default_li.pop();
                }
                match self.elem_stack.last_mut() {
                    Some(Node::Element { children, .. }) => children.push(elem),
                    _ => {
                        return Err(ParseError::new(
                            ParseErrorKind::UnexpectedClosingTag { tag: name.to_string() },
                            offset,
                        ))
                    }
                }
                Ok(())
            }
            _ => Err(ParseError::new(
                ParseErrorKind::UnexpectedClosingTag { tag: name.to_string() },
                offset,
            )),
        }
    }

    /// Attribute and containment rules for an element opening inside a
    /// template.
    fn validate_element_start(
        &mut self,
        tag: Tag,
        attrs: &HashMap<String, String>,
        offset: usize,
    ) -> Result<(), ParseError> {
        let info = tag.info();
        if !self.forward_compatible {
            for required in info.required {
                if !attrs.contains_key(*required) {
                    return Err(ParseError::new(
                        ParseErrorKind::MissingAttribute {
                            tag: tag.name().to_string(),
                            attr: required.to_string(),
                        },
                        offset,
                    ));
                }
            }
            for attr in attrs.keys() {
                if !info.required.contains(&attr.as_str()) && !info.optional.contains(&attr.as_str()) {
                    return Err(ParseError::new(
                        ParseErrorKind::UnexpectedAttribute {
                            tag: tag.name().to_string(),
                            attr: attr.clone(),
                        },
                        offset,
                    ));
                }
            }
        }

        let Some(Node::Element { tag: parent, attrs: parent_attrs, .. }) = self.elem_stack.last() else {
            return Err(ParseError::new(
                ParseErrorKind::Xml("element stack empty while validating".to_string()),
                offset,
            ));
        };
        let parent = *parent;
        let list_style_condition = parent == Tag::Condition
            && !(parent_attrs.contains_key("name") && parent_attrs.contains_key("value"));

        if !parent.info().may_contain_content {
            return Err(ParseError::new(
                ParseErrorKind::ContentInAtomicElement { parent: parent.name().to_string() },
                offset,
            ));
        }
        if (parent == Tag::Random || list_style_condition) && tag != Tag::Li {
            return Err(ParseError::new(
                ParseErrorKind::NonListItemChild { parent: parent.name().to_string() },
                offset,
            ));
        }

        if tag == Tag::Li {
            if !(parent == Tag::Random || list_style_condition) {
                return Err(ParseError::new(
                    ParseErrorKind::MisplacedListItem { parent: parent.name().to_string() },
                    offset,
                ));
            }
            if list_style_condition {
                if parent_attrs.contains_key("name") {
                    // Single-predicate condition: items carry a value, except
                    // the one optional default item.
                    if attrs.is_empty() {
                        self.note_default_li(offset)?;
                    } else if !(attrs.len() == 1 && attrs.contains_key("value")) {
                        return Err(ParseError::new(ParseErrorKind::InvalidListItem, offset));
                    }
                } else if parent_attrs.is_empty() {
                    // Multi-predicate condition: items carry their own name
                    // and value, except the one optional default item.
                    if attrs.is_empty() {
                        self.note_default_li(offset)?;
                    } else if !(attrs.len() == 2
                        && attrs.contains_key("name")
                        && attrs.contains_key("value"))
                    {
                        return Err(ParseError::new(ParseErrorKind::InvalidListItem, offset));
                    }
                }
            }
        }
        Ok(())
    }

    fn note_default_li(&mut self, offset: usize) -> Result<(), ParseError> {
        match self.found_default_li.last_mut() {
            Some(found) if *found => {
                Err(ParseError::new(ParseErrorKind::DuplicateDefaultListItem, offset))
            }
            Some(found) => {
                *found = true;
                Ok(())
            }
            None => Err(ParseError::new(
                ParseErrorKind::Xml("condition bookkeeping stack empty".to_string()),
                offset,
            )),
        }
    }
}
