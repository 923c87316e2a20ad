//! Parse errors with source positions.
//!
//! A `ParseError` records a byte offset into the source document; line and
//! column are computed against the source when the error is rendered, so the
//! parser never has to track them itself.

use std::fmt;

#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// Byte offset into the source document.
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub enum ParseErrorKind {
    /// The underlying XML reader rejected the document.
    Xml(String),
    /// An element that is not legal in the current parse state.
    UnexpectedTag { tag: String },
    UnexpectedClosingTag { tag: String },
    MissingAttribute { tag: String, attr: String },
    UnexpectedAttribute { tag: String, attr: String },
    /// Character data where the containing element does not allow it.
    UnexpectedText { parent: String },
    /// A child element inside an element that cannot have contents.
    ContentInAtomicElement { parent: String },
    /// A non-`<li>` child of `<random>` or a list-style `<condition>`.
    NonListItemChild { parent: String },
    /// An `<li>` outside `<random>` or a list-style `<condition>`.
    MisplacedListItem { parent: String },
    /// A second attribute-less `<li>` inside one `<condition>`.
    DuplicateDefaultListItem,
    /// An `<li>` whose attributes fit neither the valued nor the default
    /// shape for its `<condition>`.
    InvalidListItem,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, offset: usize) -> ParseError {
        ParseError { kind, offset }
    }

    /// Line and column (both 1-based) of the error within `source`.
    pub fn location(&self, source: &str) -> (usize, usize) {
        let mut line = 1;
        let mut line_start = 0;
        for (i, c) in source.char_indices() {
            if i >= self.offset {
                break;
            }
            if c == '\n' {
                line += 1;
                line_start = i + 1;
            }
        }
        (line, self.offset.saturating_sub(line_start) + 1)
    }

    /// Render the error with the offending source line and a caret.
    pub fn display_with_source(&self, source: &str) -> String {
        let (line, column) = self.location(source);
        let line_content = source.lines().nth(line - 1).unwrap_or("");
        let caret = format!("{}^", " ".repeat(column.saturating_sub(1)));
        format!(
            "error: {} (line {}, column {})\n{:4} | {}\n     | {}",
            self.kind, line, column, line, line_content, caret
        )
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (byte offset {})", self.kind, self.offset)
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::Xml(msg) => write!(f, "malformed XML: {}", msg),
            ParseErrorKind::UnexpectedTag { tag } => write!(f, "unexpected <{}> tag", tag),
            ParseErrorKind::UnexpectedClosingTag { tag } => write!(f, "unexpected </{}> tag", tag),
            ParseErrorKind::MissingAttribute { tag, attr } => {
                write!(f, "required \"{}\" attribute missing in <{}> element", attr, tag)
            }
            ParseErrorKind::UnexpectedAttribute { tag, attr } => {
                write!(f, "unexpected \"{}\" attribute in <{}> element", attr, tag)
            }
            ParseErrorKind::UnexpectedText { parent } => {
                write!(f, "unexpected text inside <{}> element", parent)
            }
            ParseErrorKind::ContentInAtomicElement { parent } => {
                write!(f, "<{}> elements cannot have any contents", parent)
            }
            ParseErrorKind::NonListItemChild { parent } => {
                write!(f, "<{}> elements can only contain <li> subelements", parent)
            }
            ParseErrorKind::MisplacedListItem { parent } => {
                write!(f, "unexpected <li> element contained by <{}> element", parent)
            }
            ParseErrorKind::DuplicateDefaultListItem => {
                write!(f, "unexpected second default <li> element inside <condition>")
            }
            ParseErrorKind::InvalidListItem => {
                write!(f, "invalid <li> attributes for this <condition> element")
            }
        }
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_counts_lines_and_columns() {
        let source = "first line\nsecond line\n";
        let err = ParseError::new(ParseErrorKind::DuplicateDefaultListItem, 18);
        assert_eq!(err.location(source), (2, 8));
    }

    #[test]
    fn location_at_start_is_line_one_column_one() {
        let err = ParseError::new(ParseErrorKind::DuplicateDefaultListItem, 0);
        assert_eq!(err.location("anything"), (1, 1));
    }

    #[test]
    fn display_with_source_shows_line_and_caret() {
        let source = "<aiml>\n<bogus/>\n</aiml>";
        let err = ParseError::new(ParseErrorKind::UnexpectedTag { tag: "bogus".to_string() }, 9);
        let rendered = err.display_with_source(source);
        assert!(rendered.contains("<bogus/>"), "{}", rendered);
        assert!(rendered.contains("line 2"), "{}", rendered);
        assert!(rendered.contains('^'), "{}", rendered);
    }
}
