//! Input normalization for the pattern matcher.
//!
//! The same normal form is applied to the user's utterance, to the previous
//! bot response used as `that`, and to the current topic before any of them
//! reach the trie: uppercase, turn whitespace into single spaces, drop every
//! other character outside `[A-Z0-9_* ]`.

/// Split free text into sentences at `.`, `!` and `?`.
///
/// Each sentence is returned trimmed. A trailing fragment with no terminator
/// is kept, so input without punctuation comes back as a single sentence.
pub fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if matches!(ch, '.' | '!' | '?') {
            out.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        out.push(current.trim().to_string());
    }
    out
}

/// Produce the matcher-ready form of a string.
pub fn normalize(text: &str) -> String {
    let filtered: String = text
        .to_uppercase()
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| matches!(c, 'A'..='Z' | '0'..='9' | '_' | '*' | ' '))
        .collect();
    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize and split into match tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Tokenize, pairing every surviving token with the original
/// whitespace-delimited word it came from. A word that normalizes to
/// nothing (pure punctuation) yields no token at all, so positions in this
/// list always line up with the tokens [`tokenize`] would produce.
///
/// Wildcard captures are built from the original words, which is how the
/// capture keeps its case and punctuation.
pub fn tokenize_aligned(text: &str) -> Vec<(String, &str)> {
    text.split_whitespace()
        .filter_map(|word| {
            let token = normalize(word);
            if token.is_empty() {
                None
            } else {
                Some((token, word))
            }
        })
        .collect()
}
