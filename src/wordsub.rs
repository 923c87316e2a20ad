//! Word-boundary multi-word substitution.
//!
//! A `WordSub` compiles its whole key set into one case-insensitive
//! alternation, sorted longest key first so that multi-word keys bind before
//! shorter keys they overlap with. Substitution is a single pass: replaced
//! text is never rescanned, so a table whose values feed back into its keys
//! still terminates and applies each rule at most once per site.

use std::collections::HashMap;

use regex::{Captures, Regex};

pub struct WordSub {
    /// Lowercased key to lowercased replacement.
    map: HashMap<String, String>,
    /// None when the key set is empty; `sub` is then the identity.
    regex: Option<Regex>,
}

impl WordSub {
    pub fn new<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> WordSub
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut map = HashMap::new();
        for (k, v) in pairs {
            map.insert(k.as_ref().to_lowercase(), v.as_ref().to_lowercase());
        }
        let regex = Self::compile(&map);
        WordSub { map, regex }
    }

    fn compile(map: &HashMap<String, String>) -> Option<Regex> {
        if map.is_empty() {
            return None;
        }
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then_with(|| a.cmp(b)));
        let alternation = keys
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(r"(?i)\b(?:{})\b", alternation);
        // The pattern is built purely from escaped literals, so it compiles
        // for every non-empty key set.
        Regex::new(&pattern).ok()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Apply every substitution to `text` in one pass.
    pub fn sub(&self, text: &str) -> String {
        let Some(regex) = &self.regex else {
            return text.to_string();
        };
        regex
            .replace_all(text, |caps: &Captures| {
                let matched = &caps[0];
                match self.map.get(&matched.to_lowercase()) {
                    Some(replacement) => restore_case(matched, replacement),
                    None => matched.to_string(),
                }
            })
            .into_owned()
    }
}

impl Clone for WordSub {
    fn clone(&self) -> WordSub {
        WordSub {
            map: self.map.clone(),
            regex: self.regex.clone(),
        }
    }
}

impl std::fmt::Debug for WordSub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordSub").field("entries", &self.map.len()).finish()
    }
}

/// Carry the case shape of the matched source over to the replacement:
/// all-caps source gives an all-caps replacement, a capitalized first letter
/// gives a title-cased replacement, anything else stays lowercase.
fn restore_case(source: &str, replacement: &str) -> String {
    let has_upper = source.chars().any(|c| c.is_uppercase());
    let has_lower = source.chars().any(|c| c.is_lowercase());
    if has_upper && !has_lower {
        replacement.to_uppercase()
    } else if source.chars().next().is_some_and(|c| c.is_uppercase()) {
        let mut chars = replacement.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
            None => String::new(),
        }
    } else {
        replacement.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subber(pairs: &[(&str, &str)]) -> WordSub {
        WordSub::new(pairs.iter().copied())
    }

    #[test]
    fn replaces_whole_words_only() {
        let s = subber(&[("he", "she")]);
        assert_eq!(s.sub("he said hello to the theater"), "she said hello to the theater");
    }

    #[test]
    fn longer_keys_bind_before_their_prefixes() {
        let s = subber(&[("with you", "with me"), ("you", "I")]);
        assert_eq!(s.sub("are you coming with you know who"), "are i coming with me know who");
    }

    #[test]
    fn single_pass_does_not_rescan_replacements() {
        let s = subber(&[("a", "b"), ("b", "c")]);
        assert_eq!(s.sub("a b"), "b c");
    }

    #[test]
    fn all_caps_source_uppercases_replacement() {
        let s = subber(&[("he", "she")]);
        assert_eq!(s.sub("HE shouted"), "SHE shouted");
    }

    #[test]
    fn capitalized_source_title_cases_replacement() {
        let s = subber(&[("he", "she")]);
        assert_eq!(s.sub("He left"), "She left");
    }

    #[test]
    fn lowercase_source_lowercases_replacement() {
        let s = subber(&[("usa", "United States")]);
        assert_eq!(s.sub("from the usa today"), "from the united states today");
    }

    #[test]
    fn idempotent_when_values_are_disjoint_from_keys() {
        let s = subber(&[("cannot", "can not"), ("dont", "do not")]);
        let once = s.sub("I cannot say I dont care");
        assert_eq!(s.sub(&once), once);
    }

    #[test]
    fn empty_table_is_identity() {
        let s = WordSub::new(Vec::<(&str, &str)>::new());
        assert_eq!(s.sub("unchanged text"), "unchanged text");
    }

    #[test]
    fn keys_with_apostrophes_match() {
        let s = subber(&[("can't", "can not")]);
        assert_eq!(s.sub("I can't dance"), "I can not dance");
        assert_eq!(s.sub("a cant of timber"), "a cant of timber");
    }
}
