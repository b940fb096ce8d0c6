//! Listing labels → entity categories.

use std::collections::{BTreeMap, HashMap};

/// Plural nouns that mark a listing of each category.
const BUILTIN: &[(&str, &[&str])] = &[
    (
        "player",
        &[
            "players",
            "members",
            "roster",
            "squad",
            "lineup",
            "line-up",
            "starters",
            "substitutes",
            "attendees",
        ],
    ),
    ("match", &["matches", "fixtures", "games", "results"]),
    (
        "payment",
        &["payments", "fees", "dues", "transactions", "debtors", "outstanding"],
    ),
];

#[derive(Debug, Clone)]
pub struct Vocabulary {
    terms: BTreeMap<String, Vec<Vec<String>>>,
}

impl Vocabulary {
    pub fn builtin() -> Self {
        let mut vocabulary = Self {
            terms: BTreeMap::new(),
        };
        for (category, nouns) in BUILTIN {
            vocabulary.extend(category, nouns.iter().copied());
        }
        vocabulary
    }

    /// Built-in terms plus configured ones. Unknown categories are added.
    pub fn with_config(mut self, categories: &HashMap<String, Vec<String>>) -> Self {
        for (category, nouns) in categories {
            self.extend(category, nouns.iter().map(String::as_str));
        }
        self
    }

    pub fn extend<'a>(&mut self, category: &str, nouns: impl IntoIterator<Item = &'a str>) {
        let entry = self.terms.entry(category.to_ascii_lowercase()).or_default();
        for noun in nouns {
            let words = words(noun);
            if !words.is_empty() && !entry.contains(&words) {
                entry.push(words);
            }
        }
    }

    /// The category a label names, if any of its words form a known term.
    pub fn category_of(&self, label: &str) -> Option<&str> {
        let label = words(label);
        self.terms.iter().find_map(|(category, terms)| {
            terms
                .iter()
                .any(|term| label.windows(term.len()).any(|w| w == term.as_slice()))
                .then_some(category.as_str())
        })
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.terms.keys().map(String::as_str)
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::builtin()
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_map_to_categories() {
        let v = Vocabulary::builtin();
        assert_eq!(v.category_of("Active members"), Some("player"));
        assert_eq!(v.category_of("**Upcoming fixtures**"), Some("match"));
        assert_eq!(v.category_of("Outstanding payments"), Some("payment"));
        assert_eq!(v.category_of("Name"), None);
        assert_eq!(v.category_of("Status"), None);
    }

    #[test]
    fn singular_nouns_are_not_listing_labels() {
        let v = Vocabulary::builtin();
        assert_eq!(v.category_of("Player"), None);
        assert_eq!(v.category_of("Match"), None);
    }

    #[test]
    fn configured_terms_extend_vocabulary() {
        let extra = HashMap::from([
            ("player".to_string(), vec!["goalkeepers".to_string()]),
            ("venue".to_string(), vec!["pitches".to_string(), "grounds".to_string()]),
        ]);
        let v = Vocabulary::builtin().with_config(&extra);
        assert_eq!(v.category_of("Available goalkeepers"), Some("player"));
        assert_eq!(v.category_of("Pitches"), Some("venue"));
        assert_eq!(v.categories().count(), 4);
    }
}
