//! Structural entity extraction.
//!
//! Two listing forms are recognized:
//! - Labeled inline lists: `Active members: Alice, Bob and Carol`
//! - Headed bullet or numbered lists: a label line followed by `- Alice`,
//!   `* Bob`, `1. Carol` items
//!
//! Only listings of two or more entities whose label names a known category
//! are returned. Free prose is never parsed.

use regex_lite::Regex;
use serde::Serialize;

use crate::vocabulary::Vocabulary;

/// Minimum entities for a listing to count as plural.
pub const MIN_LISTING_ENTITIES: usize = 2;

/// Words of a label before the colon. Longer prefixes are sentences.
const MAX_LABEL_WORDS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub category: String,
    pub label: String,
    pub entities: Vec<String>,
}

pub struct Extractor {
    bullet: Regex,
}

impl Extractor {
    pub fn new() -> Result<Self, regex_lite::Error> {
        Ok(Self {
            bullet: Regex::new(r"^\s*(?:[-*•]|\d{1,3}[.)])\s+(.+)$")?,
        })
    }

    pub fn listings(&self, text: &str, vocabulary: &Vocabulary) -> Vec<Listing> {
        let mut listings = Vec::new();
        let mut header: Option<String> = None;
        let mut items: Vec<String> = Vec::new();

        for line in text.lines() {
            if let Some(caps) = self.bullet.captures(line) {
                if header.is_some() {
                    if let Some(entity) = caps.get(1).and_then(|m| bullet_entity(m.as_str())) {
                        items.push(entity);
                    }
                }
                continue;
            }
            // Loose lists separate items with blank lines; only text ends a list.
            if line.trim().is_empty() {
                continue;
            }

            flush(&mut listings, header.take(), &mut items, vocabulary);

            let line = line.trim();
            match line.split_once(':') {
                Some((label, rest)) if !rest.trim().is_empty() => {
                    if let Some(listing) = inline_listing(label, rest, vocabulary) {
                        listings.push(listing);
                    }
                }
                Some((label, _)) => header = Some(clean_label(label)),
                None => header = Some(clean_label(line)),
            }
        }
        flush(&mut listings, header, &mut items, vocabulary);
        listings
    }
}

fn flush(
    listings: &mut Vec<Listing>,
    header: Option<String>,
    items: &mut Vec<String>,
    vocabulary: &Vocabulary,
) {
    let entities = std::mem::take(items);
    let Some(label) = header else {
        return;
    };
    if entities.len() < MIN_LISTING_ENTITIES {
        return;
    }
    if let Some(category) = vocabulary.category_of(&label) {
        listings.push(Listing {
            category: category.to_string(),
            label,
            entities,
        });
    }
}

fn inline_listing(label: &str, rest: &str, vocabulary: &Vocabulary) -> Option<Listing> {
    let label = clean_label(label);
    if label.split_whitespace().count() > MAX_LABEL_WORDS {
        return None;
    }
    let category = vocabulary.category_of(&label)?;

    let mut entities = Vec::new();
    for segment in rest.split([',', ';']) {
        // A following labeled field ends the list.
        if segment.contains(':') {
            break;
        }
        for part in split_and(segment) {
            if let Some(entity) = clean_entity(part) {
                entities.push(entity);
            }
        }
    }

    (entities.len() >= MIN_LISTING_ENTITIES).then(|| Listing {
        category: category.to_string(),
        label,
        entities,
    })
}

fn split_and(segment: &str) -> impl Iterator<Item = &str> {
    segment
        .split(" and ")
        .flat_map(|s| s.split(" & "))
        .map(|s| s.trim_start_matches("and "))
}

/// The entity named by a bullet item: text before any annotation.
fn bullet_entity(item: &str) -> Option<String> {
    let end = [" - ", " – ", " — ", " (", ":", ","]
        .iter()
        .filter_map(|sep| item.find(sep))
        .min()
        .unwrap_or(item.len());
    clean_entity(&item[..end])
}

fn clean_entity(raw: &str) -> Option<String> {
    let trimmed = raw
        .trim()
        .trim_matches(|c: char| matches!(c, '*' | '_' | '`' | '"' | '\'' | '.' | '!' | '?'))
        .trim();
    let entity = match trimmed.find(" (") {
        Some(i) => trimmed[..i].trim(),
        None => trimmed,
    };
    entity
        .chars()
        .any(char::is_alphabetic)
        .then(|| entity.to_string())
}

fn clean_label(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('#')
        .trim_matches(|c: char| matches!(c, '*' | '_' | ' '))
        .to_string()
}
