//! The invocation ledger: what the executor actually retrieved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One capability call made during a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRecord {
    pub capability: String,

    /// The actual input parameters
    #[serde(default)]
    pub params: serde_json::Value,

    /// The raw structured result
    #[serde(default)]
    pub result: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

/// Append-only, ordered record of capability calls within one request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Ledger {
    records: Vec<InvocationRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: InvocationRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[InvocationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InvocationRecord> {
        self.records.iter()
    }
}

impl FromIterator<InvocationRecord> for Ledger {
    fn from_iter<I: IntoIterator<Item = InvocationRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order() {
        let mut ledger = Ledger::new();
        for name in ["get-self-status", "list-active-players"] {
            ledger.append(InvocationRecord {
                capability: name.into(),
                params: serde_json::json!({}),
                result: serde_json::json!(null),
                timestamp: Utc::now(),
            });
        }
        let names: Vec<&str> = ledger.iter().map(|r| r.capability.as_str()).collect();
        assert_eq!(names, vec!["get-self-status", "list-active-players"]);
        assert_eq!(ledger.len(), 2);
    }
}
