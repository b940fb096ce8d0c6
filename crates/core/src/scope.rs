//! Chat scope: the classification of the conversation a request came from.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Classification of the originating chat, used as a permission axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatScope {
    /// The team-wide chat every member can read.
    Open,
    /// The leadership chat.
    Restricted,
    /// A one-to-one conversation with the bot.
    Private,
}

impl ChatScope {
    pub const ALL: [ChatScope; 3] = [ChatScope::Open, ChatScope::Restricted, ChatScope::Private];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Restricted => "restricted",
            Self::Private => "private",
        }
    }
}

impl std::fmt::Display for ChatScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" | "main" | "public" => Ok(Self::Open),
            "restricted" | "leadership" => Ok(Self::Restricted),
            "private" | "direct" | "dm" => Ok(Self::Private),
            other => Err(format!("unknown chat scope '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases() {
        assert_eq!("leadership".parse::<ChatScope>().unwrap(), ChatScope::Restricted);
        assert_eq!("Main".parse::<ChatScope>().unwrap(), ChatScope::Open);
        assert_eq!("dm".parse::<ChatScope>().unwrap(), ChatScope::Private);
        assert!("lobby".parse::<ChatScope>().is_err());
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&ChatScope::Restricted).unwrap();
        assert_eq!(json, "\"restricted\"");
    }
}
