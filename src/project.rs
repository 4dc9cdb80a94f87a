//! Project data model
//!
//! A [`Project`] is the merged view of two independently persisted halves:
//! the objective [`RepositoryRecord`] imported from GitHub and the subjective
//! [`ProjectMetadata`] assigned by the user.

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::SyncError;

/// Language name to byte count, in the order the API reported them (largest first)
pub type LanguageBreakdown = IndexMap<String, u64>;

/// Closed set of values a metadata field can take
pub trait Enumerated: Copy + Sized + 'static {
    /// All values in their fixed sort order
    const ALL: &'static [Self];

    fn as_str(&self) -> &'static str;

    fn icon(&self) -> &'static str;

    /// Position in [`Enumerated::ALL`]
    fn rank(&self) -> usize;

    /// Case-insensitive lookup including aliases
    fn parse(s: &str) -> Option<Self>;

    fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|v| v.as_str()).collect()
    }
}

macro_rules! enumerated {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $($variant:ident => $text:literal, $icon:literal $(| $alias:literal)*;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant,)+
        }

        impl Enumerated for $name {
            const ALL: &'static [Self] = &[$($name::$variant,)+];

            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            fn icon(&self) -> &'static str {
                match self {
                    $($name::$variant => $icon,)+
                }
            }

            fn rank(&self) -> usize {
                Self::ALL.iter().position(|v| v == self).unwrap_or(Self::ALL.len())
            }

            fn parse(s: &str) -> Option<Self> {
                match s.trim().to_lowercase().as_str() {
                    $($text $(| $alias)* => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl FromStr for $name {
            type Err = SyncError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$name as Enumerated>::parse(s).ok_or_else(|| {
                    SyncError::Validation(format!(
                        "Unknown {} '{}'; expected one of: {}",
                        $label,
                        s,
                        <$name as Enumerated>::names().join(", ")
                    ))
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

enumerated! {
    /// Lifecycle state of a project
    Status, "status" {
        Deployed => "deployed", "🚀";
        Development => "development", "🛠️";
        Archived => "archived", "🗄️";
        Paused => "paused", "⏸️";
        Idea => "idea", "💡";
        Abandoned => "abandoned", "☠️";
    }
}

enumerated! {
    /// How pressing the project is
    Urgency, "urgency" {
        High => "high", "‼️";
        Medium => "medium", "❗️";
        Low => "low", "❕";
        None => "none", "💤";
    }
}

enumerated! {
    /// Why the project exists
    ProjectType, "type" {
        Client => "client", "💰" | "paid";
        Teaching => "teaching", "👨🏻‍🏫";
        Job => "job", "👔";
        Learning => "learning", "📚";
        Personal => "personal", "🫵🏻";
    }
}

enumerated! {
    /// How the user currently feels about working on it
    Motivation, "motivation" {
        Hot => "hot", "🔥";
        Warm => "warm", "💪🏻";
        Cold => "cold", "🥶";
        Blocked => "blocked", "⛔";
        Dread => "dread", "💀";
        Finished => "finished", "☑️";
    }
}

/// Read an optional enumeration value, treating unknown strings as unset.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Enumerated,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| {
        let parsed = T::parse(&value);
        if parsed.is_none() {
            warn!("Ignoring unrecognised metadata value '{}'", value);
        }
        parsed
    }))
}

/// Objective facts about a project, as imported from GitHub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub name: String,
    pub full_name: String,
    pub url: String,
    pub description: Option<String>,
    pub created_at: Option<String>,
    pub pushed_at: Option<String>,
    #[serde(default)]
    pub languages: LanguageBreakdown,
    #[serde(default)]
    pub total_lines: u64,
}

impl RepositoryRecord {
    /// Assemble a record, deriving `total_lines` from the language counts
    pub fn new(
        name: String,
        full_name: String,
        url: String,
        description: Option<String>,
        created_at: Option<String>,
        pushed_at: Option<String>,
        languages: LanguageBreakdown,
    ) -> Self {
        let total_lines = total_lines(&languages);
        Self {
            name,
            full_name,
            url,
            description,
            created_at,
            pushed_at,
            languages,
            total_lines,
        }
    }
}

/// Sum of all language counts; zero when no languages were detected
pub fn total_lines(languages: &LanguageBreakdown) -> u64 {
    languages.values().sum()
}

/// Subjective, user-assigned facts about a project
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<Status>,
    #[serde(default, deserialize_with = "lenient")]
    pub urgency: Option<Urgency>,
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub project_type: Option<ProjectType>,
    #[serde(default, deserialize_with = "lenient")]
    pub motivation: Option<Motivation>,
}

impl ProjectMetadata {
    /// True when all four fields have been assigned
    pub fn is_complete(&self) -> bool {
        self.status.is_some()
            && self.urgency.is_some()
            && self.project_type.is_some()
            && self.motivation.is_some()
    }
}

/// Merged view of a repository record and its metadata, keyed by name
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub record: RepositoryRecord,
    pub metadata: ProjectMetadata,
}

impl Project {
    pub fn new(record: RepositoryRecord, metadata: ProjectMetadata) -> Self {
        Self { record, metadata }
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn created_days_ago(&self) -> Option<i64> {
        days_ago(self.record.created_at.as_deref(), Utc::now().date_naive())
    }

    pub fn pushed_days_ago(&self) -> Option<i64> {
        days_ago(self.record.pushed_at.as_deref(), Utc::now().date_naive())
    }

    /// Share of `total_lines` written in each language, as whole percentages
    pub fn language_percentages(&self) -> Vec<(&str, u64)> {
        let total = self.record.total_lines;
        self.record
            .languages
            .iter()
            .map(|(language, lines)| {
                let percent = if total == 0 { 0 } else { lines * 100 / total };
                (language.as_str(), percent)
            })
            .collect()
    }
}

/// Parse a stored timestamp (RFC 3339, or a bare `YYYY-MM-DD` date)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw.trim()) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn days_ago(timestamp: Option<&str>, today: NaiveDate) -> Option<i64> {
    let parsed = parse_timestamp(timestamp?)?;
    Some((today - parsed.date_naive()).num_days())
}
