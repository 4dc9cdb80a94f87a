//! Filtering and sorting over merged projects
//!
//! Fields are looked up by name in [`FIELDS`], where each entry carries the
//! matching policy for its category. Unknown field names and sort keys are
//! rejected before any project is examined.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::{Result, SyncError};
use crate::project::{
    parse_timestamp, Enumerated, Motivation, Project, ProjectType, Status, Urgency,
};

/// Number of leading languages considered when filtering by language
const TOP_LANGUAGES: usize = 4;

/// Rank given to unset enumeration values so they sort after every defined value
const UNRANKED: usize = usize::MAX;

/// Field name to accepted values. An empty value list places no constraint.
pub type Criteria = BTreeMap<String, Vec<String>>;

/// How a field is read and matched
#[derive(Clone, Copy)]
pub enum FieldKind {
    /// Case-insensitive substring match against any accepted value
    Text(fn(&Project) -> Option<&str>),
    /// Equality with any accepted value after resolving aliases
    Enumerated {
        value: fn(&Project) -> Option<&'static str>,
        canonical: fn(&str) -> Option<&'static str>,
        choices: fn() -> Vec<&'static str>,
    },
    /// Intersection of the top languages with the accepted values
    LanguageSet,
}

/// A filterable field
#[derive(Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Human readable description of what the field accepts
    pub fn describe(&self) -> String {
        match self.kind {
            FieldKind::Text(_) => "type any text (partial matching)".to_string(),
            FieldKind::Enumerated { choices, .. } => choices().join(", "),
            FieldKind::LanguageSet => "type any language name (exact matching)".to_string(),
        }
    }

    fn matches(&self, project: &Project, accepted: &[String]) -> bool {
        match self.kind {
            FieldKind::Text(read) => read(project).is_some_and(|text| {
                let text = text.to_lowercase();
                accepted.iter().any(|a| text.contains(&a.to_lowercase()))
            }),
            FieldKind::Enumerated {
                value, canonical, ..
            } => value(project).is_some_and(|v| {
                accepted.iter().any(|a| {
                    let a = a.trim();
                    match canonical(a) {
                        Some(resolved) => resolved == v,
                        None => a.eq_ignore_ascii_case(v),
                    }
                })
            }),
            FieldKind::LanguageSet => {
                let wanted: HashSet<String> = accepted.iter().map(|a| a.to_lowercase()).collect();
                project
                    .record
                    .languages
                    .keys()
                    .take(TOP_LANGUAGES)
                    .any(|language| wanted.contains(&language.to_lowercase()))
            }
        }
    }
}

fn name(p: &Project) -> Option<&str> {
    Some(&p.record.name)
}
fn full_name(p: &Project) -> Option<&str> {
    Some(&p.record.full_name)
}
fn url(p: &Project) -> Option<&str> {
    Some(&p.record.url)
}
fn description(p: &Project) -> Option<&str> {
    p.record.description.as_deref()
}
fn status(p: &Project) -> Option<&'static str> {
    p.metadata.status.map(|v| v.as_str())
}
fn urgency(p: &Project) -> Option<&'static str> {
    p.metadata.urgency.map(|v| v.as_str())
}
fn project_type(p: &Project) -> Option<&'static str> {
    p.metadata.project_type.map(|v| v.as_str())
}
fn motivation(p: &Project) -> Option<&'static str> {
    p.metadata.motivation.map(|v| v.as_str())
}

/// Stored name for an accepted value, resolving aliases such as `paid`
fn canonical<T: Enumerated>(raw: &str) -> Option<&'static str> {
    T::parse(raw).map(|v| v.as_str())
}

/// Every field accepted by [`filter`]
pub const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "status",
        kind: FieldKind::Enumerated {
            value: status,
            canonical: canonical::<Status>,
            choices: Status::names,
        },
    },
    FieldSpec {
        name: "urgency",
        kind: FieldKind::Enumerated {
            value: urgency,
            canonical: canonical::<Urgency>,
            choices: Urgency::names,
        },
    },
    FieldSpec {
        name: "name",
        kind: FieldKind::Text(name),
    },
    FieldSpec {
        name: "type",
        kind: FieldKind::Enumerated {
            value: project_type,
            canonical: canonical::<ProjectType>,
            choices: ProjectType::names,
        },
    },
    FieldSpec {
        name: "description",
        kind: FieldKind::Text(description),
    },
    FieldSpec {
        name: "motivation",
        kind: FieldKind::Enumerated {
            value: motivation,
            canonical: canonical::<Motivation>,
            choices: Motivation::names,
        },
    },
    FieldSpec {
        name: "languages",
        kind: FieldKind::LanguageSet,
    },
    FieldSpec {
        name: "full_name",
        kind: FieldKind::Text(full_name),
    },
    FieldSpec {
        name: "url",
        kind: FieldKind::Text(url),
    },
];

pub fn field(name: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.name == name)
}

/// Keep projects matching every criterion (AND across fields, OR within one).
///
/// Fails without filtering if any field name is unknown.
pub fn filter(projects: Vec<Project>, criteria: &Criteria) -> Result<Vec<Project>> {
    let resolved = criteria
        .iter()
        .map(|(name, accepted)| {
            field(name)
                .map(|spec| (spec, accepted))
                .ok_or_else(|| unknown_field(name))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(projects
        .into_iter()
        .filter(|project| {
            resolved
                .iter()
                .all(|(spec, accepted)| accepted.is_empty() || spec.matches(project, accepted))
        })
        .collect())
}

fn unknown_field(name: &str) -> SyncError {
    let known: Vec<&str> = FIELDS.iter().map(|f| f.name).collect();
    SyncError::Validation(format!(
        "Can't filter by: {}. Valid filters: {}",
        name,
        known.join(", ")
    ))
}

/// Parse `key=value` pairs into criteria, grouping repeated keys
pub fn parse_criteria<S: AsRef<str>>(pairs: &[S]) -> Result<Criteria> {
    let mut criteria = Criteria::new();
    for pair in pairs {
        let pair = pair.as_ref();
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            SyncError::Validation(format!(
                "Invalid filter format '{}'. Use --filter key=value",
                pair
            ))
        })?;
        if field(key).is_none() {
            return Err(unknown_field(key));
        }
        criteria
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
    }
    Ok(criteria)
}

/// Field a project list can be sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Status,
    Urgency,
    Type,
    Motivation,
    CreatedAt,
    PushedAt,
}

impl SortKey {
    pub const ALL: &'static [SortKey] = &[
        SortKey::Name,
        SortKey::Status,
        SortKey::Urgency,
        SortKey::Type,
        SortKey::Motivation,
        SortKey::CreatedAt,
        SortKey::PushedAt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::Status => "status",
            SortKey::Urgency => "urgency",
            SortKey::Type => "type",
            SortKey::Motivation => "motivation",
            SortKey::CreatedAt => "created_at",
            SortKey::PushedAt => "pushed_at",
        }
    }

    fn value(&self, project: &Project) -> SortValue {
        fn rank<T: Enumerated>(value: Option<T>) -> SortValue {
            SortValue::Rank(value.map(|v| v.rank()).unwrap_or(UNRANKED))
        }

        match self {
            SortKey::Name => SortValue::Text(project.record.name.to_lowercase()),
            SortKey::Status => rank(project.metadata.status),
            SortKey::Urgency => rank(project.metadata.urgency),
            SortKey::Type => rank(project.metadata.project_type),
            SortKey::Motivation => rank(project.metadata.motivation),
            SortKey::CreatedAt => time_value(project, "created_at", &project.record.created_at),
            SortKey::PushedAt => time_value(project, "pushed_at", &project.record.pushed_at),
        }
    }
}

impl FromStr for SortKey {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        SortKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = SortKey::ALL.iter().map(|k| k.as_str()).collect();
                SyncError::Validation(format!(
                    "Can't sort by: {}. Valid sort by options: {}",
                    s,
                    valid.join(", ")
                ))
            })
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presentation order applied after sorting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(SyncError::Validation(format!(
                "Can't order by: {}. Valid order options: asc, desc",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortValue {
    Text(String),
    Rank(usize),
    /// `(unknown, at)`: unknown timestamps compare after all known ones
    Time(bool, DateTime<Utc>),
}

fn time_value(project: &Project, field: &str, raw: &Option<String>) -> SortValue {
    match raw.as_deref().map(|r| (r, parse_timestamp(r))) {
        Some((_, Some(at))) => SortValue::Time(false, at),
        Some((r, None)) => {
            warn!("{}: unparsable {} '{}', sorting last", project.name(), field, r);
            SortValue::Time(true, DateTime::<Utc>::MIN_UTC)
        }
        None => {
            warn!("{}: missing {}, sorting last", project.name(), field);
            SortValue::Time(true, DateTime::<Utc>::MIN_UTC)
        }
    }
}

/// Stable sort in the key's natural order (alphabetical, enumeration rank, oldest first)
pub fn sort(mut projects: Vec<Project>, key: SortKey) -> Vec<Project> {
    projects.sort_by_cached_key(|project| key.value(project));
    projects
}

/// Apply the presentation order: the natural order counts as descending,
/// so `Asc` reverses it
pub fn order(mut projects: Vec<Project>, order: SortOrder) -> Vec<Project> {
    if order == SortOrder::Asc {
        projects.reverse();
    }
    projects
}

pub fn limit(mut projects: Vec<Project>, n: usize) -> Vec<Project> {
    projects.truncate(n);
    projects
}

/// A full list request: filter, then sort, then order, then limit
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub criteria: Criteria,
    pub sort: Option<SortKey>,
    pub order: Option<SortOrder>,
    pub limit: Option<usize>,
}

impl ListQuery {
    pub fn apply(&self, projects: Vec<Project>) -> Result<Vec<Project>> {
        let mut projects = filter(projects, &self.criteria)?;
        if let Some(key) = self.sort {
            projects = sort(projects, key);
        }
        if let Some(direction) = self.order {
            projects = order(projects, direction);
        }
        if let Some(n) = self.limit {
            projects = limit(projects, n);
        }
        Ok(projects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{LanguageBreakdown, ProjectMetadata, RepositoryRecord};
    use assert_matches::assert_matches;
    use quickcheck_macros::quickcheck;

    fn project(name: &str) -> Project {
        Project::new(
            RepositoryRecord::new(
                name.to_string(),
                format!("me/{}", name),
                format!("https://github.com/me/{}", name),
                Some(format!("The {} project", name)),
                Some("2024-01-01T00:00:00Z".to_string()),
                None,
                LanguageBreakdown::new(),
            ),
            ProjectMetadata::default(),
        )
    }

    fn with_type(name: &str, project_type: ProjectType) -> Project {
        let mut p = project(name);
        p.metadata.project_type = Some(project_type);
        p
    }

    fn with_status(name: &str, status: Option<Status>) -> Project {
        let mut p = project(name);
        p.metadata.status = status;
        p
    }

    fn with_languages(name: &str, languages: &[&str]) -> Project {
        let mut p = project(name);
        p.record.languages = languages
            .iter()
            .enumerate()
            .map(|(i, l)| (l.to_string(), 100 - i as u64))
            .collect();
        p
    }

    fn names(projects: &[Project]) -> Vec<&str> {
        projects.iter().map(|p| p.name()).collect()
    }

    fn criteria(pairs: &[(&str, &[&str])]) -> Criteria {
        pairs
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_empty_accepted_set_matches_everything() {
        let projects = vec![
            with_status("a", Some(Status::Idea)),
            with_status("b", None),
        ];
        let filtered = filter(projects.clone(), &criteria(&[("status", &[])])).unwrap();
        assert_eq!(filtered, projects);
    }

    #[test]
    fn test_filter_by_enumerated_type() {
        let projects = vec![
            with_type("a", ProjectType::Client),
            with_type("b", ProjectType::Personal),
        ];
        let filtered = filter(projects, &criteria(&[("type", &["client"])])).unwrap();
        assert_eq!(names(&filtered), vec!["a"]);
    }

    #[test]
    fn test_type_filter_resolves_paid_alias() {
        let projects = vec![
            with_type("cli", ProjectType::Client),
            with_type("blog", ProjectType::Personal),
        ];
        let filtered = filter(projects.clone(), &criteria(&[("type", &["paid"])])).unwrap();
        assert_eq!(names(&filtered), vec!["cli"]);

        let filtered = filter(projects, &criteria(&[("type", &["Paid", "personal"])])).unwrap();
        assert_eq!(names(&filtered), vec!["cli", "blog"]);
    }

    #[test]
    fn test_enumerated_match_is_exact_and_case_insensitive() {
        let projects = vec![
            with_status("a", Some(Status::Development)),
            with_status("b", Some(Status::Deployed)),
            with_status("c", None),
        ];
        let filtered = filter(projects.clone(), &criteria(&[("status", &["DEPLOYED"])])).unwrap();
        assert_eq!(names(&filtered), vec!["b"]);

        let partial = filter(projects, &criteria(&[("status", &["dep"])])).unwrap();
        assert!(partial.is_empty());
    }

    #[test]
    fn test_text_fields_match_substrings_with_or() {
        let projects = vec![project("clarity-cli"), project("webshop"), project("dotfiles")];
        let filtered =
            filter(projects, &criteria(&[("name", &["CLARITY", "shop"])])).unwrap();
        assert_eq!(names(&filtered), vec!["clarity-cli", "webshop"]);
    }

    #[test]
    fn test_missing_description_never_matches_text() {
        let mut bare = project("bare");
        bare.record.description = None;
        let filtered = filter(vec![bare], &criteria(&[("description", &["the"])])).unwrap();
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_languages_only_consider_top_four() {
        let projects = vec![
            with_languages("a", &["Rust", "Shell", "Nix", "Makefile", "Python"]),
            with_languages("b", &["Python"]),
        ];
        let filtered = filter(projects, &criteria(&[("languages", &["python"])])).unwrap();
        assert_eq!(names(&filtered), vec!["b"]);
    }

    #[test]
    fn test_criteria_are_anded_across_fields() {
        let mut a = with_type("a", ProjectType::Client);
        a.metadata.status = Some(Status::Deployed);
        let b = with_type("b", ProjectType::Client);

        let filtered = filter(
            vec![a, b],
            &criteria(&[("type", &["client"]), ("status", &["deployed"])]),
        )
        .unwrap();
        assert_eq!(names(&filtered), vec!["a"]);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result = filter(vec![project("a")], &criteria(&[("colour", &["red"])]));
        assert_matches!(result, Err(SyncError::Validation(msg)) if msg.contains("colour"));
    }

    #[test]
    fn test_parse_criteria_groups_repeated_keys() {
        let parsed = parse_criteria(&["urgency=high", "type=client", "urgency=low"]).unwrap();
        assert_eq!(parsed["urgency"], vec!["high", "low"]);
        assert_eq!(parsed["type"], vec!["client"]);

        assert_matches!(parse_criteria(&["urgency"]), Err(SyncError::Validation(_)));
        assert_matches!(parse_criteria(&["size=big"]), Err(SyncError::Validation(_)));
    }

    #[test]
    fn test_sort_by_status_rank() {
        let projects = vec![
            with_status("archived", Some(Status::Archived)),
            with_status("deployed", Some(Status::Deployed)),
            with_status("idea", Some(Status::Idea)),
        ];
        let sorted = sort(projects, SortKey::Status);
        assert_eq!(names(&sorted), vec!["deployed", "archived", "idea"]);
    }

    #[test]
    fn test_unset_rank_sorts_last_and_sort_is_stable() {
        let projects = vec![
            with_status("unset-1", None),
            with_status("paused", Some(Status::Paused)),
            with_status("unset-2", None),
            with_status("abandoned", Some(Status::Abandoned)),
        ];
        let sorted = sort(projects, SortKey::Status);
        assert_eq!(names(&sorted), vec!["paused", "abandoned", "unset-1", "unset-2"]);
    }

    #[test]
    fn test_sort_by_name_ignores_case() {
        let sorted = sort(
            vec![project("beta"), project("Alpha"), project("gamma")],
            SortKey::Name,
        );
        assert_eq!(names(&sorted), vec!["Alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_unparsable_timestamp_sorts_last() {
        let mut broken = project("broken");
        broken.record.created_at = Some("0000-not-a-date".to_string());
        let mut newer = project("newer");
        newer.record.created_at = Some("2024-06-01T00:00:00Z".to_string());
        let mut older = project("older");
        older.record.created_at = Some("2020-06-01T00:00:00Z".to_string());
        let mut missing = project("missing");
        missing.record.created_at = None;

        let sorted = sort(vec![broken, newer, missing, older], SortKey::CreatedAt);
        assert_eq!(names(&sorted), vec!["older", "newer", "broken", "missing"]);
    }

    #[test]
    fn test_asc_order_reverses_natural_order() {
        let sorted = sort(vec![project("b"), project("a"), project("c")], SortKey::Name);
        assert_eq!(names(&order(sorted.clone(), SortOrder::Desc)), vec!["a", "b", "c"]);
        assert_eq!(names(&order(sorted, SortOrder::Asc)), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_sort_key_and_order_parsing() {
        assert_eq!("pushed_at".parse::<SortKey>().unwrap(), SortKey::PushedAt);
        assert_matches!("size".parse::<SortKey>(), Err(SyncError::Validation(_)));
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_list_query_pipeline() {
        let projects = vec![
            with_type("c", ProjectType::Job),
            with_type("a", ProjectType::Job),
            with_type("b", ProjectType::Learning),
            with_type("d", ProjectType::Job),
        ];
        let query = ListQuery {
            criteria: criteria(&[("type", &["job"])]),
            sort: Some(SortKey::Name),
            order: Some(SortOrder::Asc),
            limit: Some(2),
        };
        assert_eq!(names(&query.apply(projects).unwrap()), vec!["d", "c"]);
    }

    #[test]
    fn test_field_catalogue() {
        assert_eq!(FIELDS.len(), 9);
        assert_eq!(
            field("urgency").unwrap().describe(),
            "high, medium, low, none"
        );
        assert!(field("url").unwrap().describe().contains("partial"));
        assert!(field("nope").is_none());
    }

    #[quickcheck]
    fn prop_sort_is_a_permutation(raw: Vec<(String, u8)>) -> bool {
        let projects: Vec<Project> = raw
            .iter()
            .map(|(name, rank)| {
                with_status(name, Status::ALL.get(*rank as usize % 8).copied())
            })
            .collect();

        let mut before: Vec<String> = projects.iter().map(|p| p.name().to_string()).collect();
        let mut after: Vec<String> = sort(projects, SortKey::Status)
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        before.sort();
        after.sort();
        before == after
    }

    #[quickcheck]
    fn prop_empty_criteria_are_identity(raw: Vec<String>) -> bool {
        let projects: Vec<Project> = raw.iter().map(|n| project(n)).collect();
        let all_empty: Criteria = FIELDS.iter().map(|f| (f.name.to_string(), Vec::new())).collect();
        filter(projects.clone(), &all_empty).map(|f| f == projects).unwrap_or(false)
    }
}
