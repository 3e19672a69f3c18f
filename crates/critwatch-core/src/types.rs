use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// BugId
// ---------------------------------------------------------------------------

/// Launchpad bug number. Its `Display` form is the string the reconciler
/// searches for in card names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BugId(pub u64);

impl std::fmt::Display for BugId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// BugStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BugStatus {
    Confirmed,
    Triaged,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Fix Committed")]
    FixCommitted,
    #[serde(rename = "Fix Released")]
    FixReleased,
}

impl BugStatus {
    /// Statuses that count as "still open" when querying the tracker.
    pub const OPEN: [BugStatus; 4] = [
        BugStatus::Confirmed,
        BugStatus::Triaged,
        BugStatus::InProgress,
        BugStatus::FixCommitted,
    ];

    pub const CLOSED: [BugStatus; 1] = [BugStatus::FixReleased];

    pub fn as_str(self) -> &'static str {
        match self {
            BugStatus::Confirmed => "Confirmed",
            BugStatus::Triaged => "Triaged",
            BugStatus::InProgress => "In Progress",
            BugStatus::FixCommitted => "Fix Committed",
            BugStatus::FixReleased => "Fix Released",
        }
    }
}

impl std::fmt::Display for BugStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BugStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Confirmed" => Ok(BugStatus::Confirmed),
            "Triaged" => Ok(BugStatus::Triaged),
            "In Progress" => Ok(BugStatus::InProgress),
            "Fix Committed" => Ok(BugStatus::FixCommitted),
            "Fix Released" => Ok(BugStatus::FixReleased),
            _ => Err(format!("unsupported bug status '{s}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Bug / Card
// ---------------------------------------------------------------------------

pub const CRITICAL_IMPORTANCE: &str = "Critical";
pub const ALERT_TAG: &str = "alert";

/// Snapshot of a tracker bug, fetched once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bug {
    pub id: BugId,
    pub title: String,
    pub status: BugStatus,
    pub importance: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Bug {
    pub fn new(id: u64, title: impl Into<String>, status: BugStatus) -> Self {
        Self {
            id: BugId(id),
            title: title.into(),
            status,
            importance: CRITICAL_IMPORTANCE.to_string(),
            tags: BTreeSet::from([ALERT_TAG.to_string()]),
        }
    }

    /// Critical importance and tagged `alert`.
    pub fn is_in_scope(&self) -> bool {
        self.importance == CRITICAL_IMPORTANCE && self.tags.contains(ALERT_TAG)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default, rename = "idList")]
    pub list_id: String,
}

impl Card {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            desc: String::new(),
            list_id: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// BugMap
// ---------------------------------------------------------------------------

/// Bugs keyed by id. Every entry's key equals the stored bug's `id`, so a
/// bug id can appear at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BugMap(BTreeMap<BugId, Bug>);

impl BugMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a bug under its own id, replacing any earlier snapshot.
    pub fn insert(&mut self, bug: Bug) -> Option<Bug> {
        self.0.insert(bug.id, bug)
    }

    pub fn get(&self, id: BugId) -> Option<&Bug> {
        self.0.get(&id)
    }

    pub fn contains(&self, id: BugId) -> bool {
        self.0.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = BugId> + '_ {
        self.0.keys().copied()
    }

    pub fn bugs(&self) -> impl Iterator<Item = &Bug> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge another map into this one; entries from `other` win.
    pub fn extend(&mut self, other: BugMap) {
        self.0.extend(other.0);
    }
}

impl FromIterator<Bug> for BugMap {
    fn from_iter<I: IntoIterator<Item = Bug>>(iter: I) -> Self {
        let mut map = BugMap::new();
        for bug in iter {
            map.insert(bug);
        }
        map
    }
}

impl<'a> IntoIterator for &'a BugMap {
    type Item = (&'a BugId, &'a Bug);
    type IntoIter = btree_map::Iter<'a, BugId, Bug>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Open bugs with no card on the board.
pub type UnmatchedSet = BTreeSet<BugId>;

/// A bug the tracker listed but whose details could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub bug_link: String,
    pub error: String,
}

/// Result of one tracker query: the open and the recently closed bugs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BugSnapshot {
    pub open: BugMap,
    pub closed: BugMap,
    #[serde(default)]
    pub failures: Vec<FetchFailure>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_match_tracker() {
        for status in BugStatus::OPEN.iter().chain(BugStatus::CLOSED.iter()) {
            let parsed: BugStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, *status);
        }
        assert!("Won't Fix".parse::<BugStatus>().is_err());
    }

    #[test]
    fn bug_map_keys_are_unique() {
        let mut map = BugMap::new();
        map.insert(Bug::new(1001, "disk full", BugStatus::Confirmed));
        let previous = map.insert(Bug::new(1001, "disk still full", BugStatus::Triaged));
        assert_eq!(previous.unwrap().title, "disk full");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(BugId(1001)).unwrap().title, "disk still full");
    }

    #[test]
    fn bug_map_serializes_as_map() {
        let map: BugMap = [Bug::new(7, "x", BugStatus::Confirmed)].into_iter().collect();
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["7"]["title"], "x");
        assert_eq!(json["7"]["status"], "Confirmed");
    }

    #[test]
    fn new_bug_is_in_scope() {
        let mut bug = Bug::new(1, "t", BugStatus::Confirmed);
        assert!(bug.is_in_scope());
        bug.tags.clear();
        assert!(!bug.is_in_scope());
    }

    #[test]
    fn card_reads_trello_fields() {
        let json = r#"{"id":"c1","name":"[CIX][LP:1] x","desc":"d","idList":"l1","closed":false}"#;
        let card: Card = serde_json::from_str(json).unwrap();
        assert_eq!(card.list_id, "l1");
        assert_eq!(card.desc, "d");
    }
}
