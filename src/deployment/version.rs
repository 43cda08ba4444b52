//! # Artifact Versions
//!
//! Dotted, qualifier-aware version numbers with a total order that matches common
//! artifact-versioning semantics (`1.10` > `1.9`, `1.0-rc1` < `1.0` < `1.0-sp1`).
//!
//! ## Parsing
//!
//! The version is lowercased and split on `.` and `-`, and additionally at every
//! transition between digits and letters (`1.0rc1` → `1`, `0`, `rc`, `1`). Null items
//! (`0` and the release qualifier) are dropped at the end of the version and directly
//! before a qualifier, so `1`, `1.0` and `1.0.0-final` are the same version, as are
//! `1.0-alpha1` and `1-alpha1`.
//!
//! ## Qualifier ordering
//!
//! | rank | qualifiers |
//! |---|---|
//! | 0 | `alpha`, `a` |
//! | 1 | `beta`, `b` |
//! | 2 | `milestone`, `m` |
//! | 3 | `rc`, `cr` |
//! | 4 | `snapshot` |
//! | 5 | release: `ga`, `final`, `release`, or no qualifier |
//! | 6 | `sp` |
//! | 7 | any other qualifier, ordered lexically among themselves |
//!
//! A numeric item always sorts after a qualifier at the same position, so
//! `1.0.1` > `1.0-rc1`. The shorter version is padded with the release qualifier,
//! which makes the comparison lexicographic over one fixed item order.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

const RELEASE_RANK: u8 = 5;
const UNKNOWN_RANK: u8 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Item {
    /// Decimal digits without leading zeros ("" is zero)
    Number(String),
    /// Normalized qualifier ("" is the release qualifier)
    Qualifier(String),
}

impl Item {
    fn number(digits: &str) -> Self {
        Item::Number(digits.trim_start_matches('0').to_string())
    }

    fn qualifier(text: &str) -> Self {
        let normalized = match text {
            "a" => "alpha",
            "b" => "beta",
            "m" => "milestone",
            "cr" => "rc",
            "ga" | "final" | "release" => "",
            other => other,
        };
        Item::Qualifier(normalized.to_string())
    }

    fn is_null(&self) -> bool {
        match self {
            Item::Number(digits) => digits.is_empty(),
            Item::Qualifier(text) => text.is_empty(),
        }
    }
}

fn qualifier_rank(qualifier: &str) -> u8 {
    match qualifier {
        "alpha" => 0,
        "beta" => 1,
        "milestone" => 2,
        "rc" => 3,
        "snapshot" => 4,
        "" => RELEASE_RANK,
        "sp" => 6,
        _ => UNKNOWN_RANK,
    }
}

fn compare_numbers(left: &str, right: &str) -> Ordering {
    left.len().cmp(&right.len()).then_with(|| left.cmp(right))
}

fn compare_qualifiers(left: &str, right: &str) -> Ordering {
    let (left_rank, right_rank) = (qualifier_rank(left), qualifier_rank(right));
    match left_rank.cmp(&right_rank) {
        Ordering::Equal if left_rank == UNKNOWN_RANK => left.cmp(right),
        other => other,
    }
}

fn compare_items(left: &Item, right: &Item) -> Ordering {
    match (left, right) {
        (Item::Number(a), Item::Number(b)) => compare_numbers(a, b),
        (Item::Number(_), Item::Qualifier(_)) => Ordering::Greater,
        (Item::Qualifier(_), Item::Number(_)) => Ordering::Less,
        (Item::Qualifier(a), Item::Qualifier(b)) => compare_qualifiers(a, b),
    }
}

fn trim_nulls(items: &mut Vec<Item>) {
    while items.last().is_some_and(Item::is_null) {
        items.pop();
    }
}

/// Comparable artifact version
///
/// Equality and hashing follow the ordering: two versions are equal exactly when
/// their normalized items are equal, whatever their original spelling.
#[derive(Debug, Clone)]
pub struct ArtifactVersion {
    raw: String,
    items: Vec<Item>,
}

impl ArtifactVersion {
    /// Parse a version string; every string is a valid version
    pub fn parse(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        let mut items = Vec::new();
        for segment in lowered.split(['.', '-']) {
            let mut start = 0;
            let bytes = segment.as_bytes();
            for index in 1..=bytes.len() {
                let boundary = index == bytes.len()
                    || bytes[index].is_ascii_digit() != bytes[index - 1].is_ascii_digit();
                if boundary {
                    let token = &segment[start..index];
                    if token.bytes().all(|b| b.is_ascii_digit()) {
                        items.push(Item::number(token));
                    } else {
                        trim_nulls(&mut items);
                        items.push(Item::qualifier(token));
                    }
                    start = index;
                }
            }
        }
        trim_nulls(&mut items);
        Self {
            raw: raw.trim().to_string(),
            items,
        }
    }

    /// The version as originally written
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Default for ArtifactVersion {
    fn default() -> Self {
        Self::parse("0")
    }
}

impl FromStr for ArtifactVersion {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for ArtifactVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for ArtifactVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let release = Item::Qualifier(String::new());
        let len = self.items.len().max(other.items.len());
        (0..len)
            .map(|i| {
                compare_items(
                    self.items.get(i).unwrap_or(&release),
                    other.items.get(i).unwrap_or(&release),
                )
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for ArtifactVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ArtifactVersion {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl Eq for ArtifactVersion {}

impl Hash for ArtifactVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.items.hash(state);
    }
}
