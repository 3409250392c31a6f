use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context as _, Result, anyhow};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use tracing::{debug, warn};

pub const DEFAULT_BRANCH_LABEL: &str = "main";

/// Ordered branch name -> tip hash mapping. Enumeration order seeds lane numbering,
/// so this keeps insertion order instead of sorting by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadsMap {
    entries: Vec<(String, String)>,
}

impl HeadsMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or retargets a branch. A retargeted branch keeps its original position.
    pub fn insert(&mut self, branch: impl Into<String>, hash: impl Into<String>) {
        let branch = branch.into();
        let hash = hash.into();
        if let Some(entry) = self.entries.iter_mut().find(|(name, _)| *name == branch) {
            entry.1 = hash;
            return;
        }
        self.entries.push((branch, hash));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(branch, hash)| (branch.as_str(), hash.as_str()))
    }

    pub fn tip_of(&self, branch: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == branch)
            .map(|(_, hash)| hash.as_str())
    }

    /// Branch names whose tip is `hash`, in enumeration order.
    pub fn branches_at<'a>(&'a self, hash: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(_, tip)| tip == hash)
            .map(|(branch, _)| branch.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<B: Into<String>, H: Into<String>> FromIterator<(B, H)> for HeadsMap {
    fn from_iter<T: IntoIterator<Item = (B, H)>>(iter: T) -> Self {
        let mut heads = Self::new();
        for (branch, hash) in iter {
            heads.insert(branch, hash);
        }
        heads
    }
}

impl Serialize for HeadsMap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap as _;

        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (branch, hash) in &self.entries {
            map.serialize_entry(branch, hash)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for HeadsMap {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeadsVisitor;

        impl<'de> serde::de::Visitor<'de> for HeadsVisitor {
            type Value = HeadsMap;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("a map of branch names to commit hashes")
            }

            fn visit_map<A: serde::de::MapAccess<'de>>(
                self,
                mut access: A,
            ) -> Result<Self::Value, A::Error> {
                let mut heads = HeadsMap::new();
                while let Some((branch, hash)) = access.next_entry::<String, String>()? {
                    heads.insert(branch, hash);
                }
                Ok(heads)
            }
        }

        deserializer.deserialize_map(HeadsVisitor)
    }
}

/// Layout of JavaScript's `Date::toString`, minus the trailing zone name.
const JS_DATE_FORMAT: &str = "[weekday repr:short] [month repr:short] [day padding:none] [year] \
     [hour]:[minute]:[second] GMT[offset_hour sign:mandatory][offset_minute]";

/// Commit date as it arrives on the wire: unix seconds (possibly fractional) or
/// a date string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommitDate {
    Unix(i64),
    Fractional(f64),
    Text(String),
}

impl CommitDate {
    pub fn from_unix(seconds: i64) -> Self {
        Self::Unix(seconds)
    }

    /// Accepts integer seconds, RFC 3339, RFC 2822 (`git log --date=rfc`) and
    /// JavaScript `Date` strings.
    pub fn to_unix(&self) -> Result<i64> {
        match self {
            Self::Unix(seconds) => Ok(*seconds),
            Self::Fractional(seconds) if seconds.is_finite() => Ok(seconds.floor() as i64),
            Self::Fractional(seconds) => Err(anyhow!("commit date {seconds} is not finite")),
            Self::Text(raw) => parse_date_text(raw),
        }
    }
}

impl Default for CommitDate {
    fn default() -> Self {
        Self::Unix(0)
    }
}

fn parse_date_text(raw: &str) -> Result<i64> {
    let raw = raw.trim();
    if let Ok(seconds) = raw.parse::<i64>() {
        return Ok(seconds);
    }
    if let Ok(date) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(date.unix_timestamp());
    }
    if let Ok(date) = OffsetDateTime::parse(raw, &Rfc2822) {
        return Ok(date.unix_timestamp());
    }

    // `Mon Jan 01 2024 10:00:00 GMT+0000 (Coordinated Universal Time)`
    let without_zone_name = raw.split(" (").next().unwrap_or(raw).trim_end();
    let js_format = format_description::parse(JS_DATE_FORMAT)
        .context("failed to build date format description")?;
    OffsetDateTime::parse(without_zone_name, js_format.as_slice())
        .map(OffsetDateTime::unix_timestamp)
        .with_context(|| format!("failed to parse commit date '{raw}'"))
}

/// Treats an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PayloadNode {
    #[serde(deserialize_with = "null_as_default")]
    pub hash: String,
    #[serde(deserialize_with = "null_as_default")]
    pub parents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_parent: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub author: String,
    #[serde(deserialize_with = "null_as_default")]
    pub date: CommitDate,
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(deserialize_with = "null_as_default")]
    pub refs: Vec<String>,
}

/// Graph load payload as produced by the command service. Missing and `null`
/// fields read as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphPayload {
    #[serde(deserialize_with = "null_as_default")]
    pub nodes: Vec<PayloadNode>,
    #[serde(deserialize_with = "null_as_default")]
    pub heads: HeadsMap,
    #[serde(deserialize_with = "null_as_default")]
    pub current_branch: String,
}

impl GraphPayload {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("failed to parse graph payload JSON")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitNode {
    pub hash: String,
    pub parents: Vec<String>,
    pub other_parent: Option<String>,
    pub timestamp: i64,
    pub author: String,
    pub message: String,
    pub refs: Vec<String>,
}

impl CommitNode {
    pub fn primary_parent(&self) -> Option<&str> {
        self.parents.first().map(String::as_str)
    }

    pub fn secondary_parents(&self) -> impl Iterator<Item = &str> {
        self.parents.iter().skip(1).map(String::as_str)
    }

    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or_default().trim()
    }

    /// Prefers a `main`/`master` ref, then the first ref, then `main`.
    pub fn primary_branch_label(&self) -> &str {
        self.refs
            .iter()
            .find(|name| name.as_str() == "main" || name.as_str() == "master")
            .or_else(|| self.refs.first())
            .map(String::as_str)
            .unwrap_or(DEFAULT_BRANCH_LABEL)
    }
}

impl From<PayloadNode> for CommitNode {
    fn from(node: PayloadNode) -> Self {
        let timestamp = node.date.to_unix().unwrap_or_else(|err| {
            warn!("commit {} has an unreadable date, using 0: {err:#}", node.hash);
            0
        });
        Self {
            hash: node.hash,
            parents: node.parents,
            other_parent: node.other_parent.filter(|hash| !hash.is_empty()),
            timestamp,
            author: node.author,
            message: node.message,
            refs: node.refs,
        }
    }
}

/// Row-sorted commits plus a hash index. Built fresh on every graph load.
#[derive(Debug, Clone, Default)]
pub struct NormalizedGraph {
    nodes: Vec<CommitNode>,
    row_by_hash: BTreeMap<String, usize>,
    heads: HeadsMap,
    current_branch: String,
}

impl NormalizedGraph {
    pub fn nodes(&self) -> &[CommitNode] {
        &self.nodes
    }

    pub fn heads(&self) -> &HeadsMap {
        &self.heads
    }

    pub fn current_branch(&self) -> &str {
        &self.current_branch
    }

    pub fn row_of(&self, hash: &str) -> Option<usize> {
        self.row_by_hash.get(hash).copied()
    }

    pub fn get(&self, hash: &str) -> Option<&CommitNode> {
        self.row_of(hash).map(|row| &self.nodes[row])
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.row_by_hash.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

pub fn normalize_payload(payload: GraphPayload) -> NormalizedGraph {
    let nodes = payload
        .nodes
        .into_iter()
        .map(CommitNode::from)
        .collect::<Vec<_>>();
    normalize_graph(nodes, payload.heads, payload.current_branch)
}

/// Drops empty and duplicate hashes, then stable-sorts newest first.
/// References to hashes outside the set are kept untouched; later stages treat
/// them as history boundaries.
pub fn normalize_graph(
    nodes: Vec<CommitNode>,
    heads: HeadsMap,
    current_branch: impl Into<String>,
) -> NormalizedGraph {
    let mut seen = BTreeSet::new();
    let mut nodes = nodes
        .into_iter()
        .filter(|node| {
            if node.hash.is_empty() {
                warn!("dropping commit with an empty hash");
                return false;
            }
            if !seen.insert(node.hash.clone()) {
                warn!("dropping duplicate commit {}", node.hash);
                return false;
            }
            true
        })
        .collect::<Vec<_>>();

    nodes.sort_by(|left, right| right.timestamp.cmp(&left.timestamp));

    let row_by_hash = nodes
        .iter()
        .enumerate()
        .map(|(row, node)| (node.hash.clone(), row))
        .collect::<BTreeMap<_, _>>();

    let dangling = nodes
        .iter()
        .flat_map(|node| node.parents.iter())
        .filter(|parent| !row_by_hash.contains_key(parent.as_str()))
        .count();
    debug!(
        nodes = nodes.len(),
        heads = heads.len(),
        dangling_parents = dangling,
        "normalized commit graph"
    );

    NormalizedGraph {
        nodes,
        row_by_hash,
        heads,
        current_branch: current_branch.into(),
    }
}
