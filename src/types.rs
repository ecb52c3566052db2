//! Typed shapes of the GitHub responses the aggregator reads.
//!
//! Every field GitHub may omit or null out is an `Option` or goes through
//! [`null_as_default`], so a sparse payload still decodes and the caller
//! decides what "missing" means. List nodes stay raw [`Value`]s until
//! [`decode_nodes`] decodes them one at a time.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

/// Reads an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decodes each node on its own. `null` nodes are dropped quietly, malformed
/// ones with a warning.
pub fn decode_nodes<T: DeserializeOwned>(nodes: Vec<Value>, what: &str) -> Vec<T> {
    nodes
        .into_iter()
        .filter(|node| !node.is_null())
        .filter_map(|node| match serde_json::from_value(node) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(error = %e, "skipping malformed {what} node");
                None
            }
        })
        .collect()
}

/// `{ "data": ... }` envelope shared by every GraphQL answer.
#[derive(Debug, Deserialize)]
pub struct GraphqlResponse<T> {
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct ViewerData<V> {
    pub viewer: Option<V>,
}

#[derive(Debug, Deserialize)]
pub struct UserData<U> {
    pub user: Option<U>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CountObj {
    #[serde(rename = "totalCount", default, deserialize_with = "null_as_default")]
    pub total_count: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageInfo {
    #[serde(rename = "hasNextPage", default, deserialize_with = "null_as_default")]
    pub has_next_page: bool,
    #[serde(rename = "endCursor")]
    pub end_cursor: Option<String>,
}

// ---------- repository overview ----------

#[derive(Debug, Default, Deserialize)]
pub struct OverviewViewer {
    pub login: Option<String>,
    pub name: Option<String>,
    pub repositories: Option<RepoConnection>,
    #[serde(rename = "repositoriesContributedTo")]
    pub repositories_contributed_to: Option<RepoConnection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RepoConnection {
    #[serde(rename = "pageInfo", default, deserialize_with = "null_as_default")]
    pub page_info: PageInfo,
    /// Raw nodes, see [`decode_nodes`].
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RepoNode {
    #[serde(rename = "nameWithOwner")]
    pub name_with_owner: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stargazers: CountObj,
    #[serde(rename = "forkCount", default, deserialize_with = "null_as_default")]
    pub fork_count: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub languages: LanguageConnection,
}

#[derive(Debug, Default, Deserialize)]
pub struct LanguageConnection {
    #[serde(default, deserialize_with = "null_as_default")]
    pub edges: Vec<Option<LanguageEdge>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LanguageEdge {
    #[serde(default, deserialize_with = "null_as_default")]
    pub size: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub node: LanguageNode,
}

#[derive(Debug, Default, Deserialize)]
pub struct LanguageNode {
    pub name: Option<String>,
    pub color: Option<String>,
}

// ---------- summary ----------

#[derive(Debug, Default, Deserialize)]
pub struct SummaryViewer {
    #[serde(rename = "pullRequests", default, deserialize_with = "null_as_default")]
    pub pull_requests: CountObj,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: CountObj,
}

// ---------- contributions ----------

#[derive(Debug, Default, Deserialize)]
pub struct YearsViewer {
    #[serde(rename = "contributionsCollection", default)]
    pub contributions_collection: YearsCollection,
}

#[derive(Debug, Default, Deserialize)]
pub struct YearsCollection {
    #[serde(rename = "contributionYears", default)]
    pub contribution_years: Vec<ContributionYear>,
}

/// GitHub reports years as integers; older tooling passes them as strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContributionYear {
    Number(i32),
    Text(String),
}

impl ContributionYear {
    pub fn as_year(&self) -> Option<i32> {
        match self {
            ContributionYear::Number(year) => Some(*year),
            ContributionYear::Text(text) => text.trim().parse().ok(),
        }
    }
}

/// One `year<Y>` alias of the batched calendar query.
#[derive(Debug, Default, Deserialize)]
pub struct YearCalendar {
    #[serde(rename = "contributionCalendar", default, deserialize_with = "null_as_default")]
    pub contribution_calendar: CalendarTotals,
}

#[derive(Debug, Default, Deserialize)]
pub struct CalendarTotals {
    #[serde(rename = "totalContributions", default, deserialize_with = "null_as_default")]
    pub total_contributions: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommitCounts {
    #[serde(rename = "totalCommitContributions", default, deserialize_with = "null_as_default")]
    pub total_commit_contributions: u64,
    #[serde(rename = "restrictedContributionsCount", default, deserialize_with = "null_as_default")]
    pub restricted_contributions_count: u64,
}

/// `user`/`viewer` object carrying a single `contributionsCollection`.
#[derive(Debug, Default, Deserialize)]
pub struct WithContributions {
    #[serde(rename = "contributionsCollection")]
    pub contributions_collection: Option<CommitCounts>,
}

// ---------- forks made ----------

#[derive(Debug, Default, Deserialize)]
pub struct ForksViewer {
    pub repositories: Option<ForkConnection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForkConnection {
    #[serde(rename = "totalCount", default, deserialize_with = "null_as_default")]
    pub total_count: u64,
    #[serde(rename = "pageInfo", default, deserialize_with = "null_as_default")]
    pub page_info: PageInfo,
    /// Raw nodes, see [`decode_nodes`].
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForkNode {
    #[serde(rename = "nameWithOwner")]
    pub name_with_owner: Option<String>,
}

// ---------- REST ----------

/// One element of `/repos/{id}/stats/contributors`.
///
/// `weeks` stays untyped so a single malformed week does not discard the
/// whole contributor.
#[derive(Debug, Deserialize)]
pub struct ContributorStats {
    pub author: Option<ContributorAuthor>,
    #[serde(default)]
    pub weeks: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContributorAuthor {
    #[serde(default)]
    pub login: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct WeeklyStats {
    #[serde(default)]
    pub a: u64,
    #[serde(default)]
    pub d: u64,
}

/// `/repos/{id}/traffic/views`.
#[derive(Debug, Default, Deserialize)]
pub struct TrafficViews {
    #[serde(default)]
    pub views: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewCount {
    #[serde(default)]
    pub count: u64,
}

/// `/search/commits`.
#[derive(Debug, Default, Deserialize)]
pub struct CommitSearch {
    #[serde(default)]
    pub total_count: u64,
}
