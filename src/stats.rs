//! Lazily computed, memoized statistics about one GitHub user.
//!
//! Each statistic group lives in its own [`OnceCell`]: the first caller runs
//! the fetch, concurrent callers wait on that same in-flight future, and
//! everyone afterwards reads the stored value. Nothing is ever invalidated;
//! a [`Stats`] is meant to be used for a single run.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::Write as _;
use std::ops::Add;

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::github::GithubClient;
use crate::languages::{ExcludedLanguages, LanguageUsage};
use crate::queries;
use crate::svg::thousands;
use crate::types::{
    CommitSearch, ContributorStats, ForkNode, ForksViewer, GraphqlResponse, OverviewViewer,
    RepoNode, SummaryViewer, TrafficViews, UserData, ViewCount, ViewerData, WeeklyStats,
    WithContributions, YearCalendar, YearsViewer, decode_nodes,
};

const NO_NAME: &str = "No Name";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinesChanged {
    pub additions: u64,
    pub deletions: u64,
}

impl LinesChanged {
    pub fn total(&self) -> u64 {
        self.additions.saturating_add(self.deletions)
    }
}

impl Add for LinesChanged {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            additions: self.additions.saturating_add(other.additions),
            deletions: self.deletions.saturating_add(other.deletions),
        }
    }
}

/// Everything the shared repository walk produces.
#[derive(Debug, Clone)]
struct RepoOverview {
    name: String,
    stargazers: u64,
    forks_received: u64,
    languages: LanguageUsage,
    repos: BTreeSet<String>,
}

impl RepoOverview {
    fn new() -> Self {
        Self {
            name: NO_NAME.to_string(),
            stargazers: 0,
            forks_received: 0,
            languages: LanguageUsage::new(),
            repos: BTreeSet::new(),
        }
    }

    /// Folds one repository node into the running totals.
    ///
    /// Returns `false` for nodes that were skipped: unnamed, already seen, or
    /// excluded.
    fn absorb(
        &mut self,
        node: &RepoNode,
        excluded_repos: &HashSet<String>,
        excluded_langs: &ExcludedLanguages,
    ) -> bool {
        let Some(name) = node.name_with_owner.as_deref() else {
            return false;
        };
        if self.repos.contains(name) || excluded_repos.contains(name) {
            return false;
        }
        self.repos.insert(name.to_string());

        self.stargazers = self.stargazers.saturating_add(node.stargazers.total_count);
        self.forks_received = self.forks_received.saturating_add(node.fork_count);

        for edge in node.languages.edges.iter().flatten() {
            let language = edge.node.name.as_deref().unwrap_or("Other");
            if excluded_langs.contains(language) {
                continue;
            }
            self.languages
                .record(language, edge.size, edge.node.color.as_deref());
        }

        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Summary {
    prs: u64,
    issues: u64,
}

fn decode<T: DeserializeOwned>(json: Value, what: &str) -> Option<T> {
    match serde_json::from_value(json) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(error = %e, "failed to decode {what} response");
            None
        }
    }
}

fn decode_viewer<V: DeserializeOwned>(json: Value, what: &str) -> Option<V> {
    decode::<GraphqlResponse<ViewerData<V>>>(json, what)?
        .data?
        .viewer
}

/// Statistics about one user, fetched on first access.
pub struct Stats {
    config: Config,
    client: GithubClient,
    overview: OnceCell<RepoOverview>,
    summary: OnceCell<Summary>,
    contribution_years: OnceCell<Vec<i32>>,
    total_contributions: OnceCell<u64>,
    total_commits: OnceCell<u64>,
    all_time_commits: OnceCell<u64>,
    forks_made: OnceCell<u64>,
    lines_changed: OnceCell<LinesChanged>,
    views: OnceCell<u64>,
}

impl Stats {
    /// Aggregator talking to GitHub with the configured token.
    pub fn new(config: Config) -> Self {
        let client = GithubClient::new(config.credentials.access_token.clone());
        Self::with_client(config, client)
    }

    pub fn with_client(config: Config, client: GithubClient) -> Self {
        Self {
            config,
            client,
            overview: OnceCell::new(),
            summary: OnceCell::new(),
            contribution_years: OnceCell::new(),
            total_contributions: OnceCell::new(),
            total_commits: OnceCell::new(),
            all_time_commits: OnceCell::new(),
            forks_made: OnceCell::new(),
            lines_changed: OnceCell::new(),
            views: OnceCell::new(),
        }
    }

    fn username(&self) -> &str {
        self.config.username()
    }

    // ---------- repository overview ----------

    async fn overview(&self) -> &RepoOverview {
        self.overview.get_or_init(|| self.fetch_overview()).await
    }

    /// Walks owned and contributed-to repositories page by page.
    async fn fetch_overview(&self) -> RepoOverview {
        info!(
            user = self.username(),
            excluded_repos = ?self.config.exclude_repos,
            excluded_langs = ?self.config.exclude_langs,
            ignore_forked_repos = self.config.ignore_forked_repos,
            "fetching repository overview"
        );

        let excluded_langs = ExcludedLanguages::new(&self.config.exclude_langs);
        let mut overview = RepoOverview::new();
        let mut owned_cursor: Option<String> = None;
        let mut contrib_cursor: Option<String> = None;
        let mut page = 0u32;

        loop {
            page += 1;
            let query = queries::repos_overview(owned_cursor.as_deref(), contrib_cursor.as_deref());
            let viewer: OverviewViewer =
                decode_viewer(self.client.query(&query).await, "repository overview")
                    .unwrap_or_default();

            if let Some(name) = viewer.name.or(viewer.login) {
                overview.name = name;
            }

            let owned = viewer.repositories.unwrap_or_default();
            let contrib = viewer.repositories_contributed_to.unwrap_or_default();

            let mut nodes: Vec<RepoNode> = decode_nodes(owned.nodes, "repository");
            // Contributed-to pages are still walked so their cursor advances.
            if !self.config.ignore_forked_repos {
                nodes.extend(decode_nodes::<RepoNode>(contrib.nodes, "repository"));
            }

            let processed = nodes
                .iter()
                .filter(|node| {
                    overview.absorb(node, &self.config.exclude_repos, &excluded_langs)
                })
                .count();
            debug!(page, processed, "processed repository page");

            if !owned.page_info.has_next_page && !contrib.page_info.has_next_page {
                break;
            }
            owned_cursor = owned.page_info.end_cursor.or(owned_cursor);
            contrib_cursor = contrib.page_info.end_cursor.or(contrib_cursor);
        }

        overview.languages.finalize();

        info!(
            pages = page,
            repositories = overview.repos.len(),
            languages = overview.languages.len(),
            "repository overview complete"
        );
        for (language, stat) in overview.languages.by_size_desc().into_iter().take(15) {
            debug!(
                "  {language}: {} bytes ({:.2}%)",
                thousands(stat.size),
                stat.proportion
            );
        }

        overview
    }

    /// Display name, falling back to the login.
    pub async fn name(&self) -> &str {
        &self.overview().await.name
    }

    pub async fn stargazers(&self) -> u64 {
        self.overview().await.stargazers
    }

    /// Forks of the user's own non-fork repositories.
    pub async fn forks_received(&self) -> u64 {
        self.overview().await.forks_received
    }

    /// Identifiers of every aggregated repository.
    pub async fn repos(&self) -> &BTreeSet<String> {
        &self.overview().await.repos
    }

    pub async fn languages(&self) -> &LanguageUsage {
        &self.overview().await.languages
    }

    pub async fn languages_proportional(&self) -> BTreeMap<String, f64> {
        self.languages().await.proportions()
    }

    // ---------- forks ----------

    /// Forks received plus forks made.
    pub async fn forks(&self) -> u64 {
        let (received, made) = tokio::join!(self.forks_received(), self.forks_made());
        debug!(received, made, "total forks");
        received + made
    }

    /// Repositories the user created by forking someone else's.
    pub async fn forks_made(&self) -> u64 {
        *self
            .forks_made
            .get_or_init(|| self.fetch_forks_made())
            .await
    }

    async fn fetch_forks_made(&self) -> u64 {
        let mut cursor: Option<String> = None;
        let mut forks: HashSet<String> = HashSet::new();
        let mut reported = None;

        loop {
            let json = self.client.query(&queries::owned_forks(cursor.as_deref())).await;
            let Some(connection) =
                decode_viewer::<ForksViewer>(json, "owned forks").and_then(|v| v.repositories)
            else {
                break;
            };

            reported.get_or_insert(connection.total_count);
            forks.extend(
                decode_nodes::<ForkNode>(connection.nodes, "fork")
                    .into_iter()
                    .filter_map(|node| node.name_with_owner),
            );

            match connection.page_info.end_cursor {
                Some(next) if connection.page_info.has_next_page => cursor = Some(next),
                _ => break,
            }
        }

        let made = forks.len() as u64;
        info!(made, reported = ?reported, "counted forks made by user");
        made
    }

    // ---------- summary ----------

    async fn summary(&self) -> Summary {
        *self.summary.get_or_init(|| self.fetch_summary()).await
    }

    async fn fetch_summary(&self) -> Summary {
        let json = self.client.query(&queries::summary()).await;
        let viewer: SummaryViewer = decode_viewer(json, "summary").unwrap_or_default();
        Summary {
            prs: viewer.pull_requests.total_count,
            issues: viewer.issues.total_count,
        }
    }

    pub async fn prs(&self) -> u64 {
        self.summary().await.prs
    }

    pub async fn issues(&self) -> u64 {
        self.summary().await.issues
    }

    // ---------- contributions ----------

    async fn contribution_years(&self) -> &[i32] {
        self.contribution_years
            .get_or_init(|| async {
                let json = self.client.query(&queries::contribution_years()).await;
                let viewer: YearsViewer =
                    decode_viewer(json, "contribution years").unwrap_or_default();
                let years: Vec<i32> = viewer
                    .contributions_collection
                    .contribution_years
                    .iter()
                    .filter_map(|year| year.as_year())
                    .collect();
                info!(?years, "found contribution years");
                years
            })
            .await
    }

    /// All-time contributions, summed over every contribution year.
    pub async fn total_contributions(&self) -> u64 {
        *self
            .total_contributions
            .get_or_init(|| self.fetch_total_contributions())
            .await
    }

    async fn fetch_total_contributions(&self) -> u64 {
        let years = self.contribution_years().await;
        if years.is_empty() {
            warn!("no contribution years found");
            return 0;
        }

        let json = self.client.query(&queries::all_contributions(years)).await;
        // Aliases are decoded one by one so a malformed year only loses itself.
        let by_year: BTreeMap<String, Value> =
            decode_viewer(json, "yearly contributions").unwrap_or_default();

        let total = by_year
            .into_iter()
            .filter(|(_, year)| !year.is_null())
            .filter_map(|(alias, year)| {
                match serde_json::from_value::<YearCalendar>(year) {
                    Ok(year) => Some(year.contribution_calendar.total_contributions),
                    Err(e) => {
                        warn!(alias = %alias, error = %e, "skipping malformed yearly contributions");
                        None
                    }
                }
            })
            .fold(0u64, u64::saturating_add);
        info!(total, "total contributions (all years)");
        total
    }

    /// Commit count for the configured email identities, or for the user's
    /// login when none were given.
    pub async fn total_commits(&self) -> u64 {
        *self
            .total_commits
            .get_or_init(|| self.fetch_total_commits())
            .await
    }

    async fn fetch_total_commits(&self) -> u64 {
        if self.config.emails.is_empty() {
            return self.commits_for_login().await;
        }

        let per_email = self.config.emails.iter().map(|email| self.commits_for_email(email));
        join_all(per_email).await.into_iter().sum()
    }

    async fn commits_for_login(&self) -> u64 {
        let username = self.username();
        let json = self
            .client
            .query(&queries::user_commit_contributions(username))
            .await;

        let counts = decode::<GraphqlResponse<UserData<WithContributions>>>(json, "user commits")
            .and_then(|r| r.data)
            .and_then(|d| d.user)
            .and_then(|u| u.contributions_collection);
        match counts {
            Some(counts) => counts.total_commit_contributions,
            None => {
                warn!(username, "failed to fetch commits for user");
                0
            }
        }
    }

    async fn commits_for_email(&self, email: &str) -> u64 {
        let q = format!("author-email:{email}");
        let json = self.client.query_rest("/search/commits", &[("q", q.as_str())]).await;
        if json.get("total_count").is_none() {
            warn!(email, "failed to fetch commits for email");
            return 0;
        }
        decode::<CommitSearch>(json, "commit search")
            .map(|search| search.total_count)
            .unwrap_or(0)
    }

    /// Commit plus restricted contributions over every contribution year.
    pub async fn all_time_commits(&self) -> u64 {
        *self
            .all_time_commits
            .get_or_init(|| self.fetch_all_time_commits())
            .await
    }

    async fn fetch_all_time_commits(&self) -> u64 {
        let years = self.contribution_years().await;
        let per_year = years.iter().map(|&year| self.commits_in_year(year));
        let total: u64 = join_all(per_year).await.into_iter().sum();
        info!(total, "total commits (all years)");
        total
    }

    async fn commits_in_year(&self, year: i32) -> u64 {
        let Some(query) = queries::contributions_by_year(year) else {
            warn!(year, "contribution year out of range");
            return 0;
        };
        let json = self.client.query(&query).await;
        match decode_viewer::<WithContributions>(json, "yearly commits")
            .and_then(|v| v.contributions_collection)
        {
            Some(counts) => {
                let commits = counts.total_commit_contributions + counts.restricted_contributions_count;
                debug!(year, commits, "yearly commits");
                commits
            }
            None => {
                warn!(year, "failed to fetch yearly commits");
                0
            }
        }
    }

    // ---------- per-repository REST statistics ----------

    /// Lines added and deleted by the user, from weekly contributor stats.
    pub async fn lines_changed(&self) -> LinesChanged {
        *self
            .lines_changed
            .get_or_init(|| self.fetch_lines_changed())
            .await
    }

    async fn fetch_lines_changed(&self) -> LinesChanged {
        let repos = self.repos().await;
        info!(repositories = repos.len(), "calculating lines changed");

        let per_repo = repos.iter().map(|repo| self.repo_lines_changed(repo));
        let lines = join_all(per_repo)
            .await
            .into_iter()
            .fold(LinesChanged::default(), Add::add);

        info!(additions = lines.additions, deletions = lines.deletions, "total lines changed");
        lines
    }

    async fn repo_lines_changed(&self, repo: &str) -> LinesChanged {
        let json = self
            .client
            .query_rest(&format!("/repos/{repo}/stats/contributors"), &[])
            .await;
        let Value::Array(entries) = json else {
            debug!(repo, "no contributor statistics");
            return LinesChanged::default();
        };

        let username = self.username();
        let mut lines = LinesChanged::default();
        for entry in entries {
            let Ok(stats) = serde_json::from_value::<ContributorStats>(entry) else {
                continue;
            };
            let Some(author) = stats.author else {
                continue;
            };
            if !author.login.eq_ignore_ascii_case(username) {
                continue;
            }
            for week in stats.weeks {
                if let Ok(week) = serde_json::from_value::<WeeklyStats>(week) {
                    lines = lines
                        + LinesChanged {
                            additions: week.a,
                            deletions: week.d,
                        };
                }
            }
        }
        lines
    }

    /// Page views over the last 14 days, the window GitHub keeps.
    pub async fn views(&self) -> u64 {
        *self.views.get_or_init(|| self.fetch_views()).await
    }

    async fn fetch_views(&self) -> u64 {
        let repos = self.repos().await;
        info!(repositories = repos.len(), "calculating views");

        let per_repo = repos.iter().map(|repo| self.repo_views(repo));
        let total: u64 = join_all(per_repo).await.into_iter().sum();

        info!(total, "total views (last 14 days)");
        total
    }

    async fn repo_views(&self, repo: &str) -> u64 {
        let json = self
            .client
            .query_rest(&format!("/repos/{repo}/traffic/views"), &[])
            .await;
        let Ok(traffic) = serde_json::from_value::<TrafficViews>(json) else {
            debug!(repo, "no traffic data");
            return 0;
        };

        traffic
            .views
            .into_iter()
            .filter_map(|view| serde_json::from_value::<ViewCount>(view).ok())
            .map(|view| view.count)
            .sum()
    }

    // ---------- summary text ----------

    /// Human-readable dump of every statistic.
    pub async fn summary_text(&self) -> String {
        let lines = self.lines_changed().await;

        let mut languages = String::new();
        for (language, stat) in self.languages().await.by_size_desc() {
            let _ = write!(languages, "\n  - {language}: {:0.4}%", stat.proportion);
        }

        format!(
            "Name: {name}\n\
             Stargazers: {stars}\n\
             Forks: {forks}\n\
             All-time contributions: {contributions}\n\
             Repositories with contributions: {repos}\n\
             Lines of code added: {added}\n\
             Lines of code deleted: {deleted}\n\
             Lines of code changed: {changed}\n\
             Project page views: {views}\n\
             Languages:{languages}",
            name = self.name().await,
            stars = thousands(self.stargazers().await),
            forks = thousands(self.forks().await),
            contributions = thousands(self.total_contributions().await),
            repos = self.repos().await.len(),
            added = thousands(lines.additions),
            deleted = thousands(lines.deletions),
            changed = thousands(lines.total()),
            views = thousands(self.views().await),
        )
    }
}
