//! GraphQL documents sent to the GitHub v4 API.
//!
//! Every builder is pure: same inputs, same document, no I/O.

use chrono::{SecondsFormat, TimeZone, Utc};

/// Page size for every paginated connection.
pub const PAGE_SIZE: u32 = 100;

/// Languages requested per repository, largest first.
pub const LANGUAGES_PER_REPO: u32 = 10;

/// Renders a string as a GraphQL string literal, or `null` when absent.
fn literal(value: Option<&str>) -> String {
    match value {
        // JSON string syntax is a valid GraphQL string literal.
        Some(v) => serde_json::Value::String(v.to_string()).to_string(),
        None => "null".to_string(),
    }
}

/// `[from, to)` bounds of a calendar year in UTC, RFC 3339 with a `Z` suffix.
fn year_window(year: i32) -> Option<(String, String)> {
    let from = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single()?;
    let to = Utc.with_ymd_and_hms(year.checked_add(1)?, 1, 1, 0, 0, 0).single()?;
    Some((
        from.to_rfc3339_opts(SecondsFormat::Secs, true),
        to.to_rfc3339_opts(SecondsFormat::Secs, true),
    ))
}

/// One-shot summary: identity plus pull-request and issue totals.
pub fn summary() -> String {
    r#"query {
  viewer {
    login
    name
    pullRequests(first: 1) {
      totalCount
    }
    issues(first: 1) {
      totalCount
    }
  }
}
"#
    .to_string()
}

fn repo_fields() -> String {
    format!(
        r#"pageInfo {{
        hasNextPage
        endCursor
      }}
      nodes {{
        nameWithOwner
        stargazers {{
          totalCount
        }}
        forkCount
        languages(first: {LANGUAGES_PER_REPO}, orderBy: {{field: SIZE, direction: DESC}}) {{
          edges {{
            size
            node {{
              name
              color
            }}
          }}
        }}
      }}"#
    )
}

/// One page of owned and contributed-to repositories.
///
/// The two connections paginate independently, each with its own cursor.
pub fn repos_overview(owned_cursor: Option<&str>, contrib_cursor: Option<&str>) -> String {
    let fields = repo_fields();
    format!(
        r#"{{
  viewer {{
    login
    name
    repositories(
        first: {PAGE_SIZE},
        orderBy: {{field: UPDATED_AT, direction: DESC}},
        isFork: false,
        after: {owned}
    ) {{
      {fields}
    }}
    repositoriesContributedTo(
        first: {PAGE_SIZE},
        includeUserRepositories: false,
        orderBy: {{field: UPDATED_AT, direction: DESC}},
        contributionTypes: [COMMIT, PULL_REQUEST, REPOSITORY, PULL_REQUEST_REVIEW],
        after: {contrib}
    ) {{
      {fields}
    }}
  }}
}}
"#,
        owned = literal(owned_cursor),
        contrib = literal(contrib_cursor),
    )
}

/// Every year in which the viewer has at least one contribution.
pub fn contribution_years() -> String {
    r#"query {
  viewer {
    contributionsCollection {
      contributionYears
    }
  }
}
"#
    .to_string()
}

/// Alias under which a year's sub-selection is returned.
pub fn year_alias(year: i32) -> String {
    format!("year{year}")
}

/// Total contributions for every year in `years`, in a single round trip.
///
/// Years that cannot be expressed as a UTC window are left out.
pub fn all_contributions(years: &[i32]) -> String {
    let by_year: Vec<String> = years
        .iter()
        .filter_map(|&year| {
            let (from, to) = year_window(year)?;
            Some(format!(
                r#"    {alias}: contributionsCollection(from: "{from}", to: "{to}") {{
      contributionCalendar {{
        totalContributions
      }}
    }}"#,
                alias = year_alias(year),
            ))
        })
        .collect();

    format!("query {{\n  viewer {{\n{}\n  }}\n}}\n", by_year.join("\n"))
}

/// Contribution detail for one year, unaliased.
pub fn contributions_by_year(year: i32) -> Option<String> {
    let (from, to) = year_window(year)?;
    Some(format!(
        r#"query {{
  viewer {{
    contributionsCollection(from: "{from}", to: "{to}") {{
      totalCommitContributions
      restrictedContributionsCount
      contributionCalendar {{
        totalContributions
      }}
    }}
  }}
}}
"#
    ))
}

/// Commit contributions credited to `login` over the default window.
pub fn user_commit_contributions(login: &str) -> String {
    format!(
        r#"query {{
  user(login: {login}) {{
    contributionsCollection {{
      totalCommitContributions
    }}
  }}
}}
"#,
        login = literal(Some(login)),
    )
}

/// One page of repositories the viewer created by forking.
pub fn owned_forks(cursor: Option<&str>) -> String {
    format!(
        r#"query {{
  viewer {{
    repositories(first: {PAGE_SIZE}, isFork: true, ownerAffiliations: OWNER, after: {after}) {{
      totalCount
      pageInfo {{
        hasNextPage
        endCursor
      }}
      nodes {{
        nameWithOwner
        parent {{
          nameWithOwner
        }}
      }}
    }}
  }}
}}
"#,
        after = literal(cursor),
    )
}
