use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::languages::LanguageUsage;
use crate::stats::Stats;

pub const OVERVIEW_TEMPLATE: &str = "overview.svg";
pub const LANGUAGES_TEMPLATE: &str = "languages.svg";

const MISSING_COLOR: &str = "#000000";
const ANIMATION_STEP_MS: usize = 150;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to read template {path}: {source}")]
    ReadTemplate { path: PathBuf, source: io::Error },

    #[error("failed to write {path}: {source}")]
    WriteOutput { path: PathBuf, source: io::Error },
}

// Utilities for building SVG content

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Formats an integer with `,` between groups of three digits.
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Already-formatted values for the overview card.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverviewValues {
    pub name: String,
    pub stars: u64,
    pub forks: u64,
    pub contributions: u64,
    pub views: u64,
    pub repos: usize,
    pub commits: u64,
    pub prs: u64,
    pub issues: u64,
    pub lines_changed: u64,
}

impl OverviewValues {
    /// Pulls every overview statistic, letting independent fetches overlap.
    pub async fn collect(stats: &Stats) -> Self {
        let (name, stars, forks, contributions, views, repos, commits, prs, issues, lines) = tokio::join!(
            stats.name(),
            stats.stargazers(),
            stats.forks(),
            stats.total_contributions(),
            stats.views(),
            stats.repos(),
            stats.total_commits(),
            stats.prs(),
            stats.issues(),
            stats.lines_changed(),
        );

        Self {
            name: name.to_string(),
            stars,
            forks,
            contributions,
            views,
            repos: repos.len(),
            commits,
            prs,
            issues,
            lines_changed: lines.total(),
        }
    }
}

pub fn render_overview(template: &str, values: &OverviewValues) -> String {
    let replacements = [
        ("{{ name }}", escape_xml(&values.name)),
        ("{{ stars }}", thousands(values.stars)),
        ("{{ forks }}", thousands(values.forks)),
        ("{{ contributions }}", thousands(values.contributions)),
        ("{{ views }}", thousands(values.views)),
        ("{{ repos }}", thousands(values.repos as u64)),
        ("{{ commits }}", thousands(values.commits)),
        ("{{ prs }}", thousands(values.prs)),
        ("{{ issues }}", thousands(values.issues)),
        ("{{ lines_changed }}", thousands(values.lines_changed)),
    ];

    replacements
        .iter()
        .fold(template.to_string(), |out, (placeholder, value)| {
            out.replace(placeholder, value)
        })
}

/// Stacked bar segments, one per language, largest first.
fn build_progress(languages: &LanguageUsage) -> String {
    let mut out = String::new();
    for (_, stat) in languages.by_size_desc() {
        let color = stat.color.as_deref().unwrap_or(MISSING_COLOR);
        out.push_str(&format!(
            r#"<span style="background-color: {color};width: {:0.3}%;" class="progress-item"></span>"#,
            stat.proportion
        ));
    }
    out
}

/// Legend entries with a staggered fade-in.
fn build_lang_list(languages: &LanguageUsage) -> String {
    let mut out = String::new();
    for (i, (name, stat)) in languages.by_size_desc().into_iter().enumerate() {
        let color = stat.color.as_deref().unwrap_or(MISSING_COLOR);
        out.push_str(&format!(
            r#"
<li style="animation-delay: {delay}ms;">
<svg xmlns="http://www.w3.org/2000/svg" class="octicon" style="fill:{color};"
viewBox="0 0 16 16" version="1.1" width="16" height="16"><path
fill-rule="evenodd" d="M8 4a4 4 0 100 8 4 4 0 000-8z"></path></svg>
<span class="lang">{name}</span>
<span class="percent">{proportion:0.2}%</span>
</li>

"#,
            delay = i * ANIMATION_STEP_MS,
            name = escape_xml(name),
            proportion = stat.proportion,
        ));
    }
    out
}

pub fn render_languages(template: &str, languages: &LanguageUsage) -> String {
    if languages.is_empty() {
        warn!("no languages found, rendering an empty language card");
    }
    template
        .replace("{{ progress }}", &build_progress(languages))
        .replace("{{ lang_list }}", &build_lang_list(languages))
}

async fn read_template(templates_dir: &Path, file: &str) -> Result<String, RenderError> {
    let path = templates_dir.join(file);
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| RenderError::ReadTemplate { path, source })
}

/// Writes a rendered card into `output_dir`, creating the directory first.
pub async fn write_card(output_dir: &Path, file: &str, svg: &str) -> Result<PathBuf, RenderError> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|source| RenderError::WriteOutput {
            path: output_dir.to_path_buf(),
            source,
        })?;

    let path = output_dir.join(file);
    match tokio::fs::write(&path, svg).await {
        Ok(()) => {
            info!(path = %path.display(), bytes = svg.len(), "wrote card");
            Ok(path)
        }
        Err(source) => Err(RenderError::WriteOutput { path, source }),
    }
}

/// Renders `overview.svg` from the statistics.
pub async fn generate_overview(
    stats: &Stats,
    templates_dir: &Path,
    output_dir: &Path,
) -> Result<PathBuf, RenderError> {
    let template = read_template(templates_dir, OVERVIEW_TEMPLATE).await?;
    let values = OverviewValues::collect(stats).await;
    write_card(output_dir, OVERVIEW_TEMPLATE, &render_overview(&template, &values)).await
}

/// Renders `languages.svg` from the statistics.
pub async fn generate_languages(
    stats: &Stats,
    templates_dir: &Path,
    output_dir: &Path,
) -> Result<PathBuf, RenderError> {
    let template = read_template(templates_dir, LANGUAGES_TEMPLATE).await?;
    let languages = stats.languages().await;
    info!(languages = languages.len(), "rendering language card");
    write_card(output_dir, LANGUAGES_TEMPLATE, &render_languages(&template, languages)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn usage(entries: &[(&str, u64, Option<&str>)]) -> LanguageUsage {
        let mut usage = LanguageUsage::new();
        for (name, size, color) in entries {
            usage.record(name, *size, *color);
        }
        usage.finalize();
        usage
    }

    #[test]
    fn thousands_groups_digits() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
        assert_eq!(thousands(100000), "100,000");
    }

    #[test]
    fn escape_xml_escapes_markup() {
        assert_eq!(escape_xml("a < b & c > d"), "a &lt; b &amp; c &gt; d");
    }

    #[test]
    fn overview_substitutes_every_placeholder() {
        let template = "<text>{{ name }}|{{ stars }}|{{ forks }}|{{ contributions }}|{{ views }}|\
                        {{ repos }}|{{ commits }}|{{ prs }}|{{ issues }}|{{ lines_changed }}</text>";
        let values = OverviewValues {
            name: "Octo & Cat".to_string(),
            stars: 1234,
            forks: 5,
            contributions: 10000,
            views: 42,
            repos: 7,
            commits: 2500,
            prs: 3,
            issues: 0,
            lines_changed: 1000000,
        };

        assert_eq!(
            render_overview(template, &values),
            "<text>Octo &amp; Cat|1,234|5|10,000|42|7|2,500|3|0|1,000,000</text>"
        );
    }

    #[test]
    fn overview_replaces_repeated_placeholders() {
        let values = OverviewValues {
            stars: 9,
            ..OverviewValues::default()
        };
        assert_eq!(render_overview("{{ stars }}/{{ stars }}", &values), "9/9");
    }

    #[test]
    fn progress_sorts_by_size_and_defaults_color() {
        let languages = usage(&[("Python", 100, Some("#3572A5")), ("Rust", 300, None)]);
        let progress = build_progress(&languages);

        assert_eq!(
            progress,
            "<span style=\"background-color: #000000;width: 75.000%;\" class=\"progress-item\"></span>\
             <span style=\"background-color: #3572A5;width: 25.000%;\" class=\"progress-item\"></span>"
        );
    }

    #[test]
    fn lang_list_uses_two_decimals_and_staggered_delays() {
        let languages = usage(&[("C", 1, Some("#555555")), ("Go", 2, Some("#00ADD8"))]);
        let list = build_lang_list(&languages);

        let go = list.find(r#"<span class="lang">Go</span>"#).expect("go entry");
        let c = list.find(r#"<span class="lang">C</span>"#).expect("c entry");
        assert!(go < c);
        assert!(list.contains(r#"<span class="percent">66.67%</span>"#));
        assert!(list.contains(r#"<span class="percent">33.33%</span>"#));
        assert!(list.contains("animation-delay: 0ms;"));
        assert!(list.contains("animation-delay: 150ms;"));
    }

    #[test]
    fn empty_languages_render_empty_sections() {
        let rendered = render_languages("<div>{{ progress }}</div><ul>{{ lang_list }}</ul>", &LanguageUsage::new());
        assert_eq!(rendered, "<div></div><ul></ul>");
    }

    #[tokio::test]
    async fn write_card_creates_output_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("generated");

        let path = write_card(&output, OVERVIEW_TEMPLATE, "<svg/>")
            .await
            .expect("write succeeds");

        assert_eq!(path, output.join(OVERVIEW_TEMPLATE));
        assert_eq!(std::fs::read_to_string(&path).expect("read back"), "<svg/>");
    }

    #[tokio::test]
    async fn missing_template_is_reported_with_its_path() {
        let dir = tempfile::tempdir().expect("tempdir");

        let err = read_template(dir.path(), LANGUAGES_TEMPLATE)
            .await
            .expect_err("template is missing");

        match err {
            RenderError::ReadTemplate { path, .. } => {
                assert_eq!(path, dir.path().join(LANGUAGES_TEMPLATE))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn bundled_templates_carry_their_placeholders() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("templates");

        let overview = read_template(&dir, OVERVIEW_TEMPLATE).await.expect("overview template");
        for placeholder in ["{{ name }}", "{{ stars }}", "{{ commits }}", "{{ lines_changed }}"] {
            assert!(overview.contains(placeholder), "missing {placeholder}");
        }

        let languages = read_template(&dir, LANGUAGES_TEMPLATE).await.expect("languages template");
        assert!(languages.contains("{{ progress }}"));
        assert!(languages.contains("{{ lang_list }}"));
    }
}
