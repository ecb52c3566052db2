use std::collections::{BTreeMap, HashSet};

/// Usage of one language across every aggregated repository.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LanguageStat {
    /// Bytes of code, summed over repositories.
    pub size: u64,
    /// Number of repositories the language appeared in.
    pub occurrences: u64,
    /// Hex color carried by the first edge seen, if it had one.
    pub color: Option<String>,
    /// Share of the total size, 0 to 100. Zero until [`LanguageUsage::finalize`].
    pub proportion: f64,
}

/// Language name to usage, keyed case-sensitively as GitHub reports names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LanguageUsage {
    entries: BTreeMap<String, LanguageStat>,
}

impl LanguageUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one language edge. The color is fixed by the first edge seen.
    pub fn record(&mut self, name: &str, size: u64, color: Option<&str>) {
        let entry = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| LanguageStat {
                color: color.map(str::to_string),
                ..LanguageStat::default()
            });
        entry.size = entry.size.saturating_add(size);
        entry.occurrences += 1;
    }

    /// Derives proportions from the final sizes.
    ///
    /// Must run after the last [`record`](Self::record); proportions sum to
    /// 100 when the total size is positive and are all 0 otherwise.
    pub fn finalize(&mut self) {
        let total = self.total_size();
        for stat in self.entries.values_mut() {
            stat.proportion = if total > 0 {
                100.0 * stat.size as f64 / total as f64
            } else {
                0.0
            };
        }
    }

    pub fn total_size(&self) -> u64 {
        self.entries
            .values()
            .map(|s| s.size)
            .fold(0, u64::saturating_add)
    }

    pub fn get(&self, name: &str) -> Option<&LanguageStat> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LanguageStat)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entries ordered by size, largest first; ties fall back to name order.
    pub fn by_size_desc(&self) -> Vec<(&str, &LanguageStat)> {
        let mut sorted: Vec<_> = self.iter().collect();
        sorted.sort_by(|a, b| b.1.size.cmp(&a.1.size).then_with(|| a.0.cmp(b.0)));
        sorted
    }

    pub fn proportions(&self) -> BTreeMap<String, f64> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.proportion))
            .collect()
    }
}

/// Case-insensitive set of language names to leave out of the usage map.
#[derive(Debug, Clone, Default)]
pub struct ExcludedLanguages {
    lowered: HashSet<String>,
}

impl ExcludedLanguages {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            lowered: names
                .into_iter()
                .map(|n| n.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lowered.contains(&name.to_lowercase())
    }
}
