//! Filter/sort projection over the owned collection.
//!
//! Everything here is a pure function of its inputs. Filters apply in a fixed
//! order (favorites, name prefix, series) and are intersective; sorting is
//! always stable.
//!
//! Name and series ordering uses the Unicode Collation Algorithm with the
//! CLDR root tailoring, so "Épona" sorts among the E's rather than after "Z".

use crate::collection::Item;
use feruca::Collator;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    /// Reverse insertion order.
    #[default]
    Newest,
    /// Insertion order.
    Oldest,
    NameAsc,
    NameDesc,
    /// Series, then name.
    BySeries,
    /// Favorites before the rest, each group by name.
    FavoritesFirst,
}

impl SortMode {
    pub const ALL: [SortMode; 6] = [
        SortMode::Newest,
        SortMode::Oldest,
        SortMode::NameAsc,
        SortMode::NameDesc,
        SortMode::BySeries,
        SortMode::FavoritesFirst,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Newest => "newest",
            SortMode::Oldest => "oldest",
            SortMode::NameAsc => "name-asc",
            SortMode::NameDesc => "name-desc",
            SortMode::BySeries => "series",
            SortMode::FavoritesFirst => "favorites-first",
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = String;

    /// Accepts the CLI names plus the legacy `date_new` style names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace('_', "-");
        match norm.as_str() {
            "newest" | "date-new" => Ok(SortMode::Newest),
            "oldest" | "date-old" => Ok(SortMode::Oldest),
            "name-asc" | "name" => Ok(SortMode::NameAsc),
            "name-desc" => Ok(SortMode::NameDesc),
            "series" | "by-series" => Ok(SortMode::BySeries),
            "favorites-first" | "favorites" => Ok(SortMode::FavoritesFirst),
            _ => Err(format!(
                "unknown sort mode '{}' (expected one of: {})",
                s,
                SortMode::ALL
                    .iter()
                    .map(SortMode::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}

/// Caller-owned view settings. `Default` is the reset state: no filters,
/// newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub name_prefix: String,
    /// Exact series name; empty means any.
    pub series: String,
    pub sort_mode: SortMode,
    pub favorites_only: bool,
}

impl FilterCriteria {
    pub fn is_filtered(&self) -> bool {
        self.favorites_only || !self.name_prefix.is_empty() || !self.series.is_empty()
    }
}

/// Display-ordered subset of `items`. Inputs are never mutated.
pub fn project(items: &[Item], criteria: &FilterCriteria) -> Vec<Item> {
    let prefix = criteria.name_prefix.to_lowercase();
    let mut out: Vec<Item> = items
        .iter()
        .filter(|item| !criteria.favorites_only || item.is_favorite)
        .filter(|item| prefix.is_empty() || item.name.to_lowercase().starts_with(&prefix))
        .filter(|item| criteria.series.is_empty() || item.series == criteria.series)
        .cloned()
        .collect();

    let mut collator = Collator::default();
    match criteria.sort_mode {
        SortMode::Newest => out.reverse(),
        SortMode::Oldest => {}
        SortMode::NameAsc => out.sort_by(|a, b| collate(&mut collator, &a.name, &b.name)),
        SortMode::NameDesc => out.sort_by(|a, b| collate(&mut collator, &b.name, &a.name)),
        SortMode::BySeries => out.sort_by(|a, b| {
            collate(&mut collator, &a.series, &b.series)
                .then_with(|| collate(&mut collator, &a.name, &b.name))
        }),
        SortMode::FavoritesFirst => out.sort_by(|a, b| {
            b.is_favorite
                .cmp(&a.is_favorite)
                .then_with(|| collate(&mut collator, &a.name, &b.name))
        }),
    }
    out
}

/// Distinct series names across the collection, in collation order (the
/// same order `SortMode::BySeries` groups by), not byte order.
pub fn unique_series(items: &[Item]) -> Vec<String> {
    let set: BTreeSet<&str> = items.iter().map(|i| i.series.as_str()).collect();
    let mut series: Vec<String> = set.into_iter().map(str::to_string).collect();
    let mut collator = Collator::default();
    series.sort_by(|a, b| collate(&mut collator, a, b));
    series
}

/// "Showing X of Y" line for list output.
pub fn summarize(shown: usize, total: usize, criteria: &FilterCriteria) -> String {
    if criteria.is_filtered() {
        format!("Showing {} of {} (sorted {})", shown, total, criteria.sort_mode)
    } else {
        format!("{} item(s), sorted {}", total, criteria.sort_mode)
    }
}

// Root-locale collation with the raw string as tie-break, so strings the
// collator treats as equal still order deterministically.
fn collate(collator: &mut Collator, a: &str, b: &str) -> Ordering {
    collator.collate(a, b).then_with(|| a.cmp(b))
}
