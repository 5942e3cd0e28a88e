//! Fuzzy food-name search.
//!
//! Candidates are ranked in four passes (prefix, all tokens, substring,
//! character-set similarity), then re-ordered by a favourite/recent boost
//! and paginated. Everything here is pure and never fails.

use std::collections::{BTreeSet, HashSet, VecDeque};

use serde::Serialize;

use crate::nutrients::canon;

pub const DEFAULT_LIMIT: i64 = 30;
pub const DEFAULT_RECENT_CAPACITY: usize = 20;

const FAVORITE_BOOST: f64 = 1.0;
const RECENT_BOOST: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub limit: i64,
    pub page: i64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            page: 1,
        }
    }
}

impl SearchOptions {
    fn window(self) -> (usize, usize) {
        let limit = usize::try_from(self.limit.max(1)).unwrap_or(usize::MAX);
        let page = usize::try_from(self.page.max(1)).unwrap_or(usize::MAX);
        ((page - 1).saturating_mul(limit), limit)
    }
}

/// The pass that claimed a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Prefix,
    AllTokens,
    Substring,
    Similarity,
    /// Empty query: table order.
    Unranked,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub name: String,
    pub kind: MatchKind,
    pub boost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

/// Favourites and recently logged foods, used to lift search results.
#[derive(Debug, Clone)]
pub struct BoostState {
    favorites: BTreeSet<String>,
    recents: VecDeque<String>,
    capacity: usize,
}

impl Default for BoostState {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_RECENT_CAPACITY)
    }
}

impl BoostState {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            favorites: BTreeSet::new(),
            recents: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    #[must_use]
    pub fn is_favorite(&self, name: &str) -> bool {
        self.favorites.contains(name)
    }

    pub fn add_favorite(&mut self, name: &str) -> bool {
        self.favorites.insert(name.to_string())
    }

    pub fn remove_favorite(&mut self, name: &str) -> bool {
        self.favorites.remove(name)
    }

    /// Flips favourite state; returns whether `name` is now a favourite.
    pub fn toggle_favorite(&mut self, name: &str) -> bool {
        if self.remove_favorite(name) {
            false
        } else {
            self.add_favorite(name)
        }
    }

    /// Moves `name` to the front, evicting the oldest past capacity.
    pub fn push_recent(&mut self, name: &str) {
        self.recents.retain(|r| r != name);
        self.recents.push_front(name.to_string());
        self.recents.truncate(self.capacity);
    }

    pub fn favorites(&self) -> impl Iterator<Item = &str> {
        self.favorites.iter().map(String::as_str)
    }

    pub fn recents(&self) -> impl Iterator<Item = &str> {
        self.recents.iter().map(String::as_str)
    }

    #[must_use]
    pub fn boost(&self, name: &str) -> f64 {
        let mut score = 0.0;
        if self.recents.iter().any(|r| r == name) {
            score += RECENT_BOOST;
        }
        if self.is_favorite(name) {
            score += FAVORITE_BOOST;
        }
        score
    }
}

/// `|A ∩ B| / |A ∪ B|` over the character sets of two strings.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn jaccard(a: &str, b: &str) -> f64 {
    let a: HashSet<char> = a.chars().collect();
    let b: HashSet<char> = b.chars().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(&b).count();
    intersection as f64 / union as f64
}

fn rank<'a>(names: &[&'a str], query: &str) -> Vec<(&'a str, MatchKind, Option<f64>)> {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    let mut exact = Vec::new();
    let mut prefix = Vec::new();
    let mut all_tokens = Vec::new();
    let mut substring = Vec::new();
    let mut rest = Vec::new();

    for &name in names {
        let canonical = canon(name);
        if canonical == query {
            exact.push((name, MatchKind::Prefix, None));
        } else if canonical.starts_with(query) {
            prefix.push((name, MatchKind::Prefix, None));
        } else if tokens.iter().all(|t| canonical.contains(t)) {
            all_tokens.push((name, MatchKind::AllTokens, None));
        } else if canonical.contains(query) {
            substring.push((name, MatchKind::Substring, None));
        } else {
            rest.push((name, jaccard(&canonical, query)));
        }
    }

    // sort_by is stable: equal scores keep table order
    rest.sort_by(|a, b| b.1.total_cmp(&a.1));

    // an exact name leads its prefix tier
    exact
        .into_iter()
        .chain(prefix)
        .chain(all_tokens)
        .chain(substring)
        .chain(rest.into_iter().map(|(n, s)| (n, MatchKind::Similarity, Some(s))))
        .collect()
}

/// Ranks `names` against `query`, applies boosts, and returns one page.
#[must_use]
pub fn search<S: AsRef<str>>(
    names: &[S],
    query: &str,
    options: SearchOptions,
    boosts: &BoostState,
) -> Vec<SearchHit> {
    let names: Vec<&str> = names.iter().map(AsRef::<str>::as_ref).collect();
    let query = canon(query);

    let ranked: Vec<(&str, MatchKind, Option<f64>)> = if query.is_empty() {
        names
            .iter()
            .map(|&n| (n, MatchKind::Unranked, None))
            .collect()
    } else {
        rank(&names, &query)
    };

    let mut seen = HashSet::new();
    let mut hits: Vec<SearchHit> = ranked
        .into_iter()
        .filter(|(name, _, _)| seen.insert(*name))
        .map(|(name, kind, similarity)| SearchHit {
            name: name.to_string(),
            kind,
            boost: boosts.boost(name),
            similarity,
        })
        .collect();

    // stable: equal boosts keep four-pass rank
    hits.sort_by(|a, b| b.boost.total_cmp(&a.boost));

    let (skip, limit) = options.window();
    hits.into_iter().skip(skip).take(limit).collect()
}
