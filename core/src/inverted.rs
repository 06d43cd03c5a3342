//! Multi-field categorical/fuzzy inverted filter.
//!
//! A nested hashmap: field name -> value -> list of ids, with AND/OR
//! composition over the id sets. Spans only ever filter on a handful of
//! known string fields (`action`, `domain`, `tag`), so the value keys are
//! plain strings rather than a hashed key layer over arbitrary metadata.

use itertools::Itertools;
use parking_lot::RwLock;
use std::collections::HashMap;
use trajectory_types::SpanId;

/// A query's candidate-id seed: either every known id, or a concrete,
/// already-narrowed set to intersect against.
pub enum Seed<'a> {
    All,
    Ids(&'a [SpanId]),
}

impl<'a> From<&'a [SpanId]> for Seed<'a> {
    fn from(ids: &'a [SpanId]) -> Self {
        Seed::Ids(ids)
    }
}

/// Intersect `ids` with `seed`, preserving the order of the shorter
/// operand. `Seed::All` is the identity.
fn apply_seed(ids: Vec<SpanId>, seed: &Seed) -> Vec<SpanId> {
    match seed {
        Seed::All => ids,
        Seed::Ids(seed_ids) => {
            let (shorter, longer): (&[SpanId], &[SpanId]) = if seed_ids.len() <= ids.len() {
                (seed_ids, &ids)
            } else {
                (&ids, seed_ids)
            };
            let longer_set: std::collections::HashSet<&SpanId> = longer.iter().collect();
            shorter
                .iter()
                .filter(|id| longer_set.contains(id))
                .cloned()
                .collect()
        }
    }
}

/// Minimum substring length gated for fuzzy action matching: ungated
/// substring containment over-matches short tokens like "get" inside
/// "regret". Levenshtein similarity is unaffected.
const MIN_FUZZY_SUBSTRING_LEN: usize = 4;

/// Per-field categorical postings, append-only, with exact/fuzzy/AND/OR
/// query modes.
///
/// Internally guarded by a single [`RwLock`] — spans only ever touch a
/// handful of fields, so one lock suffices — so the matcher can hold this
/// behind a non-owning `Arc` and add postings through `&self`.
#[derive(Debug, Default)]
pub struct InvertedFilter {
    // field -> value -> ids, insertion order preserved within each list.
    index: RwLock<HashMap<String, HashMap<String, Vec<SpanId>>>>,
}

impl InvertedFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[tracing::instrument(skip(self))]
    pub fn add(&self, id: SpanId, field: &str, value: &str) {
        self.index
            .write()
            .entry(field.to_string())
            .or_default()
            .entry(value.to_string())
            .or_default()
            .push(id);
    }

    /// Drops every posting of `id` across every field, e.g. when a host's
    /// ledger-driven correction deletes the underlying span.
    #[tracing::instrument(skip(self))]
    pub fn remove_span(&self, id: &SpanId) {
        for values in self.index.write().values_mut() {
            for ids in values.values_mut() {
                ids.retain(|existing| existing != id);
            }
        }
    }

    /// Exact lookup; duplicates within a single `(field, value)` list are
    /// deduplicated here to honor set-membership semantics.
    pub fn find(&self, field: &str, value: &str) -> Vec<SpanId> {
        self.index
            .read()
            .get(field)
            .and_then(|values| values.get(value))
            .map(|ids| ids.iter().unique().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_field_values(&self, field: &str) -> Vec<String> {
        self.index
            .read()
            .get(field)
            .map(|values| values.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_count(&self, field: &str, value: &str) -> usize {
        self.find(field, value).len()
    }

    /// Exact mode returns `find("action", action)`; fuzzy mode scans every
    /// stored action value and includes ids whose value contains the query
    /// (or vice versa) or whose Levenshtein similarity exceeds 0.7. `seed`
    /// narrows the result when not `Seed::All`.
    #[tracing::instrument(skip(self, seed))]
    pub fn filter_by_action(&self, seed: Seed<'_>, action: &str, fuzzy: bool) -> Vec<SpanId> {
        let matched = if !fuzzy {
            self.find("action", action)
        } else {
            let guard = self.index.read();
            let Some(values) = guard.get("action") else {
                return Vec::new();
            };
            let query_lower = action.to_lowercase();
            let mut stored_values: Vec<&String> = values.keys().collect();
            stored_values.sort();
            let mut out = Vec::new();
            for stored in stored_values {
                let ids = &values[stored];
                let stored_lower = stored.to_lowercase();
                let substring_match = query_lower.len() >= MIN_FUZZY_SUBSTRING_LEN
                    && (stored_lower.contains(&query_lower) || query_lower.contains(&stored_lower));
                let similar = levenshtein_similarity(&stored_lower, &query_lower) > 0.7;
                if substring_match || similar {
                    out.extend(ids.iter().cloned());
                }
            }
            out.into_iter().unique().collect()
        };
        apply_seed(matched, &seed)
    }

    /// OR across `tags` on field "tag", then optional intersection with
    /// `seed`.
    #[tracing::instrument(skip(self, seed, tags))]
    pub fn filter_by_tags(&self, seed: Seed<'_>, tags: &[String]) -> Vec<SpanId> {
        let mut out = Vec::new();
        for tag in tags {
            out.extend(self.find("tag", tag));
        }
        let deduped: Vec<SpanId> = out.into_iter().unique().collect();
        apply_seed(deduped, &seed)
    }

    /// Exact match on field "domain", then optional intersection with
    /// `seed`.
    pub fn filter_by_domain(&self, seed: Seed<'_>, domain: &str) -> Vec<SpanId> {
        apply_seed(self.find("domain", domain), &seed)
    }

    /// AND across every `(field, value)` pair by successive intersection;
    /// order-independent, empty input yields the empty set.
    #[tracing::instrument(skip(self, filters))]
    pub fn find_all(&self, filters: &HashMap<String, String>) -> Vec<SpanId> {
        if filters.is_empty() {
            return Vec::new();
        }
        let mut result: Option<Vec<SpanId>> = None;
        for (field, value) in filters {
            let ids = self.find(field, value);
            result = Some(match result {
                None => ids,
                Some(acc) => apply_seed(ids, &Seed::Ids(&acc)),
            });
        }
        result.unwrap_or_default()
    }
}

/// Classic DP edit distance.
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());
    if n == 0 {
        return m;
    }
    if m == 0 {
        return n;
    }
    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr = vec![0usize; m + 1];
    for i in 1..=n {
        curr[0] = i;
        for j in 1..=m {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1)
                .min(curr[j - 1] + 1)
                .min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[m]
}

/// `1 - d / max(|a|, |b|)`, with `d/0 ≡ 1`.
pub fn levenshtein_similarity(a: &str, b: &str) -> f32 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let d = levenshtein_distance(a, b);
    1.0 - (d as f32 / max_len as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn filter_with_actions() -> InvertedFilter {
        let f = InvertedFilter::new();
        f.add("span1".into(), "action", "create_user");
        f.add("span2".into(), "action", "create_account");
        f.add("span3".into(), "action", "delete_user");
        f
    }

    #[test]
    fn exact_find_returns_single_match() {
        let f = filter_with_actions();
        assert_eq!(f.find("action", "create_user"), vec!["span1".to_string()]);
    }

    #[test]
    fn fuzzy_action_matches_substring_prefix() {
        let f = filter_with_actions();
        let mut got = f.filter_by_action(Seed::All, "create", true);
        got.sort();
        assert_eq!(got, vec!["span1".to_string(), "span2".to_string()]);
    }

    #[test]
    fn fuzzy_respects_seed_intersection() {
        let f = filter_with_actions();
        let seed = vec!["span2".to_string()];
        let got = f.filter_by_action(Seed::Ids(&seed), "create", true);
        assert_eq!(got, vec!["span2".to_string()]);
    }

    #[test]
    fn find_all_ands_across_fields() {
        let f = InvertedFilter::new();
        f.add("a".into(), "action", "create_user");
        f.add("a".into(), "domain", "prod");
        f.add("b".into(), "action", "create_user");
        f.add("b".into(), "domain", "staging");

        let mut filters = HashMap::new();
        filters.insert("action".to_string(), "create_user".to_string());
        filters.insert("domain".to_string(), "prod".to_string());
        assert_eq!(f.find_all(&filters), vec!["a".to_string()]);
    }

    #[test]
    fn find_all_empty_input_yields_empty_set() {
        let f = filter_with_actions();
        assert_eq!(f.find_all(&HashMap::new()), Vec::<SpanId>::new());
    }

    #[test]
    fn tags_are_ored_together() {
        let f = InvertedFilter::new();
        f.add("a".into(), "tag", "urgent");
        f.add("b".into(), "tag", "routine");
        let mut got = f.filter_by_tags(Seed::All, &["urgent".to_string(), "routine".to_string()]);
        got.sort();
        assert_eq!(got, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn remove_span_drops_every_posting() {
        let f = filter_with_actions();
        f.add("span1".into(), "domain", "prod");
        f.remove_span(&"span1".to_string());
        assert_eq!(f.find("action", "create_user"), Vec::<SpanId>::new());
        assert_eq!(f.find("domain", "prod"), Vec::<SpanId>::new());
    }

    #[test]
    fn levenshtein_similarity_of_identical_strings_is_one() {
        assert_eq!(levenshtein_similarity("abc", "abc"), 1.0);
    }

    #[test]
    fn levenshtein_similarity_of_empty_strings_is_one() {
        assert_eq!(levenshtein_similarity("", ""), 1.0);
    }

    #[test]
    fn short_tokens_do_not_substring_match() {
        // "get" should not fuzzy-match "regret" via substring containment
        // once gated at length 4.
        let f = InvertedFilter::new();
        f.add("a".into(), "action", "regret_action");
        let got = f.filter_by_action(Seed::All, "get", true);
        assert!(!got.contains(&"a".to_string()));
    }
}
