//! Text-similarity primitives shared by the fuzzy and exact matchers (§4.4.1, §4.4.2).

use std::collections::HashSet;

/// Stopwords stripped before comparing counterparty/entity names (§4.4.2).
const STOPWORDS: &[&str] = &["ltd", "inc", "ag", "ab", "kft", "sa", "limited", "gmbh"];

/// Lowercase, strip punctuation, split on non-alphanumeric boundaries, drop stopwords.
fn normalized_tokens(s: &str) -> Vec<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .filter(|t| !STOPWORDS.contains(t))
        .map(str::to_owned)
        .collect()
}

/// Token bigrams of a normalized name; single-token names fall back to a unigram so short
/// names (e.g. a single-word counterparty) are still comparable.
fn token_bigrams(tokens: &[String]) -> HashSet<(String, String)> {
    if tokens.len() < 2 {
        return tokens.iter().map(|t| (t.clone(), String::new())).collect();
    }
    tokens.windows(2).map(|w| (w[0].clone(), w[1].clone())).collect()
}

fn jaccard<T: Eq + std::hash::Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Normalized token-set ratio between two counterparty/entity names: Jaccard similarity over
/// token bigrams after lowercasing, stripping punctuation, and dropping stopwords (§4.4.2).
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let bigrams_a = token_bigrams(&normalized_tokens(a));
    let bigrams_b = token_bigrams(&normalized_tokens(b));
    jaccard(&bigrams_a, &bigrams_b)
}

fn alnum_lower(s: &str) -> Vec<char> {
    s.chars().filter(|c| c.is_alphanumeric()).map(|c| c.to_ascii_lowercase()).collect()
}

/// Whether `needle` appears as a case-insensitive substring of `haystack` after both are
/// stripped to alphanumeric characters only (§4.4.1 reference-match rule).
pub fn contains_normalized(haystack: &str, needle: &str) -> bool {
    let needle = alnum_lower(needle);
    if needle.is_empty() {
        return false;
    }
    let haystack = alnum_lower(haystack);
    haystack.windows(needle.len()).any(|w| w == needle.as_slice())
}

/// Length of the longest common contiguous alphanumeric substring between `a` and `b`
/// (§4.4.2 payment-reference partial match).
pub fn longest_common_alnum_substring_len(a: &str, b: &str) -> usize {
    let a = alnum_lower(a);
    let b = alnum_lower(b);
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut best = 0;
    for i in 1..=a.len() {
        let mut curr = vec![0usize; b.len() + 1];
        for j in 1..=b.len() {
            if a[i - 1] == b[j - 1] {
                curr[j] = prev[j - 1] + 1;
                best = best.max(curr[j]);
            }
        }
        prev = curr;
    }
    best
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn name_similarity_ignores_stopwords_and_case() {
        assert!((name_similarity("OMBORI AG", "Ombori AG") - 1.0).abs() < 1e-9);
        assert!((name_similarity("Ombori AG", "Acme Ltd") - 0.0).abs() < 1e-9);
    }

    #[test]
    fn contains_normalized_matches_across_punctuation() {
        assert!(contains_normalized("INV-7788 settlement", "INV7788"));
        assert!(!contains_normalized("INV-7788 settlement", "INV9999"));
    }

    #[test]
    fn longest_common_alnum_substring_counts_only_alphanumerics() {
        assert_eq!(longest_common_alnum_substring_len("PO-2024-00981", "REF:2024 00981 X"), 9);
        assert_eq!(longest_common_alnum_substring_len("abc", "xyz"), 0);
    }
}
