//! Name normalization and string similarity.

use std::collections::BTreeSet;

/// Titles stripped before comparing names.
const HONORIFICS: &[&str] = &["mr", "mrs", "ms", "miss", "dr", "prof"];

/// Normalize a person's name into sorted lowercase tokens.
///
/// Every non-alphanumeric character separates tokens, honorifics are dropped, and the tokens are
/// sorted so that "Doe, Jane" and "Jane Doe" normalize identically.
pub fn normalize_name(name: &str) -> Vec<String> {
    let lowered = name.to_lowercase();
    let mut tokens: Vec<String> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && !HONORIFICS.contains(t))
        .map(str::to_string)
        .collect();
    tokens.sort();
    tokens
}

/// Similarity of two names in `[0, 1]`.
///
/// The larger of the Levenshtein ratio over the normalized token strings and the token overlap
/// `|A ∩ B| / max(|A|, |B|)`. A name that normalizes to nothing scores 0 against anything.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let tokens_a = normalize_name(a);
    let tokens_b = normalize_name(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let joined_a = tokens_a.join(" ");
    let joined_b = tokens_b.join(" ");
    let ratio = levenshtein_ratio(&joined_a, &joined_b);

    let set_a: BTreeSet<&str> = tokens_a.iter().map(String::as_str).collect();
    let set_b: BTreeSet<&str> = tokens_b.iter().map(String::as_str).collect();
    let shared = set_a.intersection(&set_b).count();
    let overlap = shared as f64 / set_a.len().max(set_b.len()) as f64;

    ratio.max(overlap).clamp(0.0, 1.0)
}

/// `1 - distance / max(len)`, computed over chars.
pub fn levenshtein_ratio(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Edit distance with unit costs, two-row dynamic programming.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_chars.len()]
}
