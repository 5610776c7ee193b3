use std::collections::HashSet;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Nicknames and short forms mapped to the folded full name
const KNOWN_ALIASES: &[(&str, &str)] = &[
    ("mike trout", "michael trout"),
    ("a rod", "alex rodriguez"),
    ("arod", "alex rodriguez"),
    ("big papi", "david ortiz"),
    ("king felix", "felix hernandez"),
    ("vladdy", "vladimir guerrero"),
    ("vlad jr", "vladimir guerrero jr"),
];

const NAME_SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv", "v"];

/// Share of distinct words two names must have in common to match loosely
const WORD_OVERLAP_THRESHOLD: f64 = 0.7;

/// Fold a player name for comparison: lowercase, accents stripped,
/// apostrophes and periods dropped, hyphens as spaces.
///
/// "Ronald Acuña Jr." and "ronald acuna jr" fold to the same string.
pub fn fold_name(name: &str) -> String {
    let stripped: String = name
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .filter(|c| !matches!(c, '\'' | '’' | '.'))
        .map(|c| if c == '-' { ' ' } else { c })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Folded form of a searched name, with known nicknames expanded
pub fn expand_alias(name: &str) -> String {
    let folded = fold_name(name);
    KNOWN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == folded)
        .map(|(_, full)| full.to_string())
        .unwrap_or(folded)
}

/// Last name without generational suffix ("Fernando Tatis Jr." -> "tatis")
pub fn last_name(full_name: &str) -> Option<String> {
    let folded = fold_name(full_name);
    let parts: Vec<&str> = folded.split(' ').filter(|p| !p.is_empty()).collect();
    match parts.as_slice() {
        [] => None,
        [.., before, last] if NAME_SUFFIXES.contains(last) => Some(before.to_string()),
        [.., last] => Some(last.to_string()),
    }
}

/// Whether a user-typed name refers to a player's full name
pub fn names_match(query: &str, full_name: &str) -> bool {
    let wanted = expand_alias(query);
    let candidate = fold_name(full_name);
    if wanted.is_empty() || candidate.is_empty() {
        return false;
    }
    if candidate.contains(&wanted) || wanted.contains(&candidate) {
        return true;
    }

    let wanted_words: HashSet<&str> = wanted.split(' ').collect();
    let candidate_words: HashSet<&str> = candidate.split(' ').collect();
    if wanted_words.is_subset(&candidate_words) {
        return true;
    }

    let shared = wanted_words.intersection(&candidate_words).count();
    let total = wanted_words.union(&candidate_words).count();
    shared as f64 / total as f64 >= WORD_OVERLAP_THRESHOLD
}
