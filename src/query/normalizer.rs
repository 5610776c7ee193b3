use super::grammar::{STAT_WORDS, STOPWORDS};

/// Abbreviations rewritten to one canonical spelling
const REPLACEMENTS: &[(&str, &str)] = &[
    ("hr", "home runs"),
    ("hrs", "home runs"),
    ("homers", "home runs"),
    ("dingers", "home runs"),
    ("rbi", "runs batted in"),
    ("rbis", "runs batted in"),
    ("avg", "batting average"),
    ("ba", "batting average"),
    ("obp", "on base percentage"),
    ("ops", "on base plus slugging"),
    ("slg", "slugging percentage"),
    ("era", "earned run average"),
    ("whip", "walks hits per inning pitched"),
    ("ks", "strikeouts"),
    ("bbs", "walks"),
    ("vs", "versus"),
    ("v", "versus"),
    ("compare", "versus"),
    ("comparison", "versus"),
];

const CONNECTORS: &[&str] = &["versus", "or", "and"];

const STRIPPED: &[char] = &['?', '!', '.', ',', ';', ':'];

/// Canonical form of a question for cache keys.
///
/// Lowercases, strips punctuation, collapses whitespace, expands common
/// abbreviations, and orders the two sides of a single `versus`/`or`/`and`
/// so that "Judge vs Soto" and "Soto vs Judge" agree. Idempotent.
pub fn normalize(question: &str) -> String {
    let lowered: String = question
        .to_lowercase()
        .chars()
        .map(|c| if STRIPPED.contains(&c) { ' ' } else { c })
        .collect();

    let mut words: Vec<&str> = Vec::new();
    for word in lowered.split_whitespace() {
        match REPLACEMENTS.iter().find(|(abbrev, _)| *abbrev == word) {
            Some((_, expanded)) => words.extend(expanded.split_whitespace()),
            None => words.push(word),
        }
    }

    order_connected_runs(&mut words);
    words.join(" ")
}

/// Sort the name runs on either side of the only connector in the question
fn order_connected_runs(words: &mut [&str]) {
    let connectors: Vec<usize> = words
        .iter()
        .enumerate()
        .filter(|(_, w)| CONNECTORS.contains(w))
        .map(|(i, _)| i)
        .collect();
    let [at] = connectors[..] else {
        return;
    };

    let mut left_start = at;
    while left_start > 0 && is_name_like(words[left_start - 1]) {
        left_start -= 1;
    }
    let mut right_end = at + 1;
    while right_end < words.len() && is_name_like(words[right_end]) {
        right_end += 1;
    }
    if left_start == at || right_end == at + 1 {
        return;
    }

    let left = words[left_start..at].join(" ");
    let right = words[at + 1..right_end].join(" ");
    if right >= left {
        return;
    }

    let mut reordered: Vec<&str> = Vec::with_capacity(right_end - left_start);
    reordered.extend_from_slice(&words[at + 1..right_end]);
    reordered.push(words[at]);
    reordered.extend_from_slice(&words[left_start..at]);
    words[left_start..right_end].copy_from_slice(&reordered);
}

fn is_name_like(word: &str) -> bool {
    !CONNECTORS.contains(&word)
        && !STOPWORDS.contains(&word)
        && !STAT_WORDS.contains(word)
        && !word.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_case_punctuation_and_whitespace() {
        assert_eq!(
            normalize("  Top 10   Home Runs in 2024?! "),
            "top 10 home runs in 2024"
        );
    }

    #[test]
    fn test_abbreviations_expand() {
        assert_eq!(normalize("Judge HR"), "judge home runs");
        assert_eq!(normalize("ERA leaders"), normalize("earned run average leaders"));
        assert_eq!(normalize("most dingers"), "most home runs");
    }

    #[test]
    fn test_interchangeable_names_share_a_key() {
        assert_eq!(normalize("Judge vs Soto home runs"), normalize("Soto vs. Judge home runs"));
        assert_eq!(normalize("Soto vs Judge home runs"), "judge versus soto home runs");
        assert_eq!(
            normalize("Who had more stolen bases in 2024, Witt or Henderson?"),
            "who had more stolen bases in 2024 henderson or witt"
        );
    }

    #[test]
    fn test_multi_word_runs_reorder_whole() {
        assert_eq!(
            normalize("Juan Soto versus Aaron Judge"),
            "aaron judge versus juan soto"
        );
    }

    #[test]
    fn test_two_connectors_keep_order() {
        assert_eq!(
            normalize("Soto and Judge or Ohtani"),
            "soto and judge or ohtani"
        );
    }

    #[test]
    fn test_idempotent() {
        for question in [
            "Who had more stolen bases in 2024, Witt or Henderson?",
            "Soto v Judge OPS",
            "Top 10 HR in 2024",
            "Compare Ohtani and Judge WHIP",
            "",
        ] {
            let once = normalize(question);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", question);
        }
    }
}
