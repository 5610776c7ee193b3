use tracing::debug;

use super::grammar::{
    select_intent, team_over_league, Extraction, Outcome, COMPARISON_CUE_RE, LEAGUES, LIMIT_RE,
    NAME_SPAN_RE, RANK_CUE_RE, STAT_MATCHERS, STAT_WORDS, STOPWORDS, TEAM_CUE_RE, TEAM_MATCHERS,
    TEAM_WORDS, YEAR_RE,
};
use super::types::{Intent, ParsedQuery, UnresolvedReason};
use crate::constants::{DEFAULT_LEADERS_LIMIT, MIN_QUESTION_CHARS};

/// Parse a question into a structured query.
///
/// Pure: the same question and default year always give the same result.
/// Capitalization is significant because player names are found as runs of
/// capitalized words.
pub fn parse(question: &str, default_year: Option<i32>) -> ParsedQuery {
    let text = question.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.chars().count() < MIN_QUESTION_CHARS {
        return ParsedQuery::unresolved(UnresolvedReason::TooShort, default_year);
    }

    let mut extraction = extract(&text, default_year);
    team_over_league(&mut extraction);

    let (outcome, rule) = select_intent(&extraction);
    debug!("Intent rule '{}' matched: {:?}", rule, outcome);

    let intent = match outcome {
        Outcome::Unresolved(reason) => {
            let mut unresolved = ParsedQuery::unresolved(reason, extraction.year);
            unresolved.statistic = extraction.statistic;
            unresolved.stat_group = extraction.statistic.map(|s| s.group());
            unresolved.player_names = extraction.player_names;
            return unresolved;
        }
        Outcome::Resolve(intent) => intent,
    };

    let limit = match intent {
        Intent::Leaders | Intent::TeamRank => Some(extraction.limit.unwrap_or(DEFAULT_LEADERS_LIMIT)),
        _ => extraction.limit,
    };

    ParsedQuery {
        intent,
        unresolved_reason: None,
        player_name: extraction.player_names.first().cloned(),
        player_names: extraction.player_names,
        statistic: extraction.statistic,
        stat_group: extraction.statistic.map(|s| s.group()),
        year: extraction.year,
        limit,
        team_id: extraction.team.map(|(id, _)| id),
        team_name: extraction.team.map(|(_, name)| name.to_string()),
        league_id: extraction.league.map(|(id, _)| id),
        league_name: extraction.league.map(|(_, name)| name.to_string()),
    }
}

fn extract(text: &str, default_year: Option<i32>) -> Extraction {
    let lower = text.to_lowercase();

    let year = YEAR_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .or(default_year);

    let statistic = STAT_MATCHERS
        .iter()
        .find(|(re, _)| re.is_match(&lower))
        .map(|(_, stat)| *stat);

    let team = TEAM_MATCHERS
        .iter()
        .find(|(re, _, _)| re.is_match(&lower))
        .map(|(_, id, name)| (*id, *name));

    let league = LEAGUES
        .iter()
        .find(|(phrase, abbrev, _, _)| {
            lower.contains(phrase) || text.split_whitespace().any(|w| trim_word(w) == *abbrev)
        })
        .map(|(_, _, id, name)| (*id, *name));

    let limit = LIMIT_RE
        .captures(&lower)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|n| *n > 0);

    Extraction {
        statistic,
        player_names: player_names(text),
        team,
        league,
        year,
        limit,
        rank_cue: RANK_CUE_RE.is_match(&lower),
        team_cue: TEAM_CUE_RE.is_match(&lower),
        comparison_cue: COMPARISON_CUE_RE.is_match(&lower),
    }
}

/// Candidate player names: capitalized runs split at stop, stat, team and league words
fn player_names(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for span in NAME_SPAN_RE.find_iter(text) {
        let mut current: Vec<&str> = Vec::new();
        for word in span.as_str().split_whitespace() {
            let word = strip_possessive(trim_word(word));
            if is_name_word(word) {
                current.push(word);
            } else {
                push_name(&mut names, &mut current);
            }
        }
        push_name(&mut names, &mut current);
    }

    names
}

fn push_name(names: &mut Vec<String>, current: &mut Vec<&str>) {
    if current.is_empty() {
        return;
    }
    let name = current.join(" ");
    current.clear();
    if !names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
        names.push(name);
    }
}

fn is_name_word(word: &str) -> bool {
    if word.chars().count() < 2 {
        return false;
    }
    let lower = word.to_lowercase();
    let lower = lower.as_str();
    !STOPWORDS.contains(&lower) && !STAT_WORDS.contains(lower) && !TEAM_WORDS.contains(lower)
}

fn trim_word(word: &str) -> &str {
    word.trim_matches(|c: char| matches!(c, '?' | '!' | ',' | ';' | ':' | '"' | '(' | ')'))
}

fn strip_possessive(word: &str) -> &str {
    word.strip_suffix("'s")
        .or_else(|| word.strip_suffix("’s"))
        .unwrap_or(word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{AMERICAN_LEAGUE_ID, NATIONAL_LEAGUE_ID};
    use crate::query::types::{StatGroup, Statistic};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_top_ten_home_runs() {
        let parsed = parse("Top 10 home runs in 2024", Some(2025));
        assert_eq!(parsed.intent, Intent::Leaders);
        assert_eq!(parsed.statistic, Some(Statistic::HomeRuns));
        assert_eq!(parsed.stat_group, Some(StatGroup::Hitting));
        assert_eq!(parsed.limit, Some(10));
        assert_eq!(parsed.year, Some(2024));
        assert!(parsed.player_names.is_empty());
    }

    #[test]
    fn test_comparison_is_unresolved() {
        let parsed = parse("Who had more stolen bases in 2024, Henderson or Witt?", Some(2025));
        assert_eq!(parsed.intent, Intent::Unresolved);
        assert_eq!(parsed.unresolved_reason, Some(UnresolvedReason::Comparison));
        assert_eq!(parsed.player_names, vec!["Henderson".to_string(), "Witt".to_string()]);
        assert_eq!(parsed.statistic, Some(Statistic::StolenBases));
        assert_eq!(parsed.year, Some(2024));
    }

    #[test]
    fn test_versus_cue() {
        let parsed = parse("Aaron Judge vs Juan Soto home runs", Some(2024));
        assert_eq!(parsed.unresolved_reason, Some(UnresolvedReason::Comparison));
        assert_eq!(parsed.player_names, vec!["Aaron Judge".to_string(), "Juan Soto".to_string()]);
    }

    #[test]
    fn test_player_rank() {
        let parsed = parse("Where did Aaron Judge rank in home runs in 2023?", None);
        assert_eq!(parsed.intent, Intent::Rank);
        assert_eq!(parsed.player_name.as_deref(), Some("Aaron Judge"));
        assert_eq!(parsed.year, Some(2023));
        assert_eq!(parsed.limit, None);
    }

    #[test]
    fn test_player_stat_with_possessive() {
        let parsed = parse("Shohei Ohtani's stolen bases", Some(2024));
        assert_eq!(parsed.intent, Intent::PlayerStat);
        assert_eq!(parsed.player_name.as_deref(), Some("Shohei Ohtani"));
        assert_eq!(parsed.year, Some(2024));
    }

    #[test]
    fn test_no_statistic() {
        let parsed = parse("Who is the best shortstop ever?", Some(2024));
        assert_eq!(parsed.intent, Intent::Unresolved);
        assert_eq!(parsed.unresolved_reason, Some(UnresolvedReason::NoStatistic));
    }

    #[test]
    fn test_too_short() {
        let parsed = parse("  hr ", Some(2024));
        assert_eq!(parsed.unresolved_reason, Some(UnresolvedReason::TooShort));
    }

    #[test]
    fn test_team_rank() {
        let parsed = parse("Which team had the most home runs in the AL?", Some(2024));
        assert_eq!(parsed.intent, Intent::TeamRank);
        assert_eq!(parsed.league_id, Some(AMERICAN_LEAGUE_ID));
        assert_eq!(parsed.limit, Some(10));
    }

    #[test]
    fn test_team_over_league() {
        let parsed = parse("Top 5 Yankees home runs in the American League", Some(2024));
        assert_eq!(parsed.intent, Intent::Leaders);
        assert_eq!(parsed.team_id, Some(147));
        assert_eq!(parsed.team_name.as_deref(), Some("New York Yankees"));
        assert_eq!(parsed.league_id, None);
        assert_eq!(parsed.limit, Some(5));
    }

    #[test]
    fn test_league_filtered_leaders() {
        let parsed = parse("National League ERA leaders 2022", Some(2024));
        assert_eq!(parsed.intent, Intent::Leaders);
        assert_eq!(parsed.statistic, Some(Statistic::Era));
        assert_eq!(parsed.stat_group, Some(StatGroup::Pitching));
        assert_eq!(parsed.league_id, Some(NATIONAL_LEAGUE_ID));
        assert!(parsed.player_names.is_empty());
    }

    #[test]
    fn test_team_scoped_player_keeps_team() {
        let parsed = parse("Red Sox Rafael Devers home runs", Some(2024));
        assert_eq!(parsed.intent, Intent::PlayerStat);
        assert_eq!(parsed.player_name.as_deref(), Some("Rafael Devers"));
        assert_eq!(parsed.team_id, Some(111));
    }

    #[test]
    fn test_strikeouts_are_pitching() {
        let parsed = parse("strikeout leaders", Some(2024));
        assert_eq!(parsed.intent, Intent::Leaders);
        assert_eq!(parsed.statistic, Some(Statistic::Strikeouts));
        assert_eq!(parsed.stat_group, Some(StatGroup::Pitching));

        let parsed = parse("strikeouts leaders", Some(2024));
        assert_eq!(parsed.statistic, Some(Statistic::Strikeouts));
    }

    #[test]
    fn test_singular_stat_names() {
        assert_eq!(parse("save leaders in 2023", None).statistic, Some(Statistic::Saves));
        assert_eq!(parse("top 5 in walk totals", None).statistic, Some(Statistic::Walks));
        assert_eq!(parse("most win in 2022", None).statistic, Some(Statistic::Wins));
        // the longer phrase still wins over a singular verb form
        assert_eq!(
            parse("who hit the most home runs in 2024", None).statistic,
            Some(Statistic::HomeRuns)
        );
    }

    #[test]
    fn test_parse_is_repeatable() {
        let question = "Top 3 RBI leaders in 2021";
        assert_eq!(parse(question, Some(2024)), parse(question, Some(2024)));
        assert_eq!(parse(question, Some(2024)).statistic, Some(Statistic::RunsBattedIn));
    }
}
