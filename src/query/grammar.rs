use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

use super::types::{Intent, Statistic, UnresolvedReason};
use crate::constants::{AMERICAN_LEAGUE_ID, NATIONAL_LEAGUE_ID};

/// Phrases that name a statistic, matched on lowercased text
pub const STAT_SYNONYMS: &[(&str, Statistic)] = &[
    ("home runs", Statistic::HomeRuns),
    ("home run", Statistic::HomeRuns),
    ("hrs", Statistic::HomeRuns),
    ("hr", Statistic::HomeRuns),
    ("homers", Statistic::HomeRuns),
    ("homer", Statistic::HomeRuns),
    ("dingers", Statistic::HomeRuns),
    ("stolen bases", Statistic::StolenBases),
    ("stolen base", Statistic::StolenBases),
    ("steals", Statistic::StolenBases),
    ("steal", Statistic::StolenBases),
    ("sb", Statistic::StolenBases),
    ("batting average", Statistic::BattingAverage),
    ("average", Statistic::BattingAverage),
    ("avg", Statistic::BattingAverage),
    ("rbis", Statistic::RunsBattedIn),
    ("rbi", Statistic::RunsBattedIn),
    ("runs batted in", Statistic::RunsBattedIn),
    ("hits", Statistic::Hits),
    ("hit", Statistic::Hits),
    ("doubles", Statistic::Doubles),
    ("double", Statistic::Doubles),
    ("triples", Statistic::Triples),
    ("triple", Statistic::Triples),
    ("runs", Statistic::Runs),
    ("walks", Statistic::Walks),
    ("walk", Statistic::Walks),
    ("strikeouts", Statistic::Strikeouts),
    ("strikeout", Statistic::Strikeouts),
    ("ks", Statistic::Strikeouts),
    ("on base percentage", Statistic::OnBasePercentage),
    ("on-base percentage", Statistic::OnBasePercentage),
    ("obp", Statistic::OnBasePercentage),
    ("on base plus slugging", Statistic::Ops),
    ("slugging percentage", Statistic::Slugging),
    ("slugging", Statistic::Slugging),
    ("slg", Statistic::Slugging),
    ("ops", Statistic::Ops),
    ("earned run average", Statistic::Era),
    ("era", Statistic::Era),
    ("wins", Statistic::Wins),
    ("win", Statistic::Wins),
    ("saves", Statistic::Saves),
    ("save", Statistic::Saves),
    ("walks hits per inning pitched", Statistic::Whip),
    ("whip", Statistic::Whip),
    ("innings pitched", Statistic::InningsPitched),
    ("innings", Statistic::InningsPitched),
];

/// Team nicknames (and a few aliases) with stats API team ids
pub const TEAMS: &[(&str, u32, &str)] = &[
    ("yankees", 147, "New York Yankees"),
    ("red sox", 111, "Boston Red Sox"),
    ("dodgers", 119, "Los Angeles Dodgers"),
    ("giants", 137, "San Francisco Giants"),
    ("cubs", 112, "Chicago Cubs"),
    ("cardinals", 138, "St. Louis Cardinals"),
    ("astros", 117, "Houston Astros"),
    ("braves", 144, "Atlanta Braves"),
    ("phillies", 143, "Philadelphia Phillies"),
    ("mets", 121, "New York Mets"),
    ("padres", 135, "San Diego Padres"),
    ("mariners", 136, "Seattle Mariners"),
    ("angels", 108, "Los Angeles Angels"),
    ("blue jays", 141, "Toronto Blue Jays"),
    ("guardians", 114, "Cleveland Guardians"),
    ("twins", 142, "Minnesota Twins"),
    ("white sox", 145, "Chicago White Sox"),
    ("tigers", 116, "Detroit Tigers"),
    ("royals", 118, "Kansas City Royals"),
    ("orioles", 110, "Baltimore Orioles"),
    ("rays", 139, "Tampa Bay Rays"),
    ("rangers", 140, "Texas Rangers"),
    ("athletics", 133, "Athletics"),
    ("a's", 133, "Athletics"),
    ("brewers", 158, "Milwaukee Brewers"),
    ("pirates", 134, "Pittsburgh Pirates"),
    ("reds", 113, "Cincinnati Reds"),
    ("diamondbacks", 109, "Arizona Diamondbacks"),
    ("d-backs", 109, "Arizona Diamondbacks"),
    ("rockies", 115, "Colorado Rockies"),
    ("marlins", 146, "Miami Marlins"),
    ("nationals", 120, "Washington Nationals"),
];

/// Look up a team's display name by id
pub fn team_name(team_id: u32) -> Option<&'static str> {
    TEAMS
        .iter()
        .find(|(_, id, _)| *id == team_id)
        .map(|(_, _, name)| *name)
}

/// League phrases; the bare abbreviations only count in upper case
pub const LEAGUES: &[(&str, &str, u32, &str)] = &[
    ("american league", "AL", AMERICAN_LEAGUE_ID, "American League"),
    ("national league", "NL", NATIONAL_LEAGUE_ID, "National League"),
];

/// Words that are never part of a player name
pub const STOPWORDS: &[&str] = &[
    "a", "al", "all", "american", "an", "and", "are", "at", "best", "between", "by", "career",
    "compare", "compared", "did", "do", "does", "during", "find", "for", "from", "get", "give",
    "had", "has", "have", "how", "i", "in", "is", "leader", "leaders", "league", "list", "many",
    "me", "mlb", "more", "most", "national", "nl", "of", "on", "or", "rank", "ranked", "ranking",
    "season", "show", "tell", "than", "the", "their", "this", "to", "top", "team", "teams", "v",
    "versus", "vs", "was", "were", "what", "where", "which", "who", "whose", "with", "worst",
    "year",
];

/// Every single word that belongs to a stat phrase
pub static STAT_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    STAT_SYNONYMS
        .iter()
        .flat_map(|(phrase, _)| phrase.split_whitespace())
        .collect()
});

/// Every single word that belongs to a team nickname
pub static TEAM_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    TEAMS
        .iter()
        .flat_map(|(nickname, _, _)| nickname.split_whitespace())
        .collect()
});

fn phrase_regex(phrase: &str) -> Option<Regex> {
    Regex::new(&format!(r"(?:^|[^\w']){}(?:$|[^\w'])", regex::escape(phrase))).ok()
}

/// Stat matchers, longest phrase first
pub static STAT_MATCHERS: Lazy<Vec<(Regex, Statistic)>> = Lazy::new(|| {
    let mut synonyms: Vec<_> = STAT_SYNONYMS.to_vec();
    synonyms.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    synonyms
        .into_iter()
        .filter_map(|(phrase, stat)| phrase_regex(phrase).map(|re| (re, stat)))
        .collect()
});

/// Team matchers, longest nickname first
pub static TEAM_MATCHERS: Lazy<Vec<(Regex, u32, &'static str)>> = Lazy::new(|| {
    let mut teams: Vec<_> = TEAMS.to_vec();
    teams.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    teams
        .into_iter()
        .filter_map(|(nickname, id, name)| phrase_regex(nickname).map(|re| (re, id, name)))
        .collect()
});

pub static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("valid regex literal"));
pub static LIMIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\btop\s+(\d{1,3})\b").expect("valid regex literal"));
pub static RANK_CUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:top|leaders?|rank|ranked|ranking|best|worst)\b|\bwhere did\b").expect("valid regex literal")
});
pub static TEAM_CUE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bteams?\b").expect("valid regex literal"));
pub static COMPARISON_CUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:vs|versus|compare|compared|comparison)\b|\bwho (?:had|has) more\b").expect("valid regex literal")
});
/// Runs of capitalized words (candidate proper nouns)
pub static NAME_SPAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\p{Lu}[\p{L}'’\-]*\.?(?:\s+\p{Lu}[\p{L}'’\-]*\.?)*").expect("valid regex literal")
});

/// Entities found in a question, before intent selection
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub statistic: Option<Statistic>,
    pub player_names: Vec<String>,
    pub team: Option<(u32, &'static str)>,
    pub league: Option<(u32, &'static str)>,
    pub year: Option<i32>,
    pub limit: Option<u32>,
    pub rank_cue: bool,
    pub team_cue: bool,
    pub comparison_cue: bool,
}

/// Outcome of an intent rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Resolve(Intent),
    Unresolved(UnresolvedReason),
}

/// One row of the intent table: the first rule whose predicate holds wins
pub struct IntentRule {
    pub name: &'static str,
    pub applies: fn(&Extraction) -> bool,
    pub outcome: Outcome,
}

/// Named policy: two players with a comparison cue always go to the AI path
pub const COMPARISON_FORCES_AI: &str = "COMPARISON_FORCES_AI";

/// Named policy: a team filter wins over a league filter
pub const TEAM_OVER_LEAGUE: &str = "TEAM_OVER_LEAGUE";

/// Drop the league when a team is also present
pub fn team_over_league(extraction: &mut Extraction) {
    if extraction.team.is_some() && extraction.league.take().is_some() {
        debug!("{}: dropped league filter", TEAM_OVER_LEAGUE);
    }
}

fn lacks_statistic(e: &Extraction) -> bool {
    e.statistic.is_none()
}

fn compares_players(e: &Extraction) -> bool {
    e.comparison_cue && e.player_names.len() >= 2
}

fn asks_about_teams(e: &Extraction) -> bool {
    e.team_cue && e.player_names.is_empty()
}

fn ranks_player(e: &Extraction) -> bool {
    !e.player_names.is_empty() && e.rank_cue
}

fn names_player(e: &Extraction) -> bool {
    !e.player_names.is_empty()
}

fn always(_: &Extraction) -> bool {
    true
}

pub const INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        name: "no_statistic",
        applies: lacks_statistic,
        outcome: Outcome::Unresolved(UnresolvedReason::NoStatistic),
    },
    IntentRule {
        name: COMPARISON_FORCES_AI,
        applies: compares_players,
        outcome: Outcome::Unresolved(UnresolvedReason::Comparison),
    },
    IntentRule {
        name: "team_rank",
        applies: asks_about_teams,
        outcome: Outcome::Resolve(Intent::TeamRank),
    },
    IntentRule {
        name: "player_rank",
        applies: ranks_player,
        outcome: Outcome::Resolve(Intent::Rank),
    },
    IntentRule {
        name: "player_stat",
        applies: names_player,
        outcome: Outcome::Resolve(Intent::PlayerStat),
    },
    IntentRule {
        name: "leaders",
        applies: always,
        outcome: Outcome::Resolve(Intent::Leaders),
    },
];

/// Select the intent for an extraction, returning the matching rule's name too
pub fn select_intent(extraction: &Extraction) -> (Outcome, &'static str) {
    INTENT_RULES
        .iter()
        .find(|rule| (rule.applies)(extraction))
        .map(|rule| (rule.outcome, rule.name))
        .unwrap_or((Outcome::Resolve(Intent::Leaders), "leaders"))
}
