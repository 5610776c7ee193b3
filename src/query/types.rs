use serde::{Deserialize, Serialize};
use std::fmt;

/// What a parsed question asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// League (or team/league-filtered) leader list
    Leaders,
    /// One player's season value for a statistic
    PlayerStat,
    /// Where one player ranks among the leaders
    Rank,
    /// Teams ranked by a team statistic
    TeamRank,
    /// Nothing the direct path can answer; see `UnresolvedReason`
    Unresolved,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Leaders => "leaders",
            Intent::PlayerStat => "player_stat",
            Intent::Rank => "rank",
            Intent::TeamRank => "team_rank",
            Intent::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a question was left for the AI path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    TooShort,
    NoStatistic,
    /// Two or more players with a comparison cue
    Comparison,
}

impl UnresolvedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnresolvedReason::TooShort => "too_short",
            UnresolvedReason::NoStatistic => "no_statistic",
            UnresolvedReason::Comparison => "comparison",
        }
    }
}

/// Stats API stat group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatGroup {
    Hitting,
    Pitching,
}

impl StatGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatGroup::Hitting => "hitting",
            StatGroup::Pitching => "pitching",
        }
    }
}

/// A statistic the direct path knows how to fetch.
///
/// Serialized as the stats API field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statistic {
    #[serde(rename = "homeRuns")]
    HomeRuns,
    #[serde(rename = "stolenBases")]
    StolenBases,
    #[serde(rename = "avg")]
    BattingAverage,
    #[serde(rename = "rbi")]
    RunsBattedIn,
    #[serde(rename = "hits")]
    Hits,
    #[serde(rename = "doubles")]
    Doubles,
    #[serde(rename = "triples")]
    Triples,
    #[serde(rename = "runs")]
    Runs,
    #[serde(rename = "walks")]
    Walks,
    #[serde(rename = "strikeouts")]
    Strikeouts,
    #[serde(rename = "obp")]
    OnBasePercentage,
    #[serde(rename = "slg")]
    Slugging,
    #[serde(rename = "ops")]
    Ops,
    #[serde(rename = "era")]
    Era,
    #[serde(rename = "wins")]
    Wins,
    #[serde(rename = "saves")]
    Saves,
    #[serde(rename = "whip")]
    Whip,
    #[serde(rename = "inningsPitched")]
    InningsPitched,
}

impl Statistic {
    /// Leader category name used by the stats API
    pub fn api_name(&self) -> &'static str {
        match self {
            Statistic::HomeRuns => "homeRuns",
            Statistic::StolenBases => "stolenBases",
            Statistic::BattingAverage => "avg",
            Statistic::RunsBattedIn => "rbi",
            Statistic::Hits => "hits",
            Statistic::Doubles => "doubles",
            Statistic::Triples => "triples",
            Statistic::Runs => "runs",
            Statistic::Walks => "walks",
            Statistic::Strikeouts => "strikeouts",
            Statistic::OnBasePercentage => "obp",
            Statistic::Slugging => "slg",
            Statistic::Ops => "ops",
            Statistic::Era => "era",
            Statistic::Wins => "wins",
            Statistic::Saves => "saves",
            Statistic::Whip => "whip",
            Statistic::InningsPitched => "inningsPitched",
        }
    }

    /// Key of this statistic inside a season stat block
    pub fn stat_field(&self) -> &'static str {
        match self {
            Statistic::Walks => "baseOnBalls",
            Statistic::Strikeouts => "strikeOuts",
            other => other.api_name(),
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Statistic::HomeRuns => "Home Runs",
            Statistic::StolenBases => "Stolen Bases",
            Statistic::BattingAverage => "Batting Average",
            Statistic::RunsBattedIn => "RBI",
            Statistic::Hits => "Hits",
            Statistic::Doubles => "Doubles",
            Statistic::Triples => "Triples",
            Statistic::Runs => "Runs",
            Statistic::Walks => "Walks",
            Statistic::Strikeouts => "Strikeouts",
            Statistic::OnBasePercentage => "On-Base Percentage",
            Statistic::Slugging => "Slugging Percentage",
            Statistic::Ops => "OPS",
            Statistic::Era => "ERA",
            Statistic::Wins => "Wins",
            Statistic::Saves => "Saves",
            Statistic::Whip => "WHIP",
            Statistic::InningsPitched => "Innings Pitched",
        }
    }

    pub fn group(&self) -> StatGroup {
        match self {
            Statistic::Era
            | Statistic::Wins
            | Statistic::Saves
            | Statistic::Whip
            | Statistic::InningsPitched
            | Statistic::Strikeouts => StatGroup::Pitching,
            _ => StatGroup::Hitting,
        }
    }

    /// Rankings sort ascending for these
    pub fn lower_is_better(&self) -> bool {
        matches!(self, Statistic::Era | Statistic::Whip)
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Structured reading of a question. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuery {
    pub intent: Intent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unresolved_reason: Option<UnresolvedReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
    /// Every distinct candidate name found, in order of appearance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub player_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistic: Option<Statistic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stat_group: Option<StatGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub league_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub league_name: Option<String>,
}

impl ParsedQuery {
    pub fn unresolved(reason: UnresolvedReason, year: Option<i32>) -> Self {
        Self {
            intent: Intent::Unresolved,
            unresolved_reason: Some(reason),
            player_name: None,
            player_names: Vec::new(),
            statistic: None,
            stat_group: None,
            year,
            limit: None,
            team_id: None,
            team_name: None,
            league_id: None,
            league_name: None,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        self.intent == Intent::Unresolved
    }

    /// One-line description for logs and the `parse` command
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("intent={}", self.intent)];
        if let Some(reason) = self.unresolved_reason {
            parts.push(format!("reason={}", reason.as_str()));
        }
        if let Some(stat) = self.statistic {
            parts.push(format!("stat={}", stat.api_name()));
        }
        if let Some(player) = &self.player_name {
            parts.push(format!("player={}", player));
        }
        if let Some(team) = &self.team_name {
            parts.push(format!("team={}", team));
        }
        if let Some(league) = &self.league_name {
            parts.push(format!("league={}", league));
        }
        if let Some(year) = self.year {
            parts.push(format!("year={}", year));
        }
        if let Some(limit) = self.limit {
            parts.push(format!("limit={}", limit));
        }
        parts.join(" ")
    }
}
