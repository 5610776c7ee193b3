use serde_json::{json, Value};
use tracing::debug;

use crate::constants::{DEFAULT_LEADERS_LIMIT, LEADERS_FETCH_LIMIT, RANKING_FETCH_LIMIT};
use crate::query::{Intent, ParsedQuery, Statistic};
use crate::stats::{tables, StatsService};
use crate::utils::DugoutError;

/// Answers resolved intents with plain service calls; no generated code involved
pub struct DirectExecutor {
    stats: StatsService,
}

impl DirectExecutor {
    pub fn new(stats: StatsService) -> Self {
        Self { stats }
    }

    pub async fn execute(&self, parsed: &ParsedQuery, season: i32) -> Result<Value, DugoutError> {
        let statistic = parsed
            .statistic
            .ok_or_else(|| DugoutError::NoData("question names no statistic".to_string()))?;

        match parsed.intent {
            Intent::Leaders => self.leaders(parsed, statistic, season).await,
            Intent::PlayerStat => self.player_stat(parsed, statistic, season).await,
            Intent::Rank => self.rank(parsed, statistic, season).await,
            Intent::TeamRank => self.team_rank(parsed, statistic, season).await,
            Intent::Unresolved => Err(DugoutError::NoData(
                "question could not be resolved without generated code".to_string(),
            )),
        }
    }

    async fn ranked_leaders(
        &self,
        parsed: &ParsedQuery,
        statistic: Statistic,
        season: i32,
        fetch_limit: u32,
    ) -> Result<Vec<Value>, DugoutError> {
        let group = statistic.group().as_str();

        let mut rows = match parsed.team_id {
            Some(team_id) => {
                let raw = self
                    .stats
                    .team_leaders(team_id, statistic.stat_field(), group, season, statistic.lower_is_better())
                    .await?;
                tables::leaders(&raw)
            }
            None => {
                let raw = self
                    .stats
                    .leaders(statistic.api_name(), group, season, fetch_limit, parsed.league_id)
                    .await?;
                tables::leaders(&raw)
            }
        };

        // roster rows only carry the team id
        if let Some(team_name) = &parsed.team_name {
            for row in rows.iter_mut().filter(|row| row["team"].is_null()) {
                row["team"] = json!(team_name);
            }
        }

        Ok(rows)
    }

    async fn leaders(&self, parsed: &ParsedQuery, statistic: Statistic, season: i32) -> Result<Value, DugoutError> {
        let limit = parsed.limit.unwrap_or(DEFAULT_LEADERS_LIMIT) as usize;
        let mut rows = self.ranked_leaders(parsed, statistic, season, LEADERS_FETCH_LIMIT).await?;
        if rows.is_empty() {
            return Err(DugoutError::NoData(format!("no {} leaders for {}", statistic.label(), season)));
        }
        rows.truncate(limit);
        debug!("Direct leaders: {} rows", rows.len());

        Ok(json!({
            "statistic": statistic.label(),
            "season": season,
            "team": parsed.team_name,
            "league": parsed.league_name,
            "leaders": rows,
        }))
    }

    async fn player_stat(&self, parsed: &ParsedQuery, statistic: Statistic, season: i32) -> Result<Value, DugoutError> {
        let name = parsed
            .player_name
            .as_deref()
            .ok_or_else(|| DugoutError::NoData("question names no player".to_string()))?;

        let players = self.stats.search_players(name, season).await?;
        let Some(player) = players.first() else {
            return Err(DugoutError::NoData(format!("no player matching {:?} in {}", name, season)));
        };
        let player_id = player
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| DugoutError::NoData(format!("player record for {:?} has no id", name)))?;
        let full_name = player.get("fullName").and_then(Value::as_str).unwrap_or(name);

        let season_stats = self.stats.player_season_stats(player_id, season).await?;
        let value = tables::player_stats(&season_stats, statistic.group().as_str())
            .and_then(|stat| stat.get(statistic.stat_field()).cloned())
            .ok_or_else(|| {
                DugoutError::NoData(format!("no {} recorded for {} in {}", statistic.label(), full_name, season))
            })?;

        Ok(json!({
            "player": full_name,
            "player_id": player_id,
            "season": season,
            "statistic": statistic.label(),
            "value": value,
        }))
    }

    async fn rank(&self, parsed: &ParsedQuery, statistic: Statistic, season: i32) -> Result<Value, DugoutError> {
        let name = parsed
            .player_name
            .as_deref()
            .ok_or_else(|| DugoutError::NoData("question names no player".to_string()))?;

        let rows = self.ranked_leaders(parsed, statistic, season, RANKING_FETCH_LIMIT).await?;
        let row = tables::find_rank(&rows, name).ok_or_else(|| {
            DugoutError::NoData(format!(
                "{} is not among the {} ranked {} players in {}",
                name,
                rows.len(),
                statistic.label(),
                season
            ))
        })?;

        Ok(json!({
            "player": row["name"],
            "season": season,
            "statistic": statistic.label(),
            "rank": row["rank"],
            "value": row["value"],
            "total_ranked": rows.len(),
        }))
    }

    async fn team_rank(&self, parsed: &ParsedQuery, statistic: Statistic, season: i32) -> Result<Value, DugoutError> {
        let limit = parsed.limit.unwrap_or(DEFAULT_LEADERS_LIMIT) as usize;
        let teams: Vec<Value> = self
            .stats
            .all_team_stats(season, statistic.group().as_str())
            .await?
            .into_iter()
            .filter(|team| match parsed.league_id {
                Some(league_id) => team["league_id"].as_u64() == Some(league_id as u64),
                None => true,
            })
            .collect();

        let mut rows = tables::team_stats(&teams, statistic.stat_field(), statistic.lower_is_better());
        if rows.is_empty() {
            return Err(DugoutError::NoData(format!("no team {} for {}", statistic.label(), season)));
        }
        rows.truncate(limit);

        Ok(json!({
            "statistic": statistic.label(),
            "season": season,
            "league": parsed.league_name,
            "teams": rows,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse;
    use crate::stats::{params, FakeSource};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn executor(fake: FakeSource) -> (DirectExecutor, Arc<FakeSource>) {
        let fake = Arc::new(fake);
        (DirectExecutor::new(StatsService::new(fake.clone())), fake)
    }

    fn hr_leaders() -> Value {
        json!({"leagueLeaders": [{"leaders": [
            {"rank": 1, "value": "58", "person": {"id": 592450, "fullName": "Aaron Judge"}, "team": {"id": 147, "name": "New York Yankees"}},
            {"rank": 2, "value": "54", "person": {"id": 660271, "fullName": "Shohei Ohtani"}, "team": {"id": 119, "name": "Los Angeles Dodgers"}},
            {"rank": 3, "value": "44", "person": {"id": 656941, "fullName": "Kyle Schwarber"}, "team": {"id": 143, "name": "Philadelphia Phillies"}}
        ]}]})
    }

    #[tokio::test]
    async fn test_top_ten_home_runs() {
        let (direct, fake) = executor(FakeSource::new().route("stats/leaders", hr_leaders()));
        let parsed = parse("Top 10 home runs in 2024", None);

        let data = direct.execute(&parsed, 2024).await.unwrap();
        assert_eq!(data["leaders"].as_array().unwrap().len(), 3);
        assert_eq!(data["leaders"][0]["name"], json!("Aaron Judge"));

        let (_, sent) = fake.requests().remove(0);
        assert_eq!(sent.get("leaderCategories").map(String::as_str), Some("homeRuns"));
        assert_eq!(sent.get("limit").map(String::as_str), Some("50"));
    }

    #[tokio::test]
    async fn test_limit_truncates() {
        let (direct, _) = executor(FakeSource::new().route("stats/leaders", hr_leaders()));
        let parsed = parse("Top 2 home runs in 2024", None);

        let data = direct.execute(&parsed, 2024).await.unwrap();
        assert_eq!(data["leaders"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_leaders_is_no_data() {
        let (direct, _) = executor(FakeSource::new().route("stats/leaders", json!({"leagueLeaders": []})));
        let parsed = parse("Top 10 home runs in 2024", None);

        let err = direct.execute(&parsed, 2024).await.unwrap_err();
        assert!(matches!(err, DugoutError::NoData(_)));
    }

    #[tokio::test]
    async fn test_player_rank() {
        let (direct, fake) = executor(FakeSource::new().route("stats/leaders", hr_leaders()));
        let mut parsed = parse("Top 10 home runs in 2024", None);
        parsed.intent = Intent::Rank;
        parsed.player_name = Some("Schwarber".to_string());

        let data = direct.execute(&parsed, 2024).await.unwrap();
        assert_eq!(data["rank"], json!(3));
        assert_eq!(data["total_ranked"], json!(3));

        let (_, sent) = fake.requests().remove(0);
        assert_eq!(sent.get("limit").map(String::as_str), Some("500"));
    }

    #[tokio::test]
    async fn test_player_stat_reads_stat_field() {
        let fake = FakeSource::new()
            .route("sports/1/players", json!({"people": [{"id": 683002, "fullName": "Gunnar Henderson"}]}))
            .route_with(
                "people/683002/stats",
                params(&[("season", "2024")]),
                json!({"stats": [{"group": {"displayName": "hitting"}, "splits": [{"stat": {"stolenBases": 21, "baseOnBalls": 78}}]}]}),
            );
        let (direct, _) = executor(fake);
        let mut parsed = parse("Top 10 walks in 2024", None);
        parsed.intent = Intent::PlayerStat;
        parsed.player_name = Some("Henderson".to_string());

        let data = direct.execute(&parsed, 2024).await.unwrap();
        assert_eq!(data["player"], json!("Gunnar Henderson"));
        assert_eq!(data["value"], json!(78));
    }

    #[tokio::test]
    async fn test_team_rank_filters_league_and_sorts_era_ascending() {
        let fake = FakeSource::new()
            .route(
                "teams",
                json!({"teams": [
                    {"id": 147, "name": "New York Yankees", "league": {"id": 103}},
                    {"id": 110, "name": "Baltimore Orioles", "league": {"id": 103}},
                    {"id": 119, "name": "Los Angeles Dodgers", "league": {"id": 104}}
                ]}),
            )
            .route("teams/147/stats", json!({"stats": [{"splits": [{"stat": {"era": "3.74"}}]}]}))
            .route("teams/110/stats", json!({"stats": [{"splits": [{"stat": {"era": "3.94"}}]}]}))
            .route("teams/119/stats", json!({"stats": [{"splits": [{"stat": {"era": "3.90"}}]}]}));
        let (direct, _) = executor(fake);

        let mut parsed = parse("Top 10 home runs in 2024", None);
        parsed.intent = Intent::TeamRank;
        parsed.statistic = Some(Statistic::Era);
        parsed.league_id = Some(103);

        let data = direct.execute(&parsed, 2024).await.unwrap();
        let names: Vec<_> = data["teams"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["team_name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["New York Yankees", "Baltimore Orioles"]);
    }

    #[tokio::test]
    async fn test_upstream_failure_propagates() {
        let (direct, _) = executor(FakeSource::new());
        let parsed = parse("Top 10 home runs in 2024", None);
        let err = direct.execute(&parsed, 2024).await.unwrap_err();
        assert!(matches!(err, DugoutError::Upstream(_)));
    }
}
