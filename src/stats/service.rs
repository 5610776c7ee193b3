use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use super::names::names_match;
use super::source::{params, DataSource, Params};
use crate::constants::MLB_SPORT_ID;
use crate::utils::UpstreamError;

/// Typed operations over the stats API.
///
/// Every call goes through the injected `DataSource`, so wrapping it in a
/// `CachedSource` makes the whole service cache-backed.
#[derive(Clone)]
pub struct StatsService {
    source: Arc<dyn DataSource>,
}

impl StatsService {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source }
    }

    async fn get(&self, endpoint: &str, params: Params) -> Result<Value, UpstreamError> {
        self.source.fetch(endpoint, &params).await
    }

    /// League leaders for a category, optionally restricted to a league
    pub async fn leaders(
        &self,
        category: &str,
        group: &str,
        season: i32,
        limit: u32,
        league_id: Option<u32>,
    ) -> Result<Vec<Value>, UpstreamError> {
        let mut request = params(&[
            ("leaderCategories", category.to_string()),
            ("season", season.to_string()),
            ("sportId", MLB_SPORT_ID.to_string()),
            ("statGroup", group.to_string()),
            ("limit", limit.to_string()),
        ]);
        if let Some(league_id) = league_id {
            request.insert("leagueId".to_string(), league_id.to_string());
        }

        let data = self.get("stats/leaders", request).await?;
        Ok(data
            .pointer("/leagueLeaders/0/leaders")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Leader-shaped list built from one team's roster, ranked by `stat_field`
    pub async fn team_leaders(
        &self,
        team_id: u32,
        stat_field: &str,
        group: &str,
        season: i32,
        ascending: bool,
    ) -> Result<Vec<Value>, UpstreamError> {
        let mut rows: Vec<(f64, Value)> = self
            .team_player_stats(team_id, season, group)
            .await?
            .into_iter()
            .filter_map(|player| {
                let value = player.get("stat")?.get(stat_field)?.clone();
                let number = super::tables::stat_number(&value)?;
                Some((
                    number,
                    json!({
                        "person": player.get("person").cloned().unwrap_or(Value::Null),
                        "team": player.get("team").cloned().unwrap_or(Value::Null),
                        "value": value,
                    }),
                ))
            })
            .collect();

        rows.sort_by(|a, b| {
            let ord = a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal);
            if ascending {
                ord
            } else {
                ord.reverse()
            }
        });

        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(idx, (_, mut row))| {
                row["rank"] = json!(idx + 1);
                row
            })
            .collect())
    }

    /// Players active in a season whose name matches `name`, ignoring case and accents
    pub async fn search_players(&self, name: &str, season: i32) -> Result<Vec<Value>, UpstreamError> {
        let endpoint = format!("sports/{}/players", MLB_SPORT_ID);
        let data = self.get(&endpoint, params(&[("season", season)])).await?;

        let matches: Vec<Value> = data
            .get("people")
            .and_then(Value::as_array)
            .map(|people| {
                people
                    .iter()
                    .filter(|p| {
                        p.get("fullName")
                            .and_then(Value::as_str)
                            .map(|full| names_match(name, full))
                            .unwrap_or(false)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        debug!("search_players({:?}, {}) -> {} matches", name, season, matches.len());
        Ok(matches)
    }

    /// Hitting and pitching season stats for one player
    pub async fn player_season_stats(&self, player_id: u64, season: i32) -> Result<Value, UpstreamError> {
        let endpoint = format!("people/{}/stats", player_id);
        self.get(
            &endpoint,
            params(&[
                ("stats", "season".to_string()),
                ("season", season.to_string()),
                ("group", "hitting,pitching".to_string()),
            ]),
        )
        .await
    }

    /// The player record hydrated with year-by-year stats for a group
    pub async fn player_career_stats(&self, player_id: u64, group: &str) -> Result<Value, UpstreamError> {
        let endpoint = format!("people/{}", player_id);
        let hydrate = format!("stats(group=[{}],type=[yearByYear])", group);
        let data = self.get(&endpoint, params(&[("hydrate", hydrate)])).await?;
        Ok(data.pointer("/people/0").cloned().unwrap_or(Value::Null))
    }

    pub async fn team_season_stats(&self, team_id: u32, season: i32, group: &str) -> Result<Value, UpstreamError> {
        let endpoint = format!("teams/{}/stats", team_id);
        self.get(
            &endpoint,
            params(&[
                ("stats", "season".to_string()),
                ("season", season.to_string()),
                ("group", group.to_string()),
            ]),
        )
        .await
    }

    /// Every MLB team in a season
    pub async fn teams(&self, season: i32) -> Result<Vec<Value>, UpstreamError> {
        let data = self
            .get("teams", params(&[("sportId", MLB_SPORT_ID as i32), ("season", season)]))
            .await?;
        Ok(data
            .get("teams")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    pub async fn team_roster(&self, team_id: u32, season: i32) -> Result<Vec<Value>, UpstreamError> {
        let endpoint = format!("teams/{}/roster", team_id);
        let data = self
            .get(
                &endpoint,
                params(&[("rosterType", "active".to_string()), ("season", season.to_string())]),
            )
            .await?;
        Ok(data
            .get("roster")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Season stat blocks for every rostered player, restricted to their time with this team
    pub async fn team_player_stats(&self, team_id: u32, season: i32, group: &str) -> Result<Vec<Value>, UpstreamError> {
        let mut rows = Vec::new();

        for entry in self.team_roster(team_id, season).await? {
            let Some(person) = entry.get("person") else {
                continue;
            };
            let Some(player_id) = person.get("id").and_then(Value::as_u64) else {
                continue;
            };

            let stats = self.player_season_stats(player_id, season).await?;
            let team_stat = stats
                .get("stats")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter(|block| block.pointer("/group/displayName").and_then(Value::as_str) == Some(group))
                .flat_map(|block| block.get("splits").and_then(Value::as_array).into_iter().flatten())
                .find(|split| {
                    // traded players have one split per team; a single split has no team tag
                    split.pointer("/team/id").and_then(Value::as_u64).map_or(true, |id| id == team_id as u64)
                })
                .and_then(|split| split.get("stat").cloned());

            if let Some(stat) = team_stat {
                rows.push(json!({
                    "person": person.clone(),
                    "team": {"id": team_id},
                    "stat": stat,
                }));
            }
        }

        Ok(rows)
    }

    pub async fn standings(&self, league_id: u32, season: i32) -> Result<Value, UpstreamError> {
        self.get(
            "standings",
            params(&[
                ("leagueId", league_id.to_string()),
                ("season", season.to_string()),
                ("standingsTypes", "regularSeason".to_string()),
            ]),
        )
        .await
    }

    /// Season stat block of every team, tagged with team and league ids
    pub async fn all_team_stats(&self, season: i32, group: &str) -> Result<Vec<Value>, UpstreamError> {
        let mut rows = Vec::new();

        for team in self.teams(season).await? {
            let Some(team_id) = team.get("id").and_then(Value::as_u64) else {
                continue;
            };
            let data = self.team_season_stats(team_id as u32, season, group).await?;
            if let Some(stat) = data.pointer("/stats/0/splits/0/stat") {
                rows.push(json!({
                    "team_id": team_id,
                    "team_name": team.get("name").cloned().unwrap_or(Value::Null),
                    "league_id": team.pointer("/league/id").cloned().unwrap_or(Value::Null),
                    "stat": stat.clone(),
                }));
            }
        }

        Ok(rows)
    }
}
