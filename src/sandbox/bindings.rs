use rhai::{Array, Dynamic, Engine, EvalAltResult, Map, INT};
use serde_json::Value;
use std::future::Future;
use tokio::runtime::Handle;

use super::libs::{to_json, to_script};
use crate::stats::{tables, StatsService};
use crate::utils::UpstreamError;

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

/// Leader categories that default to the pitching group
const PITCHING_CATEGORIES: &[&str] = &["era", "wins", "saves", "whip", "inningsPitched", "strikeouts"];

/// Script-side handle to the stats service (`stats` in scope).
///
/// Scripts run on a blocking thread; each call blocks on the async service
/// through the runtime handle captured before the script started.
#[derive(Clone)]
pub struct StatsHandle {
    service: StatsService,
    runtime: Handle,
}

impl StatsHandle {
    pub fn new(service: StatsService, runtime: Handle) -> Self {
        Self { service, runtime }
    }

    fn call<F>(&self, fut: F) -> ScriptResult<Dynamic>
    where
        F: Future<Output = Result<Value, UpstreamError>>,
    {
        let value = self.runtime.block_on(fut).map_err(|e| e.to_string())?;
        to_script(&value)
    }

    fn call_rows<F>(&self, fut: F) -> ScriptResult<Array>
    where
        F: Future<Output = Result<Vec<Value>, UpstreamError>>,
    {
        let rows = self.runtime.block_on(fut).map_err(|e| e.to_string())?;
        rows.iter().map(to_script).collect()
    }
}

/// Script-side handle to the record transformations (`tables` in scope)
#[derive(Clone, Default)]
pub struct TablesHandle;

fn id(value: INT) -> ScriptResult<u64> {
    u64::try_from(value).map_err(|_| format!("invalid id: {}", value).into())
}

fn season(value: INT) -> ScriptResult<i32> {
    i32::try_from(value).map_err(|_| format!("invalid season: {}", value).into())
}

fn default_group(category: &str) -> &'static str {
    if PITCHING_CATEGORIES.contains(&category) {
        "pitching"
    } else {
        "hitting"
    }
}

fn rows(array: &Array) -> ScriptResult<Vec<Value>> {
    array.iter().map(to_json).collect()
}

fn script_rows(rows: Vec<Value>) -> ScriptResult<Array> {
    rows.iter().map(to_script).collect()
}

/// Register the `stats` surface
pub fn register_stats(engine: &mut Engine) {
    engine.register_type_with_name::<StatsHandle>("Stats");

    engine.register_fn(
        "leaders",
        |h: &mut StatsHandle, category: &str, year: INT, limit: INT| -> ScriptResult<Array> {
            let limit = u32::try_from(limit.max(1)).unwrap_or(u32::MAX);
            h.call_rows(h.service.leaders(category, default_group(category), season(year)?, limit, None))
        },
    );
    engine.register_fn(
        "leaders",
        |h: &mut StatsHandle, category: &str, year: INT, limit: INT, group: &str| -> ScriptResult<Array> {
            let limit = u32::try_from(limit.max(1)).unwrap_or(u32::MAX);
            h.call_rows(h.service.leaders(category, group, season(year)?, limit, None))
        },
    );
    engine.register_fn(
        "team_leaders",
        |h: &mut StatsHandle, team_id: INT, stat_field: &str, group: &str, year: INT| -> ScriptResult<Array> {
            let ascending = matches!(stat_field, "era" | "whip");
            h.call_rows(h.service.team_leaders(id(team_id)? as u32, stat_field, group, season(year)?, ascending))
        },
    );
    engine.register_fn(
        "search_players",
        |h: &mut StatsHandle, name: &str, year: INT| -> ScriptResult<Array> {
            h.call_rows(h.service.search_players(name, season(year)?))
        },
    );
    engine.register_fn(
        "player_season_stats",
        |h: &mut StatsHandle, player_id: INT, year: INT| -> ScriptResult<Dynamic> {
            h.call(h.service.player_season_stats(id(player_id)?, season(year)?))
        },
    );
    engine.register_fn(
        "player_career_stats",
        |h: &mut StatsHandle, player_id: INT, group: &str| -> ScriptResult<Dynamic> {
            h.call(h.service.player_career_stats(id(player_id)?, group))
        },
    );
    engine.register_fn(
        "team_season_stats",
        |h: &mut StatsHandle, team_id: INT, year: INT, group: &str| -> ScriptResult<Dynamic> {
            h.call(h.service.team_season_stats(id(team_id)? as u32, season(year)?, group))
        },
    );
    engine.register_fn("teams", |h: &mut StatsHandle, year: INT| -> ScriptResult<Array> {
        h.call_rows(h.service.teams(season(year)?))
    });
    engine.register_fn(
        "team_player_stats",
        |h: &mut StatsHandle, team_id: INT, year: INT, group: &str| -> ScriptResult<Array> {
            h.call_rows(h.service.team_player_stats(id(team_id)? as u32, season(year)?, group))
        },
    );
    engine.register_fn(
        "standings",
        |h: &mut StatsHandle, league_id: INT, year: INT| -> ScriptResult<Dynamic> {
            h.call(h.service.standings(id(league_id)? as u32, season(year)?))
        },
    );
    engine.register_fn(
        "all_team_stats",
        |h: &mut StatsHandle, year: INT, group: &str| -> ScriptResult<Array> {
            h.call_rows(h.service.all_team_stats(season(year)?, group))
        },
    );
}

/// Register the `tables` surface
pub fn register_tables(engine: &mut Engine) {
    engine.register_type_with_name::<TablesHandle>("Tables");

    engine.register_fn("leaders", |_: &mut TablesHandle, raw: Array| -> ScriptResult<Array> {
        script_rows(tables::leaders(&rows(&raw)?))
    });
    engine.register_fn(
        "player_stats",
        |_: &mut TablesHandle, season_stats: Map, group: &str| -> ScriptResult<Dynamic> {
            let payload = to_json(&Dynamic::from_map(season_stats))?;
            match tables::player_stats(&payload, group) {
                Some(stat) => to_script(&stat),
                None => Ok(Dynamic::UNIT),
            }
        },
    );
    engine.register_fn(
        "team_stats",
        |_: &mut TablesHandle, all_teams: Array, stat_field: &str, ascending: bool| -> ScriptResult<Array> {
            script_rows(tables::team_stats(&rows(&all_teams)?, stat_field, ascending))
        },
    );
    engine.register_fn(
        "career",
        |_: &mut TablesHandle, person: Map, group: &str| -> ScriptResult<Array> {
            let person = to_json(&Dynamic::from_map(person))?;
            script_rows(tables::career(&person, group))
        },
    );
    engine.register_fn("career_totals", |_: &mut TablesHandle, career_rows: Array| -> ScriptResult<Dynamic> {
        to_script(&tables::career_totals(&rows(&career_rows)?))
    });
    engine.register_fn(
        "find_rank",
        |_: &mut TablesHandle, ranked: Array, name: &str| -> ScriptResult<Dynamic> {
            match tables::find_rank(&rows(&ranked)?, name) {
                Some(row) => to_script(&row),
                None => Ok(Dynamic::UNIT),
            }
        },
    );
}
