//! Pure transformations from stats API payloads to flat records.
//!
//! Every function takes JSON as returned by `StatsService` and returns plain
//! JSON objects with stable field names, so both the direct path and
//! generated scripts can work with them.

use serde_json::{json, Map, Value};

use super::names::{fold_name, names_match};

/// Rate statistics are never summed into career totals
const RATE_FIELDS: &[&str] = &[
    "avg", "obp", "slg", "ops", "era", "whip", "babip", "stolenBasePercentage", "winPercentage",
    "strikeoutWalkRatio", "groundOutsToAirouts", "atBatsPerHomeRun", "inningsPitched",
];

/// Numeric reading of a stat value: numbers as-is, strings like ".310" or "2.45" parsed
pub fn stat_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Flatten a `stats/leaders` (or team leader) list into ranked rows
pub fn leaders(raw: &[Value]) -> Vec<Value> {
    raw.iter()
        .enumerate()
        .map(|(idx, leader)| {
            json!({
                "rank": leader.get("rank").cloned().unwrap_or_else(|| json!(idx + 1)),
                "name": leader.pointer("/person/fullName").cloned().unwrap_or(Value::Null),
                "player_id": leader.pointer("/person/id").cloned().unwrap_or(Value::Null),
                "team": leader.pointer("/team/name").cloned().unwrap_or(Value::Null),
                "team_id": leader.pointer("/team/id").cloned().unwrap_or(Value::Null),
                "value": leader.get("value").cloned().unwrap_or(Value::Null),
            })
        })
        .collect()
}

/// The season stat block for a group (`hitting` or `pitching`) from a
/// `people/{id}/stats` payload
pub fn player_stats(season_stats: &Value, group: &str) -> Option<Value> {
    season_stats
        .get("stats")?
        .as_array()?
        .iter()
        .filter(|block| block.pointer("/group/displayName").and_then(Value::as_str) == Some(group))
        .flat_map(|block| block.get("splits").and_then(Value::as_array).into_iter().flatten())
        .find_map(|split| split.get("stat").cloned())
}

/// Rank teams by one stat field; ascending when lower is better
pub fn team_stats(all_teams: &[Value], stat_field: &str, ascending: bool) -> Vec<Value> {
    let mut rows: Vec<(f64, Value)> = all_teams
        .iter()
        .filter_map(|team| {
            let raw = team.get("stat")?.get(stat_field)?;
            let number = stat_number(raw)?;
            Some((
                number,
                json!({
                    "team_id": team.get("team_id").cloned().unwrap_or(Value::Null),
                    "team_name": team.get("team_name").cloned().unwrap_or(Value::Null),
                    "league_id": team.get("league_id").cloned().unwrap_or(Value::Null),
                    "value": raw.clone(),
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

    rows.into_iter()
        .enumerate()
        .map(|(idx, (_, mut row))| {
            row["rank"] = json!(idx + 1);
            row
        })
        .collect()
}

/// Year-by-year rows from a person hydrated with `yearByYear` stats
pub fn career(person: &Value, group: &str) -> Vec<Value> {
    let Some(blocks) = person.get("stats").and_then(Value::as_array) else {
        return Vec::new();
    };

    blocks
        .iter()
        .filter(|block| block.pointer("/group/displayName").and_then(Value::as_str) == Some(group))
        .flat_map(|block| block.get("splits").and_then(Value::as_array).into_iter().flatten())
        .filter_map(|split| {
            let mut row = Map::new();
            row.insert("season".to_string(), split.get("season").cloned().unwrap_or(Value::Null));
            row.insert(
                "team".to_string(),
                split.pointer("/team/name").cloned().unwrap_or(Value::Null),
            );
            for (field, value) in split.get("stat")?.as_object()? {
                row.insert(field.clone(), value.clone());
            }
            Some(Value::Object(row))
        })
        .collect()
}

/// Sum the counting stats of career rows
pub fn career_totals(rows: &[Value]) -> Value {
    let mut totals: Map<String, Value> = Map::new();
    let mut seasons = 0;

    for row in rows {
        let Some(fields) = row.as_object() else {
            continue;
        };
        seasons += 1;
        for (field, value) in fields {
            if field == "season" || RATE_FIELDS.contains(&field.as_str()) {
                continue;
            }
            let Some(n) = value.as_i64() else {
                continue;
            };
            let sum = totals.get(field).and_then(Value::as_i64).unwrap_or(0) + n;
            totals.insert(field.clone(), json!(sum));
        }
    }

    totals.insert("seasons".to_string(), json!(seasons));
    Value::Object(totals)
}

/// Find a player in ranked rows by name, ignoring case and accents.
/// An exact folded match wins over a partial one.
pub fn find_rank(rows: &[Value], player_name: &str) -> Option<Value> {
    let wanted = fold_name(player_name);
    if wanted.is_empty() {
        return None;
    }
    let row_name = |row: &&Value| row.get("name").and_then(Value::as_str).map(str::to_owned);
    rows.iter()
        .find(|row| row_name(row).is_some_and(|name| fold_name(&name) == wanted))
        .or_else(|| {
            rows.iter()
                .find(|row| row_name(row).is_some_and(|name| names_match(player_name, &name)))
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw_leaders() -> Vec<Value> {
        vec![
            json!({"rank": 1, "value": "58", "person": {"id": 592450, "fullName": "Aaron Judge"}, "team": {"id": 147, "name": "New York Yankees"}}),
            json!({"rank": 2, "value": "54", "person": {"id": 660271, "fullName": "Shohei Ohtani"}, "team": {"id": 119, "name": "Los Angeles Dodgers"}}),
        ]
    }

    #[test]
    fn test_leaders_flatten() {
        let rows = leaders(&raw_leaders());
        assert_eq!(
            rows[0],
            json!({"rank": 1, "name": "Aaron Judge", "player_id": 592450, "team": "New York Yankees", "team_id": 147, "value": "58"})
        );
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_find_rank_partial_name() {
        let rows = leaders(&raw_leaders());
        let found = find_rank(&rows, "ohtani").unwrap();
        assert_eq!(found["rank"], json!(2));
        assert!(find_rank(&rows, "Soto").is_none());
        assert!(find_rank(&rows, "  ").is_none());
    }

    #[test]
    fn test_find_rank_folds_accents() {
        let rows = vec![
            json!({"rank": 3, "name": "Harold Ramírez", "value": "12"}),
            json!({"rank": 7, "name": "José Ramírez", "value": "39"}),
        ];
        assert_eq!(find_rank(&rows, "Jose Ramirez").unwrap()["rank"], json!(7));
        assert_eq!(find_rank(&rows, "harold ramirez").unwrap()["rank"], json!(3));
    }

    #[test]
    fn test_player_stats_picks_group() {
        let payload = json!({"stats": [
            {"group": {"displayName": "pitching"}, "splits": [{"stat": {"era": "3.10"}}]},
            {"group": {"displayName": "hitting"}, "splits": [{"stat": {"homeRuns": 54, "stolenBases": 59}}]}
        ]});
        assert_eq!(player_stats(&payload, "hitting"), Some(json!({"homeRuns": 54, "stolenBases": 59})));
        assert_eq!(player_stats(&payload, "pitching"), Some(json!({"era": "3.10"})));
        assert_eq!(player_stats(&json!({}), "hitting"), None);
    }

    #[test]
    fn test_team_stats_ordering() {
        let teams = vec![
            json!({"team_id": 1, "team_name": "A", "stat": {"era": "3.90", "homeRuns": 200}}),
            json!({"team_id": 2, "team_name": "B", "stat": {"era": "3.20", "homeRuns": 237}}),
            json!({"team_id": 3, "team_name": "C", "stat": {"homeRuns": 180}}),
        ];
        let by_era = team_stats(&teams, "era", true);
        assert_eq!(by_era.len(), 2);
        assert_eq!(by_era[0]["team_name"], json!("B"));
        assert_eq!(by_era[0]["rank"], json!(1));

        let by_hr = team_stats(&teams, "homeRuns", false);
        assert_eq!(by_hr[0]["team_id"], json!(2));
        assert_eq!(by_hr[2]["team_id"], json!(3));
    }

    #[test]
    fn test_career_and_totals() {
        let person = json!({"stats": [{"group": {"displayName": "hitting"}, "splits": [
            {"season": "2022", "team": {"name": "New York Yankees"}, "stat": {"homeRuns": 62, "avg": ".311"}},
            {"season": "2023", "team": {"name": "New York Yankees"}, "stat": {"homeRuns": 37, "avg": ".267"}}
        ]}]});
        let rows = career(&person, "hitting");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["season"], json!("2023"));

        let totals = career_totals(&rows);
        assert_eq!(totals["homeRuns"], json!(99));
        assert_eq!(totals["seasons"], json!(2));
        assert!(totals.get("avg").is_none());
    }

    #[test]
    fn test_stat_number() {
        assert_eq!(stat_number(&json!(".310")), Some(0.31));
        assert_eq!(stat_number(&json!(44)), Some(44.0));
        assert_eq!(stat_number(&json!("-.--")), None);
    }
}
