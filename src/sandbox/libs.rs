use rhai::module_resolvers::StaticModuleResolver;
use rhai::{Array, Dynamic, EvalAltResult, Module, FLOAT, INT};
use serde_json::Value;
use std::cmp::Ordering;

use crate::stats::tables::stat_number;
use crate::utils::current_season;

/// Modules a script may `import`, by literal name only
pub const ALLOWED_MODULES: &[&str] = &["table", "numeric", "time", "regex", "json"];

const REGEX_SIZE_LIMIT: usize = 1 << 20;

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

pub(crate) fn to_json(value: &Dynamic) -> ScriptResult<Value> {
    rhai::serde::from_dynamic::<Value>(value)
}

pub(crate) fn to_script(value: &Value) -> ScriptResult<Dynamic> {
    rhai::serde::to_dynamic(value)
}

fn rows_to_json(rows: &Array) -> ScriptResult<Vec<Value>> {
    rows.iter().map(to_json).collect()
}

fn rows_to_script(rows: Vec<Value>) -> ScriptResult<Array> {
    rows.iter().map(to_script).collect()
}

fn number(value: &Dynamic) -> ScriptResult<FLOAT> {
    if let Ok(f) = value.as_float() {
        return Ok(f);
    }
    if let Ok(i) = value.as_int() {
        return Ok(i as FLOAT);
    }
    stat_number(&to_json(value)?).ok_or_else(|| format!("not a number: {}", value).into())
}

fn compare_fields(a: &Value, b: &Value) -> Ordering {
    match (stat_number(a), stat_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.to_string().cmp(&b.to_string()),
    }
}

fn sort_rows(rows: Array, field: &str, descending: bool) -> ScriptResult<Array> {
    let mut rows = rows_to_json(&rows)?;
    rows.sort_by(|a, b| {
        let (x, y) = (&a[field], &b[field]);
        // rows missing the field always sort last
        match (x.is_null(), y.is_null()) {
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            _ if descending => compare_fields(y, x),
            _ => compare_fields(x, y),
        }
    });
    rows_to_script(rows)
}

fn table_module() -> Module {
    let mut module = Module::new();

    module.set_native_fn("sort_by", |rows: Array, field: &str| -> ScriptResult<Array> {
        sort_rows(rows, field, false)
    });
    module.set_native_fn("sort_by", |rows: Array, field: &str, descending: bool| -> ScriptResult<Array> {
        sort_rows(rows, field, descending)
    });
    module.set_native_fn("top", |rows: Array, n: INT| -> ScriptResult<Array> {
        Ok(rows.into_iter().take(n.max(0) as usize).collect::<Array>())
    });
    module.set_native_fn("pluck", |rows: Array, field: &str| -> ScriptResult<Array> {
        let rows = rows_to_json(&rows)?;
        rows.iter().map(|row| to_script(&row[field])).collect::<ScriptResult<Array>>()
    });
    module.set_native_fn("where_eq", |rows: Array, field: &str, wanted: Dynamic| -> ScriptResult<Array> {
        let wanted = to_json(&wanted)?;
        let kept = rows_to_json(&rows)?
            .into_iter()
            .filter(|row| {
                let value = &row[field];
                value == &wanted || stat_number(value).zip(stat_number(&wanted)).is_some_and(|(a, b)| a == b)
            })
            .collect();
        rows_to_script(kept)
    });
    module.set_native_fn("sum", |rows: Array, field: &str| -> ScriptResult<FLOAT> {
        Ok(rows_to_json(&rows)?
            .iter()
            .filter_map(|row| stat_number(&row[field]))
            .sum::<FLOAT>())
    });

    module
}

fn numeric_module() -> Module {
    let mut module = Module::new();

    module.set_native_fn("parse", |value: Dynamic| -> ScriptResult<FLOAT> { number(&value) });
    module.set_native_fn("round", |value: Dynamic, digits: INT| -> ScriptResult<FLOAT> {
        let factor = 10f64.powi(digits.clamp(0, 10) as i32);
        Ok((number(&value)? * factor).round() / factor)
    });
    module.set_native_fn("ratio", |a: Dynamic, b: Dynamic| -> ScriptResult<FLOAT> {
        let denominator = number(&b)?;
        if denominator == 0.0 {
            return Err("ratio with a zero denominator".into());
        }
        Ok(number(&a)? / denominator)
    });

    module
}

fn time_module() -> Module {
    let mut module = Module::new();

    module.set_native_fn("current_season", || -> ScriptResult<INT> { Ok(current_season() as INT) });
    module.set_native_fn("year", || -> ScriptResult<INT> {
        use chrono::Datelike;
        Ok(chrono::Utc::now().year() as INT)
    });
    module.set_native_fn("today", || -> ScriptResult<String> {
        Ok(chrono::Utc::now().format("%Y-%m-%d").to_string())
    });

    module
}

fn compile_regex(pattern: &str) -> ScriptResult<regex::Regex> {
    regex::RegexBuilder::new(pattern)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| format!("invalid regex: {}", e).into())
}

fn regex_module() -> Module {
    let mut module = Module::new();

    module.set_native_fn("is_match", |pattern: &str, text: &str| -> ScriptResult<bool> {
        Ok(compile_regex(pattern)?.is_match(text))
    });
    module.set_native_fn("find", |pattern: &str, text: &str| -> ScriptResult<Dynamic> {
        Ok(compile_regex(pattern)?
            .find(text)
            .map(|m| Dynamic::from(m.as_str().to_string()))
            .unwrap_or(Dynamic::UNIT))
    });
    module.set_native_fn("replace", |pattern: &str, text: &str, replacement: &str| -> ScriptResult<String> {
        Ok(compile_regex(pattern)?.replace_all(text, replacement).into_owned())
    });

    module
}

fn json_module() -> Module {
    let mut module = Module::new();

    module.set_native_fn("parse", |text: &str| -> ScriptResult<Dynamic> {
        let value: Value = serde_json::from_str(text).map_err(|e| format!("invalid JSON: {}", e))?;
        to_script(&value)
    });
    module.set_native_fn("stringify", |value: Dynamic| -> ScriptResult<String> {
        serde_json::to_string(&to_json(&value)?).map_err(|e| e.to_string().into())
    });

    module
}

/// Module resolver that knows only the allowlisted modules
pub fn resolver() -> StaticModuleResolver {
    let mut resolver = StaticModuleResolver::new();
    resolver.insert("table", table_module());
    resolver.insert("numeric", numeric_module());
    resolver.insert("time", time_module());
    resolver.insert("regex", regex_module());
    resolver.insert("json", json_module());
    resolver
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhai::Engine;

    fn engine() -> Engine {
        let mut engine = Engine::new();
        engine.set_module_resolver(resolver());
        engine
    }

    #[test]
    fn test_table_sort_and_top() {
        let script = r#"
            import "table" as table;
            let rows = [#{name: "A", value: "41"}, #{name: "B", value: "58"}, #{name: "C", value: "54"}];
            let best = table::top(table::sort_by(rows, "value", true), 2);
            table::pluck(best, "name")
        "#;
        let names: Array = engine().eval(script).unwrap();
        let names: Vec<String> = names.into_iter().map(|d| d.into_string().unwrap()).collect();
        assert_eq!(names, vec!["B", "C"]);
    }

    #[test]
    fn test_numeric_helpers() {
        let value: FLOAT = engine()
            .eval(r#"import "numeric" as numeric; numeric::round(numeric::parse(".3104"), 3)"#)
            .unwrap();
        assert!((value - 0.31).abs() < 1e-9);

        let err = engine().eval::<FLOAT>(r#"import "numeric" as n; n::ratio(1, 0)"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_regex_and_json() {
        let found: String = engine()
            .eval(r#"import "regex" as re; re::find("\\d{4}", "stats for 2024 season")"#)
            .unwrap();
        assert_eq!(found, "2024");

        let text: String = engine()
            .eval(r#"import "json" as json; json::stringify(json::parse("{\"a\": 1}"))"#)
            .unwrap();
        assert_eq!(text, r#"{"a":1}"#);
    }

    #[test]
    fn test_unknown_module_does_not_resolve() {
        assert!(engine().run(r#"import "fs" as fs;"#).is_err());
    }
}
