use colored::Colorize;
use serde_json::Value;

use super::resolver::Resolution;
use crate::cli::OutputFormat;

/// Format a resolution according to the output format
pub fn format_resolution(resolution: &Resolution, format: &OutputFormat, show_code: bool) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(resolution)
            .unwrap_or_else(|e| format!("{{\"type\": \"error\", \"message\": \"Failed to serialize result: {}\"}}", e)),
        OutputFormat::Text => format_text(resolution, show_code),
        OutputFormat::Markdown => format_markdown(resolution, show_code),
    }
}

fn format_text(resolution: &Resolution, show_code: bool) -> String {
    let mut output = String::new();

    match resolution {
        Resolution::Standard { parsed_query, data } => {
            output.push_str(&format!("{}\n\n", parsed_query.summary().dimmed()));
            output.push_str(&render_rows(data));
        }
        Resolution::AiResolved {
            data,
            answer,
            code_text,
            cached,
            attempts,
            steps,
        } => {
            if let Some(answer) = answer {
                output.push_str(&format!("{}\n\n", answer.bold()));
            }
            output.push_str(&render_rows(data));

            let origin = if *cached {
                "cached code".to_string()
            } else {
                format!("generated code, {} attempt(s)", attempts)
            };
            output.push_str(&format!("\n{}\n", format!("[{}]", origin).dimmed()));

            if show_code {
                output.push_str("\n--- Steps ---\n");
                for step in steps {
                    output.push_str(&format!("  {}\n", step));
                }
                if let Some(code) = code_text {
                    output.push_str("\n--- Code ---\n");
                    output.push_str(code);
                    output.push('\n');
                }
            }
        }
        Resolution::Error {
            kind,
            message,
            code_text,
        } => {
            output.push_str(&format!("{} {}\n", format!("[{}]", kind).red().bold(), message));
            if kind.can_regenerate() {
                output.push_str(&format!("{}\n", "Try `dugout regenerate` to discard the cached code and retry.".yellow()));
            }
            if let (true, Some(code)) = (show_code, code_text) {
                output.push_str("\n--- Last code ---\n");
                output.push_str(code);
                output.push('\n');
            }
        }
    }

    output
}

fn format_markdown(resolution: &Resolution, show_code: bool) -> String {
    let mut output = String::new();

    match resolution {
        Resolution::Standard { parsed_query, data } => {
            output.push_str("## Result\n\n");
            output.push_str(&markdown_table(data));
            output.push_str(&format!("\n---\n*{}*\n", parsed_query.summary()));
        }
        Resolution::AiResolved {
            data,
            answer,
            code_text,
            cached,
            attempts,
            ..
        } => {
            output.push_str("## Answer\n\n");
            if let Some(answer) = answer {
                output.push_str(&format!("{}\n\n", answer));
            }
            output.push_str(&markdown_table(data));
            if let (true, Some(code)) = (show_code, code_text) {
                output.push_str(&format!("\n## Code\n\n```rhai\n{}\n```\n", code));
            }
            output.push_str(&format!("\n---\n*Cached: {} | Attempts: {}*\n", cached, attempts));
        }
        Resolution::Error { kind, message, .. } => {
            output.push_str("## Error\n\n");
            output.push_str(&format!("- **{}**: {}\n", kind, message));
        }
    }

    output
}

/// The first array of records inside the data, if any
fn record_rows(data: &Value) -> Option<&Vec<Value>> {
    match data {
        Value::Array(rows) => Some(rows),
        Value::Object(map) => map.values().find_map(|v| v.as_array().filter(|rows| rows.iter().all(Value::is_object))),
        _ => None,
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

fn render_rows(data: &Value) -> String {
    let mut output = String::new();

    if let Some(map) = data.as_object() {
        for (key, value) in map.iter().filter(|(_, v)| !v.is_array() && !v.is_object() && !v.is_null()) {
            output.push_str(&format!("{}: {}\n", key, scalar(value)));
        }
    }

    match record_rows(data) {
        Some(rows) => {
            for row in rows {
                match row.as_object() {
                    Some(fields) => {
                        let line: Vec<String> = fields.iter().map(|(k, v)| format!("{}={}", k, scalar(v))).collect();
                        output.push_str(&format!("  {}\n", line.join("  ")));
                    }
                    None => output.push_str(&format!("  {}\n", scalar(row))),
                }
            }
        }
        None if !data.is_object() => output.push_str(&format!("{}\n", scalar(data))),
        None => {}
    }

    output
}

fn markdown_table(data: &Value) -> String {
    let Some(rows) = record_rows(data).filter(|rows| !rows.is_empty()) else {
        return format!("```json\n{}\n```\n", serde_json::to_string_pretty(data).unwrap_or_default());
    };

    let columns: Vec<&String> = match rows[0].as_object() {
        Some(first) => first.keys().collect(),
        None => return format!("```json\n{}\n```\n", serde_json::to_string_pretty(data).unwrap_or_default()),
    };

    let mut output = format!(
        "| {} |\n|{}|\n",
        columns.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(" | "),
        columns.iter().map(|_| "---").collect::<Vec<_>>().join("|")
    );
    for row in rows {
        let cells: Vec<String> = columns.iter().map(|c| scalar(&row[c.as_str()])).collect();
        output.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_markdown_table_from_leaders() {
        let data = json!({"statistic": "Home Runs", "leaders": [
            {"rank": 1, "name": "Aaron Judge", "value": "58"},
            {"rank": 2, "name": "Shohei Ohtani", "value": "54"}
        ]});
        let table = markdown_table(&data);
        // columns follow the sorted key order of the records
        assert!(table.contains("| Aaron Judge | 1 | 58 |"));
        assert!(table.lines().nth(1).unwrap().starts_with("|---"));
    }

    #[test]
    fn test_json_output_is_tagged() {
        let resolution = Resolution::error(ErrorKind::NoData, "nothing found");
        let out = format_resolution(&resolution, &OutputFormat::Json, false);
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["type"], json!("error"));
        assert_eq!(value["kind"], json!("no_data"));
    }

    #[test]
    fn test_text_output_mentions_regenerate_for_code_failures() {
        colored::control::set_override(false);
        let resolution = Resolution::error(ErrorKind::Execution, "boom");
        let out = format_resolution(&resolution, &OutputFormat::Text, false);
        assert!(out.contains("[execution] boom"));
        assert!(out.contains("dugout regenerate"));
    }
}
