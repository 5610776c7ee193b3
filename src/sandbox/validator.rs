use once_cell::sync::Lazy;
use regex::Regex;
use rhai::Engine;
use tracing::debug;

use super::engine::base_engine;
use super::libs::ALLOWED_MODULES;
use super::types::{RuleId, ValidationVerdict, Violation};
use crate::constants::MAX_ERROR_MESSAGE_CHARS;
use crate::utils::truncate_message;

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bimport\b").expect("valid regex literal"));
static LITERAL_IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^import\s+"([^"\\]*)""#).expect("valid regex literal"));

/// Denylisted constructs, matched anywhere in the text (strings and comments included)
static DENYLIST: Lazy<Vec<(RuleId, Regex)>> = Lazy::new(|| {
    [
        (RuleId::DynamicEval, r"\beval\b"),
        (RuleId::DynamicEval, r"\bFn\s*\("),
        (RuleId::DynamicEval, r"\bcall\s*\("),
        (RuleId::DynamicEval, r"\bcurry\b"),
        (
            RuleId::FilesystemAccess,
            r"\b(?:open|file|read_file|write_file|remove_file|read_dir|create_dir|fs)\b",
        ),
        (
            RuleId::ProcessSpawn,
            r"\b(?:system|exec|spawn|command|process|shell|kill|exit)\b",
        ),
        (
            RuleId::NetworkAccess,
            r"\b(?:http|https|socket|tcp|udp|connect|download|url)\b",
        ),
        (RuleId::AmbientCapability, r"\benv\b"),
        (RuleId::AmbientCapability, r"\bsleep\b"),
        (RuleId::AmbientCapability, r"\bglobal\s*::"),
        (RuleId::AmbientCapability, r"\b__\w*"),
    ]
    .into_iter()
    .map(|(rule, pattern)| (rule, Regex::new(pattern).expect("valid regex literal")))
    .collect()
});

/// Static inspection of generated scripts.
///
/// Errs toward rejection: a construct is flagged wherever it appears, even
/// inside a string literal.
pub struct Validator {
    engine: Engine,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    pub fn new() -> Self {
        Self { engine: base_engine() }
    }

    /// Report every violation in `code`; `ok` iff there are none
    pub fn validate(&self, code: &str) -> ValidationVerdict {
        if code.trim().is_empty() {
            return ValidationVerdict::from_violations(vec![Violation {
                rule_id: RuleId::EmptyCandidate,
                detail: "candidate contains no code".to_string(),
            }]);
        }

        let mut violations = check_imports(code);

        for (rule, pattern) in DENYLIST.iter() {
            for found in pattern.find_iter(code) {
                violations.push(Violation {
                    rule_id: *rule,
                    detail: format!("`{}` at line {}", found.as_str(), line_of(code, found.start())),
                });
            }
        }

        if let Err(e) = self.engine.compile(code) {
            violations.push(Violation {
                rule_id: RuleId::SyntaxError,
                detail: truncate_message(&e.to_string(), MAX_ERROR_MESSAGE_CHARS),
            });
        }

        let verdict = ValidationVerdict::from_violations(violations);
        debug!("Validation verdict: ok={} ({} violations)", verdict.ok, verdict.violations.len());
        verdict
    }
}

fn check_imports(code: &str) -> Vec<Violation> {
    let mut violations = Vec::new();

    for found in IMPORT_RE.find_iter(code) {
        let line = line_of(code, found.start());
        match LITERAL_IMPORT_RE.captures(&code[found.start()..]) {
            Some(caps) => {
                let target = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                if !ALLOWED_MODULES.contains(&target) {
                    violations.push(Violation {
                        rule_id: RuleId::ImportNotAllowed,
                        detail: format!("import of \"{}\" at line {}", target, line),
                    });
                }
            }
            None => violations.push(Violation {
                rule_id: RuleId::DynamicImport,
                detail: format!("import of a non-literal module path at line {}", line),
            }),
        }
    }

    violations
}

fn line_of(code: &str, offset: usize) -> usize {
    code[..offset].matches('\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const REFERENCE: &str = r#"
import "table" as table;
import "numeric" as numeric;

let raw = stats.leaders("homeRuns", season, 10);
let rows = tables.leaders(raw);
let best = table::top(table::sort_by(rows, "value", true), 3);
result = #{
    success: true,
    data: best,
    answer: `Top value: ${numeric::parse(best[0].value)}`
};
"#;

    fn rules(verdict: &ValidationVerdict) -> Vec<RuleId> {
        verdict.violations.iter().map(|v| v.rule_id).collect()
    }

    #[test]
    fn test_reference_candidate_passes() {
        let verdict = Validator::new().validate(REFERENCE);
        assert!(verdict.ok, "unexpected violations: {}", verdict.describe());
    }

    #[test]
    fn test_dynamic_import_rejected() {
        let code = "let name = \"table\";\nimport name as t;\nresult = #{success: true, data: 1};";
        let verdict = Validator::new().validate(code);
        assert!(!verdict.ok);
        assert_eq!(verdict.violations[0].rule_id, RuleId::DynamicImport);
        assert!(verdict.violations[0].detail.contains("line 2"));
    }

    #[test]
    fn test_unlisted_import_rejected() {
        let verdict = Validator::new().validate("import \"os\" as os;\nresult = #{success: true, data: 1};");
        assert_eq!(rules(&verdict), vec![RuleId::ImportNotAllowed]);
        assert!(verdict.violations[0].detail.contains("\"os\""));
    }

    #[test]
    fn test_denylist_reports_every_construct() {
        let code = r#"
let x = eval("1 + 1");
let f = Fn("helper");
let home = env("HOME");
let data = read_file("/etc/passwd");
let page = download("https://example.com");
"#;
        let verdict = Validator::new().validate(code);
        let found = rules(&verdict);
        for rule in [
            RuleId::DynamicEval,
            RuleId::AmbientCapability,
            RuleId::FilesystemAccess,
            RuleId::NetworkAccess,
        ] {
            assert!(found.contains(&rule), "missing {} in {:?}", rule, found);
        }
    }

    #[test]
    fn test_constructs_inside_strings_are_flagged() {
        let verdict = Validator::new().validate("result = #{success: true, answer: \"please exit now\"};");
        assert_eq!(rules(&verdict), vec![RuleId::ProcessSpawn]);
    }

    #[test]
    fn test_syntax_error() {
        let verdict = Validator::new().validate("let x = ;");
        assert_eq!(rules(&verdict), vec![RuleId::SyntaxError]);
    }

    #[test]
    fn test_empty_candidate() {
        let verdict = Validator::new().validate("   \n ");
        assert_eq!(rules(&verdict), vec![RuleId::EmptyCandidate]);
        assert!(!verdict.ok);
    }

    #[test]
    fn test_double_underscore_identifiers() {
        let verdict = Validator::new().validate("let __proto = 1;\nresult = #{success: true, data: __proto};");
        let ambient = rules(&verdict)
            .into_iter()
            .filter(|r| *r == RuleId::AmbientCapability)
            .count();
        assert_eq!(ambient, 2);
    }
}
