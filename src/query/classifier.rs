use serde::Serialize;
use std::fmt;

use super::types::ParsedQuery;

/// Which resolution path a parsed question takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Direct,
    Ai,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Direct => write!(f, "direct"),
            Route::Ai => write!(f, "ai"),
        }
    }
}

/// True iff the deterministic parse is not enough
pub fn needs_ai(parsed: &ParsedQuery) -> bool {
    parsed.is_unresolved()
}

pub fn route(parsed: &ParsedQuery) -> Route {
    if needs_ai(parsed) {
        Route::Ai
    } else {
        Route::Direct
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse;

    #[test]
    fn test_routes() {
        assert_eq!(route(&parse("Top 10 home runs in 2024", None)), Route::Direct);
        assert_eq!(
            route(&parse("Who had more stolen bases in 2024, Henderson or Witt?", None)),
            Route::Ai
        );
        assert!(needs_ai(&parse("Who was the best?", Some(2024))));
    }
}
