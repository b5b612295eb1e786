//! Model output cleanup

use regex::Regex;
use std::sync::LazyLock;

/// An opening fence plus whatever trails it on the same line (```sql, ```SQL, ```)
static FENCE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```[^\n]*\n").expect("fence pattern compiles"));

/// Reduce raw model output to one fence-free, backtick-free, semicolon-free statement.
///
/// Steps, in order:
/// 1. drop every fence line (the fence and the rest of its line)
/// 2. drop any bare fence left behind (typically the closing one)
/// 3. drop stray backticks; the target dialects never quote identifiers with them
/// 4. keep only the text before the first `;`
///
/// The result is trimmed. Applying `sanitize` to its own output is a no-op.
pub fn sanitize(raw: &str) -> String {
    let unfenced = FENCE_LINE.replace_all(raw, "");
    let unfenced = unfenced.replace("```", "");
    let bare = unfenced.replace('`', "");

    let first = match bare.split_once(';') {
        Some((head, _)) => head,
        None => bare.as_str(),
    };

    let sql = first.trim().to_string();
    tracing::trace!(raw_len = raw.len(), sql_len = sql.len(), "sanitized model output");
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_sql_fence_and_terminator() {
        assert_eq!(sanitize("```sql\nSELECT 1;\n```"), "SELECT 1");
    }

    #[test]
    fn test_fence_tag_is_case_insensitive() {
        assert_eq!(sanitize("```SQL\nSELECT a FROM t\n```"), "SELECT a FROM t");
        assert_eq!(sanitize("```Sql \nSELECT a FROM t\n```\n"), "SELECT a FROM t");
    }

    #[test]
    fn test_plain_statement_passes_through() {
        assert_eq!(
            sanitize("  SELECT SUM(UNITS_SOLD) AS TOTAL_UNITS FROM DAILY_SALES  "),
            "SELECT SUM(UNITS_SOLD) AS TOTAL_UNITS FROM DAILY_SALES"
        );
    }

    #[test]
    fn test_keeps_only_first_statement() {
        assert_eq!(
            sanitize("SELECT 1 FROM DAILY_SALES; DROP TABLE DAILY_SALES;"),
            "SELECT 1 FROM DAILY_SALES"
        );
    }

    #[test]
    fn test_removes_stray_backticks() {
        assert_eq!(sanitize("SELECT `CHANNEL` FROM `DAILY_SALES`"), "SELECT CHANNEL FROM DAILY_SALES");
    }

    #[test]
    fn test_fence_without_language_tag() {
        assert_eq!(sanitize("```\nSELECT 2\n```"), "SELECT 2");
    }

    #[test]
    fn test_prose_before_fence_line_is_dropped_with_it() {
        // The fence consumes the remainder of its own line only
        assert_eq!(sanitize("Here you go ```sql\nSELECT 3\n```"), "Here you go SELECT 3");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "```sql\nSELECT 1;\n```",
            "SELECT `a` FROM t; SELECT 2",
            "   select * from daily_sales   ",
            "```\n```",
            "",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_empty_output() {
        assert_eq!(sanitize("```sql\n```"), "");
        assert_eq!(sanitize(";"), "");
    }
}
