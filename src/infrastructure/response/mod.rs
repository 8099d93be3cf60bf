use once_cell::sync::Lazy;
use regex::Regex;

static THINK_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<think>[\s\S]*?</think>|<think\s*/>").unwrap());

static REASONING_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<reasoning>[\s\S]*?</reasoning>").unwrap());

static CODE_FENCE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[A-Za-z]*").unwrap());

static SQL_LABEL_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^sql:\s*").unwrap());

/// Removes reasoning blocks some models emit before the answer
pub fn clean_llm_response(response: &str) -> String {
    let mut cleaned = THINK_TAG_PATTERN.replace_all(response, "").to_string();
    cleaned = REASONING_TAG_PATTERN.replace_all(&cleaned, "").to_string();
    cleaned.trim().to_string()
}

/// Reduces a model answer to bare SQL text.
///
/// Markdown fences, a leading `SQL:` label and trailing semicolons are
/// dropped. Anything else is left for the admission guard to judge.
pub fn clean_sql_response(response: &str) -> String {
    let cleaned = clean_llm_response(response);
    let cleaned = CODE_FENCE_PATTERN.replace_all(&cleaned, "");
    let cleaned = SQL_LABEL_PATTERN.replace(cleaned.trim(), "");

    cleaned
        .trim()
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_think_tags() {
        let input = "<think>Some reasoning here</think>The actual response";
        assert_eq!(clean_llm_response(input), "The actual response");
    }

    #[test]
    fn test_clean_self_closing_think() {
        assert_eq!(clean_llm_response("<think />SELECT 1"), "SELECT 1");
    }

    #[test]
    fn test_clean_sql_fences() {
        let input = "```sql\nSELECT name FROM customers WHERE state = 'CA';\n```";
        assert_eq!(
            clean_sql_response(input),
            "SELECT name FROM customers WHERE state = 'CA'"
        );
    }

    #[test]
    fn test_clean_sql_label_and_semicolons() {
        assert_eq!(clean_sql_response("SQL: SELECT 1;;  "), "SELECT 1");
    }

    #[test]
    fn test_clean_sql_keeps_inner_separator() {
        assert_eq!(
            clean_sql_response("SELECT 1; DROP TABLE customers;"),
            "SELECT 1; DROP TABLE customers"
        );
    }

    #[test]
    fn test_clean_sql_reasoning_only_is_empty() {
        assert_eq!(
            clean_sql_response("<reasoning>no idea</reasoning>\n```\n```"),
            ""
        );
    }
}
