//! SQL Admission Guard
//!
//! Decides whether a candidate statement produced by the text-generation oracle
//! may run against the database. Checks run in a fixed order and the first
//! failure wins:
//! 1. normalize (trim, drop one trailing `;`)
//! 2. single statement
//! 3. keyword denylist (case-insensitive, whole words only)
//! 4. PostgreSQL parse
//! 5. read-only statement kind
//! 6. system namespace denylist (raw text and parsed relations)
//! 7. row cap
//!
//! The keyword scan runs before the parser so that a grammar accepting more than
//! expected can never widen what gets executed.

use crate::domain::error::{AppError, Result};
use crate::domain::query::{
    AdmittedStatement, GuardRejection, GuardVerdict, RejectionReason, AUDIT_TABLE,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlparser::ast::{
    visit_relations, Expr, LimitClause, ObjectNamePart, Query, SetExpr, Statement, Value,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::{Token, Tokenizer};
use std::ops::ControlFlow;
use tracing::debug;
use validator::Validate;

const SQL_RECURSION_LIMIT: usize = 64;
const FRAGMENT_MAX_CHARS: usize = 80;

pub const DEFAULT_FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "GRANT", "REVOKE",
    "EXEC", "EXECUTE", "CALL",
];

pub const DEFAULT_RESERVED_PREFIXES: &[&str] = &["pg_", "information_schema"];

fn default_row_cap() -> u64 {
    100
}

fn default_forbidden_keywords() -> Vec<String> {
    DEFAULT_FORBIDDEN_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

fn default_reserved_prefixes() -> Vec<String> {
    DEFAULT_RESERVED_PREFIXES.iter().map(|p| p.to_string()).collect()
}

fn default_reserved_tables() -> Vec<String> {
    vec![AUDIT_TABLE.to_string()]
}

/// Policy knobs for the admission guard
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GuardConfig {
    /// Limit appended to queries that carry none
    #[serde(default = "default_row_cap")]
    #[validate(range(min = 1, max = 100000))]
    pub row_cap: u64,
    /// Verbs rejected anywhere in the text, checked in this order
    #[serde(default = "default_forbidden_keywords")]
    #[validate(length(min = 1))]
    pub forbidden_keywords: Vec<String>,
    /// Identifier prefixes of catalog objects
    #[serde(default = "default_reserved_prefixes")]
    pub reserved_prefixes: Vec<String>,
    /// Tables generated SQL may never touch
    #[serde(default = "default_reserved_tables")]
    pub reserved_tables: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            row_cap: default_row_cap(),
            forbidden_keywords: default_forbidden_keywords(),
            reserved_prefixes: default_reserved_prefixes(),
            reserved_tables: default_reserved_tables(),
        }
    }
}

/// Admission guard. Pure and cheap to share across tasks.
pub struct SqlGuard {
    row_cap: u64,
    keyword_patterns: Vec<(String, Regex)>,
    namespace_patterns: Vec<Regex>,
    reserved_prefixes: Vec<String>,
    reserved_tables: Vec<String>,
}

impl SqlGuard {
    /// Build a guard, compiling every matcher up front
    pub fn new(config: &GuardConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| AppError::ConfigError(format!("Invalid guard config: {}", e)))?;

        let keyword_patterns = config
            .forbidden_keywords
            .iter()
            .map(|keyword| {
                let verb = keyword.trim().to_uppercase();
                compile(&format!(r"(?i)\b{}\b", regex::escape(&verb))).map(|re| (verb, re))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut namespace_patterns = Vec::new();
        for prefix in &config.reserved_prefixes {
            namespace_patterns.push(compile(&format!(r"(?i)\b{}", regex::escape(prefix)))?);
        }
        for table in &config.reserved_tables {
            namespace_patterns.push(compile(&format!(r"(?i)\b{}\b", regex::escape(table)))?);
        }

        Ok(Self {
            row_cap: config.row_cap,
            keyword_patterns,
            namespace_patterns,
            reserved_prefixes: lowercase_all(&config.reserved_prefixes),
            reserved_tables: lowercase_all(&config.reserved_tables),
        })
    }

    pub fn row_cap(&self) -> u64 {
        self.row_cap
    }

    /// Decide whether `candidate` may be executed.
    pub fn admit(&self, candidate: &str) -> GuardVerdict {
        match self.check(candidate) {
            Ok(statement) => {
                debug!(
                    row_cap_applied = statement.row_cap_applied(),
                    "candidate admitted"
                );
                GuardVerdict::Admitted(statement)
            }
            Err(rejection) => {
                debug!(reason = %rejection.reason, fragment = %rejection.fragment, "candidate rejected");
                GuardVerdict::Rejected(rejection)
            }
        }
    }

    fn check(&self, candidate: &str) -> std::result::Result<AdmittedStatement, GuardRejection> {
        let sql = normalize(candidate);

        if let Some(pos) = sql.find(';') {
            return Err(rejection(RejectionReason::MultipleStatements, &sql[pos..]));
        }

        self.check_keywords(sql)?;

        let statement = parse_single(sql)?;
        let query = match &statement {
            Statement::Query(query) if is_read_only_query(query) => query,
            _ => {
                let head = sql.split_whitespace().next().unwrap_or_default();
                return Err(rejection(RejectionReason::NotReadOnly, head));
            }
        };

        self.check_namespaces(sql, &statement)?;
        self.apply_row_cap(sql, query)
    }

    fn check_keywords(&self, sql: &str) -> std::result::Result<(), GuardRejection> {
        for (verb, pattern) in &self.keyword_patterns {
            if let Some(found) = pattern.find(sql) {
                return Err(rejection(
                    RejectionReason::ForbiddenKeyword(verb.clone()),
                    found.as_str(),
                ));
            }
        }
        Ok(())
    }

    fn check_namespaces(
        &self,
        sql: &str,
        statement: &Statement,
    ) -> std::result::Result<(), GuardRejection> {
        if let Some(found) = self.namespace_patterns.iter().find_map(|p| p.find(sql)) {
            return Err(rejection(RejectionReason::SystemObjectAccess, found.as_str()));
        }

        // Quoted identifiers keep their case in the AST, so fold before comparing.
        let flow = visit_relations(statement, |relation| {
            match relation.0.iter().find_map(|part| self.reserved_name(part)) {
                Some(name) => ControlFlow::Break(name),
                None => ControlFlow::Continue(()),
            }
        });
        if let ControlFlow::Break(name) = flow {
            return Err(rejection(RejectionReason::SystemObjectAccess, &name));
        }
        Ok(())
    }

    fn reserved_name(&self, part: &ObjectNamePart) -> Option<String> {
        let name = match part {
            ObjectNamePart::Identifier(ident) => ident.value.to_lowercase(),
            _ => return None,
        };
        let reserved = self.reserved_tables.iter().any(|t| *t == name)
            || self.reserved_prefixes.iter().any(|p| name.starts_with(p.as_str()));
        reserved.then_some(name)
    }

    fn apply_row_cap(
        &self,
        sql: &str,
        query: &Query,
    ) -> std::result::Result<AdmittedStatement, GuardRejection> {
        match row_limit(query) {
            RowLimit::Bounded => return Ok(AdmittedStatement::new(sql.to_string(), false)),
            RowLimit::Unbounded(fragment) => {
                return Err(rejection(RejectionReason::UnboundedLimit, &fragment))
            }
            RowLimit::Missing => {}
        }

        // The parser reads `LIMIT ALL` as no limit at all.
        if has_top_level_limit_keyword(sql) {
            return Err(rejection(RejectionReason::UnboundedLimit, "LIMIT ALL"));
        }

        // A trailing line comment would swallow the clause.
        let separator = if sql.contains("--") { '\n' } else { ' ' };
        Ok(AdmittedStatement::new(
            format!("{}{}LIMIT {}", sql, separator, self.row_cap),
            true,
        ))
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| AppError::ConfigError(format!("Invalid guard pattern '{}': {}", pattern, e)))
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

fn rejection(reason: RejectionReason, fragment: &str) -> GuardRejection {
    let fragment: String = fragment.chars().take(FRAGMENT_MAX_CHARS).collect();
    GuardRejection::new(reason, &fragment)
}

fn normalize(candidate: &str) -> &str {
    let trimmed = candidate.trim();
    trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end()
}

fn parse_single(sql: &str) -> std::result::Result<Statement, GuardRejection> {
    let mut statements = parse_postgres(sql)
        .map_err(|e| rejection(RejectionReason::InvalidSyntax(e.to_string()), sql))?;

    match statements.len() {
        0 => Err(rejection(
            RejectionReason::InvalidSyntax("empty statement".to_string()),
            sql,
        )),
        1 => Ok(statements.remove(0)),
        _ => Err(rejection(RejectionReason::MultipleStatements, sql)),
    }
}

fn parse_postgres(sql: &str) -> std::result::Result<Vec<Statement>, ParserError> {
    Parser::new(&PostgreSqlDialect {})
        .with_recursion_limit(SQL_RECURSION_LIMIT)
        .try_with_sql(sql)?
        .parse_statements()
}

fn is_read_only_query(query: &Query) -> bool {
    let ctes_read_only = query
        .with
        .as_ref()
        .map_or(true, |with| with.cte_tables.iter().all(|cte| is_read_only_query(&cte.query)));

    ctes_read_only && query.locks.is_empty() && is_read_only_body(&query.body)
}

fn is_read_only_body(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(select) => select.into.is_none(),
        SetExpr::Query(inner) => is_read_only_query(inner),
        SetExpr::SetOperation { left, right, .. } => {
            is_read_only_body(left) && is_read_only_body(right)
        }
        _ => false,
    }
}

enum RowLimit {
    Bounded,
    /// A limit clause that Postgres would not enforce, e.g. `LIMIT NULL`.
    Unbounded(String),
    Missing,
}

fn row_limit(query: &Query) -> RowLimit {
    let limit = match &query.limit_clause {
        Some(LimitClause::LimitOffset { limit, .. }) => limit.as_ref(),
        Some(LimitClause::OffsetCommaLimit { limit, .. }) => Some(limit),
        None => None,
    };
    if let Some(expr) = limit {
        return bound_of(expr);
    }

    match &query.fetch {
        Some(fetch) if fetch.percent => RowLimit::Unbounded(fetch.to_string()),
        Some(fetch) => match &fetch.quantity {
            Some(expr) => bound_of(expr),
            // `FETCH FIRST ROW ONLY` is one row.
            None => RowLimit::Bounded,
        },
        None => match query.body.as_ref() {
            SetExpr::Query(inner) => row_limit(inner),
            _ => RowLimit::Missing,
        },
    }
}

/// Only a numeric literal counts as a bound. NULL and computed values do not.
fn bound_of(expr: &Expr) -> RowLimit {
    if is_count_literal(expr) {
        RowLimit::Bounded
    } else {
        RowLimit::Unbounded(expr.to_string())
    }
}

fn is_count_literal(expr: &Expr) -> bool {
    match expr {
        Expr::Value(value) => matches!(value.value, Value::Number(..)),
        Expr::Nested(inner) => is_count_literal(inner),
        Expr::Cast { expr, .. } => is_count_literal(expr),
        _ => false,
    }
}

/// True when an unquoted `LIMIT` keyword appears outside any parentheses.
fn has_top_level_limit_keyword(sql: &str) -> bool {
    let dialect = PostgreSqlDialect {};
    let tokens = Tokenizer::new(&dialect, sql).tokenize().unwrap_or_default();
    let mut depth = 0usize;
    for token in tokens {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Word(word)
                if depth == 0 && word.quote_style.is_none() && word.keyword == Keyword::LIMIT =>
            {
                return true;
            }
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn guard() -> SqlGuard {
        SqlGuard::new(&GuardConfig::default()).unwrap()
    }

    fn reason(verdict: &GuardVerdict) -> RejectionReason {
        verdict
            .rejection()
            .map(|r| r.reason.clone())
            .expect("expected a rejection")
    }

    fn admitted_sql(verdict: &GuardVerdict) -> String {
        verdict
            .admitted()
            .map(|s| s.sql().to_string())
            .expect("expected admission")
    }

    fn limit_count(sql: &str) -> usize {
        Regex::new(r"(?i)\bLIMIT\b").unwrap().find_iter(sql).count()
    }

    #[test]
    fn test_appends_row_cap() {
        let verdict = guard().admit("SELECT name, email FROM customers WHERE state = 'CA'");
        let statement = verdict.admitted().unwrap();
        assert_eq!(
            statement.sql(),
            "SELECT name, email FROM customers WHERE state = 'CA' LIMIT 100"
        );
        assert!(statement.row_cap_applied());
    }

    #[test]
    fn test_strips_one_trailing_semicolon() {
        let verdict = guard().admit("  SELECT * FROM customers;  ");
        assert_eq!(admitted_sql(&verdict), "SELECT * FROM customers LIMIT 100");
    }

    #[test]
    fn test_keeps_explicit_limit() {
        let g = guard();
        for sql in [
            "SELECT * FROM customers LIMIT 10",
            "SELECT * FROM customers LIMIT 5000",
            "SELECT * FROM customers ORDER BY id LIMIT 10 OFFSET 20",
            "SELECT * FROM customers FETCH FIRST 5 ROWS ONLY",
            "(SELECT * FROM customers LIMIT 5)",
        ] {
            let verdict = g.admit(sql);
            let statement = verdict.admitted().unwrap();
            assert_eq!(statement.sql(), sql);
            assert!(!statement.row_cap_applied());
        }
    }

    #[test]
    fn test_inner_limit_does_not_bound_outer_query() {
        let verdict = guard().admit("SELECT * FROM (SELECT * FROM orders LIMIT 5) o");
        assert_eq!(
            admitted_sql(&verdict),
            "SELECT * FROM (SELECT * FROM orders LIMIT 5) o LIMIT 100"
        );
    }

    #[test]
    fn test_limit_all_is_rejected() {
        let verdict = guard().admit("SELECT * FROM customers LIMIT ALL");
        assert_eq!(reason(&verdict), RejectionReason::UnboundedLimit);
    }

    #[test]
    fn test_null_or_computed_limit_is_rejected() {
        let g = guard();
        for sql in [
            "SELECT * FROM customers LIMIT NULL",
            "SELECT * FROM customers LIMIT CAST(NULL AS int)",
            "SELECT * FROM customers LIMIT (NULL)",
            "SELECT * FROM customers FETCH FIRST NULL ROWS ONLY",
            "SELECT * FROM customers LIMIT NULLIF(1, 1)",
            "SELECT * FROM customers LIMIT (SELECT count(*) FROM orders)",
            "(SELECT * FROM customers LIMIT NULL)",
        ] {
            let verdict = g.admit(sql);
            assert_eq!(reason(&verdict), RejectionReason::UnboundedLimit, "{}", sql);
        }
    }

    #[test]
    fn test_cast_literal_limit_is_kept() {
        let sql = "SELECT * FROM customers LIMIT CAST(10 AS int)";
        let verdict = guard().admit(sql);
        let statement = verdict.admitted().unwrap();
        assert_eq!(statement.sql(), sql);
        assert!(!statement.row_cap_applied());
    }

    #[test]
    fn test_offset_only_gets_row_cap() {
        let g = guard();
        let verdict = g.admit("SELECT * FROM customers ORDER BY id OFFSET 5");
        let sql = admitted_sql(&verdict);
        assert_eq!(sql, "SELECT * FROM customers ORDER BY id OFFSET 5 LIMIT 100");
        assert!(verdict.admitted().unwrap().row_cap_applied());
        assert_eq!(admitted_sql(&g.admit(&sql)), sql);
    }

    #[test]
    fn test_row_cap_after_line_comment() {
        let g = guard();
        let verdict = g.admit("SELECT * FROM customers -- everyone");
        let sql = admitted_sql(&verdict);
        assert_eq!(sql, "SELECT * FROM customers -- everyone\nLIMIT 100");
        assert_eq!(admitted_sql(&g.admit(&sql)), sql);
    }

    #[test]
    fn test_rejects_forbidden_keywords() {
        let g = guard();
        let verdict = g.admit("DELETE FROM customers");
        assert_eq!(
            reason(&verdict),
            RejectionReason::ForbiddenKeyword("DELETE".to_string())
        );
        assert_eq!(
            verdict.rejection().unwrap().to_string(),
            "forbidden keyword: DELETE"
        );

        let verdict = g.admit("select 1 from t where x in (select 1) or true; ");
        assert!(verdict.is_admitted());

        let verdict = g.admit("drop table customers");
        assert_eq!(
            reason(&verdict),
            RejectionReason::ForbiddenKeyword("DROP".to_string())
        );
        assert_eq!(verdict.rejection().unwrap().fragment, "drop");
    }

    #[test]
    fn test_first_keyword_in_denylist_order_wins() {
        let verdict = guard()
            .admit("WITH gone AS (DELETE FROM a RETURNING *) INSERT INTO b SELECT * FROM gone");
        assert_eq!(
            reason(&verdict),
            RejectionReason::ForbiddenKeyword("INSERT".to_string())
        );
    }

    #[test]
    fn test_identifiers_containing_keywords_pass() {
        let g = guard();
        for sql in [
            "SELECT created_at, updated_at FROM orders",
            "SELECT update_count, deleted_flag FROM audit_summary",
            "SELECT \"created_at\" FROM orders",
            "SELECT dropdown_value FROM settings",
            "SELECT executed_by FROM jobs",
            "SELECT callback_url FROM hooks",
        ] {
            assert!(g.admit(sql).is_admitted(), "{} should be admitted", sql);
        }
    }

    #[test]
    fn test_rejects_multiple_statements() {
        let g = guard();
        let verdict = g.admit("SELECT * FROM customers; DROP TABLE customers");
        assert_eq!(reason(&verdict), RejectionReason::MultipleStatements);
        assert_eq!(verdict.rejection().unwrap().fragment, "; DROP TABLE customers");

        let verdict = g.admit("SELECT 1;;");
        assert_eq!(reason(&verdict), RejectionReason::MultipleStatements);
    }

    #[test]
    fn test_rejects_invalid_syntax() {
        let g = guard();
        let verdict = g.admit("SELEC * FROM customers");
        assert!(matches!(reason(&verdict), RejectionReason::InvalidSyntax(_)));
        assert!(verdict
            .rejection()
            .unwrap()
            .to_string()
            .starts_with("invalid syntax: "));

        for empty in ["", "   ", ";", "  ;  "] {
            assert_eq!(
                reason(&g.admit(empty)),
                RejectionReason::InvalidSyntax("empty statement".to_string())
            );
        }
    }

    #[test]
    fn test_rejects_non_read_statements() {
        let g = guard();
        for sql in [
            "EXPLAIN SELECT * FROM customers",
            "SHOW search_path",
            "SET ROLE admin",
            "COPY customers TO STDOUT",
            "VALUES (1), (2)",
            "SELECT * INTO backup FROM customers",
            "SELECT * FROM customers FOR SHARE",
        ] {
            assert_eq!(
                reason(&g.admit(sql)),
                RejectionReason::NotReadOnly,
                "{} should be refused",
                sql
            );
        }
        assert_eq!(
            g.admit("SELECT * FROM customers FOR UPDATE")
                .rejection()
                .unwrap()
                .to_string(),
            "forbidden keyword: UPDATE"
        );
    }

    #[test]
    fn test_set_operations_are_read_only() {
        let verdict = guard().admit("SELECT id FROM customers UNION SELECT id FROM leads");
        assert_eq!(
            admitted_sql(&verdict),
            "SELECT id FROM customers UNION SELECT id FROM leads LIMIT 100"
        );
    }

    #[test]
    fn test_rejects_system_objects() {
        let g = guard();
        for sql in [
            "SELECT * FROM pg_catalog.pg_tables",
            "SELECT * FROM information_schema.tables",
            "SELECT * FROM query_logs",
            "SELECT * FROM \"Query_Logs\"",
            "SELECT usename FROM \"PG_USER\"",
            "SELECT pg_sleep(10)",
        ] {
            assert_eq!(
                reason(&g.admit(sql)),
                RejectionReason::SystemObjectAccess,
                "{} should be refused",
                sql
            );
        }
        assert!(g.admit("SELECT shipping_pg_code FROM orders").is_admitted());
        assert!(g.admit("SELECT * FROM query_logs_archive").is_admitted());
    }

    #[test]
    fn test_configured_denylist_and_cap() {
        let config = GuardConfig {
            row_cap: 25,
            forbidden_keywords: vec!["merge".to_string()],
            reserved_prefixes: vec!["secret_".to_string()],
            reserved_tables: vec![],
        };
        let g = SqlGuard::new(&config).unwrap();
        assert_eq!(g.row_cap(), 25);
        assert_eq!(
            reason(&g.admit("MERGE INTO a USING b ON true WHEN MATCHED THEN DO NOTHING")),
            RejectionReason::ForbiddenKeyword("MERGE".to_string())
        );
        assert_eq!(
            reason(&g.admit("SELECT * FROM secret_keys")),
            RejectionReason::SystemObjectAccess
        );
        assert_eq!(
            admitted_sql(&g.admit("SELECT * FROM query_logs")),
            "SELECT * FROM query_logs LIMIT 25"
        );
    }

    #[test]
    fn test_invalid_config_is_refused() {
        let config = GuardConfig {
            row_cap: 0,
            ..GuardConfig::default()
        };
        assert!(matches!(
            SqlGuard::new(&config),
            Err(AppError::ConfigError(_))
        ));
    }

    fn random_case(word: &str, mask: u16) -> String {
        word.chars()
            .enumerate()
            .map(|(i, c)| {
                if mask & (1 << (i % 16)) != 0 {
                    c.to_ascii_lowercase()
                } else {
                    c.to_ascii_uppercase()
                }
            })
            .collect()
    }

    proptest! {
        #[test]
        fn prop_standalone_verb_is_named(
            verb in prop::sample::select(DEFAULT_FORBIDDEN_KEYWORDS.to_vec()),
            mask in any::<u16>(),
            before in "[0-9]{0,4}",
            after in "[0-9]{0,4}",
        ) {
            let sql = format!("SELECT {} {} {} FROM t", before, random_case(verb, mask), after);
            let verdict = guard().admit(&sql);
            prop_assert_eq!(
                verdict.rejection().map(|r| r.reason.clone()),
                Some(RejectionReason::ForbiddenKeyword(verb.to_string()))
            );
        }

        #[test]
        fn prop_inner_separator_is_rejected(
            column in "c_[a-z]{1,6}",
            rest in "[a-z0-9]{1,10}",
        ) {
            let sql = format!("SELECT {} FROM t_items;{}", column, rest);
            let verdict = guard().admit(&sql);
            prop_assert_eq!(
                verdict.rejection().map(|r| r.reason.clone()),
                Some(RejectionReason::MultipleStatements)
            );
        }

        #[test]
        fn prop_row_cap_appears_exactly_once(
            table in "t_[a-z]{1,8}",
            column in "c_[a-z]{1,8}",
            threshold in 0i64..10_000,
            cap in 1u64..1_000,
            explicit in prop::option::of(1u64..5_000),
        ) {
            let config = GuardConfig { row_cap: cap, ..GuardConfig::default() };
            let g = SqlGuard::new(&config).unwrap();
            let base = format!("SELECT {c} FROM {t} WHERE {c} > {n}", c = column, t = table, n = threshold);
            let sql = match explicit {
                Some(limit) => format!("{} LIMIT {}", base, limit),
                None => base.clone(),
            };

            let admitted = admitted_sql(&g.admit(&sql));
            prop_assert_eq!(limit_count(&admitted), 1);
            match explicit {
                Some(_) => prop_assert_eq!(&admitted, &sql),
                None => prop_assert_eq!(&admitted, &format!("{} LIMIT {}", base, cap)),
            }

            // Admitting admitted text changes nothing.
            let again = admitted_sql(&g.admit(&admitted));
            prop_assert_eq!(again, admitted);
        }
    }
}
