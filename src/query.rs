use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("re"));

/// A bound parameter or a result cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Null | Value::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(s) => f.write_str(s),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Statement text plus its positional parameters, ready for execution.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub sql: String,
    pub params: Vec<Value>,
}

/// A SQL fragment and the values for each of its `?` placeholders.
#[derive(Clone, Debug)]
struct Clause {
    fragment: &'static str,
    values: Vec<Value>,
}

impl Clause {
    fn new(fragment: &'static str, values: Vec<Value>) -> Self {
        assert_eq!(
            placeholders(fragment),
            values.len(),
            "fragment {:?} takes {} values",
            fragment,
            placeholders(fragment)
        );
        Self { fragment, values }
    }
}

/// Assembles a parameterized statement from a fixed template and optional
/// filters. Every piece of query text is `'static`, so caller-supplied text
/// can only ever travel as a bound value.
#[derive(Clone, Debug)]
pub struct QueryBuilder {
    base: &'static str,
    base_values: Vec<Value>,
    filters: Vec<Clause>,
    group_by: Option<&'static str>,
    having: Vec<Clause>,
    order_by: Option<&'static str>,
    limit: Option<i64>,
}

impl QueryBuilder {
    pub fn new(base: &'static str) -> Self {
        Self {
            base,
            base_values: Vec::new(),
            filters: Vec::new(),
            group_by: None,
            having: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Binds the next placeholder of the base template.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.base_values.push(value.into());
        self
    }

    /// Binds the next placeholder of the base template as a `%term%` pattern.
    pub fn bind_like(self, term: &str) -> Self {
        self.bind(like_pattern(term))
    }

    /// Unconditional WHERE condition.
    pub fn filter(mut self, fragment: &'static str, values: Vec<Value>) -> Self {
        self.filters.push(Clause::new(fragment, values));
        self
    }

    /// WHERE condition applied only when `value` is present.
    pub fn filter_if<T: Into<Value>>(self, fragment: &'static str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.filter(fragment, vec![v.into()]),
            None => self,
        }
    }

    /// Partial-match WHERE condition; the term is bound as `%term%`.
    pub fn contains(self, fragment: &'static str, term: Option<&str>) -> Self {
        match term.and_then(wildcard) {
            Some(pattern) => self.filter(fragment, vec![Value::Text(pattern)]),
            None => self,
        }
    }

    pub fn group_by(mut self, columns: &'static str) -> Self {
        self.group_by = Some(columns);
        self
    }

    /// Unconditional HAVING condition.
    pub fn having(mut self, fragment: &'static str, values: Vec<Value>) -> Self {
        self.having.push(Clause::new(fragment, values));
        self
    }

    /// HAVING condition applied only when `value` is present.
    pub fn having_if<T: Into<Value>>(mut self, fragment: &'static str, value: Option<T>) -> Self {
        if let Some(v) = value {
            self.having.push(Clause::new(fragment, vec![v.into()]));
        }
        self
    }

    pub fn order_by(mut self, order: &'static str) -> Self {
        self.order_by = Some(order);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit.into());
        self
    }

    pub fn build(self) -> Query {
        let mut sql = self.base.trim_end().to_string();
        let mut params = self.base_values;

        append_conditions(&mut sql, "WHERE", &self.filters, &mut params);
        if let Some(group_by) = self.group_by {
            sql.push_str("\nGROUP BY ");
            sql.push_str(group_by);
        }
        append_conditions(&mut sql, "HAVING", &self.having, &mut params);
        if let Some(order_by) = self.order_by {
            sql.push_str("\nORDER BY ");
            sql.push_str(order_by);
        }
        if let Some(limit) = self.limit {
            sql.push_str("\nLIMIT ?");
            params.push(Value::Integer(limit));
        }

        assert_eq!(
            placeholders(&sql),
            params.len(),
            "placeholder count does not match bound values in {:?}",
            sql
        );
        Query { sql, params }
    }
}

fn append_conditions(sql: &mut String, keyword: &str, clauses: &[Clause], params: &mut Vec<Value>) {
    if clauses.is_empty() {
        return;
    }
    let parts: Vec<&str> = clauses.iter().map(|c| c.fragment).collect();
    sql.push('\n');
    sql.push_str(keyword);
    sql.push(' ');
    sql.push_str(&parts.join(" AND "));
    for clause in clauses {
        params.extend(clause.values.iter().cloned());
    }
}

fn placeholders(sql: &str) -> usize {
    sql.matches('?').count()
}

/// Trims the term, collapses inner whitespace, escapes LIKE metacharacters
/// with `\` and wraps it in `%` markers. Blank terms are not applicable.
/// Fragments matching against it must declare `ESCAPE '\'`.
pub fn wildcard(term: &str) -> Option<String> {
    normalize_term(term).map(|t| format!("%{}%", escape_like(&t)))
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn like_pattern(term: &str) -> String {
    wildcard(term).unwrap_or_else(|| "%".to_string())
}

pub fn normalize_term(term: &str) -> Option<String> {
    let term = RE_WHITESPACE.replace_all(term.trim(), " ");
    if term.is_empty() {
        None
    } else {
        Some(term.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "SELECT p.publisher_name FROM publisher p";

    #[test]
    fn inapplicable_filters_are_omitted() {
        let query = QueryBuilder::new(BASE)
            .contains("p.publisher_name ILIKE ?", None)
            .contains("p.publisher_name ILIKE ?", Some("   "))
            .filter_if::<i64>("p.id = ?", None)
            .having_if::<f64>("SUM(1) >= ?", None)
            .build();
        assert_eq!(query.sql, BASE);
        assert!(query.params.is_empty());
    }

    #[test]
    fn param_count_matches_applicable_filters() {
        let query = QueryBuilder::new(BASE)
            .contains("p.publisher_name ILIKE ?", Some("nin"))
            .filter_if::<i64>("p.id = ?", None)
            .filter_if("p.id > ?", Some(3i64))
            .build();
        assert_eq!(query.params.len(), 2);
        assert!(query.sql.ends_with("WHERE p.publisher_name ILIKE ? AND p.id > ?"));
        assert_eq!(query.params[1], Value::Integer(3));
    }

    #[test]
    fn wildcard_terms_only_travel_as_values() {
        let term = "Mario'; DROP TABLE game; --";
        let query = QueryBuilder::new(BASE)
            .contains("p.publisher_name ILIKE ?", Some(term))
            .build();
        assert!(!query.sql.contains(term));
        assert!(!query.sql.contains('%'));
        assert_eq!(query.params, vec![Value::Text(format!("%{}%", term))]);
    }

    #[test]
    fn wildcard_collapses_whitespace() {
        assert_eq!(wildcard("  Super   Mario "), Some("%Super Mario%".to_string()));
        assert_eq!(wildcard("\t"), None);
    }

    #[test]
    fn wildcard_escapes_like_metacharacters() {
        assert_eq!(wildcard("100%"), Some(r"%100\%%".to_string()));
        assert_eq!(wildcard("_"), Some(r"%\_%".to_string()));
        assert_eq!(wildcard(r"a\b"), Some(r"%a\\b%".to_string()));
        assert_eq!(like_pattern("   "), "%");
    }

    #[test]
    fn clauses_are_emitted_in_textual_order() {
        let query = QueryBuilder::new("SELECT CASE WHEN name ILIKE ? THEN 1 ELSE 0 END AS hit FROM game")
            .bind("%a%")
            .filter("release_year BETWEEN ? AND ?", vec![1990i64.into(), 1999i64.into()])
            .group_by("name")
            .having_if("SUM(hit) >= ?", Some(1.5))
            .order_by("hit DESC")
            .limit(5)
            .build();
        assert_eq!(
            query.sql,
            "SELECT CASE WHEN name ILIKE ? THEN 1 ELSE 0 END AS hit FROM game\n\
             WHERE release_year BETWEEN ? AND ?\n\
             GROUP BY name\n\
             HAVING SUM(hit) >= ?\n\
             ORDER BY hit DESC\n\
             LIMIT ?"
        );
        assert_eq!(
            query.params,
            vec![
                Value::Text("%a%".into()),
                Value::Integer(1990),
                Value::Integer(1999),
                Value::Float(1.5),
                Value::Integer(5),
            ]
        );
    }

    #[test]
    #[should_panic(expected = "takes 2 values")]
    fn arity_mismatch_fails_fast() {
        let _ = QueryBuilder::new(BASE).filter("p.id BETWEEN ? AND ?", vec![1i64.into()]);
    }

    #[test]
    #[should_panic(expected = "placeholder count")]
    fn unbound_template_placeholder_fails_fast() {
        let _ = QueryBuilder::new("SELECT * FROM region WHERE region_name = ?").build();
    }
}
