use crate::error::Guidance;
use crate::normalize::{Column, ColumnKind, DisplayTable};
use crate::query::Value;
use axum::{
    Json,
    response::{Html, IntoResponse, Response},
};
use serde_json::{Map, Number};
use std::fmt::Write;

const STYLE_CSS: &str = include_str!("../assets/style.css");

/// Output encoding chosen by the `format` option.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    /// Styled HTML document.
    #[default]
    Table,
    /// Row-oriented JSON.
    Data,
}

impl Format {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "table" | "html" => Some(Format::Table),
            "data" | "json" => Some(Format::Data),
            _ => None,
        }
    }
}

pub fn respond(table: &DisplayTable, format: Format, data_href: Option<&str>) -> Response {
    match format {
        Format::Table => Html(table_document(table, data_href)).into_response(),
        Format::Data => Json(data_rows(table)).into_response(),
    }
}

/// Text shown for a cell; both encodings format numbers through here.
pub fn cell_text(column: &Column, value: &Value) -> String {
    match (column.kind, value) {
        (_, Value::Null) => String::new(),
        (ColumnKind::Metric, v) => format!("{:.2}", v.as_f64().unwrap_or(0.0)),
        (_, v) => v.to_string(),
    }
}

/// One JSON object per row, keyed by column label, in column order.
pub fn data_rows(table: &DisplayTable) -> Vec<Map<String, serde_json::Value>> {
    table
        .rows
        .iter()
        .map(|row| {
            let mut obj = Map::new();
            for (col, value) in table.columns.iter().zip(row) {
                obj.insert(col.label.clone(), json_value(col, value));
            }
            obj
        })
        .collect()
}

fn json_value(column: &Column, value: &Value) -> serde_json::Value {
    match (column.kind, value) {
        (_, Value::Null) => serde_json::Value::Null,
        (ColumnKind::Metric, v) => v
            .as_f64()
            .and_then(Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        (_, Value::Integer(v)) => serde_json::Value::from(*v),
        (_, Value::Float(v)) => Number::from_f64(*v)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        (_, Value::Text(s)) => serde_json::Value::String(s.clone()),
    }
}

pub fn table_document(table: &DisplayTable, data_href: Option<&str>) -> String {
    let mut body = String::new();
    open_document(&mut body, &table.title);
    append(&mut body, &format!("<h2>{}</h2>", escape_html(&table.title)));

    if !table.filters.is_empty() {
        append(&mut body, "<div class=filters>");
        append(&mut body, "<strong>Active filters:</strong>");
        for (label, value) in &table.filters {
            append(
                &mut body,
                &format!(
                    "<div class=filter>{}: {}</div>",
                    escape_html(label),
                    escape_html(value)
                ),
            );
        }
        append(&mut body, "</div>");
    }

    append(&mut body, "<table class=data-table>");
    append(&mut body, "<thead>");
    append(&mut body, "<tr>");
    for label in table.labels() {
        append(&mut body, &format!("<th>{}</th>", escape_html(label)));
    }
    append(&mut body, "</tr>");
    append(&mut body, "</thead>");
    append(&mut body, "<tbody>");
    for row in &table.rows {
        append(&mut body, "<tr>");
        for (col, value) in table.columns.iter().zip(row) {
            let class = if col.kind == ColumnKind::Text { "" } else { " class=num" };
            append(
                &mut body,
                &format!("<td{}>{}</td>", class, escape_html(&cell_text(col, value))),
            );
        }
        append(&mut body, "</tr>");
    }
    append(&mut body, "</tbody>");
    append(&mut body, "</table>");

    if let Some(href) = data_href {
        append(
            &mut body,
            &format!(
                "<div class=links><a href='{}'>View as data</a></div>",
                escape_html(href)
            ),
        );
    }

    close_document(&mut body);
    body
}

pub fn guidance_page(guidance: &Guidance) -> String {
    let mut body = String::new();
    open_document(&mut body, &guidance.heading);
    append(&mut body, &format!("<h2>{}</h2>", escape_html(&guidance.heading)));
    if !guidance.hints.is_empty() {
        append(&mut body, "<p>Try one of these instead:</p>");
        append(&mut body, "<ul>");
        for hint in &guidance.hints {
            append(&mut body, &format!("<li>{}</li>", escape_html(hint)));
        }
        append(&mut body, "</ul>");
    }
    close_document(&mut body);
    body
}

pub struct MenuEntry {
    pub title: &'static str,
    pub description: &'static str,
    pub href: String,
}

pub fn menu_page(title: &str, entries: &[MenuEntry]) -> String {
    let mut body = String::new();
    open_document(&mut body, title);
    append(&mut body, "<div class=menu>");
    append(&mut body, &format!("<h1>{}</h1>", escape_html(title)));
    for entry in entries {
        append(&mut body, "<div class=card>");
        append(&mut body, &format!("<h2>{}</h2>", escape_html(entry.title)));
        append(&mut body, &format!("<p>{}</p>", escape_html(entry.description)));
        append(
            &mut body,
            &format!(
                "<a href='{}' class=btn>View table</a>",
                escape_html(&entry.href)
            ),
        );
        append(&mut body, "</div>");
    }
    append(&mut body, "</div>");
    close_document(&mut body);
    body
}

fn open_document(out: &mut String, title: &str) {
    append(out, "<!DOCTYPE html>");
    append(out, "<html>");
    append(out, "<head>");
    append(out, "<meta charset=\"utf-8\">");
    append(out, &format!("<title>{}</title>", escape_html(title)));
    append(out, &format!("<style>{}</style>", STYLE_CSS));
    append(out, "</head>");
    append(out, "<body>");
}

fn close_document(out: &mut String) {
    append(out, "</body>");
    append(out, "</html>");
}

fn append(out: &mut String, value: &str) {
    let _ = writeln!(out, "{}", value);
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{ResultSet, Sort};
    use once_cell::sync::Lazy;
    use regex::Regex;

    static RE_CELL: Lazy<Regex> = Lazy::new(|| Regex::new(r"<td[^>]*>([^<]*)</td>").expect("re"));
    static RE_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"<th>([^<]*)</th>").expect("re"));

    fn sample() -> DisplayTable {
        let mut set = ResultSet::new(vec![
            Column::text("Game"),
            Column::integer("Year"),
            Column::metric("Sales (M)"),
        ]);
        set.push(vec![Value::Text("Tekken <5>".into()), Value::Integer(2005), Value::Float(2.456)]);
        set.push(vec![Value::Text("Daxter".into()), Value::Integer(2006), Value::Float(4.1)]);
        set.push(vec![Value::Text("Loco".into()), Value::Null, Value::Float(3.0)]);
        DisplayTable::build(
            "Top 3 games for psp",
            vec![("Platform".into(), "psp".into())],
            set,
            &Sort::Descending(2),
            None,
        )
    }

    fn unescape(s: &str) -> String {
        s.replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&amp;", "&")
    }

    fn json_text(value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) if n.is_f64() => format!("{:.2}", n.as_f64().unwrap_or(0.0)),
            other => other.to_string(),
        }
    }

    #[test]
    fn table_and_data_encodings_agree() {
        let table = sample();
        let html = table_document(&table, None);
        let cells: Vec<String> = RE_CELL
            .captures_iter(&html)
            .map(|c| unescape(&c[1]))
            .collect();
        let headers: Vec<String> = RE_HEADER.captures_iter(&html).map(|c| c[1].to_string()).collect();
        let data = data_rows(&table);

        assert_eq!(headers, vec!["Game", "Year", "Sales (M)"]);
        assert_eq!(cells.len(), data.len() * headers.len());
        let mut i = 0;
        for row in &data {
            let keys: Vec<&str> = row.keys().map(String::as_str).collect();
            assert_eq!(keys, headers);
            for value in row.values() {
                assert_eq!(json_text(value), cells[i]);
                i += 1;
            }
        }
    }

    #[test]
    fn metrics_render_with_two_decimals() {
        let table = sample();
        let data = data_rows(&table);
        assert_eq!(data[0]["Sales (M)"], serde_json::json!(4.1));
        assert_eq!(data[1]["Sales (M)"], serde_json::json!(3.0));
        assert_eq!(data[2]["Sales (M)"], serde_json::json!(2.46));
        assert!(table_document(&table, None).contains("<td class=num>4.10</td>"));
    }

    #[test]
    fn document_restates_filters_and_escapes_text() {
        let html = table_document(&sample(), Some("/platforms/top-games?format=data&platform=psp"));
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<h2>Top 3 games for psp</h2>"));
        assert!(html.contains("<div class=filter>Platform: psp</div>"));
        assert!(html.contains("Tekken &lt;5&gt;"));
        assert!(html.contains("format=data&amp;platform=psp"));
        assert!(html.contains("tr:nth-child(even)"));
    }

    #[test]
    fn format_accepts_legacy_spellings() {
        assert_eq!(Format::parse("html"), Some(Format::Table));
        assert_eq!(Format::parse("JSON"), Some(Format::Data));
        assert_eq!(Format::parse("data"), Some(Format::Data));
        assert_eq!(Format::parse("csv"), None);
    }

    #[test]
    fn guidance_page_lists_hints() {
        let page = guidance_page(
            &Guidance::new("No games found for xbx")
                .hint("PlayStation")
                .hint("PC"),
        );
        assert!(page.contains("<h2>No games found for xbx</h2>"));
        assert!(page.contains("<li>PlayStation</li>"));
    }
}
