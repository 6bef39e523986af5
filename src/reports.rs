//! One definition per report: SQL template, filters, column layout, row
//! order and what to say when nothing matches.

use crate::error::{Guidance, ReportError};
use crate::normalize::{Column, DisplayTable, Sort};
use crate::query::{Query, QueryBuilder, Value, like_pattern};
use crate::render::Format;
use crate::store::Store;

const SALES: &str = "Sales (M)";
const TOTAL_SALES: &str = "Total Sales (M)";

const TOP_GAMES_BY_PLATFORM: &str = r#"
SELECT
    g.game_name AS "Game",
    gp.release_year AS "Year",
    CAST(SUM(rs.num_sales) AS DOUBLE) AS "Sales (M)"
FROM game g
JOIN game_publisher gpub ON g.id = gpub.game_id
JOIN game_platform gp ON gpub.id = gp.game_publisher_id
JOIN platform p ON gp.platform_id = p.id
JOIN region_sales rs ON gp.id = rs.game_platform_id
"#;

const TOP_GAMES_BY_YEAR: &str = r#"
SELECT
    g.game_name AS "Game",
    p.platform_name AS "Platform",
    CAST(SUM(rs.num_sales) AS DOUBLE) AS "Sales (M)"
FROM game g
JOIN game_publisher gp ON g.id = gp.game_id
JOIN game_platform gpl ON gp.id = gpl.game_publisher_id
JOIN platform p ON gpl.platform_id = p.id
JOIN region_sales rs ON gpl.id = rs.game_platform_id
"#;

const TOP_PLATFORMS_BY_DECADE: &str = r#"
SELECT
    p.platform_name AS "Platform",
    CAST(SUM(rs.num_sales) AS DOUBLE) AS "Total Sales (M)"
FROM platform p
JOIN game_platform gp ON p.id = gp.platform_id
JOIN region_sales rs ON gp.id = rs.game_platform_id
"#;

const PUBLISHER_REGION_SALES: &str = r#"
SELECT
    p.publisher_name AS "Publisher",
    CAST(SUM(rs.num_sales) AS DOUBLE) AS "Total Sales (M)"
FROM publisher p
JOIN game_publisher gp ON p.id = gp.publisher_id
JOIN game_platform gpl ON gp.id = gpl.game_publisher_id
JOIN region_sales rs ON gpl.id = rs.game_platform_id
JOIN region r ON rs.region_id = r.id
"#;

const GAME_REGION_SALES: &str = r#"
SELECT
    r.region_name AS "Region",
    CAST(SUM(rs.num_sales) AS DOUBLE) AS "Total Sales (M)"
FROM game g
JOIN game_publisher gp ON g.id = gp.game_id
JOIN game_platform gpl ON gp.id = gpl.game_publisher_id
JOIN region_sales rs ON gpl.id = rs.game_platform_id
JOIN region r ON rs.region_id = r.id
"#;

const GAME_REGION_COMPARISON: &str = r#"
SELECT
    r.region_name AS "Region",
    CAST(SUM(CASE WHEN g.game_name ILIKE ? ESCAPE '\' THEN rs.num_sales ELSE 0 END) AS DOUBLE) AS first_sales,
    CAST(SUM(CASE WHEN g.game_name ILIKE ? ESCAPE '\' THEN rs.num_sales ELSE 0 END) AS DOUBLE) AS second_sales
FROM game g
JOIN game_publisher gp ON g.id = gp.game_id
JOIN game_platform gpl ON gp.id = gpl.game_publisher_id
JOIN region_sales rs ON gpl.id = rs.game_platform_id
JOIN region r ON rs.region_id = r.id
"#;

const PUBLISHER_LISTING: &str = r#"
SELECT
    p.publisher_name AS "Publisher",
    COUNT(DISTINCT g.id) AS "Games Published",
    CAST(SUM(rs.num_sales) AS DOUBLE) AS "Total Sales (M)",
    COUNT(DISTINCT pl.id) AS "Platforms"
FROM publisher p
LEFT JOIN game_publisher gp ON p.id = gp.publisher_id
LEFT JOIN game g ON gp.game_id = g.id
LEFT JOIN game_platform gpl ON gp.id = gpl.game_publisher_id
LEFT JOIN platform pl ON gpl.platform_id = pl.id
LEFT JOIN region_sales rs ON gpl.id = rs.game_platform_id
"#;

pub fn top_games_by_platform_query(platform: &str, limit: u32) -> Query {
    QueryBuilder::new(TOP_GAMES_BY_PLATFORM)
        .contains(r"p.platform_name ILIKE ? ESCAPE '\'", Some(platform))
        .group_by("g.game_name, gp.release_year")
        .order_by(r#""Sales (M)" DESC, g.game_name"#)
        .limit(limit)
        .build()
}

pub async fn top_games_by_platform(
    store: &Store,
    platform: &str,
    limit: u32,
    format: Format,
) -> Result<DisplayTable, ReportError> {
    let columns = vec![Column::text("Game"), Column::integer("Year"), Column::metric(SALES)];
    let set = store
        .fetch(top_games_by_platform_query(platform, limit), columns)
        .await?;
    DisplayTable::build(
        format!("Top {} games for {}", limit, platform),
        vec![
            ("Platform contains".to_string(), platform.to_string()),
            ("Limit".to_string(), limit.to_string()),
        ],
        set,
        &Sort::Descending(2),
        Some(limit as usize),
    )
    .non_empty(
        Guidance::new(format!("No games found for platform {}", platform))
            .hint("PlayStation")
            .hint("Xbox")
            .hint("Nintendo")
            .hint("PC"),
        format,
    )
}

pub fn top_games_by_year_query(year: i32, limit: u32) -> Query {
    QueryBuilder::new(TOP_GAMES_BY_YEAR)
        .filter_if("gpl.release_year = ?", Some(year))
        .group_by("g.game_name, p.platform_name")
        .order_by(r#""Sales (M)" DESC, g.game_name"#)
        .limit(limit)
        .build()
}

pub async fn top_games_by_year(
    store: &Store,
    year: i32,
    limit: u32,
    format: Format,
) -> Result<DisplayTable, ReportError> {
    let columns = vec![Column::text("Game"), Column::text("Platform"), Column::metric(SALES)];
    let set = store.fetch(top_games_by_year_query(year, limit), columns).await?;
    DisplayTable::build(
        format!("Top {} best-selling games of {}", limit, year),
        vec![
            ("Year".to_string(), year.to_string()),
            ("Limit".to_string(), limit.to_string()),
        ],
        set,
        &Sort::Descending(2),
        Some(limit as usize),
    )
    .non_empty(
        Guidance::new(format!("No games found for the year {}", year))
            .hint("Try another year between 1980 and 2020"),
        format,
    )
}

/// Years covered by the decade starting at `decade`.
pub fn decade_range(decade: i32) -> (i32, i32) {
    (decade, decade + 9)
}

pub fn top_platforms_by_decade_query(decade: i32, limit: u32) -> Query {
    let (start, end) = decade_range(decade);
    QueryBuilder::new(TOP_PLATFORMS_BY_DECADE)
        .filter("gp.release_year BETWEEN ? AND ?", vec![start.into(), end.into()])
        .group_by("p.platform_name")
        .order_by(r#""Total Sales (M)" DESC, p.platform_name"#)
        .limit(limit)
        .build()
}

pub async fn top_platforms_by_decade(
    store: &Store,
    decade: i32,
    limit: u32,
    format: Format,
) -> Result<DisplayTable, ReportError> {
    let (start, end) = decade_range(decade);
    let columns = vec![Column::text("Platform"), Column::metric(TOTAL_SALES)];
    let set = store
        .fetch(top_platforms_by_decade_query(decade, limit), columns)
        .await?;
    DisplayTable::build(
        format!("Top {} platforms of {}-{}", limit, start, end),
        vec![
            ("Decade".to_string(), format!("{}-{}", start, end)),
            ("Limit".to_string(), limit.to_string()),
        ],
        set,
        &Sort::Descending(1),
        Some(limit as usize),
    )
    .non_empty(
        Guidance::new(format!("No data found for the decade {}-{}", start, end))
            .hint("Try another decade, for example 1990, 2000 or 2010"),
        format,
    )
}

pub fn publisher_region_sales_query(publisher1: &str, publisher2: &str, region: &str) -> Query {
    QueryBuilder::new(PUBLISHER_REGION_SALES)
        .filter(
            "p.publisher_name IN (?, ?)",
            vec![publisher1.into(), publisher2.into()],
        )
        .filter("lower(r.region_name) = lower(?)", vec![region.into()])
        .group_by("p.publisher_name")
        .build()
}

/// Total sales of two publishers in one region. Both publishers are always
/// present, in request order, a publisher without sales there at 0.00.
/// When neither has sales there the region or the names are wrong, which is
/// reported as no data.
pub async fn publisher_region_sales(
    store: &Store,
    publisher1: &str,
    publisher2: &str,
    region: &str,
) -> Result<DisplayTable, ReportError> {
    let columns = vec![Column::text("Publisher"), Column::metric(TOTAL_SALES)];
    let mut set = store
        .fetch(publisher_region_sales_query(publisher1, publisher2, region), columns)
        .await?;
    if set.rows.is_empty() {
        let mut guidance =
            Guidance::new(format!("No sales found for {} or {} in {}", publisher1, publisher2, region))
                .hint("Publisher names must match exactly");
        for name in region_names(store).await? {
            guidance = guidance.hint(format!("Region: {}", name));
        }
        return Err(ReportError::NoData {
            guidance,
            format: Format::Table,
        });
    }
    let keys = vec![publisher1.to_string(), publisher2.to_string()];
    set.ensure_entities(0, &keys);
    Ok(DisplayTable::build(
        format!("Sales comparison in {}", capitalize(region)),
        vec![
            ("Publishers".to_string(), format!("{} vs {}", publisher1, publisher2)),
            ("Region".to_string(), region.to_string()),
        ],
        set,
        &Sort::Natural { column: 0, keys },
        None,
    ))
}

async fn region_names(store: &Store) -> Result<Vec<String>, ReportError> {
    let query = QueryBuilder::new("SELECT region_name FROM region")
        .order_by("id")
        .build();
    let set = store.fetch(query, vec![Column::text("Region")]).await?;
    Ok(set
        .rows
        .iter()
        .filter_map(|row| row[0].as_str().map(str::to_string))
        .collect())
}

pub fn game_region_sales_query(game_name: &str) -> Query {
    QueryBuilder::new(GAME_REGION_SALES)
        .contains(r"g.game_name ILIKE ? ESCAPE '\'", Some(game_name))
        .group_by("r.region_name")
        .build()
}

pub async fn game_region_sales(store: &Store, game_name: &str) -> Result<DisplayTable, ReportError> {
    let columns = vec![Column::text("Region"), Column::metric(TOTAL_SALES)];
    let set = store.fetch(game_region_sales_query(game_name), columns).await?;
    DisplayTable::build(
        format!("Regional sales for {}", game_name),
        vec![("Game contains".to_string(), game_name.to_string())],
        set,
        &Sort::Descending(1),
        None,
    )
    .non_empty(
        Guidance::new(format!("No sales found for games matching {}", game_name))
            .hint("Use a shorter part of the title, for example Mario"),
        Format::Table,
    )
}

pub fn game_region_comparison_query(game1: &str, game2: &str) -> Query {
    QueryBuilder::new(GAME_REGION_COMPARISON)
        .bind_like(game1)
        .bind_like(game2)
        .filter(
            r"(g.game_name ILIKE ? ESCAPE '\' OR g.game_name ILIKE ? ESCAPE '\')",
            vec![Value::Text(like_pattern(game1)), Value::Text(like_pattern(game2))],
        )
        .group_by("r.region_name")
        .having("SUM(rs.num_sales) > 0", Vec::new())
        .build()
}

/// Per-region sales of two games side by side; the value columns are
/// labelled with the search terms in request order.
pub async fn game_region_comparison(
    store: &Store,
    game1: &str,
    game2: &str,
) -> Result<DisplayTable, ReportError> {
    let columns = vec![
        Column::text("Region"),
        Column::metric(game1),
        Column::metric(game2),
    ];
    let set = store
        .fetch(game_region_comparison_query(game1, game2), columns)
        .await?;
    DisplayTable::build(
        format!("Sales comparison: {} vs {} by region", game1, game2),
        vec![("Games".to_string(), format!("{} vs {}", game1, game2))],
        set,
        &Sort::Ascending(0),
        None,
    )
    .non_empty(
        Guidance::new(format!("No sales found for {} or {}", game1, game2))
            .hint("Use a shorter part of each title, for example Mario and Zelda"),
        Format::Table,
    )
}

pub fn publisher_listing_query(name: Option<&str>, min_sales: Option<f64>, limit: u32) -> Query {
    QueryBuilder::new(PUBLISHER_LISTING)
        .contains(r"p.publisher_name ILIKE ? ESCAPE '\'", name)
        .group_by("p.id, p.publisher_name")
        .having("SUM(rs.num_sales) IS NOT NULL", Vec::new())
        .having_if("ROUND(SUM(rs.num_sales), 2) >= ?", min_sales)
        .order_by(r#""Total Sales (M)" DESC, p.publisher_name"#)
        .limit(limit)
        .build()
}

pub async fn publisher_listing(
    store: &Store,
    name: Option<&str>,
    min_sales: Option<f64>,
    limit: u32,
    format: Format,
) -> Result<DisplayTable, ReportError> {
    let columns = vec![
        Column::text("Publisher"),
        Column::integer("Games Published"),
        Column::metric(TOTAL_SALES),
        Column::integer("Platforms"),
    ];
    let set = store
        .fetch(publisher_listing_query(name, min_sales, limit), columns)
        .await?;

    let mut filters = Vec::new();
    if let Some(name) = name {
        filters.push(("Name contains".to_string(), name.to_string()));
    }
    if let Some(min) = min_sales {
        filters.push(("Minimum sales".to_string(), format!("{:.2}M", min)));
    }
    filters.push(("Limit".to_string(), limit.to_string()));

    DisplayTable::build("Publishers", filters, set, &Sort::Descending(2), Some(limit as usize))
        .non_empty(
            Guidance::new("No publishers match the given filters")
                .hint("Use a shorter part of the publisher name")
                .hint("Lower or drop min_sales"),
            format,
        )
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decade_filters_a_ten_year_range() {
        let query = top_platforms_by_decade_query(1990, 10);
        assert!(query.sql.contains("WHERE gp.release_year BETWEEN ? AND ?"));
        assert_eq!(
            query.params,
            vec![Value::Integer(1990), Value::Integer(1999), Value::Integer(10)]
        );
    }

    #[test]
    fn platform_is_bound_as_wildcard() {
        let query = top_games_by_platform_query("psp", 5);
        assert!(query.sql.contains(r"p.platform_name ILIKE ? ESCAPE '\'"));
        assert!(!query.sql.contains("psp"));
        assert_eq!(query.params, vec![Value::Text("%psp%".into()), Value::Integer(5)]);
    }

    #[test]
    fn publisher_listing_without_filters_binds_only_limit() {
        let query = publisher_listing_query(None, None, 10);
        assert!(!query.sql.contains("WHERE"));
        assert!(query.sql.contains("HAVING SUM(rs.num_sales) IS NOT NULL"));
        assert_eq!(query.params, vec![Value::Integer(10)]);
    }

    #[test]
    fn publisher_min_sales_is_an_aggregate_condition() {
        let query = publisher_listing_query(Some("Ninten"), Some(2.5), 3);
        assert!(query.sql.contains("WHERE p.publisher_name ILIKE ?"));
        assert!(query
            .sql
            .contains("HAVING SUM(rs.num_sales) IS NOT NULL AND ROUND(SUM(rs.num_sales), 2) >= ?"));
        assert_eq!(
            query.params,
            vec![Value::Text("%Ninten%".into()), Value::Float(2.5), Value::Integer(3)]
        );
    }

    #[test]
    fn game_comparison_binds_select_then_where() {
        let query = game_region_comparison_query("Mario", "Zelda");
        let patterns = vec![Value::Text("%Mario%".into()), Value::Text("%Zelda%".into())];
        assert_eq!(query.params[..2], patterns[..]);
        assert_eq!(query.params[2..], patterns[..]);
    }

    #[test]
    fn publisher_comparison_matches_exact_names() {
        let query = publisher_region_sales_query("Nintendo", "Sega", "japan");
        assert_eq!(
            query.params,
            vec![
                Value::Text("Nintendo".into()),
                Value::Text("Sega".into()),
                Value::Text("japan".into()),
            ]
        );
        assert!(!query.sql.contains('%'));
    }

    #[test]
    fn capitalize_region() {
        assert_eq!(capitalize("japan"), "Japan");
        assert_eq!(capitalize("north America"), "North America");
        assert_eq!(capitalize(""), "");
    }
}
