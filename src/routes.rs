use crate::chart::{self, Chart};
use crate::error::ReportError;
use crate::params::Params;
use crate::render::{self, MenuEntry};
use crate::reports;
use crate::state::AppState;
use axum::{
    Json, Router,
    extract::{RawQuery, State},
    http::header,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/platforms/top-games", get(top_games_by_platform_handler))
        .route("/years/top-games", get(top_games_by_year_handler))
        .route("/decades/top-platforms", get(top_platforms_by_decade_handler))
        .route("/publishers/compare/chart", get(publisher_compare_chart_handler))
        .route(
            "/games/regional-distribution/chart",
            get(game_distribution_chart_handler),
        )
        .route("/games/compare/chart", get(game_compare_chart_handler))
        .route("/publishers", get(publishers_handler))
        .route("/tables", get(menu_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn top_games_by_platform_handler(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Response, ReportError> {
    let params = Params::parse(raw);
    let platform = params.text_or("platform", "psp")?;
    let limit = params.limit(state.config.default_limit, state.config.max_limit)?;
    let format = params.format()?;

    let table = reports::top_games_by_platform(&state.store, &platform, limit, format).await?;
    let data_href = data_link("/platforms/top-games", &params);
    Ok(render::respond(&table, format, Some(&data_href)))
}

async fn top_games_by_year_handler(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Response, ReportError> {
    let params = Params::parse(raw);
    let year = params.year("year", 2010)?;
    let limit = params.limit(state.config.default_limit, state.config.max_limit)?;
    let format = params.format()?;

    let table = reports::top_games_by_year(&state.store, year, limit, format).await?;
    let data_href = data_link("/years/top-games", &params);
    Ok(render::respond(&table, format, Some(&data_href)))
}

async fn top_platforms_by_decade_handler(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Response, ReportError> {
    let params = Params::parse(raw);
    let decade = params.year("decade", 2000)?;
    let limit = params.limit(state.config.default_limit, state.config.max_limit)?;
    let format = params.format()?;

    let table = reports::top_platforms_by_decade(&state.store, decade, limit, format).await?;
    let data_href = data_link("/decades/top-platforms", &params);
    Ok(render::respond(&table, format, Some(&data_href)))
}

async fn publishers_handler(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Response, ReportError> {
    let params = Params::parse(raw);
    let name = params.search("name");
    let min_sales = params.min_sales()?;
    let limit = params.limit(state.config.default_limit, state.config.max_limit)?;
    let format = params.format()?;

    let table =
        reports::publisher_listing(&state.store, name.as_deref(), min_sales, limit, format).await?;
    let data_href = data_link("/publishers", &params);
    Ok(render::respond(&table, format, Some(&data_href)))
}

async fn publisher_compare_chart_handler(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Response, ReportError> {
    let params = Params::parse(raw);
    let publisher1 = params.required_text("publisher1")?;
    let publisher2 = params.required_text("publisher2")?;
    let region = params.text_or("region", "japan")?;
    if publisher1 == publisher2 {
        return Err(ReportError::invalid("publisher2", "must differ from publisher1"));
    }

    let table =
        reports::publisher_region_sales(&state.store, &publisher1, &publisher2, &region).await?;
    let chart = chart::bar_chart(
        &table,
        0,
        1,
        &[publisher1, publisher2],
        "Publisher",
        "Total Sales (millions)",
    )?;
    png_response(chart).await
}

async fn game_distribution_chart_handler(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Response, ReportError> {
    let params = Params::parse(raw);
    let game_name = params.text_or("game_name", "Mario")?;

    let table = reports::game_region_sales(&state.store, &game_name).await?;
    let chart = chart::pie_chart(&table, 0, 1)?;
    png_response(chart).await
}

async fn game_compare_chart_handler(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Response, ReportError> {
    let params = Params::parse(raw);
    let game1 = params.text_or("game1", "Mario")?;
    let game2 = params.text_or("game2", "Zelda")?;
    if game1.eq_ignore_ascii_case(&game2) {
        return Err(ReportError::invalid("game2", "must differ from game1"));
    }

    let table = reports::game_region_comparison(&state.store, &game1, &game2).await?;
    let chart = chart::grouped_bar_chart(&table, 0, [1, 2], "Region", "Sales (millions)")?;
    png_response(chart).await
}

async fn menu_handler() -> Html<String> {
    let entries = [
        MenuEntry {
            title: "Top games by platform",
            description: "Best-selling games on a platform",
            href: "/platforms/top-games?platform=psp&limit=10".to_string(),
        },
        MenuEntry {
            title: "Top games by year",
            description: "Best-selling games released in a year",
            href: "/years/top-games?year=2010&limit=10".to_string(),
        },
        MenuEntry {
            title: "Top platforms by decade",
            description: "Platforms ranked by sales over ten years",
            href: "/decades/top-platforms?decade=2000&limit=10".to_string(),
        },
        MenuEntry {
            title: "Publishers",
            description: "Publishers with their games, platforms and total sales",
            href: "/publishers?limit=10".to_string(),
        },
    ];
    Html(render::menu_page("Video game sales reports", &entries))
}

async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let store_connected = match state.store.ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %format!("{:#}", err), "store ping failed");
            false
        }
    };
    Json(json!({
        "status": if store_connected { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "store_connected": store_connected,
    }))
}

fn data_link(path: &str, params: &Params) -> String {
    format!("{}?{}", path, params.encode_with("format", "data"))
}

/// Rasterizes on the blocking pool.
async fn png_response(chart: Chart) -> Result<Response, ReportError> {
    let png = tokio::task::spawn_blocking(move || chart.to_png())
        .await
        .map_err(|err| ReportError::Render(format!("render task failed: {}", err)))??;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}
