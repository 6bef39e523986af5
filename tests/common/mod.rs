#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;
use vgsales_report::{AppState, ReportConfig, Store, router};

/// Three Nintendo titles, one Sega title and three PSP titles from other
/// publishers. Ubisoft exists but has no games.
const FIXTURE: &str = "
INSERT INTO genre VALUES (1, 'Platform'), (2, 'Racing'), (3, 'Action'), (4, 'Role-Playing');
INSERT INTO game VALUES
    (1, 1, 'Super Mario Bros.'),
    (2, 2, 'Mario Kart DS'),
    (3, 3, 'The Legend of Zelda'),
    (4, 1, 'Sonic the Hedgehog'),
    (5, 1, 'Daxter'),
    (6, 3, 'Grand Theft Auto: Liberty City Stories'),
    (7, 4, 'Monster Hunter Freedom');
INSERT INTO publisher VALUES
    (1, 'Nintendo'), (2, 'Sega'), (3, 'Ubisoft'), (4, 'Capcom'),
    (5, 'Take-Two Interactive'), (6, 'Sony Computer Entertainment');
INSERT INTO game_publisher VALUES
    (1, 1, 1), (2, 2, 1), (3, 3, 1), (4, 4, 2), (5, 5, 6), (6, 6, 5), (7, 7, 4);
INSERT INTO platform VALUES (1, 'NES'), (2, 'DS'), (3, 'PSP'), (4, 'GEN');
INSERT INTO game_platform VALUES
    (1, 1, 1, 1985), (2, 2, 2, 2005), (3, 3, 1, 1986), (4, 4, 4, 1991),
    (5, 5, 3, 2005), (6, 6, 3, 2005), (7, 7, 3, 2006);
INSERT INTO region VALUES (1, 'North America'), (2, 'Europe'), (3, 'Japan'), (4, 'Other');
INSERT INTO region_sales VALUES
    (1, 1, 29.08), (2, 1, 3.58), (3, 1, 6.81), (4, 1, 0.77),
    (1, 2, 9.71), (2, 2, 7.47), (3, 2, 4.13), (4, 2, 1.90),
    (1, 3, 3.74), (2, 3, 0.93), (3, 3, 1.69), (4, 3, 0.14),
    (1, 4, 3.03), (2, 4, 0.91), (3, 4, 0.26), (4, 4, 0.13),
    (1, 5, 2.45), (2, 5, 1.20), (4, 5, 0.50),
    (1, 6, 2.90), (2, 6, 2.83), (3, 6, 0.24), (4, 6, 1.71),
    (2, 7, 0.01), (3, 7, 1.89);
";

pub async fn seeded_store() -> Arc<Store> {
    let store = Store::open_in_memory().expect("open store");
    store
        .with_conn(|conn| {
            conn.execute_batch(FIXTURE)?;
            Ok(())
        })
        .await
        .expect("load fixture");
    Arc::new(store)
}

pub async fn app() -> Router {
    router(AppState {
        store: seeded_store().await,
        config: ReportConfig::default(),
    })
}

pub struct Reply {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("json body")
    }
}

pub async fn get(app: Router, uri: &str) -> Reply {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec();
    Reply {
        status,
        content_type,
        body,
    }
}

/// Cell texts of each `<tbody>` row of an HTML report.
pub fn table_rows(html: &str) -> Vec<Vec<String>> {
    let Some(start) = html.find("<tbody>") else {
        return Vec::new();
    };
    let end = html[start..].find("</tbody>").map_or(html.len(), |e| start + e);
    html[start..end]
        .split("<tr>")
        .skip(1)
        .map(|row| {
            row.split("<td")
                .skip(1)
                .filter_map(|cell| {
                    let open = cell.find('>')?;
                    let close = cell.find("</td>")?;
                    Some(cell[open + 1..close].to_string())
                })
                .collect()
        })
        .collect()
}
