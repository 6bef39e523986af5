//! Bar and pie charts drawn as SVG and rasterized to PNG.

use crate::error::ReportError;
use crate::normalize::DisplayTable;
use crate::render::escape_html;
use once_cell::sync::Lazy;
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{self, Options, Tree};
use std::f64::consts::PI;
use std::fmt::Write;
use std::sync::Arc;

/// Colour of the first-named entity in a comparison.
pub const FIRST_COLOR: &str = "#3498db";
/// Colour of the second-named entity in a comparison.
pub const SECOND_COLOR: &str = "#e74c3c";
const PIE_COLORS: &[&str] = &[
    "#3498db", "#e74c3c", "#2ecc71", "#f39c12", "#9b59b6", "#1abc9c", "#34495e", "#e67e22",
];
const FONT: &str = "Arial, Helvetica, sans-serif";

static FONTS: Lazy<Arc<usvg::fontdb::Database>> = Lazy::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    Arc::new(db)
});

pub struct Chart {
    svg: String,
    width: u32,
    height: u32,
}

impl Chart {
    pub fn svg(&self) -> &str {
        &self.svg
    }

    pub fn to_png(&self) -> Result<Vec<u8>, ReportError> {
        let mut options = Options::default();
        options.fontdb = FONTS.clone();
        let tree = Tree::from_data(self.svg.as_bytes(), &options)
            .map_err(|err| ReportError::Render(format!("svg parse failed: {}", err)))?;
        let mut pixmap = Pixmap::new(self.width, self.height)
            .ok_or_else(|| ReportError::Render("pixmap allocation failed".to_string()))?;
        resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());
        pixmap
            .encode_png()
            .map_err(|err| ReportError::Render(format!("png encoding failed: {}", err)))
    }
}

fn role_color(role: usize) -> &'static str {
    if role == 0 { FIRST_COLOR } else { SECOND_COLOR }
}

/// Plot area inside the canvas.
struct Frame {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl Frame {
    fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Bars for a two-entity comparison. `roles` lists the entities in request
/// order; a bar takes the colour of its entity's position there, whatever
/// row it ended up in.
pub fn bar_chart(
    table: &DisplayTable,
    label_col: usize,
    value_col: usize,
    roles: &[String],
    x_label: &str,
    y_label: &str,
) -> Result<Chart, ReportError> {
    let (width, height) = (1000, 600);
    let frame = Frame {
        left: 90.0,
        top: 80.0,
        width: 870.0,
        height: 420.0,
    };
    let values = column_values(table, value_col)?;
    let max_val = nice_max(values.iter().copied().fold(0.0, f64::max));

    let mut out = String::new();
    open_svg(&mut out, width, height, &table.title);
    append_axes(&mut out, &frame, max_val, x_label, y_label);

    let slot = frame.width / values.len().max(1) as f64;
    let bar_w = slot * 0.6;
    for (idx, (row, value)) in table.rows.iter().zip(&values).enumerate() {
        let label = row[label_col].to_string();
        let role = roles.iter().position(|r| *r == label).unwrap_or(idx);
        let bar_h = value / max_val * frame.height;
        let x = frame.left + idx as f64 * slot + (slot - bar_w) / 2.0;
        let y = frame.bottom() - bar_h;
        append(
            &mut out,
            &format!(
                "<rect x='{:.1}' y='{:.1}' width='{:.1}' height='{:.1}' fill='{}' fill-opacity='0.8' />",
                x,
                y,
                bar_w,
                bar_h,
                role_color(role)
            ),
        );
        append_text(&mut out, x + bar_w / 2.0, y - 8.0, 14, "middle", &format!("{:.2}M", value));
        append_text(&mut out, x + bar_w / 2.0, frame.bottom() + 24.0, 14, "middle", &label);
    }

    close_svg(&mut out);
    Ok(Chart { svg: out, width, height })
}

/// Two bars per category, one per series. `series` are the value columns in
/// request order; the first series is always drawn first and blue.
pub fn grouped_bar_chart(
    table: &DisplayTable,
    category_col: usize,
    series: [usize; 2],
    x_label: &str,
    y_label: &str,
) -> Result<Chart, ReportError> {
    let (width, height) = (1200, 700);
    let frame = Frame {
        left: 90.0,
        top: 90.0,
        width: 1070.0,
        height: 500.0,
    };
    let first = column_values(table, series[0])?;
    let second = column_values(table, series[1])?;
    let max_val = nice_max(first.iter().chain(&second).copied().fold(0.0, f64::max));

    let mut out = String::new();
    open_svg(&mut out, width, height, &table.title);
    append_axes(&mut out, &frame, max_val, x_label, y_label);

    let slot = frame.width / table.rows.len().max(1) as f64;
    let bar_w = slot * 0.35;
    for (idx, row) in table.rows.iter().enumerate() {
        let center = frame.left + idx as f64 * slot + slot / 2.0;
        for (role, value) in [first[idx], second[idx]].into_iter().enumerate() {
            let bar_h = value / max_val * frame.height;
            let x = if role == 0 { center - bar_w } else { center };
            let y = frame.bottom() - bar_h;
            append(
                &mut out,
                &format!(
                    "<rect x='{:.1}' y='{:.1}' width='{:.1}' height='{:.1}' fill='{}' fill-opacity='0.8' />",
                    x,
                    y,
                    bar_w,
                    bar_h,
                    role_color(role)
                ),
            );
            append_text(&mut out, x + bar_w / 2.0, y - 6.0, 11, "middle", &format!("{:.2}", value));
        }
        append_text(
            &mut out,
            center,
            frame.bottom() + 24.0,
            14,
            "middle",
            &row[category_col].to_string(),
        );
    }

    // legend
    for (role, col) in series.iter().enumerate() {
        let y = frame.top + role as f64 * 24.0;
        let x = frame.left + frame.width - 220.0;
        append(
            &mut out,
            &format!(
                "<rect x='{:.1}' y='{:.1}' width='16' height='16' fill='{}' fill-opacity='0.8' />",
                x,
                y,
                role_color(role)
            ),
        );
        append_text(&mut out, x + 24.0, y + 13.0, 14, "start", &table.columns[*col].label);
    }

    close_svg(&mut out);
    Ok(Chart { svg: out, width, height })
}

/// Share of `value_col` per row. Zero-valued rows get no slice.
pub fn pie_chart(table: &DisplayTable, label_col: usize, value_col: usize) -> Result<Chart, ReportError> {
    let (width, height) = (800, 800);
    let (cx, cy, r) = (400.0, 430.0, 290.0);
    let values = column_values(table, value_col)?;
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return Err(ReportError::Render(
            "cannot draw a pie chart of zero total sales".to_string(),
        ));
    }

    let mut out = String::new();
    open_svg(&mut out, width, height, &table.title);

    let mut start = -PI / 2.0;
    for (idx, (row, value)) in table.rows.iter().zip(&values).enumerate() {
        if *value <= 0.0 {
            continue;
        }
        let share = value / total;
        let sweep = share * 2.0 * PI;
        let color = PIE_COLORS[idx % PIE_COLORS.len()];
        if share >= 0.9999 {
            append(
                &mut out,
                &format!("<circle cx='{}' cy='{}' r='{}' fill='{}' />", cx, cy, r, color),
            );
        } else {
            let end = start + sweep;
            let large = if sweep > PI { 1 } else { 0 };
            append(
                &mut out,
                &format!(
                    "<path d='M {cx} {cy} L {:.2} {:.2} A {r} {r} 0 {large} 1 {:.2} {:.2} Z' fill='{color}' stroke='white' stroke-width='2' />",
                    cx + r * start.cos(),
                    cy + r * start.sin(),
                    cx + r * end.cos(),
                    cy + r * end.sin(),
                ),
            );
        }

        let mid = start + sweep / 2.0;
        let (lx, ly) = (cx + r * 0.62 * mid.cos(), cy + r * 0.62 * mid.sin());
        append_text(&mut out, lx, ly - 4.0, 15, "middle", &row[label_col].to_string());
        append_text(
            &mut out,
            lx,
            ly + 16.0,
            13,
            "middle",
            &format!("{:.2}M ({:.1}%)", value, share * 100.0),
        );
        start += sweep;
    }

    close_svg(&mut out);
    Ok(Chart { svg: out, width, height })
}

fn column_values(table: &DisplayTable, col: usize) -> Result<Vec<f64>, ReportError> {
    let mut values = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let value = row[col].as_f64().unwrap_or(0.0);
        if !value.is_finite() || value < 0.0 {
            return Err(ReportError::Render(format!(
                "cannot chart value {} in column {}",
                value, table.columns[col].label
            )));
        }
        values.push(value);
    }
    Ok(values)
}

/// Smallest 1, 2 or 5 times a power of ten at or above `v`.
fn nice_max(v: f64) -> f64 {
    if v <= 0.0 {
        return 1.0;
    }
    let magnitude = 10f64.powf(v.log10().floor());
    for step in [1.0, 2.0, 5.0, 10.0] {
        if step * magnitude >= v {
            return step * magnitude;
        }
    }
    10.0 * magnitude
}

fn append_axes(out: &mut String, frame: &Frame, max_val: f64, x_label: &str, y_label: &str) {
    let ticks = 5;
    for i in 0..=ticks {
        let val = max_val * i as f64 / ticks as f64;
        let y = frame.bottom() - frame.height * i as f64 / ticks as f64;
        append(
            out,
            &format!(
                "<line x1='{:.1}' y1='{:.1}' x2='{:.1}' y2='{:.1}' stroke='#ddd' stroke-dasharray='4 3' />",
                frame.left,
                y,
                frame.left + frame.width,
                y
            ),
        );
        append_text(out, frame.left - 8.0, y + 4.0, 12, "end", &format_tick(val));
    }
    append(
        out,
        &format!(
            "<line x1='{:.1}' y1='{:.1}' x2='{:.1}' y2='{:.1}' stroke='#2c3e50' />",
            frame.left,
            frame.bottom(),
            frame.left + frame.width,
            frame.bottom()
        ),
    );
    append_text(
        out,
        frame.left + frame.width / 2.0,
        frame.bottom() + 60.0,
        14,
        "middle",
        x_label,
    );
    let (yx, yy) = (24.0, frame.top + frame.height / 2.0);
    append(
        out,
        &format!(
            "<text x='{:.1}' y='{:.1}' font-family='{}' font-size='14' text-anchor='middle' fill='#2c3e50' transform='rotate(-90 {:.1} {:.1})'>{}</text>",
            yx,
            yy,
            FONT,
            yx,
            yy,
            escape_html(y_label)
        ),
    );
}

fn format_tick(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{:.0}", v)
    } else {
        format!("{:.2}", v)
    }
}

fn open_svg(out: &mut String, width: u32, height: u32, title: &str) {
    append(
        out,
        &format!(
            "<svg xmlns='http://www.w3.org/2000/svg' width='{w}' height='{h}' viewBox='0 0 {w} {h}'>",
            w = width,
            h = height
        ),
    );
    append(out, "<rect width='100%' height='100%' fill='white' />");
    append_text(out, width as f64 / 2.0, 40.0, 20, "middle", title);
}

fn close_svg(out: &mut String) {
    append(out, "</svg>");
}

fn append_text(out: &mut String, x: f64, y: f64, size: u32, anchor: &str, text: &str) {
    append(
        out,
        &format!(
            "<text x='{:.1}' y='{:.1}' font-family='{}' font-size='{}' text-anchor='{}' fill='#2c3e50'>{}</text>",
            x,
            y,
            FONT,
            size,
            anchor,
            escape_html(text)
        ),
    );
}

fn append(out: &mut String, value: &str) {
    let _ = writeln!(out, "{}", value);
}
