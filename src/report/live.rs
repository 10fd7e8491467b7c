use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    config::Mode,
    error::Result,
    models::BenchResult,
};

const REFRESH_SECONDS: u32 = 5;

/// One result as published by the live report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub index: usize,
    pub name: String,
    pub protocol: String,
    pub reachable: bool,
    pub latency_ms: u64,
    pub jitter_ms: Option<u64>,
    pub packet_loss: Option<f64>,
    pub download_bytes_per_sec: Option<f64>,
    pub upload_bytes_per_sec: Option<f64>,
    pub location: Option<String>,
    pub unlock: Vec<String>,
}

impl ReportRow {
    fn from_result(index: usize, result: &BenchResult) -> Self {
        Self {
            index,
            name: result.name.clone(),
            protocol: result.protocol.clone(),
            reachable: result.is_reachable(),
            latency_ms: result.latency().as_millis() as u64,
            jitter_ms: result.stats().map(|s| s.jitter.as_millis() as u64),
            packet_loss: result.stats().map(|s| s.packet_loss),
            download_bytes_per_sec: result.download().map(|t| t.speed),
            upload_bytes_per_sec: result.upload().map(|t| t.speed),
            location: result.location().map(str::to_string),
            unlock: result
                .unlock()
                .map(|u| u.split(", ").map(str::to_string).collect())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub mode: &'static str,
    pub total: usize,
    pub done: usize,
    pub reachable: usize,
    pub finished: bool,
}

#[derive(Serialize)]
struct Snapshot<'a> {
    summary: Summary,
    results: &'a [ReportRow],
}

/// Report that grows one row per finished endpoint. `publish` rewrites the
/// HTML page and its JSON snapshot when a path is configured. The same
/// state backs the report server.
#[derive(Debug)]
pub struct LiveReport {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    total: usize,
    mode: Mode,
    html_path: Option<PathBuf>,
    state: RwLock<State>,
}

#[derive(Debug)]
struct State {
    rows: Vec<ReportRow>,
    updated_at: DateTime<Utc>,
}

impl LiveReport {
    pub fn new(total: usize, mode: Mode, html_path: Option<PathBuf>) -> Self {
        let started_at = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            total,
            mode,
            html_path,
            state: RwLock::new(State {
                rows: Vec::with_capacity(total),
                updated_at: started_at,
            }),
        }
    }

    pub fn html_path(&self) -> Option<&Path> {
        self.html_path.as_deref()
    }

    /// Rewrites the HTML page and its JSON snapshot from the current state.
    /// A no-op without an HTML path.
    pub async fn publish(&self) -> Result<()> {
        let Some(path) = &self.html_path else {
            return Ok(());
        };
        let html = self.render_html();
        let snapshot = self.snapshot_json()?;

        tokio::fs::write(path, html).await?;
        tokio::fs::write(path.with_extension("json"), snapshot).await?;
        Ok(())
    }

    pub fn add(&self, result: &BenchResult) {
        let mut state = self.state.write();
        let index = state.rows.len() + 1;
        state.rows.push(ReportRow::from_result(index, result));
        state.updated_at = Utc::now();
    }

    pub fn rows(&self) -> Vec<ReportRow> {
        self.state.read().rows.clone()
    }

    pub fn summary(&self) -> Summary {
        let state = self.state.read();
        Summary {
            run_id: self.run_id,
            started_at: self.started_at,
            updated_at: state.updated_at,
            mode: self.mode.as_str(),
            total: self.total,
            done: state.rows.len(),
            reachable: state.rows.iter().filter(|r| r.reachable).count(),
            finished: state.rows.len() >= self.total,
        }
    }

    pub fn snapshot_json(&self) -> Result<String> {
        let summary = self.summary();
        let state = self.state.read();
        Ok(serde_json::to_string_pretty(&Snapshot {
            summary,
            results: &state.rows,
        })?)
    }

    pub fn render_html(&self) -> String {
        let summary = self.summary();
        let state = self.state.read();
        let columns = self.columns();

        let mut html = String::with_capacity(4096 + state.rows.len() * 256);
        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n"
        );
        if !summary.finished {
            let _ = writeln!(
                html,
                "<meta http-equiv=\"refresh\" content=\"{}\">",
                REFRESH_SECONDS
            );
        }
        let _ = writeln!(
            html,
            "<title>proxybench {}</title>\n<style>{}</style>\n</head>\n<body>",
            summary.run_id, STYLE
        );
        let _ = writeln!(
            html,
            "<h1>Proxy benchmark</h1>\n<p>Run {} &middot; mode {} &middot; {}/{} done &middot; started {} &middot; updated {}</p>",
            summary.run_id,
            summary.mode,
            summary.done,
            summary.total,
            summary.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            summary.updated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        );

        html.push_str("<table>\n<thead><tr>");
        for column in &columns {
            let _ = write!(html, "<th>{}</th>", column);
        }
        html.push_str("</tr></thead>\n<tbody>\n");

        for row in &state.rows {
            let class = if row.reachable { "ok" } else { "down" };
            let _ = write!(html, "<tr class=\"{}\">", class);
            for cell in self.cells(row) {
                let _ = write!(html, "<td>{}</td>", escape(&cell));
            }
            html.push_str("</tr>\n");
        }

        html.push_str("</tbody>\n</table>\n</body>\n</html>\n");
        html
    }

    fn columns(&self) -> Vec<&'static str> {
        let mut columns = vec!["#", "Name", "Type", "Latency"];
        match self.mode {
            Mode::Fast => {}
            Mode::Unlock { .. } => columns.extend(["Jitter", "Loss", "Location", "Unlock"]),
            Mode::Full => columns.extend(["Jitter", "Loss", "Download", "Upload"]),
        }
        columns
    }

    fn cells(&self, row: &ReportRow) -> Vec<String> {
        let na = || crate::models::NOT_AVAILABLE.to_string();
        let millis = |ms: u64| if ms == 0 { na() } else { format!("{}ms", ms) };
        let speed = |s: Option<f64>| crate::models::format_speed(s.unwrap_or_default());

        let mut cells = vec![
            row.index.to_string(),
            row.name.clone(),
            row.protocol.clone(),
            millis(row.latency_ms),
        ];
        match self.mode {
            Mode::Fast => {}
            _ if !row.reachable => cells.extend((0..4).map(|_| na())),
            mode => {
                cells.push(row.jitter_ms.map(millis).unwrap_or_else(na));
                cells.push(
                    row.packet_loss
                        .map(|l| format!("{:.1}%", l))
                        .unwrap_or_else(na),
                );
                if let Mode::Unlock { .. } = mode {
                    cells.push(row.location.clone().unwrap_or_else(na));
                    cells.push(if row.unlock.is_empty() {
                        na()
                    } else {
                        row.unlock.join(", ")
                    });
                } else {
                    cells.push(speed(row.download_bytes_per_sec));
                    cells.push(speed(row.upload_bytes_per_sec));
                }
            }
        }
        cells
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

const STYLE: &str = "body{font-family:sans-serif;margin:2em}\
table{border-collapse:collapse}\
th,td{padding:4px 10px;text-align:left;border-bottom:1px solid #ddd}\
tr.ok td:nth-child(2){color:#2e7d32}\
tr.down td{color:#c62828}";
