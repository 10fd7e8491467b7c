use std::{cmp::Ordering, time::Duration};

use comfy_table::{presets::NOTHING, Cell, CellAlignment, Color, Row, Table};

use crate::{
    config::Mode,
    models::{BenchResult, NOT_AVAILABLE},
};

const MB: f64 = 1024.0 * 1024.0;
const UNLOCK_ENTRIES_PER_LINE: usize = 4;

/// Fastest download first; ties (and every row outside the full mode) by
/// latency, unreachable endpoints last. The sort is stable.
pub fn sort_results(results: &mut [BenchResult]) {
    results.sort_by(|a, b| {
        b.download_speed()
            .partial_cmp(&a.download_speed())
            .unwrap_or(Ordering::Equal)
            .then_with(|| latency_key(a).cmp(&latency_key(b)))
    });
}

fn latency_key(result: &BenchResult) -> (bool, Duration) {
    (!result.is_reachable(), result.latency())
}

pub fn render(results: &[BenchResult], mode: Mode) -> Table {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(header(mode));

    for (index, result) in results.iter().enumerate() {
        table.add_row(row(index + 1, result, mode));
    }
    table
}

fn header(mode: Mode) -> Vec<&'static str> {
    let mut columns = vec!["#", "Name", "Type", "Latency"];
    match mode {
        Mode::Fast => {}
        Mode::Unlock { .. } => columns.extend(["Jitter", "Loss", "Location", "Unlock"]),
        Mode::Full => columns.extend(["Jitter", "Loss", "Download", "Upload"]),
    }
    columns
}

fn row(index: usize, result: &BenchResult, mode: Mode) -> Row {
    let reachable = result.is_reachable();
    let identity = if reachable { Color::Green } else { Color::Red };

    let mut cells = vec![
        Cell::new(format!("{}.", index)).set_alignment(CellAlignment::Right),
        Cell::new(&result.name).fg(identity),
        Cell::new(&result.protocol).fg(identity),
        Cell::new(result.format_latency()).fg(duration_color(result.latency())),
    ];

    match mode {
        Mode::Fast => {}
        _ if !reachable => {
            cells.extend((0..4).map(|_| Cell::new(NOT_AVAILABLE).fg(Color::Red)));
        }
        Mode::Unlock { .. } => {
            cells.extend(latency_detail(result));
            cells.push(Cell::new(result.format_location()));
            cells.push(unlock_cell(result));
        }
        Mode::Full => {
            cells.extend(latency_detail(result));
            let download = result.download_speed() / MB;
            let upload = result.upload_speed() / MB;
            cells.push(
                Cell::new(result.format_download_speed()).fg(speed_color(download, 10.0, 5.0)),
            );
            cells.push(
                Cell::new(result.format_upload_speed()).fg(speed_color(upload, 5.0, 2.0)),
            );
        }
    }

    Row::from(cells)
}

fn latency_detail(result: &BenchResult) -> [Cell; 2] {
    let (jitter, loss) = result
        .stats()
        .map(|stats| (stats.jitter, stats.packet_loss))
        .unwrap_or((Duration::ZERO, 100.0));

    [
        Cell::new(result.format_jitter()).fg(duration_color(jitter)),
        Cell::new(result.format_packet_loss()).fg(loss_color(loss)),
    ]
}

fn unlock_cell(result: &BenchResult) -> Cell {
    let Some(unlock) = result.unlock() else {
        return Cell::new(NOT_AVAILABLE).fg(Color::Red);
    };

    let entries: Vec<&str> = unlock.split(", ").collect();
    let lines: Vec<String> = entries
        .chunks(UNLOCK_ENTRIES_PER_LINE)
        .map(|line| line.join(", "))
        .collect();
    Cell::new(lines.join("\n")).fg(Color::Green)
}

fn duration_color(duration: Duration) -> Color {
    match duration.as_millis() {
        0 => Color::Red,
        1..=799 => Color::Green,
        800..=1499 => Color::Yellow,
        _ => Color::Red,
    }
}

fn loss_color(loss: f64) -> Color {
    if loss < 10.0 {
        Color::Green
    } else if loss < 20.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

fn speed_color(mb_per_sec: f64, good: f64, fair: f64) -> Color {
    if mb_per_sec >= good {
        Color::Green
    } else if mb_per_sec >= fair {
        Color::Yellow
    } else {
        Color::Red
    }
}
