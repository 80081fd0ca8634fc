use serde_json::Value;
use std::collections::BTreeMap;

use crate::api::{ProfileResponse, QueryResponse, ValidateResponse};

// ASCII table rendering for the REPL. Column widths are capped to keep
// output readable; numeric-looking cells are right-aligned.
const MAX_COL_WIDTH: usize = 60;

pub fn print_query_result(result: &QueryResponse) {
    if result.columns.is_empty() || result.rows.is_empty() {
        println!("(no rows)");
        println!("rows: {}", result.row_count);
        return;
    }
    let rows: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| {
            result
                .columns
                .iter()
                .map(|c| cell_string(row.get(c).unwrap_or(&Value::Null)))
                .collect()
        })
        .collect();
    print_table(&result.columns, &rows);
    println!("rows: {}, cols: {}", result.row_count, result.columns.len());
}

pub fn print_profile(profile: &ProfileResponse) {
    if let Some(name) = &profile.filename {
        println!("dataset: {} ({} rows)", name, profile.row_count);
    } else {
        println!("dataset: {} rows", profile.row_count);
    }
    let header = vec![
        "column".to_string(),
        "type".to_string(),
        "nulls".to_string(),
        "null %".to_string(),
        "stats".to_string(),
    ];
    let rows: Vec<Vec<String>> = profile
        .columns
        .iter()
        .map(|c| {
            vec![
                c.name.clone(),
                c.dtype.clone(),
                c.null_count.to_string(),
                format!("{:.1}", c.null_pct),
                c.stats.as_ref().map(stats_summary).unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&header, &rows);
    for w in &profile.warnings {
        println!("warning: {}", w);
    }
    if !profile.sample_rows.is_empty() {
        println!("sample rows: {}", profile.sample_rows.len());
    }
}

pub fn print_validation(result: &ValidateResponse) {
    if !result.summary.is_empty() {
        println!("summary:");
        for (k, v) in &result.summary {
            println!("  {}: {}", k, cell_string(v));
        }
    }
    if result.violations.is_empty() {
        println!("no violations found");
        return;
    }
    let header = vec!["column".to_string(), "message".to_string(), "row sample".to_string()];
    let rows: Vec<Vec<String>> = result
        .violations
        .iter()
        .map(|v| {
            vec![
                v.column.clone().unwrap_or_default(),
                v.message
                    .clone()
                    .unwrap_or_else(|| extra_summary(&v.extra)),
                v.row_sample.as_ref().map(cell_string).unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&header, &rows);
    println!("violations: {}", result.violations.len());
}

fn stats_summary(stats: &BTreeMap<String, Value>) -> String {
    stats
        .iter()
        .map(|(k, v)| format!("{}={}", k, cell_string(v)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn extra_summary(extra: &BTreeMap<String, Value>) -> String {
    extra
        .iter()
        .map(|(k, v)| format!("{}: {}", k, cell_string(v)))
        .collect::<Vec<_>>()
        .join("; ")
}

fn print_table(columns: &[String], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = columns.iter().map(|s| display_len(s).min(MAX_COL_WIDTH)).collect();
    for r in rows {
        for (i, cell) in r.iter().enumerate().take(columns.len()) {
            let w = display_len(cell);
            if w > widths[i] {
                widths[i] = w.min(MAX_COL_WIDTH);
            }
        }
    }
    let sep = build_separator(&widths);
    println!("{}", sep);
    println!("{}", build_row(columns, &widths));
    println!("{}", sep);
    for r in rows {
        println!("{}", build_row(r, &widths));
    }
    println!("{}", sep);
}

fn cell_string(v: &Value) -> String {
    match v {
        Value::Null => String::from("NULL"),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn display_len(s: &str) -> usize {
    s.chars().count()
}

fn build_separator(widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('+');
    for w in widths {
        s.push_str(&"-".repeat(*w + 2));
        s.push('+');
    }
    s
}

fn build_row(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('|');
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).cloned().unwrap_or_default();
        let text = truncate(&cell, *w);
        s.push(' ');
        if is_numeric_like(&cell) {
            let pad = w.saturating_sub(display_len(&text));
            s.push_str(&" ".repeat(pad));
            s.push_str(&text);
        } else {
            s.push_str(&text);
            let pad = w.saturating_sub(display_len(&text));
            s.push_str(&" ".repeat(pad));
        }
        s.push(' ');
        s.push('|');
    }
    s
}

fn truncate(s: &str, max: usize) -> String {
    let len = s.chars().count();
    if len <= max {
        return s.to_string();
    }
    if max <= 1 {
        return "…".to_string();
    }
    s.chars().take(max - 1).collect::<String>() + "…"
}

fn is_numeric_like(s: &str) -> bool {
    let st = s.trim();
    if st.is_empty() {
        return false;
    }
    let mut has_digit = false;
    for ch in st.chars() {
        if ch.is_ascii_digit() {
            has_digit = true;
            continue;
        }
        if ".-+eE,_%".contains(ch) {
            continue;
        }
        return false;
    }
    has_digit
}
