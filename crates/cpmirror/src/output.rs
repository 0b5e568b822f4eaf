//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Green when `ok`, yellow otherwise.
pub fn status_word(word: &str, ok: bool, color: bool) -> String {
    match (color, ok) {
        (false, _) => word.to_owned(),
        (true, true) => word.green().to_string(),
        (true, false) => word.yellow().to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json_pretty(data),
        OutputFormat::JsonCompact => render_json_compact(data),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, since single-item views don't use
/// the `Tabled` derive.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json_pretty(data),
        OutputFormat::JsonCompact => render_json_compact(data),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => id_fn(data),
    }
}

/// Render free-form JSON; tables fall back to pretty JSON.
pub fn render_value(format: &OutputFormat, data: &serde_json::Value) -> String {
    match format {
        OutputFormat::JsonCompact => render_json_compact(data),
        OutputFormat::Yaml => render_yaml(data),
        _ => render_json_pretty(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Pretty-printed JSON.
pub(crate) fn render_json_pretty<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|e| format!("serialization failed: {e}"))
}

/// Compact single-line JSON.
pub(crate) fn render_json_compact<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string(data).unwrap_or_else(|e| format!("serialization failed: {e}"))
}

/// YAML output.
pub(crate) fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| format!("serialization failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize)]
    struct Item {
        name: &'static str,
    }

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "Name")]
        name: String,
    }

    #[test]
    fn plain_emits_one_id_per_line() {
        let items = [Item { name: "a" }, Item { name: "b" }];
        let out = render_list(
            &OutputFormat::Plain,
            &items,
            |i| Row { name: i.name.into() },
            |i| i.name.to_string(),
        );
        assert_eq!(out, "a\nb");
    }

    #[test]
    fn table_has_header() {
        let items = [Item { name: "web01" }];
        let out = render_list(
            &OutputFormat::Table,
            &items,
            |i| Row { name: i.name.into() },
            |i| i.name.to_string(),
        );
        assert!(out.contains("Name"));
        assert!(out.contains("web01"));
    }

    #[test]
    fn compact_json_is_single_line() {
        let out = render_single(
            &OutputFormat::JsonCompact,
            &Item { name: "x" },
            |_| String::new(),
            |_| String::new(),
        );
        assert_eq!(out, r#"{"name":"x"}"#);
    }

    #[test]
    fn status_word_without_color_is_plain() {
        assert_eq!(status_word("in sync", true, false), "in sync");
    }
}
