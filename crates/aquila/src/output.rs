//! Output formatting: table, JSON, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one value per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Resolve `--color` against the terminal and `NO_COLOR`.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// "on" / "off", green / dimmed when color is enabled.
pub fn paint_switch(is_on: bool, color: bool) -> String {
    let label = if is_on { "on" } else { "off" };
    match (color, is_on) {
        (false, _) => label.to_owned(),
        (true, true) => label.green().bold().to_string(),
        (true, false) => label.dimmed().to_string(),
    }
}

/// Error text, red when color is enabled.
pub fn paint_error(message: &str, color: bool) -> String {
    if color {
        message.red().to_string()
    } else {
        message.to_owned()
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list. Tables go through `to_row`, JSON serializes `data`
/// itself, and plain prints `id_fn` of each item on its own line.
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    Ok(match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    })
}

/// Render one item. The table format is a key/value block from `detail_fn`.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    Ok(match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Plain => id_fn(data),
    })
}

/// Key/value detail block for single-item table output.
pub fn detail(rows: &[(&str, String)]) -> String {
    let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    rows.iter()
        .map(|(k, v)| format!("{k:<width$}  {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write to stdout unless `--quiet` or there is nothing to say.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(serde::Serialize)]
    struct Item {
        id: &'static str,
    }

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "ID")]
        id: String,
    }

    fn items() -> Vec<Item> {
        vec![Item { id: "d1" }, Item { id: "d2" }]
    }

    #[test]
    fn plain_lists_one_id_per_line() {
        let out = render_list(
            &OutputFormat::Plain,
            &items(),
            |i| Row { id: i.id.into() },
            |i| i.id.into(),
        )
        .unwrap();
        assert_eq!(out, "d1\nd2");
    }

    #[test]
    fn compact_json_is_single_line() {
        let out = render_list(
            &OutputFormat::JsonCompact,
            &items(),
            |i| Row { id: i.id.into() },
            |i| i.id.into(),
        )
        .unwrap();
        assert_eq!(out, r#"[{"id":"d1"},{"id":"d2"}]"#);
    }

    #[test]
    fn table_has_header() {
        let out = render_list(
            &OutputFormat::Table,
            &items(),
            |i| Row { id: i.id.into() },
            |i| i.id.into(),
        )
        .unwrap();
        assert!(out.contains("ID"));
        assert!(out.contains("d2"));
    }

    #[test]
    fn switch_without_color_is_plain() {
        assert_eq!(paint_switch(true, false), "on");
        assert_eq!(paint_switch(false, false), "off");
    }

    #[test]
    fn detail_aligns_keys() {
        let out = detail(&[("a", "1".into()), ("long", "2".into())]);
        assert_eq!(out, "a     1\nlong  2");
    }
}
