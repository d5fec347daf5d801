use crate::errors::{AppError, AppResult};
use crate::models::{Facet, FacetValues, Field, QueryField, Record, Status, ALL, NO_CHAPTER};
use crate::schema::DatasetRegistry;
use crate::sort::SortDirection;
use crate::theme::{rgb, Palette, Themeable};
use crate::tracker::{RecordEdit, Tracker};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "substory-tracker",
    version,
    about = "Track substory and revelation completion across datasets"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Data directory holding datasets, session and logs.
    #[arg(long = "data-dir", value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Mirror log events to stderr.
    #[arg(long = "log-stderr", global = true)]
    pub log_stderr: bool,

    /// Disable coloured output.
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List registered datasets.
    Datasets,
    /// Show the entries matching the current filters, optionally changing them first.
    List(ListArgs),
    /// Show every field of one entry.
    Show { id: i64 },
    /// Sort the active dataset on a column and save the new order.
    Sort {
        #[arg(value_enum)]
        column: ColumnArg,
        /// Sort descending.
        #[arg(long)]
        desc: bool,
    },
    /// Set the status of the given entries.
    SetStatus {
        status: Status,
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Change fields of one entry.
    Edit(EditArgs),
    /// Switch to another dataset by id or label.
    Use { dataset: String },
    /// Switch to the revelations dataset of the active game.
    Revelations,
    /// Select the colour theme.
    Theme {
        #[arg(value_enum)]
        mode: ThemeArg,
    },
    /// Adjust the font size.
    Font {
        #[arg(value_enum)]
        action: FontArg,
    },
    /// Clear the query and every facet.
    ResetFilters,
}

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Free-text query; pass an empty string to clear it.
    #[arg(long, short)]
    pub query: Option<String>,
    /// Field the query is matched against.
    #[arg(long = "by", value_enum)]
    pub by: Option<QueryFieldArg>,
    /// Status labels to show (repeatable).
    #[arg(long = "status", value_name = "LABEL")]
    pub statuses: Vec<String>,
    /// Chapters to show (repeatable); `none` matches entries without a chapter.
    #[arg(long = "chapter", value_name = "LABEL")]
    pub chapters: Vec<String>,
    /// Characters to show (repeatable).
    #[arg(long = "character", value_name = "NAME")]
    pub characters: Vec<String>,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    pub id: i64,
    /// New id; must not belong to another entry.
    #[arg(long = "new-id")]
    pub new_id: Option<i64>,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long = "available-from")]
    pub available_from: Option<String>,
    #[arg(long)]
    pub status: Option<Status>,
    #[arg(long)]
    pub character: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnArg {
    Id,
    Title,
    Description,
    Character,
    AvailableFrom,
    Status,
}

impl From<ColumnArg> for Field {
    fn from(value: ColumnArg) -> Self {
        match value {
            ColumnArg::Id => Field::Id,
            ColumnArg::Title => Field::Title,
            ColumnArg::Description => Field::Description,
            ColumnArg::Character => Field::Category,
            ColumnArg::AvailableFrom => Field::AvailableFrom,
            ColumnArg::Status => Field::Status,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryFieldArg {
    Id,
    Title,
    Description,
}

impl From<QueryFieldArg> for QueryField {
    fn from(value: QueryFieldArg) -> Self {
        match value {
            QueryFieldArg::Id => QueryField::Id,
            QueryFieldArg::Title => QueryField::Title,
            QueryFieldArg::Description => QueryField::Description,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeArg {
    Light,
    Dark,
    Toggle,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontArg {
    Inc,
    Dec,
    Reset,
}

const DESCRIPTION_WIDTH: usize = 48;

#[derive(Debug, Clone, Default)]
pub struct TablePrinter {
    color: bool,
    foreground: Option<(u8, u8, u8)>,
    heading_background: Option<(u8, u8, u8)>,
}

impl Themeable for TablePrinter {
    fn apply_palette(&mut self, palette: &Palette) {
        self.foreground = rgb(palette.foreground);
        self.heading_background = rgb(palette.heading_background);
    }
}

impl TablePrinter {
    pub fn new(color: bool) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }

    pub fn render_view(&self, tracker: &Tracker) -> String {
        let columns = tracker.columns();
        let rows: Vec<Vec<String>> = tracker
            .view()
            .into_iter()
            .map(|record| columns.iter().map(|field| cell(record, *field)).collect())
            .collect();
        let headings: Vec<String> = columns.iter().map(|field| field.heading().to_string()).collect();

        let mut widths: Vec<usize> = headings.iter().map(|heading| heading.chars().count()).collect();
        for row in &rows {
            for (width, value) in widths.iter_mut().zip(row) {
                *width = (*width).max(value.chars().count());
            }
        }

        let mut output = String::new();
        output.push_str(&self.paint(&join_padded(&headings, &widths), true));
        output.push('\n');
        for row in &rows {
            output.push_str(&self.paint(&join_padded(row, &widths), false));
            output.push('\n');
        }
        output
    }

    fn paint(&self, line: &str, heading: bool) -> String {
        if !self.color {
            return line.to_string();
        }
        let mut codes = String::new();
        if let Some((r, g, b)) = self.foreground {
            codes.push_str(&format!("\x1b[38;2;{};{};{}m", r, g, b));
        }
        if heading {
            codes.push_str("\x1b[1m");
            if let Some((r, g, b)) = self.heading_background {
                codes.push_str(&format!("\x1b[48;2;{};{};{}m", r, g, b));
            }
        }
        if codes.is_empty() {
            line.to_string()
        } else {
            format!("{}{}\x1b[0m", codes, line)
        }
    }
}

fn cell(record: &Record, field: Field) -> String {
    let text = record.field_text(field);
    if field == Field::Description && text.chars().count() > DESCRIPTION_WIDTH {
        let truncated: String = text.chars().take(DESCRIPTION_WIDTH - 3).collect();
        format!("{}...", truncated)
    } else {
        text
    }
}

fn join_padded(values: &[String], widths: &[usize]) -> String {
    values
        .iter()
        .zip(widths)
        .map(|(value, width)| format!("{:<width$}", value, width = *width))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

pub fn print_datasets<W: Write>(registry: &DatasetRegistry, active: Option<&str>, out: &mut W) -> AppResult<()> {
    for schema in registry.datasets() {
        let marker = if active == Some(schema.id.as_str()) { "*" } else { " " };
        writeln!(
            out,
            "{} {:<22} {:<22} {}",
            marker, schema.id, schema.label, schema.file
        )?;
    }
    Ok(())
}

pub fn execute<W: Write>(
    tracker: &mut Tracker,
    command: Command,
    printer: &mut TablePrinter,
    out: &mut W,
) -> AppResult<()> {
    match command {
        Command::Datasets => print_datasets(tracker.registry(), Some(tracker.schema().id.as_str()), out),
        Command::List(args) => {
            apply_list_args(tracker, args)?;
            print_view(tracker, printer, out)
        }
        Command::Show { id } => {
            let record = tracker
                .record(id)
                .ok_or_else(|| AppError::NotFound(format!("Record {} does not exist", id)))?;
            print_record(tracker, record, out)
        }
        Command::Sort { column, desc } => {
            let direction = if desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            tracker.sort_with(column.into(), direction)?;
            tracker.persist()?;
            print_view(tracker, printer, out)
        }
        Command::SetStatus { status, ids } => {
            let hidden = tracker.select_ids(ids);
            if !hidden.is_empty() {
                return Err(AppError::NotFound(format!(
                    "Not shown with the current filters: {}",
                    join_ids(&hidden)
                )));
            }
            let changed = tracker.set_status(status)?;
            writeln!(out, "{} entries set to {}", changed, status)?;
            Ok(())
        }
        Command::Edit(args) => {
            let edit = RecordEdit {
                id: args.new_id,
                title: args.title,
                description: args.description,
                available_from: args.available_from,
                status: args.status,
                category: args.character,
            };
            if edit.is_empty() {
                return Err(AppError::Validation("Nothing to change".to_string()));
            }
            let id = edit.id.unwrap_or(args.id);
            tracker.edit_record(args.id, edit)?;
            match tracker.record(id) {
                Some(record) => print_record(tracker, record, out),
                None => Ok(()),
            }
        }
        Command::Use { dataset } => {
            tracker.select_dataset(&dataset)?;
            print_view(tracker, printer, out)
        }
        Command::Revelations => {
            tracker.open_companion()?;
            print_view(tracker, printer, out)
        }
        Command::Theme { mode } => {
            match mode {
                ThemeArg::Light => tracker.set_dark_mode(false)?,
                ThemeArg::Dark => tracker.set_dark_mode(true)?,
                ThemeArg::Toggle => {
                    tracker.toggle_dark_mode()?;
                }
            }
            crate::theme::apply_theme(tracker.dark_mode(), &mut [&mut *printer]);
            let name = if tracker.dark_mode() { "dark" } else { "light" };
            writeln!(out, "{}", printer.paint(&format!("theme: {}", name), false))?;
            Ok(())
        }
        Command::Font { action } => {
            let size = match action {
                FontArg::Inc => tracker.increase_font(),
                FontArg::Dec => tracker.decrease_font(),
                FontArg::Reset => tracker.reset_font(),
            };
            writeln!(out, "font size: {}", size)?;
            Ok(())
        }
        Command::ResetFilters => {
            tracker.reset_filters();
            print_view(tracker, printer, out)
        }
    }
}

pub fn report_startup<W: Write>(tracker: &Tracker, out: &mut W) -> AppResult<()> {
    if let Some(warning) = tracker.startup_warning() {
        writeln!(out, "warning: {}", warning)?;
    }
    Ok(())
}

fn apply_list_args(tracker: &mut Tracker, args: ListArgs) -> AppResult<()> {
    if args.query.is_some() || args.by.is_some() {
        let text = args
            .query
            .unwrap_or_else(|| tracker.facets().query_text.clone());
        let field = args.by.map(QueryField::from).unwrap_or(tracker.facets().query_field);
        tracker.set_query(text, field);
    }
    if !args.statuses.is_empty() {
        let labels = args.statuses.iter().map(|label| status_label(label));
        tracker.set_facet(Facet::Status, FacetValues::from_labels(labels))?;
    }
    if !args.chapters.is_empty() {
        let labels = args.chapters.iter().map(|label| chapter_label(label));
        tracker.set_facet(Facet::Chapter, FacetValues::from_labels(labels))?;
    }
    if !args.characters.is_empty() {
        tracker.set_facet(Facet::Category, FacetValues::from_labels(args.characters))?;
    }
    Ok(())
}

fn status_label(label: &str) -> String {
    if label.eq_ignore_ascii_case(ALL) {
        return ALL.to_string();
    }
    label
        .parse::<Status>()
        .map(|status| status.as_str().to_string())
        .unwrap_or_else(|_| label.to_string())
}

fn chapter_label(label: &str) -> String {
    let trimmed = label.trim();
    if trimmed.eq_ignore_ascii_case(ALL) {
        ALL.to_string()
    } else if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") || trimmed.eq_ignore_ascii_case("(none)") {
        NO_CHAPTER.to_string()
    } else {
        label.to_string()
    }
}

fn print_view<W: Write>(tracker: &Tracker, printer: &TablePrinter, out: &mut W) -> AppResult<()> {
    write!(out, "{}", printer.render_view(tracker))?;
    for advisory in tracker.advisories() {
        writeln!(out, "note: {}", advisory)?;
    }
    writeln!(
        out,
        "{}: {} of {} entries",
        tracker.schema().label,
        tracker.view().len(),
        tracker.records().len()
    )?;
    Ok(())
}

fn print_record<W: Write>(tracker: &Tracker, record: &Record, out: &mut W) -> AppResult<()> {
    for field in tracker.columns() {
        writeln!(out, "{:<15} {}", format!("{}:", field.heading()), record.field_text(field))?;
    }
    for (key, value) in &record.extra {
        writeln!(out, "{:<15} {}", format!("{}:", key), value)?;
    }
    Ok(())
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list_with_repeated_facets() {
        let cli = Cli::try_parse_from([
            "substory-tracker",
            "--data-dir",
            "/tmp/tracker",
            "list",
            "--status",
            "done",
            "--status",
            "in-progress",
            "--chapter",
            "chapter 10",
            "--by",
            "description",
        ])
        .expect("parse");
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/tracker")));
        let Command::List(args) = cli.command else {
            panic!("expected list command");
        };
        assert_eq!(args.statuses, vec!["done", "in-progress"]);
        assert_eq!(args.by, Some(QueryFieldArg::Description));
        assert_eq!(status_label("done"), "Completed");
        assert_eq!(status_label("all"), "All");
        assert_eq!(chapter_label("none"), "");
        assert_eq!(chapter_label("(None)"), "");
        assert_eq!(chapter_label("chapter 10"), "chapter 10");
    }

    #[test]
    fn parses_status_values_leniently() {
        let cli = Cli::try_parse_from(["substory-tracker", "set-status", "not-completed", "3", "7"])
            .expect("parse");
        match cli.command {
            Command::SetStatus { status, ids } => {
                assert_eq!(status, Status::NotCompleted);
                assert_eq!(ids, vec![3, 7]);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Cli::try_parse_from(["substory-tracker", "set-status", "finished", "1"]).is_err());
        assert!(Cli::try_parse_from(["substory-tracker", "set-status", "Completed"]).is_err());
    }

    #[test]
    fn printer_colours_follow_palette() {
        let mut printer = TablePrinter::new(true);
        crate::theme::apply_theme(true, &mut [&mut printer]);
        let painted = printer.paint("x", true);
        assert!(painted.starts_with("\x1b[38;2;255;255;255m"));
        assert!(painted.contains("\x1b[48;2;51;51;51m"));

        let plain = TablePrinter::new(false);
        assert_eq!(plain.paint("x", true), "x");
    }

    #[test]
    fn startup_fallback_is_reported() {
        use crate::session::TomlSessionStore;
        use crate::store::JsonFileStore;

        let root = tempfile::tempdir().expect("temp root");
        std::fs::write(root.path().join("substories.json"), r#"[{"id": 1, "title": "a", "status": "Completed"}]"#)
            .expect("write dataset");
        let session_path = root.path().join("config.toml");
        std::fs::write(&session_path, "[FILTERS]\njson_file = \"Yakuza 4\"\n").expect("write session");
        let tracker = Tracker::open(
            DatasetRegistry::builtin(),
            Box::new(JsonFileStore::new(root.path())),
            Box::new(TomlSessionStore::new(&session_path)),
        )
        .expect("open");

        let mut out = Vec::new();
        report_startup(&tracker, &mut out).expect("report");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("warning: Could not open 'Yakuza 4'"));
        assert!(text.contains("opened 'Yakuza 3' instead"));
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let record = Record::new(1, "Title", Status::Completed).with_description("x".repeat(80));
        assert_eq!(cell(&record, Field::Description).chars().count(), DESCRIPTION_WIDTH);
        assert_eq!(cell(&record, Field::Title), "Title");
    }
}
