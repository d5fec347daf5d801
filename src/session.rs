use crate::errors::AppResult;
use crate::models::{Facet, FacetSelection, FacetValues, QueryField, SessionState, WindowGeometry};
use crate::schema::DatasetSchema;
use crate::store::write_atomically;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use toml::{Table, Value};

const LEGACY_FILE: &str = "config.ini";

pub trait SessionStore: Send + Sync {
    fn load(&self) -> SessionState;

    fn save(&self, state: &SessionState) -> AppResult<()>;
}

#[derive(Debug, Clone)]
pub struct TomlSessionStore {
    path: PathBuf,
}

impl TomlSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for TomlSessionStore {
    fn load(&self) -> SessionState {
        match fs::read_to_string(&self.path) {
            Ok(content) => parse_session(&content),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                let legacy = self.path.with_file_name(LEGACY_FILE);
                match fs::read_to_string(&legacy) {
                    Ok(content) => {
                        tracing::info!(path = %legacy.display(), "restoring session from legacy file");
                        parse_session(&content)
                    }
                    Err(_) => SessionState::default(),
                }
            }
            Err(error) => {
                tracing::warn!(path = %self.path.display(), error = %error, "session unreadable; using defaults");
                SessionState::default()
            }
        }
    }

    fn save(&self, state: &SessionState) -> AppResult<()> {
        let content = render_session(state)?;
        write_atomically(&self.path, content.as_bytes())?;
        tracing::debug!(path = %self.path.display(), "saved session");
        Ok(())
    }
}

#[derive(Serialize)]
struct SessionFile<'a> {
    #[serde(rename = "FILTERS")]
    filters: FiltersSection<'a>,
    #[serde(rename = "WINDOW")]
    window: WindowSection,
    #[serde(rename = "THEME")]
    theme: ThemeSection,
}

#[derive(Serialize)]
struct FiltersSection<'a> {
    query: &'a str,
    filter_by: &'static str,
    status_filter: &'a [String],
    chapter_filter: &'a [String],
    character_filter: &'a [String],
    json_file: &'a str,
}

#[derive(Serialize)]
struct WindowSection {
    width: u32,
    height: u32,
    font_size: u16,
}

#[derive(Serialize)]
struct ThemeSection {
    dark_mode: bool,
}

pub fn render_session(state: &SessionState) -> AppResult<String> {
    let file = SessionFile {
        filters: FiltersSection {
            query: &state.facets.query_text,
            filter_by: state.facets.query_field.as_str(),
            status_filter: state.facets.statuses.labels(),
            chapter_filter: state.facets.chapters.labels(),
            character_filter: state.facets.categories.labels(),
            json_file: &state.dataset,
        },
        window: WindowSection {
            width: state.window.width,
            height: state.window.height,
            font_size: state.font_size,
        },
        theme: ThemeSection {
            dark_mode: state.dark_mode,
        },
    };
    Ok(toml::to_string(&file)?)
}

// Accepts TOML, then the INI layout older releases wrote.
pub fn parse_session(content: &str) -> SessionState {
    let mut state = SessionState::default();
    let table: Table = match toml::from_str(content) {
        Ok(table) => table,
        Err(error) => match parse_ini(content) {
            Some(table) => table,
            None => {
                tracing::warn!(error = %error, "session file is neither TOML nor INI; using defaults");
                return state;
            }
        },
    };

    if let Some(filters) = section(&table, "FILTERS") {
        if let Some(query) = text(filters, "query") {
            state.facets.query_text = query;
        }
        if let Some(filter_by) = text(filters, "filter_by") {
            state.facets.query_field = QueryField::parse_lenient(&filter_by);
        }
        if let Some(labels) = labels(filters, "status_filter") {
            state.facets.statuses = FacetValues::from_labels(labels);
        }
        if let Some(labels) = labels(filters, "chapter_filter") {
            state.facets.chapters = FacetValues::from_labels(labels);
        }
        if let Some(labels) = labels(filters, "character_filter") {
            state.facets.categories = FacetValues::from_labels(labels);
        }
        if let Some(dataset) = text(filters, "json_file").filter(|value| !value.trim().is_empty()) {
            state.dataset = dataset;
        }
    }

    if let Some(window) = section(&table, "WINDOW") {
        let defaults = WindowGeometry::default();
        state.window = WindowGeometry {
            width: number(window, "width").filter(|width| *width > 0).unwrap_or(defaults.width),
            height: number(window, "height").filter(|height| *height > 0).unwrap_or(defaults.height),
        };
        if let Some(font_size) = number(window, "font_size").filter(|size| *size > 0) {
            state.font_size = font_size;
        }
    }

    if let Some(theme) = section(&table, "THEME") {
        state.dark_mode = boolean(theme, "dark_mode").unwrap_or(false);
    }

    state
}

pub fn restore_facets(saved: &FacetSelection, schema: &DatasetSchema) -> FacetSelection {
    let mut restored = saved.clone();
    for facet in [Facet::Status, Facet::Chapter, Facet::Category] {
        let values = restored.values_mut(facet);
        if !schema.has_facet(facet) {
            *values = FacetValues::all();
            continue;
        }
        let options = schema.facet_options(facet);
        let before = values.labels().len();
        values.retain(|label| options.contains(label));
        let dropped = before - values.labels().len();
        if dropped > 0 {
            tracing::debug!(facet = facet.as_str(), dataset = %schema.id, dropped, "ignored stale facet labels");
        }
    }
    restored
}

// `[SECTION]` headers with `key = value` or `key: value` lines; every value is text.
fn parse_ini(content: &str) -> Option<Table> {
    let mut table = Table::new();
    let mut current: Option<String> = None;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            let name = name.trim().to_string();
            table
                .entry(name.clone())
                .or_insert_with(|| Value::Table(Table::new()));
            current = Some(name);
            continue;
        }
        let split = line.find(['=', ':'])?;
        let key = line[..split].trim().to_ascii_lowercase();
        let value = line[split + 1..].trim().to_string();
        let section = table.get_mut(current.as_deref()?)?.as_table_mut()?;
        section.insert(key, Value::String(value));
    }
    if table.is_empty() {
        None
    } else {
        Some(table)
    }
}

fn section<'a>(table: &'a Table, name: &str) -> Option<&'a Table> {
    table
        .get(name)
        .or_else(|| table.get(&name.to_ascii_lowercase()))
        .and_then(Value::as_table)
}

fn text(section: &Table, key: &str) -> Option<String> {
    match section.get(key)? {
        Value::String(value) => Some(value.clone()),
        Value::Integer(value) => Some(value.to_string()),
        Value::Float(value) => Some(value.to_string()),
        Value::Boolean(value) => Some(value.to_string()),
        _ => None,
    }
}

fn labels(section: &Table, key: &str) -> Option<Vec<String>> {
    match section.get(key)? {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| item.as_str().map(ToString::to_string))
                .collect(),
        ),
        Value::String(joined) if joined.is_empty() => Some(Vec::new()),
        Value::String(joined) => Some(joined.split(',').map(|label| label.trim().to_string()).collect()),
        _ => None,
    }
}

fn number<T: TryFrom<i64>>(section: &Table, key: &str) -> Option<T> {
    let raw = match section.get(key)? {
        Value::Integer(value) => *value,
        Value::Float(value) => *value as i64,
        Value::String(value) => value.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    T::try_from(raw).ok()
}

fn boolean(section: &Table, key: &str) -> Option<bool> {
    match section.get(key)? {
        Value::Boolean(value) => Some(*value),
        Value::Integer(value) => Some(*value != 0),
        Value::String(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "yes" | "true" | "on" => Some(true),
            "0" | "no" | "false" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
