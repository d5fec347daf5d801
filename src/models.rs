use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub const ALL: &str = "All";

// Chapter facet label for records without an `available from` value.
pub const NO_CHAPTER: &str = "";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "Not Completed", alias = "NotCompleted")]
    NotCompleted,
    #[serde(rename = "In Progress", alias = "InProgress")]
    InProgress,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "Completed",
            Self::NotCompleted => "Not Completed",
            Self::InProgress => "In Progress",
        }
    }

    pub fn from_completed_flag(completed: bool) -> Self {
        if completed {
            Self::Completed
        } else {
            Self::NotCompleted
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .chars()
            .filter(|ch| !ch.is_whitespace() && *ch != '-' && *ch != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "completed" | "done" => Ok(Self::Completed),
            "notcompleted" | "todo" => Ok(Self::NotCompleted),
            "inprogress" => Ok(Self::InProgress),
            _ => Err(format!("unknown status '{}'", value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    Title,
    Description,
    Category,
    AvailableFrom,
    Status,
}

impl Field {
    pub fn heading(self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::Title => "Title",
            Self::Description => "Description",
            Self::Category => "Character",
            Self::AvailableFrom => "Available From",
            Self::Status => "Status",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: Status,
    pub available_from: Option<String>,
    pub category: Option<String>,
    // Stored `status` text when it is an accepted alias such as `NotCompleted`.
    pub status_spelling: Option<String>,
    // Keys not interpreted here, kept so a load/save cycle is lossless.
    pub extra: Map<String, Value>,
}

impl Record {
    pub fn new(id: i64, title: impl Into<String>, status: Status) -> Self {
        Self {
            id,
            title: title.into(),
            description: String::new(),
            status,
            available_from: None,
            category: None,
            status_spelling: None,
            extra: Map::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_available_from(mut self, chapter: impl Into<String>) -> Self {
        self.available_from = Some(chapter.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn chapter(&self) -> &str {
        self.available_from.as_deref().unwrap_or("")
    }

    pub fn category_text(&self) -> &str {
        self.category.as_deref().unwrap_or("")
    }

    pub fn field_text(&self, field: Field) -> String {
        match field {
            Field::Id => self.id.to_string(),
            Field::Title => self.title.clone(),
            Field::Description => self.description.clone(),
            Field::Category => self.category_text().to_string(),
            Field::AvailableFrom => self.chapter().to_string(),
            Field::Status => self.status.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryField {
    Id,
    #[default]
    Title,
    Description,
}

impl QueryField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::Title => "Title",
            Self::Description => "Description",
        }
    }

    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "id" => Self::Id,
            "description" => Self::Description,
            _ => Self::Title,
        }
    }

    pub fn field(self) -> Field {
        match self {
            Self::Id => Field::Id,
            Self::Title => Field::Title,
            Self::Description => Field::Description,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facet {
    Status,
    Chapter,
    Category,
}

impl Facet {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Chapter => "chapter",
            Self::Category => "category",
        }
    }
}

// An empty selection and one containing `All` both mean no narrowing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacetValues(Vec<String>);

impl FacetValues {
    pub fn all() -> Self {
        Self(vec![ALL.to_string()])
    }

    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values = Self::default();
        for label in labels {
            values.insert(label.into());
        }
        values
    }

    pub fn is_unrestricted(&self) -> bool {
        self.0.is_empty() || self.contains(ALL)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|value| value == label)
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, label: String) {
        if !self.contains(&label) {
            self.0.push(label);
        }
    }

    pub fn toggle(&mut self, label: &str) -> bool {
        if let Some(position) = self.0.iter().position(|value| value == label) {
            self.0.remove(position);
            false
        } else {
            self.0.push(label.to_string());
            true
        }
    }

    pub fn retain(&mut self, keep: impl FnMut(&String) -> bool) {
        self.0.retain(keep);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetSelection {
    pub query_text: String,
    pub query_field: QueryField,
    pub statuses: FacetValues,
    pub chapters: FacetValues,
    pub categories: FacetValues,
}

impl Default for FacetSelection {
    fn default() -> Self {
        Self {
            query_text: String::new(),
            query_field: QueryField::Title,
            statuses: FacetValues::all(),
            chapters: FacetValues::all(),
            categories: FacetValues::all(),
        }
    }
}

impl FacetSelection {
    pub fn values(&self, facet: Facet) -> &FacetValues {
        match facet {
            Facet::Status => &self.statuses,
            Facet::Chapter => &self.chapters,
            Facet::Category => &self.categories,
        }
    }

    pub fn values_mut(&mut self, facet: Facet) -> &mut FacetValues {
        match facet {
            Facet::Status => &mut self.statuses,
            Facet::Chapter => &mut self.chapters,
            Facet::Category => &mut self.categories,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGeometry {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowGeometry {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
        }
    }
}

pub const DEFAULT_FONT_SIZE: u16 = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub dataset: String,
    pub facets: FacetSelection,
    pub window: WindowGeometry,
    pub dark_mode: bool,
    pub font_size: u16,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            dataset: crate::schema::DEFAULT_DATASET.to_string(),
            facets: FacetSelection::default(),
            window: WindowGeometry::default(),
            dark_mode: false,
            font_size: DEFAULT_FONT_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    CheckpointReached { chapter: String },
    NoMatches,
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CheckpointReached { chapter } => write!(
                f,
                "{} reached: check entries started earlier, some can only be completed from now on",
                chapter
            ),
            Self::NoMatches => f.write_str("no entries match the current filters"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels_parse_leniently() {
        assert_eq!("Not Completed".parse::<Status>(), Ok(Status::NotCompleted));
        assert_eq!("in-progress".parse::<Status>(), Ok(Status::InProgress));
        assert_eq!("COMPLETED".parse::<Status>(), Ok(Status::Completed));
        assert!("finished".parse::<Status>().is_err());
    }

    #[test]
    fn facet_values_treat_empty_as_unrestricted() {
        assert!(FacetValues::default().is_unrestricted());
        assert!(FacetValues::all().is_unrestricted());
        let mut values = FacetValues::from_labels(["chapter 3"]);
        assert!(!values.is_unrestricted());
        assert!(!values.toggle("chapter 3"));
        assert!(values.is_unrestricted());
    }

    #[test]
    fn absent_optional_fields_read_as_empty() {
        let record = Record::new(4, "Bad Business", Status::InProgress);
        assert_eq!(record.field_text(Field::AvailableFrom), "");
        assert_eq!(record.field_text(Field::Category), "");
        assert_eq!(record.field_text(Field::Id), "4");
        assert_eq!(record.field_text(Field::Status), "In Progress");
    }
}
