use crate::errors::{AppError, AppResult};
use crate::models::{Facet, Field, Status, ALL, NO_CHAPTER};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

pub const DEFAULT_DATASET: &str = "yakuza3";

const TASK_STATUSES: &[Status] = &[Status::Completed, Status::NotCompleted, Status::InProgress];
const DISCLOSURE_STATUSES: &[Status] = &[Status::Completed, Status::NotCompleted];
const Y4_CHARACTERS: &[&str] = &["Akiyama", "Saejima", "Tanimura", "Kiryu"];

static BUILTIN: Lazy<DatasetRegistry> = Lazy::new(|| DatasetRegistry {
    datasets: vec![
        DatasetSchema {
            id: "yakuza3".to_string(),
            label: "Yakuza 3".to_string(),
            kind: DatasetKind::Task,
            file: "substories.json".to_string(),
            statuses: TASK_STATUSES.to_vec(),
            chapters: [
                "chapter 3",
                "chapter 4",
                "chapter 5",
                "chapter 6",
                "chapter 7",
                "chapter 9",
                "chapter 10",
                "chapter 12",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            categories: Vec::new(),
            category_key: None,
            checkpoint: Some("chapter 10".to_string()),
            companion: Some("yakuza3-revelations".to_string()),
        },
        DatasetSchema {
            id: "yakuza4".to_string(),
            label: "Yakuza 4".to_string(),
            kind: DatasetKind::Task,
            file: "y4subst.json".to_string(),
            statuses: TASK_STATUSES.to_vec(),
            chapters: ["chapter 2", "chapter 3", "chapter 4", "finale"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            categories: Y4_CHARACTERS.iter().map(ToString::to_string).collect(),
            category_key: Some("character".to_string()),
            checkpoint: None,
            companion: Some("yakuza4-revelations".to_string()),
        },
        DatasetSchema {
            id: "yakuza3-revelations".to_string(),
            label: "Yakuza 3 Revelations".to_string(),
            kind: DatasetKind::Disclosure,
            file: "revelations.json".to_string(),
            statuses: DISCLOSURE_STATUSES.to_vec(),
            chapters: Vec::new(),
            categories: Vec::new(),
            category_key: None,
            checkpoint: None,
            companion: None,
        },
        DatasetSchema {
            id: "yakuza4-revelations".to_string(),
            label: "Yakuza 4 Revelations".to_string(),
            kind: DatasetKind::Disclosure,
            file: "Y4_Revelations.json".to_string(),
            statuses: DISCLOSURE_STATUSES.to_vec(),
            chapters: Vec::new(),
            categories: Y4_CHARACTERS.iter().map(ToString::to_string).collect(),
            category_key: Some("character".to_string()),
            checkpoint: None,
            companion: None,
        },
    ],
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatasetKind {
    Task,
    Disclosure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSchema {
    pub id: String,
    pub label: String,
    pub kind: DatasetKind,
    pub file: String,
    pub statuses: Vec<Status>,
    #[serde(default)]
    pub chapters: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub category_key: Option<String>,
    #[serde(default)]
    pub checkpoint: Option<String>,
    #[serde(default)]
    pub companion: Option<String>,
}

impl DatasetSchema {
    pub fn has_field(&self, field: Field) -> bool {
        match field {
            Field::Category => self.category_key.is_some(),
            Field::AvailableFrom => self.kind == DatasetKind::Task,
            Field::Id | Field::Title | Field::Description | Field::Status => true,
        }
    }

    pub fn columns(&self) -> Vec<Field> {
        [
            Field::Id,
            Field::Title,
            Field::Description,
            Field::Category,
            Field::AvailableFrom,
            Field::Status,
        ]
        .into_iter()
        .filter(|field| self.has_field(*field))
        .collect()
    }

    pub fn column_index(&self, field: Field) -> Option<usize> {
        self.columns().iter().position(|column| *column == field)
    }

    pub fn has_facet(&self, facet: Facet) -> bool {
        match facet {
            Facet::Status => true,
            Facet::Chapter => self.has_field(Field::AvailableFrom),
            Facet::Category => self.has_field(Field::Category),
        }
    }

    pub fn facet_values(&self, facet: Facet) -> Vec<String> {
        if !self.has_facet(facet) {
            return Vec::new();
        }
        match facet {
            Facet::Status => self.statuses.iter().map(|status| status.as_str().to_string()).collect(),
            Facet::Chapter => self.chapters.clone(),
            Facet::Category => self.categories.clone(),
        }
    }

    pub fn facet_options(&self, facet: Facet) -> Vec<String> {
        if !self.has_facet(facet) {
            return Vec::new();
        }
        let mut options = vec![ALL.to_string()];
        options.extend(self.facet_values(facet));
        if facet == Facet::Chapter && !options.iter().any(|option| option == NO_CHAPTER) {
            options.push(NO_CHAPTER.to_string());
        }
        options
    }

    pub fn allows_status(&self, status: Status) -> bool {
        self.statuses.contains(&status)
    }

    pub fn is_checkpoint(&self, chapter: &str) -> bool {
        self.checkpoint.as_deref() == Some(chapter)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRegistry {
    #[serde(rename = "dataset")]
    datasets: Vec<DatasetSchema>,
}

impl DatasetRegistry {
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    pub fn new(datasets: Vec<DatasetSchema>) -> AppResult<Self> {
        let registry = Self { datasets };
        registry.validate()?;
        Ok(registry)
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let registry: Self = toml::from_str(content)?;
        registry.validate()?;
        Ok(registry)
    }

    pub fn load_or_builtin(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Ok(Self::builtin());
        }
        let content = fs::read_to_string(path).map_err(|error| AppError::Io(error.to_string()))?;
        let registry = Self::from_toml_str(&content)?;
        tracing::info!(path = %path.display(), count = registry.datasets.len(), "loaded dataset registry");
        Ok(registry)
    }

    pub fn datasets(&self) -> &[DatasetSchema] {
        &self.datasets
    }

    pub fn schema_for(&self, dataset_id: &str) -> AppResult<&DatasetSchema> {
        self.datasets
            .iter()
            .find(|schema| schema.id == dataset_id)
            .ok_or_else(|| AppError::NotFound(format!("Dataset '{}' is not registered", dataset_id)))
    }

    // Id first, then display label (session files store labels).
    pub fn resolve(&self, id_or_label: &str) -> Option<&DatasetSchema> {
        let needle = id_or_label.trim();
        self.datasets
            .iter()
            .find(|schema| schema.id == needle)
            .or_else(|| {
                self.datasets
                    .iter()
                    .find(|schema| schema.label.eq_ignore_ascii_case(needle))
            })
    }

    pub fn default_schema(&self) -> &DatasetSchema {
        self.resolve(DEFAULT_DATASET).unwrap_or(&self.datasets[0])
    }

    fn validate(&self) -> AppResult<()> {
        if self.datasets.is_empty() {
            return Err(AppError::Validation("Dataset registry is empty".to_string()));
        }

        let mut ids = HashSet::new();
        for schema in &self.datasets {
            if !ids.insert(schema.id.as_str()) {
                return Err(AppError::Validation(format!("Duplicate dataset id '{}'", schema.id)));
            }
            if schema.statuses.is_empty() {
                return Err(AppError::Validation(format!(
                    "Dataset '{}' declares no statuses",
                    schema.id
                )));
            }
            if let Some(checkpoint) = schema.checkpoint.as_ref() {
                if !schema.chapters.contains(checkpoint) {
                    return Err(AppError::Validation(format!(
                        "Dataset '{}' checkpoint '{}' is not one of its chapters",
                        schema.id, checkpoint
                    )));
                }
            }
        }

        for schema in &self.datasets {
            if let Some(companion) = schema.companion.as_ref() {
                if !ids.contains(companion.as_str()) {
                    return Err(AppError::Validation(format!(
                        "Dataset '{}' names unknown companion '{}'",
                        schema.id, companion
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_is_consistent() {
        let registry = DatasetRegistry::builtin();
        registry.validate().expect("builtin registry valid");
        assert_eq!(registry.default_schema().id, DEFAULT_DATASET);
        assert_eq!(registry.resolve("Yakuza 4").map(|s| s.id.as_str()), Some("yakuza4"));
        assert!(registry.schema_for("yakuza5").is_err());
    }

    #[test]
    fn columns_follow_schema_fields() {
        let registry = DatasetRegistry::builtin();
        let y3 = registry.schema_for("yakuza3").expect("y3");
        assert_eq!(
            y3.columns(),
            vec![Field::Id, Field::Title, Field::Description, Field::AvailableFrom, Field::Status]
        );
        let y4 = registry.schema_for("yakuza4").expect("y4");
        assert_eq!(y4.column_index(Field::Category), Some(3));
        let revelations = registry.schema_for("yakuza3-revelations").expect("revelations");
        assert_eq!(
            revelations.columns(),
            vec![Field::Id, Field::Title, Field::Description, Field::Status]
        );
        assert!(revelations.facet_options(Facet::Chapter).is_empty());
        let chapters = y3.facet_options(Facet::Chapter);
        assert_eq!(chapters.first().map(String::as_str), Some("All"));
        assert_eq!(chapters.last().map(String::as_str), Some(""));
        assert_eq!(
            revelations.facet_options(Facet::Status),
            vec!["All", "Completed", "Not Completed"]
        );
    }

    #[test]
    fn registry_file_is_validated() {
        let content = r#"
            [[dataset]]
            id = "custom"
            label = "Custom"
            kind = "task"
            file = "custom.json"
            statuses = ["Completed", "In Progress"]
            chapters = ["act 1", "act 2"]
            checkpoint = "act 2"
        "#;
        let registry = DatasetRegistry::from_toml_str(content).expect("registry parses");
        let schema = registry.schema_for("custom").expect("custom schema");
        assert!(schema.is_checkpoint("act 2"));
        assert!(!schema.allows_status(Status::NotCompleted));

        let broken = content.replace("checkpoint = \"act 2\"", "checkpoint = \"act 9\"");
        let error = DatasetRegistry::from_toml_str(&broken).expect_err("checkpoint must be a chapter");
        assert!(error.to_string().contains("VALIDATION"));
    }
}
