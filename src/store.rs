use crate::errors::{AppError, AppResult};
use crate::models::{Record, Status};
use crate::schema::DatasetSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub trait RecordStore: Send + Sync {
    fn load(&self, schema: &DatasetSchema) -> AppResult<LoadedCollection>;

    fn save(&self, schema: &DatasetSchema, records: &[Record]) -> AppResult<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedCollection {
    pub records: Vec<Record>,
    pub migrated: usize,
}

// Field names must round-trip exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "available from", default, skip_serializing_if = "Option::is_none")]
    available_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed: Option<bool>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

pub fn decode_records(schema: &DatasetSchema, bytes: &[u8]) -> AppResult<LoadedCollection> {
    let stored: Vec<StoredRecord> = serde_json::from_slice(bytes)
        .map_err(|error| AppError::Parse(format!("Dataset '{}': {}", schema.id, error)))?;

    let mut migrated = 0usize;
    let mut records = Vec::with_capacity(stored.len());
    for entry in stored {
        let StoredRecord {
            id,
            title,
            description,
            available_from,
            status,
            completed,
            mut extra,
        } = entry;

        let status_spelling = status.as_deref().filter(|text| is_alias(text)).map(str::to_string);
        let status = match status.as_deref() {
            Some(text) => Some(stored_status(text).ok_or_else(|| {
                AppError::Parse(format!(
                    "Dataset '{}': record {} has unknown status '{}'",
                    schema.id, id, text
                ))
            })?),
            None => None,
        };
        let status = match (status, completed) {
            (Some(status), None) => status,
            (Some(status), Some(_)) => {
                migrated += 1;
                status
            }
            (None, Some(flag)) => {
                migrated += 1;
                Status::from_completed_flag(flag)
            }
            (None, None) => {
                return Err(AppError::Parse(format!(
                    "Dataset '{}': record {} has neither 'status' nor 'completed'",
                    schema.id, id
                )));
            }
        };

        // A null category stays in `extra` so it is written back as null.
        let category = match schema.category_key.as_deref() {
            Some(key) => match extra.remove(key) {
                Some(Value::String(value)) => Some(value),
                Some(Value::Null) => {
                    extra.insert(key.to_string(), Value::Null);
                    None
                }
                None => None,
                Some(other) => {
                    return Err(AppError::Parse(format!(
                        "Dataset '{}': record {} has non-text '{}' value {}",
                        schema.id, id, key, other
                    )));
                }
            },
            None => None,
        };

        records.push(Record {
            id,
            title,
            description,
            status,
            available_from,
            category,
            status_spelling,
            extra,
        });
    }

    Ok(LoadedCollection { records, migrated })
}

const STATUS_ALIASES: [(&str, Status); 2] = [("NotCompleted", Status::NotCompleted), ("InProgress", Status::InProgress)];

fn stored_status(text: &str) -> Option<Status> {
    [Status::Completed, Status::NotCompleted, Status::InProgress]
        .into_iter()
        .find(|status| status.as_str() == text)
        .or_else(|| STATUS_ALIASES.iter().find(|(alias, _)| *alias == text).map(|(_, status)| *status))
}

fn is_alias(text: &str) -> bool {
    STATUS_ALIASES.iter().any(|(alias, _)| *alias == text)
}

// An alias is only kept while it still names the record's status.
fn status_text(record: &Record) -> String {
    match record.status_spelling.as_deref() {
        Some(spelling) if stored_status(spelling) == Some(record.status) => spelling.to_string(),
        _ => record.status.as_str().to_string(),
    }
}

pub fn encode_records(schema: &DatasetSchema, records: &[Record]) -> AppResult<Vec<u8>> {
    let stored: Vec<StoredRecord> = records
        .iter()
        .map(|record| {
            let mut extra = record.extra.clone();
            if let (Some(key), Some(category)) = (schema.category_key.as_deref(), record.category.as_ref()) {
                extra.insert(key.to_string(), Value::String(category.clone()));
            }
            StoredRecord {
                id: record.id,
                title: record.title.clone(),
                description: record.description.clone(),
                available_from: record.available_from.clone(),
                status: Some(status_text(record)),
                completed: None,
                extra,
            }
        })
        .collect();

    let mut bytes = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
    stored
        .serialize(&mut serializer)
        .map_err(|error| AppError::Internal(error.to_string()))?;
    Ok(bytes)
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dataset_path(&self, schema: &DatasetSchema) -> PathBuf {
        self.root.join(&schema.file)
    }
}

impl RecordStore for JsonFileStore {
    fn load(&self, schema: &DatasetSchema) -> AppResult<LoadedCollection> {
        let path = self.dataset_path(schema);
        let bytes = fs::read(&path).map_err(|error| match error.kind() {
            ErrorKind::NotFound => AppError::NotFound(format!(
                "Dataset '{}' file {} does not exist",
                schema.id,
                path.display()
            )),
            _ => AppError::Io(format!("{}: {}", path.display(), error)),
        })?;
        let loaded = decode_records(schema, &bytes)?;
        tracing::debug!(dataset = %schema.id, count = loaded.records.len(), "loaded dataset");
        Ok(loaded)
    }

    fn save(&self, schema: &DatasetSchema, records: &[Record]) -> AppResult<()> {
        let path = self.dataset_path(schema);
        let bytes = encode_records(schema, records)?;
        write_atomically(&path, &bytes)?;
        tracing::debug!(dataset = %schema.id, count = records.len(), "saved dataset");
        Ok(())
    }
}

pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|error| AppError::Io(error.to_string()))?;
        }
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    fs::write(&tmp_path, bytes).map_err(|error| AppError::Io(format!("{}: {}", tmp_path.display(), error)))?;
    fs::rename(&tmp_path, path).map_err(|error| {
        let _ = fs::remove_file(&tmp_path);
        AppError::Io(format!("{}: {}", path.display(), error))
    })
}
