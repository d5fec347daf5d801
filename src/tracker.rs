use crate::errors::{AppError, AppResult};
use crate::filter::filter_notify;
use crate::models::{
    Advisory, Facet, FacetSelection, FacetValues, Field, QueryField, Record, SessionState, Status, WindowGeometry,
    DEFAULT_FONT_SIZE,
};
use crate::schema::{DatasetRegistry, DatasetSchema};
use crate::selection::{self, Selection};
use crate::session::{restore_facets, SessionStore};
use crate::sort::{self, SortDirection, SortState};
use crate::store::RecordStore;
use crate::theme::Palette;

pub const MIN_FONT_SIZE: u16 = 6;
pub const MAX_FONT_SIZE: u16 = 48;
const FONT_STEP: u16 = 2;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordEdit {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub available_from: Option<String>,
    pub status: Option<Status>,
    pub category: Option<String>,
}

impl RecordEdit {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

// The view is always `filter(records, facets)` in collection order and the selection is a subset of it.
pub struct Tracker {
    registry: DatasetRegistry,
    store: Box<dyn RecordStore>,
    sessions: Box<dyn SessionStore>,
    schema: DatasetSchema,
    records: Vec<Record>,
    facets: FacetSelection,
    sort: SortState,
    selection: Selection,
    view: Vec<usize>,
    advisories: Vec<Advisory>,
    window: WindowGeometry,
    dark_mode: bool,
    font_size: u16,
    unsaved: bool,
    startup_warning: Option<String>,
}

impl Tracker {
    pub fn open(
        registry: DatasetRegistry,
        store: Box<dyn RecordStore>,
        sessions: Box<dyn SessionStore>,
    ) -> AppResult<Self> {
        let session = sessions.load();
        let default_schema = registry.default_schema().clone();
        let mut startup_warning = None;
        let requested = match registry.resolve(&session.dataset) {
            Some(schema) => schema.clone(),
            None => {
                tracing::warn!(dataset = %session.dataset, "session names an unknown dataset; using default");
                startup_warning = Some(format!(
                    "Last session used unknown dataset '{}'; opened '{}' instead",
                    session.dataset, default_schema.label
                ));
                default_schema.clone()
            }
        };

        let (schema, loaded) = match store.load(&requested) {
            Ok(loaded) => (requested, loaded),
            Err(error) if requested.id != default_schema.id => {
                tracing::warn!(dataset = %requested.id, error = %error, "failed to load session dataset; using default");
                startup_warning = Some(format!(
                    "Could not open '{}' ({}); opened '{}' instead",
                    requested.label, error, default_schema.label
                ));
                let loaded = store.load(&default_schema)?;
                (default_schema, loaded)
            }
            Err(error) => return Err(error),
        };

        let mut tracker = Self {
            facets: restore_facets(&session.facets, &schema),
            sort: SortState::new(schema.columns().len()),
            records: loaded.records,
            selection: Selection::default(),
            view: Vec::new(),
            advisories: Vec::new(),
            window: session.window,
            dark_mode: session.dark_mode,
            font_size: session.font_size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE),
            unsaved: false,
            startup_warning,
            schema,
            registry,
            store,
            sessions,
        };
        tracing::info!(dataset = %tracker.schema.id, count = tracker.records.len(), "opened dataset");
        tracker.write_back_migration(loaded.migrated);
        tracker.refresh();
        Ok(tracker)
    }

    pub fn select_dataset(&mut self, id_or_label: &str) -> AppResult<()> {
        let schema = self
            .registry
            .resolve(id_or_label)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Dataset '{}' is not registered", id_or_label)))?;
        // Unsaved edits must reach the store before their collection is replaced.
        self.retry_save()?;
        let loaded = self.store.load(&schema)?;

        self.facets = restore_facets(&self.facets, &schema);
        self.sort = SortState::new(schema.columns().len());
        self.selection.clear();
        self.records = loaded.records;
        self.schema = schema;
        self.unsaved = false;
        tracing::info!(dataset = %self.schema.id, count = self.records.len(), "switched dataset");

        self.write_back_migration(loaded.migrated);
        self.refresh();
        if let Err(error) = self.save_session() {
            tracing::warn!(error = %error, "failed to save session after dataset switch");
        }
        Ok(())
    }

    pub fn open_companion(&mut self) -> AppResult<()> {
        let companion = self.schema.companion.clone().ok_or_else(|| {
            AppError::Validation(format!("Dataset '{}' has no companion dataset", self.schema.id))
        })?;
        self.select_dataset(&companion)
    }

    pub fn set_query(&mut self, text: impl Into<String>, field: QueryField) {
        self.facets.query_text = text.into();
        self.facets.query_field = field;
        self.refresh();
    }

    pub fn set_facet(&mut self, facet: Facet, values: FacetValues) -> AppResult<()> {
        self.ensure_facet(facet)?;
        let options = self.schema.facet_options(facet);
        if let Some(unknown) = values.labels().iter().find(|label| !options.contains(label)) {
            return Err(AppError::Validation(format!(
                "'{}' is not a {} of dataset '{}'",
                unknown,
                facet.as_str(),
                self.schema.id
            )));
        }
        *self.facets.values_mut(facet) = values;
        self.refresh();
        Ok(())
    }

    pub fn toggle_facet_value(&mut self, facet: Facet, label: &str) -> AppResult<bool> {
        self.ensure_facet(facet)?;
        if !self.schema.facet_options(facet).iter().any(|option| option == label) {
            return Err(AppError::Validation(format!(
                "'{}' is not a {} of dataset '{}'",
                label,
                facet.as_str(),
                self.schema.id
            )));
        }
        let selected = self.facets.values_mut(facet).toggle(label);
        self.refresh();
        Ok(selected)
    }

    pub fn reset_filters(&mut self) {
        self.facets = FacetSelection::default();
        self.refresh();
    }

    pub fn sort_by(&mut self, column: usize) -> AppResult<SortDirection> {
        let columns = self.schema.columns();
        let direction = sort::sort_by(&mut self.records, &columns, column, &mut self.sort)?;
        tracing::debug!(dataset = %self.schema.id, column, direction = ?direction, "sorted collection");
        self.refresh();
        Ok(direction)
    }

    pub fn sort_by_field(&mut self, field: Field) -> AppResult<SortDirection> {
        let column = self.column_for(field)?;
        self.sort_by(column)
    }

    pub fn sort_with(&mut self, field: Field, direction: SortDirection) -> AppResult<()> {
        let column = self.column_for(field)?;
        self.sort.set_next(column, direction)?;
        self.sort_by(column).map(|_| ())
    }

    pub fn persist(&mut self) -> AppResult<()> {
        match self.store.save(&self.schema, &self.records) {
            Ok(()) => {
                self.unsaved = false;
                tracing::debug!(dataset = %self.schema.id, count = self.records.len(), "saved collection");
                Ok(())
            }
            Err(error) => {
                self.unsaved = true;
                tracing::warn!(dataset = %self.schema.id, error = %error, "failed to save collection");
                Err(error)
            }
        }
    }

    pub fn retry_save(&mut self) -> AppResult<()> {
        if !self.unsaved {
            return Ok(());
        }
        self.persist()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    // Set when the session's dataset could not be opened and the default was used.
    pub fn startup_warning(&self) -> Option<&str> {
        self.startup_warning.as_deref()
    }

    pub fn select_ids<I: IntoIterator<Item = i64>>(&mut self, ids: I) -> Vec<i64> {
        let displayed = self.view_ids();
        let mut hidden = Vec::new();
        let mut next = Selection::default();
        for id in ids {
            if displayed.contains(&id) {
                next.add(id);
            } else {
                hidden.push(id);
            }
        }
        self.selection = next;
        hidden
    }

    pub fn select(&mut self, id: i64) -> AppResult<()> {
        if !self.view_ids().contains(&id) {
            return Err(AppError::NotFound(format!("Record {} is not displayed", id)));
        }
        self.selection.add(id);
        Ok(())
    }

    pub fn deselect(&mut self, id: i64) {
        self.selection.remove(id);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // A save failure is returned after the in-memory change and refresh have been applied.
    pub fn set_status(&mut self, status: Status) -> AppResult<usize> {
        if !self.schema.allows_status(status) {
            return Err(AppError::Validation(format!(
                "Status '{}' is not valid for dataset '{}'",
                status, self.schema.id
            )));
        }
        if self.selection.is_empty() {
            return Ok(0);
        }

        let mut changed = 0usize;
        for record in self.records.iter_mut() {
            if self.selection.contains(record.id) && record.status != status {
                record.status = status;
                changed += 1;
            }
        }
        tracing::info!(dataset = %self.schema.id, status = %status, count = changed, "updated status");
        self.refresh();
        if changed > 0 {
            self.persist()?;
        }
        Ok(changed)
    }

    pub fn edit_record(&mut self, id: i64, edit: RecordEdit) -> AppResult<()> {
        let position = self
            .records
            .iter()
            .position(|record| record.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Record {} does not exist", id)))?;
        self.validate_edit(id, &edit)?;

        let new_id = edit.id.unwrap_or(id);
        let record = &mut self.records[position];
        record.id = new_id;
        if let Some(title) = edit.title {
            record.title = title;
        }
        if let Some(description) = edit.description {
            record.description = description;
        }
        if let Some(available_from) = edit.available_from {
            record.available_from = Some(available_from);
        }
        if let Some(status) = edit.status {
            record.status = status;
        }
        if let Some(category) = edit.category {
            record.category = Some(category);
        }

        self.selection.rename(id, new_id);
        if !self.selection.contains(new_id) {
            self.selection.add(new_id);
        }
        tracing::info!(dataset = %self.schema.id, id = new_id, previous_id = id, "edited record");
        self.refresh();
        self.persist()
    }

    pub fn set_dark_mode(&mut self, dark_mode: bool) -> AppResult<()> {
        self.dark_mode = dark_mode;
        self.save_session()
    }

    pub fn toggle_dark_mode(&mut self) -> AppResult<bool> {
        self.set_dark_mode(!self.dark_mode)?;
        Ok(self.dark_mode)
    }

    pub fn increase_font(&mut self) -> u16 {
        self.font_size = self.font_size.saturating_add(FONT_STEP).min(MAX_FONT_SIZE);
        self.font_size
    }

    pub fn decrease_font(&mut self) -> u16 {
        self.font_size = self.font_size.saturating_sub(FONT_STEP).max(MIN_FONT_SIZE);
        self.font_size
    }

    pub fn reset_font(&mut self) -> u16 {
        self.font_size = DEFAULT_FONT_SIZE;
        self.font_size
    }

    pub fn set_window(&mut self, window: WindowGeometry) {
        self.window = window;
    }

    pub fn session_state(&self) -> SessionState {
        SessionState {
            dataset: self.schema.label.clone(),
            facets: self.facets.clone(),
            window: self.window,
            dark_mode: self.dark_mode,
            font_size: self.font_size,
        }
    }

    pub fn save_session(&self) -> AppResult<()> {
        self.sessions.save(&self.session_state())
    }

    pub fn shutdown(mut self) -> AppResult<()> {
        let collection = self.retry_save();
        let session = self.save_session();
        collection.and(session)
    }

    pub fn snapshot(&self) -> (DatasetSchema, Vec<Record>) {
        (self.schema.clone(), self.records.clone())
    }

    pub fn registry(&self) -> &DatasetRegistry {
        &self.registry
    }

    pub fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    pub fn columns(&self) -> Vec<Field> {
        self.schema.columns()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn view(&self) -> Vec<&Record> {
        self.view.iter().filter_map(|&index| self.records.get(index)).collect()
    }

    pub fn view_ids(&self) -> Vec<i64> {
        self.view
            .iter()
            .filter_map(|&index| self.records.get(index).map(|record| record.id))
            .collect()
    }

    pub fn record(&self, id: i64) -> Option<&Record> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn facets(&self) -> &FacetSelection {
        &self.facets
    }

    pub fn advisories(&self) -> &[Advisory] {
        &self.advisories
    }

    pub fn sort_state(&self) -> &SortState {
        &self.sort
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn window(&self) -> WindowGeometry {
        self.window
    }

    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    pub fn palette(&self) -> &'static Palette {
        Palette::for_mode(self.dark_mode)
    }

    pub fn font_size(&self) -> u16 {
        self.font_size
    }

    fn refresh(&mut self) {
        let previous = &self.advisories;
        let dataset = self.schema.id.as_str();
        let mut log_new = |advisory: &Advisory| {
            if !previous.contains(advisory) {
                tracing::info!(dataset = %dataset, advisory = %advisory, "advisory raised");
            }
        };
        let outcome = filter_notify(&self.records, &self.facets, &self.schema, &mut log_new);
        self.view = outcome.positions;
        self.advisories = outcome.advisories;
        self.selection = selection::refresh(&self.view_ids(), &self.selection);
    }

    fn write_back_migration(&mut self, migrated: usize) {
        if migrated == 0 {
            return;
        }
        tracing::info!(dataset = %self.schema.id, count = migrated, "migrated legacy completed flags");
        if let Err(error) = self.persist() {
            tracing::warn!(dataset = %self.schema.id, error = %error, "migration write-back deferred");
        }
    }

    fn column_for(&self, field: Field) -> AppResult<usize> {
        self.schema.column_index(field).ok_or_else(|| {
            AppError::Validation(format!(
                "Dataset '{}' has no '{}' column",
                self.schema.id,
                field.heading()
            ))
        })
    }

    fn ensure_facet(&self, facet: Facet) -> AppResult<()> {
        if self.schema.has_facet(facet) {
            Ok(())
        } else {
            Err(AppError::Validation(format!(
                "Dataset '{}' has no {} filter",
                self.schema.id,
                facet.as_str()
            )))
        }
    }

    fn validate_edit(&self, id: i64, edit: &RecordEdit) -> AppResult<()> {
        if let Some(new_id) = edit.id.filter(|new_id| *new_id != id) {
            if self.records.iter().any(|record| record.id == new_id) {
                return Err(AppError::Validation(format!("Record id {} is already in use", new_id)));
            }
        }
        if let Some(status) = edit.status {
            if !self.schema.allows_status(status) {
                return Err(AppError::Validation(format!(
                    "Status '{}' is not valid for dataset '{}'",
                    status, self.schema.id
                )));
            }
        }
        if edit.available_from.is_some() && !self.schema.has_field(Field::AvailableFrom) {
            return Err(AppError::Validation(format!(
                "Dataset '{}' has no '{}' field",
                self.schema.id,
                Field::AvailableFrom.heading()
            )));
        }
        if edit.category.is_some() && !self.schema.has_field(Field::Category) {
            return Err(AppError::Validation(format!(
                "Dataset '{}' has no '{}' field",
                self.schema.id,
                Field::Category.heading()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LoadedCollection;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MemoryStore {
        datasets: Arc<Mutex<HashMap<String, Vec<Record>>>>,
        migrated: Arc<AtomicUsize>,
        fail_saves: Arc<AtomicBool>,
        saves: Arc<AtomicUsize>,
    }

    impl MemoryStore {
        fn with(self, dataset: &str, records: Vec<Record>) -> Self {
            self.datasets
                .lock()
                .expect("datasets lock")
                .insert(dataset.to_string(), records);
            self
        }

        fn stored(&self, dataset: &str) -> Vec<Record> {
            self.datasets
                .lock()
                .expect("datasets lock")
                .get(dataset)
                .cloned()
                .unwrap_or_default()
        }
    }

    impl RecordStore for MemoryStore {
        fn load(&self, schema: &DatasetSchema) -> AppResult<LoadedCollection> {
            let records = self
                .datasets
                .lock()
                .expect("datasets lock")
                .get(&schema.id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(schema.file.clone()))?;
            Ok(LoadedCollection {
                records,
                migrated: self.migrated.swap(0, Ordering::SeqCst),
            })
        }

        fn save(&self, schema: &DatasetSchema, records: &[Record]) -> AppResult<()> {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(AppError::Io("read-only volume".to_string()));
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.datasets
                .lock()
                .expect("datasets lock")
                .insert(schema.id.clone(), records.to_vec());
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct MemorySessions {
        saved: Arc<Mutex<Option<SessionState>>>,
    }

    impl SessionStore for MemorySessions {
        fn load(&self) -> SessionState {
            self.saved.lock().expect("session lock").clone().unwrap_or_default()
        }

        fn save(&self, state: &SessionState) -> AppResult<()> {
            *self.saved.lock().expect("session lock") = Some(state.clone());
            Ok(())
        }
    }

    fn y3_records() -> Vec<Record> {
        vec![
            Record::new(1, "Bad Business", Status::Completed).with_available_from("chapter 3"),
            Record::new(2, "A Girl's Dream", Status::InProgress).with_available_from("chapter 4"),
            Record::new(3, "Mysterious Old Man", Status::NotCompleted).with_available_from("chapter 10"),
            Record::new(4, "Kamurocho Moneylender", Status::InProgress).with_available_from("chapter 10"),
        ]
    }

    fn y4_records() -> Vec<Record> {
        vec![
            Record::new(1, "Loan Shark", Status::NotCompleted)
                .with_available_from("chapter 2")
                .with_category("Akiyama"),
            Record::new(2, "Prison Break", Status::Completed)
                .with_available_from("chapter 3")
                .with_category("Saejima"),
        ]
    }

    fn open(store: &MemoryStore, sessions: &MemorySessions) -> Tracker {
        Tracker::open(
            DatasetRegistry::builtin(),
            Box::new(store.clone()),
            Box::new(sessions.clone()),
        )
        .expect("tracker opens")
    }

    #[test]
    fn narrowing_drops_hidden_rows_from_selection() {
        let store = MemoryStore::default().with("yakuza3", y3_records());
        let mut tracker = open(&store, &MemorySessions::default());
        assert!(tracker.select_ids([1, 3]).is_empty());

        tracker
            .set_facet(Facet::Status, FacetValues::from_labels(["Not Completed", "In Progress"]))
            .expect("status facet");
        assert_eq!(tracker.view_ids(), vec![2, 3, 4]);
        assert_eq!(tracker.selection().ids().iter().copied().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn checkpoint_chapter_raises_advisory() {
        let store = MemoryStore::default().with("yakuza3", y3_records());
        let mut tracker = open(&store, &MemorySessions::default());
        tracker
            .set_facet(Facet::Chapter, FacetValues::from_labels(["chapter 10"]))
            .expect("chapter facet");
        assert_eq!(tracker.view_ids(), vec![3, 4]);
        assert!(matches!(
            tracker.advisories(),
            [Advisory::CheckpointReached { chapter }] if chapter == "chapter 10"
        ));
    }

    #[test]
    fn bulk_status_change_saves_and_reselects() {
        let store = MemoryStore::default().with("yakuza3", y3_records());
        let mut tracker = open(&store, &MemorySessions::default());
        tracker.select_ids([2, 4]);

        assert_eq!(tracker.set_status(Status::Completed).expect("set status"), 2);
        assert!(store.stored("yakuza3").iter().filter(|r| r.id == 2 || r.id == 4).all(|r| r.status == Status::Completed));
        assert_eq!(tracker.selection().len(), 2);

        tracker
            .set_facet(Facet::Status, FacetValues::from_labels(["In Progress"]))
            .expect("status facet");
        assert!(tracker.view_ids().is_empty());
        assert!(tracker.selection().is_empty());
        assert_eq!(tracker.advisories(), [Advisory::NoMatches]);
    }

    #[test]
    fn save_failure_keeps_edits_until_retry() {
        let store = MemoryStore::default().with("yakuza3", y3_records());
        let mut tracker = open(&store, &MemorySessions::default());
        tracker.select_ids([3]);
        store.fail_saves.store(true, Ordering::SeqCst);

        let error = tracker.set_status(Status::Completed).expect_err("save fails");
        assert!(error.is_recoverable());
        assert!(tracker.has_unsaved_changes());
        assert_eq!(tracker.record(3).map(|r| r.status), Some(Status::Completed));
        assert_eq!(store.stored("yakuza3")[2].status, Status::NotCompleted);

        store.fail_saves.store(false, Ordering::SeqCst);
        tracker.retry_save().expect("retry");
        assert!(!tracker.has_unsaved_changes());
        assert_eq!(store.stored("yakuza3")[2].status, Status::Completed);
    }

    #[test]
    fn edit_rejects_duplicate_ids_and_follows_renames() {
        let store = MemoryStore::default().with("yakuza3", y3_records());
        let mut tracker = open(&store, &MemorySessions::default());
        let saves_before = store.saves.load(Ordering::SeqCst);

        let error = tracker
            .edit_record(2, RecordEdit { id: Some(3), ..RecordEdit::default() })
            .expect_err("duplicate id");
        assert!(matches!(error, AppError::Validation(_)));
        assert_eq!(store.saves.load(Ordering::SeqCst), saves_before);

        tracker
            .edit_record(
                2,
                RecordEdit {
                    id: Some(20),
                    title: Some("A Girl's Dream (revised)".to_string()),
                    ..RecordEdit::default()
                },
            )
            .expect("edit");
        assert!(tracker.selection().contains(20));
        assert_eq!(tracker.view_ids(), vec![1, 20, 3, 4]);
        assert_eq!(store.stored("yakuza3")[1].title, "A Girl's Dream (revised)");

        let error = tracker
            .edit_record(1, RecordEdit { category: Some("Kiryu".to_string()), ..RecordEdit::default() })
            .expect_err("no category field");
        assert!(matches!(error, AppError::Validation(_)));
    }

    #[test]
    fn empty_chapter_can_be_selected_as_a_facet() {
        let mut records = y3_records();
        records.push(Record::new(5, "Unlisted", Status::NotCompleted));
        let store = MemoryStore::default().with("yakuza3", records);
        let mut tracker = open(&store, &MemorySessions::default());

        tracker
            .set_facet(Facet::Chapter, FacetValues::from_labels([""]))
            .expect("empty chapter facet");
        assert_eq!(tracker.view_ids(), vec![5]);
        assert!(tracker.toggle_facet_value(Facet::Chapter, "chapter 3").expect("toggle"));
        assert_eq!(tracker.view_ids(), vec![1, 5]);
    }

    #[test]
    fn switching_datasets_flushes_unsaved_edits_first() {
        let store = MemoryStore::default()
            .with("yakuza3", y3_records())
            .with("yakuza4", y4_records());
        let mut tracker = open(&store, &MemorySessions::default());
        store.fail_saves.store(true, Ordering::SeqCst);
        tracker.select_ids([3]);
        tracker.set_status(Status::Completed).expect_err("save fails");

        let error = tracker.select_dataset("yakuza4").expect_err("switch refused while unsaved");
        assert!(matches!(error, AppError::Io(_)));
        assert_eq!(tracker.schema().id, "yakuza3");
        assert!(tracker.has_unsaved_changes());
        assert_eq!(tracker.record(3).map(|record| record.status), Some(Status::Completed));
        assert!(tracker.selection().contains(3));

        store.fail_saves.store(false, Ordering::SeqCst);
        tracker.select_dataset("yakuza4").expect("switch");
        assert_eq!(tracker.schema().id, "yakuza4");
        assert!(!tracker.has_unsaved_changes());
        assert_eq!(store.stored("yakuza3")[2].status, Status::Completed);
    }

    #[test]
    fn unloadable_session_dataset_is_reported() {
        let store = MemoryStore::default().with("yakuza3", y3_records());
        let sessions = MemorySessions::default();
        sessions
            .save(&SessionState {
                dataset: "Yakuza 4".to_string(),
                ..SessionState::default()
            })
            .expect("seed session");
        let tracker = open(&store, &sessions);
        assert_eq!(tracker.schema().id, "yakuza3");
        let warning = tracker.startup_warning().expect("warning");
        assert!(warning.contains("Yakuza 4"));
        assert!(warning.contains("NOT_FOUND"));

        sessions
            .save(&SessionState {
                dataset: "Yakuza 5".to_string(),
                ..SessionState::default()
            })
            .expect("seed session");
        let tracker = open(&store, &sessions);
        assert!(tracker.startup_warning().is_some_and(|warning| warning.contains("Yakuza 5")));

        let clean = open(&store, &MemorySessions::default());
        assert_eq!(clean.startup_warning(), None);
    }

    #[test]
    fn failed_dataset_switch_leaves_state_untouched() {
        let store = MemoryStore::default().with("yakuza3", y3_records());
        let mut tracker = open(&store, &MemorySessions::default());
        tracker.select_ids([1]);
        tracker.sort_by_field(Field::Title).expect("sort");

        let error = tracker.select_dataset("yakuza4").expect_err("missing file");
        assert!(matches!(error, AppError::NotFound(_)));
        assert_eq!(tracker.schema().id, "yakuza3");
        assert!(tracker.selection().contains(1));
        assert_eq!(
            tracker.sort_state().next_direction(1),
            Some(SortDirection::Descending)
        );
    }

    #[test]
    fn dataset_switch_resets_sort_and_keeps_valid_facets() {
        let store = MemoryStore::default()
            .with("yakuza3", y3_records())
            .with("yakuza4", y4_records());
        let sessions = MemorySessions::default();
        let mut tracker = open(&store, &sessions);
        tracker
            .set_facet(Facet::Chapter, FacetValues::from_labels(["chapter 3", "chapter 10"]))
            .expect("chapter facet");
        tracker.sort_by(0).expect("sort");

        tracker.select_dataset("Yakuza 4").expect("switch");
        assert_eq!(tracker.columns().len(), 6);
        assert_eq!(tracker.sort_state().len(), 6);
        assert_eq!(tracker.sort_state().next_direction(0), Some(SortDirection::Ascending));
        assert_eq!(tracker.facets().chapters.labels(), ["chapter 3"]);
        assert_eq!(tracker.view_ids(), vec![2]);
        assert_eq!(
            sessions.saved.lock().expect("session lock").as_ref().map(|s| s.dataset.clone()),
            Some("Yakuza 4".to_string())
        );

        tracker.toggle_facet_value(Facet::Category, "Akiyama").expect("category facet");
        assert!(tracker.set_facet(Facet::Category, FacetValues::from_labels(["Majima"])).is_err());
    }

    #[test]
    fn companion_and_font_controls() {
        let store = MemoryStore::default()
            .with("yakuza3", y3_records())
            .with("yakuza3-revelations", vec![Record::new(1, "Heat Snatch", Status::NotCompleted)]);
        let mut tracker = open(&store, &MemorySessions::default());

        tracker.open_companion().expect("companion");
        assert_eq!(tracker.schema().id, "yakuza3-revelations");
        assert!(tracker.open_companion().is_err());
        assert!(matches!(
            tracker.set_status(Status::InProgress),
            Err(AppError::Validation(_))
        ));

        for _ in 0..30 {
            tracker.increase_font();
        }
        assert_eq!(tracker.font_size(), MAX_FONT_SIZE);
        for _ in 0..30 {
            tracker.decrease_font();
        }
        assert_eq!(tracker.font_size(), MIN_FONT_SIZE);
        assert_eq!(tracker.reset_font(), DEFAULT_FONT_SIZE);
    }

    #[test]
    fn legacy_migration_is_written_back_on_open() {
        let store = MemoryStore::default().with("yakuza3", y3_records());
        store.migrated.store(2, Ordering::SeqCst);
        let tracker = open(&store, &MemorySessions::default());
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
        assert!(!tracker.has_unsaved_changes());
    }

    #[test]
    fn theme_toggle_saves_session() {
        let store = MemoryStore::default().with("yakuza3", y3_records());
        let sessions = MemorySessions::default();
        let mut tracker = open(&store, &sessions);
        assert!(tracker.toggle_dark_mode().expect("toggle"));
        assert_eq!(tracker.palette(), &Palette::DARK);
        let saved = sessions.saved.lock().expect("session lock").clone().expect("saved session");
        assert!(saved.dark_mode);
        assert_eq!(saved.dataset, "Yakuza 3");
    }
}
