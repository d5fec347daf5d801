use crate::models::{Advisory, Facet, FacetSelection, Field, Record};
use crate::schema::DatasetSchema;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterOutcome {
    pub positions: Vec<usize>,
    pub advisories: Vec<Advisory>,
}

impl FilterOutcome {
    pub fn records<'a>(&self, records: &'a [Record]) -> Vec<&'a Record> {
        self.positions.iter().filter_map(|&index| records.get(index)).collect()
    }

    pub fn ids(&self, records: &[Record]) -> Vec<i64> {
        self.positions
            .iter()
            .filter_map(|&index| records.get(index).map(|record| record.id))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

// Order-preserving subsequence of `records`; nothing is re-sorted.
pub fn filter(records: &[Record], facets: &FacetSelection, schema: &DatasetSchema) -> FilterOutcome {
    let query = facets.query_text.to_lowercase();
    let query_field = facets.query_field.field();
    let narrow_status = !facets.statuses.is_unrestricted();
    let narrow_chapter = schema.has_facet(Facet::Chapter) && !facets.chapters.is_unrestricted();
    let narrow_category = schema.has_facet(Facet::Category) && !facets.categories.is_unrestricted();

    let positions = records
        .iter()
        .enumerate()
        .filter(|(_, record)| {
            if !query.is_empty() && !matches_query(record, query_field, &query) {
                return false;
            }
            if narrow_status && !facets.statuses.contains(record.status.as_str()) {
                return false;
            }
            if narrow_chapter && !facets.chapters.contains(record.chapter()) {
                return false;
            }
            if narrow_category && !facets.categories.contains(record.category_text()) {
                return false;
            }
            true
        })
        .map(|(index, _)| index)
        .collect::<Vec<_>>();

    let mut advisories = Vec::new();
    if let Some(checkpoint) = schema.checkpoint.as_deref() {
        if facets.chapters.contains(checkpoint) {
            advisories.push(Advisory::CheckpointReached {
                chapter: checkpoint.to_string(),
            });
        }
    }
    if positions.is_empty() {
        advisories.push(Advisory::NoMatches);
    }

    FilterOutcome { positions, advisories }
}

pub trait AdvisorySink {
    fn notify(&mut self, advisory: &Advisory);
}

impl<F: FnMut(&Advisory)> AdvisorySink for F {
    fn notify(&mut self, advisory: &Advisory) {
        self(advisory)
    }
}

pub fn filter_notify(
    records: &[Record],
    facets: &FacetSelection,
    schema: &DatasetSchema,
    sink: &mut dyn AdvisorySink,
) -> FilterOutcome {
    let outcome = filter(records, facets, schema);
    for advisory in &outcome.advisories {
        sink.notify(advisory);
    }
    outcome
}

fn matches_query(record: &Record, field: Field, query: &str) -> bool {
    match field {
        Field::Id => record.id.to_string().contains(query),
        Field::Title => record.title.to_lowercase().contains(query),
        Field::Description => record.description.to_lowercase().contains(query),
        other => record.field_text(other).to_lowercase().contains(query),
    }
}
