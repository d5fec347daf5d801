use crate::errors::{AppError, AppResult};
use crate::models::{Field, Record};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SortState {
    descending: Vec<bool>,
}

impl SortState {
    pub fn new(columns: usize) -> Self {
        Self {
            descending: vec![false; columns],
        }
    }

    pub fn len(&self) -> usize {
        self.descending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descending.is_empty()
    }

    pub fn next_direction(&self, column: usize) -> Option<SortDirection> {
        self.descending.get(column).map(|&descending| {
            if descending {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            }
        })
    }

    pub fn set_next(&mut self, column: usize, direction: SortDirection) -> AppResult<()> {
        let slot = self.slot_mut(column)?;
        *slot = direction == SortDirection::Descending;
        Ok(())
    }

    fn slot_mut(&mut self, column: usize) -> AppResult<&mut bool> {
        let columns = self.descending.len();
        self.descending.get_mut(column).ok_or_else(|| {
            AppError::Validation(format!(
                "Sort column {} out of range ({} columns)",
                column, columns
            ))
        })
    }
}

pub fn sort_by(
    records: &mut [Record],
    columns: &[Field],
    column: usize,
    state: &mut SortState,
) -> AppResult<SortDirection> {
    let field = *columns.get(column).ok_or_else(|| {
        AppError::Validation(format!(
            "Sort column {} out of range ({} columns)",
            column,
            columns.len()
        ))
    })?;
    let slot = state.slot_mut(column)?;
    let descending = *slot;

    // slice::sort_by is stable; reversing the comparator keeps ties in their prior order.
    records.sort_by(|a, b| {
        let ordering = compare_field(a, b, field);
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
    *slot = !descending;

    Ok(if descending {
        SortDirection::Descending
    } else {
        SortDirection::Ascending
    })
}

pub fn compare_field(a: &Record, b: &Record, field: Field) -> Ordering {
    match field {
        Field::Id => a.id.cmp(&b.id),
        Field::Title => a.title.cmp(&b.title),
        Field::Description => a.description.cmp(&b.description),
        Field::Category => a.category_text().cmp(b.category_text()),
        Field::AvailableFrom => a.chapter().cmp(b.chapter()),
        Field::Status => a.status.as_str().cmp(b.status.as_str()),
    }
}
