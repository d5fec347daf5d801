use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    ids: BTreeSet<i64>,
    focus: Option<i64>,
}

impl Selection {
    pub fn from_ids<I: IntoIterator<Item = i64>>(ids: I) -> Self {
        let ids: BTreeSet<i64> = ids.into_iter().collect();
        let focus = ids.iter().next_back().copied();
        Self { ids, focus }
    }

    pub fn ids(&self) -> &BTreeSet<i64> {
        &self.ids
    }

    pub fn focus(&self) -> Option<i64> {
        self.focus
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn add(&mut self, id: i64) {
        self.ids.insert(id);
        self.focus = Some(id);
    }

    pub fn remove(&mut self, id: i64) {
        self.ids.remove(&id);
        if self.focus == Some(id) {
            self.focus = None;
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.focus = None;
    }

    pub fn rename(&mut self, from: i64, to: i64) {
        if self.ids.remove(&from) {
            self.ids.insert(to);
        }
        if self.focus == Some(from) {
            self.focus = Some(to);
        }
    }
}

// Hidden ids are dropped; focus lands on the last retained row in display order.
pub fn refresh(view_ids: &[i64], previous: &Selection) -> Selection {
    let mut next = Selection::default();
    for &id in view_ids {
        if previous.contains(id) {
            next.ids.insert(id);
            next.focus = Some(id);
        }
    }
    next
}
