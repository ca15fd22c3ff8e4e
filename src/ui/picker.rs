/// Highlight and filter state for a list of items owned elsewhere.
///
/// `visible` holds indices into the caller's item list, in display order,
/// after the current filter is applied. `selected` indexes into `visible`.
#[derive(Debug, Clone, Default)]
pub struct PickerState {
    pub filter: String,
    visible: Vec<usize>,
    selected: usize,
}

impl PickerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute visible rows for `total` items, keeping the highlighted
    /// item when it survives the filter.
    pub fn rebuild<F>(&mut self, total: usize, matches: F)
    where
        F: Fn(usize) -> bool,
    {
        let previous = self.selected_item();
        self.visible = (0..total).filter(|&index| matches(index)).collect();
        self.selected = previous
            .and_then(|item| self.visible.iter().position(|&i| i == item))
            .unwrap_or(0);
    }

    pub fn visible(&self) -> &[usize] {
        &self.visible
    }

    /// Highlighted row, if any rows are visible.
    pub fn selected_row(&self) -> Option<usize> {
        (!self.visible.is_empty()).then_some(self.selected)
    }

    /// Index into the caller's list for the highlighted row.
    pub fn selected_item(&self) -> Option<usize> {
        self.visible.get(self.selected).copied()
    }

    /// Highlight the row showing `item`. Returns false when it is filtered out.
    pub fn select_item(&mut self, item: usize) -> bool {
        match self.visible.iter().position(|&i| i == item) {
            Some(row) => {
                self.selected = row;
                true
            }
            None => false,
        }
    }

    pub fn move_up(&mut self) {
        if !self.visible.is_empty() {
            if self.selected == 0 {
                self.selected = self.visible.len() - 1;
            } else {
                self.selected -= 1;
            }
        }
    }

    pub fn move_down(&mut self) {
        if !self.visible.is_empty() {
            self.selected = (self.selected + 1) % self.visible.len();
        }
    }

    pub fn page_up(&mut self, rows: usize) {
        self.selected = self.selected.saturating_sub(rows.max(1));
    }

    pub fn page_down(&mut self, rows: usize) {
        if !self.visible.is_empty() {
            self.selected = (self.selected + rows.max(1)).min(self.visible.len() - 1);
        }
    }

    pub fn first(&mut self) {
        self.selected = 0;
    }

    pub fn last(&mut self) {
        self.selected = self.visible.len().saturating_sub(1);
    }
}
