//! Numeric grid backing the play queue
//!
//! The grid is plain storage plus a random-fill utility; the playback
//! engine only ever sees it through the [`QueueSource`] boundary, as the
//! leading `count` cells selected by current settings.

use std::sync::Arc;

use numvox_core::{QueueItem, QueueSource, SettingsStore};
use parking_lot::RwLock;
use tracing::debug;

/// Total cells in the drill grid.
pub const GRID_CELLS: usize = 40;

pub struct NumberGrid {
    settings: Arc<SettingsStore>,
    cells: RwLock<Vec<String>>,
}

impl NumberGrid {
    pub fn new(settings: Arc<SettingsStore>) -> Arc<Self> {
        Arc::new(Self {
            settings,
            cells: RwLock::new(vec![String::new(); GRID_CELLS]),
        })
    }

    /// Fill every cell with a fresh random value bounded by the configured
    /// digit length.
    pub fn fill_random(&self) {
        let digit_length = self.settings.settings().digit_length.clamp(1, 9);
        let bound = 10u64.pow(digit_length);
        let mut cells = self.cells.write();
        for cell in cells.iter_mut() {
            *cell = fastrand::u64(0..bound).to_string();
        }
        debug!(digit_length, cells = cells.len(), "grid refilled");
    }

    pub fn cells(&self) -> Vec<String> {
        self.cells.read().clone()
    }

    pub fn set_cell(&self, index: usize, value: impl Into<String>) {
        let mut cells = self.cells.write();
        if let Some(cell) = cells.get_mut(index) {
            *cell = value.into();
        }
    }
}

impl QueueSource for NumberGrid {
    fn selected_items(&self) -> Vec<QueueItem> {
        let count = self.settings.settings().count as usize;
        self.cells
            .read()
            .iter()
            .take(count.min(GRID_CELLS))
            .enumerate()
            .map(|(cell, value)| QueueItem::new(value.clone(), cell))
            .collect()
    }
}
