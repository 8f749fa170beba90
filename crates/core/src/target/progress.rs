use std::collections::BTreeMap;

/// Completion of a bulk fetch as a tree of counters.
///
/// A node expects `total` units of work; each unit is either counted directly
/// through [`Progress::advance`] or represented by a child node, whose own
/// fraction contributes to the parent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Progress {
    total: Option<u64>,
    completed: u64,
    children: BTreeMap<String, Progress>,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything, including the expected total.
    pub fn reset(&mut self) {
        *self = Progress::default();
    }

    /// Declare how many units are expected. Clears earlier counts.
    pub fn set_total(&mut self, total: u64) {
        self.total = Some(total);
        self.completed = 0;
        self.children.clear();
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Count one unit as done.
    pub fn advance(&mut self) {
        if let Some(total) = self.total {
            let used = self.completed + self.children.len() as u64;
            if used < total {
                self.completed += 1;
            }
        }
    }

    /// The child tracking `key`, created on first use.
    pub fn child(&mut self, key: impl Into<String>) -> &mut Progress {
        self.children.entry(key.into()).or_default()
    }

    pub fn get_child(&self, key: &str) -> Option<&Progress> {
        self.children.get(key)
    }

    pub fn children(&self) -> impl Iterator<Item = (&String, &Progress)> {
        self.children.iter()
    }

    /// Fraction complete in `0.0..=1.0`. Zero until a total is known.
    pub fn fraction(&self) -> f64 {
        match self.total {
            None => 0.0,
            Some(0) => 1.0,
            Some(total) => {
                let done = self.completed as f64
                    + self.children.values().map(Progress::fraction).sum::<f64>();
                (done / total as f64).min(1.0)
            }
        }
    }

    /// Whether every expected unit, including every child, is done.
    pub fn is_finished(&self) -> bool {
        match self.total {
            None => false,
            Some(total) => {
                self.completed + self.children.len() as u64 >= total
                    && self.children.values().all(Progress::is_finished)
            }
        }
    }

    /// Sum of `(completed, total)` over the leaves of the tree.
    pub fn leaf_counts(&self) -> (u64, u64) {
        if self.children.is_empty() {
            return (self.completed, self.total.unwrap_or(0));
        }
        self.children
            .values()
            .map(Progress::leaf_counts)
            .fold((0, 0), |(done, total), (d, t)| (done + d, total + t))
    }
}
