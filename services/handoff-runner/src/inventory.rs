//! Inventory filtering - decides which items are given away

use std::collections::HashSet;

use crate::types::{InventoryItem, InventorySnapshot};

/// Category excluded when no configuration is supplied
pub const DEFAULT_EXCLUDED_CATEGORY: &str = "crate";

/// Classifies items as giving-eligible or excluded by category
#[derive(Debug, Clone)]
pub struct ItemFilter {
    excluded: HashSet<String>,
}

impl ItemFilter {
    /// Create a filter excluding the given categories (case-insensitive)
    pub fn new<I, S>(excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            excluded: excluded
                .into_iter()
                .map(|c| c.as_ref().trim().to_lowercase())
                .collect(),
        }
    }

    pub fn is_eligible(&self, item: &InventoryItem) -> bool {
        !self.excluded.contains(&item.category.to_lowercase())
    }

    /// Eligible items of `snapshot`, in snapshot order
    pub fn filter(&self, snapshot: &InventorySnapshot) -> Vec<InventoryItem> {
        snapshot
            .items
            .iter()
            .filter(|item| self.is_eligible(item))
            .cloned()
            .collect()
    }
}

impl Default for ItemFilter {
    fn default() -> Self {
        Self::new([DEFAULT_EXCLUDED_CATEGORY])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BotIdentity;

    fn snapshot(categories: &[&str]) -> InventorySnapshot {
        let items = categories
            .iter()
            .enumerate()
            .map(|(i, c)| InventoryItem::new(i as u64 + 1, *c))
            .collect();
        InventorySnapshot::new(BotIdentity(1), items)
    }

    #[test]
    fn test_filter_drops_crates_and_keeps_order() {
        let filter = ItemFilter::default();
        let eligible = filter.filter(&snapshot(&["sword", "crate", "shield"]));

        let categories: Vec<_> = eligible.iter().map(|i| i.category.as_str()).collect();
        assert_eq!(categories, vec!["sword", "shield"]);
        assert_eq!(eligible[0].id, 1);
        assert_eq!(eligible[1].id, 3);
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let filter = ItemFilter::new(["Crate", " Key "]);
        let eligible = filter.filter(&snapshot(&["CRATE", "key", "hat"]));
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].category, "hat");
    }

    #[test]
    fn test_only_excluded_items_yields_empty() {
        let filter = ItemFilter::default();
        let snap = snapshot(&["crate", "crate"]);
        assert!(filter.filter(&snap).is_empty());
    }

    #[test]
    fn test_filter_is_stable_across_calls() {
        let filter = ItemFilter::default();
        let snap = snapshot(&["hat", "crate", "sword", "hat"]);
        assert_eq!(filter.filter(&snap), filter.filter(&snap));
        assert_eq!(filter.filter(&snap).len(), 3);
    }
}
