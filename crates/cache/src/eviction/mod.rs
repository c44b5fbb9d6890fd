//! Eviction policy for the response cache
//!
//! Entries are ranked by `priority × (1 + access_count)`. When a new key
//! arrives at capacity the lowest-ranked share of the cache is dropped in one
//! pass; equal scores are broken by age, oldest first.

use crate::entry::CacheEntry;
use std::cmp::Ordering;

/// Keys of the `count` lowest-scored entries
pub fn select_victims<'a, V: 'a>(
    entries: impl IntoIterator<Item = &'a CacheEntry<V>>,
    count: usize,
) -> Vec<String> {
    let mut ranked: Vec<&CacheEntry<V>> = entries.into_iter().collect();
    ranked.sort_by(|a, b| compare(a, b));
    ranked
        .into_iter()
        .take(count)
        .map(|entry| entry.key.clone())
        .collect()
}

fn compare<V>(a: &CacheEntry<V>, b: &CacheEntry<V>) -> Ordering {
    a.score()
        .total_cmp(&b.score())
        .then_with(|| a.written_at.cmp(&b.written_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use storegate_core::Priority;

    #[tokio::test(start_paused = true)]
    async fn test_lowest_scores_go_first() {
        let mut popular = CacheEntry::new("products:cpu", (), Priority::PRODUCTS);
        popular.access_count = 10;
        let auth = CacheEntry::new("profile", (), Priority::AUTH);
        let plain = CacheEntry::new("misc", (), Priority::DEFAULT);

        let victims = select_victims([&popular, &auth, &plain], 2);
        assert_eq!(victims, vec!["misc".to_string(), "profile".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ties_evict_oldest_first() {
        let older = CacheEntry::new("older", (), Priority::PRODUCTS);
        tokio::time::advance(Duration::from_secs(1)).await;
        let newer = CacheEntry::new("newer", (), Priority::PRODUCTS);

        assert_eq!(select_victims([&newer, &older], 1), vec!["older".to_string()]);
    }

    #[test]
    fn test_count_larger_than_entries() {
        let only = CacheEntry::new("only", 1u8, Priority::DEFAULT);
        assert_eq!(select_victims([&only], 5).len(), 1);
        assert!(select_victims(std::iter::empty::<&CacheEntry<u8>>(), 1).is_empty());
    }
}
