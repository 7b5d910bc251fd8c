// In-memory content source
//
// The authoritative content store lives outside this pipeline; this
// implementation backs the poll snapshot path in tests and single-process
// deployments. All data is stored in memory and lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use freshwire_core::{ContentItem, ContentSource, Result};
use parking_lot::RwLock;

/// In-memory ContentSource keyed by site
#[derive(Default)]
pub struct MemoryContentSource {
    items: RwLock<HashMap<String, HashMap<String, ContentItem>>>,
}

impl MemoryContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an item for a site
    pub fn upsert_item(&self, site_id: &str, item: ContentItem) {
        self.items
            .write()
            .entry(site_id.to_string())
            .or_default()
            .insert(item.item_id.clone(), item);
    }

    /// Remove an item; missing items are a no-op
    pub fn remove_item(&self, site_id: &str, item_id: &str) {
        if let Some(site_items) = self.items.write().get_mut(site_id) {
            site_items.remove(item_id);
        }
    }
}

#[async_trait]
impl ContentSource for MemoryContentSource {
    async fn list_items(&self, site_id: &str, limit: usize) -> Result<Vec<ContentItem>> {
        let items = self.items.read();
        let mut result: Vec<ContentItem> = items
            .get(site_id)
            .map(|site_items| site_items.values().cloned().collect())
            .unwrap_or_default();
        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        result.truncate(limit);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn item(item_id: &str, age_secs: i64) -> ContentItem {
        let updated = Utc::now() - Duration::seconds(age_secs);
        ContentItem {
            item_id: item_id.to_string(),
            collection: "blog".to_string(),
            slug: Some(item_id.to_string()),
            title: format!("Title {item_id}"),
            status: "published".to_string(),
            created_at: updated,
            updated_at: updated,
            data: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_list_most_recently_updated_first() {
        let source = MemoryContentSource::new();
        source.upsert_item("site-1", item("old", 100));
        source.upsert_item("site-1", item("new", 1));
        source.upsert_item("site-1", item("mid", 50));

        let items = source.list_items("site-1", 10).await.unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_list_bounded() {
        let source = MemoryContentSource::new();
        for i in 0..5 {
            source.upsert_item("site-1", item(&format!("item-{i}"), i));
        }
        assert_eq!(source.list_items("site-1", 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_remove_item() {
        let source = MemoryContentSource::new();
        source.upsert_item("site-1", item("item-1", 0));
        source.remove_item("site-1", "item-1");
        assert!(source.list_items("site-1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sites_are_isolated() {
        let source = MemoryContentSource::new();
        source.upsert_item("site-1", item("item-1", 0));
        assert!(source.list_items("site-2", 10).await.unwrap().is_empty());
    }
}
