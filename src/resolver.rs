use crate::error::Result;
use crate::store::{UrlRecord, UrlStore};
use std::sync::Arc;

/// Looks up the currently selected target.
///
/// Nothing is cached: each call reads the store, so a new selection applies
/// to the very next request.
#[derive(Clone)]
pub struct SelectionResolver {
    store: Arc<dyn UrlStore>,
}

impl SelectionResolver {
    pub fn new(store: Arc<dyn UrlStore>) -> Self {
        Self { store }
    }

    /// `Ok(None)` means no target is selected, which is not an error here.
    pub async fn resolve(&self) -> Result<Option<UrlRecord>> {
        let target = self.store.selected_url().await?;
        match &target {
            Some(url) => tracing::debug!("Resolved target '{}' -> {}", url.name, url.url),
            None => tracing::debug!("No target selected"),
        }
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewUrl, SqliteStore};
    use std::collections::HashSet;

    async fn setup() -> (Arc<dyn UrlStore>, SelectionResolver) {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        store.ensure_selection().await.unwrap();
        let store: Arc<dyn UrlStore> = Arc::new(store);
        let resolver = SelectionResolver::new(store.clone());
        (store, resolver)
    }

    async fn add(store: &Arc<dyn UrlStore>, url: &str, name: &str) -> UrlRecord {
        store
            .insert_url(NewUrl {
                url: url.to_string(),
                name: name.to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_resolve_before_and_after_select() {
        let (store, resolver) = setup().await;
        let target = add(&store, "http://example.com", "example").await;

        assert_eq!(resolver.resolve().await.unwrap(), None);

        store.select_url(target.id).await.unwrap();
        assert_eq!(resolver.resolve().await.unwrap(), Some(target));
    }

    #[tokio::test]
    async fn test_selection_change_applies_immediately() {
        let (store, resolver) = setup().await;
        let a = add(&store, "http://a.example.com", "a").await;
        let b = add(&store, "http://b.example.com", "b").await;

        store.select_url(a.id).await.unwrap();
        assert_eq!(resolver.resolve().await.unwrap().unwrap().id, a.id);

        store.select_url(b.id).await.unwrap();
        assert_eq!(resolver.resolve().await.unwrap().unwrap().id, b.id);
    }

    #[tokio::test]
    async fn test_concurrent_selects_only_observe_committed_values() {
        let (store, resolver) = setup().await;
        let mut ids = HashSet::new();
        for i in 0..4 {
            let url = add(&store, &format!("http://host{}.example.com", i), "h").await;
            ids.insert(url.id);
        }

        let selects: Vec<_> = ids
            .iter()
            .map(|&id| {
                let store = store.clone();
                tokio::spawn(async move { store.select_url(id).await.unwrap() })
            })
            .collect();
        for handle in selects {
            handle.await.unwrap();
        }

        let resolves: Vec<_> = (0..8)
            .map(|_| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.resolve().await.unwrap() })
            })
            .collect();
        for handle in resolves {
            let target = handle.await.unwrap().expect("a target is selected");
            assert!(ids.contains(&target.id));
        }
    }
}
