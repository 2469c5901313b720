use crate::domain::model::DocumentKind;
use crate::domain::ports::DocumentStore;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-process document store. Holds bytes exactly as written.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: RwLock<HashMap<DocumentKind, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.read().map(|files| files.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read_document(&self, kind: DocumentKind) -> Result<Option<Vec<u8>>> {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        Ok(files.get(&kind).cloned())
    }

    async fn write_document(&self, kind: DocumentKind, data: &[u8]) -> Result<()> {
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        files.insert(kind, data.to_vec());
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        files.clear();
        Ok(())
    }

    async fn probe(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_overwrites_whole_document() {
        let store = MemoryStore::new();
        store
            .write_document(DocumentKind::Recipes, b"{\"a\":1}")
            .await
            .unwrap();
        store
            .write_document(DocumentKind::Recipes, b"{}")
            .await
            .unwrap();

        let data = store.read_document(DocumentKind::Recipes).await.unwrap();
        assert_eq!(data.as_deref(), Some(&b"{}"[..]));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_all_clears_documents() {
        let store = MemoryStore::new();
        store
            .write_document(DocumentKind::MealPlans, b"{}")
            .await
            .unwrap();
        store.delete_all().await.unwrap();

        assert!(store
            .read_document(DocumentKind::MealPlans)
            .await
            .unwrap()
            .is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_probe_always_succeeds() {
        let store = MemoryStore::new();
        assert!(tokio_test::block_on(store.probe()).is_ok());
        assert_eq!(store.backend_name(), "memory");
    }
}
