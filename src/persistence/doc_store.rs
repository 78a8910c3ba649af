use std::path::Path;

use tracing::warn;

use crate::models::{CompoundKey, Document, DocumentId, KeyKind, SiteId};
use crate::persistence::{InsertOutcome, IsamStore};
use crate::Result;

/// Document store: serialized posts keyed by their packed `CompoundKey`.
pub struct DocStore {
    store: IsamStore,
}

impl DocStore {
    pub fn open<P: AsRef<Path>>(base: P) -> Result<Self> {
        Ok(Self {
            store: IsamStore::open(base)?,
        })
    }

    /// Persist a document under its key; the previous version, if any, is replaced.
    ///
    /// Returns whether the key already existed.
    pub fn put_document(&self, doc: &Document) -> Result<bool> {
        let payload = doc.to_bytes()?;
        let outcome = self.store.insert(doc.key().to_storage_key(), &payload)?;
        Ok(outcome == InsertOutcome::Replaced)
    }

    /// Persist many documents with one index rewrite. Returns the number written.
    pub fn put_batch(&self, docs: &[Document]) -> Result<usize> {
        let mut entries = Vec::with_capacity(docs.len());
        for doc in docs {
            entries.push((doc.key().to_storage_key(), doc.to_bytes()?));
        }
        self.store.insert_batch(&entries)
    }

    pub fn exists(&self, site_id: SiteId, doc_id: DocumentId) -> Result<bool> {
        self.store
            .contains(CompoundKey::post(site_id, doc_id).to_storage_key())
    }

    /// Fetch and decode a document; a record that fails to decode is an error.
    pub fn get_document(&self, site_id: SiteId, doc_id: DocumentId) -> Result<Option<Document>> {
        let key = CompoundKey::post(site_id, doc_id).to_storage_key();
        match self.store.get(key)? {
            Some(bytes) => Ok(Some(Document::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Visit every stored post in key order.
    ///
    /// Records of other kinds are ignored; records that fail to decode are
    /// logged and skipped. Returns the number of documents visited.
    pub fn scan_documents<F>(&self, mut visit: F) -> Result<usize>
    where
        F: FnMut(CompoundKey, Document) -> Result<()>,
    {
        let mut visited = 0;
        self.store.reset_cursor();
        while let Some((raw_key, bytes)) = self.store.next()? {
            let key = CompoundKey::from_storage_key(raw_key);
            if key.kind() != Some(KeyKind::PostById) {
                continue;
            }
            match Document::from_bytes(&bytes) {
                Ok(doc) => {
                    visit(key, doc)?;
                    visited += 1;
                }
                Err(e) => warn!("Skipping undecodable record {}: {}", key, e),
            }
        }
        Ok(visited)
    }

    pub fn len(&self) -> u64 {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Underlying key/blob store
    pub fn raw(&self) -> &IsamStore {
        &self.store
    }
}
