//! Reader cache and weak reader handles
//!
//! The cache owns one [`AudioSourceReader`] per audio source. Consumers that
//! only observe a reader (views, thumbnails) get a [`ReaderHandle`], which
//! never extends the reader's lifetime and reports when it has gone.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::model::{AudioSource, ObjectId};

use super::{AudioReader, AudioSourceReader};

/// Non-owning reference to a cached reader
#[derive(Debug, Clone)]
pub struct ReaderHandle {
    source_id: ObjectId,
    reader: Weak<AudioSourceReader>,
}

impl ReaderHandle {
    pub fn source_id(&self) -> ObjectId {
        self.source_id
    }

    /// The reader, if its owner still holds it
    pub fn upgrade(&self) -> Option<Arc<AudioSourceReader>> {
        self.reader.upgrade()
    }

    /// True once the owner has dropped the reader
    pub fn is_expired(&self) -> bool {
        self.reader.strong_count() == 0
    }

    /// True if the reader is alive and currently serving reads
    pub fn is_usable(&self) -> bool {
        self.upgrade().map(|r| r.is_valid()).unwrap_or(false)
    }
}

/// Owner of per-source readers
#[derive(Debug, Default)]
pub struct ReaderCache {
    readers: Mutex<HashMap<ObjectId, Arc<AudioSourceReader>>>,
}

impl ReaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached reader for `source`, created on first use
    ///
    /// An invalidated reader is replaced by a fresh one, so callers always
    /// get a reader that reflects the source's committed state.
    pub fn reader_for(&self, source: &Arc<AudioSource>) -> Arc<AudioSourceReader> {
        let mut readers = self.readers.lock();
        if let Some(existing) = readers.get(&source.id()) {
            if !existing.state().is_terminal() {
                return existing.clone();
            }
        }

        let reader = AudioSourceReader::new(source);
        let stale = readers.insert(source.id(), reader.clone());
        drop(readers);
        if stale.is_some() {
            debug!(source = %source.id(), "replaced invalidated source reader");
        }
        reader
    }

    /// A weak handle to the cached reader for `source`
    pub fn handle_for(&self, source: &Arc<AudioSource>) -> ReaderHandle {
        let reader = self.reader_for(source);
        ReaderHandle {
            source_id: source.id(),
            reader: Arc::downgrade(&reader),
        }
    }

    pub fn get(&self, source_id: ObjectId) -> Option<Arc<AudioSourceReader>> {
        self.readers.lock().get(&source_id).cloned()
    }

    pub fn remove(&self, source_id: ObjectId) -> Option<Arc<AudioSourceReader>> {
        self.readers.lock().remove(&source_id)
    }

    /// Drop every invalidated reader
    ///
    /// # Returns
    /// Number of readers removed.
    pub fn purge_invalid(&self) -> usize {
        let stale: Vec<Arc<AudioSourceReader>> = {
            let mut readers = self.readers.lock();
            let ids: Vec<ObjectId> = readers
                .iter()
                .filter(|(_, r)| r.state().is_terminal())
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| readers.remove(id)).collect()
        };
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.readers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.lock().is_empty()
    }

    pub fn clear(&self) {
        let readers = std::mem::take(&mut *self.readers.lock());
        drop(readers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemorySampleProvider;
    use crate::model::{AudioSourceProperties, ContentUpdateScopes, Document};

    fn source(document: &Document) -> Arc<AudioSource> {
        let source = document
            .create_audio_source(
                AudioSourceProperties::new("src", 48000.0, 1, 64),
                Arc::new(MemorySampleProvider::ramp(1, 64)),
            )
            .unwrap();
        document.enable_audio_source_samples_access(&source, true).unwrap();
        source
    }

    #[test]
    fn test_reader_is_shared_until_invalidated() {
        let document = Document::new("doc");
        let src = source(&document);
        let cache = ReaderCache::new();

        let a = cache.reader_for(&src);
        let b = cache.reader_for(&src);
        assert!(Arc::ptr_eq(&a, &b));

        document
            .update_audio_source_content(&src, ContentUpdateScopes::samples_are_affected())
            .unwrap();
        assert!(!a.is_valid());

        let c = cache.reader_for(&src);
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(c.is_valid());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_handle_expires_with_owner() {
        let document = Document::new("doc");
        let src = source(&document);
        let cache = ReaderCache::new();

        let handle = cache.handle_for(&src);
        assert!(!handle.is_expired());
        assert!(handle.is_usable());
        assert_eq!(handle.source_id(), src.id());

        cache.clear();
        assert!(handle.is_expired());
        assert!(handle.upgrade().is_none());
        assert!(!handle.is_usable());
    }

    #[test]
    fn test_purge_invalid() {
        let document = Document::new("doc");
        let first = source(&document);
        let second = source(&document);
        let cache = ReaderCache::new();
        let handle = cache.handle_for(&first);
        cache.reader_for(&second);

        document.destroy_audio_source(&first).unwrap();
        assert_eq!(cache.purge_invalid(), 1);
        assert_eq!(cache.len(), 1);
        assert!(handle.is_expired());
        assert!(cache.get(second.id()).is_some());
    }
}
