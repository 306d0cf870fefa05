//! RocksDB storage layer for the round archive

use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;

/// Shared RocksDB handle.
///
/// Cloning is cheap; every clone points at the same database. All writes
/// go through the archive worker, reads come from API handlers.
#[derive(Clone)]
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rocksdb::Error> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(128 * 1024 * 1024); // 128MB write buffer for high throughput
        opts.set_max_write_buffer_number(4);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path)?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.db.get(key).ok().flatten()
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), rocksdb::Error> {
        self.db.put(key, value)
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), rocksdb::Error> {
        self.db.delete(key)
    }

    pub fn batch_write<K, V>(&self, items: &[(K, V)]) -> Result<(), rocksdb::Error>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let mut batch = WriteBatch::default();
        for (key, value) in items {
            batch.put(key, value);
        }
        self.db.write(batch)
    }

    /// Collect up to `limit` entries whose keys start with `prefix`, in
    /// ascending key order.
    pub fn scan_prefix(&self, prefix: &[u8], limit: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut rows = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let Ok((key, value)) = item else { break };
            if !key.starts_with(prefix) || rows.len() >= limit {
                break;
            }
            rows.push((key.to_vec(), value.to_vec()));
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_put_get_delete() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        assert_eq!(storage.get(b"missing"), None);

        storage.put(b"key", b"value").unwrap();
        assert_eq!(storage.get(b"key"), Some(b"value".to_vec()));

        storage.delete(b"key").unwrap();
        assert_eq!(storage.get(b"key"), None);
    }

    #[test]
    fn test_batch_write_is_visible() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        let items: Vec<(Vec<u8>, Vec<u8>)> = (0..5)
            .map(|i| (format!("batch:{}", i).into_bytes(), vec![i as u8]))
            .collect();
        storage.batch_write(&items).unwrap();

        for (key, value) in &items {
            assert_eq!(storage.get(key), Some(value.clone()));
        }
    }

    #[test]
    fn test_scan_prefix_order_and_limit() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        storage.put(b"a:3", b"three").unwrap();
        storage.put(b"a:1", b"one").unwrap();
        storage.put(b"a:2", b"two").unwrap();
        storage.put(b"b:1", b"other prefix").unwrap();

        let rows = storage.scan_prefix(b"a:", 10);
        let keys: Vec<&[u8]> = rows.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![b"a:1".as_slice(), b"a:2", b"a:3"]);

        let limited = storage.scan_prefix(b"a:", 2);
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].0, b"a:1".to_vec());

        assert!(storage.scan_prefix(b"c:", 10).is_empty());
    }
}
