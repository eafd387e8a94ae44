use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::model::CacheEntry;

pub const FULLY_BOOKED_SUFFIX: &str = "__fully_booked";
pub const SLOT_COUNTS_SUFFIX: &str = "__booked_slot_counts";

/// Persisted availability snapshots: one JSON document per product, holding
/// `"{field_key}__fully_booked"` and `"{field_key}__booked_slot_counts"`
/// key/value pairs.
///
/// Writes go to a temp sibling, fsync, then atomic rename — a reader never
/// observes a partially written document. Loads are tolerant: a missing file
/// is empty, an unreadable document is empty, and a malformed value loses
/// only its own key.
pub struct CacheStore {
    dir: PathBuf,
    /// Serializes the read-modify-write document swap so two fields of the
    /// same product cannot drop each other's keys.
    write_lock: std::sync::Mutex<()>,
}

impl CacheStore {
    pub fn open(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            write_lock: std::sync::Mutex::new(()),
        })
    }

    fn product_path(&self, product_id: u64) -> PathBuf {
        self.dir.join(format!("{product_id}.json"))
    }

    fn load_document(&self, product_id: u64) -> BTreeMap<String, Value> {
        let path = self.product_path(product_id);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                tracing::warn!(product_id, "cache document unreadable: {e}");
                return BTreeMap::new();
            }
        };
        match serde_json::from_slice(&data) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(product_id, "cache document corrupt, starting empty: {e}");
                BTreeMap::new()
            }
        }
    }

    /// Read one field's cache entry. `None` when neither key is present.
    pub fn load(&self, product_id: u64, field_key: &str) -> Option<CacheEntry> {
        entry_from_document(&self.load_document(product_id), field_key)
    }

    /// Scan the data directory and return every persisted entry. Used once
    /// at engine startup.
    pub fn load_all(&self) -> Vec<(u64, String, CacheEntry)> {
        let mut entries = Vec::new();
        let dir = match fs::read_dir(&self.dir) {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!("cache directory unreadable: {e}");
                return entries;
            }
        };
        for item in dir.flatten() {
            let path = item.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Some(product_id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            else {
                tracing::warn!(?path, "unrecognized cache file name, skipped");
                continue;
            };
            let doc = self.load_document(product_id);
            for field_key in field_keys(&doc) {
                if let Some(entry) = entry_from_document(&doc, &field_key) {
                    entries.push((product_id, field_key, entry));
                }
            }
        }
        entries
    }

    /// Overwrite one field's pair of keys in a single document swap.
    pub fn persist(&self, product_id: u64, field_key: &str, entry: &CacheEntry) -> io::Result<()> {
        let _guard = self.write_lock.lock().expect("cache store lock poisoned");
        let mut doc = self.load_document(product_id);
        doc.insert(
            format!("{field_key}{FULLY_BOOKED_SUFFIX}"),
            Value::from(entry.fully_booked.clone()),
        );
        let slot_counts_key = format!("{field_key}{SLOT_COUNTS_SUFFIX}");
        if entry.slot_counts.is_empty() {
            doc.remove(&slot_counts_key);
        } else {
            doc.insert(
                slot_counts_key,
                serde_json::to_value(&entry.slot_counts)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            );
        }

        let path = self.product_path(product_id);
        let tmp_path = path.with_extension("json.tmp");
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &doc)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

fn field_keys(doc: &BTreeMap<String, Value>) -> Vec<String> {
    let mut keys: Vec<String> = doc
        .keys()
        .filter_map(|k| {
            k.strip_suffix(FULLY_BOOKED_SUFFIX)
                .or_else(|| k.strip_suffix(SLOT_COUNTS_SUFFIX))
                .map(|s| s.to_string())
        })
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

fn entry_from_document(doc: &BTreeMap<String, Value>, field_key: &str) -> Option<CacheEntry> {
    let fully_booked_value = doc.get(&format!("{field_key}{FULLY_BOOKED_SUFFIX}"));
    let slot_counts_value = doc.get(&format!("{field_key}{SLOT_COUNTS_SUFFIX}"));
    if fully_booked_value.is_none() && slot_counts_value.is_none() {
        return None;
    }

    let fully_booked = match fully_booked_value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v.as_str() {
                Some(s) => Some(s.to_string()),
                None => {
                    tracing::warn!(field_key, ?v, "non-string range in cache, skipped");
                    None
                }
            })
            .collect(),
        Some(other) => {
            tracing::warn!(field_key, ?other, "malformed fully-booked value, skipped");
            Vec::new()
        }
        None => Vec::new(),
    };

    let slot_counts = match slot_counts_value {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(k, v)| match v.as_u64() {
                Some(count) => Some((k.clone(), count as u32)),
                None => {
                    tracing::warn!(field_key, key = %k, "non-integer slot count, skipped");
                    None
                }
            })
            .collect(),
        Some(other) => {
            tracing::warn!(field_key, ?other, "malformed slot-counts value, skipped");
            BTreeMap::new()
        }
        None => BTreeMap::new(),
    };

    Some(CacheEntry {
        fully_booked,
        slot_counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("daybook_test_store")
            .join(format!("{name}_{}", Ulid::new()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn entry(ranges: &[&str], counts: &[(&str, u32)]) -> CacheEntry {
        CacheEntry {
            fully_booked: ranges.iter().map(|s| s.to_string()).collect(),
            slot_counts: counts
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }

    #[test]
    fn persist_and_load_roundtrip() {
        let store = CacheStore::open(&test_dir("roundtrip")).unwrap();
        let e = entry(
            &["2024-01-10..2024-01-13", "2024-02-01"],
            &[("2024-01-10 09:00-11:00", 2)],
        );
        store.persist(7, "booking", &e).unwrap();
        assert_eq!(store.load(7, "booking"), Some(e));
        assert_eq!(store.load(7, "other"), None);
        assert_eq!(store.load(8, "booking"), None);
    }

    #[test]
    fn two_fields_share_one_document() {
        let store = CacheStore::open(&test_dir("two_fields")).unwrap();
        let a = entry(&["2024-01-10"], &[]);
        let b = entry(&["2024-03-01"], &[]);
        store.persist(7, "booking_a", &a).unwrap();
        store.persist(7, "booking_b", &b).unwrap();
        assert_eq!(store.load(7, "booking_a"), Some(a));
        assert_eq!(store.load(7, "booking_b"), Some(b));
    }

    #[test]
    fn persist_overwrites_whole_entry() {
        let store = CacheStore::open(&test_dir("overwrite")).unwrap();
        store
            .persist(7, "booking", &entry(&["2024-01-10"], &[("2024-01-10 09:00-11:00", 1)]))
            .unwrap();
        let replacement = entry(&["2024-02-01"], &[]);
        store.persist(7, "booking", &replacement).unwrap();
        let loaded = store.load(7, "booking").unwrap();
        assert_eq!(loaded, replacement);
        // stale slot counts from the previous write are gone
        assert!(loaded.slot_counts.is_empty());
    }

    #[test]
    fn corrupt_value_loses_only_its_key() {
        let dir = test_dir("corrupt_value");
        let store = CacheStore::open(&dir).unwrap();
        fs::write(
            dir.join("7.json"),
            r#"{
                "booking__fully_booked": "not-an-array",
                "booking__booked_slot_counts": {"2024-01-10 09:00-11:00": 2}
            }"#,
        )
        .unwrap();
        let loaded = store.load(7, "booking").unwrap();
        assert!(loaded.fully_booked.is_empty());
        assert_eq!(loaded.slot_counts.get("2024-01-10 09:00-11:00"), Some(&2));
    }

    #[test]
    fn corrupt_document_loads_empty() {
        let dir = test_dir("corrupt_doc");
        let store = CacheStore::open(&dir).unwrap();
        fs::write(dir.join("7.json"), b"{ not json").unwrap();
        assert_eq!(store.load(7, "booking"), None);
    }

    #[test]
    fn mixed_value_items_skipped_individually() {
        let dir = test_dir("mixed_items");
        let store = CacheStore::open(&dir).unwrap();
        fs::write(
            dir.join("7.json"),
            r#"{"booking__fully_booked": ["2024-01-10", 42, "2024-02-01"]}"#,
        )
        .unwrap();
        let loaded = store.load(7, "booking").unwrap();
        assert_eq!(loaded.fully_booked, vec!["2024-01-10", "2024-02-01"]);
    }

    #[test]
    fn load_all_discovers_products_and_fields() {
        let store = CacheStore::open(&test_dir("load_all")).unwrap();
        store.persist(7, "booking", &entry(&["2024-01-10"], &[])).unwrap();
        store.persist(9, "calendar", &entry(&["2024-02-01"], &[])).unwrap();
        let mut all = store.load_all();
        all.sort_by_key(|(pid, _, _)| *pid);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0, 7);
        assert_eq!(all[0].1, "booking");
        assert_eq!(all[1].0, 9);
        assert_eq!(all[1].1, "calendar");
    }

    #[test]
    fn load_all_skips_foreign_files() {
        let dir = test_dir("foreign");
        let store = CacheStore::open(&dir).unwrap();
        fs::write(dir.join("notes.json"), b"{}").unwrap();
        fs::write(dir.join("7.txt"), b"ignore").unwrap();
        assert!(store.load_all().is_empty());
    }
}
