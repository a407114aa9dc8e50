use crate::monitor::message::Message;
use crate::monitor::util::{date_of_messages_key, messages_key};
use crate::monitor::warn::{self, WarnEvent};
use anyhow::{Context, Result};
use fs2::FileExt;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Flat key-value storage behind every ledger operation.
pub trait MessageStore {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
    fn remove(&self, keys: &[String]) -> Result<usize>;
    fn get_all(&self) -> Result<BTreeMap<String, Value>>;

    /// Read-modify-write of a single key. `apply` returns `Some` to write the
    /// new value or `None` to leave the key untouched. No other writer can
    /// interleave between the read and the write.
    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<Value>) -> Result<Option<Value>>,
    ) -> Result<()>;
}

/// All keys live in one JSON object on disk. Every operation holds an
/// advisory lock on a sibling `.lock` file, so concurrent `chatmon`
/// processes serialize per store rather than per date key.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn lock(&self, exclusive: bool) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("failed to open {}", lock_path.display()))?;
        if exclusive {
            file.lock_exclusive()
        } else {
            file.lock_shared()
        }
        .with_context(|| format!("failed to lock {}", lock_path.display()))?;
        Ok(file)
    }

    fn read_map(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        let parsed: Map<String, Value> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(parsed)
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("failed to stage write in {}", parent.display()))?;
        let data = serde_json::to_string_pretty(map)?;
        tmp.write_all(data.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

impl MessageStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.lock(false)?;
        let map = self.read_map()?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.lock(true)?;
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value);
        self.write_map(&map)
    }

    fn remove(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let _guard = self.lock(true)?;
        let mut map = self.read_map()?;
        let removed = keys.iter().filter(|k| map.remove(*k).is_some()).count();
        if removed > 0 {
            self.write_map(&map)?;
        }
        Ok(removed)
    }

    fn get_all(&self) -> Result<BTreeMap<String, Value>> {
        let _guard = self.lock(false)?;
        Ok(self.read_map()?.into_iter().collect())
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<Value>) -> Result<Option<Value>>,
    ) -> Result<()> {
        let _guard = self.lock(true)?;
        let mut map = self.read_map()?;
        if let Some(next) = apply(map.get(key).cloned())? {
            map.insert(key.to_string(), next);
            self.write_map(&map)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: std::cell::RefCell<BTreeMap<String, Value>>,
}

#[cfg(test)]
impl MessageStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, keys: &[String]) -> Result<usize> {
        let mut entries = self.entries.borrow_mut();
        Ok(keys.iter().filter(|k| entries.remove(*k).is_some()).count())
    }

    fn get_all(&self) -> Result<BTreeMap<String, Value>> {
        Ok(self.entries.borrow().clone())
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<Value>) -> Result<Option<Value>>,
    ) -> Result<()> {
        let current = self.entries.borrow().get(key).cloned();
        if let Some(next) = apply(current)? {
            self.entries.borrow_mut().insert(key.to_string(), next);
        }
        Ok(())
    }
}

pub fn decode_bucket(key: &str, value: Value) -> Result<Vec<Message>> {
    serde_json::from_value(value).with_context(|| format!("failed to decode bucket {key}"))
}

/// Messages stored for `date`, in capture order. A missing bucket is empty.
pub fn load_bucket(store: &dyn MessageStore, date: &str) -> Result<Vec<Message>> {
    let key = messages_key(date);
    match store.get(&key)? {
        Some(value) => decode_bucket(&key, value),
        None => Ok(Vec::new()),
    }
}

pub fn save_bucket(store: &dyn MessageStore, date: &str, messages: &[Message]) -> Result<()> {
    store.set(&messages_key(date), serde_json::to_value(messages)?)
}

/// Every date bucket keyed by date. Undecodable buckets are skipped with a
/// warning rather than failing the whole read.
pub fn load_corpus(store: &dyn MessageStore) -> Result<BTreeMap<String, Vec<Message>>> {
    let mut corpus = BTreeMap::new();
    for (key, value) in store.get_all()? {
        let Some(date) = date_of_messages_key(&key) else {
            continue;
        };
        match decode_bucket(&key, value) {
            Ok(messages) => {
                corpus.insert(date.to_string(), messages);
            }
            Err(err) => warn::emit(WarnEvent {
                code: "BUCKET_CORRUPT",
                stage: "load-corpus",
                action: "skip-bucket",
                key: &key,
                reason: "decode-failed",
                err: &format!("{err:#}"),
            }),
        }
    }
    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::message::Role;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tempfile::tempdir;

    fn msg(id: &str) -> Message {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        Message::new(id, Role::User, "hello there friend", "chatgpt", ts)
    }

    #[test]
    fn file_store_set_get_remove_roundtrip() {
        let tmp = tempdir().expect("tempdir");
        let store = JsonFileStore::open(tmp.path().join("nested/store.json"));

        assert!(store.get("missing").expect("get").is_none());
        store.set("a", json!(1)).expect("set a");
        store.set("b", json!({"x": true})).expect("set b");
        assert_eq!(store.get("a").expect("get a"), Some(json!(1)));

        let removed = store
            .remove(&["a".to_string(), "zzz".to_string()])
            .expect("remove");
        assert_eq!(removed, 1);
        let all = store.get_all().expect("all");
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("b"));
    }

    #[test]
    fn file_store_update_skips_write_when_apply_returns_none() {
        let tmp = tempdir().expect("tempdir");
        let store = JsonFileStore::open(tmp.path().join("store.json"));
        store
            .update("k", &mut |current| {
                assert!(current.is_none());
                Ok(Some(json!([1])))
            })
            .expect("first update");
        store
            .update("k", &mut |_| Ok(None))
            .expect("noop update");
        assert_eq!(store.get("k").expect("get"), Some(json!([1])));
    }

    #[test]
    fn corpus_skips_non_message_keys_and_corrupt_buckets() {
        let store = MemoryStore::default();
        save_bucket(&store, "2024-01-02", &[msg("m1")]).expect("save");
        store.set("messages_2024-01-03", json!("garbage")).expect("set");
        store.set("llmConfig", json!({})).expect("set");

        let corpus = load_corpus(&store).expect("corpus");
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus["2024-01-02"][0].id, "m1");
    }

    #[test]
    fn load_bucket_of_missing_date_is_empty() {
        let store = MemoryStore::default();
        assert!(load_bucket(&store, "2024-01-02").expect("load").is_empty());
    }
}
