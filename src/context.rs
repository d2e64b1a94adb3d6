use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

static GLOBAL: LazyLock<Arc<ExtraFields>> = LazyLock::new(|| Arc::new(ExtraFields::new()));

/// Static key/value pairs merged as top-level fields into every event,
/// e.g. deployment instance id or role.
///
/// Readers always get a consistent snapshot; writers never observe a
/// partially applied update.
#[derive(Debug, Default)]
pub struct ExtraFields {
    entries: RwLock<BTreeMap<String, String>>,
}

impl ExtraFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field, returning the previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.write().insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.entries.write().remove(key)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn extend<I, K, V>(&self, fields: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut entries = self.entries.write();
        for (k, v) in fields {
            entries.insert(k.into(), v.into());
        }
    }

    /// Copy of all entries, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Process-wide registry used by the default publisher. Starts empty.
pub fn global() -> Arc<ExtraFields> {
    Arc::clone(&GLOBAL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn set_get_remove() {
        let fields = ExtraFields::new();
        assert!(fields.is_empty());

        assert_eq!(fields.set("instance", "ps34"), None);
        assert_eq!(fields.set("instance", "ps35"), Some("ps34".to_string()));
        fields.set("role", "webservice");

        assert_eq!(fields.get("instance").as_deref(), Some("ps35"));
        assert_eq!(fields.len(), 2);

        assert_eq!(fields.remove("role").as_deref(), Some("webservice"));
        assert_eq!(fields.get("role"), None);

        fields.clear();
        assert!(fields.is_empty());
    }

    #[test]
    fn snapshot_is_sorted_and_detached() {
        let fields = ExtraFields::new();
        fields.extend([("role", "web"), ("instance", "ps34")]);

        let snapshot = fields.snapshot();
        fields.set("zone", "eu");

        let keys: Vec<_> = snapshot.keys().cloned().collect();
        assert_eq!(keys, vec!["instance", "role"]);
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn concurrent_writers_and_readers() {
        let fields = Arc::new(ExtraFields::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let fields = Arc::clone(&fields);
                thread::spawn(move || {
                    for j in 0..100 {
                        fields.set(format!("k{i}-{j}"), "v");
                        let _ = fields.snapshot();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(fields.len(), 800);
    }
}
