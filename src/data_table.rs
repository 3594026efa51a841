use std::collections::HashMap;

use crate::module::Record;

/// Ordered `URL -> ParseResult | bottom` mapping.
///
/// Preserves seed insertion order via `seeds`; `slots` holds `None` for
/// bottom (not yet fetched this crawl) and `Some(records)` once a completion
/// has been merged. A 404 removes the url from both.
#[derive(Debug, Default)]
pub struct DataTable {
    seeds: Vec<String>,
    slots: HashMap<String, Option<Vec<Record>>>,
}

impl DataTable {
    pub fn new(seeds: Vec<String>) -> Self {
        let mut slots = HashMap::with_capacity(seeds.len());
        for url in &seeds {
            slots.insert(url.clone(), None);
        }
        DataTable { seeds, slots }
    }

    pub fn seeds(&self) -> &[String] {
        &self.seeds
    }

    /// Full replacement, not an append -- a re-crawl replaces the entire
    /// list for `url`.
    pub fn set(&mut self, url: &str, records: Vec<Record>) {
        self.slots.insert(url.to_string(), Some(records));
    }

    /// Removes `url` from the seed list entirely (404 pruning). Subsequent
    /// ticks never see it again.
    pub fn prune(&mut self, url: &str) {
        self.seeds.retain(|u| u != url);
        self.slots.remove(url);
    }

    /// Concatenates every non-bottom slot in seed order. The bool is `true`
    /// when every seed had data (a complete export).
    pub fn export(&self) -> (Vec<Record>, bool) {
        let mut out = Vec::new();
        let mut complete = true;

        for url in &self.seeds {
            match self.slots.get(url).and_then(|slot| slot.as_ref()) {
                Some(records) => out.extend(records.iter().cloned()),
                None => complete = false,
            }
        }

        (out, complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn export_is_partial_until_every_seed_has_data() {
        let mut table = DataTable::new(vec!["a".into(), "b".into()]);
        table.set("a", vec![json!("x")]);

        let (records, complete) = table.export();
        assert_eq!(records, vec![json!("x")]);
        assert!(!complete);

        table.set("b", vec![json!("y")]);
        let (records, complete) = table.export();
        assert_eq!(records, vec![json!("x"), json!("y")]);
        assert!(complete);
    }

    #[test]
    fn prune_removes_seed_and_slot() {
        let mut table = DataTable::new(vec!["a".into(), "b".into()]);
        table.set("a", vec![json!("x")]);
        table.prune("b");

        assert_eq!(table.seeds(), &["a".to_string()]);
        let (records, complete) = table.export();
        assert_eq!(records, vec![json!("x")]);
        assert!(complete);
    }

    #[test]
    fn set_is_replace_not_append() {
        let mut table = DataTable::new(vec!["a".into()]);
        table.set("a", vec![json!("v1")]);
        table.set("a", vec![json!("v2")]);
        assert_eq!(table.export().0, vec![json!("v2")]);
    }
}
