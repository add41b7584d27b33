//! In-memory bazaar discovery catalog.
//!
//! Keyed by resource URL; re-discovery of a URL replaces its entry.
//! Durable catalog storage is deliberately out of scope — this backs
//! `GET /discovery/resources` for a single facilitator process.

use std::sync::Mutex;

use serde_json::{Value, json};

use h402::bazaar::DiscoveredResource;
use h402_proto::UnixTimestamp;

struct Entry {
    resource: String,
    x402_version: u32,
    accepts: Vec<Value>,
    discovery_info: Option<Value>,
    last_updated: u64,
}

impl Entry {
    fn to_json(&self) -> Value {
        let mut item = json!({
            "resource": self.resource,
            "type": "http",
            "x402Version": self.x402_version,
            "accepts": self.accepts,
            "lastUpdated": self.last_updated,
            "metadata": {},
        });
        if let Some(info) = &self.discovery_info {
            item["discoveryInfo"] = info.clone();
        }
        item
    }
}

/// Catalog of resources discovered through verified payments.
#[derive(Default)]
pub struct BazaarCatalog {
    entries: Mutex<Vec<Entry>>,
}

impl std::fmt::Debug for BazaarCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BazaarCatalog")
            .field("resources", &self.count())
            .finish()
    }
}

impl BazaarCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a discovered resource, replacing any previous entry for
    /// the same URL.
    pub fn record(&self, discovered: &DiscoveredResource) {
        let entry = Entry {
            resource: discovered.resource_url.clone(),
            x402_version: discovered.x402_version,
            accepts: vec![discovered.payment_requirements.clone()],
            discovery_info: serde_json::to_value(&discovered.discovery_info).ok(),
            last_updated: UnixTimestamp::now().as_secs(),
        };

        let mut entries = self.entries.lock().expect("catalog lock");
        if let Some(existing) = entries
            .iter_mut()
            .find(|e| e.resource == discovered.resource_url)
        {
            *existing = entry;
        } else {
            entries.push(entry);
        }
    }

    /// Returns a page of discovered resources in discovery order.
    #[must_use]
    pub fn page(&self, limit: usize, offset: usize) -> Value {
        let entries = self.entries.lock().expect("catalog lock");
        let items: Vec<Value> = entries
            .iter()
            .skip(offset)
            .take(limit)
            .map(Entry::to_json)
            .collect();
        json!({
            "x402Version": 2,
            "items": items,
            "pagination": {
                "limit": limit,
                "offset": offset,
                "total": entries.len(),
            }
        })
    }

    /// Number of cataloged resources.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.lock().expect("catalog lock").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use h402::bazaar::{BAZAAR, declare_discovery_extension, extract_discovery_info};

    fn discovered(url: &str) -> DiscoveredResource {
        let extensions = declare_discovery_extension(json!({"q": "x"}), None, None, None);
        let payload = json!({
            "x402Version": 2,
            "resource": {"url": url},
            "extensions": {BAZAAR: extensions[BAZAAR].clone()},
            "accepted": {},
        });
        extract_discovery_info(&payload, &json!({"scheme": "exact"})).unwrap()
    }

    #[test]
    fn records_and_paginates() {
        let catalog = BazaarCatalog::new();
        catalog.record(&discovered("https://a.example/one"));
        catalog.record(&discovered("https://a.example/two"));
        catalog.record(&discovered("https://a.example/one"));
        assert_eq!(catalog.count(), 2);

        let page = catalog.page(1, 0);
        assert_eq!(page["pagination"]["total"], 2);
        assert_eq!(page["items"].as_array().unwrap().len(), 1);
        assert_eq!(page["items"][0]["resource"], "https://a.example/one");
        assert_eq!(page["items"][0]["type"], "http");

        let rest = catalog.page(10, 1);
        assert_eq!(rest["items"][0]["resource"], "https://a.example/two");
    }
}
