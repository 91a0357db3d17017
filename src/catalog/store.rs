//! Catalog reader: loads the four JSON documents a catalog root must hold
//! and builds id-keyed taxonomy lookup maps.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::catalog::util::{pad6, read_json};
use crate::errors::PublishError;

pub const PRODUCTS_INDEX_FILE: &str = "index.products.json";
pub const SEARCH_INDEX_FILE: &str = "index.search.json";
pub const ID_STATE_FILE: &str = "index.meta.json";
pub const MANUFACTURERS_FILE: &str = "taxonomies/manufacturers.json";
pub const CATEGORIES_FILE: &str = "taxonomies/categories.json";

/// Well-known locations inside a catalog root.
#[derive(Debug, Clone)]
pub struct CatalogPaths {
    root: PathBuf,
}

impl CatalogPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn products_index(&self) -> PathBuf {
        self.root.join(PRODUCTS_INDEX_FILE)
    }

    pub fn search_index(&self) -> PathBuf {
        self.root.join(SEARCH_INDEX_FILE)
    }

    /// Allocation state (`{"last_product_id": N}`), the high-water mark that
    /// keeps deleted ids from ever being handed out again.
    pub fn id_state(&self) -> PathBuf {
        self.root.join(ID_STATE_FILE)
    }

    pub fn manufacturers(&self) -> PathBuf {
        self.root.join(MANUFACTURERS_FILE)
    }

    pub fn categories(&self) -> PathBuf {
        self.root.join(CATEGORIES_FILE)
    }

    pub fn products_dir(&self) -> PathBuf {
        self.root.join("products")
    }

    pub fn product_file(&self, id: i64) -> PathBuf {
        self.products_dir().join(format!("{}.json", pad6(id)))
    }

    /// Root-relative asset directory for one product, `assets/products/{id}__{slug}`.
    pub fn asset_dir_rel(&self, id: i64, slug: &str) -> String {
        format!("assets/products/{}__{}", id, slug)
    }

    pub fn asset_dir(&self, id: i64, slug: &str) -> PathBuf {
        self.root.join(self.asset_dir_rel(id, slug))
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("reports")
    }
}

/// One freshly loaded view of the catalog documents.
///
/// Index documents stay as raw JSON values so entries written by other tools
/// survive a wholesale rewrite untouched.
#[derive(Debug)]
pub struct CatalogSnapshot {
    pub products_index: Vec<Value>,
    pub search_index: Vec<Value>,
    pub manufacturers_by_id: HashMap<i64, Value>,
    pub categories_by_id: HashMap<i64, Value>,
}

/// Load the catalog documents from `paths`.
///
/// Products index and both taxonomy files are required; a missing search
/// index means an empty list. Index documents whose top level is not an
/// array are rejected as `catalog_invalid`.
pub fn load_catalog(paths: &CatalogPaths) -> Result<CatalogSnapshot, PublishError> {
    for (path, rel) in [
        (paths.products_index(), PRODUCTS_INDEX_FILE),
        (paths.manufacturers(), MANUFACTURERS_FILE),
        (paths.categories(), CATEGORIES_FILE),
    ] {
        if !path.is_file() {
            return Err(PublishError::CatalogMissing(rel.to_string()));
        }
    }

    let products_index = expect_array(read_json(&paths.products_index())?, PRODUCTS_INDEX_FILE)?;
    let search_index = if paths.search_index().is_file() {
        expect_array(read_json(&paths.search_index())?, SEARCH_INDEX_FILE)?
    } else {
        Vec::new()
    };

    let manufacturers = read_json(&paths.manufacturers())?;
    let categories = read_json(&paths.categories())?;

    Ok(CatalogSnapshot {
        products_index,
        search_index,
        manufacturers_by_id: taxonomy_map(&manufacturers, "manufacturers"),
        categories_by_id: taxonomy_map(&categories, "categories"),
    })
}

fn expect_array(value: Value, rel: &str) -> Result<Vec<Value>, PublishError> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(PublishError::CatalogInvalid(format!(
            "{}: expected a JSON array",
            rel
        ))),
    }
}

/// Build an id-keyed map from a `{key: [entries]}` taxonomy document.
///
/// Entries that are not objects, or whose `id` does not coerce to an
/// integer, are skipped silently. A container of the wrong shape degrades
/// to an empty map.
fn taxonomy_map(payload: &Value, key: &str) -> HashMap<i64, Value> {
    let mut by_id = HashMap::new();
    let Some(entries) = payload.get(key).and_then(Value::as_array) else {
        return by_id;
    };
    for entry in entries {
        if !entry.is_object() {
            continue;
        }
        if let Some(id) = entry.get("id").and_then(coerce_int) {
            by_id.insert(id, entry.clone());
        }
    }
    by_id
}

/// Lenient integer coercion for ids: i64, finite floats (truncated), and
/// trimmed digit strings.
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else {
                n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)
            }
        }
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// The coerced `id` field of an index/taxonomy entry, if any.
pub fn entry_id(entry: &Value) -> Option<i64> {
    entry.get("id").and_then(coerce_int)
}

/// The trimmed `name` field of a taxonomy entry, empty when unusable.
pub fn entry_name(entry: &Value) -> String {
    match entry.get("name") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
