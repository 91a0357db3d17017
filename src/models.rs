//! Data transfer objects and persisted catalog record shapes.
//!
//! The serde shapes here are the on-disk contract: `Product` is what lands in
//! `products/{id:06}.json`, the index entry structs are what the two flat
//! index documents contain. Field order and nullability are stable.

use serde::{Deserialize, Serialize};

/// One name/value technical specification line on a draft or product.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SpecItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Incoming product draft, submitted as the `payload` multipart field.
///
/// Must validate against the current taxonomy before any write happens.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub manufacturer_id: i64,
    pub category_ids: Vec<i64>,
    pub price_ht: f64,
    pub short_html: String,
    pub long_html: String,

    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub specs: Vec<SpecItem>,
    #[serde(default)]
    pub active: bool,
    /// Accessory product ids. Kept loose on input: integers and digit
    /// strings are accepted, anything else is dropped at publish time.
    #[serde(default)]
    pub accessories: Vec<serde_json::Value>,
}

/// `{id, name}` reference into a taxonomy, as embedded in product records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaxonomyRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptions {
    pub short_html: String,
    pub long_html: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pricing {
    pub currency: String,
    pub price_ht: f64,
    pub price_ttc: Option<f64>,
    pub promo: Option<f64>,
}

/// One image set in `media.images`. Admin uploads carry a single cover file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub source_id_image: Option<i64>,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub images: Vec<ImageEntry>,
    pub pdfs: Vec<String>,
    pub attachments_meta: Vec<serde_json::Value>,
    pub pdfs_missing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relations {
    pub accessories: Vec<i64>,
}

/// Full persisted product record (`products/{id:06}.json`).
///
/// Created by create, rewritten wholesale by update, removed by delete. The
/// catalog directory owns it exclusively; nothing is cached across requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub slug: String,
    pub active: bool,
    pub reference: Option<String>,
    pub name: String,
    pub specs: Vec<SpecItem>,
    pub descriptions: Descriptions,
    pub pricing: Pricing,
    pub manufacturer: TaxonomyRef,
    pub categories: Vec<TaxonomyRef>,
    pub category_paths: Vec<Vec<TaxonomyRef>>,
    pub media: Media,
    pub relations: Relations,
}

/// Denormalized product summary kept in `index.products.json`, in lockstep
/// with the product record on every mutation. Derived data, never a source
/// of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductIndexEntry {
    pub id: i64,
    pub slug: String,
    pub active: bool,
    pub name: String,
    pub price_ht: f64,
    pub manufacturer_name: String,
    pub category_ids: Vec<i64>,
    pub cover_image: String,
}

/// One `{id, haystack}` row of `index.search.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchIndexEntry {
    pub id: i64,
    pub haystack: String,
}

/// Terminal payload of a successful mutation job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishOutcome {
    pub id: i64,
    pub slug: String,
}

/// A fully buffered upload handed to the mutation engine.
///
/// The transport layer materializes multipart streams into memory before the
/// background job runs; the engine never touches a request body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: bytes::Bytes,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: bytes::Bytes) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}
