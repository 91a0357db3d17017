//! Catalog mutation engine: create, update and delete products.
//!
//! Each operation validates, stages asset and product writes, then commits
//! the two index documents. Index commits are staged as same-directory temp
//! files and renamed one after the other; the prior bytes of the products
//! index are kept in memory so a failed second rename rolls the first back.
//! Compensating actions registered before the commit (delete the staged
//! product file and asset directory, or restore the previous product bytes)
//! run in reverse order when the commit fails, and the original error is
//! what surfaces.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::catalog::paths::compute_category_paths;
use crate::catalog::store::{coerce_int, entry_id, entry_name, load_catalog, CatalogPaths, CatalogSnapshot};
use crate::catalog::util::{atomic_write_json, ensure_dir, file_ext_from_upload, pad6, read_json, slugify_ascii, strip_html};
use crate::catalog::validate::validate_draft;
use crate::errors::PublishError;
use crate::models::{
    Descriptions, ImageEntry, Media, Pricing, Product, ProductDraft, ProductIndexEntry,
    PublishOutcome, Relations, SearchIndexEntry, SpecItem, TaxonomyRef, UploadedFile,
};

/// Catalog prices are stored tax-exclusive in this currency.
const CURRENCY: &str = "CHF";
const COVER_STEM: &str = "cover-large_default";

/// Sink for per-mutation progress and log lines, implemented by the job
/// tracker. Log lines are emitted before each disk write.
pub trait PublishReporter: Send + Sync {
    fn log(&self, line: &str);
    fn progress(&self, pct: u8);
}

/// Compensating actions to undo staged writes when the index commit fails.
///
/// Steps run best-effort in reverse registration order; failures while
/// compensating are logged and swallowed so the original error surfaces.
#[derive(Default)]
pub(crate) struct Rollback {
    steps: Vec<RollbackStep>,
}

enum RollbackStep {
    RemoveFile(PathBuf),
    RemoveDirAll(PathBuf),
    RestoreFile { path: PathBuf, bytes: Vec<u8> },
}

impl Rollback {
    fn new() -> Self {
        Self::default()
    }

    fn remove_file(&mut self, path: PathBuf) {
        self.steps.push(RollbackStep::RemoveFile(path));
    }

    fn remove_dir_all(&mut self, path: PathBuf) {
        self.steps.push(RollbackStep::RemoveDirAll(path));
    }

    fn restore_file(&mut self, path: PathBuf, bytes: Vec<u8>) {
        self.steps.push(RollbackStep::RestoreFile { path, bytes });
    }

    fn run(self) {
        for step in self.steps.into_iter().rev() {
            let outcome = match step {
                RollbackStep::RemoveFile(path) => {
                    if path.exists() {
                        fs::remove_file(&path).map_err(|e| (path, e))
                    } else {
                        Ok(())
                    }
                }
                RollbackStep::RemoveDirAll(path) => {
                    if path.exists() {
                        fs::remove_dir_all(&path).map_err(|e| (path, e))
                    } else {
                        Ok(())
                    }
                }
                RollbackStep::RestoreFile { path, bytes } => {
                    fs::write(&path, bytes).map_err(|e| (path, e))
                }
            };
            if let Err((path, err)) = outcome {
                warn!(path = %path.display(), error = %err, "rollback step failed");
            }
        }
    }
}

/// Stage a JSON document as a temp file next to its target.
fn stage_json<T: Serialize>(target: &Path, value: &T) -> Result<tempfile::NamedTempFile, PublishError> {
    let parent = target
        .parent()
        .ok_or_else(|| PublishError::Internal(format!("no parent directory for {}", target.display())))?;
    ensure_dir(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    Ok(tmp)
}

/// Commit both index documents.
///
/// Serialization happens fully before the first rename, so a failure while
/// staging touches nothing. If the search-index rename fails after the
/// products index already went in, the prior products-index bytes are put
/// back: a failed commit leaves both documents as they were.
fn commit_indexes(
    paths: &CatalogPaths,
    products_index: &[Value],
    search_index: &[Value],
) -> Result<(), PublishError> {
    let products_path = paths.products_index();
    let search_path = paths.search_index();
    let prior_products = fs::read(&products_path).ok();

    let products_tmp = stage_json(&products_path, &products_index)?;
    let search_tmp = stage_json(&search_path, &search_index)?;

    products_tmp
        .persist(&products_path)
        .map_err(|e| PublishError::Internal(format!("index rename failed: {}", e.error)))?;

    if let Err(e) = search_tmp.persist(&search_path) {
        if let Some(bytes) = prior_products {
            if let Err(restore_err) = fs::write(&products_path, bytes) {
                warn!(error = %restore_err, "failed restoring products index after aborted commit");
            }
        }
        return Err(PublishError::Internal(format!(
            "index rename failed: {}",
            e.error
        )));
    }
    Ok(())
}

/// Highest id ever allocated, from the id state document. A missing or
/// unparsable document reads as zero.
fn last_allocated_id(paths: &CatalogPaths) -> i64 {
    let path = paths.id_state();
    if !path.is_file() {
        return 0;
    }
    read_json(&path)
        .ok()
        .and_then(|v| v.get("last_product_id").and_then(coerce_int))
        .unwrap_or(0)
}

/// Allocate the next product id: one past the highest id either currently
/// indexed or ever recorded in the id state. Deleting a product never frees
/// its id; a create that fails after allocation leaves a gap.
fn next_product_id(paths: &CatalogPaths, products_index: &[Value]) -> i64 {
    let indexed = products_index.iter().filter_map(entry_id).max().unwrap_or(0);
    indexed.max(last_allocated_id(paths)).max(0) + 1
}

fn resolve_manufacturer(snapshot: &CatalogSnapshot, id: i64) -> Result<TaxonomyRef, PublishError> {
    let entry = snapshot
        .manufacturers_by_id
        .get(&id)
        .ok_or_else(|| PublishError::Internal(format!("manufacturer {} disappeared during publish", id)))?;
    Ok(TaxonomyRef {
        id,
        name: entry_name(entry),
    })
}

fn resolve_categories(
    snapshot: &CatalogSnapshot,
    category_ids: &[i64],
) -> Result<Vec<TaxonomyRef>, PublishError> {
    category_ids
        .iter()
        .map(|&cid| {
            let entry = snapshot
                .categories_by_id
                .get(&cid)
                .ok_or_else(|| PublishError::Internal(format!("category {} disappeared during publish", cid)))?;
            let mut name = entry_name(entry);
            if name.is_empty() {
                name = cid.to_string();
            }
            Ok(TaxonomyRef { id: cid, name })
        })
        .collect()
}

fn clean_specs(specs: &[SpecItem]) -> Vec<SpecItem> {
    specs
        .iter()
        .filter_map(|s| {
            let name = s.name.trim();
            let value = s.value.trim();
            if name.is_empty() || value.is_empty() {
                None
            } else {
                Some(SpecItem {
                    name: name.to_string(),
                    value: value.to_string(),
                })
            }
        })
        .collect()
}

/// Accessory ids arrive loosely typed: integers pass through, digit-only
/// strings are parsed, everything else is dropped.
pub(crate) fn coerce_accessory_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => s.parse().ok(),
        _ => None,
    }
}

fn clean_accessories(accessories: &[Value]) -> Vec<i64> {
    accessories.iter().filter_map(coerce_accessory_id).collect()
}

fn search_haystack(name: &str, categories: &[TaxonomyRef], manufacturer_name: &str, short_html: &str) -> String {
    let category_names = categories
        .iter()
        .filter(|c| !c.name.is_empty())
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "{} {} {} {}",
        name,
        category_names,
        manufacturer_name,
        strip_html(short_html)
    )
    .trim()
    .to_string()
}

fn build_product(
    id: i64,
    slug: &str,
    draft: &ProductDraft,
    manufacturer: TaxonomyRef,
    categories: Vec<TaxonomyRef>,
    category_paths: Vec<Vec<TaxonomyRef>>,
    cover_rel: &str,
    pdfs: Vec<String>,
) -> Product {
    let pdfs_missing = pdfs.is_empty();
    Product {
        id,
        slug: slug.to_string(),
        active: draft.active,
        reference: draft.reference.clone().filter(|r| !r.is_empty()),
        name: draft.name.clone(),
        specs: clean_specs(&draft.specs),
        descriptions: Descriptions {
            short_html: draft.short_html.clone(),
            long_html: draft.long_html.clone(),
        },
        pricing: Pricing {
            currency: CURRENCY.to_string(),
            price_ht: draft.price_ht,
            price_ttc: None,
            promo: None,
        },
        manufacturer,
        categories,
        category_paths,
        media: Media {
            images: vec![ImageEntry {
                kind: "admin".to_string(),
                source_id_image: None,
                files: vec![cover_rel.to_string()],
            }],
            pdfs,
            attachments_meta: Vec::new(),
            pdfs_missing,
        },
        relations: Relations {
            accessories: clean_accessories(&draft.accessories),
        },
    }
}

fn index_entry(product: &Product, draft: &ProductDraft, cover_rel: &str) -> ProductIndexEntry {
    ProductIndexEntry {
        id: product.id,
        slug: product.slug.clone(),
        active: draft.active,
        name: draft.name.clone(),
        price_ht: draft.price_ht,
        manufacturer_name: product.manufacturer.name.clone(),
        category_ids: draft.category_ids.clone(),
        cover_image: cover_rel.to_string(),
    }
}

fn write_upload(path: &Path, upload: &UploadedFile) -> Result<(), PublishError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, &upload.bytes)?;
    Ok(())
}

/// Create a new product from a validated draft.
///
/// Allocates one past the id high-water mark (ids are never reused, even
/// after deletes), derives the slug, writes cover image and optional PDF
/// under the asset directory,
/// writes the product record atomically, then commits both indexes. On a
/// failed commit the product file and asset directory are removed again.
pub fn create_product(
    paths: &CatalogPaths,
    draft: &ProductDraft,
    image: &UploadedFile,
    pdf: Option<&UploadedFile>,
    reporter: &dyn PublishReporter,
) -> Result<PublishOutcome, PublishError> {
    reporter.progress(1);
    validate_draft(paths, draft)?;
    reporter.log("Draft contract OK");

    let snapshot = load_catalog(paths)?;
    let mut products_index = snapshot.products_index.clone();
    let mut search_index = snapshot.search_index.clone();

    let id = next_product_id(paths, &products_index);
    // Record the allocation before any asset write: rolled-back creates
    // leave a gap rather than a reusable id.
    atomic_write_json(&paths.id_state(), &serde_json::json!({ "last_product_id": id }))?;

    let mut slug = slugify_ascii(&draft.name);
    if slug.is_empty() {
        slug = format!("produit-{}", id);
    }

    let manufacturer = resolve_manufacturer(&snapshot, draft.manufacturer_id)?;
    let categories = resolve_categories(&snapshot, &draft.category_ids)?;
    let category_paths = compute_category_paths(&draft.category_ids, &snapshot.categories_by_id);

    let asset_rel = paths.asset_dir_rel(id, &slug);
    let asset_dir = paths.asset_dir(id, &slug);
    let product_path = paths.product_file(id);

    let ext = file_ext_from_upload(&image.filename);
    let cover_rel = format!("{}/images/{}.{}", asset_rel, COVER_STEM, ext);
    reporter.log(&format!("Writing image: {}", cover_rel));
    write_upload(&paths.root().join(&cover_rel), image)?;
    reporter.progress(45);

    let mut pdfs = Vec::new();
    if let Some(pdf) = pdf {
        let pdf_rel = format!("{}/pdf/fiche.pdf", asset_rel);
        reporter.log(&format!("Writing PDF: {}", pdf_rel));
        write_upload(&paths.root().join(&pdf_rel), pdf)?;
        pdfs.push(pdf_rel);
    }
    reporter.progress(65);

    let product = build_product(
        id,
        &slug,
        draft,
        manufacturer,
        categories,
        category_paths,
        &cover_rel,
        pdfs,
    );

    reporter.log(&format!("Writing product: products/{}.json", pad6(id)));
    atomic_write_json(&product_path, &product)?;
    reporter.progress(78);

    products_index.push(serde_json::to_value(index_entry(&product, draft, &cover_rel))?);

    let haystack = search_haystack(
        &draft.name,
        &product.categories,
        &product.manufacturer.name,
        &draft.short_html,
    );
    search_index.retain(|entry| entry_id(entry) != Some(id));
    search_index.push(serde_json::to_value(SearchIndexEntry { id, haystack })?);

    let mut rollback = Rollback::new();
    rollback.remove_file(product_path);
    rollback.remove_dir_all(asset_dir);

    reporter.log("Committing index files");
    if let Err(err) = commit_indexes(paths, &products_index, &search_index) {
        reporter.log(&format!("Index write failed, rolling back: {}", err));
        rollback.run();
        return Err(err);
    }

    reporter.progress(100);
    Ok(PublishOutcome { id, slug })
}

/// Rewrite an existing product in place.
///
/// The record is fully rebuilt (never patched); slug and asset directory
/// stay what they were. A failed index commit restores the pre-update
/// product bytes exactly.
pub fn update_product(
    paths: &CatalogPaths,
    product_id: i64,
    draft: &ProductDraft,
    image: Option<&UploadedFile>,
    pdf: Option<&UploadedFile>,
    remove_pdf: bool,
    reporter: &dyn PublishReporter,
) -> Result<PublishOutcome, PublishError> {
    reporter.progress(1);
    validate_draft(paths, draft)?;
    reporter.log("Draft contract OK");

    let snapshot = load_catalog(paths)?;
    let mut products_index = snapshot.products_index.clone();
    let mut search_index = snapshot.search_index.clone();

    let product_path = paths.product_file(product_id);
    if !product_path.is_file() {
        return Err(PublishError::NotFound(format!("product {}", product_id)));
    }

    let existing_bytes =
        fs::read(&product_path).map_err(|e| PublishError::Internal(format!("cannot read product: {}", e)))?;
    let existing: Value = serde_json::from_slice(&existing_bytes)
        .map_err(|e| PublishError::CatalogInvalid(format!("existing product unparsable: {}", e)))?;
    let slug = existing
        .get("slug")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("")
        .to_string();
    if slug.is_empty() {
        return Err(PublishError::CatalogInvalid("existing product has no slug".into()));
    }

    let manufacturer = resolve_manufacturer(&snapshot, draft.manufacturer_id)?;
    let categories = resolve_categories(&snapshot, &draft.category_ids)?;
    let category_paths = compute_category_paths(&draft.category_ids, &snapshot.categories_by_id);

    let asset_rel = paths.asset_dir_rel(product_id, &slug);
    let asset_dir = paths.asset_dir(product_id, &slug);
    let images_dir = asset_dir.join("images");
    let pdf_dir = asset_dir.join("pdf");
    ensure_dir(&images_dir)?;

    // Optional image replacement; stale cover variants are swept afterwards.
    let mut cover_rel: Option<String> = None;
    if let Some(image) = image {
        let ext = file_ext_from_upload(&image.filename);
        let rel = format!("{}/images/{}.{}", asset_rel, COVER_STEM, ext);
        reporter.log(&format!("Replacing image: {}", rel));
        write_upload(&paths.root().join(&rel), image)?;

        let keep = format!("{}.{}", COVER_STEM, ext);
        let stale_prefix = format!("{}.", COVER_STEM);
        if let Ok(entries) = fs::read_dir(&images_dir) {
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with(&stale_prefix) && name != keep {
                    if let Err(e) = fs::remove_file(entry.path()) {
                        warn!(file = %name, error = %e, "failed removing stale cover file");
                    }
                }
            }
        }
        cover_rel = Some(rel);
    }
    reporter.progress(45);

    if remove_pdf && pdf_dir.is_dir() {
        if let Ok(entries) = fs::read_dir(&pdf_dir) {
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().to_lowercase();
                if name.ends_with(".pdf") {
                    if let Err(e) = fs::remove_file(entry.path()) {
                        warn!(file = %name, error = %e, "failed removing pdf");
                    }
                }
            }
        }
    }

    let mut pdfs = Vec::new();
    if let Some(pdf) = pdf {
        let pdf_rel = format!("{}/pdf/fiche.pdf", asset_rel);
        reporter.log(&format!("Replacing PDF: {}", pdf_rel));
        write_upload(&paths.root().join(&pdf_rel), pdf)?;
        pdfs.push(pdf_rel);
    } else if pdf_dir.join("fiche.pdf").is_file() {
        pdfs.push(format!("{}/pdf/fiche.pdf", asset_rel));
    }
    reporter.progress(65);

    // Without a new upload the current cover is looked up in the index
    // entry first, then by globbing the images directory.
    let cover_rel = match cover_rel {
        Some(rel) => rel,
        None => {
            let from_index = products_index
                .iter()
                .find(|entry| entry_id(entry) == Some(product_id))
                .and_then(|entry| entry.get("cover_image"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            let cover_prefix = format!("{}.", COVER_STEM);
            let resolved = from_index.or_else(|| {
                fs::read_dir(&images_dir).ok().and_then(|entries| {
                    entries.flatten().find_map(|entry| {
                        let name = entry.file_name().to_string_lossy().to_string();
                        name.starts_with(&cover_prefix)
                            .then(|| format!("{}/images/{}", asset_rel, name))
                    })
                })
            });
            resolved.ok_or_else(|| {
                PublishError::CatalogInvalid("cover image not resolvable (supply an image)".into())
            })?
        }
    };

    let product = build_product(
        product_id,
        &slug,
        draft,
        manufacturer,
        categories,
        category_paths,
        &cover_rel,
        pdfs,
    );

    reporter.log(&format!("Rewriting product: products/{}.json", pad6(product_id)));
    atomic_write_json(&product_path, &product)?;
    reporter.progress(78);

    let new_entry = serde_json::to_value(index_entry(&product, draft, &cover_rel))?;
    match products_index
        .iter()
        .position(|entry| entry_id(entry) == Some(product_id))
    {
        Some(pos) => products_index[pos] = new_entry,
        // Defensive: a product file without an index entry should not occur.
        None => products_index.push(new_entry),
    }

    let haystack = search_haystack(
        &draft.name,
        &product.categories,
        &product.manufacturer.name,
        &draft.short_html,
    );
    search_index.retain(|entry| entry_id(entry) != Some(product_id));
    search_index.push(serde_json::to_value(SearchIndexEntry {
        id: product_id,
        haystack,
    })?);

    let mut rollback = Rollback::new();
    rollback.restore_file(product_path, existing_bytes);

    reporter.log("Committing index files");
    if let Err(err) = commit_indexes(paths, &products_index, &search_index) {
        reporter.log(&format!("Index write failed, restoring product: {}", err));
        rollback.run();
        return Err(err);
    }

    reporter.progress(100);
    Ok(PublishOutcome {
        id: product_id,
        slug,
    })
}

/// Remove a product from the catalog.
///
/// The indexes are rewritten first: an index that no longer references a
/// still-present product file is a recoverable orphan, the reverse is not.
/// A product file or asset directory already gone counts as deleted.
pub fn delete_product(
    paths: &CatalogPaths,
    product_id: i64,
    reporter: &dyn PublishReporter,
) -> Result<PublishOutcome, PublishError> {
    reporter.progress(1);
    let snapshot = load_catalog(paths)?;

    let slug: Option<String> = snapshot
        .products_index
        .iter()
        .find(|entry| entry_id(entry) == Some(product_id))
        .and_then(|entry| entry.get("slug"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let products_index: Vec<Value> = snapshot
        .products_index
        .iter()
        .filter(|entry| entry_id(entry) != Some(product_id))
        .cloned()
        .collect();
    let search_index: Vec<Value> = snapshot
        .search_index
        .iter()
        .filter(|entry| entry_id(entry) != Some(product_id))
        .cloned()
        .collect();

    reporter.log("Committing index files");
    commit_indexes(paths, &products_index, &search_index)?;
    reporter.progress(55);

    let product_path = paths.product_file(product_id);
    if product_path.is_file() {
        reporter.log(&format!("Deleting product: products/{}.json", pad6(product_id)));
        fs::remove_file(&product_path)
            .map_err(|e| PublishError::DeleteFailed(format!("cannot delete product file: {}", e)))?;
    }
    reporter.progress(75);

    if let Some(slug) = &slug {
        let asset_dir = paths.asset_dir(product_id, slug);
        if asset_dir.is_dir() {
            reporter.log(&format!(
                "Deleting assets: {}/",
                paths.asset_dir_rel(product_id, slug)
            ));
            fs::remove_dir_all(&asset_dir)
                .map_err(|e| PublishError::DeleteFailed(format!("cannot delete assets: {}", e)))?;
        }
    }

    reporter.progress(100);
    Ok(PublishOutcome {
        id: product_id,
        slug: slug.unwrap_or_default(),
    })
}
