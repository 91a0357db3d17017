//! File-based product catalog: reader, validator, breadcrumb resolver and
//! the mutation engine, fronted by [`CatalogService`].

pub mod paths;
pub mod publish;
pub mod store;
pub mod util;
pub mod validate;

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use tracing::instrument;

use crate::errors::PublishError;
use crate::models::{ProductDraft, PublishOutcome, UploadedFile};

pub use publish::PublishReporter;
pub use store::CatalogPaths;

/// Service facade over one catalog root.
///
/// Mutations serialize on an internal mutex held from validation through
/// the index commit, so two jobs against the same root cannot interleave
/// their filesystem writes. Writers in other processes remain
/// unsynchronized.
pub struct CatalogService {
    paths: CatalogPaths,
    write_lock: Mutex<()>,
}

impl CatalogService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            paths: CatalogPaths::new(root.into()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn paths(&self) -> &CatalogPaths {
        &self.paths
    }

    fn write_guard(&self) -> MutexGuard<'_, ()> {
        // A poisoned lock only means another mutation panicked; the catalog
        // files themselves are guarded by atomic renames.
        self.write_lock.lock().unwrap_or_else(|p| p.into_inner())
    }

    #[instrument(skip_all, fields(name = %draft.name))]
    pub fn create_product(
        &self,
        draft: &ProductDraft,
        image: &UploadedFile,
        pdf: Option<&UploadedFile>,
        reporter: &dyn PublishReporter,
    ) -> Result<PublishOutcome, PublishError> {
        let _guard = self.write_guard();
        publish::create_product(&self.paths, draft, image, pdf, reporter)
    }

    #[instrument(skip_all, fields(product_id))]
    pub fn update_product(
        &self,
        product_id: i64,
        draft: &ProductDraft,
        image: Option<&UploadedFile>,
        pdf: Option<&UploadedFile>,
        remove_pdf: bool,
        reporter: &dyn PublishReporter,
    ) -> Result<PublishOutcome, PublishError> {
        let _guard = self.write_guard();
        publish::update_product(&self.paths, product_id, draft, image, pdf, remove_pdf, reporter)
    }

    #[instrument(skip_all, fields(product_id))]
    pub fn delete_product(
        &self,
        product_id: i64,
        reporter: &dyn PublishReporter,
    ) -> Result<PublishOutcome, PublishError> {
        let _guard = self.write_guard();
        publish::delete_product(&self.paths, product_id, reporter)
    }
}
