//! Draft validation against the current taxonomy state.

use crate::catalog::store::{load_catalog, CatalogPaths};
use crate::errors::PublishError;
use crate::models::ProductDraft;

/// Validate a product draft.
///
/// Field checks run first; referential checks re-load the taxonomy files on
/// every call so the latest on-disk state is what the draft is held against.
/// The unknown-category message lists every missing id, not just the first.
pub fn validate_draft(paths: &CatalogPaths, draft: &ProductDraft) -> Result<(), PublishError> {
    if draft.name.trim().is_empty() {
        return Err(PublishError::InvalidDraft("name is required".into()));
    }
    if draft.short_html.trim().is_empty() {
        return Err(PublishError::InvalidDraft("short_html is required".into()));
    }
    if draft.long_html.trim().is_empty() {
        return Err(PublishError::InvalidDraft("long_html is required".into()));
    }

    // `>= 0` written negated so NaN is rejected too.
    if !(draft.price_ht >= 0.0) {
        return Err(PublishError::InvalidDraft("price_ht must be >= 0".into()));
    }

    if draft.category_ids.is_empty() {
        return Err(PublishError::InvalidDraft(
            "category_ids must contain at least one id".into(),
        ));
    }

    let snapshot = load_catalog(paths)?;

    if !snapshot.manufacturers_by_id.contains_key(&draft.manufacturer_id) {
        return Err(PublishError::InvalidDraft(format!(
            "unknown manufacturer_id: {}",
            draft.manufacturer_id
        )));
    }

    let missing: Vec<i64> = draft
        .category_ids
        .iter()
        .copied()
        .filter(|cid| !snapshot.categories_by_id.contains_key(cid))
        .collect();
    if !missing.is_empty() {
        return Err(PublishError::InvalidDraft(format!(
            "unknown category_ids: {:?}",
            missing
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::store::{CATEGORIES_FILE, MANUFACTURERS_FILE, PRODUCTS_INDEX_FILE};
    use crate::catalog::util::atomic_write_json;
    use serde_json::json;

    fn fixture() -> (tempfile::TempDir, CatalogPaths) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        atomic_write_json(&root.join(PRODUCTS_INDEX_FILE), &json!([])).unwrap();
        atomic_write_json(
            &root.join(MANUFACTURERS_FILE),
            &json!({"manufacturers": [{"id": 1, "name": "Acme"}]}),
        )
        .unwrap();
        atomic_write_json(
            &root.join(CATEGORIES_FILE),
            &json!({"categories": [
                {"id": 10, "name": "Root", "id_parent": 0},
                {"id": 11, "name": "Leaf", "id_parent": 10}
            ]}),
        )
        .unwrap();
        let paths = CatalogPaths::new(root);
        (dir, paths)
    }

    fn draft() -> ProductDraft {
        serde_json::from_value(json!({
            "name": "Tensiomètre",
            "manufacturer_id": 1,
            "category_ids": [10, 11],
            "price_ht": 49.0,
            "short_html": "<p>court</p>",
            "long_html": "<p>long</p>"
        }))
        .unwrap()
    }

    #[test]
    fn valid_draft_passes() {
        let (_dir, paths) = fixture();
        assert!(validate_draft(&paths, &draft()).is_ok());
    }

    #[test]
    fn blank_required_text_fields_are_rejected() {
        let (_dir, paths) = fixture();

        let mut d = draft();
        d.name = "   ".into();
        assert_eq!(validate_draft(&paths, &d).unwrap_err().code(), "invalid_draft");

        let mut d = draft();
        d.short_html = "".into();
        assert_eq!(validate_draft(&paths, &d).unwrap_err().code(), "invalid_draft");

        let mut d = draft();
        d.long_html = "\n\t".into();
        assert_eq!(validate_draft(&paths, &d).unwrap_err().code(), "invalid_draft");
    }

    #[test]
    fn negative_or_nan_price_is_rejected() {
        let (_dir, paths) = fixture();

        let mut d = draft();
        d.price_ht = -0.01;
        assert_eq!(validate_draft(&paths, &d).unwrap_err().code(), "invalid_draft");

        let mut d = draft();
        d.price_ht = f64::NAN;
        assert_eq!(validate_draft(&paths, &d).unwrap_err().code(), "invalid_draft");
    }

    #[test]
    fn empty_category_ids_are_rejected() {
        let (_dir, paths) = fixture();
        let mut d = draft();
        d.category_ids.clear();
        assert_eq!(validate_draft(&paths, &d).unwrap_err().code(), "invalid_draft");
    }

    #[test]
    fn unknown_manufacturer_is_rejected() {
        let (_dir, paths) = fixture();
        let mut d = draft();
        d.manufacturer_id = 777;
        let err = validate_draft(&paths, &d).unwrap_err();
        assert_eq!(err.code(), "invalid_draft");
        assert!(err.detail().contains("777"));
    }

    #[test]
    fn unknown_categories_are_all_listed() {
        let (_dir, paths) = fixture();
        let mut d = draft();
        d.category_ids = vec![10, 404, 405];
        let err = validate_draft(&paths, &d).unwrap_err();
        assert_eq!(err.code(), "invalid_draft");
        assert!(err.detail().contains("404"));
        assert!(err.detail().contains("405"));
        assert!(!err.detail().contains("10,"));
    }

    #[test]
    fn validation_sees_fresh_taxonomy_state() {
        let (dir, paths) = fixture();
        let mut d = draft();
        d.category_ids = vec![12];
        assert!(validate_draft(&paths, &d).is_err());

        // Category 12 appears on disk between calls; re-validation picks it up.
        atomic_write_json(
            &dir.path().join(CATEGORIES_FILE),
            &json!({"categories": [{"id": 12, "name": "New", "id_parent": 0}]}),
        )
        .unwrap();
        assert!(validate_draft(&paths, &d).is_ok());
    }
}
