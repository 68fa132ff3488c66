//! # Backup Exchange
//!
//! Serializes the full dataset to a portable artifact and restores it.
//!
//! ## Import Id Remapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Why ids are never trusted on import                   │
//! │                                                                         │
//! │  artifact                         destination                           │
//! │  ────────                         ───────────                           │
//! │  product id 1 "Milk"              product id 1 "Bread"  ← already here │
//! │  product id 2 "Eggs"                                                    │
//! │                                                                         │
//! │  Import re-allocates every id locally and keeps a per-run              │
//! │  old-id → new-id map so relationships survive:                         │
//! │                                                                         │
//! │    artifact store uuid  ──map──►  local store uuid                     │
//! │    artifact category id ──map──►  local category id                    │
//! │    product → batches              nested, re-inserted under new id     │
//! │    legacy store names             carried through verbatim             │
//! │                                                                         │
//! │  Everything runs in ONE write transaction. Photo files are written     │
//! │  while it is open; any failure rolls the records back and removes      │
//! │  the files already written — never a half-imported dataset.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stores and categories are matched by name against local records first
//! and reused when an equal-named one exists, so importing a backup into a
//! phone that already knows "Corner Market" does not duplicate it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::id::{next_id, EntityKind};
use crate::images::ImageStore;
use crate::pool::Database;
use larder_core::types::{BatchStatus, Product, StoreRef};
use larder_core::validation::validate_product_name;

/// Artifact format version this build writes and the newest it can read.
pub const BACKUP_VERSION: u32 = 1;

// =============================================================================
// Artifact Format
// =============================================================================

/// The portable snapshot: self-contained, including photo bytes.
#[derive(Debug, Serialize, Deserialize)]
pub struct BackupArtifact {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub stores: Vec<BackupStore>,
    pub categories: Vec<BackupCategory>,
    pub products: Vec<BackupProduct>,
    pub photos: Vec<BackupPhoto>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackupStore {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackupCategory {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackupProduct {
    pub id: i64,
    pub name: String,
    pub code: Option<String>,
    pub photo: Option<String>,
    /// Raw store value: a store uuid (resolved through the artifact's store
    /// list on import) or a legacy name (carried through verbatim).
    pub store: Option<String>,
    pub categories: Vec<String>,
    pub batches: Vec<BackupBatch>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackupBatch {
    pub id: i64,
    pub label: String,
    pub amount: i64,
    pub price_cents: Option<i64>,
    pub exp_date: NaiveDate,
    pub status: String,
}

/// A photo file embedded as base64, keyed by the file name products
/// reference.
#[derive(Debug, Serialize, Deserialize)]
pub struct BackupPhoto {
    pub file_name: String,
    pub data: String,
}

impl BackupProduct {
    fn from_product(product: Product) -> Self {
        BackupProduct {
            id: product.id,
            name: product.name,
            code: product.code,
            photo: product.photo,
            store: product.store.map(|s| s.as_raw().to_string()),
            categories: product.categories,
            batches: product
                .batches
                .into_iter()
                .map(|b| BackupBatch {
                    id: b.id,
                    label: b.label,
                    amount: b.amount,
                    price_cents: b.price.map(|p| p.cents()),
                    exp_date: b.exp_date,
                    status: b.status.as_str().to_string(),
                })
                .collect(),
        }
    }
}

/// What an import brought in. Reused stores/categories are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub products: usize,
    pub batches: usize,
    pub stores: usize,
    pub categories: usize,
}

// =============================================================================
// Export
// =============================================================================

/// Exports the full dataset to a timestamped artifact file in `dest_dir`.
///
/// ## Returns
/// The path of the written artifact.
pub async fn export_backup(
    db: &Database,
    images: &ImageStore,
    dest_dir: &Path,
) -> DbResult<PathBuf> {
    let products = db.products().list_all().await?;
    let stores: Vec<BackupStore> = db
        .stores()
        .get_all_stores()
        .await?
        .into_iter()
        // Legacy stores have no record of their own; their names travel on
        // the product rows.
        .filter(|s| !s.is_legacy())
        .map(|s| BackupStore {
            id: s.id,
            name: s.name,
        })
        .collect();
    let categories: Vec<BackupCategory> = db
        .categories()
        .get_all_categories()
        .await?
        .into_iter()
        .map(|c| BackupCategory {
            id: c.id,
            name: c.name,
        })
        .collect();

    let mut photos = Vec::new();
    for product in &products {
        if let Some(file_name) = &product.photo {
            // A referenced photo that is missing on disk is skipped, not an
            // error; the record itself still travels.
            if let Some(bytes) = images.read(file_name)? {
                photos.push(BackupPhoto {
                    file_name: file_name.clone(),
                    data: BASE64.encode(&bytes),
                });
            }
        }
    }

    let artifact = BackupArtifact {
        version: BACKUP_VERSION,
        exported_at: Utc::now(),
        stores,
        categories,
        products: products.into_iter().map(BackupProduct::from_product).collect(),
        photos,
    };

    fs::create_dir_all(dest_dir)?;
    let file_name = format!(
        "larder-backup-{}.json",
        artifact.exported_at.format("%Y%m%d%H%M%S")
    );
    let path = dest_dir.join(file_name);
    let json =
        serde_json::to_vec_pretty(&artifact).map_err(|e| DbError::Internal(e.to_string()))?;
    fs::write(&path, json)?;

    info!(
        path = %path.display(),
        products = artifact.products.len(),
        photos = artifact.photos.len(),
        "Exported backup"
    );
    Ok(path)
}

// =============================================================================
// Import
// =============================================================================

/// Imports an artifact file, re-allocating every id.
///
/// All-or-nothing: on any failure the destination dataset is exactly what
/// it was before the call, and the error is a single
/// [`DbError::ImportIntegrity`].
pub async fn import_backup(
    db: &Database,
    images: &ImageStore,
    path: &Path,
) -> DbResult<ImportSummary> {
    let bytes = fs::read(path)
        .map_err(|e| DbError::import_integrity(format!("cannot read artifact: {e}")))?;
    let artifact: BackupArtifact = serde_json::from_slice(&bytes)
        .map_err(|e| DbError::import_integrity(format!("malformed artifact: {e}")))?;

    if artifact.version > BACKUP_VERSION {
        return Err(DbError::import_integrity(format!(
            "artifact version {} is newer than supported version {}",
            artifact.version, BACKUP_VERSION
        )));
    }

    let mut txn = db.begin_write().await?;
    let mut written_photos: Vec<String> = Vec::new();

    let outcome = import_in_txn(txn.conn(), images, &artifact, &mut written_photos).await;

    match outcome {
        Ok(summary) => match txn.commit().await {
            Ok(()) => {
                info!(
                    products = summary.products,
                    batches = summary.batches,
                    "Imported backup"
                );
                Ok(summary)
            }
            Err(e) => {
                remove_photos(images, &written_photos);
                Err(DbError::import_integrity(format!("commit failed: {e}")))
            }
        },
        Err(err) => {
            // Dropping the transaction rolls the records back; the photo
            // files written so far are removed by hand.
            drop(txn);
            remove_photos(images, &written_photos);
            Err(match err {
                integrity @ DbError::ImportIntegrity(_) => integrity,
                other => DbError::import_integrity(other.to_string()),
            })
        }
    }
}

fn remove_photos(images: &ImageStore, file_names: &[String]) {
    for file_name in file_names {
        let _ = images.remove(file_name);
    }
}

async fn import_in_txn(
    conn: &mut SqliteConnection,
    images: &ImageStore,
    artifact: &BackupArtifact,
    written_photos: &mut Vec<String>,
) -> DbResult<ImportSummary> {
    let mut summary = ImportSummary::default();

    // Stores: reuse an equal-named local record, otherwise insert fresh.
    let mut store_map: HashMap<&str, String> = HashMap::new();
    for store in &artifact.stores {
        let existing: Option<String> =
            sqlx::query_scalar("SELECT id FROM stores WHERE LOWER(name) = LOWER(?1)")
                .bind(&store.name)
                .fetch_optional(&mut *conn)
                .await?;

        let local_id = match existing {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                sqlx::query("INSERT INTO stores (id, name) VALUES (?1, ?2)")
                    .bind(&id)
                    .bind(&store.name)
                    .execute(&mut *conn)
                    .await?;
                summary.stores += 1;
                id
            }
        };
        store_map.insert(store.id.as_str(), local_id);
    }

    // Categories: same reuse-or-insert policy.
    let mut category_map: HashMap<&str, String> = HashMap::new();
    for category in &artifact.categories {
        let existing: Option<String> =
            sqlx::query_scalar("SELECT id FROM categories WHERE LOWER(name) = LOWER(?1)")
                .bind(&category.name)
                .fetch_optional(&mut *conn)
                .await?;

        let local_id = match existing {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                sqlx::query("INSERT INTO categories (id, name) VALUES (?1, ?2)")
                    .bind(&id)
                    .bind(&category.name)
                    .execute(&mut *conn)
                    .await?;
                summary.categories += 1;
                id
            }
        };
        category_map.insert(category.id.as_str(), local_id);
    }

    let photo_blobs: HashMap<&str, &str> = artifact
        .photos
        .iter()
        .map(|p| (p.file_name.as_str(), p.data.as_str()))
        .collect();

    for product in &artifact.products {
        validate_product_name(&product.name)?;

        // Resolve the store reference through the artifact's own store list.
        let store_raw: Option<String> = match product.store.as_deref() {
            None => None,
            Some(raw) => match StoreRef::from_raw(raw) {
                None => None,
                Some(StoreRef::Id(old_id)) => Some(
                    store_map
                        .get(old_id.as_str())
                        .cloned()
                        .ok_or_else(|| {
                            DbError::import_integrity(format!(
                                "product '{}' references store {old_id} missing from the artifact",
                                product.name
                            ))
                        })?,
                ),
                Some(StoreRef::Name(name)) => Some(name),
            },
        };

        let categories: Vec<String> = product
            .categories
            .iter()
            .map(|old_id| {
                category_map.get(old_id.as_str()).cloned().ok_or_else(|| {
                    DbError::import_integrity(format!(
                        "product '{}' references category {old_id} missing from the artifact",
                        product.name
                    ))
                })
            })
            .collect::<DbResult<_>>()?;
        let categories_json =
            serde_json::to_string(&categories).map_err(|e| DbError::Internal(e.to_string()))?;

        let new_id = next_id(&mut *conn, EntityKind::Product).await?;

        // Photos are renamed after the new product id so an import can never
        // clobber a file some local product already references.
        let photo: Option<String> = match product.photo.as_deref() {
            None => None,
            Some(old_name) => match photo_blobs.get(old_name) {
                Some(data) => {
                    let bytes = BASE64.decode(data).map_err(|e| {
                        DbError::import_integrity(format!(
                            "photo {old_name} is not valid base64: {e}"
                        ))
                    })?;
                    let new_name = remap_photo_name(old_name, new_id);
                    images.write(&new_name, &bytes)?;
                    written_photos.push(new_name.clone());
                    Some(new_name)
                }
                // The file was already missing at export time; keep the
                // reference, a missing photo is tolerated everywhere.
                None => Some(old_name.to_string()),
            },
        };

        sqlx::query(
            "INSERT INTO products (id, name, code, photo, store, categories) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(new_id)
        .bind(product.name.trim())
        .bind(&product.code)
        .bind(&photo)
        .bind(&store_raw)
        .bind(&categories_json)
        .execute(&mut *conn)
        .await?;
        summary.products += 1;

        for batch in &product.batches {
            let batch_id = next_id(&mut *conn, EntityKind::Batch).await?;
            sqlx::query(
                "INSERT INTO batches (id, product_id, label, amount, price_cents, exp_date, status) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(batch_id)
            .bind(new_id)
            .bind(&batch.label)
            .bind(batch.amount)
            .bind(batch.price_cents)
            .bind(batch.exp_date)
            .bind(BatchStatus::parse(&batch.status).as_str())
            .execute(&mut *conn)
            .await?;
            summary.batches += 1;
        }
    }

    Ok(summary)
}

/// `old.jpg` + new product id 5 → `5.jpg`.
fn remap_photo_name(old_name: &str, product_id: i64) -> String {
    match Path::new(old_name).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{product_id}.{ext}"),
        None => product_id.to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use larder_core::money::Money;
    use larder_core::types::{NewBatch, NewProduct};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_source(db: &Database, images: &ImageStore) {
        let store = db.stores().create_store("Corner Market").await.unwrap();
        let dairy = db.categories().create_category("Dairy").await.unwrap();

        db.products()
            .create(
                NewProduct {
                    name: "Milk".to_string(),
                    code: Some("789".to_string()),
                    store: Some(StoreRef::Id(store.id.clone())),
                    categories: vec![dairy.id.clone()],
                    batches: vec![
                        NewBatch {
                            label: "A1".to_string(),
                            amount: 10,
                            price: Some(Money::from_cents(349)),
                            exp_date: date(2026, 9, 1),
                            status: BatchStatus::Pending,
                        },
                        NewBatch {
                            label: "A2".to_string(),
                            amount: 2,
                            price: None,
                            exp_date: date(2026, 8, 1),
                            status: BatchStatus::Treated,
                        },
                    ],
                    ..NewProduct::default()
                },
                false,
            )
            .await
            .unwrap();

        images.write("2.jpg", b"jpeg-bytes").unwrap();
        db.products()
            .create(
                NewProduct {
                    name: "Old Bread".to_string(),
                    photo: Some("2.jpg".to_string()),
                    store: Some(StoreRef::Name("Old Market".to_string())),
                    ..NewProduct::default()
                },
                false,
            )
            .await
            .unwrap();

        db.products()
            .create(
                NewProduct {
                    name: "Loose Eggs".to_string(),
                    ..NewProduct::default()
                },
                false,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_roundtrip_preserves_counts_and_relationships() {
        let source = test_db().await;
        let source_dir = tempfile::tempdir().unwrap();
        let source_images = ImageStore::new(source_dir.path().join("photos"));
        seed_source(&source, &source_images).await;

        let artifact_path = export_backup(&source, &source_images, source_dir.path())
            .await
            .unwrap();
        assert!(artifact_path.is_file());

        let dest = test_db().await;
        let dest_dir = tempfile::tempdir().unwrap();
        let dest_images = ImageStore::new(dest_dir.path());

        let summary = import_backup(&dest, &dest_images, &artifact_path)
            .await
            .unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                products: 3,
                batches: 2,
                stores: 1,
                categories: 1,
            }
        );

        let products = dest.products().list_all().await.unwrap();
        assert_eq!(products.len(), 3);

        let milk = products.iter().find(|p| p.name == "Milk").unwrap();
        assert_eq!(milk.batches.len(), 2);
        assert_eq!(milk.batches[0].label, "A1");
        assert_eq!(milk.batches[0].price, Some(Money::from_cents(349)));
        assert_eq!(milk.batches[1].status, BatchStatus::Treated);
        assert_eq!(milk.categories.len(), 1);

        // The uuid reference was remapped to a real local store record.
        let milk_store_id = match &milk.store {
            Some(StoreRef::Id(id)) => id.clone(),
            other => panic!("expected uuid store ref, got {other:?}"),
        };
        let store = dest.stores().get_store(&milk_store_id).await.unwrap().unwrap();
        assert_eq!(store.name, "Corner Market");

        // The category reference resolves locally too.
        let category = dest
            .categories()
            .get_category(&milk.categories[0])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(category.name, "Dairy");

        // Legacy store name carried through verbatim.
        let bread = products.iter().find(|p| p.name == "Old Bread").unwrap();
        assert_eq!(bread.store, Some(StoreRef::Name("Old Market".to_string())));

        // Photo bytes travelled and were renamed after the new product id.
        let photo_name = bread.photo.as_deref().unwrap();
        assert_eq!(photo_name, format!("{}.jpg", bread.id));
        assert_eq!(
            dest_images.read(photo_name).unwrap(),
            Some(b"jpeg-bytes".to_vec())
        );
    }

    #[tokio::test]
    async fn test_import_reuses_equal_named_store() {
        let source = test_db().await;
        let dir = tempfile::tempdir().unwrap();
        let images = ImageStore::new(dir.path().join("photos"));
        seed_source(&source, &images).await;
        let artifact_path = export_backup(&source, &images, dir.path()).await.unwrap();

        let dest = test_db().await;
        let local = dest.stores().create_store("corner market").await.unwrap();

        let summary = import_backup(&dest, &images, &artifact_path).await.unwrap();
        assert_eq!(summary.stores, 0, "equal-named store must be reused");

        let milk = dest
            .products()
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.name == "Milk")
            .unwrap();
        assert_eq!(milk.store, Some(StoreRef::Id(local.id)));
    }

    #[tokio::test]
    async fn test_malformed_artifact_is_rejected_and_leaves_no_trace() {
        let dest = test_db().await;
        let dir = tempfile::tempdir().unwrap();
        let images = ImageStore::new(dir.path());

        let bogus = dir.path().join("broken.json");
        fs::write(&bogus, b"{ not json ").unwrap();

        let err = import_backup(&dest, &images, &bogus).await;
        assert!(matches!(err, Err(DbError::ImportIntegrity(_))));
        assert!(dest.products().list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dangling_reference_rolls_everything_back() {
        let dest = test_db().await;
        let dir = tempfile::tempdir().unwrap();
        let images = ImageStore::new(dir.path());

        let artifact = BackupArtifact {
            version: BACKUP_VERSION,
            exported_at: Utc::now(),
            stores: vec![],
            categories: vec![],
            products: vec![
                BackupProduct {
                    id: 1,
                    name: "Fine".to_string(),
                    code: None,
                    photo: None,
                    store: None,
                    categories: vec![],
                    batches: vec![],
                },
                BackupProduct {
                    id: 2,
                    name: "Broken".to_string(),
                    code: None,
                    photo: None,
                    store: None,
                    categories: vec!["missing-category".to_string()],
                    batches: vec![],
                },
            ],
            photos: vec![],
        };
        let path = dir.path().join("dangling.json");
        fs::write(&path, serde_json::to_vec(&artifact).unwrap()).unwrap();

        let err = import_backup(&dest, &images, &path).await;
        assert!(matches!(err, Err(DbError::ImportIntegrity(_))));

        // The valid first product must not survive the failed import.
        assert!(dest.products().list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_version_is_rejected() {
        let dest = test_db().await;
        let dir = tempfile::tempdir().unwrap();
        let images = ImageStore::new(dir.path());

        let artifact = BackupArtifact {
            version: BACKUP_VERSION + 1,
            exported_at: Utc::now(),
            stores: vec![],
            categories: vec![],
            products: vec![],
            photos: vec![],
        };
        let path = dir.path().join("future.json");
        fs::write(&path, serde_json::to_vec(&artifact).unwrap()).unwrap();

        let err = import_backup(&dest, &images, &path).await;
        assert!(matches!(err, Err(DbError::ImportIntegrity(_))));
    }
}
