use std::time::Duration;

use chrono::Utc;
use common::pdf::{self, LicenseStamp, PerusalStamp};
use common::storage::{BlobStore, ObjectRef, PutOptions};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, ExprTrait, QueryFilter, Set};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::delivery::gate;
use crate::entity::{download_log, license, perusal_request, script, user};
use crate::error::AppError;
use crate::extractors::auth::AuthUser;
use crate::models::delivery::DownloadResponse;
use crate::state::AppState;
use crate::utils::filename::download_filename;

/// Watermark variant for one delivery.
pub enum WatermarkJob {
    Perusal(PerusalStamp),
    License(LicenseStamp),
}

/// Deliver a licensed full-script download.
///
/// Every call re-validates the entitlement and regenerates a fresh artifact;
/// nothing about a previous delivery is reused.
#[instrument(skip(state, caller), fields(license_id = %license_id, user_id = caller.user_id))]
pub async fn deliver_license(
    state: &AppState,
    caller: &AuthUser,
    license_id: Uuid,
    ip: Option<String>,
) -> Result<DownloadResponse, AppError> {
    let license = license::Entity::find_by_id(license_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;
    let script = script::Entity::find_by_id(license.script_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Script not found".into()))?;

    gate::check_license_download(caller, &license, &script, Utc::now())?;

    let source = parse_stored_ref(script.file_ref.as_deref())?;
    let short = short_id(&license.id);

    let theater = display_identity(&state.db, license.theater_id).await;
    let stamp = LicenseStamp {
        theater: theater
            .map(|(name, _)| name)
            .unwrap_or_else(|| format!("License {short}")),
        license_type: license.license_type.clone(),
        license_id: license.id.to_string(),
        performance_dates: performance_date_labels(&license.performance_dates),
    };

    let filename = download_filename(&script.title, &short);
    let ttl = Duration::from_secs(state.config.delivery.download_ttl_secs);
    let (download_url, expires_in) = generate_artifact(
        &*state.blob_store,
        &state.config.storage.downloads_bucket,
        ttl,
        &source,
        &WatermarkJob::License(stamp),
        &filename,
    )
    .await?;

    record_download(
        &state.db,
        "license",
        license.id,
        script.id,
        caller.user_id,
        ip,
    )
    .await;

    Ok(DownloadResponse {
        download_url,
        expires_in,
        script_title: script.title,
        filename,
    })
}

/// Deliver a perusal download.
#[instrument(skip(state, caller), fields(request_id = %request_id, user_id = caller.user_id))]
pub async fn deliver_perusal(
    state: &AppState,
    caller: &AuthUser,
    request_id: Uuid,
    ip: Option<String>,
) -> Result<DownloadResponse, AppError> {
    let request = perusal_request::Entity::find_by_id(request_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Perusal request not found".into()))?;
    let script = script::Entity::find_by_id(request.script_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Script not found".into()))?;

    gate::check_perusal_download(caller, &request, &script, Utc::now())?;

    let source = parse_stored_ref(script.perusal_ref.as_deref())?;
    let short = short_id(&request.id);

    let requester = display_identity(&state.db, request.requester_id).await;
    let stamp = match requester {
        Some((name, email)) => PerusalStamp {
            organization: name,
            contact_email: email,
        },
        None => PerusalStamp {
            organization: format!("Perusal request {short}"),
            contact_email: String::new(),
        },
    };

    let filename = download_filename(&script.title, &short);
    let ttl = Duration::from_secs(state.config.delivery.download_ttl_secs);
    let (download_url, expires_in) = generate_artifact(
        &*state.blob_store,
        &state.config.storage.downloads_bucket,
        ttl,
        &source,
        &WatermarkJob::Perusal(stamp),
        &filename,
    )
    .await?;

    record_download(
        &state.db,
        "perusal",
        request.id,
        script.id,
        caller.user_id,
        ip,
    )
    .await;
    bump_perusal_counters(&state.db, request.id).await;

    Ok(DownloadResponse {
        download_url,
        expires_in,
        script_title: script.title,
        filename,
    })
}

/// The fetch → transform → store → presign chain shared by both delivery
/// paths. Fail-closed: any storage or transform failure aborts the request.
pub async fn generate_artifact(
    store: &dyn BlobStore,
    downloads_bucket: &str,
    ttl: Duration,
    source: &ObjectRef,
    job: &WatermarkJob,
    filename: &str,
) -> Result<(String, u64), AppError> {
    let source_bytes = store.get(source).await?;

    let stamped = match job {
        WatermarkJob::Perusal(stamp) => pdf::perusal_watermark(&source_bytes, stamp),
        WatermarkJob::License(stamp) => pdf::license_watermark(&source_bytes, stamp),
    }?;

    let artifact = store
        .put(
            downloads_bucket,
            filename,
            &stamped,
            PutOptions::temporary("application/pdf", ttl),
        )
        .await?;
    let download_url = store.presign(&artifact, ttl).await?;

    Ok((download_url, ttl.as_secs()))
}

/// First 8 hex characters of an entitlement id, for filenames and fallback
/// labels.
fn short_id(id: &Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

fn parse_stored_ref(stored: Option<&str>) -> Result<ObjectRef, AppError> {
    // The gate has already rejected missing refs; a missing value here means
    // the row changed under us, which reads as a storage fault either way.
    let stored = stored.ok_or_else(|| AppError::NotFound("Script file not available".into()))?;
    Ok(ObjectRef::parse(stored)?)
}

/// Best-effort lookup of the display name and contact email used as
/// watermark content. Failures degrade to a fallback label, never abort the
/// delivery.
async fn display_identity(db: &DatabaseConnection, user_id: i32) -> Option<(String, String)> {
    match user::Entity::find_by_id(user_id).one(db).await {
        Ok(Some(user)) => {
            let name = user.organization.unwrap_or(user.username);
            Some((name, user.email))
        }
        Ok(None) => None,
        Err(e) => {
            warn!("failed to load user {user_id} for watermark metadata: {e}");
            None
        }
    }
}

/// Render the stored performance-dates JSON into watermark lines.
fn performance_date_labels(dates: &serde_json::Value) -> Vec<String> {
    let Some(items) = dates.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(map) => {
                let date = map.get("date").and_then(|v| v.as_str())?;
                match map.get("venue").and_then(|v| v.as_str()) {
                    Some(venue) => Some(format!("{date} ({venue})")),
                    None => Some(date.to_string()),
                }
            }
            _ => None,
        })
        .collect()
}

/// Append an audit row. Log-and-continue: an audit failure never blocks a
/// delivery that already succeeded.
async fn record_download(
    db: &DatabaseConnection,
    entitlement_type: &str,
    entitlement_id: Uuid,
    script_id: i32,
    user_id: i32,
    ip: Option<String>,
) {
    let entry = download_log::ActiveModel {
        id: Set(Uuid::now_v7()),
        entitlement_type: Set(entitlement_type.to_string()),
        entitlement_id: Set(entitlement_id),
        script_id: Set(script_id),
        user_id: Set(user_id),
        ip_address: Set(ip),
        downloaded_at: Set(Utc::now()),
    };
    if let Err(e) = download_log::Entity::insert(entry).exec(db).await {
        warn!("failed to record download log entry for {entitlement_type} {entitlement_id}: {e}");
    }
}

/// Bump the perusal counters with a racing column expression. Concurrent
/// downloads may land an approximate count; this counter gates nothing.
async fn bump_perusal_counters(db: &DatabaseConnection, request_id: Uuid) {
    let result = perusal_request::Entity::update_many()
        .col_expr(
            perusal_request::Column::DownloadCount,
            Expr::col(perusal_request::Column::DownloadCount).add(1),
        )
        .col_expr(
            perusal_request::Column::LastDownloadedAt,
            Expr::value(Utc::now()),
        )
        .filter(perusal_request::Column::Id.eq(request_id))
        .exec(db)
        .await;
    if let Err(e) = result {
        warn!("failed to bump perusal counters for {request_id}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use common::storage::StorageError;
    use common::storage::filesystem::FilesystemBlobStore;
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};

    use super::*;

    fn build_pdf(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for index in 0..pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![50.into(), 700.into()]),
                    Operation::new(
                        "Tj",
                        vec![Object::string_literal(format!("Page {}", index + 1))],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    async fn temp_store() -> (FilesystemBlobStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemBlobStore::new(
            dir.path().join("blobs"),
            "http://127.0.0.1:3000/api/v1/files",
            b"test-secret".to_vec(),
        )
        .await
        .unwrap();
        (store, dir)
    }

    fn license_job() -> WatermarkJob {
        WatermarkJob::License(LicenseStamp {
            theater: "Riverside Players".into(),
            license_type: "standard".into(),
            license_id: "0193aaaa-1111-7abc-8000-000000000001".into(),
            performance_dates: vec!["2026-09-12 (Main Stage)".into()],
        })
    }

    #[tokio::test]
    async fn generate_artifact_produces_presigned_stamped_pdf() {
        let (store, _dir) = temp_store().await;
        let source = store
            .put(
                "scripts",
                "seagull.pdf",
                &build_pdf(2),
                PutOptions::persistent("application/pdf"),
            )
            .await
            .unwrap();

        let (url, expires_in) = generate_artifact(
            &store,
            "downloads",
            Duration::from_secs(3600),
            &source,
            &license_job(),
            "the-seagull-0193aaaa.pdf",
        )
        .await
        .unwrap();

        assert_eq!(expires_in, 3600);

        // Redeem the presigned token and check the stamped output.
        let token = url.rsplit('/').next().unwrap();
        let object = common::storage::presign::verify(b"test-secret", token).unwrap();
        assert_eq!(object.bucket, "downloads");
        let bytes = store.get(&object).await.unwrap();
        assert_eq!(common::pdf::page_count(&bytes).unwrap(), 2);

        let doc = Document::load_mem(&bytes).unwrap();
        for page_id in doc.get_pages().into_values() {
            let text =
                String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned();
            assert!(text.contains("Riverside Players"));
        }
    }

    #[tokio::test]
    async fn repeated_deliveries_use_fresh_urls_with_identical_stamps() {
        let (store, _dir) = temp_store().await;
        let source = store
            .put(
                "scripts",
                "seagull.pdf",
                &build_pdf(1),
                PutOptions::persistent("application/pdf"),
            )
            .await
            .unwrap();

        let job = license_job();
        let ttl = Duration::from_secs(3600);
        let (url_a, _) = generate_artifact(&store, "downloads", ttl, &source, &job, "x.pdf")
            .await
            .unwrap();
        let (url_b, _) = generate_artifact(&store, "downloads", ttl, &source, &job, "x.pdf")
            .await
            .unwrap();
        assert_ne!(url_a, url_b);

        // Both artifacts carry identical watermark bytes.
        let fetch = async |url: &str| {
            let token = url.rsplit('/').next().unwrap();
            let object = common::storage::presign::verify(b"test-secret", token).unwrap();
            store.get(&object).await.unwrap()
        };
        assert_eq!(fetch(&url_a).await, fetch(&url_b).await);
    }

    #[tokio::test]
    async fn missing_source_surfaces_as_storage_error() {
        let (store, _dir) = temp_store().await;
        let source = ObjectRef::parse("scripts/never-uploaded.pdf").unwrap();
        let result = generate_artifact(
            &store,
            "downloads",
            Duration::from_secs(3600),
            &source,
            &license_job(),
            "x.pdf",
        )
        .await;
        assert!(matches!(result, Err(AppError::Storage(_))));
    }

    #[tokio::test]
    async fn corrupt_source_surfaces_as_document_error() {
        let (store, _dir) = temp_store().await;
        let source = store
            .put(
                "scripts",
                "corrupt.pdf",
                b"this is not a pdf",
                PutOptions::persistent("application/pdf"),
            )
            .await
            .unwrap();
        let result = generate_artifact(
            &store,
            "downloads",
            Duration::from_secs(3600),
            &source,
            &license_job(),
            "x.pdf",
        )
        .await;
        assert!(matches!(result, Err(AppError::DocumentInvalid(_))));
    }

    #[test]
    fn performance_date_labels_handle_both_shapes() {
        let dates = serde_json::json!([
            "2026-09-12",
            { "date": "2026-09-13", "venue": "Main Stage" },
            { "date": "2026-09-14" },
            { "venue": "no date" },
            42,
        ]);
        assert_eq!(
            performance_date_labels(&dates),
            vec![
                "2026-09-12".to_string(),
                "2026-09-13 (Main Stage)".to_string(),
                "2026-09-14".to_string(),
            ]
        );
        assert!(performance_date_labels(&serde_json::json!({})).is_empty());
        assert!(performance_date_labels(&serde_json::Value::Null).is_empty());
    }

    #[test]
    fn short_id_is_stable_prefix() {
        let id = Uuid::parse_str("0193aaaa-1111-7abc-8000-000000000001").unwrap();
        assert_eq!(short_id(&id), "0193aaaa");
    }

    #[test]
    fn parse_stored_ref_rejects_garbage_as_storage_fault() {
        assert!(matches!(
            parse_stored_ref(Some("no-separator")),
            Err(AppError::Storage(_))
        ));
        assert!(matches!(
            parse_stored_ref(None),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn storage_not_found_maps_to_storage_error() {
        let err: AppError = StorageError::NotFound("scripts/x".into()).into();
        assert!(matches!(err, AppError::Storage(_)));
    }
}
