//! Batch entry points: a list of URLs → one composed document on disk.
//!
//! URLs are visited strictly in order through a single [`PageSession`].
//! Every harvested record is appended to the composer before the next URL
//! is loaded, so the document order is URL order, then DOM order within a
//! URL. The document is written once, after the last URL, via temp file +
//! rename so a failed batch never leaves a partial artifact behind.

use crate::browser::PageSession;
use crate::compose;
use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::output::{BatchOutput, BatchStats};
use crate::pipeline::harvest::{harvest_page, SnapshotNamer};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Reject an empty URL list or blank entries.
pub fn validate_urls(urls: &[String]) -> Result<(), HarvestError> {
    if urls.is_empty() || urls.iter().any(|u| u.trim().is_empty()) {
        return Err(HarvestError::InvalidInput);
    }
    Ok(())
}

/// Harvest every URL through `session` and write the composed document to
/// [`HarvestConfig::artifact_path`].
///
/// # Errors
/// Fatal errors only: an invalid URL list, a navigation or DOM query
/// failure, a compose/finalize failure, or an I/O error on the snapshot or
/// output directories. Element-level problems are reported in
/// [`BatchOutput::skipped`] and never abort the batch.
pub async fn run_batch<S>(
    session: &mut S,
    urls: &[String],
    config: &HarvestConfig,
) -> Result<BatchOutput, HarvestError>
where
    S: PageSession + ?Sized,
{
    let total_start = Instant::now();

    // ── Step 1: Validate input ───────────────────────────────────────────
    validate_urls(urls)?;
    let total_urls = urls.len();
    info!("Starting harvest of {} URLs ({:?} backend)", total_urls, config.backend);

    // ── Step 2: Prepare directories ──────────────────────────────────────
    create_dir(&config.screenshot_dir).await?;
    create_dir(&config.output_dir).await?;

    let mut namer = SnapshotNamer::new(config.backend, &config.screenshot_dir);
    let mut composer = compose::for_config(config);
    let mut stats = BatchStats {
        total_urls,
        ..BatchStats::default()
    };
    let mut skipped = Vec::new();

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total_urls);
    }

    // ── Step 3: Visit each URL in order ──────────────────────────────────
    for (i, url) in urls.iter().enumerate() {
        let url_index = i + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_url_start(url_index, total_urls, url);
        }
        info!("[{}/{}] {}", url_index, total_urls, url);

        session
            .navigate(url)
            .await
            .map_err(|e| HarvestError::Navigation {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        if let Some(ref selector) = config.overlay_selector {
            if let Err(e) = session.dismiss_overlay(selector, config.overlay_timeout).await {
                debug!("No overlay dismissed on {}: {}", url, e);
            }
        }

        let harvest = harvest_page(session, url, config, &mut namer).await?;

        for s in &harvest.skipped {
            if s.reason.is_duplicate() {
                stats.duplicates += 1;
            } else {
                stats.failed_elements += 1;
            }
            if let Some(ref cb) = config.progress_callback {
                cb.on_element_skipped(&s.url, &s.element_id, &s.reason);
            }
        }
        skipped.extend(harvest.skipped);

        let page_records = harvest.records.len();
        if page_records == 0 {
            stats.empty_urls += 1;
            warn!("No records harvested from {}", url);
        }

        // ── Step 4: Scale and append in harvest order ────────────────────
        for record in harvest.records {
            let geometry = composer.geometry(&record);
            let element_index = record.element_index;
            let unique_key = record.unique_key.clone();
            composer.append(url, record, geometry)?;
            stats.records += 1;
            if let Some(ref cb) = config.progress_callback {
                cb.on_record_appended(url, element_index, &unique_key);
            }
        }

        if let Some(ref cb) = config.progress_callback {
            cb.on_url_complete(url_index, total_urls, page_records);
        }
    }

    // ── Step 5: Finalize and write atomically ────────────────────────────
    let document = composer.finalize()?;
    stats.document_pages = document.pages;

    let artifact_path = config.artifact_path();
    write_atomic(&artifact_path, &document.bytes).await?;

    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Harvest complete: {} records from {} URLs → {} ({}ms)",
        stats.records,
        total_urls,
        artifact_path.display(),
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total_urls, stats.records);
    }

    Ok(BatchOutput {
        artifact_name: config.backend.artifact_name().to_string(),
        artifact_path,
        stats,
        skipped,
    })
}

/// Launch a headless Chrome session and run the batch through it.
///
/// One browser per call; it is closed when this function returns, whether
/// the batch succeeded or not.
#[cfg(feature = "chrome")]
pub async fn harvest_urls(urls: &[String], config: &HarvestConfig) -> Result<BatchOutput, HarvestError> {
    validate_urls(urls)?;
    let mut session = crate::browser::ChromeSession::launch(config.navigation_timeout).await?;
    run_batch(&mut session, urls, config).await
}

async fn create_dir(dir: &Path) -> Result<(), HarvestError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| HarvestError::ArtifactWrite {
            path: dir.to_path_buf(),
            source: e,
        })
}

/// Write `bytes` to `path` through a sibling temp file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), HarvestError> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| HarvestError::ArtifactWrite {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| HarvestError::ArtifactWrite {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_url_list_is_invalid() {
        assert!(matches!(validate_urls(&[]), Err(HarvestError::InvalidInput)));
    }

    #[test]
    fn blank_entry_is_invalid() {
        let urls = vec!["https://a.example".to_string(), "  ".to_string()];
        assert!(matches!(validate_urls(&urls), Err(HarvestError::InvalidInput)));
    }

    #[test]
    fn plain_list_is_valid() {
        let urls = vec!["https://a.example".to_string()];
        assert!(validate_urls(&urls).is_ok());
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.xlsx");
        write_atomic(&path, b"payload").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
        assert!(!dir.path().join("output.xlsx.tmp").exists());
    }
}
