//! Atomic artifact publication.
//!
//! The raster and its metadata describe each other, so a half-updated
//! pair must never be visible. Both artifacts are staged completely to
//! sibling `.partial` paths first; only after both stages succeed are
//! they moved into place.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::debug;

/// Publish the raster and metadata together.
///
/// Any failure before the first promotion leaves previously published
/// artifacts byte-identical.
pub async fn publish_pair(
    image_path: &Path,
    image: &[u8],
    metadata_path: &Path,
    metadata: &[u8],
) -> Result<()> {
    if let Some(parent) = image_path.parent() {
        fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create output directory {}", parent.display())
        })?;
    }
    if let Some(parent) = metadata_path.parent() {
        fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create output directory {}", parent.display())
        })?;
    }

    let image_stage = stage_path(image_path);
    let metadata_stage = stage_path(metadata_path);

    fs::write(&image_stage, image)
        .await
        .with_context(|| format!("Failed to stage {}", image_stage.display()))?;
    fs::write(&metadata_stage, metadata)
        .await
        .with_context(|| format!("Failed to stage {}", metadata_stage.display()))?;

    promote(&image_stage, image_path).await?;
    promote(&metadata_stage, metadata_path).await?;

    debug!(
        image = %image_path.display(),
        metadata = %metadata_path.display(),
        "Artifacts promoted"
    );
    Ok(())
}

/// Staging path next to the destination, so the promoting rename stays
/// on one filesystem.
fn stage_path(final_path: &Path) -> PathBuf {
    let mut name = final_path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("artifact"));
    name.push(".partial");
    final_path.with_file_name(name)
}

async fn promote(stage: &Path, final_path: &Path) -> Result<()> {
    // rename fails across filesystems; fall back to copy+delete
    if fs::rename(stage, final_path).await.is_err() {
        fs::copy(stage, final_path)
            .await
            .with_context(|| format!("Failed to publish {}", final_path.display()))?;
        fs::remove_file(stage)
            .await
            .with_context(|| format!("Failed to remove staging file {}", stage.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_path_is_a_sibling() {
        assert_eq!(
            stage_path(Path::new("web/swi_overlay.png")),
            PathBuf::from("web/swi_overlay.png.partial")
        );
    }

    #[tokio::test]
    async fn test_publishes_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("overlay.png");
        let metadata_path = dir.path().join("meta.json");

        publish_pair(&image_path, b"png bytes", &metadata_path, b"{}")
            .await
            .unwrap();

        assert_eq!(fs::read(&image_path).await.unwrap(), b"png bytes");
        assert_eq!(fs::read(&metadata_path).await.unwrap(), b"{}");
        assert!(!stage_path(&image_path).exists());
        assert!(!stage_path(&metadata_path).exists());
    }

    #[tokio::test]
    async fn test_creates_missing_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("web/overlay.png");
        let metadata_path = dir.path().join("web/meta.json");

        publish_pair(&image_path, b"a", &metadata_path, b"b")
            .await
            .unwrap();

        assert!(image_path.exists());
        assert!(metadata_path.exists());
    }

    #[tokio::test]
    async fn test_overwrites_previous_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("overlay.png");
        let metadata_path = dir.path().join("meta.json");

        fs::write(&image_path, b"old image").await.unwrap();
        fs::write(&metadata_path, b"old meta").await.unwrap();

        publish_pair(&image_path, b"new image", &metadata_path, b"new meta")
            .await
            .unwrap();

        assert_eq!(fs::read(&image_path).await.unwrap(), b"new image");
        assert_eq!(fs::read(&metadata_path).await.unwrap(), b"new meta");
    }

    #[tokio::test]
    async fn test_staging_failure_preserves_previous_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("overlay.png");
        let metadata_path = dir.path().join("meta.json");

        fs::write(&image_path, b"old image").await.unwrap();
        fs::write(&metadata_path, b"old meta").await.unwrap();

        // A directory squatting on the metadata staging path makes its
        // staging write fail after the image was already staged.
        fs::create_dir(stage_path(&metadata_path)).await.unwrap();

        let result = publish_pair(&image_path, b"new image", &metadata_path, b"new meta").await;

        assert!(result.is_err());
        assert_eq!(fs::read(&image_path).await.unwrap(), b"old image");
        assert_eq!(fs::read(&metadata_path).await.unwrap(), b"old meta");
    }
}
