//! Candidate photos, stored as plain files and served statically.

use std::path::Path;

use chrono::Utc;
use log::{debug, warn};
use rocket::fs::TempFile;

use crate::error::{Error, Result};

/// Where uploaded photos are served from.
pub const UPLOADS_ROUTE: &str = "/uploads";

/// Store an uploaded photo in `upload_dir`, returning the public path it will be served at.
///
/// Files are named by upload time; two uploads in the same millisecond would collide.
pub async fn save_photo(file: &mut TempFile<'_>, upload_dir: &Path) -> Result<String> {
    let extension = file
        .content_type()
        .filter(|content_type| content_type.top() == "image")
        .and_then(|content_type| content_type.extension())
        .map(|extension| extension.to_string())
        .ok_or_else(|| Error::bad_request("Photo must be an image"))?;

    let filename = format!("{}.{extension}", Utc::now().timestamp_millis());
    file.copy_to(upload_dir.join(&filename)).await?;
    debug!("Saved photo {filename}");

    Ok(format!("{UPLOADS_ROUTE}/{filename}"))
}

/// Remove a previously stored photo, given its public path. Failure is only logged.
pub async fn remove_photo(public_path: &str, upload_dir: &Path) {
    let Some(filename) = public_path
        .strip_prefix(UPLOADS_ROUTE)
        .map(|rest| rest.trim_start_matches('/'))
    else {
        warn!("Not an uploaded photo: {public_path}");
        return;
    };
    if filename.is_empty() || filename.contains('/') || filename.contains("..") {
        warn!("Refusing to remove photo: {public_path}");
        return;
    }
    if let Err(err) = rocket::tokio::fs::remove_file(upload_dir.join(filename)).await {
        warn!("Failed to remove photo {public_path}: {err}");
    }
}
