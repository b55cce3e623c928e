//! ISO media upload.
//!
//! The flow is one POST to create the media entity, one GET to find its
//! transfer link, and one PUT with the image bytes. Completion is observed
//! afterwards through [`crate::progress::wait_for_completion`].

use std::fs;
use std::path::Path;

use tracing::info;

use crate::directory::Link;
use crate::error::{Error, Result};
use crate::session::{RequestBody, Transport};
use crate::upload::{create_entity, ensure_accepted, find_upload_link};
use crate::xml::{media_params, parse_document, MEDIA_TYPE};

/// A media entity whose bytes have been sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUpload {
    /// Href of the media entity; poll it for progress.
    pub href: String,
    /// Name the media was registered under.
    pub name: String,
    /// Declared size in bytes.
    pub size: u64,
}

/// Upload an ISO image to a catalog.
///
/// `catalog` is the catalog's media upload link (see
/// [`crate::directory::resolve_upload_target`]). The media is named after the
/// file. The whole file is read into memory for the transfer.
///
/// # Errors
///
/// - [`Error::Io`] if the file does not exist; checked before any request.
/// - [`Error::UploadRejected`] if creation or the transfer is refused.
/// - [`Error::Protocol`] if the server documents lack the expected links.
pub fn upload_media(
    transport: &dyn Transport,
    catalog: &Link,
    path: &Path,
    size: u64,
    description: &str,
) -> Result<MediaUpload> {
    fs::metadata(path).map_err(|e| Error::io(e, path))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::config(format!("'{}' has no file name", path.display())))?;

    let href = create_entity(
        transport,
        catalog,
        MEDIA_TYPE,
        media_params(&name, size, description),
    )?;
    info!(%name, %href, "media entity created");

    let document = parse_document(&transport.get_ok(&href)?.body)?;
    let upload_url = find_upload_link(&document, |_| true)
        .ok_or_else(|| Error::protocol(format!("media '{}' exposes no upload link", name)))?;

    let data = fs::read(path).map_err(|e| Error::io(e, path))?;
    let response = transport.put(&upload_url, None, RequestBody::Bytes(data))?;
    ensure_accepted(response)?;
    info!(%name, size, "media bytes sent");

    Ok(MediaUpload { href, name, size })
}
