//! Types and steps shared by the media and template upload flows.

use tracing::debug;

use crate::directory::Link;
use crate::error::{Error, Result};
use crate::session::{RequestBody, Response, Transport};
use crate::xml::{parse_document, ElementKind, XmlElement, UPLOAD_REL};

/// Lifecycle of a server-side upload entity as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UploadPhase {
    /// The entity exists in the catalog.
    Created,
    /// The OVF descriptor is being sent.
    DescriptorUploading,
    /// The server has parsed the descriptor and exposed file upload links.
    DescriptorProcessed,
    /// Companion files are known and waiting to be sent.
    FilesPending,
    /// File bytes are being transferred.
    FilesUploading,
    /// The server reports the upload as finished.
    Complete,
}

impl std::fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadPhase::Created => write!(f, "Created"),
            UploadPhase::DescriptorUploading => write!(f, "Uploading descriptor"),
            UploadPhase::DescriptorProcessed => write!(f, "Descriptor processed"),
            UploadPhase::FilesPending => write!(f, "Files pending"),
            UploadPhase::FilesUploading => write!(f, "Uploading files"),
            UploadPhase::Complete => write!(f, "Complete"),
        }
    }
}

/// Progress information for an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadProgress {
    /// Current phase.
    pub phase: UploadPhase,
    /// Server-reported percentage (0-100).
    pub percent: u32,
    /// File currently being transferred, if any.
    pub current_file: Option<String>,
    /// Files transferred so far.
    pub files_uploaded: usize,
    /// Files to transfer in total; 0 until they are known.
    pub files_total: usize,
}

impl UploadProgress {
    /// Create progress information for a phase with nothing transferred.
    pub fn new(phase: UploadPhase) -> Self {
        Self {
            phase,
            percent: 0,
            current_file: None,
            files_uploaded: 0,
            files_total: 0,
        }
    }
}

/// Type alias for the progress callback function.
pub type ProgressCallback = Box<dyn Fn(UploadProgress) + Send>;

/// POST entity parameters to a catalog upload link and return the href of
/// the created entity.
///
/// # Errors
///
/// [`Error::UploadRejected`] unless the server answers 200 or 201, and
/// [`Error::Protocol`] when the answer names no `Entity`.
pub(crate) fn create_entity(
    transport: &dyn Transport,
    catalog_upload: &Link,
    content_type: &str,
    params: String,
) -> Result<String> {
    let response = transport.post(&catalog_upload.href, content_type, RequestBody::Text(params))?;
    if !response.is_created() {
        return Err(Error::upload_rejected(response.status, response.body));
    }

    let root = parse_document(&response.body)?;
    let href = root
        .children_of_kind(ElementKind::Entity)
        .find_map(|entity| entity.attr("href"))
        .ok_or_else(|| Error::protocol("catalog item response has no Entity reference"))?;

    debug!(%href, "entity created");
    Ok(href.to_string())
}

/// The first `upload:default` link below `root` whose href satisfies `accept`.
pub(crate) fn find_upload_link<F>(root: &XmlElement, accept: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    root.descendants()
        .filter(|e| e.kind() == ElementKind::Link && e.attr("rel") == Some(UPLOAD_REL))
        .filter_map(|e| e.attr("href"))
        .find(|href| accept(href))
        .map(str::to_string)
}

/// Fail with [`Error::UploadRejected`] unless the transfer was accepted.
pub(crate) fn ensure_accepted(response: Response) -> Result<()> {
    if response.is_success() {
        Ok(())
    } else {
        Err(Error::upload_rejected(response.status, response.body))
    }
}
