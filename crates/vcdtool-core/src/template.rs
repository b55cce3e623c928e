//! OVF vApp template upload.
//!
//! Uploading a template walks a server-side entity through its lifecycle:
//!
//! 1. **Created**: POST `UploadVAppTemplateParams` to the catalog and follow
//!    the returned `Entity` to the template.
//! 2. **DescriptorUploading**: PUT the local OVF descriptor to the template's
//!    `descriptor.ovf` upload link.
//! 3. **DescriptorProcessed**: poll the template until
//!    `ovfDescriptorUploaded="true"`.
//! 4. **FilesPending**: read the `File` entries the server now lists, each
//!    with its own upload link.
//! 5. **FilesUploading**: stream every pending file from disk, one at a time.
//! 6. **Complete**: poll the template until it reports 100%.
//!
//! The set of companion files is only read from the document that reported
//! the descriptor as processed. Upload links seen before that point are
//! never used.
//!
//! # Example
//!
//! ```no_run
//! use vcdtool_core::template::{upload_template, TemplateOptions, TemplateRequest};
//! # fn run(transport: &dyn vcdtool_core::Transport, catalog: &vcdtool_core::Link) -> vcdtool_core::Result<()> {
//! let request = TemplateRequest::new("web", "Web tier", "/images/web/web.ovf");
//! let upload = upload_template(transport, catalog, &request, &TemplateOptions::default(), None)?;
//! println!("{} files uploaded to {}", upload.files.len(), upload.href);
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::PollingConfig;
use crate::directory::Link;
use crate::error::{Error, Result};
use crate::poll::{poll_until, PollPolicy};
use crate::progress::{get_upload_progress, wait_for_completion};
use crate::session::{RequestBody, Transport};
use crate::upload::{
    create_entity, ensure_accepted, find_upload_link, ProgressCallback, UploadPhase,
    UploadProgress,
};
use crate::xml::{
    parse_document, upload_template_params, ElementKind, XmlElement, UPLOAD_TEMPLATE_PARAMS_TYPE,
};

/// Name under which the server exposes the OVF descriptor.
pub const DESCRIPTOR_NAME: &str = "descriptor.ovf";

/// Content type used for the descriptor PUT.
const DESCRIPTOR_CONTENT_TYPE: &str = "text/xml";

/// Root attribute set once the server has processed the descriptor.
const DESCRIPTOR_UPLOADED_ATTR: &str = "ovfDescriptorUploaded";

/// Transfer state of a companion file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Not yet sent.
    Pending,
    /// Bytes accepted by the server.
    Uploaded,
}

/// A file the template references, discovered after descriptor processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanionFile {
    /// File name as listed by the server; also its name on local disk.
    pub name: String,
    /// Declared size in bytes.
    pub size: u64,
    /// Upload link for this file.
    pub url: String,
    pub status: FileStatus,
}

/// What to upload and how to name it.
#[derive(Debug, Clone)]
pub struct TemplateRequest {
    /// Template name in the catalog.
    pub name: String,
    /// Template description.
    pub description: String,
    /// Local OVF descriptor.
    pub descriptor_path: PathBuf,
    /// Directory holding the files the descriptor references.
    pub files_dir: PathBuf,
}

impl TemplateRequest {
    /// Create a request whose companion files sit next to the descriptor.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        descriptor_path: impl Into<PathBuf>,
    ) -> Self {
        let descriptor_path = descriptor_path.into();
        let files_dir = descriptor_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            name: name.into(),
            description: description.into(),
            descriptor_path,
            files_dir,
        }
    }

    /// Look for companion files in `dir` instead.
    pub fn with_files_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.files_dir = dir.into();
        self
    }
}

/// Polling behaviour of the template flow.
#[derive(Debug, Clone, Copy)]
pub struct TemplateOptions {
    /// Waiting for descriptor processing.
    pub descriptor_poll: PollPolicy,
    /// Waiting for the transfer to reach 100%.
    pub progress_poll: PollPolicy,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self::from_polling(&PollingConfig::default())
    }
}

impl TemplateOptions {
    /// Create options from polling configuration.
    pub fn from_polling(polling: &PollingConfig) -> Self {
        Self {
            descriptor_poll: polling.descriptor.policy(),
            progress_poll: polling.template_progress.policy(),
        }
    }
}

/// A finished template upload.
#[derive(Debug, Clone)]
pub struct TemplateUpload {
    /// Href of the vApp template.
    pub href: String,
    /// Upload link the descriptor was sent to.
    pub descriptor_url: String,
    /// Files the server listed after processing the descriptor.
    pub files: Vec<CompanionFile>,
    /// Always [`UploadPhase::Complete`] on success.
    pub phase: UploadPhase,
}

/// Upload an OVF template to a catalog.
///
/// `catalog` is the catalog's template upload link (see
/// [`crate::directory::resolve_upload_target`]).
///
/// # Errors
///
/// - [`Error::Io`] if the descriptor or a companion file is missing locally.
/// - [`Error::UploadRejected`] if the server refuses creation or a transfer.
/// - [`Error::Protocol`] if a server document lacks an expected link.
/// - [`Error::Timeout`] if a polling budget is exhausted.
pub fn upload_template(
    transport: &dyn Transport,
    catalog: &Link,
    request: &TemplateRequest,
    options: &TemplateOptions,
    progress_callback: Option<ProgressCallback>,
) -> Result<TemplateUpload> {
    let report = |progress: UploadProgress| {
        if let Some(ref callback) = progress_callback {
            callback(progress);
        }
    };

    let descriptor = &request.descriptor_path;
    fs::metadata(descriptor).map_err(|e| Error::io(e, descriptor))?;

    // Created
    let href = create_entity(
        transport,
        catalog,
        UPLOAD_TEMPLATE_PARAMS_TYPE,
        upload_template_params(&request.name, &request.description),
    )?;
    info!(name = %request.name, %href, "vApp template created");
    report(UploadProgress::new(UploadPhase::Created));

    // DescriptorUploading
    report(UploadProgress::new(UploadPhase::DescriptorUploading));
    let descriptor_url = upload_descriptor(transport, &href, descriptor)?;

    // DescriptorProcessed
    let document = wait_for_descriptor(transport, &href, &options.descriptor_poll)?;
    info!(%href, "OVF descriptor processed");
    report(UploadProgress::new(UploadPhase::DescriptorProcessed));

    // FilesPending
    let mut files = companion_files(&document, &descriptor_url)?;
    let files_total = files.len();
    let mut progress = UploadProgress::new(UploadPhase::FilesPending);
    progress.files_total = files_total;
    progress.files_uploaded = count_uploaded(&files);
    report(progress.clone());

    // FilesUploading
    progress.phase = UploadPhase::FilesUploading;
    for file in files.iter_mut().filter(|f| f.status == FileStatus::Pending) {
        progress.current_file = Some(file.name.clone());
        report(progress.clone());

        upload_companion(transport, file, &request.files_dir)?;

        progress.files_uploaded += 1;
        progress.percent = get_upload_progress(transport, &href);
        report(progress.clone());
    }
    progress.current_file = None;

    wait_for_completion(transport, &href, &options.progress_poll, |percent| {
        progress.percent = percent;
        report(progress.clone());
    })?;

    // Complete
    progress.phase = UploadPhase::Complete;
    progress.percent = 100;
    report(progress);
    info!(%href, files = files_total, "vApp template upload complete");

    Ok(TemplateUpload {
        href,
        descriptor_url,
        files,
        phase: UploadPhase::Complete,
    })
}

/// Find the descriptor upload link on the new template and send the
/// descriptor. Returns the link used.
fn upload_descriptor(transport: &dyn Transport, href: &str, descriptor: &Path) -> Result<String> {
    let document = parse_document(&transport.get_ok(href)?.body)?;
    let url = find_upload_link(&document, |link| link.ends_with(DESCRIPTOR_NAME))
        .ok_or_else(|| Error::protocol("template exposes no descriptor upload link"))?;

    let content = fs::read(descriptor).map_err(|e| Error::io(e, descriptor))?;
    debug!(%url, bytes = content.len(), "uploading OVF descriptor");
    let response = transport.put(&url, Some(DESCRIPTOR_CONTENT_TYPE), RequestBody::Bytes(content))?;
    ensure_accepted(response)?;
    Ok(url)
}

/// Poll the template until the server reports the descriptor as processed
/// and return that document.
fn wait_for_descriptor(
    transport: &dyn Transport,
    href: &str,
    policy: &PollPolicy,
) -> Result<XmlElement> {
    poll_until(policy, "OVF descriptor processing", |attempt| {
        let document = parse_document(&transport.get_ok(href)?.body)?;
        let processed = document.attr(DESCRIPTOR_UPLOADED_ATTR) == Some("true");
        debug!(attempt, processed, "descriptor status");
        Ok(processed.then_some(document))
    })
}

/// Build the companion file set from a processed template document.
///
/// Files without an upload link are skipped. The descriptor itself is
/// listed as already uploaded.
pub fn companion_files(document: &XmlElement, descriptor_url: &str) -> Result<Vec<CompanionFile>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for element in document.descendants().filter(|e| e.kind() == ElementKind::File) {
        let Some(name) = element.attr("name").filter(|n| !n.is_empty()) else {
            warn!("skipping File entry without a name");
            continue;
        };
        let Some(url) = find_upload_link(element, |_| true) else {
            debug!(%name, "skipping File entry without an upload link");
            continue;
        };
        if !seen.insert(name.to_string()) {
            continue;
        }
        if !is_plain_file_name(name) {
            return Err(Error::protocol(format!(
                "server listed file '{}' outside the template directory",
                name
            )));
        }

        let status = if url == descriptor_url || name == DESCRIPTOR_NAME {
            FileStatus::Uploaded
        } else {
            FileStatus::Pending
        };
        let size = element
            .attr("size")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        files.push(CompanionFile {
            name: name.to_string(),
            size,
            url,
            status,
        });
    }

    Ok(files)
}

fn is_plain_file_name(name: &str) -> bool {
    let path = Path::new(name);
    path.file_name().map(|f| f == path.as_os_str()).unwrap_or(false)
}

fn count_uploaded(files: &[CompanionFile]) -> usize {
    files
        .iter()
        .filter(|f| f.status == FileStatus::Uploaded)
        .count()
}

/// Stream one companion file from `dir` to its upload link.
fn upload_companion(transport: &dyn Transport, file: &mut CompanionFile, dir: &Path) -> Result<()> {
    let path = dir.join(&file.name);
    let metadata = fs::metadata(&path).map_err(|e| Error::io(e, &path))?;
    if metadata.len() != file.size {
        warn!(
            name = %file.name,
            declared = file.size,
            local = metadata.len(),
            "local file size differs from the size declared in the descriptor"
        );
    }

    info!(name = %file.name, bytes = metadata.len(), "uploading file");
    let response = transport.put(&file.url, None, RequestBody::File(path))?;
    ensure_accepted(response)?;
    file.status = FileStatus::Uploaded;
    Ok(())
}
