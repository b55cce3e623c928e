//! vcdtool Core Library
//!
//! This crate provides the core functionality for uploading ISO media and OVF
//! vApp templates into vCloud Director catalogs.
//!
//! # Overview
//!
//! A [`Session`] logs in and carries the authorization token. Directory
//! functions resolve organization and catalog names to hrefs. The upload
//! flows create an entity in the catalog, transfer the bytes, and poll the
//! entity until the server reports completion.
//!
//! # Modules
//!
//! - [`error`] - Error types and Result alias
//! - [`config`] - Connection and polling configuration
//! - [`session`] - HTTP transport and authenticated session
//! - [`xml`] - Namespace-aware document model and request bodies
//! - [`directory`] - Organization and catalog listing
//! - [`poll`] - Fixed-interval polling with an attempt budget
//! - [`progress`] - Upload progress probing
//! - [`upload`] - Phases and progress reporting shared by the flows
//! - [`media`] - ISO media upload
//! - [`template`] - OVF template upload
//!
//! # Quick Start
//!
//! ```no_run
//! use vcdtool_core::{
//!     find_catalog, list_orgs, resolve_upload_target, upload_template, ConnectionConfig,
//!     Session, TemplateOptions, TemplateRequest, UploadKind,
//! };
//!
//! let mut session = Session::new(ConnectionConfig {
//!     api_url: "https://vcd.example.com/api".into(),
//!     username: "admin@System".into(),
//!     password: "secret".into(),
//!     ..ConnectionConfig::default()
//! }).unwrap();
//! session.login().unwrap();
//!
//! let orgs = list_orgs(&session).unwrap();
//! let catalog = find_catalog(&session, &orgs, Some("Acme"), "Templates").unwrap();
//! let target = resolve_upload_target(&session, &catalog, UploadKind::Template).unwrap();
//! let request = TemplateRequest::new("web", "Web tier", "/images/web/web.ovf");
//! upload_template(&session, &target, &request, &TemplateOptions::default(), None).unwrap();
//!
//! session.logout();
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod media;
pub mod poll;
pub mod progress;
pub mod session;
pub mod template;
pub mod upload;
pub mod xml;

pub use error::{Error, Result};
pub use reqwest::Method;

pub use config::{ConnectionConfig, PollSettings, PollingConfig, VcdConfig};
pub use directory::{
    find_catalog, find_org, get_upload_catalog_links, list_org_catalog, list_org_catalog_links,
    list_org_links, list_orgs, resolve_upload_target, Link, Organization, UploadKind,
};
pub use media::{upload_media, MediaUpload};
pub use poll::{poll_until, PollPolicy};
pub use progress::{get_upload_progress, progress_from_document, wait_for_completion};
pub use session::{Request, RequestBody, Response, Session, Transport};
pub use template::{
    upload_template, CompanionFile, FileStatus, TemplateOptions, TemplateRequest, TemplateUpload,
};
pub use upload::{ProgressCallback, UploadPhase, UploadProgress};
