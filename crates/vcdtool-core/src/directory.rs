//! Organization and catalog listing.
//!
//! All functions here are read-only GETs. A document without matching
//! children yields an empty list rather than an error.

use tracing::debug;

use crate::error::{Error, Result};
use crate::session::Transport;
use crate::xml::{
    parse_document, XmlElement, CATALOG_ITEM_TYPE, CATALOG_TYPE, MEDIA_TYPE,
    UPLOAD_TEMPLATE_PARAMS_TYPE,
};

/// Suffix of the catalog action that accepts uploads.
pub const UPLOAD_HREF_SUFFIX: &str = "upload";

/// An organization visible to the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organization {
    pub name: String,
    pub href: String,
    pub content_type: Option<String>,
}

/// A reference from one resource to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub name: Option<String>,
    /// The `type` attribute: content type of the target.
    pub content_type: Option<String>,
    pub href: String,
    pub rel: Option<String>,
}

impl Link {
    /// Build a link from an element carrying an `href`.
    pub fn from_element(element: &XmlElement) -> Option<Self> {
        let href = element.attr("href").filter(|h| !h.is_empty())?;
        Some(Self {
            name: element.attr("name").map(str::to_string),
            content_type: element.attr("type").map(str::to_string),
            href: href.to_string(),
            rel: element.attr("rel").map(str::to_string),
        })
    }

    /// Whether the link's `type` equals `content_type`.
    pub fn has_type(&self, content_type: &str) -> bool {
        self.content_type.as_deref() == Some(content_type)
    }

    /// Whether the link points at a catalog.
    pub fn is_catalog(&self) -> bool {
        self.has_type(CATALOG_TYPE)
    }

    /// The link name, or an empty string.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

/// What kind of object to upload into a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// An ISO image.
    Media,
    /// An OVF vApp template.
    Template,
}

impl UploadKind {
    /// Content type of the catalog upload link for this kind.
    pub fn content_type(&self) -> &'static str {
        match self {
            UploadKind::Media => MEDIA_TYPE,
            UploadKind::Template => UPLOAD_TEMPLATE_PARAMS_TYPE,
        }
    }
}

impl std::fmt::Display for UploadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadKind::Media => write!(f, "media"),
            UploadKind::Template => write!(f, "ovf"),
        }
    }
}

fn fetch(transport: &dyn Transport, href: &str) -> Result<XmlElement> {
    let response = transport.get_ok(href)?;
    parse_document(&response.body)
}

/// List organizations from the organization collection.
///
/// Children without a non-empty `name` and `href` are skipped.
pub fn list_orgs(transport: &dyn Transport) -> Result<Vec<Organization>> {
    let root = fetch(transport, &transport.endpoint("org"))?;

    let orgs = root
        .children
        .iter()
        .filter(|child| child.has_attributes())
        .filter_map(|child| {
            let name = child.attr("name").filter(|n| !n.is_empty());
            let href = child.attr("href").filter(|h| !h.is_empty());
            match (name, href) {
                (Some(name), Some(href)) => Some(Organization {
                    name: name.to_string(),
                    href: href.to_string(),
                    content_type: child.attr("type").map(str::to_string),
                }),
                _ => {
                    debug!(element = %child.name.local, "skipping org entry without name or href");
                    None
                }
            }
        })
        .collect();

    Ok(orgs)
}

/// List the named links of an organization (catalogs, vDCs, networks).
pub fn list_org_links(transport: &dyn Transport, org: &Organization) -> Result<Vec<Link>> {
    let root = fetch(transport, &org.href)?;
    Ok(root
        .children
        .iter()
        .filter(|child| child.attr("name").is_some_and(|n| !n.is_empty()))
        .filter_map(Link::from_element)
        .collect())
}

/// Names of the catalog items in a catalog.
pub fn list_org_catalog_links(transport: &dyn Transport, catalog: &Link) -> Result<Vec<String>> {
    let root = fetch(transport, &catalog.href)?;
    Ok(root
        .descendants()
        .filter(|e| e.attr("type") == Some(CATALOG_ITEM_TYPE))
        .filter_map(|e| e.attr("name"))
        .map(str::to_string)
        .collect())
}

/// Every attributed child of a catalog document as a link.
pub fn list_org_catalog(transport: &dyn Transport, catalog: &Link) -> Result<Vec<Link>> {
    let root = fetch(transport, &catalog.href)?;
    Ok(root
        .children
        .iter()
        .filter(|child| child.has_attributes())
        .filter_map(Link::from_element)
        .collect())
}

/// Catalog links that accept uploads of `content_type`.
///
/// Only direct children whose `type` equals `content_type` and whose `href`
/// ends with the upload action suffix are returned.
pub fn get_upload_catalog_links(
    transport: &dyn Transport,
    catalog: &Link,
    content_type: &str,
) -> Result<Vec<Link>> {
    let root = fetch(transport, &catalog.href)?;
    Ok(root
        .children
        .iter()
        .filter_map(Link::from_element)
        .filter(|link| link.has_type(content_type) && link.href.ends_with(UPLOAD_HREF_SUFFIX))
        .collect())
}

/// Find an organization by name.
pub fn find_org<'a>(orgs: &'a [Organization], name: &str) -> Result<&'a Organization> {
    orgs.iter()
        .find(|org| org.name == name)
        .ok_or_else(|| Error::not_found(format!("organization '{}'", name)))
}

/// Find a catalog by name.
///
/// The catalog is looked up in `org_name` when given, otherwise in every
/// organization in listing order.
pub fn find_catalog(
    transport: &dyn Transport,
    orgs: &[Organization],
    org_name: Option<&str>,
    catalog_name: &str,
) -> Result<Link> {
    let candidates: Vec<&Organization> = match org_name {
        Some(name) => vec![find_org(orgs, name)?],
        None => orgs.iter().collect(),
    };

    for org in candidates {
        let found = list_org_links(transport, org)?
            .into_iter()
            .find(|link| link.is_catalog() && link.name.as_deref() == Some(catalog_name));
        if let Some(link) = found {
            debug!(org = %org.name, catalog = %catalog_name, href = %link.href, "catalog resolved");
            return Ok(link);
        }
    }

    Err(Error::not_found(match org_name {
        Some(org) => format!("catalog '{}' in organization '{}'", catalog_name, org),
        None => format!("catalog '{}'", catalog_name),
    }))
}

/// The catalog action that accepts an upload of `kind`.
pub fn resolve_upload_target(
    transport: &dyn Transport,
    catalog: &Link,
    kind: UploadKind,
) -> Result<Link> {
    get_upload_catalog_links(transport, catalog, kind.content_type())?
        .into_iter()
        .next()
        .ok_or_else(|| {
            Error::not_found(format!(
                "{} upload link in catalog '{}'",
                kind,
                catalog.display_name()
            ))
        })
}
