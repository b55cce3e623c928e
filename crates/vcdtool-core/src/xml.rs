//! XML document model for vCloud API responses.
//!
//! Responses are parsed into an owned element tree with namespaces resolved,
//! so elements are recognized by `(namespace, local name)` rather than by
//! matching substrings of prefixed tag names.

use std::collections::BTreeMap;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use crate::error::{Error, Result};

/// The vCloud API namespace.
pub const VCLOUD_NS: &str = "http://www.vmware.com/vcloud/v1.5";

/// The OVF envelope namespace.
pub const OVF_NS: &str = "http://schemas.dmtf.org/ovf/envelope/1";

/// Content type of an ISO media entity.
pub const MEDIA_TYPE: &str = "application/vnd.vmware.vcloud.media+xml";

/// Content type of a catalog.
pub const CATALOG_TYPE: &str = "application/vnd.vmware.vcloud.catalog+xml";

/// Content type of a catalog item.
pub const CATALOG_ITEM_TYPE: &str = "application/vnd.vmware.vcloud.catalogItem+xml";

/// Content type of the parameters that create a vApp template.
pub const UPLOAD_TEMPLATE_PARAMS_TYPE: &str =
    "application/vnd.vmware.vcloud.uploadVAppTemplateParams+xml";

/// Content type of a vApp template.
pub const TEMPLATE_TYPE: &str = "application/vnd.vmware.vcloud.vAppTemplate+xml";

/// Link relation marking a writable upload target.
pub const UPLOAD_REL: &str = "upload:default";

/// A namespace-qualified element name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    /// Whether this name is `local` in the vCloud namespace.
    pub fn is_vcloud(&self, local: &str) -> bool {
        self.namespace.as_deref() == Some(VCLOUD_NS) && self.local == local
    }
}

/// The elements the client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// `Org` reference in an organization list.
    Organization,
    /// `CatalogItem` reference.
    CatalogItem,
    /// `Link` to another resource.
    Link,
    /// `Entity` reference to the object a catalog item wraps.
    Entity,
    /// `File` awaiting or holding transferred bytes.
    File,
    /// Anything else.
    Other,
}

/// One parsed element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: QName,
    /// Attributes keyed by their name as written, prefix included.
    pub attributes: BTreeMap<String, String>,
    /// Concatenated, trimmed character data directly inside this element.
    pub text: Option<String>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn from_start(start: &BytesStart<'_>, namespace: Option<String>) -> Result<Self> {
        let local = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = BTreeMap::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| Error::xml(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| Error::xml(e.to_string()))?
                .into_owned();
            attributes.insert(key, value);
        }

        Ok(Self {
            name: QName { namespace, local },
            attributes,
            text: None,
            children: Vec::new(),
        })
    }

    /// Classify this element by its qualified name.
    pub fn kind(&self) -> ElementKind {
        if self.name.namespace.as_deref() != Some(VCLOUD_NS) {
            return ElementKind::Other;
        }
        match self.name.local.as_str() {
            "Org" => ElementKind::Organization,
            "CatalogItem" => ElementKind::CatalogItem,
            "Link" => ElementKind::Link,
            "Entity" => ElementKind::Entity,
            "File" => ElementKind::File,
            _ => ElementKind::Other,
        }
    }

    /// Look up an attribute value.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Whether the element carries any attributes besides namespace declarations.
    pub fn has_attributes(&self) -> bool {
        self.attributes
            .keys()
            .any(|k| k != "xmlns" && !k.starts_with("xmlns:"))
    }

    /// All descendants in document order, excluding `self`.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }

    /// Direct children of the given kind.
    pub fn children_of_kind(&self, kind: ElementKind) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter(move |c| c.kind() == kind)
    }
}

/// Depth-first iterator over an element's descendants.
pub struct Descendants<'a> {
    stack: Vec<&'a XmlElement>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}

/// Parse a document and return its root element.
pub fn parse_document(xml: &str) -> Result<XmlElement> {
    let mut reader = NsReader::from_str(xml);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let (resolved, event) = reader
            .read_resolved_event()
            .map_err(|e| Error::xml(e.to_string()))?;
        let namespace = match resolved {
            ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).into_owned()),
            _ => None,
        };

        match event {
            Event::Start(start) => {
                stack.push(XmlElement::from_start(&start, namespace)?);
            }
            Event::Empty(start) => {
                let element = XmlElement::from_start(&start, namespace)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::xml("unbalanced end tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| Error::xml(e.to_string()))?;
                append_text(&mut stack, &text);
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                append_text(&mut stack, &text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(Error::xml("document ended inside an element"));
    }
    root.ok_or_else(|| Error::xml("document has no root element"))
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(Error::xml("document has more than one root element")),
    }
    Ok(())
}

fn append_text(stack: &mut [XmlElement], text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    if let Some(current) = stack.last_mut() {
        match &mut current.text {
            Some(existing) => existing.push_str(text),
            None => current.text = Some(text.to_string()),
        }
    }
}

/// Body that declares a new ISO media entity.
pub fn media_params(name: &str, size: u64, description: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Media xmlns="{ns}" name="{name}" size="{size}" imageType="iso">
    <Description>{description}</Description>
</Media>"#,
        ns = VCLOUD_NS,
        name = escape(name),
        size = size,
        description = escape(description),
    )
}

/// Body that declares a new vApp template awaiting an OVF upload.
pub fn upload_template_params(name: &str, description: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<UploadVAppTemplateParams xmlns="{ns}" xmlns:ovf="{ovf}" name="{name}">
    <Description>{description}</Description>
</UploadVAppTemplateParams>"#,
        ns = VCLOUD_NS,
        ovf = OVF_NS,
        name = escape(name),
        description = escape(description),
    )
}
