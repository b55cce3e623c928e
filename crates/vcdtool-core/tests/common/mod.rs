//! Scripted in-process stand-in for a vCloud Director server.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use vcdtool_core::{Link, Method, Request, RequestBody, Response, Result, Transport};

/// API root used by the fake.
pub const API: &str = "https://vcd.test/api";

/// A request as the fake received it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub href: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Answers requests from per-route queues. The last queued response of a
/// route is repeated; unknown routes answer 404.
#[derive(Default)]
pub struct FakeVcd {
    routes: RefCell<HashMap<(Method, String), VecDeque<Response>>>,
    requests: RefCell<Vec<Recorded>>,
}

impl FakeVcd {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue responses for a route.
    pub fn on(&self, method: Method, href: &str, responses: Vec<Response>) -> &Self {
        self.routes
            .borrow_mut()
            .entry((method, href.to_string()))
            .or_default()
            .extend(responses);
        self
    }

    /// Answer a GET with an XML body.
    pub fn get_xml(&self, href: &str, body: &str) -> &Self {
        self.on(Method::GET, href, vec![Response::new(200, body)])
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.borrow().clone()
    }

    pub fn requests_to(&self, method: Method, href: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.href == href)
            .collect()
    }
}

/// Read a request body the way a server would receive it.
pub fn body_bytes(body: &RequestBody) -> Vec<u8> {
    match body {
        RequestBody::Empty => Vec::new(),
        RequestBody::Text(text) => text.clone().into_bytes(),
        RequestBody::Bytes(bytes) => bytes.clone(),
        RequestBody::File(path) => std::fs::read(path).expect("fake server could not read file"),
    }
}

impl Transport for FakeVcd {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", API, path.trim_start_matches('/'))
    }

    fn send(&self, request: Request) -> Result<Response> {
        self.requests.borrow_mut().push(Recorded {
            method: request.method.clone(),
            href: request.href.clone(),
            content_type: request.content_type_header().map(str::to_string),
            body: body_bytes(&request.body),
        });

        let mut routes = self.routes.borrow_mut();
        let response = match routes.get_mut(&(request.method, request.href)) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        Ok(response.unwrap_or_else(|| Response::new(404, "")))
    }
}

/// A catalog upload link as returned by `get_upload_catalog_links`.
pub fn upload_link(href: &str, content_type: &str) -> Link {
    Link {
        name: None,
        content_type: Some(content_type.to_string()),
        href: href.to_string(),
        rel: Some("add".to_string()),
    }
}

/// A catalog item response wrapping an entity.
pub fn catalog_item(entity_href: &str, entity_type: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<CatalogItem xmlns="http://www.vmware.com/vcloud/v1.5" name="item" href="{api}/catalogItem/1">
    <Link rel="up" type="application/vnd.vmware.vcloud.catalog+xml" href="{api}/catalog/1"/>
    <Entity type="{entity_type}" name="item" href="{entity_href}"/>
</CatalogItem>"#,
        api = API,
        entity_type = entity_type,
        entity_href = entity_href,
    )
}

/// A status document carrying a task with a progress value.
pub fn progress_doc(root: &str, progress: u32) -> String {
    format!(
        r#"<{root} xmlns="http://www.vmware.com/vcloud/v1.5" status="0">
    <Tasks><Task status="running"><Progress>{progress}</Progress></Task></Tasks>
</{root}>"#,
        root = root,
        progress = progress,
    )
}
