//! Integration tests for organization and catalog listing.

mod common;

use common::{FakeVcd, API};
use vcdtool_core::xml::{CATALOG_TYPE, MEDIA_TYPE, UPLOAD_TEMPLATE_PARAMS_TYPE};
use vcdtool_core::{
    find_catalog, get_upload_catalog_links, list_org_catalog, list_org_catalog_links,
    list_org_links, list_orgs, resolve_upload_target, Error, Link, Method, Organization,
    Response, UploadKind,
};

fn org_list() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<OrgList xmlns="http://www.vmware.com/vcloud/v1.5" type="application/vnd.vmware.vcloud.orgList+xml" href="{api}/org/">
    <Org type="application/vnd.vmware.vcloud.org+xml" name="System" href="{api}/org/1"/>
    <Org type="application/vnd.vmware.vcloud.org+xml" name="Acme" href="{api}/org/2"/>
    <Org/>
    <Org type="application/vnd.vmware.vcloud.org+xml" name="" href="{api}/org/3"/>
</OrgList>"#,
        api = API
    )
}

fn acme_org() -> String {
    format!(
        r#"<Org xmlns="http://www.vmware.com/vcloud/v1.5" name="Acme" href="{api}/org/2">
    <Link rel="down" type="application/vnd.vmware.vcloud.vdc+xml" name="Acme-vDC" href="{api}/vdc/5"/>
    <Link rel="down" type="application/vnd.vmware.vcloud.catalog+xml" name="Templates" href="{api}/catalog/7"/>
    <Link rel="down" type="application/vnd.vmware.vcloud.tasksList+xml" href="{api}/tasksList/2"/>
    <Description>Acme Corp</Description>
</Org>"#,
        api = API
    )
}

fn templates_catalog() -> String {
    format!(
        r#"<Catalog xmlns="http://www.vmware.com/vcloud/v1.5" name="Templates" href="{api}/catalog/7">
    <Link rel="up" type="application/vnd.vmware.vcloud.org+xml" href="{api}/org/2"/>
    <Link rel="add" type="application/vnd.vmware.vcloud.catalogItem+xml" href="{api}/catalog/7/catalogItems"/>
    <Link rel="add" type="application/vnd.vmware.vcloud.media+xml" href="{api}/catalog/7/action/upload"/>
    <Link rel="add" type="application/vnd.vmware.vcloud.uploadVAppTemplateParams+xml" href="{api}/catalog/7/action/upload"/>
    <Link rel="add" type="application/vnd.vmware.vcloud.media+xml" href="{api}/catalog/7/action/copy"/>
    <Description>Golden images</Description>
    <CatalogItems>
        <CatalogItem type="application/vnd.vmware.vcloud.catalogItem+xml" name="ubuntu-22.04.iso" href="{api}/catalogItem/11"/>
        <CatalogItem type="application/vnd.vmware.vcloud.catalogItem+xml" name="web-template" href="{api}/catalogItem/12"/>
    </CatalogItems>
</Catalog>"#,
        api = API
    )
}

fn acme() -> Organization {
    Organization {
        name: "Acme".to_string(),
        href: format!("{}/org/2", API),
        content_type: None,
    }
}

fn templates_link() -> Link {
    Link {
        name: Some("Templates".to_string()),
        content_type: Some(CATALOG_TYPE.to_string()),
        href: format!("{}/catalog/7", API),
        rel: Some("down".to_string()),
    }
}

#[test]
fn test_list_orgs_skips_entries_without_name_or_href() {
    let fake = FakeVcd::new();
    fake.get_xml(&format!("{}/org", API), &org_list());

    let orgs = list_orgs(&fake).expect("Failed to list orgs");

    assert_eq!(orgs.len(), 2);
    assert_eq!(orgs[0].name, "System");
    assert_eq!(orgs[1].name, "Acme");
    assert_eq!(orgs[1].href, format!("{}/org/2", API));
    for org in &orgs {
        assert!(!org.name.is_empty(), "org name should not be empty");
        assert!(!org.href.is_empty(), "org href should not be empty");
    }
}

#[test]
fn test_list_orgs_empty_collection() {
    let fake = FakeVcd::new();
    fake.get_xml(
        &format!("{}/org", API),
        r#"<OrgList xmlns="http://www.vmware.com/vcloud/v1.5"/>"#,
    );
    assert!(list_orgs(&fake).unwrap().is_empty());
}

#[test]
fn test_list_orgs_propagates_http_status() {
    let fake = FakeVcd::new();
    fake.on(Method::GET, &format!("{}/org", API), vec![Response::new(401, "")]);

    let err = list_orgs(&fake).unwrap_err();
    assert!(matches!(err, Error::UnexpectedStatus { status: 401, .. }));
}

#[test]
fn test_list_org_links_returns_named_children() {
    let fake = FakeVcd::new();
    fake.get_xml(&acme().href, &acme_org());

    let links = list_org_links(&fake, &acme()).expect("Failed to list org links");

    let names: Vec<&str> = links.iter().map(|l| l.display_name()).collect();
    assert_eq!(names, vec!["Acme-vDC", "Templates"]);
    assert!(links[1].is_catalog());
    assert_eq!(links[1].href, format!("{}/catalog/7", API));
}

#[test]
fn test_list_org_catalog_links_returns_item_names() {
    let fake = FakeVcd::new();
    fake.get_xml(&templates_link().href, &templates_catalog());

    let items = list_org_catalog_links(&fake, &templates_link()).unwrap();
    assert_eq!(items, vec!["ubuntu-22.04.iso", "web-template"]);
}

#[test]
fn test_list_org_catalog_links_empty_catalog() {
    let fake = FakeVcd::new();
    fake.get_xml(
        &templates_link().href,
        r#"<Catalog xmlns="http://www.vmware.com/vcloud/v1.5" name="Empty"><CatalogItems/></Catalog>"#,
    );

    assert!(list_org_catalog_links(&fake, &templates_link())
        .unwrap()
        .is_empty());
}

#[test]
fn test_list_org_catalog_returns_attributed_children() {
    let fake = FakeVcd::new();
    fake.get_xml(&templates_link().href, &templates_catalog());

    let links = list_org_catalog(&fake, &templates_link()).unwrap();
    // Five links; Description and CatalogItems carry no attributes.
    assert_eq!(links.len(), 5);
}

#[test]
fn test_upload_catalog_links_satisfy_both_predicates() {
    let fake = FakeVcd::new();
    fake.get_xml(&templates_link().href, &templates_catalog());

    let all = list_org_catalog(&fake, &templates_link()).unwrap();
    for content_type in [MEDIA_TYPE, UPLOAD_TEMPLATE_PARAMS_TYPE] {
        let links = get_upload_catalog_links(&fake, &templates_link(), content_type).unwrap();
        assert_eq!(links.len(), 1, "one upload link for {}", content_type);
        for link in &links {
            assert!(all.contains(link), "result should be a subset of the catalog");
            assert!(link.has_type(content_type));
            assert!(link.href.ends_with("upload"));
        }
    }
}

#[test]
fn test_upload_catalog_links_none_matching() {
    let fake = FakeVcd::new();
    fake.get_xml(&templates_link().href, &templates_catalog());

    let links = get_upload_catalog_links(&fake, &templates_link(), "application/x-unknown").unwrap();
    assert!(links.is_empty());
}

#[test]
fn test_find_catalog_in_named_org() {
    let fake = FakeVcd::new();
    fake.get_xml(&acme().href, &acme_org());

    let orgs = vec![acme()];
    let catalog = find_catalog(&fake, &orgs, Some("Acme"), "Templates").unwrap();
    assert_eq!(catalog, templates_link());
}

#[test]
fn test_find_catalog_searches_all_orgs() {
    let fake = FakeVcd::new();
    let system = Organization {
        name: "System".to_string(),
        href: format!("{}/org/1", API),
        content_type: None,
    };
    fake.get_xml(
        &system.href,
        r#"<Org xmlns="http://www.vmware.com/vcloud/v1.5" name="System"/>"#,
    );
    fake.get_xml(&acme().href, &acme_org());

    let orgs = vec![system, acme()];
    let catalog = find_catalog(&fake, &orgs, None, "Templates").unwrap();
    assert_eq!(catalog.href, format!("{}/catalog/7", API));
}

#[test]
fn test_find_catalog_ignores_non_catalog_links() {
    let fake = FakeVcd::new();
    fake.get_xml(&acme().href, &acme_org());

    let err = find_catalog(&fake, &[acme()], Some("Acme"), "Acme-vDC").unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[test]
fn test_find_catalog_unknown_org() {
    let fake = FakeVcd::new();
    let err = find_catalog(&fake, &[acme()], Some("Nope"), "Templates").unwrap_err();
    assert!(err.to_string().contains("organization 'Nope'"));
    assert!(fake.requests().is_empty());
}

#[test]
fn test_resolve_upload_target() {
    let fake = FakeVcd::new();
    fake.get_xml(&templates_link().href, &templates_catalog());

    let target = resolve_upload_target(&fake, &templates_link(), UploadKind::Media).unwrap();
    assert_eq!(target.href, format!("{}/catalog/7/action/upload", API));
    assert!(target.has_type(MEDIA_TYPE));
}

#[test]
fn test_resolve_upload_target_missing() {
    let fake = FakeVcd::new();
    fake.get_xml(
        &templates_link().href,
        r#"<Catalog xmlns="http://www.vmware.com/vcloud/v1.5" name="Templates"/>"#,
    );

    let err = resolve_upload_target(&fake, &templates_link(), UploadKind::Template).unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}
