//! Integration tests for the ISO media upload flow.

mod common;

use std::io::Write;
use std::time::Duration;

use common::{catalog_item, progress_doc, upload_link, FakeVcd, API};
use tempfile::{NamedTempFile, TempDir};
use vcdtool_core::xml::MEDIA_TYPE;
use vcdtool_core::{upload_media, wait_for_completion, Error, Method, PollPolicy, Response};

fn catalog_upload() -> String {
    format!("{}/catalog/7/action/upload", API)
}

fn media_href() -> String {
    format!("{}/media/42", API)
}

fn transfer_url() -> String {
    "https://vcd.test/transfer/0a1b/file".to_string()
}

fn media_document() -> String {
    format!(
        r#"<Media xmlns="http://www.vmware.com/vcloud/v1.5" name="ubuntu.iso" status="0" size="11" href="{href}">
    <Link rel="up" type="application/vnd.vmware.vcloud.catalog+xml" href="{api}/catalog/7"/>
    <Files>
        <File name="file" size="11" bytesTransferred="0">
            <Link rel="upload:default" href="{transfer}"/>
        </File>
    </Files>
</Media>"#,
        href = media_href(),
        api = API,
        transfer = transfer_url(),
    )
}

fn iso_file(content: &[u8]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".iso")
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(content).unwrap();
    file.flush().unwrap();
    file
}

fn scripted_server() -> FakeVcd {
    let fake = FakeVcd::new();
    fake.on(
        Method::POST,
        &catalog_upload(),
        vec![Response::new(201, catalog_item(&media_href(), MEDIA_TYPE))],
    );
    fake.on(
        Method::GET,
        &media_href(),
        vec![
            Response::new(200, media_document()),
            Response::new(200, progress_doc("Media", 0)),
            Response::new(200, progress_doc("Media", 50)),
            Response::new(200, progress_doc("Media", 100)),
        ],
    );
    fake.on(Method::PUT, &transfer_url(), vec![Response::new(200, "")]);
    fake
}

#[test]
fn test_media_upload_end_to_end() {
    let fake = scripted_server();
    let iso = iso_file(b"hello world");
    let target = upload_link(&catalog_upload(), MEDIA_TYPE);

    let upload = upload_media(&fake, &target, iso.path(), 11, "ISO database image")
        .expect("Media upload failed");

    assert_eq!(upload.href, media_href());
    assert_eq!(upload.size, 11);

    let posts = fake.requests_to(Method::POST, &catalog_upload());
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].content_type.as_deref(), Some(MEDIA_TYPE));
    let body = posts[0].body_text();
    assert!(body.contains(r#"size="11""#));
    assert!(body.contains(r#"imageType="iso""#));
    assert!(body.contains(&format!(r#"name="{}""#, upload.name)));
    assert!(body.contains("<Description>ISO database image</Description>"));

    let puts = fake.requests_to(Method::PUT, &transfer_url());
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].body, b"hello world");
    assert_eq!(puts[0].content_type, None, "content type must not leak into the transfer");

    let policy = PollPolicy::new(Duration::from_millis(500), Some(10)).with_sleep(|_| {});
    let mut readings = Vec::new();
    let done = wait_for_completion(&fake, &upload.href, &policy, |p| readings.push(p)).unwrap();
    assert_eq!(done, 100);
    assert_eq!(readings, vec![0, 50, 100]);
}

#[test]
fn test_media_upload_request_order() {
    let fake = scripted_server();
    let iso = iso_file(b"hello world");
    let target = upload_link(&catalog_upload(), MEDIA_TYPE);

    upload_media(&fake, &target, iso.path(), 11, "image").unwrap();

    let methods: Vec<Method> = fake.requests().into_iter().map(|r| r.method).collect();
    assert_eq!(methods, vec![Method::POST, Method::GET, Method::PUT]);
}

#[test]
fn test_media_upload_zero_byte_file() {
    let fake = scripted_server();
    let iso = iso_file(b"");
    let target = upload_link(&catalog_upload(), MEDIA_TYPE);

    let upload = upload_media(&fake, &target, iso.path(), 0, "empty").unwrap();
    assert_eq!(upload.size, 0);

    let post = &fake.requests_to(Method::POST, &catalog_upload())[0];
    assert!(post.body_text().contains(r#"size="0""#));
    let put = &fake.requests_to(Method::PUT, &transfer_url())[0];
    assert!(put.body.is_empty());
}

#[test]
fn test_media_upload_rejected_creation() {
    let fake = FakeVcd::new();
    fake.on(
        Method::POST,
        &catalog_upload(),
        vec![Response::new(
            400,
            r#"<Error majorErrorCode="400" message="duplicate name"/>"#,
        )],
    );
    let iso = iso_file(b"data");
    let target = upload_link(&catalog_upload(), MEDIA_TYPE);

    let err = upload_media(&fake, &target, iso.path(), 4, "image").unwrap_err();

    match err {
        Error::UploadRejected { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("duplicate name"));
        }
        other => panic!("expected UploadRejected, got {:?}", other),
    }
    assert_eq!(fake.requests().len(), 1, "nothing may follow a rejected POST");
}

#[test]
fn test_media_upload_rejected_transfer() {
    let fake = FakeVcd::new();
    fake.on(
        Method::POST,
        &catalog_upload(),
        vec![Response::new(201, catalog_item(&media_href(), MEDIA_TYPE))],
    );
    fake.get_xml(&media_href(), &media_document());
    fake.on(Method::PUT, &transfer_url(), vec![Response::new(403, "forbidden")]);
    let iso = iso_file(b"data");
    let target = upload_link(&catalog_upload(), MEDIA_TYPE);

    let err = upload_media(&fake, &target, iso.path(), 4, "image").unwrap_err();
    assert!(matches!(err, Error::UploadRejected { status: 403, .. }));
}

#[test]
fn test_media_upload_missing_entity() {
    let fake = FakeVcd::new();
    fake.on(
        Method::POST,
        &catalog_upload(),
        vec![Response::new(
            201,
            r#"<CatalogItem xmlns="http://www.vmware.com/vcloud/v1.5" name="x"/>"#,
        )],
    );
    let iso = iso_file(b"data");
    let target = upload_link(&catalog_upload(), MEDIA_TYPE);

    let err = upload_media(&fake, &target, iso.path(), 4, "image").unwrap_err();
    assert!(matches!(err, Error::Protocol { .. }));
}

#[test]
fn test_media_upload_missing_upload_link() {
    let fake = FakeVcd::new();
    fake.on(
        Method::POST,
        &catalog_upload(),
        vec![Response::new(201, catalog_item(&media_href(), MEDIA_TYPE))],
    );
    fake.get_xml(
        &media_href(),
        r#"<Media xmlns="http://www.vmware.com/vcloud/v1.5" name="x" status="0"/>"#,
    );
    let iso = iso_file(b"data");
    let target = upload_link(&catalog_upload(), MEDIA_TYPE);

    let err = upload_media(&fake, &target, iso.path(), 4, "image").unwrap_err();
    assert!(matches!(err, Error::Protocol { .. }));
}

#[test]
fn test_media_upload_missing_local_file() {
    let fake = scripted_server();
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.iso");
    let target = upload_link(&catalog_upload(), MEDIA_TYPE);

    let err = upload_media(&fake, &target, &missing, 0, "image").unwrap_err();

    assert!(err.is_file_not_found());
    assert!(fake.requests().is_empty(), "no request before the file is found");
}
