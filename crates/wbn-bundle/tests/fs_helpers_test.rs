use std::fs;
use std::path::Path;

use tempfile::TempDir;
use wbn_bundle::{Bundle, BundleBuilder, BundleError, ContentTypeResolver, ExtensionContentTypes, FormatVersion};

const BASE: &str = "https://example.com/";

fn site() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("index.html"), "<!doctype html>hello").unwrap();
    fs::create_dir(dir.path().join("resources")).unwrap();
    fs::write(dir.path().join("resources/style.css"), "body {}").unwrap();
    dir
}

#[test]
fn test_directory_index_produces_two_records() {
    let dir = site();
    let mut builder = BundleBuilder::new(FormatVersion::B2);
    builder
        .add_files_recursively(BASE, dir.path(), &ExtensionContentTypes)
        .unwrap();
    let bundle = Bundle::from_bytes(&builder.finalize().unwrap()).unwrap();

    let mut urls: Vec<&str> = bundle.urls().collect();
    urls.sort_unstable();
    assert_eq!(
        urls,
        vec![
            "https://example.com/",
            "https://example.com/index.html",
            "https://example.com/resources/style.css",
        ]
    );

    let root = bundle.get_response(BASE).unwrap();
    assert_eq!(root.status, 200);
    assert_eq!(root.header("content-type"), Some("text/html"));
    assert_eq!(root.body, b"<!doctype html>hello");

    let redirect = bundle.get_response("https://example.com/index.html").unwrap();
    assert_eq!(redirect.status, 301);
    assert_eq!(redirect.header("location"), Some("./"));
    assert!(redirect.body.is_empty());

    let css = bundle
        .get_response("https://example.com/resources/style.css")
        .unwrap();
    assert_eq!(css.header("content-type"), Some("text/css"));
}

#[test]
fn test_insertion_order_is_sorted() {
    let dir = site();
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    let mut builder = BundleBuilder::new(FormatVersion::B1);
    builder.set_primary_url(BASE).unwrap();
    builder
        .add_files_recursively(BASE, dir.path(), &ExtensionContentTypes)
        .unwrap();
    assert_eq!(builder.exchange_count(), 4);
    let bundle = Bundle::from_bytes(&builder.finalize().unwrap()).unwrap();

    // a.txt sorts before index.html, so it holds the first response
    let index = bundle.section("index").unwrap();
    let entry = index.get("https://example.com/a.txt").unwrap();
    let (offset, _) = FormatVersion::B1
        .parse_index_entry("https://example.com/a.txt", entry)
        .unwrap();
    assert_eq!(offset, 1);
}

#[test]
fn test_base_url_must_end_with_slash() {
    let dir = site();
    let mut builder = BundleBuilder::new(FormatVersion::B2);
    assert!(matches!(
        builder.add_files_recursively("https://example.com/app", dir.path(), &ExtensionContentTypes),
        Err(BundleError::InvalidUrl { .. })
    ));
}

#[test]
fn test_missing_directory_is_io_error() {
    let dir = site();
    let mut builder = BundleBuilder::new(FormatVersion::B2);
    let err = builder
        .add_files_recursively(BASE, &dir.path().join("nope"), &ExtensionContentTypes)
        .err()
        .unwrap();
    assert_eq!(err.class(), wbn_bundle::ErrorClass::Io);
}

struct NoTypes;

impl ContentTypeResolver for NoTypes {
    fn content_type(&self, _path: &Path) -> Option<String> {
        None
    }
}

#[test]
fn test_resolver_without_type_rejects_non_empty_file() {
    let dir = site();
    fs::write(dir.path().join("empty.bin"), "").unwrap();
    let mut builder = BundleBuilder::new(FormatVersion::B2);
    builder
        .add_file("https://example.com/empty.bin", &dir.path().join("empty.bin"), &NoTypes)
        .unwrap();
    assert!(matches!(
        builder.add_file("https://example.com/", &dir.path().join("index.html"), &NoTypes),
        Err(BundleError::MissingContentType { .. })
    ));
}
