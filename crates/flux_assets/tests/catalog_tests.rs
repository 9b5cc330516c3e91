//! Integration tests for flux_assets (catalog over a real directory tree)

use std::fs;

use flux_assets::*;
use flux_lang::{parse_document, Mulberry32};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const DOC: &str = r#"document {
    assets {
        asset logo { kind = image; path = "img/logo.png"; tags = [brand]; }
        bank photos { kind = image; root = "media"; include = "**/*.jpg"; tags = [photo]; weight = 3; }
        bank clips { kind = video; root = "missing"; }
    }
}"#;

#[test]
fn test_catalog_over_filesystem() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let media = dir.path().join("media");
    fs::create_dir_all(media.join("2024")).unwrap();
    fs::write(media.join("beach.jpg"), b"jpg").unwrap();
    fs::write(media.join("2024/snow.jpg"), b"jpg").unwrap();
    fs::write(media.join("2024/readme.md"), b"md").unwrap();

    let doc = parse_document(DOC).unwrap();
    let ctx = ResolveContext::new(dir.path());
    let catalog = AssetCatalog::build(&doc, &FsResolver, &ctx).unwrap();

    let names: Vec<_> = catalog.assets().iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["logo", "photos/2024/snow.jpg", "photos/beach.jpg"]);

    let snow = catalog.by_name("photos/2024/snow.jpg").unwrap();
    assert_eq!(snow.path, "media/2024/snow.jpg");
    assert_eq!(snow.weight, 3.0);
    assert_eq!(snow.source, AssetSource::Bank { name: "photos".to_string(), file: "2024/snow.jpg".to_string() });

    // Adding a file does not disturb existing ids
    fs::write(media.join("aaa.jpg"), b"jpg").unwrap();
    let rescanned = AssetCatalog::build(&doc, &FsResolver, &ctx).unwrap();
    assert_eq!(rescanned.len(), 4);
    assert_eq!(rescanned.by_name("photos/2024/snow.jpg").unwrap().id, snow.id);
}

#[test]
fn test_pick_respects_tags() {
    let doc = parse_document(DOC).unwrap();
    let resolver = FixedResolver::new().with_bank("photos", &["a.jpg", "b.jpg"]);
    let catalog = AssetCatalog::build(&doc, &resolver, &ResolveContext::new(".")).unwrap();

    let mut rng = Mulberry32::new(3);
    for _ in 0..20 {
        let picked = catalog.pick(&["photo".to_string()], PickStrategy::Weighted, &mut rng).unwrap();
        assert!(picked.name.starts_with("photos/"));
    }
    assert!(catalog.pick(&["nothing".to_string()], PickStrategy::Uniform, &mut rng).is_none());
}

#[test]
fn test_resolver_errors_propagate() {
    let doc = parse_document(DOC).unwrap();
    let failing = |_: &flux_lang::BankDecl, _: &ResolveContext| -> Result<Vec<String>, AssetError> {
        Err(AssetError::Resolver("offline".to_string()))
    };
    let err = AssetCatalog::build(&doc, &failing, &ResolveContext::new(".")).unwrap_err();
    assert_eq!(err.to_string(), "Resolver error: offline");
}
