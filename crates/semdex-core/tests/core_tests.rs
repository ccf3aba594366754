use std::fs;
use std::io::Write;
use tempfile::TempDir;

use semdex_core::error::Error;
use semdex_core::source::DirectorySource;
use semdex_core::text::content_hash;
use semdex_core::traits::DocumentSource;

#[test]
fn load_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let mut f = fs::File::create(dir.join("a.txt")).unwrap();
    writeln!(f, "Short <b>Text</b>").unwrap();

    let docs = DirectorySource::new(dir).load().expect("load");

    assert_eq!(docs.len(), 1, "one file becomes one document");
    assert_eq!(docs[0].id, "a");
    assert_eq!(docs[0].filename, "a.txt");
    assert_eq!(docs[0].text, "short text");
    assert_eq!(docs[0].content_hash, content_hash("short text"));
}

#[test]
fn load_is_sorted_recursive_and_filters_extension() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("news")).unwrap();
    fs::write(dir.join("b.txt"), "bravo").unwrap();
    fs::write(dir.join("a.txt"), "alpha").unwrap();
    fs::write(dir.join("news/c.txt"), "charlie").unwrap();
    fs::write(dir.join("notes.md"), "ignored").unwrap();

    let docs = DirectorySource::new(dir).load().expect("load");
    let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "news/c"]);
    assert_eq!(docs[2].filename, "news/c.txt");

    let md = DirectorySource::new(dir).with_extension("md").load().expect("load md");
    assert_eq!(md.len(), 1);
    assert_eq!(md[0].id, "notes");
}

#[test]
fn invalid_utf8_is_decoded_lossily() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("bin.txt"), [b'o', b'k', 0xff, b'!']).unwrap();
    let docs = DirectorySource::new(tmp.path()).load().expect("load");
    assert!(docs[0].text.starts_with("ok"));
}

#[test]
fn missing_root_is_source_unavailable() {
    let tmp = TempDir::new().unwrap();
    let err = DirectorySource::new(tmp.path().join("nope")).load().unwrap_err();
    assert!(matches!(err, Error::SourceUnavailable { .. }), "got {err:?}");
}

#[test]
fn unchanged_content_keeps_hash_and_edits_change_it() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a.txt"), "cats are mammals").unwrap();
    let first = DirectorySource::new(dir).load().unwrap();
    let again = DirectorySource::new(dir).load().unwrap();
    assert_eq!(first[0].content_hash, again[0].content_hash);

    fs::write(dir.join("a.txt"), "cats are small mammals").unwrap();
    let edited = DirectorySource::new(dir).load().unwrap();
    assert_ne!(first[0].content_hash, edited[0].content_hash);
}
