//! End-to-end classification through the builtin database and hand-built
//! trees.

use oximagic_core::reaper::{Reaper, ResourceReaper};
use oximagic_core::stream::{MemoryCachingStream, SeekableStream};
use oximagic_rules::matcher::{NumericMatcher, RegexpMatcher, StringMatcher, Width};
use oximagic_rules::{
    Analyzer, AnalyzerConfig, Context, Locale, MatcherRegistry, Properties, RuleNode, SetExtension,
    SetMimeType, SetProperty,
};
use std::io::Write;
use std::sync::Arc;

fn builtin(bytes: &[u8]) -> Properties {
    Analyzer::builtin()
        .unwrap()
        .analyze_bytes(bytes, &AnalyzerConfig::new())
        .unwrap()
}

#[test]
fn pdf_tree_sets_mime_and_extension() {
    let root = RuleNode::named("pdf")
        .with_matcher(NumericMatcher::new(0, Width::Byte, 0x25))
        .with_child(
            RuleNode::named("pdf-document")
                .with_matcher(StringMatcher::from_bytes(1, b"PDF-".to_vec()))
                .with_action(SetMimeType("application/pdf".into()))
                .with_action(SetExtension("pdf".into())),
        );
    let bytes: [u8; 9] = [0x25, 0x50, 0x44, 0x46, 0x2D, 0x31, 0x2E, 0x34, 0x0A];
    let props = Analyzer::new(root)
        .analyze_bytes(&bytes, &AnalyzerConfig::new())
        .unwrap();
    assert_eq!(props.mime_type(), Some("application/pdf"));
    assert_eq!(props.extension(), Some("pdf"));
}

#[test]
fn empty_stream_falls_back_to_text() {
    let props = builtin(b"");
    assert_eq!(props.mime_type(), Some("text/plain"));
    assert_eq!(props.extension(), Some("txt"));
    assert_eq!(props.description(), Some("ASCII text"));
}

#[test]
fn regexp_window_of_ten() {
    let tree = |bytes: &[u8]| {
        let root = RuleNode::new().with_child(
            RuleNode::new()
                .with_matcher(
                    RegexpMatcher::with_options(
                        0,
                        "abc",
                        Default::default(),
                        Default::default(),
                        10,
                        Default::default(),
                    )
                    .unwrap(),
                )
                .with_action(SetProperty::new("hit", true)),
        );
        let mut stream = MemoryCachingStream::from_bytes(bytes.to_vec());
        let mut ctx = Context::new(&mut stream);
        root.analyze(&mut ctx).unwrap();
        ctx.finish().get("hit").is_some()
    };
    assert!(!tree(&b"xxxxxxxxxx"[..]));
    assert!(tree(&b"xxxabcxxxx"[..]));
}

#[test]
fn builtin_formats() {
    let mut png = b"\x89PNG\r\n\x1a\n\0\0\0\x0dIHDR\0\0\0\x10\0\0\0\x10\x08\x06\0\0\0".to_vec();
    png.extend([0u8; 8]);

    let mut elf = vec![0x7F, b'E', b'L', b'F', 2, 1, 1, 0];
    elf.extend([0u8; 8]);
    elf.extend([3, 0, 0x3E, 0]);

    let mut odt = b"PK\x03\x04".to_vec();
    odt.extend([0u8; 26]);
    odt.extend(b"mimetypeapplication/vnd.oasis.opendocument.textPK\x03\x04\n\n");

    let mut bmp = b"BM".to_vec();
    bmp.extend([0u8; 12]);
    bmp.extend(40u32.to_le_bytes());

    let cases: Vec<(&str, Vec<u8>, &str, Option<&str>)> = vec![
        ("png", png, "image/png", Some("png")),
        ("gif87", b"GIF87a\x01\x00".to_vec(), "image/gif", Some("gif")),
        ("jpeg", b"\xFF\xD8\xFF\xE0\x00\x10JFIF\x00".to_vec(), "image/jpeg", Some("jpg")),
        ("zip", b"PK\x03\x04\x14\x00\x00\x00".to_vec(), "application/zip", Some("zip")),
        ("odt", odt, "application/vnd.oasis.opendocument.text", Some("odt")),
        ("gzip", b"\x1F\x8B\x08\x00".to_vec(), "application/gzip", Some("gz")),
        ("elf", elf, "application/x-sharedlib", Some("so")),
        ("bmp", bmp, "image/bmp", Some("bmp")),
        ("xml", b"<?xml version=\"1.0\"?>\n<doc/>\n".to_vec(), "application/xml", Some("xml")),
        (
            "svg",
            b"<?xml version=\"1.0\"?>\n<svg xmlns=\"http://www.w3.org/2000/svg\"/>".to_vec(),
            "image/svg+xml",
            Some("svg"),
        ),
        ("html", b"<!DOCTYPE html>\n<html>\n</html>\n".to_vec(), "text/html", Some("html")),
        ("binary", vec![0, 1, 2, 3, 0xFE], "application/octet-stream", Some("bin")),
    ];

    for (label, bytes, mime, extension) in cases {
        let props = builtin(&bytes);
        assert_eq!(props.mime_type(), Some(mime), "{label}");
        assert_eq!(props.extension(), extension, "{label}");
    }
}

#[test]
fn refinements_add_properties_and_description() {
    let props = builtin(b"GIF89a\x01\x00\x01\x00");
    assert_eq!(props.get_str("version"), Some("89a"));

    let props = builtin(b"\xFF\xD8\xFF\xE1\x00\x10Exif\x00\x00");
    assert_eq!(props.description(), Some("JPEG image, Exif"));

    let mut elf = vec![0x7F, b'E', b'L', b'F', 1, 2, 1, 0];
    elf.extend([0u8; 8]);
    elf.extend([0, 2]);
    let props = builtin(&elf);
    assert_eq!(props.mime_type(), Some("application/x-executable"));
    assert_eq!(props.get_str("byteOrder"), Some("big"));
    assert_eq!(props.description(), Some("ELF binary, executable"));
}

#[test]
fn descriptions_follow_locale() {
    let analyzer = Analyzer::builtin().unwrap();
    let jpeg = b"\xFF\xD8\xFF\xE0\x00\x10JFIF\x00";

    let de = AnalyzerConfig::new().with_locale(Locale::new("de_DE.UTF-8"));
    let props = analyzer.analyze_bytes(jpeg, &de).unwrap();
    assert_eq!(props.description(), Some("JPEG-Bild, JFIF"));

    let fr = AnalyzerConfig::new().with_locale(Locale::new("fr"));
    let props = analyzer.analyze_bytes(jpeg, &fr).unwrap();
    assert_eq!(props.description(), Some("JPEG image, JFIF"));
}

#[test]
fn stated_extension_disambiguates_text() {
    let analyzer = Analyzer::builtin().unwrap();
    let data = b"name,age\nalice,30\n";

    let plain = analyzer.analyze_bytes(data, &AnalyzerConfig::new()).unwrap();
    assert_eq!(plain.mime_type(), Some("text/plain"));

    let csv = AnalyzerConfig::new().with_stated_name("C:\\exports\\People.CSV");
    let props = analyzer.analyze_bytes(data, &csv).unwrap();
    assert_eq!(props.mime_type(), Some("text/csv"));
    assert_eq!(props.description(), Some("CSV text"));
}

#[test]
fn forward_only_source_is_cached() {
    struct OneByte<'a>(&'a [u8]);

    impl std::io::Read for OneByte<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match (self.0.split_first(), buf.first_mut()) {
                (Some((&b, rest)), Some(slot)) => {
                    *slot = b;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    let analyzer = Analyzer::builtin().unwrap();
    let props = analyzer
        .analyze_reader(OneByte(b"%PDF-2.0\n"), &AnalyzerConfig::new())
        .unwrap();
    assert_eq!(props.mime_type(), Some("application/pdf"));
    assert_eq!(props.get_str("pdfVersion"), Some("2.0"));
}

#[test]
fn flushed_stream_is_a_hard_error() {
    let analyzer = Analyzer::builtin().unwrap();
    let mut stream = MemoryCachingStream::from_bytes(b"%PDF-1.4\n".to_vec());
    stream.seek(4).unwrap();
    stream.flush().unwrap();
    let err = analyzer
        .analyze(&mut stream, &AnalyzerConfig::new())
        .unwrap_err();
    assert!(err.is_contract_violation());
}

#[test]
fn offsets_past_the_address_space_do_not_match() {
    let root = RuleNode::new()
        .with_child(
            RuleNode::named("far")
                .with_matcher(NumericMatcher::new(u64::MAX, Width::Byte, 0))
                .with_action(SetProperty::new("far", true)),
        )
        .with_child(RuleNode::named("near").with_action(SetProperty::new("near", true)));
    let props = Analyzer::new(root)
        .analyze_bytes(&[0, 0, 0], &AnalyzerConfig::new())
        .unwrap();
    assert!(props.get("far").is_none());
    assert!(props.get("near").is_some());
}

#[test]
fn unbounded_regexp_range_from_database() {
    let json = r#"{ "root": { "children": [{
        "matchers": [{ "type": "regexp", "offset": 0, "range": 18446744073709551615, "value": "abc" }],
        "actions": [{ "action": "mimeType", "value": "text/x-abc" }]
    }] } }"#;
    let analyzer = Analyzer::from_json(json, &MatcherRegistry::with_builtins()).unwrap();
    let config = AnalyzerConfig::new();
    let hit = analyzer.analyze_bytes(b"xxabcxx", &config).unwrap();
    assert_eq!(hit.mime_type(), Some("text/x-abc"));
    let miss = analyzer.analyze_bytes(b"xxxxxxx", &config).unwrap();
    assert_eq!(miss.mime_type(), None);
}

#[test]
fn concurrent_analyses_share_one_tree() {
    let analyzer = Analyzer::builtin().unwrap();
    let inputs = [
        &b"%PDF-1.4"[..],
        &b"GIF89a"[..],
        &b"plain words"[..],
        &b"\x1F\x8B\x08"[..],
    ];
    let expected = ["application/pdf", "image/gif", "text/plain", "application/gzip"];

    std::thread::scope(|scope| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|input| {
                let analyzer = analyzer.clone();
                scope.spawn(move || {
                    analyzer
                        .analyze_bytes(input, &AnalyzerConfig::new())
                        .unwrap()
                })
            })
            .collect();
        for (handle, mime) in handles.into_iter().zip(expected) {
            assert_eq!(handle.join().unwrap().mime_type(), Some(mime));
        }
    });
}

#[test]
fn file_analysis_releases_through_reaper() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.bin");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(b"GIF87a\x01\x00\x01\x00")
        .unwrap();

    let reaper = ResourceReaper::spawn().unwrap();
    let analyzer = Analyzer::builtin().unwrap();
    let props = analyzer
        .analyze_path(&path, reaper.clone() as Arc<dyn Reaper>, &AnalyzerConfig::new())
        .unwrap();
    assert_eq!(props.mime_type(), Some("image/gif"));
    reaper.wait_idle();
    assert_eq!(reaper.pending(), 0);
    reaper.shutdown();
}
