use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crate::config::CHAPTERS_PER_VOLUME;
use easy_error::{Error, ResultExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use regex::Regex;
use std::io::{Read, Write};

lazy_static! {
    static ref BASE64_SHAPE: Regex =
        Regex::new(r"^([A-Za-z0-9+/]{4})*([A-Za-z0-9+/]{3}=|[A-Za-z0-9+/]{2}==)?$").unwrap();
}

/// zlib-compresses the UTF-8 bytes of `text` and encodes the result as padded base64.
pub fn compress(text: &str) -> Result<String, Error> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).context("Could not compress text")?;
    let compressed = encoder.finish().context("Could not finish zlib stream")?;
    Ok(BASE64.encode(compressed))
}

/// Inverse of [`compress`].
pub fn decompress(data: &str) -> Result<String, Error> {
    let compressed = BASE64.decode(data).context("Body is not valid base64")?;
    let mut decoded = String::new();
    ZlibDecoder::new(&compressed[..])
        .read_to_string(&mut decoded)
        .context("Body is not a valid zlib stream of UTF-8 text")?;
    Ok(decoded)
}

/// Whether the whole string has the shape of padded base64. The empty string qualifies.
pub fn is_base64(text: &str) -> bool {
    BASE64_SHAPE.is_match(text)
}

/// Turns an arbitrary title into a name made of ASCII letters, digits and single inner hyphens.
pub fn get_valid_fs_name(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Volume directory (1-based) a chapter with the given 0-based index is stored in.
pub fn volume_for_chapter(index: usize) -> usize {
    match index {
        0 => 1,
        i => 1 + (i - 1) / CHAPTERS_PER_VOLUME,
    }
}

pub fn chapter_file_name(index: usize) -> String {
    format!("{:05}.json", index)
}

#[test]
fn test_compress_round_trip() {
    let long = "<p>long paragraph</p>".repeat(500);
    let samples = [
        "",
        "<p>Hello</p>",
        "<p>「ありがとう」と彼女は言った。</p><p>Ünïcödé — ✓</p>",
        long.as_str(),
    ];
    for sample in samples.iter() {
        let compressed = compress(sample).expect("compress failed");
        assert!(is_base64(&compressed));
        assert_eq!(*sample, decompress(&compressed).expect("decompress failed"));
    }
}

#[test]
fn test_decompress_rejects_garbage() {
    assert!(decompress("not base64 at all!").is_err());
    // Valid base64, but not a zlib stream.
    assert!(decompress("aGVsbG8gd29ybGQ=").is_err());
}

#[test]
fn test_is_base64() {
    assert!(is_base64("aGVsbG8gd29ybGQ="));
    assert!(is_base64("YWJjZA=="));
    assert!(is_base64(""));
    assert!(!is_base64("<p>Hello there</p>"));
    assert!(!is_base64("abc"));
}

#[test]
fn test_valid_fs_name() {
    assert_eq!("The-Villainess-Is-a-Marionette", get_valid_fs_name("The Villainess Is a Marionette"));
    assert_eq!("Re-Zero-Vol-2", get_valid_fs_name("  Re:Zero -- Vol. 2!  "));
    assert_eq!("a-b", get_valid_fs_name("a_b"));
    assert_eq!("", get_valid_fs_name("--- ???"));
    assert_eq!("Caf", get_valid_fs_name("Café"));
}

#[test]
fn test_valid_fs_name_shape() {
    let inputs = [
        "-leading",
        "trailing-",
        "a--b---c",
        "[brackets]^and`backticks`",
        "tabs\tand\nnewlines",
        "日本語のタイトル",
        "mixed 日本 title - 2",
        "",
        "-",
    ];
    for input in inputs.iter() {
        let name = get_valid_fs_name(input);
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'), "{name:?}");
        assert!(!name.starts_with('-'), "{name:?}");
        assert!(!name.ends_with('-'), "{name:?}");
        assert!(!name.contains("--"), "{name:?}");
    }
}

#[test]
fn test_volume_for_chapter() {
    assert_eq!(1, volume_for_chapter(0));
    assert_eq!(1, volume_for_chapter(1));
    assert_eq!(1, volume_for_chapter(100));
    assert_eq!(2, volume_for_chapter(101));
    assert_eq!(2, volume_for_chapter(149));
    assert_eq!(3, volume_for_chapter(201));
}

#[test]
fn test_chapter_file_name() {
    assert_eq!("00000.json", chapter_file_name(0));
    assert_eq!("00042.json", chapter_file_name(42));
}
