use regex::Regex;
use std::path::PathBuf;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/83.0.4103.61 Safari/537.36";

/// Elements dropped wholesale from a chapter page, children included.
pub const BAD_TAGS: &[&str] = &[
    "noscript",
    "script",
    "iframe",
    "form",
    "hr",
    "img",
    "ins",
    "button",
    "input",
    "amp-auto-ads",
    "pirate",
];

/// Lines like "Chapter 12" or "~ Volume 3 ~" that only label the page.
pub const BLACKLIST_PATTERNS: &[&str] = &[r"(?i)^[\W\D]*(volume|chapter)[\W\D]+\d+[\W\D]*$"];

/// Tags that survive the final pass of the book assembler, everything else is dissolved.
pub const KEPT_TAGS: &[&str] = &["p", "strong", "b", "i"];

/// An element mentioning "chapter" is kept when its text is at least this share of the page.
pub const CHAPTER_TEXT_THRESHOLD: f64 = 0.05;

pub const CHAPTERS_PER_VOLUME: usize = 100;

pub const COVER_WIDTH: u32 = 800;
pub const COVER_HEIGHT: u32 = 1220;
pub const COVER_FILE: &str = "cover.jpg";

pub const CHAPTER_STYLESHEET: &str = "ChapterStyle.css";
pub const COVER_STYLESHEET: &str = "Cover.css";
pub const COVER_TEMPLATE_FILE: &str = "cover.xhtml";

pub const LANGUAGE: &str = "en";
pub const UNKNOWN_AUTHOR: &str = "Unknown";

lazy_static! {
    pub static ref BLACKLIST: Vec<Regex> = BLACKLIST_PATTERNS
        .iter()
        .map(|pattern| Regex::new(pattern).expect("blacklist pattern is not a valid regex"))
        .collect();
}

/// Directories the pipeline reads from and writes to.
#[derive(Debug, Clone)]
pub struct Paths {
    pub novels: PathBuf,
    pub books: PathBuf,
    pub styles: PathBuf,
    pub fonts: PathBuf,
    pub templates: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Paths {
            novels: PathBuf::from("novels"),
            books: PathBuf::from("_book"),
            styles: PathBuf::from("styles"),
            fonts: PathBuf::from("fonts"),
            templates: PathBuf::from("template"),
        }
    }
}

#[test]
fn test_blacklist_matches_labels_only() {
    let is_blacklisted = |text: &str| BLACKLIST.iter().any(|re| re.is_match(text));

    assert!(is_blacklisted("Chapter 12"));
    assert!(is_blacklisted("~ Volume 3 ~"));
    assert!(is_blacklisted("CHAPTER 4: The Return"));
    assert!(!is_blacklisted("The chapter ended quietly."));
    assert!(!is_blacklisted("Chapter"));
}
