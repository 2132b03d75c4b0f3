use crate::config::{
    Paths, CHAPTER_STYLESHEET, CHAPTER_TEXT_THRESHOLD, COVER_FILE, COVER_STYLESHEET, COVER_TEMPLATE_FILE,
    KEPT_TAGS, LANGUAGE, UNKNOWN_AUTHOR,
};
use crate::dom_manipulation::{DomOperation, MutableDom};
use crate::downloader::ChapterRecord;
use crate::site::NovelInfo;
use crate::util::{decompress, get_valid_fs_name, is_base64};
use crate::xml_utils::XmlSerializable;
use easy_error::{err_msg, Error, ResultExt};
use ego_tree::NodeId;
use epub_builder::{EpubBuilder, EpubContent, EpubVersion, ReferenceType, ZipLibrary};
use regex::Regex;
use scraper::{ElementRef, Html, Node};
use std::fmt::Display;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

lazy_static! {
    static ref LINE_BREAK_REGEX: Regex = Regex::new(r"(?i)<\s*/?\s*br\s*/?\s*>").unwrap();
    static ref CHAPTER_WORD_REGEX: Regex = Regex::new(r"(?i)chapter").unwrap();
}

const DEFAULT_COVER_TEMPLATE: &str = "<?xml version='1.0' encoding='utf-8' ?>
<html xmlns='http://www.w3.org/1999/xhtml'>
<head>
<title>{title}</title>
{stylesheets}
</head>
<body>
<div id='cover-image'><img src='{cover}' alt='{title}' /></div>
</body>
</html>";

/// A file shipped inside the EPUB as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub path: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverPage {
    pub image: Vec<u8>,
    pub page: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookChapter {
    pub file_name: String,
    pub title: String,
    /// Cleaned XHTML body, `None` for chapters that could not be read.
    pub body: Option<String>,
}

impl BookChapter {
    fn placeholder(position: usize) -> Self {
        BookChapter {
            file_name: format!("missing_{:04}.xhtml", position),
            title: String::new(),
            body: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.body.is_none()
    }
}

/// In-memory model of one volume, serialized by `epub-builder`.
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub identifier: String,
    pub title: String,
    pub author: String,
    pub language: &'static str,
    pub cover: Option<CoverPage>,
    pub styles: Vec<Resource>,
    pub fonts: Vec<Resource>,
    pub chapters: Vec<BookChapter>,
}

fn epub_context<E: Display>(message: &'static str) -> impl FnOnce(E) -> Error {
    move |e| err_msg(format!("{message}: {e}"))
}

impl Book {
    fn has_style(&self, file_name: &str) -> bool {
        self.styles.iter().any(|style| style.path == style_path(file_name))
    }

    fn chapter_xhtml(&self, chapter: &BookChapter) -> String {
        let escaped_title = html_escape::encode_text(&chapter.title);
        let stylesheet = if self.has_style(CHAPTER_STYLESHEET) {
            stylesheet_link(CHAPTER_STYLESHEET)
        } else {
            String::new()
        };
        "<?xml version='1.0' encoding='utf-8' ?><html xmlns='http://www.w3.org/1999/xhtml'><head><title>".to_string()
            + &escaped_title
            + "</title><meta http-equiv='Content-Type' content='text/html; charset=utf-8' />\n"
            + &stylesheet
            + "</head><body>"
            + chapter.body.as_deref().unwrap_or("")
            + "</body></html>"
    }

    /// Writes the book as an EPUB 3 container.
    /// The spine is cover, navigation, then chapters; the TOC lists every titled chapter.
    pub fn write_epub<W: Write>(&self, mut to: W) -> Result<(), Error> {
        let zip = ZipLibrary::new().map_err(epub_context("Could not create ZipLibrary"))?;
        let mut builder = EpubBuilder::new(zip).map_err(epub_context("Could not create EpubBuilder"))?;

        builder.epub_version(EpubVersion::V30);
        builder.set_uuid(Uuid::new_v5(&Uuid::NAMESPACE_URL, self.identifier.as_bytes()));
        builder
            .metadata("author", self.author.as_str())
            .map_err(epub_context("Could not set author metadata"))?;
        builder
            .metadata("title", self.title.as_str())
            .map_err(epub_context("Could not set title metadata"))?;
        builder
            .metadata("lang", self.language)
            .map_err(epub_context("Could not set language metadata"))?;

        if let Some(cover) = &self.cover {
            builder
                .add_cover_image(COVER_FILE, &cover.image[..], "image/jpeg")
                .map_err(epub_context("Could not add cover image"))?;
            builder
                .add_content(EpubContent::new("cover.xhtml", cover.page.as_bytes()).reftype(ReferenceType::Cover))
                .map_err(epub_context("Could not add cover page"))?;
        }
        builder.inline_toc();

        for style in &self.styles {
            builder
                .add_resource(&style.path, &style.content[..], "text/css")
                .map_err(epub_context("Could not add stylesheet"))?;
        }
        for font in &self.fonts {
            builder
                .add_resource(&font.path, &font.content[..], "application/font-sfnt")
                .map_err(epub_context("Could not add font"))?;
        }

        for chapter in &self.chapters {
            let xhtml = self.chapter_xhtml(chapter);
            let mut content = EpubContent::new(chapter.file_name.as_str(), xhtml.as_bytes()).reftype(ReferenceType::Text);
            if !chapter.title.is_empty() {
                content = content.title(chapter.title.as_str());
            }
            builder.add_content(content).map_err(epub_context("Could not add chapter"))?;
        }

        builder.generate(&mut to).map_err(epub_context("Could not generate ebook"))?;
        Ok(())
    }
}

fn style_path(file_name: &str) -> String {
    format!("style/{file_name}")
}

fn stylesheet_link(file_name: &str) -> String {
    format!("<link rel='stylesheet' type='text/css' href='{}' />\n", style_path(file_name))
}

/// Turns scraped chapter HTML into the body of a chapter page.
///
/// Line breaks become paragraph boundaries, short elements mentioning "chapter" are dropped
/// and every tag but `p`, `strong`, `b` and `i` is dissolved into its children.
pub fn clean_body(content: &str, chapter_title: &str) -> String {
    let lines: Vec<&str> = LINE_BREAK_REGEX
        .split(content)
        .filter(|line| !line.trim().is_empty())
        .collect();
    let mut doc = Html::parse_fragment(&lines.join("</p><p>"));

    remove_chapter_labels(&mut doc);
    dissolve_markup(&mut doc);

    format!(
        "<h4>{}</h4><hr/><div id=\"content\">{}</div>",
        html_escape::encode_text(chapter_title),
        doc.root_element().inner_xml()
    )
}

fn text_len(elem: ElementRef) -> usize {
    elem.text().map(|text| text.chars().count()).sum()
}

/// Removes the parent of every text mentioning "chapter", unless that parent holds at least
/// `CHAPTER_TEXT_THRESHOLD` of the document's text.
fn remove_chapter_labels(doc: &mut Html) {
    let document_id = doc.tree.root().id();
    let text_ids: Vec<NodeId> = doc
        .tree
        .root()
        .descendants()
        .filter(|node| match node.value() {
            Node::Text(text) => CHAPTER_WORD_REGEX.is_match(&**text),
            _ => false,
        })
        .map(|node| node.id())
        .collect();

    for text_id in text_ids {
        let parent_id = match doc.tree.get(text_id) {
            // Texts inside an already removed element are gone with it.
            Some(node) if node.ancestors().any(|ancestor| ancestor.id() == document_id) => {
                match node.parent().and_then(ElementRef::wrap) {
                    Some(parent) => {
                        let total = text_len(doc.root_element());
                        if text_len(parent) as f64 >= CHAPTER_TEXT_THRESHOLD * total as f64 {
                            continue;
                        }
                        parent.id()
                    }
                    None => continue,
                }
            }
            _ => continue,
        };
        doc.perform_operation(DomOperation::RemoveNode { node_id: parent_id });
    }
}

fn dissolve_markup(doc: &mut Html) {
    let ops: Vec<_> = doc
        .root_element()
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(|elem| !KEPT_TAGS.contains(&elem.value().name()) || elem.text().all(str::is_empty))
        .map(|elem| DomOperation::DissolveElement { node_id: elem.id() })
        .collect();
    doc.perform_operations(ops);
}

/// Builds the EPUB of one volume directory.
pub struct BookCreator<'a> {
    novel_id: &'a str,
    novel_name: &'a str,
    volume_no: &'a str,
    input_path: &'a Path,
    author: &'a str,
    paths: &'a Paths,
}

impl<'a> BookCreator<'a> {
    pub fn new(
        novel_id: &'a str,
        novel_name: &'a str,
        volume_no: &'a str,
        input_path: &'a Path,
        author: &'a str,
        paths: &'a Paths,
    ) -> Self {
        BookCreator {
            novel_id,
            novel_name,
            volume_no,
            input_path,
            author,
            paths,
        }
    }

    /// Builds the volume and writes it, returning the path of the EPUB.
    pub fn start(&self) -> Result<PathBuf, Error> {
        info!("Building {} - V {}", self.novel_id, self.volume_no);
        let book = self.build()?;
        self.save(&book)
    }

    pub fn build(&self) -> Result<Book, Error> {
        let mut book = Book {
            identifier: format!("{}{}", self.novel_id, self.volume_no),
            title: format!("{} Vol. {:0>2}", self.novel_name, self.volume_no),
            author: self.author.to_string(),
            language: LANGUAGE,
            cover: None,
            styles: Vec::new(),
            fonts: Vec::new(),
            chapters: Vec::new(),
        };
        book.styles = self.add_styles()?;
        book.fonts = self.add_fonts()?;
        book.cover = self.add_cover(book.has_style(COVER_STYLESHEET))?;
        book.chapters = self.create_book()?;

        let missing = book.chapters.iter().filter(|chapter| chapter.is_placeholder()).count();
        if missing > 0 {
            warn!("{missing} of {} chapters in volume {} are placeholders", book.chapters.len(), self.volume_no);
        }
        Ok(book)
    }

    fn add_cover(&self, link_stylesheet: bool) -> Result<Option<CoverPage>, Error> {
        let cover_path = match self.input_path.parent() {
            Some(novel_dir) => novel_dir.join(COVER_FILE),
            None => return Ok(None),
        };
        if !cover_path.is_file() {
            return Ok(None);
        }
        debug!("Set cover {cover_path:?}");

        let template_path = self.paths.templates.join(COVER_TEMPLATE_FILE);
        let template = if template_path.is_file() {
            fs::read_to_string(&template_path)
                .context(format!("Could not read cover template {template_path:?}"))?
                .replace('\r', "")
        } else {
            DEFAULT_COVER_TEMPLATE.to_string()
        };
        let stylesheets = if link_stylesheet {
            stylesheet_link(COVER_STYLESHEET)
        } else {
            String::new()
        };
        let page = template
            .replace("{title}", &html_escape::encode_text(self.novel_name))
            .replace("{cover}", COVER_FILE)
            .replace("{stylesheets}", &stylesheets);

        let image = fs::read(&cover_path).context(format!("Could not read cover {cover_path:?}"))?;
        Ok(Some(CoverPage { image, page }))
    }

    fn add_styles(&self) -> Result<Vec<Resource>, Error> {
        debug!("Adding styles");
        Ok(read_resources(&self.paths.styles)?
            .into_iter()
            .map(|(name, content)| Resource {
                path: style_path(&name),
                content,
            })
            .collect())
    }

    fn add_fonts(&self) -> Result<Vec<Resource>, Error> {
        debug!("Adding fonts");
        Ok(read_resources(&self.paths.fonts)?
            .into_iter()
            .map(|(name, content)| Resource {
                path: format!("fonts/{name}"),
                content,
            })
            .collect())
    }

    fn create_book(&self) -> Result<Vec<BookChapter>, Error> {
        debug!("Building: {:?}", self.input_path);
        Ok(sorted_files(self.input_path)?
            .iter()
            .enumerate()
            .map(|(position, chapter_file)| self.create_chapter(position, chapter_file))
            .collect())
    }

    /// Reads one chapter record. Any problem with the record yields an empty placeholder.
    fn create_chapter(&self, position: usize, chapter_file: &Path) -> BookChapter {
        let json = match fs::read_to_string(chapter_file) {
            Ok(json) => json,
            Err(e) => {
                error!("file:{chapter_file:?} msg:{e}");
                return BookChapter::placeholder(position);
            }
        };
        let item: ChapterRecord = match serde_json::from_str(&json) {
            Ok(item) => item,
            Err(e) => {
                error!("file:{chapter_file:?} msg:{e}");
                return BookChapter::placeholder(position);
            }
        };
        if item.body.is_empty() {
            error!("body is empty (file: {chapter_file:?})");
            return BookChapter::placeholder(position);
        }
        let decompressed = match decompress(&item.body) {
            Ok(decompressed) => decompressed,
            Err(e) => {
                error!("file:{chapter_file:?} msg:{e}");
                return BookChapter::placeholder(position);
            }
        };
        if is_base64(&decompressed) {
            // Points at a body that was encoded twice when it was stored.
            error!("still base64 encoded body after decompressing? (file: {chapter_file:?})");
            return BookChapter::placeholder(position);
        }

        BookChapter {
            file_name: format!("chap_{:04}.xhtml", item.chapter_no),
            body: Some(clean_body(&decompressed, &item.chapter_title)),
            title: item.chapter_title,
        }
    }

    pub fn save(&self, book: &Book) -> Result<PathBuf, Error> {
        let mut name = get_valid_fs_name(self.novel_name);
        if name.is_empty() {
            name = get_valid_fs_name(self.novel_id);
        }
        let output_path = self.paths.books.join(&name);
        fs::create_dir_all(&output_path).context(format!("Could not create directory {output_path:?}"))?;

        let file_name = format!("{}_v{:0>2}.epub", name.replace('-', "_"), self.volume_no);
        let file_path = output_path.join(file_name);
        info!("Creating: {file_path:?}");
        let file = File::create(&file_path).context(format!("Could not open file {file_path:?}"))?;
        book.write_epub(file)?;
        Ok(file_path)
    }
}

/// Regular files of `dir`, sorted by name.
fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).context(format!("Could not list {dir:?}"))? {
        let path = entry.context(format!("Could not list {dir:?}"))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// `(file name, contents)` of every file in `dir`. A missing directory holds nothing.
fn read_resources(dir: &Path) -> Result<Vec<(String, Vec<u8>)>, Error> {
    if !dir.is_dir() {
        warn!("{dir:?} does not exist, nothing to add from it");
        return Ok(Vec::new());
    }
    let mut resources = Vec::new();
    for path in sorted_files(dir)? {
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => continue,
        };
        let content = fs::read(&path).context(format!("Could not read {path:?}"))?;
        debug!("Adding {name}");
        resources.push((name, content));
    }
    Ok(resources)
}

/// Volume directories of a novel as `(label, path)`, in numeric order.
fn volume_dirs(novel_dir: &Path) -> Result<Vec<(String, PathBuf)>, Error> {
    let mut volumes = Vec::new();
    for entry in fs::read_dir(novel_dir).context(format!("Could not list {novel_dir:?}"))? {
        let path = entry.context(format!("Could not list {novel_dir:?}"))?.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(label) = path.file_name().map(|name| name.to_string_lossy().to_string()) {
            volumes.push((label, path));
        }
    }
    volumes.sort_by_key(|(label, _)| (label.parse::<usize>().unwrap_or(usize::MAX), label.clone()));
    Ok(volumes)
}

/// Builds one EPUB per volume directory of the novel.
pub fn assemble_volumes(novel: &NovelInfo, novel_dir: &Path, paths: &Paths) -> Result<Vec<PathBuf>, Error> {
    let title = novel.title.as_deref().unwrap_or(&novel.id);
    let author = novel.author.as_deref().unwrap_or(UNKNOWN_AUTHOR);

    let mut books = Vec::new();
    for (label, volume_dir) in volume_dirs(novel_dir)? {
        let creator = BookCreator::new(&novel.id, title, &label, &volume_dir, author, paths);
        books.push(creator.start()?);
    }
    Ok(books)
}

#[cfg(test)]
use crate::downloader::save_chapter;
#[cfg(test)]
use crate::util::compress;

#[cfg(test)]
fn read_epub_entry(epub: &Path, name: &str) -> String {
    use std::io::Read;

    let mut archive = zip::ZipArchive::new(File::open(epub).unwrap()).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut contents = String::new();
    entry.read_to_string(&mut contents).unwrap();
    contents
}

#[cfg(test)]
fn assert_in_order(haystack: &str, needles: &[&str]) {
    let mut from = 0;
    for needle in needles {
        match haystack[from..].find(needle) {
            Some(pos) => from += pos + needle.len(),
            None => panic!("{:?} missing or out of order in {}", needle, haystack),
        }
    }
}

#[cfg(test)]
fn test_paths(root: &Path) -> Paths {
    Paths {
        novels: root.join("novels"),
        books: root.join("_book"),
        styles: root.join("styles"),
        fonts: root.join("fonts"),
        templates: root.join("template"),
    }
}

#[cfg(test)]
fn novel(chapter_count: usize) -> NovelInfo {
    NovelInfo {
        id: "the-lazy-prince".to_string(),
        title: Some("The Lazy Prince".to_string()),
        author: Some("Kim Seo-yeon".to_string()),
        cover_url: None,
        chapters: (0..chapter_count)
            .map(|i| crate::site::ChapterLink {
                title: format!("Chapter {}", i + 1),
                url: format!("https://kobatochan.com/the-lazy-prince-chapter-{}/", i + 1),
            })
            .collect(),
    }
}

#[test]
fn test_clean_body_collapses_consecutive_breaks() {
    let body = clean_body("<p>First line<br><br/>Second line</p>", "Opening");

    assert_eq!(
        Html::parse_fragment("<h4>Opening</h4><hr/><div id=\"content\"><p>First line</p><p>Second line</p></div>"),
        Html::parse_fragment(&body),
    );
}

#[test]
fn test_clean_body_dissolves_unwanted_tags() {
    let body = clean_body(
        "<p><span class='x'>Hi <i>there</i></span></p><div><p>Next <em>one</em></p></div><p><b></b></p>",
        "Opening",
    );

    assert_eq!(
        Html::parse_fragment("<h4>Opening</h4><hr/><div id=\"content\"><p>Hi <i>there</i></p><p>Next one</p></div>"),
        Html::parse_fragment(&body),
    );
}

#[test]
fn test_short_chapter_label_is_removed() {
    let prose = "The wind carried the smell of rain across the empty square. ".repeat(10);
    let body = clean_body(&format!("<p>Chapter 5</p><p>{prose}</p>"), "Opening");

    assert!(!body.contains("Chapter 5"), "{body}");
    assert!(body.contains("The wind carried"), "{body}");
}

#[test]
fn test_long_chapter_label_is_kept() {
    let body = clean_body("<p>Chapter 5</p><p>It rained all day.</p>", "Opening");

    assert!(body.contains("Chapter 5"), "{body}");
    assert!(body.contains("It rained all day."), "{body}");
}

#[test]
fn test_title_is_escaped() {
    let body = clean_body("<p>Text</p>", "Tom & Jerry <3");
    assert!(body.starts_with("<h4>Tom &amp; Jerry &lt;3</h4><hr/>"), "{body}");
}

#[test]
fn test_broken_records_become_placeholders() {
    let root = tempfile::tempdir().unwrap();
    let paths = test_paths(root.path());
    let volume_dir = paths.novels.join("the-lazy-prince").join("1");
    fs::create_dir_all(&volume_dir).unwrap();

    let write = |name: &str, record: &ChapterRecord| {
        fs::write(volume_dir.join(name), serde_json::to_string(record).unwrap()).unwrap();
    };
    write(
        "00000.json",
        &ChapterRecord {
            body: compress("<p>Real text</p>").unwrap(),
            chapter_no: 0,
            chapter_title: "Chapter 1".to_string(),
        },
    );
    write(
        "00001.json",
        &ChapterRecord {
            body: String::new(),
            chapter_no: 1,
            chapter_title: "Chapter 2".to_string(),
        },
    );
    write(
        "00002.json",
        &ChapterRecord {
            body: compress(&compress("<p>Twice</p>").unwrap()).unwrap(),
            chapter_no: 2,
            chapter_title: "Chapter 3".to_string(),
        },
    );
    write(
        "00003.json",
        &ChapterRecord {
            body: "!!not base64!!".to_string(),
            chapter_no: 3,
            chapter_title: "Chapter 4".to_string(),
        },
    );

    let creator = BookCreator::new("the-lazy-prince", "The Lazy Prince", "1", &volume_dir, "Kim", &paths);
    let book = creator.build().unwrap();

    let placeholders: Vec<bool> = book.chapters.iter().map(BookChapter::is_placeholder).collect();
    assert_eq!(vec![false, true, true, true], placeholders);
    assert_eq!("chap_0000.xhtml", book.chapters[0].file_name);
    assert!(book.chapters[0].body.as_deref().unwrap().contains("Real text"));
}

#[test]
fn test_malformed_json_keeps_the_rest_of_the_volume() {
    let root = tempfile::tempdir().unwrap();
    let paths = test_paths(root.path());
    let novel_dir = paths.novels.join("the-lazy-prince");
    for i in 0..10 {
        save_chapter(&novel_dir, i, &format!("Chapter {}", i + 1), &format!("<p>Content {i}</p>")).unwrap();
    }
    let volume_dir = novel_dir.join("1");
    fs::write(volume_dir.join("00003.json"), "{\"body\": \"abc\", \"chapter_no\": 3").unwrap();

    let creator = BookCreator::new("the-lazy-prince", "The Lazy Prince", "1", &volume_dir, "Kim", &paths);
    let book = creator.build().unwrap();

    assert_eq!(10, book.chapters.len());
    for (i, chapter) in book.chapters.iter().enumerate() {
        if i == 3 {
            assert!(chapter.is_placeholder());
            assert_eq!("", chapter.title);
        } else {
            assert!(!chapter.is_placeholder(), "chapter {i}");
            assert_eq!(format!("Chapter {}", i + 1), chapter.title);
            assert!(chapter.body.as_deref().unwrap().contains(&format!("Content {i}")));
        }
    }

    let epub = creator.save(&book).unwrap();
    assert!(epub.is_file());
}

#[test]
fn test_cover_styles_and_fonts() {
    let root = tempfile::tempdir().unwrap();
    let paths = test_paths(root.path());
    let novel_dir = paths.novels.join("the-lazy-prince");
    save_chapter(&novel_dir, 0, "Chapter 1", "<p>Text</p>").unwrap();
    fs::write(novel_dir.join(COVER_FILE), b"not really a jpeg").unwrap();
    fs::create_dir_all(&paths.styles).unwrap();
    fs::write(paths.styles.join(CHAPTER_STYLESHEET), "p { text-indent: 1em; }").unwrap();
    fs::write(paths.styles.join(COVER_STYLESHEET), "img { width: 100%; }").unwrap();
    fs::create_dir_all(&paths.fonts).unwrap();
    fs::write(paths.fonts.join("Serif.ttf"), b"font").unwrap();
    fs::create_dir_all(&paths.templates).unwrap();
    fs::write(
        paths.templates.join(COVER_TEMPLATE_FILE),
        "<html>\r\n<head>{stylesheets}</head><body><img src='{cover}' alt='{title}'/></body></html>",
    )
    .unwrap();

    let volume_dir = novel_dir.join("1");
    let book = BookCreator::new("the-lazy-prince", "The Lazy Prince", "1", &volume_dir, "Kim", &paths)
        .build()
        .unwrap();

    let cover = book.cover.as_ref().expect("cover not added");
    assert_eq!(b"not really a jpeg".to_vec(), cover.image);
    assert!(!cover.page.contains('\r'));
    assert!(cover.page.contains("src='cover.jpg' alt='The Lazy Prince'"), "{}", cover.page);
    assert!(cover.page.contains("href='style/Cover.css'"), "{}", cover.page);

    let style_paths: Vec<&str> = book.styles.iter().map(|style| style.path.as_str()).collect();
    assert_eq!(vec!["style/ChapterStyle.css", "style/Cover.css"], style_paths);
    assert_eq!("fonts/Serif.ttf", book.fonts[0].path);
    assert!(book.chapter_xhtml(&book.chapters[0]).contains("href='style/ChapterStyle.css'"));
}

#[test]
fn test_volume_without_cover_or_assets() {
    let root = tempfile::tempdir().unwrap();
    let paths = test_paths(root.path());
    let novel_dir = paths.novels.join("the-lazy-prince");
    save_chapter(&novel_dir, 0, "Chapter 1", "<p>Text</p>").unwrap();

    let volume_dir = novel_dir.join("1");
    let book = BookCreator::new("the-lazy-prince", "The Lazy Prince", "1", &volume_dir, "Kim", &paths)
        .build()
        .unwrap();

    assert_eq!(None, book.cover);
    assert!(book.styles.is_empty());
    assert!(book.fonts.is_empty());
    assert_eq!("the-lazy-prince1", book.identifier);
    assert_eq!("en", book.language);
}

#[test]
fn test_one_epub_per_hundred_chapters() {
    let root = tempfile::tempdir().unwrap();
    let paths = test_paths(root.path());
    let novel = novel(150);
    let novel_dir = paths.novels.join(&novel.id);
    for (i, link) in novel.chapters.iter().enumerate() {
        save_chapter(&novel_dir, i, &link.title, &format!("<p>Body of {}</p>", link.title)).unwrap();
    }

    let volumes = volume_dirs(&novel_dir).unwrap();
    let labels: Vec<&str> = volumes.iter().map(|(label, _)| label.as_str()).collect();
    assert_eq!(vec!["1", "2"], labels);

    let books = assemble_volumes(&novel, &novel_dir, &paths).unwrap();

    let book_dir = paths.books.join("The-Lazy-Prince");
    assert_eq!(
        vec![book_dir.join("The_Lazy_Prince_v01.epub"), book_dir.join("The_Lazy_Prince_v02.epub")],
        books
    );
    for (book, volume) in books.iter().zip(["01", "02"].iter()) {
        let opf = read_epub_entry(book, "OEBPS/content.opf");
        assert!(opf.contains(&format!("The Lazy Prince Vol. {}</dc:title>", volume)), "{}", opf);
    }

    let titles: Vec<String> = volumes
        .iter()
        .map(|(label, dir)| {
            BookCreator::new(&novel.id, "The Lazy Prince", label, dir, "Kim Seo-yeon", &paths)
                .build()
                .unwrap()
                .title
        })
        .collect();
    assert_eq!(vec!["The Lazy Prince Vol. 01", "The Lazy Prince Vol. 02"], titles);
}

#[test]
fn test_epub_spine_and_toc() {
    let root = tempfile::tempdir().unwrap();
    let paths = test_paths(root.path());
    let novel_dir = paths.novels.join("the-lazy-prince");
    save_chapter(&novel_dir, 0, "Tom & Jerry", "<p>A chase.</p>").unwrap();
    save_chapter(&novel_dir, 1, "The Road", "<p>A walk.</p>").unwrap();
    save_chapter(&novel_dir, 2, "Lost", "<p>Gone.</p>").unwrap();
    save_chapter(&novel_dir, 3, "Home", "<p>The end.</p>").unwrap();
    let volume_dir = novel_dir.join("1");
    fs::write(volume_dir.join("00002.json"), "{").unwrap();
    fs::write(novel_dir.join(COVER_FILE), b"not really a jpeg").unwrap();

    let epub = BookCreator::new("the-lazy-prince", "The Lazy Prince", "1", &volume_dir, "Kim", &paths)
        .start()
        .unwrap();

    let opf = read_epub_entry(&epub, "OEBPS/content.opf");
    assert!(opf.contains("The Lazy Prince Vol. 01</dc:title>"), "{}", opf);
    let spine_start = opf.find("<spine").unwrap();
    let spine = &opf[spine_start..opf.find("</spine>").unwrap()];
    let spine = &spine[spine.find('>').unwrap()..];
    assert_in_order(spine, &["cover", "toc", "chap_0000", "chap_0001", "missing_0002", "chap_0003"]);

    let nav = read_epub_entry(&epub, "OEBPS/nav.xhtml");
    assert_in_order(&nav, &["Tom &amp; Jerry", "The Road", "Home"]);
    assert!(!nav.contains('﹠'), "{}", nav);
    assert!(!nav.contains("Lost"), "{}", nav);

    let ncx = read_epub_entry(&epub, "OEBPS/toc.ncx");
    assert_in_order(&ncx, &["Tom &amp; Jerry", "The Road", "Home"]);
}
