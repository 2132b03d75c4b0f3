use crate::config::{BAD_TAGS, BLACKLIST};
use crate::dom_manipulation::{DomOperation, MutableDom};
use ego_tree::NodeId;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

/// Everything scraped from a novel's landing page.
#[derive(Debug, Clone, PartialEq)]
pub struct NovelInfo {
    pub id: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub cover_url: Option<String>,
    pub chapters: Vec<ChapterLink>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChapterLink {
    pub title: String,
    pub url: String,
}

/// The only place that knows how a particular site lays out its pages.
pub trait Site {
    /// Extracts the novel identifier from a landing page URL, or `None` for unsupported URLs.
    fn novel_id(&self, url: &str) -> Option<String>;

    fn parse_novel(&self, id: &str, page: &str) -> NovelInfo;

    /// Cleaned chapter HTML, or `None` when the page has no chapter content.
    fn chapter_body(&self, page: &str) -> Option<String>;
}

lazy_static! {
    static ref NOVEL_URL_REGEX: Regex = Regex::new(
        r"^https://kobatochan\.com/(?:korean-novels|japanese-novels|chinese-novels|original-works)/(.+?)/$",
    ).unwrap();
    static ref AUTHOR_REGEX: Regex = Regex::new(r"Author:\s(.+?)").unwrap();
}

lazy_static! {
    static ref TITLE_SELECTOR: Selector = Selector::parse("h1.entry-title > a").unwrap();
    static ref AUTHOR_SELECTOR: Selector = Selector::parse("strong, b").unwrap();
    static ref COVER_SELECTOR: Selector = Selector::parse("div.entry-content > p > img").unwrap();
    static ref CHAPTER_LINK_SELECTOR: Selector = Selector::parse("div.entry-content > p > a").unwrap();
    static ref CONTENT_SELECTOR: Selector = Selector::parse("div.entry-content").unwrap();
    static ref PARAGRAPH_SELECTOR: Selector = Selector::parse("p").unwrap();
}

/// kobatochan.com, a WordPress site hosting translated novels.
pub struct Kobatochan;

impl Site for Kobatochan {
    fn novel_id(&self, url: &str) -> Option<String> {
        NOVEL_URL_REGEX
            .captures(url)
            .and_then(|captures| captures.get(1))
            .map(|id| id.as_str().to_string())
    }

    fn parse_novel(&self, id: &str, page: &str) -> NovelInfo {
        let doc = Html::parse_document(page);

        let title = doc
            .select(&TITLE_SELECTOR)
            .next()
            .map(|elem| elem.text().collect::<String>());

        let author = doc
            .select(&AUTHOR_SELECTOR)
            .map(|elem| elem.text().collect::<String>())
            .find(|text| AUTHOR_REGEX.is_match(text))
            .map(|text| text.replace("Author: ", ""));

        let cover_url = doc
            .select(&COVER_SELECTOR)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(str::to_string);

        let chapters = doc
            .select(&CHAPTER_LINK_SELECTOR)
            .filter_map(|link| {
                link.value().attr("href").map(|href| ChapterLink {
                    title: link.text().collect(),
                    url: href.to_string(),
                })
            })
            .collect();

        NovelInfo {
            id: id.to_string(),
            title,
            author,
            cover_url,
            chapters,
        }
    }

    fn chapter_body(&self, page: &str) -> Option<String> {
        let mut doc = Html::parse_document(page);
        let container_id = doc.select(&CONTENT_SELECTOR).next()?.id();

        clean_contents(&mut doc, container_id);

        let container = ElementRef::wrap(doc.tree.get(container_id)?)?;
        let paragraphs: Vec<String> = container
            .select(&PARAGRAPH_SELECTOR)
            .filter(|p| p.text().collect::<String>() != "/")
            .map(|p| p.inner_html())
            .collect();

        Some(format!("<p>{}</p>", paragraphs.join("</p><p>")))
    }
}

fn is_blacklisted(text: &str) -> bool {
    text.trim().is_empty() || BLACKLIST.iter().any(|pattern| pattern.is_match(text))
}

fn is_br(node: Option<ego_tree::NodeRef<Node>>) -> bool {
    match node.map(|node| node.value()) {
        Some(Node::Element(elem)) => elem.name() == "br",
        _ => false,
    }
}

/// Strips everything that is not chapter prose from the element `container`.
///
/// Decisions are taken in document order on the untouched tree and applied afterwards.
/// Since an element is always visited before its descendants, this gives the same result
/// as removing elements while walking.
pub(crate) fn clean_contents(doc: &mut Html, container: NodeId) {
    let mut ops = vec![DomOperation::ClearAttributes { node_id: container }];

    if let Some(root) = doc.tree.get(container) {
        for node in root.descendants().skip(1) {
            let elem = match node.value() {
                Node::Comment(_) => {
                    ops.push(DomOperation::RemoveNode { node_id: node.id() });
                    continue;
                }
                Node::Element(elem) => elem,
                _ => continue,
            };

            let name = elem.name();
            let keep = if name == "br" {
                // A run of line breaks collapses into its last one.
                !is_br(node.next_sibling())
            } else if BAD_TAGS.contains(&name) {
                false
            } else {
                let text = ElementRef::wrap(node)
                    .map(|elem| elem.text().collect::<String>())
                    .unwrap_or_default();
                !is_blacklisted(&text)
            };

            ops.push(if keep {
                DomOperation::ClearAttributes { node_id: node.id() }
            } else {
                DomOperation::RemoveNode { node_id: node.id() }
            });
        }
    }

    doc.perform_operations(ops);
}

#[cfg(test)]
const LANDING_PAGE: &str = r#"<html><body>
<h1 class="entry-title"><a href="https://kobatochan.com/korean-novels/the-lazy-prince/">The Lazy Prince</a></h1>
<div class="entry-content">
  <p><img src="https://kobatochan.com/wp-content/uploads/lazy-prince.jpg" alt="cover"></p>
  <p><b>Genre:</b> Fantasy</p>
  <p><strong>Author: Kim Seo-yeon</strong></p>
  <p><a href="https://kobatochan.com/the-lazy-prince-chapter-1/">Chapter 1</a></p>
  <p><a href="https://kobatochan.com/the-lazy-prince-chapter-2/">Chapter 2</a></p>
  <p><a>Chapter 3 (coming soon)</a></p>
</div>
</body></html>"#;

#[test]
fn test_novel_id_for_known_categories() {
    let site = Kobatochan;
    for category in ["korean-novels", "japanese-novels", "chinese-novels", "original-works"].iter() {
        let url = format!("https://kobatochan.com/{category}/the-lazy-prince/");
        assert_eq!(Some("the-lazy-prince".to_string()), site.novel_id(&url));
    }
}

#[test]
fn test_novel_id_rejects_other_urls() {
    let site = Kobatochan;
    let rejected = [
        "https://kobatochan.com/korean-novels/the-lazy-prince",
        "http://kobatochan.com/korean-novels/the-lazy-prince/",
        "https://kobatochan.com/thai-novels/the-lazy-prince/",
        "https://example.com/korean-novels/the-lazy-prince/",
        "https://kobatochan.com/korean-novels//",
        "the-lazy-prince",
    ];
    for url in rejected.iter() {
        assert_eq!(None, site.novel_id(url), "{url}");
    }
}

#[test]
fn test_parse_novel() {
    let info = Kobatochan.parse_novel("the-lazy-prince", LANDING_PAGE);

    assert_eq!("the-lazy-prince", info.id);
    assert_eq!(Some("The Lazy Prince".to_string()), info.title);
    assert_eq!(Some("Kim Seo-yeon".to_string()), info.author);
    assert_eq!(
        Some("https://kobatochan.com/wp-content/uploads/lazy-prince.jpg".to_string()),
        info.cover_url
    );
    assert_eq!(
        vec![
            ChapterLink {
                title: "Chapter 1".to_string(),
                url: "https://kobatochan.com/the-lazy-prince-chapter-1/".to_string(),
            },
            ChapterLink {
                title: "Chapter 2".to_string(),
                url: "https://kobatochan.com/the-lazy-prince-chapter-2/".to_string(),
            },
        ],
        info.chapters
    );
}

#[test]
fn test_parse_novel_without_metadata() {
    let info = Kobatochan.parse_novel("x", "<html><body><p>Nothing here</p></body></html>");

    assert_eq!(None, info.title);
    assert_eq!(None, info.author);
    assert_eq!(None, info.cover_url);
    assert!(info.chapters.is_empty());
}

#[test]
fn test_chapter_body_cleaning() {
    let page = r#"<html><body><div class="entry-content" id="post-12" style="color: red">
<!-- ad slot -->
<p style="text-align: center">Chapter 12</p>
<p class="intro">The rain <em class="x">kept</em> falling.<br><br>Nobody moved.</p>
<script>track();</script>
<p><img src="x.jpg"></p>
<p>   </p>
<p>/</p>
<ins class="adsbygoogle"><p>Sponsored</p></ins>
<p>He finally spoke.</p>
</div></body></html>"#;

    let body = Kobatochan.chapter_body(page).expect("content not found");

    assert_eq!(
        "<p>The rain <em>kept</em> falling.<br>Nobody moved.</p><p>He finally spoke.</p>",
        body
    );
}

#[test]
fn test_chapter_body_without_content() {
    assert_eq!(None, Kobatochan.chapter_body("<html><body><p>404</p></body></html>"));
}
