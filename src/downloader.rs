use crate::client::PageSource;
use crate::config::COVER_FILE;
use crate::cover;
use crate::site::{ChapterLink, Site};
use crate::util::{chapter_file_name, compress, volume_for_chapter};
use easy_error::{Error, ResultExt};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// One persisted chapter, `body` being the compressed HTML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub body: String,
    pub chapter_no: usize,
    pub chapter_title: String,
}

/// Number of chapter records stored below `novel_dir`, at any depth.
pub fn count_chapters(novel_dir: &Path) -> Result<usize, Error> {
    let mut count = 0;
    let mut stack = vec![novel_dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        if !dir.is_dir() {
            continue;
        }
        for entry in fs::read_dir(&dir).context(format!("Could not list {dir:?}"))? {
            let path = entry.context(format!("Could not list {dir:?}"))?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().map_or(false, |ext| ext == "json") {
                count += 1;
            }
        }
    }
    Ok(count)
}

/// Whether the chapters on disk have to be downloaded again.
///
/// Only counts are compared: equal counts mean the novel is complete, any difference
/// means every chapter is fetched again. There is no partial resume.
pub fn needs_download(on_disk: usize, scraped: usize) -> bool {
    on_disk != scraped
}

/// Writes one chapter record to `<novel_dir>/<volume>/<index>.json`.
pub fn save_chapter(novel_dir: &Path, index: usize, title: &str, html: &str) -> Result<PathBuf, Error> {
    let path = novel_dir
        .join(volume_for_chapter(index).to_string())
        .join(chapter_file_name(index));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context(format!("Could not create directory {parent:?}"))?;
    }

    let record = ChapterRecord {
        body: compress(html)?,
        chapter_no: index,
        chapter_title: title.to_string(),
    };
    let json = serde_json::to_string(&record).context("Could not serialize chapter")?;
    fs::write(&path, json).context(format!("Could not write {path:?}"))?;
    Ok(path)
}

/// Fetches the cover into `<novel_dir>/cover.jpg`. A cover that cannot be retrieved is skipped.
pub fn download_cover<S: PageSource>(
    source: &S,
    novel_dir: &Path,
    cover_url: &Url,
    upscale: bool,
) -> Result<(), Error> {
    let data = match source.fetch_bytes(cover_url)? {
        Some(data) => data,
        None => return Ok(()),
    };

    if upscale {
        match cover::prepare_cover(&data, novel_dir) {
            Ok(_) => return Ok(()),
            Err(e) => warn!("Could not prepare cover, storing it as downloaded: {e}"),
        }
    }

    let cover_path = novel_dir.join(COVER_FILE);
    fs::write(&cover_path, &data).context(format!("Could not write {cover_path:?}"))?;
    info!("Saved cover from {cover_url}");
    Ok(())
}

/// Downloads, cleans and persists every chapter in `chapters`, in order.
/// A chapter without retrievable content is not persisted, so the next run sees a short count.
pub fn download_chapters<S: PageSource, W: Site>(
    source: &S,
    site: &W,
    novel_dir: &Path,
    novel_url: &Url,
    chapters: &[ChapterLink],
) -> Result<(), Error> {
    for (index, link) in chapters.iter().enumerate() {
        info!("downloading chapter {index}");
        let title = if link.title.trim().is_empty() {
            format!("Chapter {index}")
        } else {
            link.title.clone()
        };

        let url = novel_url
            .join(&link.url)
            .context(format!("Could not resolve chapter url '{}'", link.url))?;
        let body = match source.fetch_text(&url)?.and_then(|page| site.chapter_body(&page)) {
            Some(body) => body,
            None => {
                error!("No content retrieved for chapter {index} ({url}), skipping it");
                continue;
            }
        };

        let path = save_chapter(novel_dir, index, &title, &body)?;
        debug!("Saved {path:?}");
    }
    Ok(())
}

/// Brings the chapters on disk in line with the landing page.
/// Returns whether a download pass was run.
pub fn sync_chapters<S: PageSource, W: Site>(
    source: &S,
    site: &W,
    novel_dir: &Path,
    novel_url: &Url,
    chapters: &[ChapterLink],
) -> Result<bool, Error> {
    let on_disk = count_chapters(novel_dir)?;
    if !needs_download(on_disk, chapters.len()) {
        info!("All {on_disk} chapters already downloaded");
        return Ok(false);
    }

    info!("{on_disk} chapters on disk, {} listed, downloading all", chapters.len());
    download_chapters(source, site, novel_dir, novel_url, chapters)?;
    Ok(true)
}

#[cfg(test)]
use crate::client::testing::FakeSource;
#[cfg(test)]
use crate::site::Kobatochan;
#[cfg(test)]
use crate::util::decompress;

#[cfg(test)]
fn novel_url() -> Url {
    Url::parse("https://kobatochan.com/korean-novels/the-lazy-prince/").unwrap()
}

#[cfg(test)]
fn links(count: usize) -> Vec<ChapterLink> {
    (0..count)
        .map(|i| ChapterLink {
            title: format!("Chapter {}", i + 1),
            url: format!("https://kobatochan.com/the-lazy-prince-chapter-{}/", i + 1),
        })
        .collect()
}

#[cfg(test)]
fn chapter_page(text: &str) -> String {
    format!(r#"<html><body><div class="entry-content"><p>{text}</p></div></body></html>"#)
}

#[test]
fn test_needs_download() {
    assert!(!needs_download(0, 0));
    assert!(!needs_download(42, 42));
    assert!(needs_download(0, 42));
    assert!(needs_download(41, 42));
    assert!(needs_download(43, 42));
}

#[test]
fn test_record_json_layout() {
    let dir = tempfile::tempdir().unwrap();

    let path = save_chapter(dir.path(), 7, "Chapter 8", "<p>Hi</p>").unwrap();

    assert_eq!(dir.path().join("1").join("00007.json"), path);
    let json = fs::read_to_string(&path).unwrap();
    assert!(json.starts_with(r#"{"body":""#), "{json}");
    assert!(json.ends_with(r#"","chapter_no":7,"chapter_title":"Chapter 8"}"#), "{json}");
    let record: ChapterRecord = serde_json::from_str(&json).unwrap();
    assert_eq!("<p>Hi</p>", decompress(&record.body).unwrap());
}

#[test]
fn test_complete_novel_is_not_downloaded_again() {
    let dir = tempfile::tempdir().unwrap();
    let chapters = links(3);
    for i in 0..3 {
        save_chapter(dir.path(), i, &chapters[i].title, "<p>old</p>").unwrap();
    }
    let source = FakeSource::default();

    let downloaded = sync_chapters(&source, &Kobatochan, dir.path(), &novel_url(), &chapters).unwrap();

    assert!(!downloaded);
    assert_eq!(0, source.request_count());
}

#[test]
fn test_count_mismatch_downloads_everything() {
    let dir = tempfile::tempdir().unwrap();
    let chapters = links(3);
    save_chapter(dir.path(), 0, "Chapter 1", "<p>old</p>").unwrap();
    let source = FakeSource::default()
        .with_page(&chapters[0].url, chapter_page("First"))
        .with_page(&chapters[1].url, chapter_page("Second"))
        .with_page(&chapters[2].url, chapter_page("Third"));

    let downloaded = sync_chapters(&source, &Kobatochan, dir.path(), &novel_url(), &chapters).unwrap();

    assert!(downloaded);
    assert_eq!(3, source.request_count());
    assert_eq!(3, count_chapters(dir.path()).unwrap());
    let first: ChapterRecord =
        serde_json::from_str(&fs::read_to_string(dir.path().join("1").join("00000.json")).unwrap()).unwrap();
    assert_eq!("<p>First</p>", decompress(&first.body).unwrap());
    assert_eq!(0, first.chapter_no);
}

#[test]
fn test_missing_chapter_page_is_retried_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut chapters = links(3);
    chapters[2].title = "  ".to_string();
    let first_run = FakeSource::default()
        .with_page(&chapters[0].url, chapter_page("First"))
        .with_page(&chapters[2].url, chapter_page("Third"));

    assert!(sync_chapters(&first_run, &Kobatochan, dir.path(), &novel_url(), &chapters).unwrap());

    assert!(dir.path().join("1").join("00000.json").is_file());
    assert!(!dir.path().join("1").join("00001.json").exists());
    let third: ChapterRecord =
        serde_json::from_str(&fs::read_to_string(dir.path().join("1").join("00002.json")).unwrap()).unwrap();
    assert_eq!("Chapter 2", third.chapter_title);
    assert_eq!(2, count_chapters(dir.path()).unwrap());

    let second_run = FakeSource::default()
        .with_page(&chapters[0].url, chapter_page("First"))
        .with_page(&chapters[1].url, chapter_page("Second"))
        .with_page(&chapters[2].url, chapter_page("Third"));

    assert!(sync_chapters(&second_run, &Kobatochan, dir.path(), &novel_url(), &chapters).unwrap());

    assert_eq!(3, second_run.request_count());
    let second: ChapterRecord =
        serde_json::from_str(&fs::read_to_string(dir.path().join("1").join("00001.json")).unwrap()).unwrap();
    assert_eq!("<p>Second</p>", decompress(&second.body).unwrap());
}

#[test]
fn test_page_without_content_is_not_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let chapters = links(1);
    let source = FakeSource::default().with_page(&chapters[0].url, "<html><body><p>Not found</p></body></html>");

    download_chapters(&source, &Kobatochan, dir.path(), &novel_url(), &chapters).unwrap();

    assert_eq!(0, count_chapters(dir.path()).unwrap());
}

#[test]
fn test_missing_cover_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let source = FakeSource::default();
    let url = Url::parse("https://kobatochan.com/wp-content/uploads/cover.jpg").unwrap();

    download_cover(&source, dir.path(), &url, false).unwrap();

    assert_eq!(1, source.request_count());
    assert!(!dir.path().join(COVER_FILE).exists());
}

#[test]
fn test_cover_is_stored() {
    let dir = tempfile::tempdir().unwrap();
    let url = Url::parse("https://kobatochan.com/wp-content/uploads/cover.jpg").unwrap();
    let source = FakeSource::default().with_page(url.as_str(), b"jpeg bytes");

    download_cover(&source, dir.path(), &url, false).unwrap();

    assert_eq!(b"jpeg bytes".to_vec(), fs::read(dir.path().join(COVER_FILE)).unwrap());
}
