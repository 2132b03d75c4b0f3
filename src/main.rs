extern crate structopt;
extern crate ego_tree;
extern crate epub_builder;
extern crate html5ever;
extern crate html_escape;
extern crate regex;
extern crate reqwest;
extern crate scraper;
extern crate easy_error;
#[macro_use]
extern crate lazy_static;
extern crate xml5ever;

mod book;
mod client;
mod config;
mod cover;
mod dom_manipulation;
mod downloader;
mod logger;
mod site;
mod util;
mod xml_utils;

use book::assemble_volumes;
use client::{PageSource, Session};
use config::{Paths, USER_AGENT};
use downloader::{download_cover, sync_chapters};
use easy_error::{err_msg, Error, ResultExt};
use reqwest::Url;
use site::{Kobatochan, Site};
use std::fs;
use std::path::PathBuf;
use structopt::StructOpt;
use tracing::{info, warn};

/// A landing page URL the scraper knows how to handle.
#[derive(Debug)]
struct NovelUrl {
    url: Url,
    id: String,
}

fn parse_novel_url(url: &str) -> Result<NovelUrl, String> {
    let id = Kobatochan
        .novel_id(url)
        .ok_or_else(|| format!("{url} is not supported"))?;
    let url = Url::parse(url).map_err(|e| format!("{url} is not a valid url: {e}"))?;
    Ok(NovelUrl { url, id })
}

/// Scrapes a novel from kobatochan.com and packs its chapters into EPUB volumes.
#[derive(StructOpt)]
struct Args {
    /// Landing page of the novel, e.g. https://kobatochan.com/korean-novels/<novel>/
    #[structopt(parse(try_from_str = parse_novel_url))]
    url: NovelUrl,
    /// Where chapter records and covers are stored
    #[structopt(long, default_value = "novels", parse(from_os_str))]
    novels_dir: PathBuf,
    /// Where finished EPUBs are written
    #[structopt(long, default_value = "_book", parse(from_os_str))]
    book_dir: PathBuf,
    /// Stylesheets embedded in every volume
    #[structopt(long, default_value = "styles", parse(from_os_str))]
    styles_dir: PathBuf,
    /// Fonts embedded in every volume
    #[structopt(long, default_value = "fonts", parse(from_os_str))]
    fonts_dir: PathBuf,
    /// Directory holding cover.xhtml
    #[structopt(long, default_value = "template", parse(from_os_str))]
    template_dir: PathBuf,
    /// Upscale small covers with waifu2x-converter-cpp
    #[structopt(long)]
    upscale_cover: bool,
}

impl Args {
    fn paths(&self) -> Paths {
        Paths {
            novels: self.novels_dir.clone(),
            books: self.book_dir.clone(),
            styles: self.styles_dir.clone(),
            fonts: self.fonts_dir.clone(),
            templates: self.template_dir.clone(),
        }
    }
}

fn main() -> Result<(), Error> {
    logger::init();
    let args = Args::from_args(); // rejects unsupported urls before any work is done
    run(&args)
}

fn run(args: &Args) -> Result<(), Error> {
    let paths = args.paths();
    let site = Kobatochan;
    let novel_url = &args.url.url;
    let novel_dir = paths.novels.join(&args.url.id);
    fs::create_dir_all(&novel_dir).context(format!("Could not create directory {novel_dir:?}"))?;

    let session = Session::new(USER_AGENT)?;
    info!("Fetching {novel_url}");
    let page = session
        .fetch_text(novel_url)?
        .ok_or_else(|| err_msg(format!("Could not retrieve landing page {novel_url}")))?;
    let novel = site.parse_novel(&args.url.id, &page);
    info!(
        title = novel.title.as_deref().unwrap_or("-"),
        author = novel.author.as_deref().unwrap_or("-"),
        chapters = novel.chapters.len(),
        "Parsed {}",
        novel.id
    );

    match &novel.cover_url {
        Some(cover) => {
            let cover_url = novel_url
                .join(cover)
                .context(format!("Could not resolve cover url '{cover}'"))?;
            download_cover(&session, &novel_dir, &cover_url, args.upscale_cover)?;
        }
        None => warn!("No cover found for {}", novel.id),
    }

    sync_chapters(&session, &site, &novel_dir, novel_url, &novel.chapters)?;

    for book in assemble_volumes(&novel, &novel_dir, &paths)? {
        info!("Done: {book:?}");
    }
    Ok(())
}

#[test]
fn test_parse_novel_url() {
    let parsed = parse_novel_url("https://kobatochan.com/japanese-novels/some-novel/").unwrap();
    assert_eq!("some-novel", parsed.id);
    assert_eq!("https://kobatochan.com/japanese-novels/some-novel/", parsed.url.as_str());

    assert_eq!(
        "https://example.com/novel/ is not supported",
        parse_novel_url("https://example.com/novel/").unwrap_err()
    );
}

#[test]
fn test_cli_rejects_unsupported_url() {
    let result = Args::from_iter_safe(&["kobato-epub", "https://kobatochan.com/thai-novels/x/"]);
    assert!(result.is_err());
}

#[test]
fn test_cli_defaults() {
    let args = Args::from_iter_safe(&["kobato-epub", "https://kobatochan.com/original-works/x/"]).unwrap();
    let paths = args.paths();
    let defaults = Paths::default();

    assert_eq!(defaults.novels, paths.novels);
    assert_eq!(defaults.books, paths.books);
    assert_eq!(defaults.styles, paths.styles);
    assert_eq!(defaults.fonts, paths.fonts);
    assert_eq!(defaults.templates, paths.templates);
    assert!(!args.upscale_cover);
}
