use crate::error::{HyliaError, Result};
use crate::fetch::Site;
use hylia_model::File;
use scraper::{ElementRef, Html, Selector};
use url::Url;

const ALBUM_NAME_LABEL: &str = "Album name:";
const SONG_NAME_LABEL: &str = "Song name:";
const DOWNLOAD_LABEL: &str = "Download to Computer";

/// A song page on the site. Its name and files are fetched on first use
/// and kept for the lifetime of the value.
#[derive(Debug, Clone)]
pub struct Song {
    url: Url,
    details: Option<SongDetails>,
}

/// What a song page resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongDetails {
    pub name: String,
    /// Never empty. The first entry is the primary download.
    pub files: Vec<File>,
}

impl Song {
    pub fn new(url: Url) -> Self {
        Self { url, details: None }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_loaded(&self) -> bool {
        self.details.is_some()
    }

    /// Fetch and parse the song page, unless that already happened.
    pub async fn load(&mut self, site: &Site) -> Result<&SongDetails> {
        let details = match self.details.take() {
            Some(details) => details,
            None => {
                let document = site.fetch_document(&self.url, &[]).await?;
                parse_song_page(&document, &self.url)?
            }
        };
        Ok(&*self.details.insert(details))
    }

    pub async fn name(&mut self, site: &Site) -> Result<&str> {
        Ok(&self.load(site).await?.name)
    }

    pub async fn files(&mut self, site: &Site) -> Result<&[File]> {
        Ok(&self.load(site).await?.files)
    }
}

/// Extract the display name and download links from a song page.
///
/// Every file is renamed after the song, keeping the extension of the
/// file it links to.
pub fn parse_song_page(document: &Html, page_url: &Url) -> Result<SongDetails> {
    let container_sel = Selector::parse("#content_container").expect("valid selector");
    let container = document
        .select(&container_sel)
        .next()
        .ok_or_else(|| HyliaError::structure(page_url, "no #content_container"))?;

    let name = song_name(container)
        .ok_or_else(|| HyliaError::structure(page_url, "no song name in the album info paragraph"))?;

    let mut files = download_links(container, page_url)?;
    if files.is_empty() {
        return Err(HyliaError::structure(page_url, "no download links"));
    }
    for file in &mut files {
        file.rename_to_song(&name);
    }

    tracing::debug!(url = %page_url, name = %name, files = files.len(), "Parsed song page");
    Ok(SongDetails { name, files })
}

/// The text fragment right after "Song name:" in the paragraph that
/// starts with "Album name:".
fn song_name(container: ElementRef) -> Option<String> {
    let p_sel = Selector::parse("p").expect("valid selector");
    let info = container
        .select(&p_sel)
        .find(|p| stripped_strings(*p).next() == Some(ALBUM_NAME_LABEL))?;

    let mut fragments = stripped_strings(info);
    fragments.find(|s| *s == SONG_NAME_LABEL)?;
    fragments.next().map(str::to_string)
}

fn download_links(container: ElementRef, page_url: &Url) -> Result<Vec<File>> {
    let table_sel = Selector::parse("table.blog").expect("valid selector");
    let b_sel = Selector::parse("b").expect("valid selector");
    let a_sel = Selector::parse("a[href]").expect("valid selector");

    let table = container
        .select(&table_sel)
        .next()
        .ok_or_else(|| HyliaError::structure(page_url, "no table.blog"))?;

    let mut files = Vec::new();
    for bold in table.select(&b_sel) {
        let text: String = bold.text().collect();
        if !text.trim_start().starts_with(DOWNLOAD_LABEL) {
            continue;
        }
        let Some(href) = bold.select(&a_sel).next().and_then(|a| a.value().attr("href")) else {
            tracing::debug!(url = %page_url, "Download label without a link");
            continue;
        };
        let url = page_url
            .join(href)
            .map_err(|source| HyliaError::InvalidUrl { url: href.to_string(), source })?;
        files.push(File::from_url(url));
    }
    Ok(files)
}

/// Text nodes under `element`, trimmed, with the blank ones dropped.
fn stripped_strings(element: ElementRef<'_>) -> impl Iterator<Item = &str> {
    element.text().map(str::trim).filter(|s| !s.is_empty())
}
