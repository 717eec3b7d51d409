use crate::error::{HyliaError, Result};
use crate::fetch::Site;
use crate::song::Song;
use hylia_model::File;
use scraper::{ElementRef, Html, Selector};
use url::Url;

const NO_SUCH_ALBUM: &str = "No such album";

/// A soundtrack (album) on the site, named by the slug at the end of its URL.
///
/// The album page is fetched on first access to [`Soundtrack::load`] and the
/// result kept for the lifetime of the value.
#[derive(Debug, Clone)]
pub struct Soundtrack {
    id: String,
    url: Url,
    contents: Option<SoundtrackContents>,
}

/// Songs and images listed on an album page, in page order.
#[derive(Debug, Clone)]
pub struct SoundtrackContents {
    pub songs: Vec<Song>,
    pub images: Vec<File>,
}

/// The links scraped off an album page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumPage {
    pub song_urls: Vec<Url>,
    pub images: Vec<File>,
}

impl Soundtrack {
    pub fn new(site: &Site, id: &str) -> Result<Self> {
        Ok(Self {
            id: id.to_string(),
            url: site.album_url(id)?,
            contents: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_loaded(&self) -> bool {
        self.contents.is_some()
    }

    /// Fetch the album page, unless that already happened.
    ///
    /// Fails with [`HyliaError::NonexistentSoundtrack`] when the site has no
    /// album under this id. Songs come back unresolved; each fetches its own
    /// page when first asked for its name or files.
    pub async fn load(&mut self, site: &Site) -> Result<&mut SoundtrackContents> {
        let contents = match self.contents.take() {
            Some(contents) => contents,
            None => {
                let document = site.fetch_document(&self.url, &[]).await?;
                let page = parse_album_page(&document, &self.url, &self.id)?;
                tracing::info!(
                    id = %self.id,
                    songs = page.song_urls.len(),
                    images = page.images.len(),
                    "Parsed album page"
                );
                SoundtrackContents {
                    songs: page.song_urls.into_iter().map(Song::new).collect(),
                    images: page.images,
                }
            }
        };
        Ok(self.contents.insert(contents))
    }
}

/// Find the album's content region and pull the song and image links out of it.
///
/// The site offers no ids or classes below `#content_container`, so the
/// region is located by position: the second `div` inside the container,
/// then the first `div` inside that. An album is missing when a paragraph in
/// that region reads exactly "No such album", ignoring surrounding whitespace.
pub fn parse_album_page(document: &Html, album_url: &Url, id: &str) -> Result<AlbumPage> {
    let region = content_region(document, album_url)?;

    let p_sel = Selector::parse("p").expect("valid selector");
    let missing = region
        .select(&p_sel)
        .any(|p| p.text().collect::<String>().trim() == NO_SUCH_ALBUM);
    if missing {
        return Err(HyliaError::NonexistentSoundtrack { id: id.to_string() });
    }

    Ok(AlbumPage {
        song_urls: song_page_urls(region, album_url)?,
        images: image_files(region, album_url)?,
    })
}

fn content_region<'a>(document: &'a Html, album_url: &Url) -> Result<ElementRef<'a>> {
    let container_sel = Selector::parse("#content_container").expect("valid selector");
    let div_sel = Selector::parse("div").expect("valid selector");

    let container = document
        .select(&container_sel)
        .next()
        .ok_or_else(|| HyliaError::structure(album_url, "no #content_container"))?;
    let block = container
        .select(&div_sel)
        .nth(1)
        .ok_or_else(|| HyliaError::structure(album_url, "fewer than two divs in #content_container"))?;
    block
        .select(&div_sel)
        .next()
        .ok_or_else(|| HyliaError::structure(album_url, "no div inside the album block"))
}

/// Every link in the region's first table, resolved against the album URL.
fn song_page_urls(region: ElementRef, album_url: &Url) -> Result<Vec<Url>> {
    let table_sel = Selector::parse("table").expect("valid selector");
    let a_sel = Selector::parse("a[href]").expect("valid selector");

    let table = region
        .select(&table_sel)
        .next()
        .ok_or_else(|| HyliaError::structure(album_url, "no song table"))?;

    table
        .select(&a_sel)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| resolve(album_url, href))
        .collect()
}

/// Every link that opens in a new window: the album's scans and covers.
fn image_files(region: ElementRef, album_url: &Url) -> Result<Vec<File>> {
    let a_sel = Selector::parse(r#"a[target="_blank"][href]"#).expect("valid selector");

    region
        .select(&a_sel)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| resolve(album_url, href).map(File::from_url))
        .collect()
}

fn resolve(base: &Url, href: &str) -> Result<Url> {
    base.join(href).map_err(|source| HyliaError::InvalidUrl {
        url: href.to_string(),
        source,
    })
}
