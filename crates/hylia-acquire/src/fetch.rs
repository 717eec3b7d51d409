use crate::error::{HyliaError, Result};
use crate::repair;
use scraper::Html;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://anime.thehylia.com/";

const ALBUM_PATH: &str = "soundtracks/album/";
const SEARCH_PATH: &str = "search";

/// Timeout applied to each individual file download.
pub const FILE_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle on the site: the HTTP client plus the base every page URL hangs off.
///
/// Pages are fetched without an explicit timeout; file downloads use
/// [`FILE_TIMEOUT`] for connecting and between reads.
#[derive(Debug, Clone)]
pub struct Site {
    client: reqwest::Client,
    file_client: reqwest::Client,
    base_url: Url,
}

impl Site {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the scraper at another host with the same layout.
    ///
    /// A missing trailing slash is added so relative paths join under it.
    pub fn with_base_url(base: &str) -> Result<Self> {
        let normalized = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        let base_url = Url::parse(&normalized).map_err(|source| HyliaError::InvalidUrl {
            url: base.to_string(),
            source,
        })?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("thehylia/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| HyliaError::Connectivity {
                url: base_url.to_string(),
                source,
            })?;
        let file_client = reqwest::Client::builder()
            .user_agent(concat!("thehylia/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(FILE_TIMEOUT)
            .read_timeout(FILE_TIMEOUT)
            .build()
            .map_err(|source| HyliaError::Connectivity {
                url: base_url.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            file_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of the album page for a soundtrack id.
    pub fn album_url(&self, id: &str) -> Result<Url> {
        self.join(&format!("{ALBUM_PATH}{id}"))
    }

    pub fn search_url(&self) -> Result<Url> {
        self.join(SEARCH_PATH)
    }

    fn join(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|source| HyliaError::InvalidUrl {
            url: format!("{}{path}", self.base_url),
            source,
        })
    }

    /// GET a page, repair its markup and parse it.
    ///
    /// Network failures surface as [`HyliaError::Connectivity`]; the caller
    /// decides whether to retry. The HTTP status is not checked: the site
    /// renders its own error pages, which the navigators recognise.
    pub async fn fetch_document(&self, url: &Url, query: &[(&str, &str)]) -> Result<Html> {
        tracing::info!(url = %url, "Fetching page");

        let mut request = self.client.get(url.clone());
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await.map_err(|source| HyliaError::Connectivity {
            url: url.to_string(),
            source,
        })?;
        let status = response.status();
        let raw = response.bytes().await.map_err(|source| HyliaError::Connectivity {
            url: url.to_string(),
            source,
        })?;
        tracing::debug!(url = %url, status = status.as_u16(), bytes = raw.len(), "Received HTML");

        Ok(parse_repaired(&raw))
    }

    /// GET a file's full body.
    ///
    /// Unlike page fetches, a non-success status is an error here, so an
    /// error page is never saved in place of the file.
    pub async fn fetch_file(&self, url: &Url) -> Result<Vec<u8>> {
        let response = self
            .file_client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| HyliaError::Connectivity {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HyliaError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| HyliaError::Connectivity {
            url: url.to_string(),
            source,
        })?;
        Ok(body.to_vec())
    }
}

/// Repair raw page bytes and parse them into a document.
pub fn parse_repaired(raw: &[u8]) -> Html {
    let repaired = repair::repair_html(raw);
    Html::parse_document(&String::from_utf8_lossy(&repaired))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Selector;

    #[test]
    fn test_album_url() {
        let site = Site::new().unwrap();
        assert_eq!(
            site.album_url("jumping-flash").unwrap().as_str(),
            "http://anime.thehylia.com/soundtracks/album/jumping-flash"
        );
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let site = Site::with_base_url("http://127.0.0.1:8080/mirror").unwrap();
        assert_eq!(site.base_url().as_str(), "http://127.0.0.1:8080/mirror/");
        assert_eq!(site.search_url().unwrap().as_str(), "http://127.0.0.1:8080/mirror/search");
    }

    #[test]
    fn test_invalid_base_url() {
        let err = Site::with_base_url("not a url").unwrap_err();
        assert!(matches!(err, HyliaError::InvalidUrl { .. }));
    }

    #[test]
    fn test_parse_repaired_nests_anchor_around_div() {
        let raw = br#"<html><body>
<a href="http://x/front.jpg" target="_blank"><div style="padding: 7px; float: left;"><img src="t.jpg"></a></div>
</td>
</body></html>"#;
        let doc = parse_repaired(raw);
        let sel = Selector::parse("a > div > img").expect("valid selector");
        assert_eq!(doc.select(&sel).count(), 1);
    }
}
