use crate::error::{HyliaError, Result};
use crate::fetch::Site;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

static RESULTS_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^Found ([0-9]+) matching albums for ".*"\.$"#).expect("valid regex")
});

/// Search the site and return the ids of the matching soundtracks, in the
/// order the site lists them.
pub async fn search(site: &Site, term: &str) -> Result<Vec<String>> {
    let url = site.search_url()?;
    let document = site.fetch_document(&url, &[("search", term)]).await?;
    let ids = parse_search_results(&document, &url)?;
    tracing::info!(term = %term, results = ids.len(), "Search finished");
    Ok(ids)
}

/// Read soundtrack ids from a search results page.
///
/// The results follow a `Found N matching albums for "term".` paragraph,
/// as links in the next sibling paragraph. Each id is the last path segment
/// of a link.
pub fn parse_search_results(document: &Html, url: &Url) -> Result<Vec<String>> {
    let container_sel = Selector::parse("#content_container").expect("valid selector");
    let p_sel = Selector::parse("p").expect("valid selector");
    let a_sel = Selector::parse("a[href]").expect("valid selector");

    let container = document
        .select(&container_sel)
        .next()
        .ok_or_else(|| HyliaError::structure(url, "no #content_container"))?;

    let (header, count) = container
        .select(&p_sel)
        .find_map(|p| {
            let text: String = p.text().collect();
            let count = RESULTS_HEADER
                .captures(text.trim())
                .and_then(|caps| caps[1].parse::<usize>().ok())?;
            Some((p, count))
        })
        .ok_or_else(|| HyliaError::structure(url, "no \"Found N matching albums\" paragraph"))?;

    let Some(results) = next_sibling_paragraph(header) else {
        if count == 0 {
            return Ok(Vec::new());
        }
        return Err(HyliaError::structure(url, "no paragraph after the results header"));
    };

    let ids = results
        .select(&a_sel)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.trim_end_matches('/').rsplit('/').next().unwrap_or(href).to_string())
        .collect::<Vec<_>>();

    if ids.len() != count {
        tracing::debug!(expected = count, found = ids.len(), "Result count differs from header");
    }
    Ok(ids)
}

fn next_sibling_paragraph(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| sibling.value().name() == "p")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_URL: &str = "http://anime.thehylia.com/search?search=x";

    #[test]
    fn test_parse_search_results() {
        let html = r#"<html><body><div id="content_container">
            <p>Search</p>
            <p>Found 3 matching albums for "x".</p>
            <br>
            <p>
              <a href="http://anime.thehylia.com/soundtracks/album/xenoblade">Xenoblade</a><br>
              <a href="http://anime.thehylia.com/soundtracks/album/xenogears">Xenogears</a><br>
              <a href="/soundtracks/album/x-men">X-Men</a>
            </p>
            <p><a href="/soundtracks/album/unrelated">Unrelated</a></p>
        </div></body></html>"#;
        let doc = Html::parse_document(html);
        let url = Url::parse(SEARCH_URL).unwrap();

        let ids = parse_search_results(&doc, &url).unwrap();
        assert_eq!(ids, vec!["xenoblade", "xenogears", "x-men"]);
    }

    #[test]
    fn test_zero_results_without_list() {
        let html = r#"<div id="content_container">
            <p>Found 0 matching albums for "zzz".</p>
        </div>"#;
        let doc = Html::parse_document(html);
        let url = Url::parse(SEARCH_URL).unwrap();

        assert!(parse_search_results(&doc, &url).unwrap().is_empty());
    }

    #[test]
    fn test_missing_header_is_structural() {
        let html = r#"<div id="content_container"><p>Something else</p></div>"#;
        let doc = Html::parse_document(html);
        let url = Url::parse(SEARCH_URL).unwrap();

        assert!(matches!(
            parse_search_results(&doc, &url),
            Err(HyliaError::Structure { .. })
        ));
    }

    #[test]
    fn test_results_header_pattern() {
        assert!(RESULTS_HEADER.is_match(r#"Found 12 matching albums for "persona 3"."#));
        assert!(!RESULTS_HEADER.is_match(r#"Found matching albums for "persona"."#));
        assert!(!RESULTS_HEADER.is_match(r#"Found 2 matching albums for "persona""#));
    }
}
