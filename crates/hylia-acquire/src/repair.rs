//! Byte-level fixes for the site's malformed HTML.
//!
//! Two template bugs break parsing if left alone:
//! - a stray `</td>` alone on its own line, and
//! - `<div style="padding: 7px; float: left;">` blocks that close an anchor
//!   inside the div when the anchor was opened outside it.
//!
//! Both are repaired on the raw bytes before any parser sees them.

use regex::bytes::Regex;
use std::sync::LazyLock;

static STRAY_TD_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^</td>\s*$").expect("valid regex"));

const BAD_DIV_OPEN: &[u8] = br#"<div style="padding: 7px; float: left;">"#;
const DIV_CLOSE: &[u8] = b"</div>";
const ANCHOR_CLOSE: &[u8] = b"</a>";

/// Apply both repairs to a raw response body.
pub fn repair_html(raw: &[u8]) -> Vec<u8> {
    let without_stray_cells = remove_stray_cell_closers(raw);
    relocate_anchor_closers(without_stray_cells)
}

/// Blank out every line that holds nothing but a closing `</td>` tag.
pub fn remove_stray_cell_closers(raw: &[u8]) -> Vec<u8> {
    STRAY_TD_LINE.replace_all(raw, &b""[..]).into_owned()
}

/// For every malformed div, drop the first `</a>` after the div opens and
/// re-insert it right after the div's `</div>`.
///
/// Occurrences are handled front to back; the search for the next div
/// resumes just past the previous div's opening tag.
pub fn relocate_anchor_closers(mut content: Vec<u8>) -> Vec<u8> {
    let mut search_from = 0;

    while let Some(div_start) = find_from(&content, BAD_DIV_OPEN, search_from) {
        let anchor_end = find_from(&content, ANCHOR_CLOSE, div_start);
        let div_end = find_from(&content, DIV_CLOSE, div_start);

        match (anchor_end, div_end) {
            (Some(anchor_end), Some(_)) => {
                content.drain(anchor_end..anchor_end + ANCHOR_CLOSE.len());
                // The drain may have shifted the `</div>`, so look it up again.
                if let Some(div_end) = find_from(&content, DIV_CLOSE, div_start) {
                    let insert_at = div_end + DIV_CLOSE.len();
                    let tail = content.split_off(insert_at);
                    content.extend_from_slice(ANCHOR_CLOSE);
                    content.extend_from_slice(&tail);
                }
            }
            _ => {
                tracing::debug!(offset = div_start, "Malformed div without a closing anchor or div, left as is");
            }
        }

        search_from = div_start + BAD_DIV_OPEN.len();
    }

    content
}

fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repaired(input: &str) -> String {
        String::from_utf8(repair_html(input.as_bytes())).unwrap()
    }

    #[test]
    fn test_removes_stray_td_lines() {
        let input = "<table><tr><td>a</td>\n</td>\n<td>b</td>\n</td>   \n</tr></table>";
        let output = String::from_utf8(remove_stray_cell_closers(input.as_bytes())).unwrap();
        assert_eq!(output, "<table><tr><td>a</td>\n\n<td>b</td>\n\n</tr></table>");
    }

    #[test]
    fn test_keeps_td_sharing_a_line() {
        let input = "<td>x</td>\n  </td>\n</td> trailing\n";
        let output = String::from_utf8(remove_stray_cell_closers(input.as_bytes())).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_no_bad_div_is_identity() {
        let input = "<p><a href=\"x\">x</a></p>";
        assert_eq!(repaired(input), input);
    }

    #[test]
    fn test_relocates_single_anchor_close() {
        let input = r#"<a href="cover.jpg"><div style="padding: 7px; float: left;"><img src="t.jpg"></a></div>"#;
        let expected = r#"<a href="cover.jpg"><div style="padding: 7px; float: left;"><img src="t.jpg"></div></a>"#;
        assert_eq!(repaired(input), expected);
    }

    #[test]
    fn test_relocates_every_occurrence_in_order() {
        let block = |n: u32| {
            format!(r#"<a href="{n}.jpg"><div style="padding: 7px; float: left;"><img src="{n}t.jpg"></a></div>"#)
        };
        let fixed = |n: u32| {
            format!(r#"<a href="{n}.jpg"><div style="padding: 7px; float: left;"><img src="{n}t.jpg"></div></a>"#)
        };
        let input = format!("{}\n{}\n{}", block(1), block(2), block(3));
        let expected = format!("{}\n{}\n{}", fixed(1), fixed(2), fixed(3));
        assert_eq!(repaired(&input), expected);
    }

    #[test]
    fn test_unterminated_div_is_left_alone() {
        let input = r#"<div style="padding: 7px; float: left;"><img src="t.jpg">"#;
        assert_eq!(repaired(input), input);
    }

    #[test]
    fn test_find_from() {
        assert_eq!(find_from(b"abcabc", b"abc", 0), Some(0));
        assert_eq!(find_from(b"abcabc", b"abc", 1), Some(3));
        assert_eq!(find_from(b"abcabc", b"abc", 4), None);
        assert_eq!(find_from(b"abc", b"abc", 10), None);
    }
}
