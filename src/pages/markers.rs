//! Page marker codec

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use super::PageResult;

/// Written in place of empty page content so the page survives a round trip
pub const EMPTY_PAGE_PLACEHOLDER: &str = "[No text found on this page]";

fn open_marker() -> &'static Regex {
    static OPEN: OnceLock<Regex> = OnceLock::new();
    OPEN.get_or_init(|| Regex::new(r"=== PAGE (\d+) ===").expect("valid page marker pattern"))
}

fn close_marker(page_number: u32) -> String {
    format!("=== END PAGE {} ===", page_number)
}

/// Whether the text contains at least one opening page marker
pub fn has_page_markers(text: &str) -> bool {
    open_marker().is_match(text)
}

/// Encode pages into a single blob, ascending by page number.
///
/// Confidence is not part of the format and is dropped.
pub fn encode_pages(pages: &[PageResult]) -> String {
    let mut ordered: Vec<&PageResult> = pages.iter().collect();
    ordered.sort_by_key(|p| p.page_number);

    ordered
        .into_iter()
        .map(|page| {
            let content = page.text.trim();
            let content = if content.is_empty() {
                EMPTY_PAGE_PLACEHOLDER
            } else {
                content
            };
            format!(
                "=== PAGE {n} ===\n{content}\n{close}",
                n = page.page_number,
                close = close_marker(page.page_number)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Decode a blob into pages sorted by page number.
///
/// A block only ends at the closing marker carrying its own number. Text
/// without any complete block is returned as page 1. Decoded pages carry
/// zero confidence.
pub fn decode_pages(text: &str) -> Vec<PageResult> {
    let mut pages = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = 0;

    while let Some(caps) = open_marker().captures_at(text, cursor) {
        let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
            break;
        };

        let Ok(page_number) = number.as_str().parse::<u32>() else {
            cursor = whole.end();
            continue;
        };

        let close = close_marker(page_number);
        let Some(close_offset) = text[whole.end()..].find(&close) else {
            // Unterminated block, keep scanning after its opener
            cursor = whole.end();
            continue;
        };

        let content_end = whole.end() + close_offset;
        let content = text[whole.end()..content_end].trim();
        cursor = content_end + close.len();

        if !seen.insert(page_number) {
            continue;
        }

        let content = if content == EMPTY_PAGE_PLACEHOLDER {
            ""
        } else {
            content
        };
        pages.push(PageResult::new(page_number, content, 0.0));
    }

    if pages.is_empty() {
        return vec![PageResult::new(1, text.trim(), 0.0)];
    }

    pages.sort_by_key(|p| p.page_number);
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: u32, text: &str) -> PageResult {
        PageResult::new(n, text, 0.0)
    }

    #[test]
    fn test_encode_format() {
        let encoded = encode_pages(&[page(1, "Hello"), page(2, "   ")]);
        assert_eq!(
            encoded,
            "=== PAGE 1 ===\nHello\n=== END PAGE 1 ===\n\n=== PAGE 2 ===\n[No text found on this page]\n=== END PAGE 2 ==="
        );
    }

    #[test]
    fn test_encode_sorts_pages() {
        let encoded = encode_pages(&[page(3, "c"), page(1, "a")]);
        assert!(encoded.starts_with("=== PAGE 1 ==="));
        assert!(encoded.ends_with("=== END PAGE 3 ==="));
    }

    #[test]
    fn test_round_trip_with_gaps_and_empty_pages() {
        let pages = vec![
            page(1, "First page\nwith two lines"),
            page(4, ""),
            page(7, "Seventh"),
        ];
        assert_eq!(decode_pages(&encode_pages(&pages)), pages);
    }

    #[test]
    fn test_decode_without_markers_is_single_page() {
        let decoded = decode_pages("  just some text\n");
        assert_eq!(decoded, vec![page(1, "just some text")]);
    }

    #[test]
    fn test_decode_sorts_and_matches_own_closer() {
        let text = "=== PAGE 2 ===\nTwo mentions === END PAGE 1 === inline\n=== END PAGE 2 ===\n\n=== PAGE 1 ===\nOne\n=== END PAGE 1 ===";
        let decoded = decode_pages(text);
        assert_eq!(
            decoded,
            vec![page(1, "One"), page(2, "Two mentions === END PAGE 1 === inline")]
        );
    }

    #[test]
    fn test_decode_skips_unterminated_and_duplicate_blocks() {
        let text = "=== PAGE 5 ===\ndangling\n\n=== PAGE 3 ===\nthree\n=== END PAGE 3 ===\n=== PAGE 3 ===\nagain\n=== END PAGE 3 ===";
        assert_eq!(decode_pages(text), vec![page(3, "three")]);
    }

    #[test]
    fn test_has_page_markers() {
        assert!(has_page_markers("=== PAGE 12 ===\nx\n=== END PAGE 12 ==="));
        assert!(!has_page_markers("plain text"));
    }
}
