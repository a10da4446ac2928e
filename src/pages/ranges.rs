//! Page range strings

/// Upper bound on pages produced by [`parse_page_ranges`]
pub const MAX_PARSED_PAGES: usize = 10_000;

/// Render page numbers as a compact label, e.g. `1-3, 5, 7-9`.
///
/// Runs of three or more collapse to `start-end`; a run of two stays as
/// `a, b`.
pub fn compress_page_ranges(pages: &[u32]) -> String {
    let mut sorted = pages.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut parts = Vec::new();
    let mut iter = sorted.into_iter().peekable();

    while let Some(start) = iter.next() {
        let mut end = start;
        while let Some(&next) = iter.peek() {
            if end.checked_add(1) != Some(next) {
                break;
            }
            end = next;
            iter.next();
        }

        match end - start {
            0 => parts.push(start.to_string()),
            1 => {
                parts.push(start.to_string());
                parts.push(end.to_string());
            }
            _ => parts.push(format!("{}-{}", start, end)),
        }
    }

    parts.join(", ")
}

/// Parse page ranges like "1,2,5-10,15" into sorted, unique page numbers.
///
/// Malformed parts and reversed ranges are skipped. Parsing stops once
/// [`MAX_PARSED_PAGES`] numbers were produced, so an oversized range is
/// truncated rather than dropped.
pub fn parse_page_ranges(s: &str) -> Vec<u32> {
    let mut pages = Vec::new();

    for part in s.split(',') {
        if pages.len() >= MAX_PARSED_PAGES {
            break;
        }

        let part = part.trim();
        if let Some((start, end)) = part.split_once('-') {
            if let (Ok(start), Ok(end)) = (start.trim().parse::<u32>(), end.trim().parse::<u32>()) {
                if end >= start {
                    for page in start..=end {
                        if pages.len() >= MAX_PARSED_PAGES {
                            break;
                        }
                        pages.push(page);
                    }
                }
            }
        } else if let Ok(page) = part.parse::<u32>() {
            pages.push(page);
        }
    }

    pages.retain(|&p| p > 0);
    pages.sort_unstable();
    pages.dedup();
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_page_ranges() {
        assert_eq!(compress_page_ranges(&[1, 2, 3, 5, 7, 8, 9]), "1-3, 5, 7-9");
        assert_eq!(compress_page_ranges(&[4]), "4");
        assert_eq!(compress_page_ranges(&[4, 5]), "4, 5");
        assert_eq!(compress_page_ranges(&[2, 3]), "2, 3");
        assert_eq!(compress_page_ranges(&[]), "");
    }

    #[test]
    fn test_compress_unsorted_with_duplicates() {
        assert_eq!(compress_page_ranges(&[9, 1, 3, 2, 2, 10, 11]), "1-3, 9-11");
    }

    #[test]
    fn test_parse_page_ranges() {
        assert_eq!(parse_page_ranges("1,2,3"), vec![1, 2, 3]);
        assert_eq!(parse_page_ranges("1-5"), vec![1, 2, 3, 4, 5]);
        assert_eq!(parse_page_ranges("1, 3-5 ,10"), vec![1, 3, 4, 5, 10]);
        assert_eq!(parse_page_ranges("5-3"), Vec::<u32>::new());
        assert_eq!(parse_page_ranges("0,abc"), Vec::<u32>::new());
        assert_eq!(parse_page_ranges(""), Vec::<u32>::new());
    }

    #[test]
    fn test_parse_page_ranges_safety_limit() {
        let result = parse_page_ranges("1-100000");
        assert_eq!(result.len(), MAX_PARSED_PAGES);
        assert_eq!(result.first(), Some(&1));
        assert_eq!(result.last(), Some(&(MAX_PARSED_PAGES as u32)));

        // Huge ranges stop at the cap instead of walking to u32::MAX
        let result = parse_page_ranges("3, 10-4294967295");
        assert_eq!(result.len(), MAX_PARSED_PAGES);
        assert_eq!(result[0], 3);
        assert_eq!(result[1], 10);
    }

    #[test]
    fn test_parse_then_compress() {
        assert_eq!(compress_page_ranges(&parse_page_ranges("7-9,1-3,5")), "1-3, 5, 7-9");
    }
}
