//! Page-specification parsing
//!
//! Turns user-entered text like "1,3,5-7" into a concrete sequence of
//! 1-based page numbers, validated against a known page count. Output
//! preserves the order pages were written, including intentional repeats;
//! callers that need set semantics de-duplicate with [`dedup_pages`].

use crate::error::ParseError;

/// Policy for ranges written high-to-low, like "7-5".
///
/// The default rejects them. Deletion call sites opt into
/// [`RangeOrder::AllowDescending`], which expands the range high-to-low so
/// removal order matches what the user typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeOrder {
    #[default]
    AscendingOnly,
    AllowDescending,
}

/// Parse a page specification with the default ascending-only policy.
///
/// Grammar: comma-separated tokens, each a single page number or an
/// inclusive range `a-b`. Whitespace around tokens and the hyphen is
/// ignored. Every endpoint must satisfy `1 <= page <= page_count`.
pub fn parse_page_spec(spec: &str, page_count: u32) -> Result<Vec<u32>, ParseError> {
    parse_page_spec_with(spec, page_count, RangeOrder::AscendingOnly)
}

/// Parse a page specification under an explicit descending-range policy.
pub fn parse_page_spec_with(
    spec: &str,
    page_count: u32,
    order: RangeOrder,
) -> Result<Vec<u32>, ParseError> {
    let mut pages = Vec::new();

    for token in spec.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        expand_token(token, page_count, order, &mut pages)?;
    }

    if pages.is_empty() {
        return Err(ParseError::Empty);
    }

    Ok(pages)
}

/// Parse the same grammar but keep each comma-separated token as its own
/// group: "1-5, 8" becomes `[[1,2,3,4,5], [8]]`. This is the input form
/// for split sub-plans, where each group becomes one output document.
pub fn parse_range_groups(spec: &str, page_count: u32) -> Result<Vec<Vec<u32>>, ParseError> {
    let mut groups = Vec::new();

    for token in spec.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let mut group = Vec::new();
        expand_token(token, page_count, RangeOrder::AscendingOnly, &mut group)?;
        groups.push(group);
    }

    if groups.is_empty() {
        return Err(ParseError::Empty);
    }

    Ok(groups)
}

/// Stable de-duplication: first occurrence wins, order preserved.
pub fn dedup_pages(pages: &[u32]) -> Vec<u32> {
    use std::collections::BTreeSet;

    let mut seen = BTreeSet::new();
    pages.iter().copied().filter(|p| seen.insert(*p)).collect()
}

fn expand_token(
    token: &str,
    page_count: u32,
    order: RangeOrder,
    out: &mut Vec<u32>,
) -> Result<(), ParseError> {
    if let Some((lo, hi)) = token.split_once('-') {
        let start = parse_endpoint(lo, page_count)?;
        let end = parse_endpoint(hi, page_count)?;

        if start <= end {
            out.extend(start..=end);
        } else {
            match order {
                RangeOrder::AscendingOnly => {
                    return Err(ParseError::InvalidRange(format!(
                        "descending range {}-{}",
                        start, end
                    )));
                }
                RangeOrder::AllowDescending => out.extend((end..=start).rev()),
            }
        }
    } else {
        out.push(parse_endpoint(token, page_count)?);
    }

    Ok(())
}

fn parse_endpoint(text: &str, page_count: u32) -> Result<u32, ParseError> {
    let text = text.trim();
    let page: u32 = text
        .parse()
        .map_err(|_| ParseError::InvalidRange(format!("not a page number: \"{}\"", text)))?;

    if page == 0 || page > page_count {
        return Err(ParseError::OutOfRange { page, page_count });
    }

    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_single_page() {
        assert_eq!(parse_page_spec("5", 10).unwrap(), vec![5]);
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_page_spec("1-3", 10).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_parse_mixed_preserves_order() {
        assert_eq!(parse_page_spec("1,3,5-7", 10).unwrap(), vec![1, 3, 5, 6, 7]);
        assert_eq!(parse_page_spec("5-7,1", 10).unwrap(), vec![5, 6, 7, 1]);
    }

    #[test]
    fn test_parse_preserves_duplicates() {
        assert_eq!(parse_page_spec("3,3,1-3", 10).unwrap(), vec![3, 3, 1, 2, 3]);
    }

    #[test]
    fn test_parse_tolerates_whitespace() {
        assert_eq!(
            parse_page_spec(" 1 , 3 , 5 - 7 ", 10).unwrap(),
            vec![1, 3, 5, 6, 7]
        );
    }

    #[test]
    fn test_parse_empty_input() {
        assert_eq!(parse_page_spec("", 10), Err(ParseError::Empty));
        assert_eq!(parse_page_spec("  , , ", 10), Err(ParseError::Empty));
    }

    #[test]
    fn test_parse_rejects_zero_endpoint() {
        assert_eq!(
            parse_page_spec("0-2", 10),
            Err(ParseError::OutOfRange {
                page: 0,
                page_count: 10
            })
        );
    }

    #[test]
    fn test_parse_rejects_past_end() {
        assert_eq!(
            parse_page_spec("8-12", 10),
            Err(ParseError::OutOfRange {
                page: 12,
                page_count: 10
            })
        );
    }

    #[test]
    fn test_parse_rejects_descending_by_default() {
        assert!(matches!(
            parse_page_spec("3-1", 10),
            Err(ParseError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_parse_descending_expands_high_to_low_when_allowed() {
        assert_eq!(
            parse_page_spec_with("3-1", 10, RangeOrder::AllowDescending).unwrap(),
            vec![3, 2, 1]
        );
    }

    #[test]
    fn test_parse_rejects_garbage_token() {
        assert!(matches!(
            parse_page_spec("1,abc", 10),
            Err(ParseError::InvalidRange(_))
        ));
        assert!(matches!(
            parse_page_spec("1-2-3", 10),
            Err(ParseError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_parse_range_groups() {
        assert_eq!(
            parse_range_groups("1-5, 6-10", 10).unwrap(),
            vec![vec![1, 2, 3, 4, 5], vec![6, 7, 8, 9, 10]]
        );
        assert_eq!(
            parse_range_groups("1-5, 8", 10).unwrap(),
            vec![vec![1, 2, 3, 4, 5], vec![8]]
        );
    }

    #[test]
    fn test_parse_range_groups_empty() {
        assert_eq!(parse_range_groups("", 10), Err(ParseError::Empty));
    }

    #[test]
    fn test_dedup_pages_is_stable() {
        assert_eq!(dedup_pages(&[5, 1, 5, 3, 1]), vec![5, 1, 3]);
        assert_eq!(dedup_pages(&[]), Vec::<u32>::new());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_is_deterministic(spec in "[0-9, -]{0,24}", page_count in 1u32..50) {
                let a = parse_page_spec(&spec, page_count);
                let b = parse_page_spec(&spec, page_count);
                prop_assert_eq!(a, b);
            }

            #[test]
            fn parsed_pages_are_in_bounds(
                pages in proptest::collection::vec(1u32..=20, 1..8)
            ) {
                let spec = pages
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                let parsed = parse_page_spec(&spec, 20).unwrap();
                prop_assert_eq!(parsed, pages);
            }

            #[test]
            fn dedup_never_grows(pages in proptest::collection::vec(1u32..=20, 0..16)) {
                let deduped = dedup_pages(&pages);
                prop_assert!(deduped.len() <= pages.len());
            }
        }
    }
}
