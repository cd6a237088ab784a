//! Account summary screen scraping.
//!
//! The landing page renders each account as three marked lines:
//!
//! ```text
//! <tr class="acctRow"><td>Orange Savings</td></tr>
//! <tr class="acctRow"><td>12345678</td><td>Rainy Day Fund</td><td>$1,234.56</td></tr>
//! <tr class="acctRow"><td>Available</td><td>$1,200.00</td></tr>
//! ```
//!
//! The scraper only isolates and cleans those lines; turning them into
//! accounts is the catalog's job.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{DecodeError, Result};

#[allow(clippy::expect_used)]
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag regex is valid"));

#[allow(clippy::expect_used)]
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

/// One account's three summary lines, markup removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    /// Account type label.
    pub label: String,
    /// Account number, nickname and ledger balance.
    pub detail: String,
    /// Available balance line.
    pub available: String,
}

/// Extracts account rows from the summary page.
#[derive(Debug, Clone)]
pub struct HtmlScreenScraper {
    row_marker: String,
}

impl HtmlScreenScraper {
    /// Creates a scraper for lines containing `row_marker`.
    #[must_use]
    pub fn new(row_marker: impl Into<String>) -> Self {
        Self {
            row_marker: row_marker.into(),
        }
    }

    /// Returns the marked lines as rows, in page order.
    ///
    /// A page with no marked lines yields no rows.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::IncompleteAccountRow`] if the marked lines don't
    /// group into triples.
    pub fn extract_rows(&self, html: &str) -> Result<Vec<SummaryRow>> {
        let lines: Vec<String> = html
            .lines()
            .filter(|line| line.contains(&self.row_marker))
            .map(strip_markup)
            .filter(|line| !line.is_empty())
            .collect();

        if lines.len() % 3 != 0 {
            return Err(DecodeError::IncompleteAccountRow { lines: lines.len() }.into());
        }

        Ok(lines
            .chunks_exact(3)
            .map(|triple| SummaryRow {
                label: triple[0].clone(),
                detail: triple[1].clone(),
                available: triple[2].clone(),
            })
            .collect())
    }
}

/// Removes tags, decodes the common entities and collapses whitespace.
#[must_use]
pub fn strip_markup(line: &str) -> String {
    let text = TAG.replace_all(line, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&#36;", "$")
        .replace("&amp;", "&");
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::error::Error;

    const PAGE: &str = r#"<html><body>
<table id="summary">
<tr class="acctRow"><td class="type">Orange Savings</td></tr>
<tr class="acctRow"><td>12345678</td><td>Rainy&nbsp;Day Fund</td><td>$1,234.56</td></tr>
<tr class="acctRow"><td>Available</td><td>$1,200.00</td></tr>
<tr class="other"><td>Not an account</td></tr>
<tr class="acctRow"><td class="type">Electric Orange</td></tr>
<tr class="acctRow"><td>87654321</td><td>Bills</td><td>$50.00</td></tr>
<tr class="acctRow"><td>Available</td><td>$45.00</td></tr>
</table></body></html>"#;

    #[test]
    fn test_extract_rows() {
        let rows = HtmlScreenScraper::new("acctRow").extract_rows(PAGE).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            SummaryRow {
                label: "Orange Savings".into(),
                detail: "12345678 Rainy Day Fund $1,234.56".into(),
                available: "Available $1,200.00".into(),
            }
        );
        assert_eq!(rows[1].label, "Electric Orange");
    }

    #[test]
    fn test_no_rows_is_empty() {
        let rows = HtmlScreenScraper::new("acctRow")
            .extract_rows("<html><body>Welcome</body></html>")
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_incomplete_triple() {
        let page = "<tr class=\"acctRow\"><td>Orange Savings</td></tr>\n<tr class=\"acctRow\"><td>1 x $1</td></tr>";
        let err = HtmlScreenScraper::new("acctRow").extract_rows(page).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode(DecodeError::IncompleteAccountRow { lines: 2 })
        ));
    }

    #[test]
    fn test_marked_lines_without_text_are_ignored() {
        let page = format!("<tr class=\"acctRow\"></tr>\n{PAGE}");
        let rows = HtmlScreenScraper::new("acctRow").extract_rows(&page).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(
            strip_markup("  <td>A&amp;B</td>\t<td> &#36;5 </td> "),
            "A&B $5"
        );
    }
}
