use scraper::{ElementRef, Html, Selector};

use crate::{ScraperError, ScraperResult};

pub(crate) fn selector(css: &str) -> ScraperResult<Selector> {
    Selector::parse(css)
        .map_err(|e| ScraperError::ExtractionError(format!("invalid selector {:?}: {}", css, e)))
}

/// Concatenated direct text children of `element`, trimmed. Blank is `None`.
pub(crate) fn own_text(element: ElementRef) -> Option<String> {
    let text = element
        .children()
        .filter_map(|node| node.value().as_text())
        .fold(String::new(), |mut acc, text| {
            acc.push_str(&text.text);
            acc
        });
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Own text of the first matching element that has any.
pub(crate) fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).find_map(own_text)
}

/// Every descendant text node of `element`, trimmed, blanks dropped.
pub(crate) fn text_nodes(element: ElementRef) -> Vec<String> {
    element
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_text_skips_nested_elements() {
        let document = Html::parse_fragment(r#"<div class="v"> Version <span>ignored</span> 1.0 </div>"#);
        let sel = selector("div.v").unwrap();
        assert_eq!(first_text(&document, &sel), Some("Version  1.0".to_string()));
    }

    #[test]
    fn test_blank_text_is_absent() {
        let document = Html::parse_fragment(r#"<div class="v">   <b>bold</b></div>"#);
        let sel = selector("div.v").unwrap();
        assert_eq!(first_text(&document, &sel), None);
    }

    #[test]
    fn test_text_nodes_are_trimmed() {
        let document = Html::parse_fragment("<table><tr><td> EA7500 <br> EA7500v2 </td></tr></table>");
        let sel = selector("td").unwrap();
        let cell = document.select(&sel).next().unwrap();
        assert_eq!(text_nodes(cell), vec!["EA7500", "EA7500v2"]);
    }

    #[test]
    fn test_invalid_selector_is_an_extraction_error() {
        assert!(matches!(
            selector("div[[["),
            Err(ScraperError::ExtractionError(_))
        ));
    }
}
