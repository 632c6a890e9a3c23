use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node};
use unicode_normalization::UnicodeNormalization;

/// Elements whose text never reaches the flattened output.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "head", "title", "ix:header"];

static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

static TOC_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:part\s+[ivx]+\s*[.,:\-–—]?\s*)?item\s+\d+[a-z]?\b\s*[.:\-–—]?\s*(?P<title>.*?)\s+\d{1,3}$",
    )
    .unwrap()
});

/// Lowercase words allowed inside a title-cased heading.
const TITLE_CONNECTORS: &[&str] = &[
    "a", "about", "an", "and", "for", "in", "of", "on", "or", "the", "to", "with",
];

static TOC_TITLE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(table\s+of\s+contents|index)\.?$").unwrap());

static DOT_LEADER_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{4,}\s*\d{1,4}$").unwrap());

static PAGE_NUMBER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(page\s+)?[-–—]?\s*\d{1,4}\s*[-–—]?$").unwrap());

/// Decodes leftover entities, applies NFKC and folds typographic apostrophes.
pub fn normalize_text(text: &str) -> String {
    let decoded = decode_html_entities(text);
    decoded
        .nfkc()
        .map(|c| match c {
            '\u{2019}' | '\u{2018}' => '\'',
            other => other,
        })
        .collect()
}

/// Flattens filing markup to plain text, one non-empty text run per line.
pub fn flatten_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let document = Html::parse_document(html);

    let mut lines: Vec<String> = Vec::new();
    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| match ancestor.value() {
            Node::Element(element) => SKIPPED_ELEMENTS.contains(&element.name()),
            _ => false,
        });
        if hidden {
            continue;
        }
        for line in text.lines() {
            let line = normalize_text(line.trim());
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
    }
    lines.join("\n")
}

pub fn collapse_blank_lines(text: &str) -> String {
    BLANK_RUNS.replace_all(text, "\n\n").into_owned()
}

fn is_heading_title(title: &str) -> bool {
    title.split_whitespace().all(|word| {
        let Some(first) = word.chars().find(|c| c.is_alphabetic()) else {
            return true;
        };
        first.is_uppercase() || TITLE_CONNECTORS.contains(&word.to_lowercase().as_str())
    })
}

/// "Item N. Title 12" with a title-cased heading and a page number, never prose.
fn is_item_page_line(line: &str) -> bool {
    TOC_LINE
        .captures(line)
        .and_then(|caps| caps.name("title"))
        .map_or(false, |title| is_heading_title(title.as_str()))
}

fn is_toc_line(line: &str) -> bool {
    TOC_TITLE_LINE.is_match(line) || is_item_page_line(line) || DOT_LEADER_LINE.is_match(line)
}

fn is_page_number_line(line: &str) -> bool {
    PAGE_NUMBER_LINE.is_match(line)
}

fn is_symbol_line(line: &str) -> bool {
    !line.chars().any(char::is_alphanumeric)
}

fn is_single_char_line(line: &str) -> bool {
    line.chars().count() == 1
}

/// Drops layout noise from an extracted section.
///
/// Removes table-of-contents lines, page numbers, lines without any letter or
/// digit, single-character lines and a line repeating the previous kept line.
/// Blank lines survive so paragraphs stay apart, then runs are collapsed.
pub fn clean_section_text(section: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut previous: Option<&str> = None;

    for raw in section.lines() {
        let line = raw.trim();
        if line.is_empty() {
            kept.push("");
            continue;
        }
        if is_toc_line(line)
            || is_page_number_line(line)
            || is_symbol_line(line)
            || is_single_char_line(line)
            || previous == Some(line)
        {
            continue;
        }
        kept.push(line);
        previous = Some(line);
    }

    collapse_blank_lines(&kept.join("\n")).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_html_skips_hidden_content() {
        let html = r#"<html><head><title>10-K</title><style>p { color: red; }</style></head>
            <body><script>var x = 1;</script>
            <div><p>Item 7. Management&#8217;s Discussion</p><p>Revenue grew&nbsp;20%.</p></div>
            </body></html>"#;
        let text = flatten_html(html);
        assert_eq!(text, "Item 7. Management's Discussion\nRevenue grew 20%.");
    }

    #[test]
    fn test_flatten_html_skips_inline_xbrl_header() {
        let html = "<body><ix:header><ix:hidden>dei:Hidden</ix:hidden></ix:header><p>Visible</p></body>";
        assert_eq!(flatten_html(html), "Visible");
    }

    #[test]
    fn test_flatten_empty() {
        assert_eq!(flatten_html(""), "");
        assert_eq!(flatten_html("   "), "");
    }

    #[test]
    fn test_normalize_text_folds_apostrophes_and_entities() {
        assert_eq!(normalize_text("Management\u{2019}s &amp; Co"), "Management's & Co");
        assert_eq!(normalize_text("\u{FB01}nance"), "finance");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\nb\n\nc"), "a\n\nb\n\nc");
    }

    #[test]
    fn test_item_lines_ending_in_numbers_are_kept_when_prose() {
        let section = "Item 7. Management's Discussion and Analysis\n\
                       Item 1A of our Annual Report describes risks identified in 2023\n\
                       Item 2 lists the properties we acquired in 12\n\
                       Revenue grew.";
        let cleaned = clean_section_text(section);
        assert_eq!(cleaned, section);

        assert!(is_toc_line("Item 2. Properties 18"));
        assert!(is_toc_line("PART II, Item 7. Management's Discussion and Analysis of Financial Condition 31"));
        assert!(!is_toc_line("Item 1A of our Annual Report describes risks identified in 2023"));
    }

    #[test]
    fn test_clean_section_text_drops_noise() {
        let section = "Item 7. Management's Discussion and Analysis\n\
                       Item 7A. Quantitative and Qualitative Disclosures 45\n\
                       Table of Contents\n\
                       Overview\n\
                       Overview\n\
                       \n\
                       \n\
                       \n\
                       Revenue increased.\n\
                       42\n\
                       Page 43\n\
                       * * *\n\
                       x\n\
                       Results of Operations ........ 27\n\
                       Costs decreased.";
        let cleaned = clean_section_text(section);
        assert_eq!(
            cleaned,
            "Item 7. Management's Discussion and Analysis\nOverview\n\nRevenue increased.\nCosts decreased."
        );
    }
}
