use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::collections::{BTreeSet, HashSet};

use super::text::{clean_section_text, collapse_blank_lines, flatten_html};
use super::types::{Candidate, CandidateStatus, NarrativeSection};
use crate::core::config::{HeadingPatterns, NarrativeConfig};
use crate::edgar::report::FormType;

static ITEM_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t]*item[ \t]+(\d+[a-z]?)\b").unwrap());

static NUMERIC_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*\d{1,4}[ \t]*$").unwrap());

/// Heading patterns of one form type, compiled case-insensitive.
#[derive(Debug)]
pub struct CompiledPatterns {
    pub start: Vec<Regex>,
    pub end: Vec<Regex>,
    pub structural_marker: Option<Regex>,
    pub cutoff_marker: Option<Regex>,
}

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| anyhow!("Invalid heading pattern {:?}: {}", pattern, e))
}

impl CompiledPatterns {
    pub fn compile(patterns: &HeadingPatterns) -> Result<Self> {
        Ok(Self {
            start: patterns.start.iter().map(|p| compile(p)).collect::<Result<_>>()?,
            end: patterns.end.iter().map(|p| compile(p)).collect::<Result<_>>()?,
            structural_marker: patterns.structural_marker.as_deref().map(compile).transpose()?,
            cutoff_marker: patterns.cutoff_marker.as_deref().map(compile).transpose()?,
        })
    }
}

/// True when only whitespace precedes `pos` on its line.
pub fn is_line_start(text: &str, pos: usize) -> bool {
    let line_begin = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    text[line_begin..pos].trim().is_empty()
}

/// Sorted, distinct line-start match positions of any of `patterns`.
pub fn line_start_matches(text: &str, patterns: &[Regex]) -> Vec<usize> {
    let positions: BTreeSet<usize> = patterns
        .iter()
        .flat_map(|pattern| pattern.find_iter(text).map(|m| m.start()))
        .filter(|&pos| is_line_start(text, pos))
        .collect();
    positions.into_iter().collect()
}

pub fn heading_starts(text: &str, patterns: &CompiledPatterns) -> Vec<usize> {
    line_start_matches(text, &patterns.start)
}

/// Keeps only starts after the marker, unless that would leave nothing.
pub fn bias_after_marker(starts: Vec<usize>, marker: Option<usize>) -> Vec<usize> {
    let Some(marker) = marker else {
        return starts;
    };
    let after: Vec<usize> = starts.iter().copied().filter(|&s| s > marker).collect();
    if after.is_empty() {
        starts
    } else {
        after
    }
}

/// Keeps only starts before the cutoff, unless that would leave nothing.
pub fn bias_before_cutoff(starts: Vec<usize>, cutoff: Option<usize>) -> Vec<usize> {
    let Some(cutoff) = cutoff else {
        return starts;
    };
    let before: Vec<usize> = starts.iter().copied().filter(|&s| s < cutoff).collect();
    if before.is_empty() {
        starts
    } else {
        before
    }
}

/// First end marker at least `min_gap` past `start`, else the end of the text.
pub fn candidate_end(start: usize, end_markers: &[usize], min_gap: usize, text_len: usize) -> usize {
    let threshold = start.saturating_add(min_gap);
    end_markers
        .iter()
        .copied()
        .find(|&pos| pos >= threshold)
        .unwrap_or(text_len)
}

/// Two or more distinct line-start "Item N" headings, plus either a next-section
/// heading or a bare page-number line.
pub fn is_table_of_contents(window: &str, end_patterns: &[Regex]) -> bool {
    let items: HashSet<String> = ITEM_HEADING
        .captures_iter(window)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_ascii_uppercase()))
        .collect();
    if items.len() < 2 {
        return false;
    }
    !line_start_matches(window, end_patterns).is_empty() || NUMERIC_LINE.is_match(window)
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut index = index;
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

pub fn classify(
    text: &str,
    start: usize,
    end: usize,
    patterns: &CompiledPatterns,
    config: &NarrativeConfig,
) -> Candidate {
    let window_end = floor_char_boundary(text, start.saturating_add(config.toc_window_chars));
    let window = &text[start..window_end];
    let status = if is_table_of_contents(window, &patterns.end) {
        CandidateStatus::TableOfContents
    } else if end.saturating_sub(start) >= config.min_content_chars {
        CandidateStatus::Accepted
    } else {
        CandidateStatus::BelowThreshold
    };
    Candidate { start, end, status }
}

pub fn build_candidates(
    text: &str,
    patterns: &CompiledPatterns,
    config: &NarrativeConfig,
) -> Vec<Candidate> {
    let starts = heading_starts(text, patterns);
    if starts.is_empty() {
        return Vec::new();
    }
    let marker = patterns
        .structural_marker
        .as_ref()
        .and_then(|marker| line_start_matches(text, std::slice::from_ref(marker)).first().copied());
    let cutoff = patterns
        .cutoff_marker
        .as_ref()
        .and_then(|cutoff| line_start_matches(text, std::slice::from_ref(cutoff)).last().copied());
    let starts = bias_before_cutoff(bias_after_marker(starts, marker), cutoff);

    let end_markers = line_start_matches(text, &patterns.end);
    starts
        .into_iter()
        .map(|start| {
            let end = candidate_end(start, &end_markers, config.min_chars_before_end_marker, text.len());
            classify(text, start, end, patterns, config)
        })
        .collect()
}

fn longest<'a, I>(candidates: I) -> Option<Candidate>
where
    I: Iterator<Item = &'a Candidate>,
{
    // Ties go to the earliest start.
    candidates
        .fold(None, |best: Option<&Candidate>, c| match best {
            Some(b) if b.len() >= c.len() => Some(b),
            _ => Some(c),
        })
        .copied()
}

/// Longest accepted candidate, else the longest one not rejected as a table of
/// contents, else the longest of all.
pub fn select_candidate(candidates: &[Candidate]) -> Option<Candidate> {
    longest(candidates.iter().filter(|c| c.status == CandidateStatus::Accepted))
        .or_else(|| {
            longest(
                candidates
                    .iter()
                    .filter(|c| c.status != CandidateStatus::TableOfContents),
            )
        })
        .or_else(|| longest(candidates.iter()))
}

pub fn try_extract_section(
    text: &str,
    form: &FormType,
    config: &NarrativeConfig,
) -> Result<Option<NarrativeSection>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let patterns = CompiledPatterns::compile(config.patterns_for(form))?;
    let candidates = build_candidates(text, &patterns, config);
    log::debug!("{} {} heading candidates", candidates.len(), form);

    let Some(selected) = select_candidate(&candidates) else {
        return Ok(None);
    };
    if selected.status != CandidateStatus::Accepted {
        log::debug!(
            "No accepted {} section, using {:?} candidate at {}",
            form,
            selected.status,
            selected.start
        );
    }

    let raw = text
        .get(selected.start..selected.end)
        .ok_or_else(|| anyhow!("Section bounds {}..{} out of range", selected.start, selected.end))?;
    let raw_text = collapse_blank_lines(raw).trim().to_string();
    let cleaned_text = clean_section_text(&raw_text);

    Ok(Some(NarrativeSection {
        form_type: form.clone(),
        start_offset: selected.start,
        end_offset: selected.end,
        raw_text,
        cleaned_text,
    }))
}

/// Like [`try_extract_section`], with failures logged and reported as `None`.
pub fn extract_section(
    text: &str,
    form: &FormType,
    config: &NarrativeConfig,
) -> Option<NarrativeSection> {
    match try_extract_section(text, form, config) {
        Ok(section) => section,
        Err(e) => {
            log::warn!("Failed to extract {} section: {}", form, e);
            None
        }
    }
}

/// Cleaned MD&A text from flattened filing text; empty when nothing is found.
pub fn extract_mdna(text: &str, form: &str, config: &NarrativeConfig) -> String {
    if form.trim().is_empty() {
        return String::new();
    }
    let form: FormType = match form.parse() {
        Ok(form) => form,
        Err(e) => {
            log::warn!("Unrecognised form type {}: {}", form, e);
            return String::new();
        }
    };
    extract_section(text, &form, config)
        .map(|section| section.cleaned_text)
        .unwrap_or_default()
}

pub fn extract_mdna_from_html(html: &str, form: &str, config: &NarrativeConfig) -> String {
    if html.trim().is_empty() || form.trim().is_empty() {
        return String::new();
    }
    extract_mdna(&flatten_html(html), form, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annual() -> CompiledPatterns {
        CompiledPatterns::compile(&HeadingPatterns::annual_report()).unwrap()
    }

    fn prose(chars: usize) -> String {
        let sentence = "Net sales increased due to higher demand across segments.\n";
        sentence.repeat(chars / sentence.len() + 1)
    }

    #[test]
    fn test_heading_starts_require_line_start() {
        let text = "See Item 7 for details.\n  Item 7. Management's Discussion and Analysis\nbody";
        let starts = heading_starts(text, &annual());
        assert_eq!(starts, vec![26]);
    }

    #[test]
    fn test_bias_after_marker() {
        assert_eq!(bias_after_marker(vec![10, 50, 90], Some(40)), vec![50, 90]);
        assert_eq!(bias_after_marker(vec![10, 20], Some(40)), vec![10, 20]);
        assert_eq!(bias_after_marker(vec![10], None), vec![10]);
    }

    #[test]
    fn test_bias_before_cutoff() {
        assert_eq!(bias_before_cutoff(vec![10, 50, 90], Some(60)), vec![10, 50]);
        assert_eq!(bias_before_cutoff(vec![70, 90], Some(60)), vec![70, 90]);
        assert_eq!(bias_before_cutoff(vec![10], None), vec![10]);
    }

    #[test]
    fn test_quarterly_candidates_stop_at_last_part_two() {
        let patterns =
            CompiledPatterns::compile(&HeadingPatterns::quarterly_report()).unwrap();
        let text = format!(
            "PART II. Other Information\nItem 2. Management's Discussion and Analysis\n{}PART II. OTHER INFORMATION\nItem 2. Unregistered Sales of Equity Securities\n{}",
            prose(2500),
            prose(5000)
        );
        let candidates = build_candidates(&text, &patterns, &NarrativeConfig::default());
        assert_eq!(candidates.len(), 1);
        assert!(text[candidates[0].start..].starts_with("Item 2. Management's"));
    }

    #[test]
    fn test_candidate_end_respects_gap() {
        assert_eq!(candidate_end(100, &[150, 950, 2000], 800, 5000), 950);
        assert_eq!(candidate_end(100, &[150], 800, 5000), 5000);
    }

    #[test]
    fn test_table_of_contents_detection() {
        let patterns = annual();
        let toc = "Item 7. Management's Discussion and Analysis\nItem 7A. Market Risk\nItem 8. Financial Statements\n";
        assert!(is_table_of_contents(toc, &patterns.end));
        let numbered = "Item 6. Reserved\n31\nItem 7. Management's Discussion\n32\n";
        assert!(is_table_of_contents(numbered, &patterns.end));
        let body = "Item 7. Management's Discussion and Analysis\nWe design and sell products.\n";
        assert!(!is_table_of_contents(body, &patterns.end));
    }

    #[test]
    fn test_select_candidate_fallbacks() {
        let toc = Candidate { start: 0, end: 9000, status: CandidateStatus::TableOfContents };
        let short = Candidate { start: 9000, end: 9500, status: CandidateStatus::BelowThreshold };
        let body = Candidate { start: 9500, end: 12500, status: CandidateStatus::Accepted };

        assert_eq!(select_candidate(&[toc, short, body]), Some(body));
        assert_eq!(select_candidate(&[toc, short]), Some(short));
        assert_eq!(select_candidate(&[toc]), Some(toc));
        assert_eq!(select_candidate(&[]), None);
    }

    #[test]
    fn test_select_candidate_tie_prefers_earliest() {
        let first = Candidate { start: 0, end: 3000, status: CandidateStatus::Accepted };
        let second = Candidate { start: 5000, end: 8000, status: CandidateStatus::Accepted };
        assert_eq!(select_candidate(&[first, second]), Some(first));
    }

    #[test]
    fn test_structural_marker_skips_earlier_candidates() {
        let text = format!(
            "Item 7. Management's Discussion and Analysis\n{}PART II\nItem 7. Management's Discussion and Analysis\n{}Item 8. Financial Statements\n",
            prose(2500),
            prose(2500)
        );
        let config = NarrativeConfig::default();
        let candidates = build_candidates(&text, &annual(), &config);
        assert_eq!(candidates.len(), 1);
        assert!(text[candidates[0].start..].starts_with("Item 7."));
        assert!(candidates[0].start > text.find("PART II").unwrap());
    }

    #[test]
    fn test_no_heading_is_empty() {
        let config = NarrativeConfig::default();
        assert_eq!(extract_mdna("Nothing relevant here.", "10-K", &config), "");
        assert_eq!(extract_mdna("", "10-K", &config), "");
        assert_eq!(extract_mdna("Item 7. Management's Discussion", "", &config), "");
    }

    #[test]
    fn test_invalid_pattern_degrades_to_empty() {
        let mut config = NarrativeConfig::default();
        config.annual_report.start = vec!["(unclosed".to_string()];
        let form = FormType::Form10K;
        assert!(try_extract_section("Item 7\nbody", &form, &config).is_err());
        assert!(extract_section("Item 7\nbody", &form, &config).is_none());
    }

    #[test]
    fn test_short_document_falls_back_to_longest() {
        let config = NarrativeConfig::default();
        let text = "Item 2. Management's Discussion and Analysis\nRevenue was flat.\nItem 3. Market Risk\n";
        let section = extract_section(text, &FormType::Form10Q, &config).unwrap();
        assert_eq!(section.start_offset, 0);
        assert!(section.cleaned_text.starts_with("Item 2. Management's Discussion"));
    }
}
