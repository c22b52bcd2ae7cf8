//! HTML metric extraction
//!
//! Everything here is a pure function of the page markup and URL.

use crate::url::{is_same_site, resolve_and_normalize};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

/// Elements whose text is never visible page copy
const NON_CONTENT_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Vowels for the syllable estimate; `y` counts as one
const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u', 'y'];

/// Heading counts for one page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Headings {
    pub h1: usize,
    pub h2: usize,
    pub h3: usize,
    pub h4: usize,
    pub h5: usize,
    pub h6: usize,

    /// Text of every H1, in document order
    pub h1_text: Vec<String>,
}

/// Internal/external link counts for one page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCounts {
    pub internal: usize,
    pub external: usize,
}

impl LinkCounts {
    /// Share of links pointing at the audited site, 0.0 when there are none
    pub fn internal_ratio(&self) -> f64 {
        let total = self.internal + self.external;
        if total == 0 {
            0.0
        } else {
            self.internal as f64 / total as f64
        }
    }
}

/// Technical and content signals beyond the headline page fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    pub canonical: Option<String>,
    pub has_viewport: bool,
    pub lang: Option<String>,
    pub images: usize,
    pub images_missing_alt: usize,
    pub has_open_graph: bool,

    /// At least one `twitter:*` meta tag
    pub has_twitter_card: bool,

    pub has_structured_data: bool,

    /// Occurrences of the target keyword phrase in the visible text
    pub keyword_count: usize,

    /// Keyword words as a percentage of all words
    pub keyword_density: f64,

    /// Visible text length as a percentage of the markup length
    pub text_html_ratio: f64,

    /// Share of links pointing at the audited site, 0.0 to 1.0
    pub internal_link_ratio: f64,

    /// Size of the markup in bytes
    pub page_size: usize,

    /// Flesch reading ease of the visible text, clamped to 0-100
    pub readability: f64,
}

/// Everything extracted from one page's markup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub word_count: usize,
    pub headings: Headings,
    pub links: LinkCounts,
    pub metrics: PageMetrics,
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .next()
        .map(|e| collapse_whitespace(&e.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn count(document: &Html, css: &str) -> usize {
    selector(css).map_or(0, |sel| document.select(&sel).count())
}

fn meta_content(document: &Html, name: &str) -> Option<String> {
    let sel = selector("meta[name][content]")?;
    document
        .select(&sel)
        .find(|e| {
            e.value()
                .attr("name")
                .map_or(false, |n| n.trim().eq_ignore_ascii_case(name))
        })
        .and_then(|e| e.value().attr("content"))
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
}

/// Whitespace-separated tokens of the body's visible text, as written
fn visible_tokens(document: &Html) -> Vec<String> {
    let Some(body) = selector("body").and_then(|sel| document.select(&sel).next()) else {
        return Vec::new();
    };

    let mut tokens = Vec::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map_or(false, |e| NON_CONTENT_ELEMENTS.contains(&e.name()))
        });
        if hidden {
            continue;
        }

        tokens.extend(text.split_whitespace().map(str::to_string));
    }
    tokens
}

/// Tokens lowercased and stripped of edge punctuation; punctuation-only tokens drop out
fn words_of(tokens: &[String]) -> Vec<String> {
    tokens
        .iter()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Vowel groups in a word, less a silent trailing `e`; at least 1
fn syllables(token: &str) -> usize {
    let word = token
        .trim_matches(|c: char| ".,!?\";:".contains(c))
        .to_lowercase();
    if word.is_empty() {
        return 0;
    }

    let mut count = 0;
    let mut prev_vowel = false;
    for c in word.chars() {
        let vowel = VOWELS.contains(&c);
        if vowel && !prev_vowel {
            count += 1;
        }
        prev_vowel = vowel;
    }

    if word.ends_with('e') && count > 1 {
        count -= 1;
    }
    count.max(1)
}

/// Runs of sentence-ending punctuation in a token
fn sentence_ends(token: &str) -> usize {
    let mut runs = 0;
    let mut in_run = false;
    for c in token.chars() {
        let end = matches!(c, '.' | '!' | '?');
        if end && !in_run {
            runs += 1;
        }
        in_run = end;
    }
    runs
}

/// Flesch reading ease over raw visible tokens
///
/// Long average word length (over 6 chars) costs 5 points and a high share
/// of words with three or more syllables (over 30%) costs 10. Empty text
/// scores 0.
fn readability(tokens: &[String]) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }

    let words = tokens.len() as f64;
    let sentences = tokens.iter().map(|t| sentence_ends(t)).sum::<usize>().max(1) as f64;
    let syllable_counts: Vec<usize> = tokens.iter().map(|t| syllables(t)).collect();
    let total_syllables = syllable_counts.iter().sum::<usize>() as f64;

    let mut score = 206.835 - 1.015 * (words / sentences) - 84.6 * (total_syllables / words);

    let average_length = tokens.iter().map(|t| t.chars().count()).sum::<usize>() as f64 / words;
    if average_length > 6.0 {
        score -= 5.0;
    }
    let complex = syllable_counts.iter().filter(|&&n| n > 2).count() as f64;
    if complex / words > 0.3 {
        score -= 10.0;
    }

    round2(score.clamp(0.0, 100.0))
}

fn link_counts(document: &Html, page_url: &Url) -> LinkCounts {
    let mut counts = LinkCounts::default();
    let Some(sel) = selector("a[href]") else {
        return counts;
    };

    for href in document.select(&sel).filter_map(|e| e.value().attr("href")) {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let Some(target) = resolve_and_normalize(page_url, href) else {
            continue;
        };
        if is_same_site(page_url, &target) {
            counts.internal += 1;
        } else {
            counts.external += 1;
        }
    }
    counts
}

fn headings(document: &Html) -> Headings {
    let h1_text = selector("h1").map_or_else(Vec::new, |sel| {
        document
            .select(&sel)
            .map(|e: ElementRef<'_>| collapse_whitespace(&e.text().collect::<String>()))
            .collect()
    });

    Headings {
        h1: h1_text.len(),
        h2: count(document, "h2"),
        h3: count(document, "h3"),
        h4: count(document, "h4"),
        h5: count(document, "h5"),
        h6: count(document, "h6"),
        h1_text,
    }
}

/// Counts non-overlapping occurrences of `phrase` in `words`
fn phrase_occurrences(words: &[String], phrase: &[String]) -> usize {
    if phrase.is_empty() || words.len() < phrase.len() {
        return 0;
    }

    let mut found = 0;
    let mut i = 0;
    while i + phrase.len() <= words.len() {
        if words[i..i + phrase.len()] == *phrase {
            found += 1;
            i += phrase.len();
        } else {
            i += 1;
        }
    }
    found
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Extracts headline fields and metrics from an HTML page
///
/// # Arguments
///
/// * `html` - The page markup
/// * `page_url` - The URL the page was served from
/// * `keyword` - Optional target keyword for density metrics
pub fn extract(html: &str, page_url: &Url, keyword: Option<&str>) -> Extraction {
    let document = Html::parse_document(html);
    let tokens = visible_tokens(&document);
    let words = words_of(&tokens);

    let (keyword_count, keyword_density) = match keyword {
        Some(k) => {
            let phrase: Vec<String> = k.split_whitespace().map(str::to_lowercase).collect();
            let occurrences = phrase_occurrences(&words, &phrase);
            let density = if words.is_empty() {
                0.0
            } else {
                round2(occurrences as f64 * phrase.len() as f64 / words.len() as f64 * 100.0)
            };
            (occurrences, density)
        }
        None => (0, 0.0),
    };

    let text_len: usize = words.iter().map(|w| w.chars().count()).sum::<usize>()
        + words.len().saturating_sub(1);
    let text_html_ratio = if html.is_empty() {
        0.0
    } else {
        round2(text_len as f64 / html.len() as f64 * 100.0)
    };

    let (images, images_missing_alt) = selector("img").map_or((0, 0), |sel| {
        let mut total = 0;
        let mut missing = 0;
        for img in document.select(&sel) {
            total += 1;
            if img.value().attr("alt").map_or(true, |alt| alt.trim().is_empty()) {
                missing += 1;
            }
        }
        (total, missing)
    });

    let canonical = selector("link[rel='canonical'][href]")
        .and_then(|sel| document.select(&sel).next())
        .and_then(|e| e.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty());

    let lang = selector("html[lang]")
        .and_then(|sel| document.select(&sel).next())
        .and_then(|e| e.value().attr("lang"))
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());

    let has_structured_data = selector("script[type='application/ld+json']").map_or(false, |sel| {
        document
            .select(&sel)
            .any(|e| !e.text().collect::<String>().trim().is_empty())
    });

    let links = link_counts(&document, page_url);

    Extraction {
        title: first_text(&document, "title"),
        meta_description: meta_content(&document, "description"),
        word_count: words.len(),
        headings: headings(&document),
        links,
        metrics: PageMetrics {
            canonical,
            has_viewport: meta_content(&document, "viewport").is_some(),
            lang,
            images,
            images_missing_alt,
            has_open_graph: count(&document, "meta[property^='og:']") > 0,
            has_twitter_card: count(&document, "meta[name^='twitter:']") > 0,
            has_structured_data,
            keyword_count,
            keyword_density,
            text_html_ratio,
            internal_link_ratio: round2(links.internal_ratio()),
            page_size: html.len(),
            readability: readability(&tokens),
        },
    }
}
