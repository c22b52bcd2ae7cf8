//! Sitemap parsing
//!
//! Handles `<urlset>` documents, `<sitemapindex>` documents and plain-text
//! sitemaps (one URL per line).

use quick_xml::events::Event;
use quick_xml::Reader;

/// A parsed sitemap document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// Page URLs from a `<urlset>` or a text sitemap
    UrlSet(Vec<String>),

    /// Nested sitemap URLs from a `<sitemapindex>`
    Index(Vec<String>),
}

impl SitemapDocument {
    pub fn urls(&self) -> &[String] {
        match self {
            Self::UrlSet(urls) | Self::Index(urls) => urls,
        }
    }
}

/// Parses sitemap content
///
/// Content that does not start with `<` is treated as a text sitemap and
/// only lines holding an absolute HTTP(S) URL are kept.
///
/// # Returns
///
/// * `Ok(SitemapDocument)` - The `<loc>` entries in document order
/// * `Err(quick_xml::Error)` - The XML is malformed
pub fn parse_sitemap(content: &str) -> Result<SitemapDocument, quick_xml::Error> {
    let trimmed = content.trim_start_matches('\u{feff}').trim();
    if !trimmed.starts_with('<') {
        return Ok(SitemapDocument::UrlSet(parse_text_sitemap(trimmed)));
    }

    let mut reader = Reader::from_str(trimmed);
    reader.trim_text(true);

    let mut is_index = false;
    let mut in_loc = false;
    let mut loc = String::new();
    let mut locs = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"sitemapindex" => is_index = true,
                b"loc" => {
                    in_loc = true;
                    loc.clear();
                }
                _ => {}
            },
            Event::Text(e) if in_loc => loc.push_str(&e.unescape()?),
            Event::CData(e) if in_loc => loc.push_str(&String::from_utf8_lossy(&e)),
            Event::End(e) if e.local_name().as_ref() == b"loc" => {
                in_loc = false;
                let value = loc.trim();
                if !value.is_empty() {
                    locs.push(value.to_string());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if is_index {
        Ok(SitemapDocument::Index(locs))
    } else {
        Ok(SitemapDocument::UrlSet(locs))
    }
}

fn parse_text_sitemap(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("http://") || line.starts_with("https://"))
        .map(str::to_string)
        .collect()
}
