//! On-page field extraction from raw HTML.
//!
//! The page arrives already fetched; extraction is regex scraping of the
//! handful of fields the audits need, not a DOM parse.

use std::collections::HashMap;

use regex::Regex;
use sitepulse_common::ExtractedPage;

/// Cap per heading level, matching what the payload reports.
const MAX_HEADINGS: usize = 10;

pub fn extract_page(html: &str) -> ExtractedPage {
    let meta = meta_attributes(html);

    ExtractedPage {
        title: extract_title(html),
        description: meta_content(&meta, "name", "description"),
        robots: meta_content(&meta, "name", "robots").to_lowercase(),
        canonical: extract_canonical(html),
        h1: extract_headings(html, "h1"),
        h2: extract_headings(html, "h2"),
        h3: extract_headings(html, "h3"),
        og_title: meta_content(&meta, "property", "og:title"),
        og_description: meta_content(&meta, "property", "og:description"),
        og_image: meta_content(&meta, "property", "og:image"),
        twitter_card: meta_content_any(&meta, "twitter:card"),
        twitter_title: meta_content_any(&meta, "twitter:title"),
        twitter_description: meta_content_any(&meta, "twitter:description"),
        twitter_image: meta_content_any(&meta, "twitter:image"),
        num_links: count_tag(html, "a"),
        num_images: count_tag(html, "img"),
    }
}

fn extract_title(html: &str) -> String {
    let re = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex");
    re.captures(html)
        .map(|c| clean_text(&c[1]))
        .unwrap_or_default()
}

fn extract_canonical(html: &str) -> String {
    let tag_re = Regex::new(r"(?is)<link\b[^>]*>").expect("valid regex");
    for tag in tag_re.find_iter(html) {
        let attrs = parse_attributes(tag.as_str());
        if attrs.get("rel").map(|r| r.eq_ignore_ascii_case("canonical")) == Some(true) {
            return attrs.get("href").cloned().unwrap_or_default();
        }
    }
    String::new()
}

fn extract_headings(html: &str, level: &str) -> Vec<String> {
    let re = Regex::new(&format!(r"(?is)<{level}\b[^>]*>(.*?)</{level}>")).expect("valid regex");
    re.captures_iter(html)
        .map(|c| clean_text(&c[1]))
        .filter(|h| !h.is_empty())
        .take(MAX_HEADINGS)
        .collect()
}

/// All meta tags, each as its parsed attribute map.
fn meta_attributes(html: &str) -> Vec<HashMap<String, String>> {
    let tag_re = Regex::new(r"(?is)<meta\b[^>]*>").expect("valid regex");
    tag_re
        .find_iter(html)
        .map(|tag| parse_attributes(tag.as_str()))
        .collect()
}

fn parse_attributes(tag: &str) -> HashMap<String, String> {
    let attr_re =
        Regex::new(r#"([a-zA-Z][a-zA-Z0-9:_-]*)\s*=\s*["']([^"']*)["']"#).expect("valid regex");
    attr_re
        .captures_iter(tag)
        .map(|c| (c[1].to_lowercase(), c[2].to_string()))
        .collect()
}

/// Content of the first meta tag whose `key_attr` equals `key` (case-insensitive).
fn meta_content(meta: &[HashMap<String, String>], key_attr: &str, key: &str) -> String {
    for attrs in meta {
        if attrs.get(key_attr).map(|v| v.eq_ignore_ascii_case(key)) == Some(true) {
            return decode_entities(attrs.get("content").cloned().unwrap_or_default().trim());
        }
    }
    String::new()
}

/// Twitter cards appear under both `name=` and `property=` in the wild.
fn meta_content_any(meta: &[HashMap<String, String>], key: &str) -> String {
    let by_name = meta_content(meta, "name", key);
    if !by_name.is_empty() {
        return by_name;
    }
    meta_content(meta, "property", key)
}

fn count_tag(html: &str, tag: &str) -> usize {
    let re = Regex::new(&format!(r"(?i)<{tag}\b")).expect("valid regex");
    re.find_iter(html).count()
}

/// Strip nested tags, decode common entities, collapse whitespace.
fn clean_text(fragment: &str) -> String {
    let no_tags = Regex::new(r"(?s)<[^>]+>")
        .expect("valid regex")
        .replace_all(fragment, " ");
    let decoded = decode_entities(&no_tags);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <html><head>
        <title> Acme &amp; Co — SEO Platform </title>
        <meta name="description" content="Audit your pages in minutes.">
        <meta name="robots" content="INDEX, FOLLOW">
        <meta property="og:title" content="Acme SEO">
        <meta property="og:image" content="https://acme.test/og.png">
        <meta name="twitter:card" content="summary_large_image">
        <meta name="twitter:title" content="Acme SEO Platform">
        <link rel="stylesheet" href="/app.css">
        <link rel="canonical" href="https://acme.test/">
        </head><body>
        <h1>Audit <em>everything</em></h1>
        <h2>Metadata</h2><h2>Performance</h2>
        <a href="/pricing">Pricing</a><a href="/docs">Docs</a>
        <img src="/hero.png">
        </body></html>
    "#;

    #[test]
    fn extracts_title_with_entities_and_whitespace() {
        let page = extract_page(SAMPLE);
        assert_eq!(page.title, "Acme & Co — SEO Platform");
    }

    #[test]
    fn extracts_meta_and_canonical() {
        let page = extract_page(SAMPLE);
        assert_eq!(page.description, "Audit your pages in minutes.");
        assert_eq!(page.robots, "index, follow");
        assert_eq!(page.canonical, "https://acme.test/");
    }

    #[test]
    fn extracts_social_fields_from_name_and_property() {
        let page = extract_page(SAMPLE);
        assert_eq!(page.og_title, "Acme SEO");
        assert_eq!(page.og_image, "https://acme.test/og.png");
        assert_eq!(page.twitter_card, "summary_large_image");
        assert_eq!(page.twitter_title, "Acme SEO Platform");
        assert_eq!(page.twitter_description, "");
    }

    #[test]
    fn extracts_headings_stripping_inner_tags() {
        let page = extract_page(SAMPLE);
        assert_eq!(page.h1, vec!["Audit everything"]);
        assert_eq!(page.h2, vec!["Metadata", "Performance"]);
        assert!(page.h3.is_empty());
    }

    #[test]
    fn counts_links_and_images() {
        let page = extract_page(SAMPLE);
        assert_eq!(page.num_links, 2);
        assert_eq!(page.num_images, 1);
    }

    #[test]
    fn missing_fields_are_empty_not_errors() {
        let page = extract_page("<html><body>no head</body></html>");
        assert!(page.title.is_empty());
        assert!(page.description.is_empty());
        assert!(page.canonical.is_empty());
        assert!(page.h1.is_empty());
    }
}
