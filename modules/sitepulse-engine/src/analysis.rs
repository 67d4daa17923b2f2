//! Section checks: metadata, social cards, performance, indexability.
//!
//! Simple field inspection producing traffic lights, suggestions, and the
//! 0–100 section scores that feed the payload's score block.

use regex::Regex;
use sitepulse_common::{
    CanonicalField, Category, Effort, ExtractedPage, FetchedPage, HeadingsTop, Impact,
    IndexabilityReport, LengthField, MetaReport, PerformanceReport, Priority, RelevanceBlock,
    ScoreBlock, SocialCard, SocialRelevanceBlock, SocialReport, Suggestion, TextField,
    TrafficLight,
};

// Overall score weights per section.
const SCORE_W_ONPAGE: f64 = 35.0;
const SCORE_W_INDEXABILITY: f64 = 25.0;
const SCORE_W_PERFORMANCE: f64 = 20.0;
const SCORE_W_SOCIAL: f64 = 20.0;

fn length_status(text: &str, good: (usize, usize), warn: (usize, usize)) -> TrafficLight {
    let n = text.trim().chars().count();
    if (good.0..=good.1).contains(&n) {
        TrafficLight::Green
    } else if (warn.0..=warn.1).contains(&n) {
        TrafficLight::Amber
    } else {
        TrafficLight::Red
    }
}

fn bool_status(ok: bool, warn: bool) -> TrafficLight {
    if ok {
        TrafficLight::Green
    } else if warn {
        TrafficLight::Amber
    } else {
        TrafficLight::Red
    }
}

fn is_absolute_url(u: &str) -> bool {
    let re = Regex::new(r"(?i)^https?://").expect("valid regex");
    re.is_match(u.trim())
}

fn light_value(light: TrafficLight) -> f64 {
    match light {
        TrafficLight::Green => 100.0,
        TrafficLight::Amber => 60.0,
        TrafficLight::Red => 20.0,
    }
}

fn lights_score(lights: &[TrafficLight]) -> u32 {
    if lights.is_empty() {
        return 0;
    }
    (lights.iter().map(|l| light_value(*l)).sum::<f64>() / lights.len() as f64).round() as u32
}

/// Metadata check: title/description lengths, robots directives, canonical.
pub fn meta_report(page: &ExtractedPage, relevance: RelevanceBlock) -> MetaReport {
    let title_status = length_status(&page.title, (30, 60), (20, 70));
    let desc_status = length_status(&page.description, (70, 160), (50, 180));

    let robots_flags: Vec<&str> = page
        .robots
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();
    let robots_ok = robots_flags.is_empty()
        || ((robots_flags.contains(&"index") || robots_flags.contains(&"all"))
            && !robots_flags.contains(&"nofollow"));
    let robots_status = bool_status(robots_ok, false);

    let canonical_abs = is_absolute_url(&page.canonical);
    let canonical_status = bool_status(canonical_abs, !page.canonical.is_empty());

    let mut suggestions = Vec::new();
    if title_status != TrafficLight::Green {
        suggestions.push(
            Suggestion::new(
                Priority::High,
                Category::OnPage,
                "Optimize <title> to 30-60 characters, including the brand and primary keyword.",
                Impact::High,
                Effort::Low,
            )
            .with_note(format!("Current length: {}", page.title.chars().count())),
        );
    }
    if desc_status != TrafficLight::Green {
        suggestions.push(
            Suggestion::new(
                Priority::Medium,
                Category::OnPage,
                "Adjust the meta description to 70-160 characters with a value proposition and CTA.",
                Impact::Medium,
                Effort::Low,
            )
            .with_note(format!("Current length: {}", page.description.chars().count())),
        );
    }
    if page.canonical.is_empty() {
        suggestions.push(
            Suggestion::new(
                Priority::Medium,
                Category::OnPage,
                "Add an absolute canonical tag pointing at the canonical URL.",
                Impact::Medium,
                Effort::Low,
            )
            .with_note("No <link rel='canonical'> detected."),
        );
    } else if !canonical_abs {
        suggestions.push(
            Suggestion::new(
                Priority::Medium,
                Category::OnPage,
                "Make the canonical an absolute URL (https://...).",
                Impact::Medium,
                Effort::Low,
            )
            .with_note(format!("Current canonical: {}", page.canonical)),
        );
    }
    if !page.robots.is_empty() && robots_status == TrafficLight::Red {
        suggestions.push(
            Suggestion::new(
                Priority::High,
                Category::Indexability,
                "Review the meta robots directives (avoid noindex/nofollow in production).",
                Impact::High,
                Effort::Low,
            )
            .with_note(format!("robots meta: {}", page.robots)),
        );
    }

    MetaReport {
        title: LengthField {
            value: page.title.clone(),
            len: page.title.chars().count(),
            status: title_status,
        },
        description: LengthField {
            value: page.description.clone(),
            len: page.description.chars().count(),
            status: desc_status,
        },
        robots_meta: TextField {
            value: page.robots.clone(),
            status: robots_status,
        },
        canonical: CanonicalField {
            value: page.canonical.clone(),
            absolute: canonical_abs,
            status: canonical_status,
        },
        headings_top: HeadingsTop {
            h1: page.h1.clone(),
            h2: page.h2.clone(),
            h3: page.h3.clone(),
        },
        keyword_relevance: relevance,
        suggestions,
    }
}

/// Social-card completeness: og triple and twitter card fields.
pub fn social_report(
    page: &ExtractedPage,
    base_url: &str,
    relevance: SocialRelevanceBlock,
) -> SocialReport {
    let og_image = absolutize(base_url, &page.og_image);
    let twitter_image = absolutize(base_url, &page.twitter_image);

    let og_complete =
        !page.og_title.is_empty() && !page.og_description.is_empty() && !og_image.is_empty();
    let og_partial = !page.og_title.is_empty() || !page.og_description.is_empty();
    let og_status = bool_status(og_complete, og_partial);

    let tw_complete = !page.twitter_title.is_empty()
        && !page.twitter_description.is_empty()
        && !twitter_image.is_empty();
    let tw_partial = !page.twitter_title.is_empty() || !page.twitter_description.is_empty();
    let tw_status = bool_status(tw_complete, tw_partial);

    let mut suggestions = Vec::new();
    if !og_complete {
        suggestions.push(
            Suggestion::new(
                Priority::Medium,
                Category::Social,
                "Complete the Open Graph triple: og:title, og:description, og:image.",
                Impact::Medium,
                Effort::Low,
            )
            .with_note("Link previews fall back to scraped text without them."),
        );
    }
    if page.twitter_card.is_empty() {
        suggestions.push(
            Suggestion::new(
                Priority::Low,
                Category::Social,
                "Declare a twitter:card (summary_large_image recommended).",
                Impact::Low,
                Effort::Low,
            )
            .with_note(format!(
                "Current twitter:card: {}",
                if page.twitter_card.is_empty() { "not set" } else { &page.twitter_card }
            )),
        );
    } else if !tw_complete {
        suggestions.push(Suggestion::new(
            Priority::Low,
            Category::Social,
            "Complete the twitter card fields (title, description, image).",
            Impact::Low,
            Effort::Low,
        ));
    }

    SocialReport {
        og: SocialCard {
            title: page.og_title.clone(),
            description: page.og_description.clone(),
            image: og_image,
            status: og_status,
        },
        twitter: SocialCard {
            title: page.twitter_title.clone(),
            description: page.twitter_description.clone(),
            image: twitter_image,
            status: tw_status,
        },
        twitter_card: page.twitter_card.clone(),
        keyword_relevance: relevance,
        suggestions,
    }
}

fn absolutize(base_url: &str, maybe_relative: &str) -> String {
    if maybe_relative.is_empty() || is_absolute_url(maybe_relative) {
        return maybe_relative.to_string();
    }
    match url::Url::parse(base_url).and_then(|b| b.join(maybe_relative)) {
        Ok(u) => u.to_string(),
        Err(_) => maybe_relative.to_string(),
    }
}

/// Lightweight performance check from the response alone: TTFB proxy,
/// HTML weight, compression and caching headers, referenced asset counts.
pub fn performance_report(fetched: &FetchedPage, page: &ExtractedPage) -> PerformanceReport {
    let ttfb_status = if fetched.elapsed_ms <= 300 {
        TrafficLight::Green
    } else if fetched.elapsed_ms <= 600 {
        TrafficLight::Amber
    } else {
        TrafficLight::Red
    };

    let encoding = fetched.header("content-encoding").to_lowercase();
    let compression = ["br", "gzip", "deflate"].iter().any(|e| encoding.contains(e));
    let compression_status = bool_status(compression, false);

    let cache_control = fetched.header("cache-control").to_string();
    let cc_lower = cache_control.to_lowercase();
    let has_cache = ["max-age", "s-maxage", "public"].iter().any(|k| cc_lower.contains(k));
    // Amber, not red, when undefined: dynamic pages legitimately skip it
    let cache_status = bool_status(has_cache, !has_cache);

    let mut suggestions = Vec::new();
    if ttfb_status == TrafficLight::Red {
        suggestions.push(
            Suggestion::new(
                Priority::High,
                Category::Performance,
                "Reduce server response time (TTFB above 600ms).",
                Impact::High,
                Effort::Medium,
            )
            .with_note(format!("Measured: {}ms", fetched.elapsed_ms)),
        );
    }
    if !compression {
        suggestions.push(Suggestion::new(
            Priority::Medium,
            Category::Performance,
            "Enable response compression (brotli or gzip) for HTML.",
            Impact::Medium,
            Effort::Low,
        ));
    }
    if !has_cache {
        suggestions.push(Suggestion::new(
            Priority::Low,
            Category::Performance,
            "Define a Cache-Control policy for cacheable responses.",
            Impact::Low,
            Effort::Low,
        ));
    }

    PerformanceReport {
        ttfb_ms: fetched.elapsed_ms,
        ttfb_status,
        html_size_bytes: fetched.body.len(),
        compression,
        compression_status,
        cache_control,
        cache_status,
        num_links: page.num_links,
        num_images: page.num_images,
        suggestions,
    }
}

/// Crawl/indexability check: final status, redirect chain, robots headers.
pub fn indexability_report(fetched: &FetchedPage, page: &ExtractedPage) -> IndexabilityReport {
    let chain_len = fetched.redirect_chain.len();
    let final_ok = (200..300).contains(&fetched.status_code);
    let chain_status = if !final_ok || chain_len > 1 {
        TrafficLight::Red
    } else if chain_len == 1 {
        TrafficLight::Amber
    } else {
        TrafficLight::Green
    };

    let x_robots = fetched.header("x-robots-tag").to_lowercase();
    let robots_blocked = x_robots.contains("noindex") || page.robots.contains("noindex");
    let robots_status = bool_status(!robots_blocked, false);

    let mut suggestions = Vec::new();
    if !final_ok {
        suggestions.push(
            Suggestion::new(
                Priority::High,
                Category::Indexability,
                "Serve a 2xx status on the audited URL.",
                Impact::High,
                Effort::Medium,
            )
            .with_note(format!("Final status: {}", fetched.status_code)),
        );
    }
    if chain_len > 1 {
        suggestions.push(
            Suggestion::new(
                Priority::Medium,
                Category::Indexability,
                "Collapse the redirect chain to at most one hop.",
                Impact::Medium,
                Effort::Low,
            )
            .with_note(format!("{chain_len} redirects before the final URL")),
        );
    }
    if robots_blocked {
        suggestions.push(
            Suggestion::new(
                Priority::High,
                Category::Indexability,
                "Remove noindex from production responses.",
                Impact::High,
                Effort::Low,
            )
            .with_note(format!("x-robots-tag: {x_robots}")),
        );
    }

    IndexabilityReport {
        final_status: fetched.status_code,
        redirect_chain: fetched.redirect_chain.clone(),
        chain_status,
        robots_status,
        x_robots_tag: x_robots,
        suggestions,
    }
}

/// Section scores from the traffic lights, blended with keyword relevance
/// on the on-page section when keywords are present; overall is the
/// weighted mean.
pub fn score_block(
    meta: &MetaReport,
    social: &SocialReport,
    perf: &PerformanceReport,
    idx: &IndexabilityReport,
) -> ScoreBlock {
    let meta_lights = lights_score(&[
        meta.title.status,
        meta.description.status,
        meta.robots_meta.status,
        meta.canonical.status,
    ]);
    let onpage = if meta.keyword_relevance.by_keyword.is_empty() {
        meta_lights
    } else {
        ((meta_lights + meta.keyword_relevance.overall_score) as f64 / 2.0).round() as u32
    };

    let indexability = lights_score(&[idx.chain_status, idx.robots_status]);
    let performance = lights_score(&[perf.ttfb_status, perf.compression_status, perf.cache_status]);

    let social_lights = lights_score(&[social.og.status, social.twitter.status]);
    let social_score = if social.keyword_relevance.by_keyword.is_empty() {
        social_lights
    } else {
        ((social_lights + social.keyword_relevance.overall_score) as f64 / 2.0).round() as u32
    };

    let overall = ((onpage as f64 * SCORE_W_ONPAGE
        + indexability as f64 * SCORE_W_INDEXABILITY
        + performance as f64 * SCORE_W_PERFORMANCE
        + social_score as f64 * SCORE_W_SOCIAL)
        / (SCORE_W_ONPAGE + SCORE_W_INDEXABILITY + SCORE_W_PERFORMANCE + SCORE_W_SOCIAL))
        .round() as u32;

    ScoreBlock {
        onpage,
        indexability,
        performance,
        social: social_score,
        overall,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn fetched(status: u16, elapsed_ms: u64, redirects: usize) -> FetchedPage {
        FetchedPage {
            final_url: "https://example.com/".to_string(),
            status_code: status,
            headers: BTreeMap::new(),
            body: "<html></html>".to_string(),
            redirect_chain: (0..redirects)
                .map(|i| format!("https://example.com/hop{i}"))
                .collect(),
            elapsed_ms,
        }
    }

    #[test]
    fn title_length_thresholds() {
        assert_eq!(length_status(&"x".repeat(45), (30, 60), (20, 70)), TrafficLight::Green);
        assert_eq!(length_status(&"x".repeat(25), (30, 60), (20, 70)), TrafficLight::Amber);
        assert_eq!(length_status(&"x".repeat(80), (30, 60), (20, 70)), TrafficLight::Red);
        assert_eq!(length_status("", (30, 60), (20, 70)), TrafficLight::Red);
    }

    #[test]
    fn robots_noindex_is_red_and_suggested() {
        let page = ExtractedPage {
            robots: "noindex, nofollow".to_string(),
            ..Default::default()
        };
        let report = meta_report(&page, RelevanceBlock::default());
        assert_eq!(report.robots_meta.status, TrafficLight::Red);
        assert!(report
            .suggestions
            .iter()
            .any(|s| s.task.contains("meta robots")));
    }

    #[test]
    fn empty_robots_is_green() {
        let page = ExtractedPage::default();
        let report = meta_report(&page, RelevanceBlock::default());
        assert_eq!(report.robots_meta.status, TrafficLight::Green);
    }

    #[test]
    fn relative_canonical_is_amber_with_suggestion() {
        let page = ExtractedPage {
            canonical: "/home".to_string(),
            ..Default::default()
        };
        let report = meta_report(&page, RelevanceBlock::default());
        assert_eq!(report.canonical.status, TrafficLight::Amber);
        assert!(!report.canonical.absolute);
        assert!(report.suggestions.iter().any(|s| s.task.contains("absolute URL")));
    }

    #[test]
    fn social_image_is_absolutized() {
        let page = ExtractedPage {
            og_title: "t".to_string(),
            og_description: "d".to_string(),
            og_image: "/og.png".to_string(),
            ..Default::default()
        };
        let report = social_report(&page, "https://example.com/page", SocialRelevanceBlock::default());
        assert_eq!(report.og.image, "https://example.com/og.png");
        assert_eq!(report.og.status, TrafficLight::Green);
    }

    #[test]
    fn performance_thresholds() {
        let page = ExtractedPage::default();
        let report = performance_report(&fetched(200, 250, 0), &page);
        assert_eq!(report.ttfb_status, TrafficLight::Green);
        let report = performance_report(&fetched(200, 500, 0), &page);
        assert_eq!(report.ttfb_status, TrafficLight::Amber);
        let report = performance_report(&fetched(200, 900, 0), &page);
        assert_eq!(report.ttfb_status, TrafficLight::Red);
        assert!(report.suggestions.iter().any(|s| s.task.contains("TTFB")));
    }

    #[test]
    fn redirect_chain_statuses() {
        let page = ExtractedPage::default();
        assert_eq!(indexability_report(&fetched(200, 100, 0), &page).chain_status, TrafficLight::Green);
        assert_eq!(indexability_report(&fetched(200, 100, 1), &page).chain_status, TrafficLight::Amber);
        assert_eq!(indexability_report(&fetched(200, 100, 3), &page).chain_status, TrafficLight::Red);
        assert_eq!(indexability_report(&fetched(404, 100, 0), &page).chain_status, TrafficLight::Red);
    }

    #[test]
    fn overall_score_is_weighted_mean() {
        let page = ExtractedPage {
            title: "A perfectly sized page title for the audit".to_string(),
            description: "A description long enough to satisfy the audit check, \
                          with a value proposition and a call to action inside."
                .to_string(),
            canonical: "https://example.com/".to_string(),
            ..Default::default()
        };
        let f = fetched(200, 100, 0);
        let meta = meta_report(&page, RelevanceBlock::default());
        let social = social_report(&page, "https://example.com/", SocialRelevanceBlock::default());
        let perf = performance_report(&f, &page);
        let idx = indexability_report(&f, &page);
        let scores = score_block(&meta, &social, &perf, &idx);
        assert!(scores.overall <= 100);
        assert!(scores.onpage > scores.social, "empty social cards should drag that section");
    }
}
