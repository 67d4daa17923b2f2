//! Keyword relevance scoring.
//!
//! Pure functions over extracted page fields — no I/O, no randomness.
//! Classification per field is `exact` (delimited phrase), `partial`
//! (substring, or all keyword tokens present as standalone tokens), or
//! `none`. Word characters are Unicode alphanumerics, so accented Latin
//! letters delimit nothing.

use std::collections::BTreeMap;

use sitepulse_common::{
    Category, Density, Effort, FieldRelevance, HeadingRelevance, Impact, KeywordReport, MatchKind,
    Priority, RelevanceBlock, SocialKeywordReport, SocialRelevanceBlock, Suggestion, TrafficLight,
};

// Meta context field weights.
const W_TITLE: f64 = 40.0;
const W_DESCRIPTION: f64 = 25.0;
const W_H1: f64 = 20.0;
const W_SLUG: f64 = 10.0;
const W_H2: f64 = 5.0;

// Social context field weights.
const W_OG_TITLE: f64 = 35.0;
const W_OG_DESCRIPTION: f64 = 25.0;
const W_TW_TITLE: f64 = 25.0;
const W_TW_DESCRIPTION: f64 = 15.0;

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
}

/// Classify how a keyword appears in a text field.
pub fn match_type(text: &str, keyword: &str) -> MatchKind {
    let t = text.to_lowercase();
    let k = keyword.trim().to_lowercase();
    if t.is_empty() || k.is_empty() {
        return MatchKind::None;
    }

    // Exact: the phrase occurs bounded by non-word characters on both sides.
    for (start, _) in t.match_indices(&k) {
        let before_ok = !t[..start].chars().next_back().is_some_and(is_word_char);
        let after_ok = !t[start + k.len()..].chars().next().is_some_and(is_word_char);
        if before_ok && after_ok {
            return MatchKind::Exact;
        }
    }

    if t.contains(&k) {
        return MatchKind::Partial;
    }

    // Tolerate intervening words: every keyword token present as a token.
    let field_tokens = tokenize(&t);
    let kw_tokens = tokenize(&k);
    if !kw_tokens.is_empty() && kw_tokens.iter().all(|kt| field_tokens.contains(kt)) {
        return MatchKind::Partial;
    }

    MatchKind::None
}

/// Lowercased maximal runs of Unicode alphanumerics.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !is_word_char(c))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keyword density over a corpus: exact-substring occurrences of the keyword
/// in the token-joined corpus, divided by token count. 0..1.
pub fn density(corpus: &str, keyword: &str) -> f64 {
    let tokens = tokenize(corpus);
    if tokens.is_empty() {
        return 0.0;
    }
    let k = keyword.trim().to_lowercase();
    if k.is_empty() {
        return 0.0;
    }
    let joined = tokens.join(" ");
    let occurrences = joined.matches(&k).count();
    occurrences as f64 / tokens.len() as f64
}

pub fn density_status(value: f64) -> TrafficLight {
    if value <= 0.015 {
        TrafficLight::Green
    } else if value <= 0.025 {
        TrafficLight::Amber
    } else {
        TrafficLight::Red
    }
}

/// Best classification across a heading list, with a count of matches.
fn best_heading_match(headings: &[String], keyword: &str) -> (MatchKind, usize) {
    let kinds: Vec<MatchKind> = headings.iter().map(|h| match_type(h, keyword)).collect();
    let best = kinds.iter().copied().min().unwrap_or(MatchKind::None);
    let count = kinds.iter().filter(|m| **m != MatchKind::None).count();
    (best, count)
}

fn match_value(kind: MatchKind) -> f64 {
    match kind {
        MatchKind::Exact => 1.0,
        MatchKind::Partial => 0.6,
        MatchKind::None => 0.0,
    }
}

/// Last meaningful path segment of a URL, hyphens read as spaces.
pub fn slug_from_url(raw: &str) -> String {
    let path = match url::Url::parse(raw) {
        Ok(u) => u.path().to_string(),
        Err(_) => raw.to_string(),
    };
    let slug = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
        .to_string();
    slug.replace('-', " ")
}

/// Fields considered by the meta scoring context.
pub struct MetaFields<'a> {
    pub url: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub h1: &'a [String],
    pub h2: &'a [String],
}

/// Weighted 0–100 relevance over the meta context for one keyword set.
pub fn meta_relevance(fields: &MetaFields<'_>, keywords: &[String]) -> RelevanceBlock {
    let mut by_keyword = BTreeMap::new();
    if keywords.is_empty() {
        return RelevanceBlock {
            by_keyword,
            overall_score: 0,
        };
    }

    let slug = slug_from_url(fields.url);
    let corpus = {
        let mut parts = vec![fields.title.to_string(), fields.description.to_string()];
        parts.extend(fields.h1.iter().cloned());
        parts.extend(fields.h2.iter().cloned());
        parts.join(" ")
    };

    let mut scores: Vec<u32> = Vec::with_capacity(keywords.len());

    for kw in keywords {
        let mt_title = match_type(fields.title, kw);
        let mt_desc = match_type(fields.description, kw);
        let (mt_h1, h1_count) = best_heading_match(fields.h1, kw);
        let (mt_h2, h2_count) = best_heading_match(fields.h2, kw);
        let mt_slug = match_type(&slug, kw);

        let dens = density(&corpus, kw);
        let dens_status = density_status(dens);

        let score = (match_value(mt_title) * W_TITLE
            + match_value(mt_desc) * W_DESCRIPTION
            + match_value(mt_h1) * W_H1
            + match_value(mt_slug) * W_SLUG
            + match_value(mt_h2) * W_H2)
            .round() as u32;
        scores.push(score);

        let suggestions = meta_suggestions(kw, mt_title, mt_desc, mt_h1, mt_h2, dens_status);

        by_keyword.insert(
            kw.clone(),
            KeywordReport {
                title: FieldRelevance {
                    present: mt_title != MatchKind::None,
                    match_kind: mt_title,
                },
                meta_description: FieldRelevance {
                    present: mt_desc != MatchKind::None,
                    match_kind: mt_desc,
                },
                h1: HeadingRelevance {
                    present: mt_h1 != MatchKind::None,
                    match_kind: mt_h1,
                    count: h1_count,
                },
                h2: HeadingRelevance {
                    present: mt_h2 != MatchKind::None,
                    match_kind: mt_h2,
                    count: h2_count,
                },
                url_slug: FieldRelevance {
                    present: mt_slug != MatchKind::None,
                    match_kind: mt_slug,
                },
                density: Density {
                    value: (dens * 10_000.0).round() / 10_000.0,
                    status: dens_status,
                },
                score,
                suggestions,
            },
        );
    }

    let overall_score =
        (scores.iter().sum::<u32>() as f64 / scores.len() as f64).round() as u32;

    RelevanceBlock {
        by_keyword,
        overall_score,
    }
}

fn meta_suggestions(
    kw: &str,
    mt_title: MatchKind,
    mt_desc: MatchKind,
    mt_h1: MatchKind,
    mt_h2: MatchKind,
    dens_status: TrafficLight,
) -> Vec<Suggestion> {
    let mut out = Vec::new();

    if mt_title == MatchKind::None {
        out.push(
            Suggestion::new(
                Priority::High,
                Category::OnPage,
                format!("Include the keyword in <title>: \"{kw}\"."),
                Impact::High,
                Effort::Low,
            )
            .with_note("Keep the phrasing natural, with the brand if it fits."),
        );
    }
    if mt_desc == MatchKind::None {
        out.push(
            Suggestion::new(
                Priority::Medium,
                Category::OnPage,
                format!("Include the keyword in the meta description: \"{kw}\"."),
                Impact::Medium,
                Effort::Low,
            )
            .with_note("Value proposition plus CTA; avoid keyword stuffing."),
        );
    }
    if mt_h1 == MatchKind::None {
        out.push(
            Suggestion::new(
                Priority::Medium,
                Category::OnPage,
                format!("Align the H1 with the target keyword: \"{kw}\"."),
                Impact::Medium,
                Effort::Low,
            )
            .with_note("Don't duplicate the <title> verbatim; stay consistent."),
        );
    }
    if mt_h2 == MatchKind::None {
        out.push(
            Suggestion::new(
                Priority::Low,
                Category::OnPage,
                format!("Include \"{kw}\" in a related H2."),
                Impact::Low,
                Effort::Low,
            )
            .with_note("Natural semantic reinforcement."),
        );
    }
    if dens_status == TrafficLight::Red {
        out.push(
            Suggestion::new(
                Priority::High,
                Category::OnPage,
                format!("Reduce over-optimization of \"{kw}\" (possible stuffing)."),
                Impact::High,
                Effort::Low,
            )
            .with_note("Bring density below ~2.5% and vary the wording."),
        );
    }

    out
}

/// Fields considered by the social scoring context.
pub struct SocialFields<'a> {
    pub og_title: &'a str,
    pub og_description: &'a str,
    pub twitter_title: &'a str,
    pub twitter_description: &'a str,
}

/// Weighted 0–100 relevance over the social-card context.
pub fn social_relevance(fields: &SocialFields<'_>, keywords: &[String]) -> SocialRelevanceBlock {
    let mut by_keyword = BTreeMap::new();
    if keywords.is_empty() {
        return SocialRelevanceBlock {
            by_keyword,
            overall_score: 0,
        };
    }

    let mut scores: Vec<u32> = Vec::with_capacity(keywords.len());

    for kw in keywords {
        let mt_ogt = match_type(fields.og_title, kw);
        let mt_ogd = match_type(fields.og_description, kw);
        let mt_twt = match_type(fields.twitter_title, kw);
        let mt_twd = match_type(fields.twitter_description, kw);

        let score = (match_value(mt_ogt) * W_OG_TITLE
            + match_value(mt_ogd) * W_OG_DESCRIPTION
            + match_value(mt_twt) * W_TW_TITLE
            + match_value(mt_twd) * W_TW_DESCRIPTION)
            .round() as u32;
        scores.push(score);

        let mut suggestions = Vec::new();
        if mt_ogt == MatchKind::None {
            suggestions.push(
                Suggestion::new(
                    Priority::Medium,
                    Category::Social,
                    format!("Include \"{kw}\" in og:title."),
                    Impact::Medium,
                    Effort::Low,
                )
                .with_note("Keep parity with the page <title> where possible."),
            );
        }
        if mt_twt == MatchKind::None {
            suggestions.push(Suggestion::new(
                Priority::Low,
                Category::Social,
                format!("Include \"{kw}\" in twitter:title if it adds clarity."),
                Impact::Low,
                Effort::Low,
            ));
        }
        if mt_ogd == MatchKind::None && mt_twd == MatchKind::None {
            suggestions.push(Suggestion::new(
                Priority::Low,
                Category::Social,
                format!("Mention \"{kw}\" in og:description or twitter:description."),
                Impact::Low,
                Effort::Low,
            ));
        }

        by_keyword.insert(
            kw.clone(),
            SocialKeywordReport {
                og_title: FieldRelevance {
                    present: mt_ogt != MatchKind::None,
                    match_kind: mt_ogt,
                },
                og_description: FieldRelevance {
                    present: mt_ogd != MatchKind::None,
                    match_kind: mt_ogd,
                },
                twitter_title: FieldRelevance {
                    present: mt_twt != MatchKind::None,
                    match_kind: mt_twt,
                },
                twitter_description: FieldRelevance {
                    present: mt_twd != MatchKind::None,
                    match_kind: mt_twd,
                },
                score,
                suggestions,
            },
        );
    }

    let overall_score =
        (scores.iter().sum::<u32>() as f64 / scores.len() as f64).round() as u32;

    SocialRelevanceBlock {
        by_keyword,
        overall_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta<'a>(
        url: &'a str,
        title: &'a str,
        description: &'a str,
        h1: &'a [String],
        h2: &'a [String],
    ) -> MetaFields<'a> {
        MetaFields {
            url,
            title,
            description,
            h1,
            h2,
        }
    }

    #[test]
    fn exact_match_requires_word_boundaries() {
        assert_eq!(match_type("Buy running shoes online", "running shoes"), MatchKind::Exact);
        assert_eq!(match_type("Ultrarunning shoes", "running shoes"), MatchKind::Partial);
        assert_eq!(match_type("nothing here", "running shoes"), MatchKind::None);
    }

    #[test]
    fn accented_characters_count_as_word_characters() {
        // "ñ" must not act as a boundary: "añoabogado" is not an exact hit
        assert_eq!(match_type("añoabogado laboral", "abogado laboral"), MatchKind::Partial);
        assert_eq!(match_type("el abogado laboral de Madrid", "abogado laboral"), MatchKind::Exact);
    }

    #[test]
    fn intervening_words_downgrade_to_partial() {
        // Phrase broken by "de", both tokens still present standalone
        assert_eq!(
            match_type("Comprar Zapatillas de Running Online", "zapatillas running"),
            MatchKind::Partial
        );
    }

    #[test]
    fn exact_title_match_contributes_full_weight() {
        let h1: Vec<String> = vec![];
        let h2: Vec<String> = vec![];
        let fields = meta("https://example.com/pricing", "best seo tool", "", &h1, &h2);
        let block = meta_relevance(&fields, &["seo tool".to_string()]);
        let report = &block.by_keyword["seo tool"];
        assert_eq!(report.title.match_kind, MatchKind::Exact);
        // title 40 only; no other field matches
        assert_eq!(report.score, 40);
    }

    #[test]
    fn empty_keyword_list_yields_empty_block() {
        let h1: Vec<String> = vec![];
        let h2: Vec<String> = vec![];
        let fields = meta("https://example.com", "title", "desc", &h1, &h2);
        let block = meta_relevance(&fields, &[]);
        assert!(block.by_keyword.is_empty());
        assert_eq!(block.overall_score, 0);
    }

    #[test]
    fn empty_corpus_density_is_zero() {
        assert_eq!(density("", "seo"), 0.0);
        assert_eq!(density("...---...", "seo"), 0.0);
    }

    #[test]
    fn density_is_idempotent() {
        let corpus = "seo audit tools for seo professionals";
        assert_eq!(density(corpus, "seo"), density(corpus, "seo"));
    }

    #[test]
    fn density_grows_with_repeated_insertion() {
        let mut corpus = String::from("a broad page about web marketing and analytics dashboards");
        let mut last = density(&corpus, "seo");
        for _ in 0..4 {
            corpus.push_str(" seo");
            let next = density(&corpus, "seo");
            assert!(next > last, "density should increase: {last} -> {next}");
            last = next;
        }
    }

    #[test]
    fn stuffing_flags_red_and_suggests_reduction() {
        // 3 occurrences in ~40 tokens is > 2.5%
        let filler = "word ".repeat(37);
        let title = format!("seo seo seo {filler}");
        let h1: Vec<String> = vec![];
        let h2: Vec<String> = vec![];
        let fields = meta("https://example.com", &title, "", &h1, &h2);
        let block = meta_relevance(&fields, &["seo".to_string()]);
        let report = &block.by_keyword["seo"];
        assert_eq!(report.density.status, TrafficLight::Red);
        assert!(report
            .suggestions
            .iter()
            .any(|s| s.task.contains("over-optimization")));
    }

    #[test]
    fn slug_match_uses_hyphens_as_spaces() {
        let h1: Vec<String> = vec![];
        let h2: Vec<String> = vec![];
        let fields = meta("https://example.com/blog/seo-tool-guide", "", "", &h1, &h2);
        let block = meta_relevance(&fields, &["seo tool".to_string()]);
        let report = &block.by_keyword["seo tool"];
        assert_eq!(report.url_slug.match_kind, MatchKind::Exact);
        assert_eq!(report.score, 10);
    }

    #[test]
    fn heading_best_match_and_count() {
        let h1 = vec!["Plans and pricing".to_string()];
        let h2 = vec![
            "Why a seo tool matters".to_string(),
            "Our seo toolkit".to_string(),
            "Unrelated".to_string(),
        ];
        let (best, count) = best_heading_match(&h2, "seo tool");
        assert_eq!(best, MatchKind::Exact);
        assert_eq!(count, 2);
        let (best_h1, count_h1) = best_heading_match(&h1, "seo tool");
        assert_eq!(best_h1, MatchKind::None);
        assert_eq!(count_h1, 0);
    }

    #[test]
    fn overall_is_mean_of_keyword_scores() {
        let h1: Vec<String> = vec![];
        let h2: Vec<String> = vec![];
        let fields = meta("https://example.com", "alpha product", "", &h1, &h2);
        let block = meta_relevance(
            &fields,
            &["alpha product".to_string(), "missing term".to_string()],
        );
        assert_eq!(block.by_keyword["alpha product"].score, 40);
        assert_eq!(block.by_keyword["missing term"].score, 0);
        assert_eq!(block.overall_score, 20);
    }

    #[test]
    fn social_weights_sum_to_hundred_on_exact_everywhere() {
        let fields = SocialFields {
            og_title: "seo tool",
            og_description: "a seo tool",
            twitter_title: "the seo tool",
            twitter_description: "best seo tool",
        };
        let block = social_relevance(&fields, &["seo tool".to_string()]);
        assert_eq!(block.by_keyword["seo tool"].score, 100);
        assert!(block.by_keyword["seo tool"].suggestions.is_empty());
    }

    #[test]
    fn social_missing_fields_score_partial_weights() {
        let fields = SocialFields {
            og_title: "seo tooling hub",
            og_description: "",
            twitter_title: "",
            twitter_description: "",
        };
        let block = social_relevance(&fields, &["seo tool".to_string()]);
        // og:title partial only: 35 * 0.6 = 21
        assert_eq!(block.by_keyword["seo tool"].score, 21);
    }
}
