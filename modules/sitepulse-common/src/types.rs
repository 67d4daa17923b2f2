use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// --- Audit lifecycle ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Pending => "pending",
            AuditStatus::Running => "running",
            AuditStatus::Completed => "completed",
            AuditStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AuditStatus::Completed | AuditStatus::Failed)
    }
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuditStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AuditStatus::Pending),
            "running" => Ok(AuditStatus::Running),
            "completed" => Ok(AuditStatus::Completed),
            "failed" => Ok(AuditStatus::Failed),
            other => Err(format!("unknown audit status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    Submitted,
    Scheduled,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::Submitted => "submitted",
            AuditKind::Scheduled => "scheduled",
        }
    }
}

/// Recurrence interval for monitored projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    #[default]
    None,
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Schedule {
    /// Recurrence interval in seconds. `None` never comes due.
    pub fn interval_secs(&self) -> Option<i64> {
        match self {
            Schedule::None => None,
            Schedule::Hourly => Some(3_600),
            Schedule::Daily => Some(86_400),
            Schedule::Weekly => Some(604_800),
            Schedule::Monthly => Some(2_592_000),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Schedule::None => "none",
            Schedule::Hourly => "hourly",
            Schedule::Daily => "daily",
            Schedule::Weekly => "weekly",
            Schedule::Monthly => "monthly",
        }
    }
}

impl FromStr for Schedule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Schedule::None),
            "hourly" => Ok(Schedule::Hourly),
            "daily" => Ok(Schedule::Daily),
            "weekly" => Ok(Schedule::Weekly),
            "monthly" => Ok(Schedule::Monthly),
            other => Err(format!("unknown schedule: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanDepth {
    Quick,
    Standard,
    Deep,
}

impl Default for ScanDepth {
    fn default() -> Self {
        ScanDepth::Standard
    }
}

/// Options attached to one audit at submission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditOptions {
    #[serde(default)]
    pub scan_depth: ScanDepth,
    #[serde(default = "default_true")]
    pub include_serp: bool,
    #[serde(default = "default_true")]
    pub include_summary: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            scan_depth: ScanDepth::Standard,
            include_serp: true,
            include_summary: true,
        }
    }
}

// --- Fetch collaborator output ---

/// Structured output of the page fetch collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedPage {
    pub final_url: String,
    pub status_code: u16,
    /// Response headers, lowercased keys.
    pub headers: BTreeMap<String, String>,
    pub body: String,
    /// URLs visited before the final one (empty when no redirects).
    pub redirect_chain: Vec<String>,
    pub elapsed_ms: u64,
}

impl FetchedPage {
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// On-page fields extracted from a fetched document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedPage {
    pub title: String,
    pub description: String,
    pub robots: String,
    pub canonical: String,
    pub h1: Vec<String>,
    pub h2: Vec<String>,
    pub h3: Vec<String>,
    pub og_title: String,
    pub og_description: String,
    pub og_image: String,
    pub twitter_card: String,
    pub twitter_title: String,
    pub twitter_description: String,
    pub twitter_image: String,
    pub num_links: usize,
    pub num_images: usize,
}

// --- Traffic lights and suggestions ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficLight {
    Green,
    Amber,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effort {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    OnPage,
    Indexability,
    Social,
    Performance,
    Connectivity,
    Content,
}

/// One remediation item. Generation is deterministic given the inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub priority: Priority,
    pub category: Category,
    pub task: String,
    pub impact: Impact,
    pub effort: Effort,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Suggestion {
    pub fn new(
        priority: Priority,
        category: Category,
        task: impl Into<String>,
        impact: Impact,
        effort: Effort,
    ) -> Self {
        Self {
            priority,
            category,
            task: task.into(),
            impact,
            effort,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

// --- Keyword relevance (ephemeral, computed fresh per audit) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Partial,
    None,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FieldRelevance {
    pub present: bool,
    #[serde(rename = "match")]
    pub match_kind: MatchKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HeadingRelevance {
    pub present: bool,
    #[serde(rename = "match")]
    pub match_kind: MatchKind,
    /// Headings in the list with any (exact or partial) match.
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Density {
    pub value: f64,
    pub status: TrafficLight,
}

/// Per-keyword classification over the meta context fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordReport {
    pub title: FieldRelevance,
    pub meta_description: FieldRelevance,
    pub h1: HeadingRelevance,
    pub h2: HeadingRelevance,
    pub url_slug: FieldRelevance,
    pub density: Density,
    pub score: u32,
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelevanceBlock {
    pub by_keyword: BTreeMap<String, KeywordReport>,
    pub overall_score: u32,
}

/// Per-keyword classification over social-card fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialKeywordReport {
    pub og_title: FieldRelevance,
    pub og_description: FieldRelevance,
    pub twitter_title: FieldRelevance,
    pub twitter_description: FieldRelevance,
    pub score: u32,
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SocialRelevanceBlock {
    pub by_keyword: BTreeMap<String, SocialKeywordReport>,
    pub overall_score: u32,
}

// --- Rank lookups ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankStatus {
    FoundExact,
    FoundSameDomain,
    NotFound,
}

impl RankStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankStatus::FoundExact => "found_exact",
            RankStatus::FoundSameDomain => "found_same_domain",
            RankStatus::NotFound => "not_found",
        }
    }
}

impl FromStr for RankStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "found_exact" => Ok(RankStatus::FoundExact),
            "found_same_domain" => Ok(RankStatus::FoundSameDomain),
            "not_found" => Ok(RankStatus::NotFound),
            other => Err(format!("unknown rank status: {other}")),
        }
    }
}

/// Provenance of a rank result. Degraded entries come from the deterministic
/// fallback used when no provider credential is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankSource {
    Live,
    Degraded,
}

impl RankSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankSource::Live => "live",
            RankSource::Degraded => "degraded",
        }
    }
}

impl FromStr for RankSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(RankSource::Live),
            "degraded" => Ok(RankSource::Degraded),
            other => Err(format!("unknown rank source: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankLookup {
    pub keyword: String,
    pub status: RankStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found_url: Option<String>,
    pub source: RankSource,
}

// --- Audit payload sections ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LengthField {
    pub value: String,
    pub len: usize,
    pub status: TrafficLight,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextField {
    pub value: String,
    pub status: TrafficLight,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalField {
    pub value: String,
    pub absolute: bool,
    pub status: TrafficLight,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeadingsTop {
    pub h1: Vec<String>,
    pub h2: Vec<String>,
    pub h3: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaReport {
    pub title: LengthField,
    pub description: LengthField,
    pub robots_meta: TextField,
    pub canonical: CanonicalField,
    pub headings_top: HeadingsTop,
    pub keyword_relevance: RelevanceBlock,
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialCard {
    pub title: String,
    pub description: String,
    pub image: String,
    pub status: TrafficLight,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialReport {
    pub og: SocialCard,
    pub twitter: SocialCard,
    pub twitter_card: String,
    pub keyword_relevance: SocialRelevanceBlock,
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub ttfb_ms: u64,
    pub ttfb_status: TrafficLight,
    pub html_size_bytes: usize,
    pub compression: bool,
    pub compression_status: TrafficLight,
    pub cache_control: String,
    pub cache_status: TrafficLight,
    pub num_links: usize,
    pub num_images: usize,
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexabilityReport {
    pub final_status: u16,
    pub redirect_chain: Vec<String>,
    pub chain_status: TrafficLight,
    pub robots_status: TrafficLight,
    pub x_robots_tag: String,
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoreBlock {
    pub onpage: u32,
    pub indexability: u32,
    pub performance: u32,
    pub social: u32,
    pub overall: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub html: String,
}

/// Full structured result of one completed audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executive_summary: Option<ExecutiveSummary>,
    pub scores: ScoreBlock,
    pub seo_meta: MetaReport,
    pub social: SocialReport,
    pub performance: PerformanceReport,
    pub indexability: IndexabilityReport,
    pub serp: Vec<RankLookup>,
}

impl AuditPayload {
    fn all_suggestions(&self) -> impl Iterator<Item = &Suggestion> {
        self.seo_meta
            .suggestions
            .iter()
            .chain(self.social.suggestions.iter())
            .chain(self.performance.suggestions.iter())
            .chain(self.indexability.suggestions.iter())
            .chain(
                self.seo_meta
                    .keyword_relevance
                    .by_keyword
                    .values()
                    .flat_map(|k| k.suggestions.iter()),
            )
            .chain(
                self.social
                    .keyword_relevance
                    .by_keyword
                    .values()
                    .flat_map(|k| k.suggestions.iter()),
            )
    }

    /// Summary counters: (critical, warnings, opportunities) by priority.
    pub fn suggestion_counts(&self) -> (u32, u32, u32) {
        let mut critical = 0;
        let mut warnings = 0;
        let mut opportunities = 0;
        for s in self.all_suggestions() {
            match s.priority {
                Priority::High => critical += 1,
                Priority::Medium => warnings += 1,
                Priority::Low => opportunities += 1,
            }
        }
        (critical, warnings, opportunities)
    }
}
