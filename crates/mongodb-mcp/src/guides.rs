// crates/mongodb-mcp/src/guides.rs
// ============================================================================
// Module: Guide Catalog
// Description: Embedded prompts and resources with placeholder rendering.
// Purpose: Serve help documents and line search over the static references.
// Dependencies: mongodb-mcp-config, serde, thiserror
// ============================================================================

//! ## Overview
//! Guides are Markdown templates embedded with `include_str!`. Templated
//! guides use `{{name}}` placeholders that are filled from a
//! [`RenderContext`]: epoch timestamps and the list of databases the access
//! policy permits. Unknown placeholders are left verbatim.
//!
//! The `reference` and `guide` resources are static and back the
//! `search_resource` tool, which matches lines by substring.
//!
//! ## Invariants
//! - Only templates that name `database_list` require a driver round trip.
//! - The database list is filtered by the same policy as every tool.
//! - Search line numbers are 1-based and blank lines never match.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use mongodb_mcp_config::AccessPolicy;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::access::ToolContent;
use crate::store::DocumentStore;
use crate::store::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// MIME type of every guide resource.
pub const GUIDE_MIME_TYPE: &str = "text/markdown";
/// Default per-resource match cap for `search_resource`.
pub const DEFAULT_SEARCH_RESULTS: i64 = 50;
/// Upper bound for the per-resource match cap.
pub const MAX_SEARCH_RESULTS: i64 = 200;

const QUERY_GUIDE_TEMPLATE: &str = include_str!("../guides/query_guide.md");
const REFERENCE_DOC: &str = include_str!("../guides/reference.md");
const USAGE_GUIDE_DOC: &str = include_str!("../guides/guide.md");
const HELP_TEMPLATE: &str = include_str!("../guides/help.md");
const HELP_ADMIRROR_TEMPLATE: &str = include_str!("../guides/help_admirror.md");
const HELP_LSF_RESEARCH_TEMPLATE: &str = include_str!("../guides/help_lsf_research.md");

const SECONDS_PER_DAY: u64 = 24 * 3600;
const WEEK_SECONDS: u64 = 7 * SECONDS_PER_DAY;
const MONTH_SECONDS: u64 = 30 * SECONDS_PER_DAY;

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// How database list entries are annotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintStyle {
    /// Short label, e.g. `- **ADMirror** - User identity`.
    Label,
    /// Routing pointer, e.g. `- **ADMirror** ← Use this for finding people/users`.
    Pointer,
}

/// Values available to `{{placeholder}}` substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext {
    /// Current time in Unix seconds.
    now_epoch: u64,
    /// Databases to list under `database_list`.
    databases: Vec<String>,
    /// Annotation style for `database_list`.
    style: HintStyle,
}

impl RenderContext {
    /// Creates a context pinned to `now_epoch`.
    #[must_use]
    pub const fn new(now_epoch: u64, databases: Vec<String>, style: HintStyle) -> Self {
        Self {
            now_epoch,
            databases,
            style,
        }
    }

    /// Creates a context at the current wall-clock time.
    #[must_use]
    pub fn now(databases: Vec<String>, style: HintStyle) -> Self {
        let now_epoch =
            SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs());
        Self::new(now_epoch, databases, style)
    }

    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "now_epoch" => Some(self.now_epoch.to_string()),
            "week_ago_epoch" => Some(self.now_epoch.saturating_sub(WEEK_SECONDS).to_string()),
            "month_ago_epoch" => Some(self.now_epoch.saturating_sub(MONTH_SECONDS).to_string()),
            "database_list" => Some(
                self.databases
                    .iter()
                    .map(|name| database_line(name, self.style))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => None,
        }
    }
}

/// Substitutes `{{name}}` placeholders in `template`.
#[must_use]
pub fn render(template: &str, context: &RenderContext) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[.. start]);
        let after = &rest[start + 2 ..];
        let Some(end) = after.find("}}") else {
            rest = &rest[start ..];
            break;
        };
        match context.lookup(after[.. end].trim()) {
            Some(value) => output.push_str(&value),
            None => output.push_str(&rest[start .. start + end + 4]),
        }
        rest = &after[end + 2 ..];
    }
    output.push_str(rest);
    output
}

fn database_hint(name: &str, style: HintStyle) -> Option<&'static str> {
    match (name, style) {
        ("ADMirror", HintStyle::Label) => Some("User identity"),
        ("ADMirror", HintStyle::Pointer) => Some("Use this for finding people/users"),
        ("lsf_research", HintStyle::Label) => Some("HPC cluster data"),
        ("lsf_research", HintStyle::Pointer) => Some("Use this for HPC cluster/GPU data"),
        _ => None,
    }
}

fn database_line(name: &str, style: HintStyle) -> String {
    match (database_hint(name, style), style) {
        (Some(hint), HintStyle::Label) => format!("- **{name}** - {hint}"),
        (Some(hint), HintStyle::Pointer) => format!("- **{name}** ← {hint}"),
        (None, _) => format!("- **{name}**"),
    }
}

/// Lists database names permitted by `policy`, in driver order.
///
/// # Errors
///
/// Returns [`StoreError`] when the driver cannot list databases.
pub async fn allowed_database_names(
    store: &dyn DocumentStore,
    policy: &AccessPolicy,
) -> Result<Vec<String>, StoreError> {
    let databases = store.list_databases().await?;
    Ok(databases
        .into_iter()
        .filter(|info| policy.is_allowed(&info.name))
        .map(|info| info.name)
        .collect())
}

// ============================================================================
// SECTION: Resources
// ============================================================================

/// Resource metadata returned from `resources/list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceMetadata {
    /// Resource URI.
    pub uri: &'static str,
    /// Resource name.
    pub name: &'static str,
    /// Short description.
    pub description: &'static str,
    /// MIME type.
    #[serde(rename = "mimeType")]
    pub mime_type: &'static str,
}

/// Resource payload returned from `resources/read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceContent {
    /// URI matching the requested resource.
    pub uri: &'static str,
    /// MIME type.
    #[serde(rename = "mimeType")]
    pub mime_type: &'static str,
    /// Rendered Markdown.
    pub text: String,
}

/// Embedded guide resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideResource {
    /// Quick reference with the live database list.
    QueryGuide,
    /// Field reference and routing table.
    Reference,
    /// Usage guide.
    Guide,
}

impl GuideResource {
    /// All resources in listing order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::QueryGuide, Self::Reference, Self::Guide]
    }

    /// Resource name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::QueryGuide => "query_guide",
            Self::Reference => "reference",
            Self::Guide => "guide",
        }
    }

    /// Resource URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::QueryGuide => "mongodb://guide/query",
            Self::Reference => "mongodb://guide/reference",
            Self::Guide => "mongodb://guide/usage",
        }
    }

    /// Listing description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::QueryGuide => {
                "Quick reference for MongoDB databases. Use database-specific help prompts for \
                 detailed guidance."
            }
            Self::Reference => {
                "Field reference and routing table for the exposed databases. Searchable with \
                 search_resource."
            }
            Self::Guide => {
                "How to use this server: workflow, tools, and query tips. Searchable with \
                 search_resource."
            }
        }
    }

    /// Finds a resource by URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::all().iter().copied().find(|resource| resource.uri() == uri)
    }

    /// Whether `search_resource` scans this resource.
    #[must_use]
    pub const fn is_searchable(self) -> bool {
        !matches!(self, Self::QueryGuide)
    }

    /// Metadata for `resources/list`.
    #[must_use]
    pub const fn metadata(self) -> ResourceMetadata {
        ResourceMetadata {
            uri: self.uri(),
            name: self.name(),
            description: self.description(),
            mime_type: GUIDE_MIME_TYPE,
        }
    }

    const fn template(self) -> &'static str {
        match self {
            Self::QueryGuide => QUERY_GUIDE_TEMPLATE,
            Self::Reference => REFERENCE_DOC,
            Self::Guide => USAGE_GUIDE_DOC,
        }
    }

    /// Renders the resource, listing allowed databases when the template needs them.
    ///
    /// # Errors
    ///
    /// Returns [`GuideError::Store`] when the database list cannot be read.
    pub async fn read(
        self,
        store: &dyn DocumentStore,
        policy: &AccessPolicy,
    ) -> Result<ResourceContent, GuideError> {
        let text = match self {
            Self::QueryGuide => {
                let databases = allowed_database_names(store, policy).await?;
                render(self.template(), &RenderContext::now(databases, HintStyle::Label))
            }
            Self::Reference | Self::Guide => self.template().to_string(),
        };
        Ok(ResourceContent {
            uri: self.uri(),
            mime_type: GUIDE_MIME_TYPE,
            text,
        })
    }
}

/// Lists every resource.
#[must_use]
pub fn list_resources() -> Vec<ResourceMetadata> {
    GuideResource::all().iter().map(|resource| resource.metadata()).collect()
}

/// Reads the resource at `uri`.
///
/// # Errors
///
/// Returns [`GuideError`] for unknown URIs or driver failures.
pub async fn read_resource(
    uri: &str,
    store: &dyn DocumentStore,
    policy: &AccessPolicy,
) -> Result<ResourceContent, GuideError> {
    let resource =
        GuideResource::from_uri(uri).ok_or_else(|| GuideError::UnknownResource(uri.to_string()))?;
    resource.read(store, policy).await
}

// ============================================================================
// SECTION: Prompts
// ============================================================================

/// Prompt metadata returned from `prompts/list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMetadata {
    /// Prompt name.
    pub name: &'static str,
    /// Display title.
    pub title: &'static str,
    /// Short description.
    pub description: &'static str,
}

/// Single prompt message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    /// Message role (always `user`).
    pub role: &'static str,
    /// Message content.
    pub content: ToolContent,
}

/// Payload returned from `prompts/get`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptResult {
    /// Prompt description.
    pub description: &'static str,
    /// Rendered messages.
    pub messages: Vec<PromptMessage>,
}

/// Embedded help prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuidePrompt {
    /// Start-here guide with the live database list.
    Help,
    /// ADMirror user identity help.
    HelpAdmirror,
    /// lsf_research cluster help.
    HelpLsfResearch,
}

impl GuidePrompt {
    /// All prompts in listing order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Help, Self::HelpAdmirror, Self::HelpLsfResearch]
    }

    /// Prompt name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::HelpAdmirror => "help_ADMirror",
            Self::HelpLsfResearch => "help_lsf_research",
        }
    }

    /// Display title.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Help => "MongoDB Help - Start Here",
            Self::HelpAdmirror => "ADMirror Database Help",
            Self::HelpLsfResearch => "lsf_research Database Help",
        }
    }

    /// Listing description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Help => {
                "Get started with querying this MongoDB. Shows available databases, common \
                 patterns, and example queries for GPU usage analysis."
            }
            Self::HelpAdmirror => {
                "Detailed guidance for querying user identity data in ADMirror database (people, \
                 departments, organizational structure)"
            }
            Self::HelpLsfResearch => {
                "Detailed guidance for querying HPC cluster data in lsf_research database (GPU \
                 usage, jobs, hosts, performance metrics)"
            }
        }
    }

    /// Parses a prompt name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|prompt| prompt.name() == name)
    }

    /// Metadata for `prompts/list`.
    #[must_use]
    pub const fn metadata(self) -> PromptMetadata {
        PromptMetadata {
            name: self.name(),
            title: self.title(),
            description: self.description(),
        }
    }

    const fn template(self) -> &'static str {
        match self {
            Self::Help => HELP_TEMPLATE,
            Self::HelpAdmirror => HELP_ADMIRROR_TEMPLATE,
            Self::HelpLsfResearch => HELP_LSF_RESEARCH_TEMPLATE,
        }
    }

    /// Renders the prompt as a single user message.
    ///
    /// # Errors
    ///
    /// Returns [`GuideError::Store`] when the database list cannot be read.
    pub async fn get(
        self,
        store: &dyn DocumentStore,
        policy: &AccessPolicy,
    ) -> Result<PromptResult, GuideError> {
        let databases = match self {
            Self::Help => allowed_database_names(store, policy).await?,
            Self::HelpAdmirror | Self::HelpLsfResearch => Vec::new(),
        };
        let text = render(self.template(), &RenderContext::now(databases, HintStyle::Pointer));
        Ok(PromptResult {
            description: self.description(),
            messages: vec![PromptMessage {
                role: "user",
                content: ToolContent::Text {
                    text,
                },
            }],
        })
    }
}

/// Lists every prompt.
#[must_use]
pub fn list_prompts() -> Vec<PromptMetadata> {
    GuidePrompt::all().iter().map(|prompt| prompt.metadata()).collect()
}

/// Renders the prompt named `name`.
///
/// # Errors
///
/// Returns [`GuideError`] for unknown prompts or driver failures.
pub async fn get_prompt(
    name: &str,
    store: &dyn DocumentStore,
    policy: &AccessPolicy,
) -> Result<PromptResult, GuideError> {
    let prompt = GuidePrompt::parse(name).ok_or_else(|| GuideError::UnknownPrompt(name.to_string()))?;
    prompt.get(store, policy).await
}

// ============================================================================
// SECTION: Search
// ============================================================================

/// Arguments of the `search_resource` tool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Substring to look for.
    pub query: String,
    /// Match case exactly.
    #[serde(default)]
    pub case_sensitive: bool,
    /// Per-resource match cap, clamped to `1..=200`.
    #[serde(default = "default_max_results")]
    pub max_results: i64,
    /// Resource names to search; empty means all searchable resources.
    #[serde(default)]
    pub resources: Vec<String>,
}

const fn default_max_results() -> i64 {
    DEFAULT_SEARCH_RESULTS
}

/// One matching line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineMatch {
    /// 1-based line number.
    pub line: usize,
    /// Line text with trailing whitespace removed.
    pub text: String,
}

/// Matches within one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMatches {
    /// Resource name.
    pub resource: &'static str,
    /// Number of matches returned.
    pub match_count: usize,
    /// Matching lines in document order.
    pub matches: Vec<LineMatch>,
}

/// Result of `search_resource`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResults {
    /// Query as given.
    pub query: String,
    /// Per-resource matches in catalog order.
    pub results: Vec<ResourceMatches>,
}

/// Searches the static guide resources line by line.
///
/// # Errors
///
/// Returns [`GuideError::NoSearchableResources`] when the `resources` filter
/// selects nothing.
pub fn search_resources(request: &SearchRequest) -> Result<SearchResults, GuideError> {
    let selected: Vec<GuideResource> = GuideResource::all()
        .iter()
        .copied()
        .filter(|resource| resource.is_searchable())
        .filter(|resource| {
            request.resources.is_empty() || request.resources.iter().any(|name| name == resource.name())
        })
        .collect();
    if selected.is_empty() {
        return Err(GuideError::NoSearchableResources);
    }
    let needle =
        if request.case_sensitive { request.query.clone() } else { request.query.to_lowercase() };
    let cap = usize::try_from(request.max_results.clamp(1, MAX_SEARCH_RESULTS)).unwrap_or(1);
    let results = selected
        .into_iter()
        .map(|resource| {
            let matches = search_lines(resource.template(), &needle, request.case_sensitive, cap);
            ResourceMatches {
                resource: resource.name(),
                match_count: matches.len(),
                matches,
            }
        })
        .collect();
    Ok(SearchResults {
        query: request.query.clone(),
        results,
    })
}

fn search_lines(body: &str, needle: &str, case_sensitive: bool, cap: usize) -> Vec<LineMatch> {
    let mut matches = Vec::new();
    for (index, line) in body.lines().enumerate() {
        if matches.len() >= cap {
            break;
        }
        if line.is_empty() {
            continue;
        }
        let found = if case_sensitive {
            line.contains(needle)
        } else {
            line.to_lowercase().contains(needle)
        };
        if found {
            matches.push(LineMatch {
                line: index + 1,
                text: line.trim_end().to_string(),
            });
        }
    }
    matches
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Guide catalog errors.
#[derive(Debug, Error)]
pub enum GuideError {
    /// Resource URI not recognized.
    #[error("unknown resource: {0}")]
    UnknownResource(String),
    /// Prompt name not recognized.
    #[error("unknown prompt: {0}")]
    UnknownPrompt(String),
    /// The `resources` filter matched no searchable resource.
    #[error("No matching resources to search.")]
    NoSearchableResources,
    /// Listing databases for a templated guide failed.
    #[error("failed to list databases: {0}")]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::HintStyle;
    use super::RenderContext;
    use super::render;

    const NOW: u64 = 1_700_000_000;

    #[test]
    fn epoch_placeholders_are_derived_from_now() {
        let context = RenderContext::new(NOW, Vec::new(), HintStyle::Label);
        let rendered = render("{{now_epoch}}/{{week_ago_epoch}}/{{ month_ago_epoch }}", &context);
        assert_eq!(rendered, "1700000000/1699395200/1697408000");
    }

    #[test]
    fn unknown_and_unterminated_placeholders_are_kept() {
        let context = RenderContext::new(NOW, Vec::new(), HintStyle::Label);
        assert_eq!(render("a {{mystery}} b", &context), "a {{mystery}} b");
        assert_eq!(render("tail {{now_epoch", &context), "tail {{now_epoch");
        assert_eq!(render("{$gt: {{now_epoch}}}", &context), "{$gt: 1700000000}");
    }

    #[test]
    fn database_list_uses_hint_style() {
        let databases = vec!["ADMirror".to_string(), "lsf_research".to_string(), "x".to_string()];
        let label = RenderContext::new(NOW, databases.clone(), HintStyle::Label);
        assert_eq!(
            render("{{database_list}}", &label),
            "- **ADMirror** - User identity\n- **lsf_research** - HPC cluster data\n- **x**"
        );
        let pointer = RenderContext::new(NOW, databases, HintStyle::Pointer);
        let rendered = render("{{database_list}}", &pointer);
        assert!(rendered.starts_with("- **ADMirror** ← Use this for finding people/users\n"));
        assert!(rendered.contains("- **lsf_research** ← Use this for HPC cluster/GPU data"));
    }
}
