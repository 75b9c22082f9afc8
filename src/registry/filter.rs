//! Filter Engine
//!
//! Pure, order-preserving filtering of a registry's server list. The
//! declarative registry filter admits entries by name glob and by tag; the
//! request-time query stage narrows by tag and slices a page.

use crate::crd::{IncludeExclude, RegistryFilter};
use crate::domain::ports::RegistryServerEntry;
use crate::error::{Error, Result};
use glob::Pattern;
use serde::{Deserialize, Serialize};

// =============================================================================
// Constants
// =============================================================================

/// Page size when the request does not name one
pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// Largest page a request may ask for
pub const MAX_PAGE_LIMIT: usize = 100;

// =============================================================================
// Validation
// =============================================================================

/// Reject filters whose name patterns are empty or not valid globs
pub fn validate_filter(filter: &RegistryFilter) -> Result<()> {
    if let Some(names) = &filter.names {
        for pattern in names.include.iter().chain(names.exclude.iter()) {
            if pattern.trim().is_empty() {
                return Err(Error::InvalidFilterPattern {
                    pattern: pattern.clone(),
                    reason: "pattern is empty".into(),
                });
            }
            Pattern::new(pattern).map_err(|e| Error::InvalidFilterPattern {
                pattern: pattern.clone(),
                reason: e.msg.to_string(),
            })?;
        }
    }

    if let Some(tags) = &filter.tags {
        if let Some(tag) = tags
            .include
            .iter()
            .chain(tags.exclude.iter())
            .find(|t| t.trim().is_empty())
        {
            return Err(Error::InvalidFilterPattern {
                pattern: tag.clone(),
                reason: "tag is empty".into(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Compiled Filter
// =============================================================================

/// A registry filter with its name patterns compiled once
#[derive(Debug, Clone, Default)]
pub struct CompiledFilter {
    name_include: Vec<Pattern>,
    name_exclude: Vec<Pattern>,
    tag_include: Vec<String>,
    tag_exclude: Vec<String>,
}

impl CompiledFilter {
    /// Compile a registry filter. Patterns that fail to compile never match;
    /// specs are validated before they are stored, so this only guards
    /// resources written around the admission path.
    pub fn new(filter: Option<&RegistryFilter>) -> Self {
        let Some(filter) = filter else {
            return Self::default();
        };

        let compile = |patterns: &[String]| -> Vec<Pattern> {
            patterns
                .iter()
                .filter_map(|p| match Pattern::new(p) {
                    Ok(pattern) => Some(pattern),
                    Err(e) => {
                        tracing::warn!("Ignoring invalid name pattern '{}': {}", p, e.msg);
                        None
                    }
                })
                .collect()
        };

        let empty = IncludeExclude::default();
        let names = filter.names.as_ref().unwrap_or(&empty);
        let tags = filter.tags.as_ref().unwrap_or(&empty);

        Self {
            name_include: compile(&names.include),
            name_exclude: compile(&names.exclude),
            tag_include: tags.include.clone(),
            tag_exclude: tags.exclude.clone(),
        }
    }

    /// Check if no stage is configured
    pub fn is_identity(&self) -> bool {
        self.name_include.is_empty()
            && self.name_exclude.is_empty()
            && self.tag_include.is_empty()
            && self.tag_exclude.is_empty()
    }

    /// Name stage: at least one include matches, no exclude matches
    fn admits_name(&self, name: &str) -> bool {
        if !self.name_include.is_empty() && !self.name_include.iter().any(|p| p.matches(name)) {
            return false;
        }
        !self.name_exclude.iter().any(|p| p.matches(name))
    }

    /// Tag stage: carries at least one included tag, none of the excluded
    fn admits_tags(&self, entry: &RegistryServerEntry) -> bool {
        if !self.tag_include.is_empty() && !self.tag_include.iter().any(|t| entry.has_tag(t)) {
            return false;
        }
        !self.tag_exclude.iter().any(|t| entry.has_tag(t))
    }

    /// Check if an entry passes both stages
    pub fn admits(&self, entry: &RegistryServerEntry) -> bool {
        self.admits_name(&entry.name) && self.admits_tags(entry)
    }

    /// Filter entries, preserving order
    pub fn apply(&self, entries: Vec<RegistryServerEntry>) -> Vec<RegistryServerEntry> {
        if self.is_identity() {
            return entries;
        }
        entries.into_iter().filter(|e| self.admits(e)).collect()
    }
}

/// Apply a registry's declarative filter
pub fn apply_filter(
    entries: Vec<RegistryServerEntry>,
    filter: Option<&RegistryFilter>,
) -> Vec<RegistryServerEntry> {
    CompiledFilter::new(filter).apply(entries)
}

// =============================================================================
// Query Stage
// =============================================================================

/// Request-time narrowing of an already filtered server list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerQuery {
    /// Entry must carry at least one of these tags (empty: no tag filter)
    pub tags: Vec<String>,
    pub offset: usize,
    pub limit: usize,
}

impl Default for ServerQuery {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            offset: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl ServerQuery {
    /// Build a query, clamping `limit` to [1, 100] and `offset` to >= 0
    pub fn new(tags: Vec<String>, offset: Option<i64>, limit: Option<i64>) -> Self {
        let offset = offset.unwrap_or(0).max(0) as usize;
        let limit = limit
            .map(|l| l.clamp(1, MAX_PAGE_LIMIT as i64) as usize)
            .unwrap_or(DEFAULT_PAGE_LIMIT);

        Self {
            tags: tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            offset,
            limit,
        }
    }

    /// Parse a comma separated tag list
    pub fn parse_tags(raw: Option<&str>) -> Vec<String> {
        raw.map(|s| s.split(',').map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matching entries before slicing
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

/// Tag-match then slice
pub fn paginate(entries: &[RegistryServerEntry], query: &ServerQuery) -> Page<RegistryServerEntry> {
    let matching: Vec<&RegistryServerEntry> = entries
        .iter()
        .filter(|e| query.tags.is_empty() || query.tags.iter().any(|t| e.has_tag(t)))
        .collect();

    let total = matching.len();
    let items = matching
        .into_iter()
        .skip(query.offset)
        .take(query.limit)
        .cloned()
        .collect();

    Page {
        items,
        total,
        offset: query.offset,
        limit: query.limit,
    }
}
