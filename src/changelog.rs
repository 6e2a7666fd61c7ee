//! Extracts the release notes for a single version from a package's
//! `CHANGELOG.md`.
//!
//! Changelogs are expected to be a sequence of version-headed sections, most
//! recent first, each optionally split into `Major Changes`, `Minor Changes`
//! and `Patch Changes` sub-sections:
//!
//! ```text
//! # pkg-a
//!
//! ## 1.1.0
//!
//! ### Minor Changes
//!
//! - abc123: Add a thing
//!
//! ## 1.0.0
//! ...
//! ```
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use regex::Regex;
use std::{ops::Range, sync::LazyLock};

pub mod ordering;

static LEVEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(major|minor|patch)").unwrap());

/// Severity of a change, ordered from least to most significant.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum BumpLevel {
    /// Only dependency updates, or no explicit category.
    #[default]
    Dependency = 0,
    Patch = 1,
    Minor = 2,
    Major = 3,
}

impl BumpLevel {
    /// Parse a category name (`major`, `minor`, `patch`) case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "major" => Some(Self::Major),
            "minor" => Some(Self::Minor),
            "patch" => Some(Self::Patch),
            _ => None,
        }
    }
}

/// Release notes for one version of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogEntry {
    pub content: String,
    pub highest_level: BumpLevel,
}

struct Heading {
    level: HeadingLevel,
    text: String,
    span: Range<usize>,
}

/// Find the section headed by `version` and return its trimmed body along
/// with the highest change category listed inside it.
///
/// Returns `None` when no heading matches `version` exactly.
pub fn get_changelog_entry(
    changelog: &str,
    version: &str,
) -> Option<ChangelogEntry> {
    let headings = collect_headings(changelog);

    let start = headings.iter().position(|h| h.text == version)?;
    let start_heading = &headings[start];

    let end = headings[start + 1..]
        .iter()
        .position(|h| h.level <= start_heading.level)
        .map(|offset| start + 1 + offset);

    let body_end = end
        .map(|i| headings[i].span.start)
        .unwrap_or(changelog.len());

    let highest_level = headings[start + 1..end.unwrap_or(headings.len())]
        .iter()
        .filter_map(|h| LEVEL_REGEX.find(&h.text))
        .filter_map(|m| BumpLevel::from_name(m.as_str()))
        .max()
        .unwrap_or_default();

    Some(ChangelogEntry {
        content: changelog[start_heading.span.end..body_end]
            .trim()
            .to_string(),
        highest_level,
    })
}

fn collect_headings(changelog: &str) -> Vec<Heading> {
    let mut headings = vec![];
    let mut current: Option<Heading> = None;

    for (event, span) in Parser::new(changelog).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some(Heading {
                    level,
                    text: String::new(),
                    span,
                });
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some(heading) = current.as_mut() {
                    heading.text.push_str(&text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(mut heading) = current.take() {
                    heading.text = heading.text.trim().to_string();
                    headings.push(heading);
                }
            }
            _ => {}
        }
    }

    headings
}
