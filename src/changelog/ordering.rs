//! Presentation order for release sections in the release PR body.
use serde::Serialize;
use std::cmp::Ordering;

use crate::changelog::BumpLevel;

/// A package's rendered release notes, ready to be placed in a PR body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseSection {
    pub name: String,
    pub version: String,
    pub content: String,
    #[serde(skip)]
    pub highest_level: BumpLevel,
    #[serde(skip)]
    pub private: bool,
}

/// Higher severity first; on equal severity public packages come before
/// private ones. Anything else compares equal so a stable sort keeps input
/// order.
pub fn compare_sections(a: &ReleaseSection, b: &ReleaseSection) -> Ordering {
    b.highest_level
        .cmp(&a.highest_level)
        .then_with(|| a.private.cmp(&b.private))
}

/// Stable in-place sort using [`compare_sections`].
pub fn sort_sections(sections: &mut [ReleaseSection]) {
    sections.sort_by(compare_sections);
}
