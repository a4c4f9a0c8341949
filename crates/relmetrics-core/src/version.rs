//! Release identifiers and their ordering.
//!
//! Tags such as `rel/commons-lang-3.17.0` are turned into a *safe tag* for
//! file names (`rel_commons-lang-3.17.0`) and into a *label* for chart axes
//! (`3.17.0`). Labels are ordered as semantic versions where possible.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use semver::{Prerelease, Version};

/// Trailing version of a tag: a separator (or start of input), an optional
/// `v`, digit groups joined by `.` or `_`, and an optional `-suffix`.
static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[-_/])v?(\d+(?:[._]\d+)*(?:-[0-9A-Za-z.]+)?)$")
        .expect("label pattern is valid")
});

/// Make a tag usable as a file-name component.
pub fn safe_tag(tag: &str) -> String {
    tag.replace('/', "_")
}

/// The version part of a tag, or the tag itself when it has none.
///
/// Works on both raw and safe tags. Old-style `LANG_2_6` tags read as `2.6`.
pub fn release_label(tag: &str) -> String {
    LABEL_RE
        .captures(tag)
        .and_then(|caps| caps.get(1))
        .map_or_else(|| tag.to_string(), |m| m.as_str().replace('_', "."))
}

/// Ordering key for release labels.
///
/// Labels that read as versions sort by semver precedence. Anything else
/// sorts after them, case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseVersion {
    /// A label that normalized to a semantic version.
    Semver(Version),
    /// A label that did not.
    Unparsed(String),
}

impl ReleaseVersion {
    /// Parse a label (or a full tag, which is reduced to its label first).
    pub fn parse(label: &str) -> Self {
        let label = release_label(label);
        normalize(&label).map_or(Self::Unparsed(label), Self::Semver)
    }
}

/// `3.1` becomes `3.1.0` and `3.0-RC1` becomes `3.0.0-RC1`.
fn normalize(label: &str) -> Option<Version> {
    let (core, pre) = match label.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (label, None),
    };

    let parts = core
        .split('.')
        .map(str::parse::<u64>)
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }

    let mut version = Version::new(
        parts[0],
        parts.get(1).copied().unwrap_or(0),
        parts.get(2).copied().unwrap_or(0),
    );
    if let Some(pre) = pre {
        version.pre = Prerelease::new(pre).ok()?;
    }
    Some(version)
}

impl Ord for ReleaseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Semver(a), Self::Semver(b)) => a.cmp(b),
            (Self::Semver(_), Self::Unparsed(_)) => Ordering::Less,
            (Self::Unparsed(_), Self::Semver(_)) => Ordering::Greater,
            (Self::Unparsed(a), Self::Unparsed(b)) => a
                .to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b)),
        }
    }
}

impl PartialOrd for ReleaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Semver(v) => write!(f, "{v}"),
            Self::Unparsed(s) => write!(f, "{s}"),
        }
    }
}

/// Sort labels in release order.
pub fn sort_releases(labels: &mut [String]) {
    labels.sort_by_cached_key(|label| ReleaseVersion::parse(label));
}
