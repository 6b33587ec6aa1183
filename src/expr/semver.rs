// src/expr/semver.rs

//! Version comparison backing `semverCompare`.
//!
//! Accepts `MAJOR[.MINOR[.PATCH]][-PRERELEASE][+BUILD]` with an optional
//! leading `v`. Missing components count as zero and build metadata is
//! ignored, following semver precedence rules.

use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Version {
    core: [u64; 3],
    pre: Vec<Identifier>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Identifier {
    Numeric(u64),
    Alpha(String),
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Identifier::Numeric(a), Identifier::Numeric(b)) => a.cmp(b),
            (Identifier::Numeric(_), Identifier::Alpha(_)) => Ordering::Less,
            (Identifier::Alpha(_), Identifier::Numeric(_)) => Ordering::Greater,
            (Identifier::Alpha(a), Identifier::Alpha(b)) => a.as_bytes().cmp(b.as_bytes()),
        }
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two version strings.
pub fn compare(a: &str, b: &str) -> Result<Ordering, String> {
    let a = parse(a)?;
    let b = parse(b)?;

    let ordering = a.core.cmp(&b.core).then_with(|| {
        // A release sorts after any of its pre-releases.
        match (a.pre.is_empty(), b.pre.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => a.pre.cmp(&b.pre),
        }
    });
    Ok(ordering)
}

fn parse(text: &str) -> Result<Version, String> {
    let trimmed = text.trim();
    let without_prefix = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    let without_build = without_prefix
        .split_once('+')
        .map_or(without_prefix, |(version, _build)| version);
    let (core_text, pre_text) = match without_build.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (without_build, None),
    };

    if core_text.is_empty() {
        return Err(format!("'{text}' is not a version"));
    }

    let mut core = [0u64; 3];
    let parts: Vec<&str> = core_text.split('.').collect();
    if parts.len() > 3 {
        return Err(format!("'{text}' has more than three version components"));
    }
    for (slot, part) in core.iter_mut().zip(parts) {
        *slot = part
            .parse::<u64>()
            .map_err(|_| format!("'{text}' has a non-numeric version component '{part}'"))?;
    }

    let pre = match pre_text {
        None => Vec::new(),
        Some("") => return Err(format!("'{text}' has an empty pre-release")),
        Some(pre) => pre
            .split('.')
            .map(|id| match id.parse::<u64>() {
                Ok(n) => Identifier::Numeric(n),
                Err(_) => Identifier::Alpha(id.to_string()),
            })
            .collect(),
    };

    Ok(Version { core, pre })
}
