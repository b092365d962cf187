use anyhow::{anyhow, Context, Result};
use std::fmt;

/// A `major.minor.patch` release version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    /// Parse a version, ignoring an optional tag prefix such as `v`
    pub fn parse_with_prefix(input: &str, prefix: &str) -> Option<Self> {
        let trimmed = input.trim();
        let stripped = trimmed.strip_prefix(prefix).unwrap_or(trimmed);
        Self::parse(stripped).ok()
    }

    /// Parse a strict `major.minor.patch` string
    pub fn parse(input: &str) -> Result<Self> {
        let parts = parse_version_parts(input)?;
        if parts.len() != 3 {
            return Err(anyhow!("Expected major.minor.patch, got '{}'", input));
        }
        Ok(Version {
            major: parts[0],
            minor: parts[1],
            patch: parts[2],
        })
    }

    /// Next patch release, `None` if the patch number is already at its maximum
    pub fn bump_patch(self) -> Option<Self> {
        Some(Version {
            patch: self.patch.checked_add(1)?,
            ..self
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Check if a tool version meets a minimum requirement.
/// Missing components count as zero, so "2.39" compares as "2.39.0".
pub fn version_meets_minimum(version: &str, minimum: &str) -> Result<bool> {
    let version_parts = parse_version_parts(version)?;
    let minimum_parts = parse_version_parts(minimum)?;

    for i in 0..3 {
        let v = version_parts.get(i).unwrap_or(&0);
        let m = minimum_parts.get(i).unwrap_or(&0);

        if v > m {
            return Ok(true);
        } else if v < m {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Parse version string into numeric parts
fn parse_version_parts(version: &str) -> Result<Vec<u32>> {
    version
        .split('.')
        .map(|part| {
            part.parse::<u32>()
                .with_context(|| format!("Invalid version part: {}", part))
        })
        .collect()
}
