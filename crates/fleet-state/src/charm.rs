//! Charm references — the deployed software identifier of a service or unit.
//!
//! A reference has the form `schema:[~user/]series/name[-revision]`, e.g.
//! `cs:precise/mysql-3` or `local:~ops/trusty/logging`. The schema picks the
//! repository the charm came from; stripping the revision yields the *base*
//! reference used as the key for freshness lookups.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Schemas a charm reference may carry.
pub const SCHEMAS: [&str; 2] = ["cs", "local"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CharmUrlError {
    #[error("charm URL {0:?} has no schema")]
    MissingSchema(String),

    #[error("charm URL {url:?} has unsupported schema {schema:?}")]
    UnsupportedSchema { url: String, schema: String },

    #[error("charm URL {0:?} has invalid form")]
    InvalidForm(String),

    #[error("charm URL {url:?} has invalid {part} {value:?}")]
    InvalidPart {
        url: String,
        part: &'static str,
        value: String,
    },
}

/// Parsed charm reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CharmUrl {
    pub schema: String,
    pub user: Option<String>,
    pub series: String,
    pub name: String,
    /// `None` for a base reference.
    pub revision: Option<i64>,
}

impl CharmUrl {
    /// Returns a copy of this reference carrying `revision` instead.
    pub fn with_revision(&self, revision: Option<i64>) -> Self {
        Self {
            revision,
            ..self.clone()
        }
    }

    /// The reference with its revision stripped.
    pub fn base(&self) -> Self {
        self.with_revision(None)
    }

    /// Deployed revision, or 0 when none was recorded.
    pub fn revision_or_zero(&self) -> i64 {
        self.revision.unwrap_or(0)
    }
}

impl fmt::Display for CharmUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.schema)?;
        if let Some(user) = &self.user {
            write!(f, "~{user}/")?;
        }
        write!(f, "{}/{}", self.series, self.name)?;
        if let Some(revision) = self.revision {
            write!(f, "-{revision}")?;
        }
        Ok(())
    }
}

impl FromStr for CharmUrl {
    type Err = CharmUrlError;

    fn from_str(url: &str) -> Result<Self, Self::Err> {
        let (schema, rest) = url
            .split_once(':')
            .ok_or_else(|| CharmUrlError::MissingSchema(url.to_string()))?;
        if !SCHEMAS.contains(&schema) {
            return Err(CharmUrlError::UnsupportedSchema {
                url: url.to_string(),
                schema: schema.to_string(),
            });
        }

        let mut parts: Vec<&str> = rest.split('/').collect();
        let user = match parts.first() {
            Some(first) if first.starts_with('~') => {
                let user = &first[1..];
                if schema == "local" || !valid_user(user) {
                    return Err(invalid_part(url, "user", user));
                }
                parts.remove(0);
                Some(user.to_string())
            }
            _ => None,
        };
        let [series, name_rev] = parts[..] else {
            return Err(CharmUrlError::InvalidForm(url.to_string()));
        };
        if !valid_series(series) {
            return Err(invalid_part(url, "series", series));
        }

        let (name, revision) = split_revision(name_rev);
        if !valid_name(name) {
            return Err(invalid_part(url, "name", name));
        }

        Ok(CharmUrl {
            schema: schema.to_string(),
            user,
            series: series.to_string(),
            name: name.to_string(),
            revision,
        })
    }
}

impl TryFrom<String> for CharmUrl {
    type Error = CharmUrlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CharmUrl> for String {
    fn from(url: CharmUrl) -> Self {
        url.to_string()
    }
}

fn invalid_part(url: &str, part: &'static str, value: &str) -> CharmUrlError {
    CharmUrlError::InvalidPart {
        url: url.to_string(),
        part,
        value: value.to_string(),
    }
}

/// Splits a trailing `-N` revision off a charm name.
fn split_revision(name_rev: &str) -> (&str, Option<i64>) {
    if let Some((name, rev)) = name_rev.rsplit_once('-') {
        if !rev.is_empty() && rev.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(revision) = rev.parse() {
                return (name, Some(revision));
            }
        }
    }
    (name_rev, None)
}

fn valid_user(user: &str) -> bool {
    !user.is_empty()
        && user
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b"+-.".contains(&b))
}

fn valid_series(series: &str) -> bool {
    series.starts_with(|c: char| c.is_ascii_lowercase())
        && series
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

fn valid_name(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_lowercase())
        && !name.ends_with('-')
        && !name.contains("--")
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_store_url_with_revision() {
        let url: CharmUrl = "cs:precise/mysql-3".parse().unwrap();
        assert_eq!(url.schema, "cs");
        assert_eq!(url.user, None);
        assert_eq!(url.series, "precise");
        assert_eq!(url.name, "mysql");
        assert_eq!(url.revision, Some(3));
        assert_eq!(url.to_string(), "cs:precise/mysql-3");
    }

    #[test]
    fn parses_user_and_hyphenated_name() {
        let url: CharmUrl = "cs:~ops/trusty/haproxy-lb-12".parse().unwrap();
        assert_eq!(url.user.as_deref(), Some("ops"));
        assert_eq!(url.name, "haproxy-lb");
        assert_eq!(url.revision, Some(12));
    }

    #[test]
    fn base_strips_revision() {
        let url: CharmUrl = "local:precise/logging-7".parse().unwrap();
        assert_eq!(url.base().to_string(), "local:precise/logging");
        assert_eq!(url.base().revision_or_zero(), 0);
    }

    #[test]
    fn rejects_malformed_urls() {
        assert!(matches!(
            "precise/mysql".parse::<CharmUrl>(),
            Err(CharmUrlError::MissingSchema(_))
        ));
        assert!(matches!(
            "http:precise/mysql".parse::<CharmUrl>(),
            Err(CharmUrlError::UnsupportedSchema { .. })
        ));
        assert!(matches!(
            "cs:mysql".parse::<CharmUrl>(),
            Err(CharmUrlError::InvalidForm(_))
        ));
        assert!(matches!(
            "cs:precise/MySQL".parse::<CharmUrl>(),
            Err(CharmUrlError::InvalidPart { part: "name", .. })
        ));
        assert!(matches!(
            "local:~ops/precise/mysql".parse::<CharmUrl>(),
            Err(CharmUrlError::InvalidPart { part: "user", .. })
        ));
    }

    #[test]
    fn serializes_as_string() {
        let url: CharmUrl = "cs:precise/wordpress-5".parse().unwrap();
        let json = serde_json::to_string(&url).unwrap();
        assert_eq!(json, "\"cs:precise/wordpress-5\"");
        let back: CharmUrl = serde_json::from_str(&json).unwrap();
        assert_eq!(back, url);
    }
}
