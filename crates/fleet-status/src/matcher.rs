//! Unit name patterns.
//!
//! A pattern is `service` or `service/unit`, where each part consists of
//! lowercase letters, digits, hyphens, and `*` wildcards. A bare service
//! pattern means every unit of that service (`mysql` ≡ `mysql/*`). `*`
//! never matches across the `/` separator.

use fleet_state::Unit;
use regex::Regex;

use crate::error::{StatusError, StatusResult};

/// Compiled unit patterns. No patterns matches every unit.
#[derive(Debug, Clone, Default)]
pub struct UnitMatcher {
    patterns: Vec<Regex>,
}

impl UnitMatcher {
    /// Validate and compile `patterns`.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> StatusResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| compile(p.as_ref()))
            .collect::<StatusResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// True if the matcher accepts any unit regardless of its attributes.
    pub fn matches_any(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Decides whether `unit` is in scope.
    ///
    /// A unit is kept if its name matches, if it is a principal and one of
    /// its subordinates matches, or if it is a subordinate and its principal
    /// matches by name. A subordinate is *not* kept just because a sibling
    /// subordinate pulled the principal in.
    pub fn match_unit(&self, unit: &Unit) -> bool {
        if self.matches_any() || self.match_name(&unit.name) {
            return true;
        }
        match unit.principal_name() {
            None => unit.subordinates.iter().any(|sub| self.match_name(sub)),
            Some(principal) => self.match_name(principal),
        }
    }

    fn match_name(&self, name: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(name))
    }
}

fn compile(pattern: &str) -> StatusResult<Regex> {
    let invalid = |reason: &str| StatusError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    let fields: Vec<&str> = pattern.split('/').collect();
    if fields.len() > 2 {
        return Err(invalid("contains too many '/' characters"));
    }
    if !fields.iter().all(|f| valid_field(f)) {
        return Err(invalid("contains invalid characters"));
    }

    let service = glob_to_regex(fields[0]);
    let unit = fields.get(1).map_or_else(|| glob_to_regex("*"), |f| glob_to_regex(f));
    Regex::new(&format!("^{service}/{unit}$")).map_err(|e| invalid(&e.to_string()))
}

fn valid_field(field: &str) -> bool {
    !field.is_empty()
        && field
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'*')
}

fn glob_to_regex(field: &str) -> String {
    field
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("[^/]*")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(name: &str, subordinates: &[&str]) -> Unit {
        Unit {
            name: name.to_string(),
            service: fleet_state::ids::unit_service(name).to_string(),
            life: fleet_state::Life::Alive,
            principal: None,
            machine_id: Some("0".to_string()),
            subordinates: subordinates.iter().map(|s| s.to_string()).collect(),
            charm_url: None,
            ports: Vec::new(),
            public_address: None,
        }
    }

    fn subordinate(name: &str, principal_name: &str) -> Unit {
        Unit {
            principal: Some(principal_name.to_string()),
            machine_id: None,
            ..principal(name, &[])
        }
    }

    #[test]
    fn empty_patterns_match_everything() {
        let m = UnitMatcher::new::<&str>(&[]).unwrap();
        assert!(m.matches_any());
        assert!(m.match_unit(&principal("mysql/0", &[])));
        assert!(m.match_unit(&subordinate("logging/0", "mysql/0")));
    }

    #[test]
    fn non_empty_patterns_never_match_any() {
        assert!(!UnitMatcher::new(&["*"]).unwrap().matches_any());
        assert!(!UnitMatcher::new(&["mysql/0"]).unwrap().matches_any());
    }

    #[test]
    fn bare_service_is_all_units_of_service() {
        let bare = UnitMatcher::new(&["mysql"]).unwrap();
        let explicit = UnitMatcher::new(&["mysql/*"]).unwrap();
        for name in ["mysql/0", "mysql/12", "mysql-slave/0", "wordpress/0"] {
            let unit = principal(name, &[]);
            assert_eq!(bare.match_unit(&unit), explicit.match_unit(&unit), "{name}");
        }
        assert!(bare.match_unit(&principal("mysql/12", &[])));
        assert!(!bare.match_unit(&principal("mysql-slave/0", &[])));
    }

    #[test]
    fn wildcards_stay_within_a_part() {
        let m = UnitMatcher::new(&["my*"]).unwrap();
        assert!(m.match_unit(&principal("mysql/0", &[])));
        assert!(m.match_unit(&principal("my/3", &[])));
        assert!(!m.match_unit(&principal("wordpress/0", &[])));

        let m = UnitMatcher::new(&["*/1"]).unwrap();
        assert!(m.match_unit(&principal("mysql/1", &[])));
        assert!(!m.match_unit(&principal("mysql/10", &[])));
    }

    #[test]
    fn rejects_invalid_patterns() {
        let err = UnitMatcher::new(&["a/b/c"]).unwrap_err();
        assert!(err.to_string().contains("too many '/'"));
        assert!(err.to_string().contains("a/b/c"));

        for bad in ["MySQL", "mysql/", "/0", "my_sql", "mysql/[0]", ""] {
            let err = UnitMatcher::new(&[bad]).unwrap_err();
            assert!(
                matches!(err, StatusError::InvalidPattern { ref pattern, .. } if pattern == bad),
                "{bad}"
            );
        }
    }

    #[test]
    fn one_invalid_pattern_fails_the_set() {
        assert!(UnitMatcher::new(&["mysql", "bad/pat/tern"]).is_err());
    }

    #[test]
    fn principal_pulled_in_by_subordinate() {
        let m = UnitMatcher::new(&["logging/1"]).unwrap();
        let wordpress = principal("wordpress/0", &["logging/1", "monitoring/0"]);
        assert!(m.match_unit(&wordpress));
        assert!(!m.match_unit(&principal("mysql/0", &["logging/0"])));
    }

    #[test]
    fn subordinate_follows_its_principal_only() {
        let m = UnitMatcher::new(&["wordpress/0"]).unwrap();
        assert!(m.match_unit(&subordinate("logging/1", "wordpress/0")));
        assert!(!m.match_unit(&subordinate("logging/0", "mysql/0")));

        // A sibling subordinate matching does not pull in the other one.
        let m = UnitMatcher::new(&["logging/1"]).unwrap();
        assert!(m.match_unit(&subordinate("logging/1", "wordpress/0")));
        assert!(!m.match_unit(&subordinate("monitoring/0", "wordpress/0")));
    }

    #[test]
    fn pattern_order_does_not_matter() {
        let units = [
            principal("wordpress/0", &["logging/1"]),
            subordinate("logging/1", "wordpress/0"),
            principal("mysql/0", &[]),
        ];
        let a = UnitMatcher::new(&["mysql", "logging/1"]).unwrap();
        let b = UnitMatcher::new(&["logging/1", "mysql"]).unwrap();
        for unit in &units {
            assert_eq!(a.match_unit(unit), b.match_unit(unit));
        }
    }
}
