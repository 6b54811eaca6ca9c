//! Access Decision Engine
//! Mission: Decide, per request path and principal, whether to allow,
//! deny, or challenge

use std::collections::HashSet;

use tracing::warn;

use crate::auth::models::Principal;

/// Outcome of evaluating a request path against the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Path matched a bypass pattern; no principal needed.
    PublicAllowed,
    /// Path is protected and no authenticated principal was present.
    AuthenticationRequired,
    /// The principal holds at least one required authority.
    Granted,
    /// The principal holds none of the required authorities,
    /// or no rule matched the path (secure-by-default).
    Denied,
}

/// A path pattern: either an exact path or an `/**` subtree prefix.
///
/// `"/admin/**"` matches `/admin`, `/admin/` and anything below; it does not
/// match `/administrator`. Matching is case-sensitive and performs no
/// trailing-slash normalization. `"/**"` matches every path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    kind: MatchKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MatchKind {
    Exact(String),
    Subtree(String), // prefix without the trailing "/**"
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PolicyError> {
        if pattern.is_empty() || !pattern.starts_with('/') {
            return Err(PolicyError::InvalidPattern {
                pattern: pattern.to_string(),
            });
        }

        let kind = if let Some(prefix) = pattern.strip_suffix("/**") {
            if prefix.contains("**") {
                return Err(PolicyError::InvalidPattern {
                    pattern: pattern.to_string(),
                });
            }
            MatchKind::Subtree(prefix.to_string())
        } else if pattern.contains("**") {
            // "**" anywhere but as the "/**" suffix is not supported
            return Err(PolicyError::InvalidPattern {
                pattern: pattern.to_string(),
            });
        } else {
            MatchKind::Exact(pattern.to_string())
        };

        Ok(Self {
            raw: pattern.to_string(),
            kind,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        match &self.kind {
            MatchKind::Exact(p) => path == p,
            // "/**" has an empty prefix and matches any rooted path
            MatchKind::Subtree(prefix) if prefix.is_empty() => path.starts_with('/'),
            MatchKind::Subtree(prefix) => {
                path == prefix || path.strip_prefix(prefix.as_str()).is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }

    /// True when every path matched by `other` is also matched by `self`.
    fn covers(&self, other: &PathPattern) -> bool {
        match (&self.kind, &other.kind) {
            (MatchKind::Exact(a), MatchKind::Exact(b)) => a == b,
            (MatchKind::Exact(_), MatchKind::Subtree(_)) => false,
            (MatchKind::Subtree(_), MatchKind::Exact(b)) => self.matches(b),
            (MatchKind::Subtree(a), MatchKind::Subtree(b)) => {
                // subtree(b) ⊆ subtree(a) iff b's root lies inside subtree(a)
                a.is_empty() || (!b.is_empty() && self.matches(b))
            }
        }
    }
}

/// One ordered authorization rule: a path pattern plus the authorities of
/// which the principal must hold at least one.
#[derive(Debug, Clone)]
pub struct AccessRule {
    pattern: PathPattern,
    any_of: HashSet<String>,
}

impl AccessRule {
    pub fn new<I, S>(pattern: &str, any_of: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pattern = PathPattern::parse(pattern)?;
        let any_of: HashSet<String> = any_of.into_iter().map(Into::into).collect();
        if any_of.is_empty() {
            return Err(PolicyError::EmptyAuthorities {
                pattern: pattern.raw,
            });
        }
        Ok(Self { pattern, any_of })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

/// An immutable, validated authorization policy.
///
/// Bypass patterns are checked first; then rules, in order, first match
/// wins. A path that matches nothing is denied: accidental default-allow is
/// the most dangerous misconfiguration in this domain, so the default is
/// deny and anything public must be listed explicitly.
///
/// Built once at startup and shared read-only across request tasks; holds
/// no interior mutability, so evaluation is pure and idempotent.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    bypass: Vec<PathPattern>,
    rules: Vec<AccessRule>,
}

impl AccessPolicy {
    /// Validate and freeze a rule set.
    ///
    /// Rejects any bypass pattern that covers a restrictive rule's pattern:
    /// since bypasses are evaluated first, such a rule could never fire and
    /// a protected subtree would silently become public. This is a fatal
    /// startup error, not a runtime condition.
    pub fn new(bypass_patterns: &[&str], rules: Vec<AccessRule>) -> Result<Self, PolicyError> {
        let bypass = bypass_patterns
            .iter()
            .map(|p| PathPattern::parse(p))
            .collect::<Result<Vec<_>, _>>()?;

        for b in &bypass {
            for rule in &rules {
                if b.covers(&rule.pattern) {
                    return Err(PolicyError::ShadowedRule {
                        bypass: b.raw.clone(),
                        rule: rule.pattern.raw.clone(),
                    });
                }
            }
        }

        // Rule order is a configuration contract; a broader rule placed
        // before a narrower one makes the narrower rule unreachable.
        for (i, earlier) in rules.iter().enumerate() {
            for later in &rules[i + 1..] {
                if earlier.pattern.covers(&later.pattern) {
                    warn!(
                        earlier = earlier.pattern.as_str(),
                        later = later.pattern.as_str(),
                        "Access rule is unreachable; order rules most-specific first"
                    );
                }
            }
        }

        Ok(Self { bypass, rules })
    }

    /// Evaluate a request.
    ///
    /// Pure function of (path, principal): no side effects, same inputs
    /// always yield the same decision. Only the principal's authority set
    /// is consulted.
    pub fn decide(&self, path: &str, principal: Option<&Principal>) -> Decision {
        if self.bypass.iter().any(|p| p.matches(path)) {
            return Decision::PublicAllowed;
        }

        let Some(principal) = principal else {
            return Decision::AuthenticationRequired;
        };

        match self.rules.iter().find(|r| r.pattern.matches(path)) {
            Some(rule) => {
                if rule.any_of.iter().any(|a| principal.authorities.contains(a)) {
                    Decision::Granted
                } else {
                    Decision::Denied
                }
            }
            None => Decision::Denied,
        }
    }
}

/// Fatal policy misconfiguration, detected once at load.
#[derive(Debug, PartialEq, Eq)]
pub enum PolicyError {
    /// Pattern is empty, unrooted, or uses `**` anywhere but as `/**` suffix.
    InvalidPattern { pattern: String },
    /// A rule with no required authorities would be unsatisfiable.
    EmptyAuthorities { pattern: String },
    /// A bypass pattern shadows a restrictive rule, making it unreachable.
    ShadowedRule { bypass: String, rule: String },
}

impl std::fmt::Display for PolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyError::InvalidPattern { pattern } => {
                write!(f, "Invalid path pattern: '{pattern}'")
            }
            PolicyError::EmptyAuthorities { pattern } => {
                write!(f, "Rule for '{pattern}' has an empty authority set")
            }
            PolicyError::ShadowedRule { bypass, rule } => write!(
                f,
                "Bypass pattern '{bypass}' shadows rule '{rule}'; the rule would never apply"
            ),
        }
    }
}

impl std::error::Error for PolicyError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::Principal;

    fn principal(authorities: &[&str]) -> Principal {
        Principal::from_session("test", authorities.iter().map(|s| s.to_string()))
    }

    fn portal_rules() -> Vec<AccessRule> {
        vec![
            AccessRule::new("/admin/**", ["ROLE_ADMIN"]).unwrap(),
            AccessRule::new("/student/**", ["ROLE_STUDENT", "ROLE_ADMIN"]).unwrap(),
        ]
    }

    fn portal_policy() -> AccessPolicy {
        AccessPolicy::new(&["/"], portal_rules()).unwrap()
    }

    #[test]
    fn test_subtree_pattern_matching() {
        let p = PathPattern::parse("/admin/**").unwrap();
        assert!(p.matches("/admin"));
        assert!(p.matches("/admin/"));
        assert!(p.matches("/admin/grades"));
        assert!(p.matches("/admin/grades/2022"));
        assert!(!p.matches("/administrator"));
        assert!(!p.matches("/Admin/grades"));
        assert!(!p.matches("/"));
    }

    #[test]
    fn test_exact_pattern_matching() {
        let p = PathPattern::parse("/").unwrap();
        assert!(p.matches("/"));
        assert!(!p.matches("/home"));

        let p = PathPattern::parse("/health").unwrap();
        assert!(p.matches("/health"));
        // no trailing-slash normalization
        assert!(!p.matches("/health/"));
    }

    #[test]
    fn test_match_all_pattern() {
        let p = PathPattern::parse("/**").unwrap();
        assert!(p.matches("/"));
        assert!(p.matches("/anything/at/all"));
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        for bad in ["", "admin/**", "/a/**/b", "/**/x", "/a**"] {
            assert!(
                PathPattern::parse(bad).is_err(),
                "pattern '{bad}' should be rejected"
            );
        }
    }

    #[test]
    fn test_bypass_wins_regardless_of_principal() {
        let policy = portal_policy();

        assert_eq!(policy.decide("/", None), Decision::PublicAllowed);
        assert_eq!(
            policy.decide("/", Some(&principal(&["ROLE_STUDENT"]))),
            Decision::PublicAllowed
        );
        assert_eq!(
            policy.decide("/", Some(&principal(&[]))),
            Decision::PublicAllowed
        );
    }

    #[test]
    fn test_protected_path_requires_authentication() {
        let policy = portal_policy();

        assert_eq!(
            policy.decide("/admin/grades", None),
            Decision::AuthenticationRequired
        );
        assert_eq!(
            policy.decide("/student/books", None),
            Decision::AuthenticationRequired
        );
    }

    #[test]
    fn test_role_gating() {
        let policy = portal_policy();
        let admin = principal(&["ROLE_ADMIN"]);
        let student = principal(&["ROLE_STUDENT"]);

        assert_eq!(policy.decide("/admin/grades", Some(&admin)), Decision::Granted);
        assert_eq!(policy.decide("/admin/grades", Some(&student)), Decision::Denied);
        assert_eq!(policy.decide("/student/books", Some(&student)), Decision::Granted);
        // ADMIN is listed on the student rule too
        assert_eq!(policy.decide("/student/books", Some(&admin)), Decision::Granted);
    }

    #[test]
    fn test_unmatched_path_is_denied_by_default() {
        let policy = portal_policy();
        let admin = principal(&["ROLE_ADMIN"]);

        assert_eq!(policy.decide("/secret", Some(&admin)), Decision::Denied);
        assert_eq!(policy.decide("/secret", None), Decision::AuthenticationRequired);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // /student/admin-docs falls under /student/**, not /admin/**
        let rules = vec![
            AccessRule::new("/student/admin-docs/**", ["ROLE_ADMIN"]).unwrap(),
            AccessRule::new("/student/**", ["ROLE_STUDENT", "ROLE_ADMIN"]).unwrap(),
        ];
        let policy = AccessPolicy::new(&[], rules).unwrap();
        let student = principal(&["ROLE_STUDENT"]);

        assert_eq!(
            policy.decide("/student/admin-docs/list", Some(&student)),
            Decision::Denied
        );
        assert_eq!(
            policy.decide("/student/books", Some(&student)),
            Decision::Granted
        );
    }

    #[test]
    fn test_blanket_bypass_is_a_startup_error() {
        // "/**" placed in the bypass list would shadow every rule: the
        // historical blanket-allow misconfiguration must not load.
        let result = AccessPolicy::new(&["/**"], portal_rules());
        assert_eq!(
            result.unwrap_err(),
            PolicyError::ShadowedRule {
                bypass: "/**".to_string(),
                rule: "/admin/**".to_string(),
            }
        );
    }

    #[test]
    fn test_subtree_bypass_shadowing_detected() {
        let rules = vec![AccessRule::new("/admin/grades/**", ["ROLE_ADMIN"]).unwrap()];
        let result = AccessPolicy::new(&["/admin/**"], rules);
        assert!(matches!(result, Err(PolicyError::ShadowedRule { .. })));

        // An exact bypass inside a protected subtree does not cover the
        // whole rule and is allowed (e.g. a public landing page).
        let rules = vec![AccessRule::new("/admin/**", ["ROLE_ADMIN"]).unwrap()];
        let policy = AccessPolicy::new(&["/admin/help"], rules).unwrap();
        assert_eq!(policy.decide("/admin/help", None), Decision::PublicAllowed);
        assert_eq!(
            policy.decide("/admin/grades", None),
            Decision::AuthenticationRequired
        );
    }

    #[test]
    fn test_empty_authority_set_rejected() {
        let empty: [&str; 0] = [];
        assert_eq!(
            AccessRule::new("/admin/**", empty).unwrap_err(),
            PolicyError::EmptyAuthorities {
                pattern: "/admin/**".to_string()
            }
        );
    }

    #[test]
    fn test_decision_is_idempotent() {
        let policy = portal_policy();
        let student = principal(&["ROLE_STUDENT"]);

        let first = policy.decide("/student/books", Some(&student));
        let second = policy.decide("/student/books", Some(&student));
        assert_eq!(first, second);
        assert_eq!(first, Decision::Granted);
    }
}
