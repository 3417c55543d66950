//! Principals, capability flags and path access rules.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::entry::Sorting;
use crate::paths;
use crate::vfs::VfsOps;

/// Per-principal capability flags. Never mutated by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Permissions {
    pub admin: bool,
    pub create: bool,
    pub rename: bool,
    pub modify: bool,
    pub delete: bool,
    pub download: bool,
}

impl Permissions {
    /// Everything allowed.
    pub fn all() -> Self {
        Self {
            admin: true,
            create: true,
            rename: true,
            modify: true,
            delete: true,
            download: true,
        }
    }
}

/// How a rule selects paths.
#[derive(Debug, Clone)]
pub enum RuleMatcher {
    /// Plain string prefix of the resource path.
    Prefix(String),
    Regex(Regex),
}

/// Allow or deny access to the paths a matcher selects.
#[derive(Debug, Clone)]
pub struct Rule {
    pub allow: bool,
    pub matcher: RuleMatcher,
}

impl Rule {
    pub fn prefix(path: impl Into<String>, allow: bool) -> Self {
        Self {
            allow,
            matcher: RuleMatcher::Prefix(path.into()),
        }
    }

    pub fn regex(regex: Regex, allow: bool) -> Self {
        Self {
            allow,
            matcher: RuleMatcher::Regex(regex),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match &self.matcher {
            RuleMatcher::Prefix(prefix) => path.starts_with(prefix.as_str()),
            RuleMatcher::Regex(re) => re.is_match(path),
        }
    }
}

/// Decides whether a resource path is visible to a caller.
pub trait AccessCheck: Send + Sync {
    fn check(&self, path: &str) -> bool;
}

/// The authenticated caller: identity, capabilities and scoped storage.
#[derive(Clone)]
pub struct Principal {
    pub username: String,
    /// Host-side scope, reported to command hooks.
    pub scope: String,
    pub permissions: Permissions,
    pub rules: Vec<Rule>,
    pub hide_dotfiles: bool,
    pub sorting: Sorting,
    pub fs: Arc<dyn VfsOps>,
}

impl Principal {
    /// A principal with no rules and default sorting.
    pub fn new(username: impl Into<String>, permissions: Permissions, fs: Arc<dyn VfsOps>) -> Self {
        Self {
            username: username.into(),
            scope: "/".to_string(),
            permissions,
            rules: Vec::new(),
            hide_dotfiles: false,
            sorting: Sorting::default(),
            fs,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_hide_dotfiles(mut self, hide: bool) -> Self {
        self.hide_dotfiles = hide;
        self
    }

    pub fn with_sorting(mut self, sorting: Sorting) -> Self {
        self.sorting = sorting;
        self
    }
}

impl AccessCheck for Principal {
    /// Last matching rule wins; paths no rule mentions are allowed.
    fn check(&self, path: &str) -> bool {
        if self.hide_dotfiles && paths::base_name(path).starts_with('.') {
            return false;
        }

        let mut allow = true;
        for rule in &self.rules {
            if rule.matches(path) {
                allow = rule.allow;
            }
        }
        allow
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("username", &self.username)
            .field("scope", &self.scope)
            .field("permissions", &self.permissions)
            .field("rules", &self.rules.len())
            .field("hide_dotfiles", &self.hide_dotfiles)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryBackend;

    fn principal(rules: Vec<Rule>) -> Principal {
        Principal::new("alice", Permissions::all(), Arc::new(MemoryBackend::new()))
            .with_rules(rules)
    }

    #[test]
    fn test_no_rules_allows_everything() {
        assert!(principal(vec![]).check("/anything/at/all"));
    }

    #[test]
    fn test_last_matching_rule_wins() {
        let p = principal(vec![
            Rule::prefix("/private", false),
            Rule::prefix("/private/shared", true),
        ]);
        assert!(!p.check("/private/secret.txt"));
        assert!(p.check("/private/shared/doc.txt"));
        assert!(p.check("/public"));
    }

    #[test]
    fn test_regex_rule() {
        let p = principal(vec![Rule::regex(Regex::new(r"\.key$").unwrap(), false)]);
        assert!(!p.check("/certs/server.key"));
        assert!(p.check("/certs/server.crt"));
    }

    #[test]
    fn test_hide_dotfiles() {
        let p = principal(vec![]).with_hide_dotfiles(true);
        assert!(!p.check("/home/.bashrc"));
        assert!(p.check("/home/notes.txt"));
    }
}
