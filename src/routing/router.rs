//! Protection rule lookup.
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in priority order (acceptable for typical rule counts)
//! - Explicit `None` rather than a silent default rule

use axum::http::Request;

use crate::config::RouteConfig;
use crate::routing::matcher::{AndMatcher, HostMatcher, Matcher, PathPrefixMatcher, RequestTarget};

/// A compiled protection rule.
#[derive(Debug)]
pub struct ProtectionRule {
    pub name: String,
    pub limiter: Option<String>,
    pub csrf: bool,
    pub priority: u32,
    matcher: AndMatcher,
}

impl ProtectionRule {
    pub fn from_config(config: &RouteConfig) -> Self {
        let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();
        if let Some(host) = &config.host {
            matchers.push(Box::new(HostMatcher::new(host.clone())));
        }
        if let Some(prefix) = &config.path_prefix {
            matchers.push(Box::new(PathPrefixMatcher::new(prefix.clone())));
        }

        Self {
            name: config.name.clone(),
            limiter: config.limiter.clone(),
            csrf: config.csrf,
            priority: config.priority,
            matcher: AndMatcher::new(matchers),
        }
    }

    pub fn matches(&self, target: &RequestTarget<'_>) -> bool {
        self.matcher.matches(target)
    }
}

/// Ordered set of protection rules.
#[derive(Debug, Default)]
pub struct ProtectionRules {
    rules: Vec<ProtectionRule>,
}

impl ProtectionRules {
    /// Compile rules; higher priority first, ties keep configuration order.
    pub fn from_config(routes: &[RouteConfig]) -> Self {
        let mut rules: Vec<_> = routes.iter().map(ProtectionRule::from_config).collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { rules }
    }

    /// First rule matching the request, if any.
    pub fn match_request<B>(&self, req: &Request<B>) -> Option<&ProtectionRule> {
        let target = RequestTarget::from_request(req);
        self.rules.iter().find(|rule| rule.matches(&target))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
