//! Robots.txt parsing
//!
//! Produces an ordered Allow/Disallow rule list plus a crawl delay for the
//! crawler's own user agent. Rules support `*` wildcards and `$` end
//! anchors; the longest matching path pattern decides, defaulting to allow.

/// Whether a rule permits or forbids matching paths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Allow,
    Disallow,
}

/// A single Allow/Disallow rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub kind: RuleKind,
    pub path: String,
}

/// Parsed robots.txt rules applicable to one user agent
#[derive(Debug, Clone)]
pub struct RobotsRules {
    rules: Vec<Rule>,
    crawl_delay: Option<f64>,
}

impl RobotsRules {
    /// Parses robots.txt content, keeping only the section that applies to
    /// `user_agent`
    ///
    /// Section selection prefers an exact user-agent match over the `*`
    /// wildcard section; once a specific section matches, previously
    /// collected generic rules are discarded. Inline `#` comments are
    /// stripped, and an empty `Disallow:` line means allow-all.
    pub fn parse(content: &str, user_agent: &str) -> Self {
        let mut rules = Vec::new();
        let mut crawl_delay = None;
        let mut in_relevant_section = false;
        let mut found_specific_agent = false;

        let ua_lower = user_agent.to_lowercase();
        // Product token before the version, e.g. "driftnet" from "Driftnet/1.0"
        let ua_product = ua_lower.split('/').next().unwrap_or("").to_string();

        for raw_line in content.lines() {
            let mut line = raw_line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(comment_at) = line.find('#') {
                line = line[..comment_at].trim();
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    let agent = value.to_lowercase();
                    if agent == "*" {
                        in_relevant_section = !found_specific_agent;
                    } else if ua_lower.contains(&agent) || agent.contains(&ua_product) {
                        in_relevant_section = true;
                        if !found_specific_agent {
                            // First specific match supersedes wildcard rules
                            rules.clear();
                            crawl_delay = None;
                            found_specific_agent = true;
                        }
                    } else {
                        in_relevant_section = false;
                    }
                }
                "allow" if in_relevant_section => {
                    if !value.is_empty() {
                        rules.push(Rule {
                            kind: RuleKind::Allow,
                            path: value.to_string(),
                        });
                    }
                }
                "disallow" if in_relevant_section => {
                    if value.is_empty() {
                        // Empty Disallow means everything is allowed
                        rules.push(Rule {
                            kind: RuleKind::Allow,
                            path: "/".to_string(),
                        });
                    } else {
                        rules.push(Rule {
                            kind: RuleKind::Disallow,
                            path: value.to_string(),
                        });
                    }
                }
                "crawl-delay" if in_relevant_section => match value.parse::<f64>() {
                    Ok(delay) if delay >= 0.0 => crawl_delay = Some(delay),
                    _ => tracing::warn!("Invalid Crawl-delay value: {}", value),
                },
                _ => {}
            }
        }

        tracing::debug!(
            "Parsed robots.txt: {} rules, crawl-delay={:?}",
            rules.len(),
            crawl_delay
        );

        Self { rules, crawl_delay }
    }

    /// Rules that allow everything, used when robots.txt cannot be fetched
    pub fn allow_all() -> Self {
        Self {
            rules: Vec::new(),
            crawl_delay: None,
        }
    }

    /// Checks whether a URL path is allowed
    ///
    /// The rule with the longest path pattern that matches wins; when no
    /// rule matches the path is allowed.
    pub fn is_allowed(&self, path: &str) -> bool {
        let mut matched: Option<&Rule> = None;
        let mut longest = 0usize;

        for rule in &self.rules {
            if pattern_matches(&rule.path, path) && rule.path.len() > longest {
                longest = rule.path.len();
                matched = Some(rule);
            }
        }

        match matched {
            Some(rule) => rule.kind == RuleKind::Allow,
            None => true,
        }
    }

    /// Returns the crawl delay in seconds, if one was declared
    pub fn crawl_delay(&self) -> Option<f64> {
        self.crawl_delay
    }

    /// Returns the number of parsed rules
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

/// Matches a robots.txt path pattern against a URL path
///
/// `*` matches any run of characters and a trailing `$` anchors the match
/// at the end of the path; otherwise the pattern matches as a prefix.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    matches_from(pattern.as_bytes(), path.as_bytes())
}

fn matches_from(pattern: &[u8], path: &[u8]) -> bool {
    match pattern.first() {
        // Pattern exhausted: prefix match succeeded
        None => true,
        Some(b'$') if pattern.len() == 1 => path.is_empty(),
        Some(b'*') => (0..=path.len()).any(|skip| matches_from(&pattern[1..], &path[skip..])),
        Some(&byte) => path.first() == Some(&byte) && matches_from(&pattern[1..], &path[1..]),
    }
}
