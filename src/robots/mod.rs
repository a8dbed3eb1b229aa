//! Robots.txt handling module
//!
//! Fetches, parses, and caches robots.txt rules so the crawler respects
//! per-site Allow/Disallow directives and crawl delays.

mod cache;
mod parser;

pub use cache::RobotsTxtCache;
pub use parser::{RobotsRules, Rule, RuleKind};
