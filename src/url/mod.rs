//! URL handling module
//!
//! Provides URL normalization and domain extraction used by the frontier
//! for deduplication and by the rate limiter for per-domain grouping.

mod domain;
mod normalize;

pub use domain::{
    extract_domain, extract_site, matches_domain, registrable_domain,
    registrable_domain_from_host, same_domain,
};
pub use normalize::normalize_url;
