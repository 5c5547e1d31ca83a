//! URL handling module for url-compare
//!
//! This module provides URL normalization (the path keys both sites are joined
//! on) and host-key extraction used by the rate limiter and robots cache.

mod domain;
mod normalize;

pub use domain::{host_key, same_host};
pub use normalize::{normalize, NormalizeOptions, NormalizedUrl, DEFAULT_TRACKING_PARAMS};
