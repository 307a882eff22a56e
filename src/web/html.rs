//! Static pages served by the analyzer

pub const INDEX_HTML: &str = include_str!("../../templates/index.html");
pub const ANALYZE_HTML: &str = include_str!("../../templates/analyze.html");
