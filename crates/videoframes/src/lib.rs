
#[macro_use]
extern crate tracing;

mod dom;
pub mod parsed_url;
pub mod rewrite;
pub mod rules;

pub use scraper;

pub use parsed_url::ParsedUrl;
pub use rewrite::{Policy, SanitizeResult, Stats, VideoFrames};
pub use rules::{
    IframeAllowList, Matcher, MatcherConfig, ObjectRuleConfig, ObjectTransformRule,
    ObjectTransformRules, RuleError, Rules, RulesConfig,
};

/// Runs the filter with the built-in rules; see [`VideoFrames::sanitize`].
pub fn sanitize(document: &mut scraper::Html, site_url: &str, policy: Option<Policy>) -> SanitizeResult {
    VideoFrames::new().sanitize(document, site_url, policy)
}
