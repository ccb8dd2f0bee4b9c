use scraper::{Html, Selector};
#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

use crate::dom;
use crate::parsed_url::ParsedUrl;
use crate::rules::Rules;

// historical youtube embed size, used for every provider
const DEFAULT_WIDTH: i64 = 560;
const DEFAULT_HEIGHT: i64 = 315;

/// Element and attribute lists of the general-purpose sanitizer running in
/// the same pipeline stage.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Policy {
    pub allowed_elements: Vec<String>,
    pub disallowed_attributes: Vec<String>,
}

impl Policy {
    pub fn new(allowed_elements: Vec<String>, disallowed_attributes: Vec<String>) -> Self {
        Policy { allowed_elements, disallowed_attributes }
    }

    /// Adds `element` to the allowed list; returns whether it was missing.
    pub fn permit(&mut self, element: &str) -> bool {
        if self.allowed_elements.iter().any(|e| e == element) {
            false
        } else {
            self.allowed_elements.push(element.into());
            true
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub iframes_allowed: usize,
    pub iframes_removed: usize,
    pub objects_replaced: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizeResult {
    /// Only set when `iframe` had to be added to the caller's policy; the
    /// caller should use these lists for its own pass.
    pub updated_policy: Option<Policy>,
    pub stats: Stats,
}

/// The video embed filter. Cheap to construct; holds only a reference to the rules.
#[derive(Debug, Clone, Copy)]
pub struct VideoFrames<'r> {
    rules: &'r Rules,
}

impl VideoFrames<'static> {
    pub fn new() -> Self {
        VideoFrames { rules: Rules::builtin() }
    }
}

impl Default for VideoFrames<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> VideoFrames<'r> {
    pub fn with_rules(rules: &'r Rules) -> Self {
        VideoFrames { rules }
    }

    pub fn rules(&self) -> &'r Rules {
        self.rules
    }

    /// Upgrades trusted iframes, turns known `<object><embed>` videos into
    /// iframes, and (when `iframe` had to be force-permitted in `policy`)
    /// removes every other iframe. `site_url` is only recorded for logging.
    #[tracing::instrument(skip_all, fields(site_url = %site_url))]
    pub fn sanitize(&self, document: &mut Html, site_url: &str, mut policy: Option<Policy>) -> SanitizeResult {
        let remove_unknown = match policy.as_mut() {
            Some(policy) => policy.permit("iframe"),
            None => false,
        };

        let mut stats = Stats::default();
        self.normalize_iframes(document, remove_unknown, &mut stats);
        self.transform_objects(document, &mut stats);

        debug!(
            allowed = stats.iframes_allowed,
            removed = stats.iframes_removed,
            replaced = stats.objects_replaced,
            "video embeds sanitized"
        );

        SanitizeResult {
            updated_policy: if remove_unknown { policy } else { None },
            stats,
        }
    }

    fn normalize_iframes(&self, document: &mut Html, remove_unknown: bool, stats: &mut Stats) {
        let iframes = Selector::parse("iframe").unwrap();

        for id in dom::select_ids(document, &iframes) {
            let src = with_scheme(dom::attr(document, id, "src").unwrap_or_default());
            let allowed = ParsedUrl::parse(&src).is_some_and(|url| self.rules.iframes.allows(&url));

            if allowed {
                let Some(secure) = force_https(&src) else { continue };
                trace!("allowing iframe {}", secure);
                dom::edit_attrs(document, id, |attrs| {
                    dom::set_attr(attrs, "src", secure);
                    attrs.retain(|(k, _)| k != "sandbox");
                });
                stats.iframes_allowed += 1;
            } else if remove_unknown {
                trace!("removing iframe {:?}", src);
                dom::detach(document, id);
                stats.iframes_removed += 1;
            }
        }
    }

    fn transform_objects(&self, document: &mut Html, stats: &mut Stats) {
        let embeds = Selector::parse("object > embed[src]").unwrap();

        for id in dom::select_ids(document, &embeds) {
            let Some(src) = dom::attr(document, id, "src") else { continue };
            let src = with_scheme(src);
            let Some(iframe_src) = ParsedUrl::parse(&src)
                .and_then(|url| self.rules.objects.iframe_src(&url))
            else { continue };
            let Some(object) = dom::parent_id(document, id) else { continue };

            let width = dimension(dom::attr(document, id, "width"), DEFAULT_WIDTH);
            let height = dimension(dom::attr(document, id, "height"), DEFAULT_HEIGHT);

            trace!("replacing embed {:?} with iframe {}", src, iframe_src);
            let iframe = dom::new_element("iframe", vec![
                ("allowfullscreen".into(), String::new()),
                ("width".into(), width.to_string()),
                ("height".into(), height.to_string()),
                ("frameborder".into(), "0".into()),
                ("src".into(), iframe_src),
            ]);
            if dom::replace(document, object, iframe) {
                stats.objects_replaced += 1;
            }
        }
    }
}

/// Protocol-relative URLs get an explicit scheme so they split like absolute ones.
fn with_scheme(src: String) -> String {
    if src.starts_with("//") {
        format!("https:{src}")
    } else {
        src
    }
}

/// Swaps a leading `letters://` for `https://`; `None` if there is none.
fn force_https(src: &str) -> Option<String> {
    let (scheme, rest) = src.split_once("://")?;
    if scheme.is_empty() || !scheme.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    Some(format!("https://{rest}"))
}

fn dimension(value: Option<String>, default: i64) -> i64 {
    match value.as_deref().map(leading_int) {
        Some(n) if n >= 1 => n,
        _ => default,
    }
}

/// Integer value of the leading digits ("640px" → 640, "abc" → 0).
fn leading_int(s: &str) -> i64 {
    let s = s.trim_start_matches(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0B' | '\x0C'));
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let n = digits.bytes()
        .take_while(|b| b.is_ascii_digit())
        .fold(0i64, |n, b| n.saturating_mul(10).saturating_add(i64::from(b - b'0')));
    if negative { -n } else { n }
}
