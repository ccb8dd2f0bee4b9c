//! Trusted video hosts: the iframe allow-list and the `<object><embed>`
//! transform rules.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use regex::Regex;
#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

use crate::parsed_url::ParsedUrl;

/// Host → required start of the path for iframes that may be embedded.
const ALLOWED_IFRAMES: &[(&str, &str)] = &[
    ("www.youtube.com", "/embed/"),
    ("www.youtube-nocookie.com", "/embed/"),
    ("player.vimeo.com", "/video/"),
    ("www.myvideo.de", "/embed/"),
    ("www.dailymotion.com", "/embed/video/"),
    ("www.viddler.com", "/embed/"),
    ("w.soundcloud.com", "/player/"),
    ("www.facebook.com", "/video/embed"),
    ("www.ustream.tv", "/embed/"),
    ("open.spotify.com", "/embed/"),
];

enum BuiltinMatcher {
    Path(&'static str),
    Query(&'static str),
}

/// Host → (matcher, iframe path with `$1`, iframe host if different)
const TRANSFORM_OBJECTS: &[(&str, BuiltinMatcher, &str, Option<&str>)] = &[
    ("www.youtube.com", BuiltinMatcher::Path(r"^/v/([a-zA-Z0-9_]+)(&.*)?$"), "/embed/$1", None),
    // Never matches a real host; kept as found in the historical rule set.
    ("www.youtube-nocookie-com", BuiltinMatcher::Path(r"^/v/([a-zA-Z0-9_]+)(&.*)?$"), "/embed/$1", None),
    ("vimeo.com", BuiltinMatcher::Query("clip_id"), "/video/$1", Some("player.vimeo.com")),
    ("www.myvideo.de", BuiltinMatcher::Path(r"^/movie/([a-zA-Z0-9_]+)(&.*)?$"), "/embed/$1", None),
    ("www.dailymotion.com", BuiltinMatcher::Path(r"^/swf/video/([a-zA-Z0-9_]+)(&.*)?$"), "/embed/video/$1", None),
];

const PLACEHOLDER: &str = "$1";

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("Allow-list entry for {:?} has an empty path prefix", .0)]
    EmptyPrefix(String),
    #[error("Invalid path pattern {pattern:?}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Path pattern {:?} has no capture group to use as $1", .0)]
    NoCaptureGroup(String),
    #[error("Replacement {:?} does not contain $1", .0)]
    MissingPlaceholder(String),
    #[error("Query parameter name is empty")]
    EmptyQueryParam,
}

#[derive(Debug, Clone, Default)]
pub struct IframeAllowList {
    prefixes: HashMap<String, String>,
}

impl IframeAllowList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any existing prefix for `host`.
    pub fn insert(&mut self, host: impl Into<String>, prefix: impl Into<String>) -> Result<(), RuleError> {
        let (host, prefix) = (host.into(), prefix.into());
        if prefix.is_empty() {
            return Err(RuleError::EmptyPrefix(host));
        }
        self.prefixes.insert(host, prefix);
        Ok(())
    }

    pub fn prefix(&self, host: &str) -> Option<&str> {
        self.prefixes.get(host).map(|s| s.as_str())
    }

    /// Exact host match, and the path must start with the host's prefix.
    pub fn allows(&self, url: &ParsedUrl<'_>) -> bool {
        match url.host.and_then(|host| self.prefix(host)) {
            Some(prefix) => url.path.starts_with(prefix),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

/// How the interesting part of a legacy embed URL is found.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Regex over the path; capture group 1 becomes `$1`.
    PathRegex(Regex),
    /// Name of a query parameter whose value becomes `$1`.
    QueryParam(String),
}

impl Matcher {
    pub fn path_regex(pattern: &str) -> Result<Self, RuleError> {
        let regex = Regex::new(pattern).map_err(|source| RuleError::InvalidPattern {
            pattern: pattern.into(),
            source,
        })?;
        // group 0 is the whole match
        if regex.captures_len() < 2 {
            return Err(RuleError::NoCaptureGroup(pattern.into()));
        }
        Ok(Matcher::PathRegex(regex))
    }

    pub fn query_param(name: impl Into<String>) -> Result<Self, RuleError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RuleError::EmptyQueryParam);
        }
        Ok(Matcher::QueryParam(name))
    }

    /// The value substituted for `$1`, if this URL matches.
    pub fn capture<'a>(&self, url: &ParsedUrl<'a>) -> Option<Cow<'a, str>> {
        match self {
            Matcher::PathRegex(regex) => {
                let captures = regex.captures(url.path)?;
                captures.get(1).map(|m| Cow::Borrowed(m.as_str()))
            }
            Matcher::QueryParam(name) => {
                let query = url.query?;
                // later duplicates win
                let (_, value) = url::form_urlencoded::parse(query.as_bytes())
                    .filter(|(key, _)| key == name)
                    .last()?;
                is_word(&value).then_some(value)
            }
        }
    }
}

/// `^[a-zA-Z0-9_]+$`
fn is_word(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

#[derive(Debug, Clone)]
pub struct ObjectTransformRule {
    matcher: Matcher,
    template: String,
    destination: Option<String>,
}

impl ObjectTransformRule {
    pub fn new(matcher: Matcher, template: impl Into<String>) -> Result<Self, RuleError> {
        let template = template.into();
        if !template.contains(PLACEHOLDER) {
            return Err(RuleError::MissingPlaceholder(template));
        }
        Ok(ObjectTransformRule {
            matcher,
            template,
            destination: None,
        })
    }

    pub fn with_destination(mut self, host: impl Into<String>) -> Self {
        self.destination = Some(host.into());
        self
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Host of the generated iframe; the embed's own host unless overridden.
    pub fn destination<'a>(&'a self, source_host: &'a str) -> &'a str {
        self.destination.as_deref().unwrap_or(source_host)
    }

    pub fn rewrite_path(&self, url: &ParsedUrl<'_>) -> Option<String> {
        let value = self.matcher.capture(url)?;
        Some(self.template.replace(PLACEHOLDER, &value))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObjectTransformRules {
    rules: HashMap<String, ObjectTransformRule>,
}

impl ObjectTransformRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, host: impl Into<String>, rule: ObjectTransformRule) {
        self.rules.insert(host.into(), rule);
    }

    pub fn get(&self, host: &str) -> Option<&ObjectTransformRule> {
        self.rules.get(host)
    }

    /// Full `https` src of the iframe replacing an embed pointing at `url`.
    pub fn iframe_src(&self, url: &ParsedUrl<'_>) -> Option<String> {
        let host = url.host?;
        let rule = self.get(host)?;
        let path = rule.rewrite_path(url)?;
        Some(format!("https://{}{}", rule.destination(host), path))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Both rule tables. Immutable once built; share it by reference.
#[derive(Debug, Clone, Default)]
pub struct Rules {
    pub iframes: IframeAllowList,
    pub objects: ObjectTransformRules,
}

impl Rules {
    /// The built-in tables, compiled on first use.
    pub fn builtin() -> &'static Rules {
        static BUILTIN: OnceLock<Rules> = OnceLock::new();
        BUILTIN.get_or_init(|| Rules::compile_builtin().expect("built-in video rules are valid"))
    }

    fn compile_builtin() -> Result<Rules, RuleError> {
        let mut rules = Rules::default();
        for (host, prefix) in ALLOWED_IFRAMES {
            rules.iframes.insert(*host, *prefix)?;
        }
        for (host, matcher, template, destination) in TRANSFORM_OBJECTS {
            let matcher = match matcher {
                BuiltinMatcher::Path(pattern) => Matcher::path_regex(pattern)?,
                BuiltinMatcher::Query(name) => Matcher::query_param(*name)?,
            };
            let mut rule = ObjectTransformRule::new(matcher, *template)?;
            if let Some(destination) = destination {
                rule = rule.with_destination(*destination);
            }
            rules.objects.insert(*host, rule);
        }
        Ok(rules)
    }

    pub fn from_config(config: &RulesConfig) -> Result<Rules, RuleError> {
        let mut rules = Rules::default();
        for (host, prefix) in &config.iframes {
            rules.iframes.insert(host.as_str(), prefix.as_str())?;
        }
        for (host, object) in &config.objects {
            let matcher = match &object.matcher {
                MatcherConfig::Path(pattern) => Matcher::path_regex(pattern)?,
                MatcherConfig::Query(name) => Matcher::query_param(name.as_str())?,
            };
            let mut rule = ObjectTransformRule::new(matcher, object.replace.as_str())?;
            if let Some(destination) = &object.host {
                rule = rule.with_destination(destination.as_str());
            }
            rules.objects.insert(host.as_str(), rule);
        }
        Ok(rules)
    }

    /// The built-in tables with `config` layered on top; configured hosts
    /// replace built-in entries for the same host.
    pub fn builtin_with(config: &RulesConfig) -> Result<Rules, RuleError> {
        let mut rules = Rules::builtin().clone();
        rules.extend(Rules::from_config(config)?);
        Ok(rules)
    }

    pub fn extend(&mut self, other: Rules) {
        self.iframes.prefixes.extend(other.iframes.prefixes);
        self.objects.rules.extend(other.objects.rules);
    }
}

/// Rule tables as written in a configuration file.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct RulesConfig {
    #[cfg_attr(feature = "serde", serde(default))]
    pub iframes: BTreeMap<String, String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub objects: BTreeMap<String, ObjectRuleConfig>,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct ObjectRuleConfig {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub matcher: MatcherConfig,
    pub replace: String,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub host: Option<String>,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone)]
pub enum MatcherConfig {
    Path(String),
    Query(String),
}
