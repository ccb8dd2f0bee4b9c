//! Splitting `src` attribute values into URL components.
//!
//! Lenient: relative references parse fine (they just
//! have no host), and nothing is normalized. Hosts keep their case and paths
//! keep their dot segments, so rule matching sees exactly what the markup
//! contains. Only a malformed authority makes a value unparsable.

/// Components of a `src` value, borrowed from the input string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedUrl<'a> {
    pub scheme: Option<&'a str>,
    pub host: Option<&'a str>,
    pub port: Option<u16>,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub fragment: Option<&'a str>,
}

impl<'a> ParsedUrl<'a> {
    pub fn parse(input: &'a str) -> Option<Self> {
        let mut rest = input;

        let scheme = split_scheme(rest).map(|(scheme, tail)| {
            rest = tail;
            scheme
        });

        let (mut host, mut port) = (None, None);
        if let Some(after) = rest.strip_prefix("//") {
            // browsers read `\` as `/` in web URLs
            let end = after.find(|c: char| matches!(c, '/' | '\\' | '?' | '#')).unwrap_or(after.len());
            let (authority, tail) = after.split_at(end);
            let (h, p) = split_authority(authority)?;
            host = Some(h);
            port = p;
            rest = tail;
        }

        let (rest, fragment) = match rest.split_once('#') {
            Some((before, fragment)) => (before, Some(fragment)),
            None => (rest, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };

        Some(ParsedUrl { scheme, host, port, path, query, fragment })
    }
}

/// `scheme:` prefix, per RFC 3986: a letter followed by letters, digits, `+`, `-` or `.`
fn split_scheme(input: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = input.split_once(':')?;
    let mut chars = scheme.chars();
    if !chars.next()?.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        return None;
    }
    Some((scheme, rest))
}

/// Host and port of an authority component; `None` if it is malformed.
fn split_authority(authority: &str) -> Option<(&str, Option<u16>)> {
    let host_port = match authority.rsplit_once('@') {
        Some((_userinfo, host_port)) => host_port,
        None => authority,
    };

    let (host, port) = if host_port.starts_with('[') {
        // IPv6 literal, keep the brackets as part of the host
        let close = host_port.find(']')?;
        let (host, tail) = host_port.split_at(close + 1);
        match tail {
            "" => (host, None),
            _ => (host, Some(tail.strip_prefix(':')?)),
        }
    } else {
        match host_port.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (host_port, None),
        }
    };

    if host.is_empty() {
        return None;
    }
    let port = match port {
        None | Some("") => None,
        Some(p) if p.bytes().all(|b| b.is_ascii_digit()) => Some(p.parse::<u16>().ok()?),
        Some(_) => return None,
    };
    Some((host, port))
}
