use std::collections::BTreeMap;

use videoframes::scraper::{ElementRef, Html, Selector};
use videoframes::{sanitize, Policy, Rules, RulesConfig, VideoFrames};

const SITE: &str = "https://feeds.example.net/item/1";

fn parse(html: &str) -> Html {
    Html::parse_fragment(html)
}

fn attrs(el: ElementRef<'_>) -> BTreeMap<String, String> {
    el.value().attrs().map(|(k, v)| (k.to_owned(), v.to_owned())).collect()
}

fn select(doc: &Html, selector: &str) -> Vec<BTreeMap<String, String>> {
    let selector = Selector::parse(selector).unwrap();
    doc.root_element().select(&selector).map(attrs).collect()
}

/// Element names with their attributes, and text, in document order
/// (excluding the fragment's root).
fn snapshot(doc: &Html) -> Vec<String> {
    doc.root_element()
        .descendants()
        .skip(1)
        .filter_map(|node| match ElementRef::wrap(node) {
            Some(el) => Some(format!("<{} {:?}>", el.value().name(), attrs(el))),
            None => node.value().as_text().map(|t| t.trim().to_string()),
        })
        .collect()
}

fn policy(allowed: &[&str]) -> Option<Policy> {
    Some(Policy::new(
        allowed.iter().map(|s| s.to_string()).collect(),
        vec!["style".into()],
    ))
}

#[test]
fn allowed_iframes_are_upgraded_to_https() {
    let mut doc = parse(r#"
        <iframe src="http://www.youtube.com/embed/a1"></iframe>
        <iframe src="ftp://player.vimeo.com/video/2"></iframe>
        <iframe src="//www.youtube.com/embed/xyz"></iframe>
        <iframe src="https://w.soundcloud.com/player/?url=x"></iframe>
    "#);
    let result = sanitize(&mut doc, SITE, None);

    let srcs = select(&doc, "iframe").into_iter().map(|a| a["src"].clone()).collect::<Vec<_>>();
    assert_eq!(srcs, [
        "https://www.youtube.com/embed/a1",
        "https://player.vimeo.com/video/2",
        "https://www.youtube.com/embed/xyz",
        "https://w.soundcloud.com/player/?url=x",
    ]);
    assert_eq!(result.stats.iframes_allowed, 4);
    assert_eq!(result.updated_policy, None);
}

#[test]
fn sandbox_is_removed_from_allowed_iframes_only() {
    let mut doc = parse(r#"
        <iframe src="https://www.youtube.com/embed/a" sandbox="allow-scripts" sandbox="" width="10"></iframe>
        <iframe src="https://example.com/embed/a" sandbox="allow-scripts"></iframe>
    "#);
    sanitize(&mut doc, SITE, None);

    let iframes = select(&doc, "iframe");
    assert_eq!(iframes.len(), 2);
    assert!(!iframes[0].contains_key("sandbox"));
    assert_eq!(iframes[0]["width"], "10");
    assert_eq!(iframes[1]["sandbox"], "allow-scripts");
    assert_eq!(iframes[1]["src"], "https://example.com/embed/a");
}

#[test]
fn unknown_iframes_untouched_without_policy() {
    let html = r#"<p>x</p><iframe src="http://evil.example/embed/"></iframe><iframe src="https://www.youtube.com/watch?v=1"></iframe><iframe></iframe>"#;
    let mut doc = parse(html);
    let before = snapshot(&doc);
    let result = sanitize(&mut doc, SITE, None);

    assert_eq!(snapshot(&doc), before);
    assert_eq!(result.stats.iframes_removed, 0);
}

#[test]
fn unknown_iframes_removed_when_iframe_force_permitted() {
    let mut doc = parse(r#"<div><iframe src="http://evil.example/embed/"></iframe><p>keep</p><iframe src="/relative"></iframe><iframe></iframe><iframe src="http://www.youtube.com/embed/ok"></iframe></div>"#);
    let result = sanitize(&mut doc, SITE, policy(&["div", "p"]));

    let iframes = select(&doc, "iframe");
    assert_eq!(iframes.len(), 1);
    assert_eq!(iframes[0]["src"], "https://www.youtube.com/embed/ok");
    assert_eq!(select(&doc, "p").len(), 1);
    assert_eq!(result.stats.iframes_removed, 3);

    let updated = result.updated_policy.expect("iframe was force-permitted");
    assert_eq!(updated.allowed_elements, ["div", "p", "iframe"]);
    assert_eq!(updated.disallowed_attributes, ["style"]);
}

#[test]
fn unknown_iframes_kept_when_policy_already_permits_iframe() {
    // iframe first in the list still counts as permitted
    let mut doc = parse(r#"<iframe src="http://evil.example/x"></iframe>"#);
    let result = sanitize(&mut doc, SITE, policy(&["iframe", "p"]));

    assert_eq!(select(&doc, "iframe").len(), 1);
    assert_eq!(result.updated_policy, None);
}

#[test]
fn unparsable_iframe_src_counts_as_unknown() {
    let html = r#"<p>x</p><iframe src="http:///evil.example/x"></iframe><iframe src="https://evil.example:abc/x"></iframe><iframe src="http://www.youtube.com:port/embed/x"></iframe>"#;

    let mut doc = parse(html);
    let before = snapshot(&doc);
    let result = sanitize(&mut doc, SITE, None);
    assert_eq!(snapshot(&doc), before);
    assert_eq!(result.stats.iframes_removed, 0);

    let mut doc = parse(html);
    let result = sanitize(&mut doc, SITE, policy(&["p"]));
    assert!(select(&doc, "iframe").is_empty());
    assert_eq!(select(&doc, "p").len(), 1);
    assert_eq!(result.stats.iframes_removed, 3);
    assert!(result.updated_policy.is_some());
}

#[test]
fn backslash_in_authority_does_not_borrow_allowed_host() {
    let html = r#"<iframe src="https://evil.example\@www.youtube.com/embed/x" sandbox="allow-scripts"></iframe>"#;

    let mut doc = parse(html);
    sanitize(&mut doc, SITE, None);
    let iframes = select(&doc, "iframe");
    assert_eq!(iframes[0]["sandbox"], "allow-scripts");
    assert_eq!(iframes[0]["src"], r"https://evil.example\@www.youtube.com/embed/x");

    let mut doc = parse(html);
    sanitize(&mut doc, SITE, policy(&["p"]));
    assert!(select(&doc, "iframe").is_empty());
}

#[test]
fn host_match_is_case_sensitive() {
    let mut doc = parse(r#"<iframe src="http://WWW.YOUTUBE.COM/embed/x"></iframe>"#);
    sanitize(&mut doc, SITE, None);
    assert_eq!(select(&doc, "iframe")[0]["src"], "http://WWW.YOUTUBE.COM/embed/x");

    let mut doc = parse(r#"<iframe src="http://WWW.YOUTUBE.COM/embed/x"></iframe>"#);
    sanitize(&mut doc, SITE, policy(&[]));
    assert!(select(&doc, "iframe").is_empty());
}

#[test]
fn youtube_object_becomes_iframe() {
    let mut doc = parse(r#"<p>before</p><object width="1"><param name="movie" value="x"><embed src="https://www.youtube.com/v/ABC123&foo=1"></object><p>after</p>"#);
    let result = sanitize(&mut doc, SITE, None);

    assert!(select(&doc, "object").is_empty());
    assert!(select(&doc, "embed").is_empty());
    let iframes = select(&doc, "iframe");
    assert_eq!(iframes.len(), 1);
    let expected = [
        ("allowfullscreen", ""),
        ("frameborder", "0"),
        ("height", "315"),
        ("src", "https://www.youtube.com/embed/ABC123"),
        ("width", "560"),
    ].into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<BTreeMap<_, _>>();
    assert_eq!(iframes[0], expected);
    assert_eq!(result.stats.objects_replaced, 1);

    // the iframe sits where the object was
    let order = snapshot(&doc).into_iter().filter(|s| !s.starts_with("<p ")).collect::<Vec<_>>();
    assert_eq!(order[0], "before");
    assert!(order[1].starts_with("<iframe "));
    assert_eq!(order[2], "after");
}

#[test]
fn vimeo_object_uses_query_and_player_host() {
    let mut doc = parse(r#"<object><embed src="https://vimeo.com/moogaloop.swf?clip_id=42" width="400" height="225"></object>"#);
    sanitize(&mut doc, SITE, None);

    let iframes = select(&doc, "iframe");
    assert_eq!(iframes[0]["src"], "https://player.vimeo.com/video/42");
    assert_eq!(iframes[0]["width"], "400");
    assert_eq!(iframes[0]["height"], "225");
}

#[test]
fn protocol_relative_embed_and_odd_dimensions() {
    let mut doc = parse(r#"<object><embed src="//www.dailymotion.com/swf/video/x2b" width="640px" height="abc"></object>"#);
    sanitize(&mut doc, SITE, None);

    let iframes = select(&doc, "iframe");
    assert_eq!(iframes[0]["src"], "https://www.dailymotion.com/embed/video/x2b");
    assert_eq!(iframes[0]["width"], "640");
    assert_eq!(iframes[0]["height"], "315");
}

#[test]
fn nested_objects_are_replaced_once() {
    let mut doc = parse(r#"<object><embed src="https://www.youtube.com/v/outer"><object><embed src="https://www.youtube.com/v/inner"></object></object>"#);
    let result = sanitize(&mut doc, SITE, None);

    let iframes = select(&doc, "iframe");
    assert_eq!(iframes.len(), 1);
    assert_eq!(iframes[0]["src"], "https://www.youtube.com/embed/outer");
    assert_eq!(result.stats.objects_replaced, 1);
}

#[test]
fn unknown_or_unmatched_embeds_are_left_alone() {
    let html = r#"
        <object><embed src="https://example.com/foo"></object>
        <object><embed src="https://vimeo.com/moogaloop.swf?clip_id=4%3C2"></object>
        <object><embed src="https://vimeo.com/moogaloop.swf"></object>
        <object><embed src="https://www.youtube.com/watch?v=abc"></object>
        <object><embed src="http:///v/abc"></object>
        <embed src="https://www.youtube.com/v/abc">
        <div><embed src="https://www.youtube.com/v/abc"></div>
    "#;
    let mut doc = parse(html);
    let before = snapshot(&doc);
    let result = sanitize(&mut doc, SITE, policy(&["object", "embed"]));

    assert_eq!(snapshot(&doc), before);
    assert_eq!(result.stats.objects_replaced, 0);
}

#[test]
fn second_run_changes_nothing() {
    let html = r#"
        <iframe src="//www.youtube.com/embed/a" sandbox=""></iframe>
        <iframe src="http://unknown.example/"></iframe>
        <object><embed src="http://www.youtube.com/v/abc"></object>
        <object><embed src="https://vimeo.com/m.swf?clip_id=7"></object>
        <object><embed src="https://example.com/foo"></object>
    "#;
    for first_policy in [None, policy(&["p"])] {
        let mut doc = parse(html);
        let first = sanitize(&mut doc, SITE, first_policy);
        let once = snapshot(&doc);

        let second = sanitize(&mut doc, SITE, first.updated_policy.clone());
        assert_eq!(snapshot(&doc), once);
        assert_eq!(second.stats.iframes_removed, 0);
        assert_eq!(second.stats.objects_replaced, 0);
        assert_eq!(second.updated_policy, None);
    }
}

#[test]
fn full_document_round_trip() {
    let mut doc = Html::parse_document(r#"<!DOCTYPE html><html><head><title>t</title></head><body><object><embed src="http://www.myvideo.de/movie/99"></object></body></html>"#);
    sanitize(&mut doc, SITE, None);

    let html = doc.html();
    assert!(html.contains(r#"src="https://www.myvideo.de/embed/99""#));
    assert!(!html.contains("<object"));
    assert!(html.contains("<title>t</title>"));
}

#[test]
fn custom_rules_apply() {
    let mut config = RulesConfig::default();
    config.iframes.insert("media.example.org".into(), "/player/".into());
    let rules = Rules::from_config(&config).unwrap();

    let mut doc = parse(r#"<iframe src="http://media.example.org/player/1"></iframe><iframe src="http://www.youtube.com/embed/x"></iframe>"#);
    VideoFrames::with_rules(&rules).sanitize(&mut doc, SITE, policy(&[]));

    let iframes = select(&doc, "iframe");
    assert_eq!(iframes.len(), 1);
    assert_eq!(iframes[0]["src"], "https://media.example.org/player/1");
}
