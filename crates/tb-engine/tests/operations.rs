use std::time::{Duration, Instant};

use tb_engine::{AdBlockEngine, EngineError, RequestContext};

const SOURCE: &str = "https://news.example.com/article";

fn should_load(
    engine: &AdBlockEngine,
    url: &str,
    resource_type: Option<&str>,
) -> Result<bool, EngineError> {
    let request_host = engine.resolve_domain(url);
    engine.should_load(url, SOURCE, resource_type, &request_host, "news.example.com")
}

#[test]
fn resolve_domain_examples() {
    let engine = AdBlockEngine::new();
    assert_eq!(engine.resolve_domain("http://example.com/path"), "example.com");
    assert_eq!(engine.resolve_domain("https://example.com:8080/x"), "example.com");
    assert_eq!(engine.resolve_domain("https://example.com?q=1"), "example.com");
    assert_eq!(engine.resolve_domain("example.com"), "example.com");
    assert_eq!(engine.resolve_domain("http://"), "");
    assert_eq!(engine.resolve_domain(""), "");
}

#[test]
fn fresh_engine_is_uninitialized() {
    let engine = AdBlockEngine::new();
    let err = should_load(&engine, "https://ads.net/a.js", None).unwrap_err();
    assert!(matches!(err, EngineError::Uninitialized));
    assert_eq!(
        err.to_string(),
        "Please initialise the engine by loading a set of rules into it first"
    );
}

#[test]
fn clear_returns_to_uninitialized() {
    let engine = AdBlockEngine::new();
    engine.load_rules("||ads.net^").unwrap();
    assert!(should_load(&engine, "https://ads.net/a.js", None).is_ok());

    engine.clear_rules();
    assert!(matches!(
        should_load(&engine, "https://ads.net/a.js", None),
        Err(EngineError::Uninitialized)
    ));

    engine.clear_rules();
    assert!(!engine.is_initialized());

    engine.load_rules("||ads.net^").unwrap();
    assert!(!should_load(&engine, "https://ads.net/a.js", None).unwrap());
}

#[test]
fn blocking_engine_wins_regardless_of_position() {
    let first_blocks = AdBlockEngine::new();
    first_blocks.load_rules("||ads.net^").unwrap();
    first_blocks.load_rules("||unrelated.org^").unwrap();
    assert!(!should_load(&first_blocks, "https://ads.net/a.js", None).unwrap());

    let second_blocks = AdBlockEngine::new();
    second_blocks.load_rules("||unrelated.org^").unwrap();
    second_blocks.load_rules("||ads.net^").unwrap();
    assert!(!should_load(&second_blocks, "https://ads.net/a.js", None).unwrap());
}

#[test]
fn no_matching_rule_allows() {
    let engine = AdBlockEngine::new();
    engine.load_rules("||ads.net^\n/banner/ad.").unwrap();
    assert!(should_load(&engine, "https://cdn.example.com/app.js", None).unwrap());
}

#[test]
fn malformed_lines_do_not_fail_loading() {
    let engine = AdBlockEngine::new();
    engine
        .load_rules("/regex[0-9]+/\n$$$\n||\n##.ad\n||ads.net^$unknown-opt\n||tracker.net^")
        .unwrap();
    assert!(!should_load(&engine, "https://tracker.net/p", None).unwrap());
    assert!(should_load(&engine, "https://ads.net/p", None).unwrap());
}

#[test]
fn equal_hosts_are_first_party() {
    let engine = AdBlockEngine::new();
    engine.load_rules("/collect^$third-party").unwrap();

    let url = "https://news.example.com/collect?v=1";
    assert!(engine
        .should_load(url, SOURCE, None, "news.example.com", "news.example.com")
        .unwrap());
    assert!(!engine
        .should_load(url, SOURCE, None, "news.example.com", "example.com")
        .unwrap());
}

#[test]
fn omitted_type_matches_as_script() {
    let engine = AdBlockEngine::new();
    engine.load_rules("/widget.$script").unwrap();

    let url = "https://cdn.net/widget.js";
    assert!(!should_load(&engine, url, None).unwrap());
    assert!(!should_load(&engine, url, Some("")).unwrap());
    assert!(!should_load(&engine, url, Some("script")).unwrap());
    assert!(should_load(&engine, url, Some("image")).unwrap());
}

#[test]
fn check_returns_verdict_details() {
    let engine = AdBlockEngine::new();
    engine.load_rules("||ads.net^\n@@||ads.net/consent/").unwrap();
    engine.load_rules("||pixel.net^$explicitcancel").unwrap();

    let request = |url| RequestContext {
        resource_url: url,
        source_url: SOURCE,
        resource_type: Some("image"),
        request_host: "",
        source_host: "news.example.com",
    };

    let verdict = engine.check(&request("https://ads.net/consent/banner.png")).unwrap();
    assert!(!verdict.matched);
    assert!(verdict.saved_by_exception);

    let verdict = engine.check(&request("https://pixel.net/p.gif")).unwrap();
    assert!(verdict.matched);
    assert!(verdict.explicit_cancel);
    assert_eq!(verdict.engine_index, Some(1));
}

#[test]
fn wildcard_heavy_rule_does_not_stall_matching() {
    let engine = AdBlockEngine::new();
    engine.load_rules("a*a*a*a*a*a*a*a*b").unwrap();

    let started = Instant::now();
    for n in [50, 100, 1_000] {
        let url = format!("https://x.com/{}", "a".repeat(n));
        assert!(should_load(&engine, &url, None).unwrap());
        assert!(!should_load(&engine, &format!("{}b", url), None).unwrap());
    }
    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
}

#[test]
fn separator_rules_retry_later_occurrences() {
    let engine = AdBlockEngine::new();
    engine.load_rules("ads^*track^").unwrap();

    assert!(!should_load(&engine, "https://x.com/adsx/ads/y/track/1", None).unwrap());
    assert!(!should_load(&engine, "https://x.com/ads/track-x/track?id=1", None).unwrap());
    assert!(should_load(&engine, "https://x.com/ads/trackers", None).unwrap());
}
