//! Filter list parser.

use std::net::IpAddr;

use tb_core::hash::hash_domain;
use tb_core::index::DomainConstraint;
use tb_core::types::{PartyMask, RequestType, RuleAction, RuleFlags, SchemeMask};

/// A network rule after parsing, before indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRule {
    pub action: RuleAction,
    pub flags: RuleFlags,
    /// Hostname for domain rules, or the host part of a `||` pattern
    pub domain: String,
    /// Pattern body without anchors; None for pure hostname rules
    pub pattern: Option<String>,
    pub anchor_type: AnchorType,
    pub list_id: u16,
    pub type_mask: RequestType,
    pub party_mask: PartyMask,
    pub scheme_mask: SchemeMask,
    pub domain_constraints: Option<DomainConstraint>,
    /// Redirect resource name, as written after `redirect=`
    pub redirect: Option<String>,
    pub is_badfilter: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnchorType {
    #[default]
    None,
    Left,
    Hostname,
}

/// Result of parsing one filter list.
#[derive(Debug, Clone, Default)]
pub struct ParsedList {
    pub rules: Vec<ParsedRule>,
    /// Comment, header and cosmetic lines
    pub ignored: usize,
    /// Network rules that could not be parsed or use unsupported syntax
    pub skipped: usize,
}

/// Parse a filter list. Unsupported or malformed lines are skipped.
pub fn parse_filter_list(text: &str) -> ParsedList {
    let mut parsed = ParsedList::default();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if is_comment_line(line) || is_cosmetic_line(line) {
            parsed.ignored += 1;
            continue;
        }

        match parse_network_rule(line) {
            Some(rule) => parsed.rules.push(rule),
            None => {
                log::debug!("skipping unsupported filter: {}", line);
                parsed.skipped += 1;
            }
        }
    }

    parsed
}

/// Parse a single network rule line.
pub fn parse_network_rule(line: &str) -> Option<ParsedRule> {
    let mut line = line.trim();
    let mut action = RuleAction::Block;
    if let Some(rest) = line.strip_prefix("@@") {
        action = RuleAction::Allow;
        line = rest.trim_start();
    }

    if let Some(host) = hosts_file_host(line) {
        if action == RuleAction::Allow || LOCAL_HOSTNAMES.contains(&host) {
            return None;
        }
        let domain = normalize_domain(host)?;
        return Some(ParsedRule::domain_rule(action, domain, ParsedOptions::default()));
    }

    let (pattern_part, options_text) = split_rule_options(line);
    let has_options = options_text.is_some();
    let options = match options_text {
        Some(options_text) => parse_options(options_text)?,
        None => ParsedOptions::default(),
    };

    let pattern_str = pattern_part.trim();
    let (action, flags) = apply_redirect_action(action, options.flags, &options.redirect);
    let options = ParsedOptions { flags, ..options };

    if let Some(domain) = parse_host_anchor_rule(pattern_str) {
        let mut rule = ParsedRule::domain_rule(action, domain, options);
        rule.flags |= RuleFlags::HAS_HOST_ANCHOR;
        return Some(rule);
    }

    let parsed = parse_pattern_rule(pattern_str, has_options)?;
    let mut flags = options.flags;
    match parsed.anchor_type {
        AnchorType::Hostname => flags |= RuleFlags::HAS_HOST_ANCHOR,
        AnchorType::Left => flags |= RuleFlags::HAS_LEFT_ANCHOR,
        AnchorType::None => {}
    }
    if parsed.right_anchor {
        flags |= RuleFlags::HAS_RIGHT_ANCHOR;
    }

    Some(ParsedRule {
        action,
        flags,
        domain: parsed.domain,
        pattern: Some(parsed.pattern),
        anchor_type: parsed.anchor_type,
        list_id: 0,
        type_mask: options.type_mask,
        party_mask: options.party_mask,
        scheme_mask: options.scheme_mask,
        domain_constraints: options.domain_constraints,
        redirect: options.redirect.map(|r| r.name),
        is_badfilter: options.is_badfilter,
    })
}

impl ParsedRule {
    fn domain_rule(action: RuleAction, domain: String, options: ParsedOptions) -> Self {
        Self {
            action,
            flags: options.flags,
            domain,
            pattern: None,
            anchor_type: AnchorType::Hostname,
            list_id: 0,
            type_mask: options.type_mask,
            party_mask: options.party_mask,
            scheme_mask: options.scheme_mask,
            domain_constraints: options.domain_constraints,
            redirect: options.redirect.map(|r| r.name),
            is_badfilter: options.is_badfilter,
        }
    }
}

/// `$redirect=` blocks and carries the resource; `$redirect-rule=` only
/// names the resource for requests some other rule blocks.
fn apply_redirect_action(
    action: RuleAction,
    flags: RuleFlags,
    redirect: &Option<RedirectOption>,
) -> (RuleAction, RuleFlags) {
    match (action, redirect) {
        (RuleAction::Block, Some(RedirectOption { directive_only: true, .. })) => {
            (RuleAction::RedirectDirective, flags)
        }
        (RuleAction::Block, Some(_)) => (RuleAction::Block, flags | RuleFlags::FROM_REDIRECT_EQ),
        _ => (action, flags),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RedirectOption {
    name: String,
    directive_only: bool,
}

#[derive(Clone)]
struct ParsedOptions {
    flags: RuleFlags,
    type_mask: RequestType,
    party_mask: PartyMask,
    scheme_mask: SchemeMask,
    domain_constraints: Option<DomainConstraint>,
    redirect: Option<RedirectOption>,
    is_badfilter: bool,
}

impl Default for ParsedOptions {
    fn default() -> Self {
        Self {
            flags: RuleFlags::empty(),
            type_mask: RequestType::empty(),
            party_mask: PartyMask::empty(),
            scheme_mask: SchemeMask::empty(),
            domain_constraints: None,
            redirect: None,
            is_badfilter: false,
        }
    }
}

/// Split at the last `$`, provided what follows looks like an option list.
fn split_rule_options(line: &str) -> (&str, Option<&str>) {
    match line.rfind('$') {
        Some(pos) if !line[pos + 1..].contains('/') || line[pos + 1..].contains('=') => {
            (&line[..pos], Some(&line[pos + 1..]))
        }
        _ => (line, None),
    }
}

fn parse_options(text: &str) -> Option<ParsedOptions> {
    let mut flags = RuleFlags::empty();
    let mut type_include = 0u32;
    let mut type_exclude = 0u32;
    let mut party_include = 0u8;
    let mut party_exclude = 0u8;
    let mut scheme_include = 0u8;
    let mut scheme_exclude = 0u8;
    let mut domain_constraints: Option<DomainConstraint> = None;
    let mut redirect: Option<RedirectOption> = None;
    let mut is_badfilter = false;

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    for raw in trimmed.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let raw_lower = raw.to_ascii_lowercase();
        let raw_lower = raw_lower.as_str();

        match raw_lower {
            "important" => {
                flags |= RuleFlags::IMPORTANT;
                continue;
            }
            "match-case" | "match_case" => {
                flags |= RuleFlags::MATCH_CASE;
                continue;
            }
            "explicitcancel" => {
                flags |= RuleFlags::EXPLICIT_CANCEL;
                continue;
            }
            "badfilter" => {
                is_badfilter = true;
                continue;
            }
            _ => {}
        }

        if let Some(domain_value) = raw_lower.strip_prefix("domain=") {
            let parsed = parse_domain_option(domain_value)?;
            domain_constraints = Some(merge_constraints(domain_constraints, parsed));
            continue;
        }

        if let Some(redirect_value) = raw_lower.strip_prefix("redirect=") {
            redirect = Some(parse_redirect_value(redirect_value, false)?);
            continue;
        }

        if let Some(redirect_value) = raw_lower.strip_prefix("redirect-rule=") {
            redirect = Some(parse_redirect_value(redirect_value, true)?);
            continue;
        }

        let (negated, name) = match raw_lower.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, raw_lower),
        };

        if name.is_empty() || name.contains('=') {
            return None;
        }

        if let Some(mask) = request_type_mask(name) {
            if negated {
                type_exclude |= mask;
            } else {
                type_include |= mask;
            }
            continue;
        }

        if let Some(mask) = party_mask(name) {
            // ~third-party is first-party and vice versa
            if negated {
                party_exclude |= mask;
            } else {
                party_include |= mask;
            }
            continue;
        }

        if let Some(mask) = scheme_mask(name) {
            if negated {
                scheme_exclude |= mask;
            } else {
                scheme_include |= mask;
            }
            continue;
        }

        return None;
    }

    let type_bits = finalize_mask_u32(type_include, type_exclude, RequestType::ALL.bits())?;
    let party_bits = finalize_mask_u8(party_include, party_exclude, PartyMask::ALL.bits())?;
    let scheme_bits = finalize_mask_u8(scheme_include, scheme_exclude, SchemeMask::ALL.bits())?;

    Some(ParsedOptions {
        flags,
        type_mask: RequestType::from_bits_truncate(type_bits),
        party_mask: PartyMask::from_bits_truncate(party_bits),
        scheme_mask: SchemeMask::from_bits_truncate(scheme_bits),
        domain_constraints,
        redirect,
        is_badfilter,
    })
}

fn parse_redirect_value(value: &str, directive_only: bool) -> Option<RedirectOption> {
    // Drop a ":priority" suffix
    let name = value.split(':').next().unwrap_or(value).trim();
    if name.is_empty() {
        return None;
    }
    Some(RedirectOption {
        name: name.to_string(),
        directive_only,
    })
}

fn merge_constraints(
    existing: Option<DomainConstraint>,
    incoming: DomainConstraint,
) -> DomainConstraint {
    match existing {
        Some(mut current) => {
            current.include.extend(incoming.include);
            current.exclude.extend(incoming.exclude);
            current
        }
        None => incoming,
    }
}

fn parse_domain_option(value: &str) -> Option<DomainConstraint> {
    let mut include = Vec::new();
    let mut exclude = Vec::new();

    for raw in value.split('|') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let (is_exclude, domain_raw) = match raw.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        let hash = hash_domain(&normalize_domain(domain_raw)?);
        if is_exclude {
            exclude.push(hash);
        } else {
            include.push(hash);
        }
    }

    if include.is_empty() && exclude.is_empty() {
        return None;
    }

    include.sort_unstable();
    include.dedup();
    exclude.sort_unstable();
    exclude.dedup();

    Some(DomainConstraint { include, exclude })
}

fn finalize_mask_u32(include: u32, exclude: u32, all: u32) -> Option<u32> {
    let include = include & all;
    let exclude = exclude & all;
    let mut mask = if include != 0 { include & !exclude } else { all & !exclude };
    if mask == 0 {
        return None;
    }
    if mask == all {
        mask = 0;
    }
    Some(mask)
}

fn finalize_mask_u8(include: u8, exclude: u8, all: u8) -> Option<u8> {
    let include = include & all;
    let exclude = exclude & all;
    let mut mask = if include != 0 { include & !exclude } else { all & !exclude };
    if mask == 0 {
        return None;
    }
    if mask == all {
        mask = 0;
    }
    Some(mask)
}

fn request_type_mask(name: &str) -> Option<u32> {
    match name {
        "script" => Some(RequestType::SCRIPT.bits()),
        "image" => Some(RequestType::IMAGE.bits()),
        "stylesheet" | "css" => Some(RequestType::STYLESHEET.bits()),
        "object" => Some(RequestType::OBJECT.bits()),
        "subdocument" | "frame" => Some(RequestType::SUBDOCUMENT.bits()),
        "document" | "doc" | "main_frame" => Some(RequestType::MAIN_FRAME.bits()),
        "xmlhttprequest" | "xhr" => Some(RequestType::XMLHTTPREQUEST.bits()),
        "media" => Some(RequestType::MEDIA.bits()),
        "font" => Some(RequestType::FONT.bits()),
        "ping" => Some(RequestType::PING.bits()),
        "websocket" => Some(RequestType::WEBSOCKET.bits()),
        "beacon" => Some(RequestType::BEACON.bits()),
        "fetch" => Some(RequestType::FETCH.bits()),
        "csp_report" => Some(RequestType::CSP_REPORT.bits()),
        "other" => Some(RequestType::OTHER.bits()),
        _ => None,
    }
}

fn party_mask(name: &str) -> Option<u8> {
    match name {
        "third-party" | "thirdparty" | "3p" => Some(PartyMask::THIRD_PARTY.bits()),
        "first-party" | "firstparty" | "1p" => Some(PartyMask::FIRST_PARTY.bits()),
        _ => None,
    }
}

fn scheme_mask(name: &str) -> Option<u8> {
    match name {
        "http" => Some(SchemeMask::HTTP.bits()),
        "https" => Some(SchemeMask::HTTPS.bits()),
        "ws" => Some(SchemeMask::WS.bits()),
        "wss" => Some(SchemeMask::WSS.bits()),
        "data" => Some(SchemeMask::DATA.bits()),
        "ftp" => Some(SchemeMask::FTP.bits()),
        _ => None,
    }
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[') || line.starts_with('#')
}

fn is_cosmetic_line(line: &str) -> bool {
    line.contains("##") || line.contains("#@#") || line.contains("#?#") || line.contains("#$#")
}

/// `||host^` with nothing else is a pure hostname rule.
fn parse_host_anchor_rule(line: &str) -> Option<String> {
    let rest = line.strip_prefix("||")?;
    let rest = rest.strip_prefix('.').unwrap_or(rest);

    let host = rest
        .strip_suffix("^|")
        .or_else(|| rest.strip_suffix('^'))
        .unwrap_or(rest);

    // Without a separator only complete dotted hostnames qualify.
    if host.len() == rest.len() && !host.contains('.') {
        return None;
    }

    normalize_domain(host)
}

const LOCAL_HOSTNAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "local",
    "broadcasthost",
    "ip6-localhost",
    "ip6-loopback",
    "0.0.0.0",
];

/// Host field of a `0.0.0.0 tracker.example` style hosts-file line.
fn hosts_file_host(line: &str) -> Option<&str> {
    let mut parts = line.split_whitespace();
    let first = parts.next()?;
    let second = parts.next()?;

    if first.parse::<IpAddr>().is_err() {
        return None;
    }
    Some(second)
}

fn normalize_domain(host: &str) -> Option<String> {
    let trimmed = host.trim().trim_matches('.');
    if trimmed.is_empty() {
        return None;
    }

    if !trimmed
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-' || b == b'_')
    {
        return None;
    }

    Some(trimmed.to_ascii_lowercase())
}

struct ParsedPattern {
    domain: String,
    pattern: String,
    anchor_type: AnchorType,
    right_anchor: bool,
}

fn parse_pattern_rule(line: &str, has_options: bool) -> Option<ParsedPattern> {
    let line = line.trim();

    // Regular expression filters are not supported
    if line.len() > 2 && line.starts_with('/') && line.ends_with('/') {
        return None;
    }

    let (anchor_type, rest) = if let Some(rest) = line.strip_prefix("||") {
        (AnchorType::Hostname, rest)
    } else if let Some(rest) = line.strip_prefix('|') {
        (AnchorType::Left, rest)
    } else {
        (AnchorType::None, line)
    };

    if rest.contains(char::is_whitespace) {
        return None;
    }

    let (rest, right_anchor) = match rest.strip_suffix('|') {
        Some(stripped) => (stripped, true),
        None => (rest, false),
    };

    // A match-all pattern is only useful when options narrow it down
    let match_all = rest.bytes().all(|b| b == b'*');
    if match_all && (anchor_type != AnchorType::None || right_anchor || !has_options) {
        return None;
    }

    let domain = extract_pattern_domain(rest, anchor_type);

    Some(ParsedPattern {
        domain,
        pattern: if match_all { String::new() } else { rest.to_string() },
        anchor_type,
        right_anchor,
    })
}

fn extract_pattern_domain(pattern: &str, anchor_type: AnchorType) -> String {
    if anchor_type != AnchorType::Hostname {
        return String::new();
    }

    let end = pattern
        .find(|c| matches!(c, '/' | '^' | '*' | '?' | '#' | ':'))
        .unwrap_or(pattern.len());
    normalize_domain(&pattern[..end]).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(line: &str) -> ParsedRule {
        let parsed = parse_filter_list(line);
        assert_eq!(parsed.rules.len(), 1, "expected one rule from {:?}", line);
        parsed.rules.into_iter().next().unwrap()
    }

    #[test]
    fn skips_comments_and_cosmetics() {
        let list = "! comment\n[Adblock Plus 2.0]\nexample.com##.ad\n# hosts comment\n\n";
        let parsed = parse_filter_list(list);
        assert!(parsed.rules.is_empty());
        assert_eq!(parsed.ignored, 4);
        assert_eq!(parsed.skipped, 0);
    }

    #[test]
    fn parses_hostname_rules() {
        let rule = single("||Ads.Example.com^");
        assert_eq!(rule.action, RuleAction::Block);
        assert_eq!(rule.domain, "ads.example.com");
        assert!(rule.pattern.is_none());

        let rule = single("@@||cdn.example.com^$important");
        assert_eq!(rule.action, RuleAction::Allow);
        assert!(rule.flags.contains(RuleFlags::IMPORTANT));
    }

    #[test]
    fn parses_hosts_file_lines() {
        let list = "0.0.0.0 tracker.net\n127.0.0.1 localhost\n::1 ip6-localhost";
        let parsed = parse_filter_list(list);
        assert_eq!(parsed.rules.len(), 1);
        assert_eq!(parsed.rules[0].domain, "tracker.net");
    }

    #[test]
    fn parses_pattern_anchors() {
        let rule = single("||example.com/ads/*.gif|");
        assert_eq!(rule.anchor_type, AnchorType::Hostname);
        assert_eq!(rule.domain, "example.com");
        assert_eq!(rule.pattern.as_deref(), Some("example.com/ads/*.gif"));
        assert!(rule.flags.contains(RuleFlags::HAS_RIGHT_ANCHOR));

        let rule = single("|https://track.");
        assert_eq!(rule.anchor_type, AnchorType::Left);
        assert!(rule.flags.contains(RuleFlags::HAS_LEFT_ANCHOR));
    }

    #[test]
    fn parses_type_party_and_scheme_options() {
        let rule = single("/pixel.$image,third-party,~https");
        assert_eq!(rule.type_mask, RequestType::IMAGE);
        assert_eq!(rule.party_mask, PartyMask::THIRD_PARTY);
        assert_eq!(rule.scheme_mask, SchemeMask::ALL - SchemeMask::HTTPS);

        let rule = single("/beacon.$~third-party");
        assert_eq!(rule.party_mask, PartyMask::FIRST_PARTY);

        let rule = single("/all-types.$~script");
        assert_eq!(rule.type_mask, RequestType::ALL - RequestType::SCRIPT);
    }

    #[test]
    fn parses_domain_option() {
        let rule = single("/ads.$domain=example.com|~shop.example.com");
        let constraints = rule.domain_constraints.unwrap();
        assert_eq!(constraints.include, vec![hash_domain("example.com")]);
        assert_eq!(constraints.exclude, vec![hash_domain("shop.example.com")]);
    }

    #[test]
    fn parses_redirect_options() {
        let rule = single("||example.com/ads.js$script,redirect=noopjs");
        assert_eq!(rule.action, RuleAction::Block);
        assert!(rule.flags.contains(RuleFlags::FROM_REDIRECT_EQ));
        assert_eq!(rule.redirect.as_deref(), Some("noopjs"));

        let rule = single("||example.com/ads.js$redirect-rule=noopjs:10");
        assert_eq!(rule.action, RuleAction::RedirectDirective);
        assert_eq!(rule.redirect.as_deref(), Some("noopjs"));
    }

    #[test]
    fn parses_explicitcancel_and_badfilter() {
        let rule = single("||tracker.net^$explicitcancel");
        assert!(rule.flags.contains(RuleFlags::EXPLICIT_CANCEL));

        let rule = single("||tracker.net^$badfilter");
        assert!(rule.is_badfilter);
    }

    #[test]
    fn skips_unsupported_lines() {
        let list = "/ads[0-9]+/\n/ads.$unknown-option\n*\n/x.$script,~script\n||\n";
        let parsed = parse_filter_list(list);
        assert!(parsed.rules.is_empty());
        assert_eq!(parsed.skipped, 5);
    }

    #[test]
    fn match_all_needs_options() {
        let rule = single("*$third-party,script");
        assert_eq!(rule.pattern.as_deref(), Some(""));
        assert_eq!(rule.type_mask, RequestType::SCRIPT);
    }

    #[test]
    fn dollar_inside_url_is_not_options() {
        let rule = single("/page$/x.js");
        assert_eq!(rule.pattern.as_deref(), Some("/page$/x.js"));
    }
}
