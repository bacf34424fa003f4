//! Core type definitions for TrackerBlock
//!
//! Rule-side masks and flags produced by the compiler, and the request-side
//! context and verdict types consumed and produced by the matcher.

// =============================================================================
// Rule Actions
// =============================================================================

/// Action to take for a matched rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum RuleAction {
    /// Exception rule (@@...) - allows the request
    Allow = 0,
    /// Block rule - cancels the request
    Block = 1,
    /// Redirect directive (redirect-rule) - redirects requests blocked by another rule
    RedirectDirective = 2,
}

// =============================================================================
// Rule Flags
// =============================================================================

bitflags::bitflags! {
    /// Flags for rule behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct RuleFlags: u16 {
        /// $important - ignores exception filters
        const IMPORTANT = 1 << 0;
        /// Case-sensitive matching ($match-case)
        const MATCH_CASE = 1 << 1;
        /// $explicitcancel - the block is reported as a deliberate cancel
        const EXPLICIT_CANCEL = 1 << 2;
        /// Created by $redirect= (block part carries the resource)
        const FROM_REDIRECT_EQ = 1 << 3;
        /// Rule has right anchor (ends with |)
        const HAS_RIGHT_ANCHOR = 1 << 7;
        /// Rule has hostname anchor (||)
        const HAS_HOST_ANCHOR = 1 << 8;
        /// Rule has left anchor (starts with |)
        const HAS_LEFT_ANCHOR = 1 << 9;
    }
}

// =============================================================================
// Request Types (bit mask for type filtering)
// =============================================================================

bitflags::bitflags! {
    /// Request type bit mask.
    ///
    /// An empty mask on a rule means "any type".
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct RequestType: u32 {
        const OTHER = 1 << 0;
        const SCRIPT = 1 << 1;
        const IMAGE = 1 << 2;
        const STYLESHEET = 1 << 3;
        const OBJECT = 1 << 4;
        const SUBDOCUMENT = 1 << 5;  // iframe/frame
        const MAIN_FRAME = 1 << 6;   // main document
        const XMLHTTPREQUEST = 1 << 7;
        const WEBSOCKET = 1 << 8;
        const FONT = 1 << 9;
        const MEDIA = 1 << 10;
        const PING = 1 << 11;
        const CSP_REPORT = 1 << 12;
        const BEACON = 1 << 13;
        const FETCH = 1 << 14;
        const SPECULATIVE = 1 << 15;

        /// All request types
        const ALL = 0xFFFF;
        /// Document types (main_frame + sub_frame)
        const DOCUMENT = Self::MAIN_FRAME.bits() | Self::SUBDOCUMENT.bits();
    }
}

impl RequestType {
    /// Parse a caller-supplied resource type tag.
    ///
    /// Accepts browser request type names as well as the short aliases
    /// common in host applications (`js`, `img`, `xhr`, ...). Unknown tags
    /// map to [`RequestType::OTHER`].
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "main_frame" | "document" => Self::MAIN_FRAME,
            "sub_frame" | "subdocument" => Self::SUBDOCUMENT,
            "stylesheet" | "css" => Self::STYLESHEET,
            "script" | "js" => Self::SCRIPT,
            "image" | "img" => Self::IMAGE,
            "font" => Self::FONT,
            "object" => Self::OBJECT,
            "xmlhttprequest" | "xhr" => Self::XMLHTTPREQUEST,
            "ping" => Self::PING,
            "beacon" => Self::BEACON,
            "fetch" => Self::FETCH,
            "csp_report" => Self::CSP_REPORT,
            "speculative" => Self::SPECULATIVE,
            "media" => Self::MEDIA,
            "websocket" | "ws" => Self::WEBSOCKET,
            _ => Self::OTHER,
        }
    }
}

// =============================================================================
// Party Masks
// =============================================================================

bitflags::bitflags! {
    /// Party (first-party / third-party) mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct PartyMask: u8 {
        /// Matches first-party requests
        const FIRST_PARTY = 1 << 0;
        /// Matches third-party requests
        const THIRD_PARTY = 1 << 1;
        /// Matches both
        const ALL = Self::FIRST_PARTY.bits() | Self::THIRD_PARTY.bits();
    }
}

// =============================================================================
// Scheme Masks
// =============================================================================

bitflags::bitflags! {
    /// URL scheme mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct SchemeMask: u8 {
        const HTTP = 1 << 0;
        const HTTPS = 1 << 1;
        const WS = 1 << 2;
        const WSS = 1 << 3;
        const DATA = 1 << 4;
        const FTP = 1 << 5;
        /// All web schemes
        const ALL = 0x3F;
    }
}

// =============================================================================
// Request Context
// =============================================================================

/// A network request as handed over by the caller.
///
/// Host fields are precomputed by the caller and treated as opaque strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext<'a> {
    /// URL of the resource being requested
    pub resource_url: &'a str,
    /// URL of the page that issued the request
    pub source_url: &'a str,
    /// Resource type tag ("script", "image", "xhr", ...), if known
    pub resource_type: Option<&'a str>,
    /// Host of the resource URL
    pub request_host: &'a str,
    /// Host of the source page
    pub source_host: &'a str,
}

/// The per-engine match query derived from a [`RequestContext`].
#[derive(Debug, Clone)]
pub struct MatchQuery<'a> {
    /// Full request URL
    pub url: &'a str,
    /// Source page URL (used when `source_host` is empty)
    pub source_url: &'a str,
    /// Request hostname
    pub req_host: &'a str,
    /// Context/initiator hostname
    pub source_host: &'a str,
    /// Is this a third-party request?
    pub is_third_party: bool,
    /// Request type
    pub request_type: RequestType,
    /// URL scheme (empty when unknown)
    pub scheme: SchemeMask,
}

// =============================================================================
// Match Verdict
// =============================================================================

/// Outcome of matching a request.
///
/// `matched == true` means the request is blocked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchVerdict {
    /// A block rule matched and was not overridden
    pub matched: bool,
    /// The deciding block rule asked for an explicit cancel
    pub explicit_cancel: bool,
    /// A block rule matched but an exception rule rescued the request
    pub saved_by_exception: bool,
    /// Resource to serve in place of the blocked content
    pub redirect: Option<String>,
    /// Index of the loaded rule set that produced this verdict
    pub engine_index: Option<usize>,
    /// Rule (within that rule set) that determined the decision
    pub rule_id: Option<usize>,
}

impl MatchVerdict {
    /// True when the request may proceed.
    #[inline]
    pub fn is_allowed(&self) -> bool {
        !self.matched
    }
}
