use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

/// Response headers whose absence is reported once per fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SecurityHeader {
    XssProtection,
    StrictTransportSecurity,
    FrameOptions,
    ContentSecurityPolicy,
}

impl SecurityHeader {
    pub const ALL: [SecurityHeader; 4] = [
        SecurityHeader::XssProtection,
        SecurityHeader::StrictTransportSecurity,
        SecurityHeader::FrameOptions,
        SecurityHeader::ContentSecurityPolicy,
    ];

    pub fn header_name(&self) -> &'static str {
        match self {
            SecurityHeader::XssProtection => "X-XSS-Protection",
            SecurityHeader::StrictTransportSecurity => "Strict-Transport-Security",
            SecurityHeader::FrameOptions => "X-Frame-Options",
            SecurityHeader::ContentSecurityPolicy => "Content-Security-Policy",
        }
    }

    pub fn rationale(&self) -> &'static str {
        match self {
            SecurityHeader::XssProtection => "helps older browsers block reflected XSS",
            SecurityHeader::StrictTransportSecurity => "enforces HTTPS on later visits",
            SecurityHeader::FrameOptions => "prevents clickjacking through framing",
            SecurityHeader::ContentSecurityPolicy => {
                "restricts script and content sources, limiting XSS and data injection"
            }
        }
    }
}

/// Tracked security headers absent from `headers`. Pure; header names are
/// matched case-insensitively.
pub fn missing_security_headers(headers: &HeaderMap) -> Vec<SecurityHeader> {
    SecurityHeader::ALL
        .into_iter()
        .filter(|h| !headers.contains_key(h.header_name()))
        .collect()
}
