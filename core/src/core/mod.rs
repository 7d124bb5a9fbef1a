pub mod crawler;
pub mod engine;
pub mod mutator;
pub mod probe;
pub mod result_aggregator;
pub mod state;
pub mod surface;
pub mod throttle;

use serde::{Deserialize, Serialize};

/// Vulnerability class a finding is reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VulnerabilityClass {
    /// Payload echoed verbatim in the response (XSS-style).
    ReflectedInjection,
    /// Database vendor error text in the response (SQL-injection-style).
    DatabaseError,
    MissingSecurityHeader,
    UnsafeScript,
}

impl VulnerabilityClass {
    /// Classes that are driven by injecting payloads into surfaces.
    pub fn is_injection(&self) -> bool {
        matches!(
            self,
            VulnerabilityClass::ReflectedInjection | VulnerabilityClass::DatabaseError
        )
    }
}

impl std::fmt::Display for VulnerabilityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VulnerabilityClass::ReflectedInjection => write!(f, "XSS"),
            VulnerabilityClass::DatabaseError => write!(f, "SQLi"),
            VulnerabilityClass::MissingSecurityHeader => write!(f, "Missing Header"),
            VulnerabilityClass::UnsafeScript => write!(f, "Unsafe Script"),
        }
    }
}
