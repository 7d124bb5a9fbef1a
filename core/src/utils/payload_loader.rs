use log::warn;
use std::fs;
use std::io::BufRead;
use std::path::Path;

use crate::core::VulnerabilityClass;
use crate::error::ScanError;
use crate::utils::detector::VulnerabilityDetector;

pub const REFLECTED_PAYLOADS: &[&str] = &[
    "<script>alert('XSS')</script>",
    "<img src=x onerror=alert('XSS')>",
    "<svg onload=alert('XSS')>",
    "javascript:alert('XSS')",
    r#""><script>alert('XSS')</script>"#,
    r#"'-alert('XSS')-'"#,
];

pub const DATABASE_ERROR_PAYLOADS: &[&str] = &[
    "'",
    "\"",
    "' OR '1'='1",
    "' OR '1'='1'--",
    "1' AND '1'='2",
    "' UNION SELECT NULL--",
    "1)) OR 1=1--",
    "'; --",
];

/// Ordered payload lists per injection class plus the matcher for each class.
///
/// Iteration order is the order the lists were given in, so scans are
/// reproducible. An empty list turns probing for that class into a no-op.
#[derive(Debug, Clone)]
pub struct PayloadCatalog {
    reflected: Vec<String>,
    database_error: Vec<String>,
    detector: VulnerabilityDetector,
}

impl Default for PayloadCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PayloadCatalog {
    pub fn new(reflected: Vec<String>, database_error: Vec<String>) -> Self {
        Self {
            reflected,
            database_error,
            detector: VulnerabilityDetector::new(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(
            REFLECTED_PAYLOADS.iter().map(|s| s.to_string()).collect(),
            DATABASE_ERROR_PAYLOADS.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Built-in lists, each replaced by the given file when that file yields
    /// at least one payload.
    pub fn load_from_paths(
        reflected_path: Option<&str>,
        database_error_path: Option<&str>,
    ) -> Result<Self, ScanError> {
        let mut catalog = Self::builtin();

        if let Some(path) = reflected_path {
            let list = load_list_from_file(path)?;
            if list.is_empty() {
                warn!("No XSS payloads loaded from {}, keeping built-in list", path);
            } else {
                catalog.reflected = list;
            }
        }

        if let Some(path) = database_error_path {
            let list = load_list_from_file(path)?;
            if list.is_empty() {
                warn!("No SQLi payloads loaded from {}, keeping built-in list", path);
            } else {
                catalog.database_error = list;
            }
        }

        Ok(catalog)
    }

    /// Payloads for `class`; empty for classes that are not injection-driven.
    pub fn payloads_for(&self, class: VulnerabilityClass) -> &[String] {
        match class {
            VulnerabilityClass::ReflectedInjection => self.reflected.as_slice(),
            VulnerabilityClass::DatabaseError => self.database_error.as_slice(),
            VulnerabilityClass::MissingSecurityHeader | VulnerabilityClass::UnsafeScript => &[],
        }
    }

    pub fn matches(&self, class: VulnerabilityClass, body: &str, payload: &str) -> bool {
        self.evidence(class, body, payload).is_some()
    }

    /// Human-readable reason a response matched `class`, if it did.
    pub fn evidence(&self, class: VulnerabilityClass, body: &str, payload: &str) -> Option<String> {
        match class {
            VulnerabilityClass::ReflectedInjection => self
                .detector
                .is_reflected(body, payload)
                .then(|| format!("payload reflected verbatim in response: {}", payload)),
            VulnerabilityClass::DatabaseError => self
                .detector
                .database_error(body)
                .map(|(family, text)| format!("{} error message in response: \"{}\"", family, snippet(text))),
            VulnerabilityClass::MissingSecurityHeader | VulnerabilityClass::UnsafeScript => None,
        }
    }
}

fn snippet(text: &str) -> &str {
    match text.char_indices().nth(120) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

/// One payload per line; blank lines are skipped, surrounding whitespace kept
/// except for the line ending.
fn load_list_from_file(path: &str) -> Result<Vec<String>, ScanError> {
    let file = fs::File::open(Path::new(path)).map_err(|source| ScanError::Payloads {
        path: path.to_string(),
        source,
    })?;
    let reader = std::io::BufReader::new(file);
    let mut payloads = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|source| ScanError::Payloads {
            path: path.to_string(),
            source,
        })?;
        let line = line.trim_end_matches('\r');
        if !line.trim().is_empty() {
            payloads.push(line.to_string());
        }
    }
    Ok(payloads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builtin_lists_non_empty() {
        let catalog = PayloadCatalog::builtin();
        assert!(!catalog.payloads_for(VulnerabilityClass::ReflectedInjection).is_empty());
        assert!(!catalog.payloads_for(VulnerabilityClass::DatabaseError).is_empty());
        assert!(catalog.payloads_for(VulnerabilityClass::MissingSecurityHeader).is_empty());
    }

    #[test]
    fn test_order_is_stable() {
        let a = PayloadCatalog::builtin();
        let b = PayloadCatalog::builtin();
        assert_eq!(
            a.payloads_for(VulnerabilityClass::DatabaseError),
            b.payloads_for(VulnerabilityClass::DatabaseError)
        );
        assert_eq!(a.payloads_for(VulnerabilityClass::ReflectedInjection)[0], REFLECTED_PAYLOADS[0]);
    }

    #[test]
    fn test_sql_error_matches_any_payload() {
        let catalog = PayloadCatalog::builtin();
        let body = "Fatal: You have an error in your SQL syntax near ''1''";
        assert!(catalog.matches(VulnerabilityClass::DatabaseError, body, "'"));
        assert!(catalog.matches(VulnerabilityClass::DatabaseError, body, "unrelated"));
        assert!(catalog.matches(VulnerabilityClass::DatabaseError, body, ""));
    }

    #[test]
    fn test_reflected_matcher() {
        let catalog = PayloadCatalog::builtin();
        let payload = "<script>alert('XSS')</script>";
        let body = format!("<div>{}</div>", payload);
        assert!(catalog.matches(VulnerabilityClass::ReflectedInjection, &body, payload));
        assert!(!catalog.matches(VulnerabilityClass::ReflectedInjection, "<div></div>", payload));
    }

    #[test]
    fn test_evidence_names_family() {
        let catalog = PayloadCatalog::builtin();
        let evidence = catalog
            .evidence(VulnerabilityClass::DatabaseError, "ORA-00933: SQL command not properly ended", "'")
            .unwrap();
        assert!(evidence.starts_with("Oracle"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "<b>one</b>").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  two  ").unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let catalog = PayloadCatalog::load_from_paths(Some(&path), None).unwrap();
        assert_eq!(
            catalog.payloads_for(VulnerabilityClass::ReflectedInjection),
            &["<b>one</b>".to_string(), "  two  ".to_string()]
        );
        assert_eq!(
            catalog.payloads_for(VulnerabilityClass::DatabaseError).len(),
            DATABASE_ERROR_PAYLOADS.len()
        );
    }

    #[test]
    fn test_empty_file_keeps_builtin() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let catalog = PayloadCatalog::load_from_paths(None, Some(&path)).unwrap();
        assert_eq!(
            catalog.payloads_for(VulnerabilityClass::DatabaseError).len(),
            DATABASE_ERROR_PAYLOADS.len()
        );
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = PayloadCatalog::load_from_paths(Some("/nonexistent/payloads.txt"), None);
        assert!(matches!(err, Err(ScanError::Payloads { .. })));
    }
}
