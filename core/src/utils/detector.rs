use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;

/// Vendor error fingerprints, grouped by database family. Any single hit is
/// enough; matching is case-insensitive.
const DB_ERROR_PATTERNS: &[(&str, &[&str])] = &[
    ("MySQL", &[
        r"You have an error in your SQL syntax",
        r"SQL syntax.*?MySQL",
        r"Warning.*?\Wmysqli?_",
        r"MySQLSyntaxErrorException",
        r"valid MySQL result",
        r"check the manual that (corresponds|fits) to your (MySQL|MariaDB) server version",
        r"com\.mysql\.jdbc",
    ]),
    ("PostgreSQL", &[
        r"PostgreSQL.*?ERROR",
        r"Warning.*?\Wpg_",
        r"valid PostgreSQL result",
        r"Npgsql\.",
        r"PG::SyntaxError:",
        r"org\.postgresql\.util\.PSQLException",
        r"ERROR:\s+syntax error at or near",
        r"unterminated quoted string at or near",
    ]),
    ("Microsoft SQL Server", &[
        r"Driver.*? SQL[\-_ ]*Server",
        r"OLE DB.*? SQL Server",
        r"\bSQL Server[^<\x22]+Driver",
        r"Warning.*?\W(mssql|sqlsrv)_",
        r"System\.Data\.SqlClient\.SqlException",
        r"Unclosed quotation mark after the character string",
        r"Microsoft SQL Native Client error",
        r"ODBC SQL Server Driver",
    ]),
    ("Oracle", &[
        r"\bORA-\d{5}",
        r"Oracle error",
        r"Oracle.*?Driver",
        r"Warning.*?\W(oci|ora)_",
        r"quoted string not properly terminated",
        r"SQL command not properly ended",
    ]),
    ("SQLite", &[
        r"SQLite/JDBCDriver",
        r"SQLite\.Exception",
        r"System\.Data\.SQLite\.SQLiteException",
        r"Warning.*?\W(sqlite_|SQLite3::)",
        r"\[SQLITE_ERROR\]",
        r"SQLite error \d+:",
        r"sqlite3\.OperationalError:",
        r"SQLite3::SQLException",
        r"unrecognized token:",
    ]),
    ("IBM DB2", &[
        r"CLI Driver.*?DB2",
        r"DB2 SQL error",
        r"\bdb2_\w+\(",
        r"SQLSTATE.+SQLCODE",
    ]),
    ("Sybase", &[
        r"Warning.*?\Wsybase_",
        r"Sybase message",
        r"Sybase.*?Server message",
        r"SybSQLException",
        r"com\.sybase\.jdbc",
    ]),
    ("Microsoft Access", &[
        r"Microsoft Access (\d+ )?Driver",
        r"JET Database Engine",
        r"Access Database Engine",
        r"ODBC Microsoft Access",
        r"Syntax error \(missing operator\) in query expression",
    ]),
];

/// Inline script constructs flagged by the passive script audit.
const SCRIPT_SIGNALS: &[(&str, &str)] = &[
    ("eval(", "eval() can turn attacker-controlled strings into code"),
    ("document.write(", "document.write() with untrusted data enables DOM-based XSS"),
    ("innerHTML", "innerHTML assignment with untrusted data enables DOM-based XSS"),
    ("unescape(", "unescape() is deprecated and often part of obfuscated payloads"),
    ("escape(", "escape() is deprecated and does not encode safely for HTML or URLs"),
];

fn db_error_regexes() -> &'static [(&'static str, Regex)] {
    static COMPILED: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        DB_ERROR_PATTERNS
            .iter()
            .flat_map(|(family, patterns)| {
                patterns.iter().filter_map(move |p| {
                    RegexBuilder::new(p)
                        .case_insensitive(true)
                        .build()
                        .ok()
                        .map(|re| (*family, re))
                })
            })
            .collect()
    })
}

/// Response fingerprinting for the injection classes.
#[derive(Debug, Clone, Copy, Default)]
pub struct VulnerabilityDetector;

impl VulnerabilityDetector {
    pub fn new() -> Self {
        Self
    }

    /// Verbatim substring test. Not HTML-context aware, so an echo inside a
    /// comment or attribute counts too.
    pub fn is_reflected(&self, body: &str, payload: &str) -> bool {
        !payload.is_empty() && body.contains(payload)
    }

    pub fn has_database_error(&self, body: &str) -> bool {
        self.database_error(body).is_some()
    }

    /// Database family and matched text of the first vendor error found.
    pub fn database_error<'b>(&self, body: &'b str) -> Option<(&'static str, &'b str)> {
        db_error_regexes()
            .iter()
            .find_map(|(family, re)| re.find(body).map(|m| (*family, m.as_str())))
    }

    /// Risky inline-script constructs present in `body`, with a reason each.
    pub fn script_signals(&self, body: &str) -> Vec<(&'static str, &'static str)> {
        let mut found = Vec::new();
        for (needle, reason) in SCRIPT_SIGNALS {
            let hit = if *needle == "escape(" {
                // "unescape(" contains "escape("; only count standalone calls.
                body.match_indices(needle).any(|(i, _)| {
                    !body[..i].ends_with("un")
                })
            } else {
                body.contains(needle)
            };
            if hit {
                found.push((*needle, *reason));
            }
        }
        found
    }
}
