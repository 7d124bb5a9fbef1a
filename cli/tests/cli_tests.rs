use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

/// Single target with --dry-run should print the dry-run message and exit 0.
#[test]
fn test_single_target_dry_run() {
    cargo_bin_cmd!("webprobe")
        .args(&["http://example.com", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[DRY RUN] Would scan target: http://example.com"));
}

/// List file with --dry-run should process every line and print dry-run for each.
#[test]
fn test_list_file_dry_run() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "http://target1.com").unwrap();
    writeln!(file, "# skipped").unwrap();
    writeln!(file, "http://target2.com").unwrap();

    let path = file.path().to_str().unwrap().to_string();

    cargo_bin_cmd!("webprobe")
        .args(&["-l", &path, "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[DRY RUN] Would scan target: http://target1.com"))
        .stdout(predicate::str::contains("[DRY RUN] Would scan target: http://target2.com"))
        .stdout(predicate::str::contains("# skipped").not());
}

/// Running with no arguments should fail (clap requires target or -l).
#[test]
fn test_no_args_shows_error() {
    cargo_bin_cmd!("webprobe")
        .assert()
        .failure();
}

#[test]
fn test_missing_list_file_fails() {
    cargo_bin_cmd!("webprobe")
        .args(&["-l", "/nonexistent/targets.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn test_unparseable_target_exits_one() {
    cargo_bin_cmd!("webprobe")
        .args(&["not a url", "--timeout", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid target URL"));
}

#[test]
fn test_unsupported_scheme_exits_one() {
    cargo_bin_cmd!("webprobe")
        .args(&["ftp://example.com/"])
        .assert()
        .code(1);
}

#[test]
fn test_help_lists_options() {
    cargo_bin_cmd!("webprobe")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--rate-limit"))
        .stdout(predicate::str::contains("--exhaustive"));
}
