pub mod detector;
pub mod payload_loader;

use std::fs::File;
use std::io;
use std::io::BufRead;
use std::path::Path;

/// Non-empty trimmed lines of a file, skipping `#` comments.
pub fn read_lines(path: &str) -> io::Result<Vec<String>> {
    let file = File::open(Path::new(path))?;
    let reader = io::BufReader::new(file);
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with('#') {
            lines.push(trimmed.to_string());
        }
    }
    Ok(lines)
}
