use std::fs;
use std::io;
use std::path::Path;

use log::warn;

/// Parses a program image from its textual form
///
/// Each line holds an 8-bit binary literal, optionally followed by a `#`
/// comment. Blank lines and lines that do not parse are skipped; a
/// skipped line that is not blank is reported at warn level.
pub fn parse_image(src: &str) -> Vec<u8> {
    let mut out = vec![];
    for (n, line) in src.lines().enumerate() {
        let code = match line.split_once('#') {
            Some((code, _comment)) => code,
            None => line,
        }
        .trim();
        if code.is_empty() {
            continue;
        }
        match u8::from_str_radix(code, 2) {
            Ok(b) => out.push(b),
            Err(_) => warn!("skipping line {}: {line:?}", n + 1),
        }
    }
    out
}

/// Reads and parses a program image from disk
pub fn read_image<P: AsRef<Path>>(path: P) -> io::Result<Vec<u8>> {
    Ok(parse_image(&fs::read_to_string(path)?))
}
