//! Filter list and exception file helpers.

use std::fs;
use std::path::Path;

use tb_engine::{exceptions_to_rules, parse_exceptions};

/// A filter list read from disk.
pub struct ListFile {
    pub name: String,
    pub text: String,
}

pub fn read_list(path: &str) -> Result<ListFile, String> {
    let bytes = fs::read(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| format!("'{}' is not valid UTF-8: {}", path, e))?;

    Ok(ListFile {
        name: display_name(path),
        text,
    })
}

pub fn read_lists(paths: &[String]) -> Result<Vec<ListFile>, String> {
    if paths.is_empty() {
        return Err("No input files specified".to_string());
    }
    paths.iter().map(|path| read_list(path)).collect()
}

/// Read an exceptions file and turn it into exception rules.
///
/// None when the file lists no usable exceptions.
pub fn read_exception_rules(path: &str) -> Result<Option<String>, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    let exceptions = parse_exceptions(&text);
    Ok(exceptions_to_rules(&exceptions))
}

fn display_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}
