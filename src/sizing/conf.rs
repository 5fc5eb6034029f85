//! App server config file editing
//!
//! The app reads an INI-style config file with an `[options]` section.
//! Updates rewrite only the targeted keys and keep every other line
//! as-is, matching what an operator would do by hand.

use crate::error::{SlipwayError, SlipwayResult};
use std::fs;
use std::path::Path;

const OPTIONS_SECTION: &str = "[options]";

/// Set keys in the `[options]` section of an app config file,
/// preserving the rest of the file. The section is appended if absent.
pub fn set_options(path: &Path, updates: &[(&str, String)]) -> SlipwayResult<()> {
    if !path.exists() {
        return Err(SlipwayError::ConfFileNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)
        .map_err(|e| SlipwayError::io(format!("reading config file {}", path.display()), e))?;
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

    let start = match lines.iter().position(|l| l.trim() == OPTIONS_SECTION) {
        Some(idx) => idx,
        None => {
            lines.push(OPTIONS_SECTION.to_string());
            lines.len() - 1
        }
    };

    let mut end = lines[start + 1..]
        .iter()
        .position(|l| l.trim_start().starts_with('['))
        .map(|offset| start + 1 + offset)
        .unwrap_or(lines.len());

    for (key, value) in updates {
        let rendered = format!("{key} = {value}");
        let existing = lines[start + 1..end]
            .iter()
            .position(|l| l.split('=').next().map(str::trim) == Some(*key))
            .map(|offset| start + 1 + offset);

        match existing {
            Some(idx) => lines[idx] = rendered,
            None => {
                lines.insert(end, rendered);
                end += 1;
            }
        }
    }

    let mut output = lines.join("\n");
    output.push('\n');

    fs::write(path, output)
        .map_err(|e| SlipwayError::io(format!("writing config file {}", path.display()), e))
}

/// Overwrite a postgres config file with `key = value` lines.
pub fn write_postgres_conf(path: &Path, settings: &[(&str, String)]) -> SlipwayResult<()> {
    if !path.exists() {
        return Err(SlipwayError::ConfFileNotFound(path.to_path_buf()));
    }

    let content: String = settings
        .iter()
        .map(|(k, v)| format!("{k} = {v}\n"))
        .collect();

    fs::write(path, content)
        .map_err(|e| SlipwayError::io(format!("writing config file {}", path.display()), e))
}
