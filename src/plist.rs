// Requested DHCP options in IPConfiguration's Info.plist
//
// The DHCP client only asks for the options listed under
// DHCPRequestedParameterList. Option 121 is not among them by default, so the
// server never sends it. The file is edited as text so that its formatting
// is preserved; the change takes effect after a reboot.

use std::path::Path;

use crate::error::{AppError, AppResult};

pub const DEFAULT_PLIST_PATH: &str =
    "/System/Library/SystemConfiguration/IPConfiguration.bundle/Contents/Info.plist";

const REQUESTED_LIST_KEY: &str = "<key>DHCPRequestedParameterList</key>";
const ARRAY_END: &str = "</array>";

fn integer_entry(code: u8) -> String {
    format!("<integer>{}</integer>", code)
}

/// Add `code` to the requested parameter list.
///
/// Returns the new file contents, or `None` if the option is already
/// requested or the list is missing.
pub fn insert_requested_option(contents: &str, code: u8) -> Option<String> {
    let entry = integer_entry(code);
    let mut output = String::with_capacity(contents.len() + entry.len() + 8);

    let mut in_list = false;
    let mut done = false;
    let mut indent: Option<String> = None;
    let mut changed = false;

    for line in contents.split_inclusive('\n') {
        if in_list && !done {
            if line.contains(&entry) {
                return None;
            }
            if indent.is_none() && line.contains("<integer>") {
                indent = Some(leading_whitespace(line).to_string());
            }
            if line.contains(ARRAY_END) {
                let indent = indent
                    .clone()
                    .unwrap_or_else(|| format!("{}\t", leading_whitespace(line)));
                output.push_str(&indent);
                output.push_str(&entry);
                output.push_str(line_ending(line));
                changed = true;
                done = true;
            }
        }
        if line.contains(REQUESTED_LIST_KEY) {
            in_list = true;
        }

        output.push_str(line);
    }

    changed.then_some(output)
}

/// Drop `code` from the requested parameter list.
///
/// Returns the new file contents, or `None` if the option was not requested.
pub fn remove_requested_option(contents: &str, code: u8) -> Option<String> {
    let entry = integer_entry(code);
    let mut output = String::with_capacity(contents.len());

    let mut in_list = false;
    let mut done = false;
    let mut changed = false;

    for line in contents.split_inclusive('\n') {
        if in_list && !done {
            if line.contains(ARRAY_END) {
                done = true;
            } else if line.trim() == entry {
                changed = true;
                continue;
            }
        }
        if line.contains(REQUESTED_LIST_KEY) {
            in_list = true;
        }

        output.push_str(line);
    }

    changed.then_some(output)
}

/// Apply an edit to the plist on disk; returns whether the file changed
pub fn update_plist_file<F>(path: &Path, edit: F) -> AppResult<bool>
where
    F: FnOnce(&str) -> Option<String>,
{
    let contents = std::fs::read_to_string(path)
        .map_err(|e| AppError::Plist(format!("cannot read {}: {}", path.display(), e)))?;

    if !contents.contains(REQUESTED_LIST_KEY) {
        return Err(AppError::Plist(format!(
            "{} has no DHCPRequestedParameterList",
            path.display()
        )));
    }

    match edit(&contents) {
        Some(updated) => {
            std::fs::write(path, updated)
                .map_err(|e| AppError::Plist(format!("cannot write {}: {}", path.display(), e)))?;
            tracing::info!("file written to disk: {}", path.display());
            Ok(true)
        }
        None => Ok(false),
    }
}

fn leading_whitespace(line: &str) -> &str {
    let trimmed = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - trimmed.len()]
}

fn line_ending(line: &str) -> &'static str {
    if line.ends_with("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}
