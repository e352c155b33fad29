//! `code-search` (§4.2). Carried over from a prior agent runtime's
//! `tools/search_files.rs` near-verbatim — same substring walk, same binary
//! sniff, same 100-match cap — renamed to this runtime's flat tool name.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::catalog::{Tool, ToolResult};

const MAX_MATCHES: usize = 100;

pub struct CodeSearchTool;

#[async_trait]
impl Tool for CodeSearchTool {
    fn name(&self) -> &str {
        "code-search"
    }

    fn description(&self) -> &str {
        "Recursively search file contents for a substring pattern. Returns matching \
         lines in `file:line_number: content` format. Skips binary files and the .git \
         directory. Returns at most 100 matches."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Root directory to search in." },
                "pattern": { "type": "string", "description": "Substring to search for (case-sensitive)." },
                "file_pattern": { "type": "string", "description": "Optional filename suffix filter, e.g. '.rs' or '.toml'." }
            },
            "required": ["path", "pattern"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let Some(root) = input.get("path").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: path");
        };
        let Some(pattern) = input.get("pattern").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: pattern");
        };
        let file_pattern = input.get("file_pattern").and_then(|v| v.as_str());

        let mut matches: Vec<String> = Vec::new();
        let mut truncated = false;
        search_dir(std::path::Path::new(root), pattern, file_pattern, &mut matches, &mut truncated);

        if matches.is_empty() {
            return ToolResult::success("No matches found.");
        }

        let mut output = matches.join("\n");
        if truncated {
            output.push_str(&format!("\n\n[truncated at {MAX_MATCHES} matches]"));
        }
        ToolResult::success(output)
    }
}

fn search_dir(
    dir: &std::path::Path,
    pattern: &str,
    file_pattern: Option<&str>,
    matches: &mut Vec<String>,
    truncated: &mut bool,
) {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(_) => return,
    };

    let mut entries: Vec<std::path::PathBuf> = read_dir.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    entries.sort();

    for entry in entries {
        if *truncated {
            return;
        }
        if entry.file_name().map(|n| n == ".git").unwrap_or(false) {
            continue;
        }
        if entry.is_dir() {
            search_dir(&entry, pattern, file_pattern, matches, truncated);
        } else if entry.is_file() {
            if let Some(fp) = file_pattern {
                if !entry.to_string_lossy().ends_with(fp) {
                    continue;
                }
            }
            search_file(&entry, pattern, matches, truncated);
        }
    }
}

fn search_file(path: &std::path::Path, pattern: &str, matches: &mut Vec<String>, truncated: &mut bool) {
    let content = match std::fs::read(path) {
        Ok(b) => b,
        Err(_) => return,
    };

    let probe = &content[..content.len().min(8192)];
    if probe.contains(&0u8) {
        return;
    }

    let text = match std::str::from_utf8(&content) {
        Ok(t) => t,
        Err(_) => return,
    };

    let display_path = path.to_string_lossy();
    for (line_idx, line) in text.lines().enumerate() {
        if *truncated {
            return;
        }
        if line.contains(pattern) {
            matches.push(format!("{}:{}: {}", display_path, line_idx + 1, line));
            if matches.len() >= MAX_MATCHES {
                *truncated = true;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn finds_substring_matches() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.rs"), "fn main() {}\nlet pattern_x = 1;\n").await.unwrap();

        let tool = CodeSearchTool;
        let result = tool
            .execute(json!({ "path": dir.path().to_str().unwrap(), "pattern": "pattern_x" }))
            .await;
        assert!(!result.is_error);
        assert!(result.content.contains("pattern_x"));
    }

    #[tokio::test]
    async fn respects_file_pattern_filter() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.toml"), "needle").await.unwrap();
        tokio::fs::write(dir.path().join("b.rs"), "needle").await.unwrap();

        let tool = CodeSearchTool;
        let result = tool
            .execute(json!({ "path": dir.path().to_str().unwrap(), "pattern": "needle", "file_pattern": ".rs" }))
            .await;
        assert!(result.content.contains("b.rs"));
        assert!(!result.content.contains("a.toml"));
    }
}
