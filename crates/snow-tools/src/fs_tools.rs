//! `filesystem-read`, `filesystem-edit`, `filesystem-list`, `filesystem-glob`
//! (§4.2 table). Grounded on a prior agent runtime's `tools/read_file.rs`,
//! `tools/patch_file.rs` + `tools/write_file.rs` (merged into one edit tool
//! with an optional `create` mode), and `tools/list_files.rs`. `filesystem-glob`
//! has no direct analogue in that runtime — it generalizes `list_files`'s
//! directory walk with a suffix filter into a recursive glob-style pattern match.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::catalog::{Tool, ToolResult};

const MAX_OUTPUT_CHARS: usize = 30_000;
const MAX_ENTRIES: usize = 1_000;

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "filesystem-read"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Optionally limit to a line range with \
         `offset` (1-based first line) and `limit` (number of lines to return)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Absolute or relative path to the file." },
                "offset": { "type": "integer", "description": "1-based line number to start reading from (optional)." },
                "limit": { "type": "integer", "description": "Maximum number of lines to return (optional)." }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let Some(path) = input.get("path").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: path");
        };

        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("failed to read '{path}': {e}")),
        };

        let offset = input.get("offset").and_then(|v| v.as_u64()).map(|v| v.saturating_sub(1) as usize);
        let limit = input.get("limit").and_then(|v| v.as_u64()).map(|v| v as usize);

        let result = if offset.is_some() || limit.is_some() {
            let start = offset.unwrap_or(0);
            let lines: Vec<&str> = content.lines().skip(start).collect();
            let lines = if let Some(n) = limit { &lines[..n.min(lines.len())] } else { &lines[..] };
            lines.join("\n")
        } else {
            content
        };

        let result = if result.len() > MAX_OUTPUT_CHARS {
            format!("{}\n\n[output truncated at {} characters]", &result[..MAX_OUTPUT_CHARS], MAX_OUTPUT_CHARS)
        } else {
            result
        };

        ToolResult::success(result)
    }
}

/// Edits an existing file via exact string replacement (a prior runtime's
/// `patch_file`), or writes a brand-new file when `create=true` (that
/// runtime's `write_file`) — merged into one tool since this runtime names a
/// single `filesystem-edit` entry.
pub struct EditFileTool;

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "filesystem-edit"
    }

    fn description(&self) -> &str {
        "Make a surgical edit to a file by replacing an exact string with new text, \
         or create a brand-new file by setting `create=true` and providing `content`. \
         Prefer string replacement over rewriting a whole file — it is safer and \
         cheaper on tokens. The match is exact and whitespace-sensitive."
    }

    fn is_time_consuming(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Absolute or relative path to the file to edit or create." },
                "old_string": { "type": "string", "description": "Exact text to find. Required unless create=true." },
                "new_string": { "type": "string", "description": "Replacement text, or the full file content when create=true." },
                "replace_all": { "type": "boolean", "description": "Replace every occurrence instead of just the first. Default false." },
                "create": { "type": "boolean", "description": "Create a new file instead of editing an existing one. Default false." }
            },
            "required": ["path", "new_string"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let Some(path) = input.get("path").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: path");
        };
        let Some(new) = input.get("new_string").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: new_string");
        };
        let create = input.get("create").and_then(|v| v.as_bool()).unwrap_or(false);

        if create {
            return create_file(path, new).await;
        }

        let Some(old) = input.get("old_string").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: old_string (unless create=true)");
        };
        let replace_all = input.get("replace_all").and_then(|v| v.as_bool()).unwrap_or(false);

        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("failed to read '{path}': {e}")),
        };

        let count = content.matches(old).count();
        if count == 0 {
            return ToolResult::error(format!(
                "old_string not found in '{path}'. Use filesystem-read first and copy the text verbatim."
            ));
        }
        if !replace_all && count > 1 {
            return ToolResult::error(format!(
                "old_string matches {count} times in '{path}'. Add more surrounding context to \
                 make it unique, or set replace_all=true."
            ));
        }

        let updated = if replace_all { content.replace(old, new) } else { content.replacen(old, new, 1) };

        if let Err(e) = write_atomic(path, &updated).await {
            return ToolResult::error(e);
        }

        let occurrences = if replace_all { format!("{count} occurrence(s)") } else { "1 occurrence".to_string() };
        ToolResult::success(format!("Patched '{path}': replaced {occurrences} of old_string."))
    }
}

async fn create_file(path: &str, content: &str) -> ToolResult {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolResult::error(format!("failed to create directories for '{path}': {e}"));
            }
        }
    }
    let byte_len = content.len();
    if let Err(e) = tokio::fs::write(path, content).await {
        return ToolResult::error(format!("failed to write '{path}': {e}"));
    }
    ToolResult::success(format!("File written: {byte_len} bytes to '{path}'"))
}

async fn write_atomic(path: &str, content: &str) -> Result<(), String> {
    let tmp_path = format!("{path}.snow_edit_tmp");
    tokio::fs::write(&tmp_path, content)
        .await
        .map_err(|e| format!("failed to write temp file '{tmp_path}': {e}"))?;
    tokio::fs::rename(&tmp_path, path).await.map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        format!("failed to rename temp file to '{path}': {e}")
    })
}

pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "filesystem-list"
    }

    fn description(&self) -> &str {
        "List the contents of a directory. Each entry shows its type (file/dir) \
         and size in bytes. Returns at most 1000 entries."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "path": { "type": "string", "description": "Absolute or relative path to the directory." } },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let Some(path) = input.get("path").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: path");
        };

        let mut read_dir = match tokio::fs::read_dir(path).await {
            Ok(rd) => rd,
            Err(e) => return ToolResult::error(format!("failed to list '{path}': {e}")),
        };

        let mut entries: Vec<String> = Vec::new();
        let mut truncated = false;

        loop {
            if entries.len() >= MAX_ENTRIES {
                truncated = true;
                break;
            }
            let entry = match read_dir.next_entry().await {
                Ok(Some(e)) => e,
                Ok(None) => break,
                Err(_) => continue,
            };
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(_) => continue,
            };
            let name = entry.file_name().to_string_lossy().to_string();
            let kind = if metadata.is_dir() { "dir" } else { "file" };
            entries.push(format!("[{}] {} ({} bytes)", kind, name, metadata.len()));
        }

        entries.sort();
        let mut output = entries.join("\n");
        if truncated {
            output.push_str(&format!("\n\n[truncated at {MAX_ENTRIES} entries]"));
        }

        ToolResult::success(output)
    }
}

/// Recursive filename-glob search, generalizing `list_files`'s suffix
/// filter into a `*`/`**` pattern match over the whole tree.
pub struct GlobFilesTool;

#[async_trait]
impl Tool for GlobFilesTool {
    fn name(&self) -> &str {
        "filesystem-glob"
    }

    fn description(&self) -> &str {
        "Find files by a glob pattern (supports `*` and `**`), rooted at `path`. \
         Returns at most 1000 matching paths, sorted."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Root directory to search in." },
                "pattern": { "type": "string", "description": "Glob pattern, e.g. '**/*.rs'." }
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

        let mut matches = Vec::new();
        let mut truncated = false;
        walk_glob(std::path::Path::new(root), std::path::Path::new(root), pattern, &mut matches, &mut truncated);

        if matches.is_empty() {
            return ToolResult::success("No matches found.");
        }
        matches.sort();
        let mut output = matches.join("\n");
        if truncated {
            output.push_str(&format!("\n\n[truncated at {MAX_ENTRIES} matches]"));
        }
        ToolResult::success(output)
    }
}

fn walk_glob(root: &std::path::Path, dir: &std::path::Path, pattern: &str, matches: &mut Vec<String>, truncated: &mut bool) {
    let Ok(read_dir) = std::fs::read_dir(dir) else { return };
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
            walk_glob(root, &entry, pattern, matches, truncated);
        } else {
            let relative = entry.strip_prefix(root).unwrap_or(&entry).to_string_lossy().to_string();
            if glob_match(pattern, &relative) {
                matches.push(entry.to_string_lossy().to_string());
                if matches.len() >= MAX_ENTRIES {
                    *truncated = true;
                    return;
                }
            }
        }
    }
}

/// Minimal glob matcher supporting `*` (any run within a segment) and `**`
/// (any run across segments), sufficient for the patterns this tool is
/// documented to accept.
fn glob_match(pattern: &str, path: &str) -> bool {
    let regex_like = pattern
        .replace('.', "\u{0}DOT\u{0}")
        .replace("**", "\u{0}DOUBLESTAR\u{0}")
        .replace('*', "[^/]*")
        .replace("\u{0}DOUBLESTAR\u{0}", ".*")
        .replace("\u{0}DOT\u{0}", "\\.");
    simple_match(&regex_like, path)
}

/// Hand-rolled `.`/`*` matcher (no regex dependency) operating on the
/// already-escaped pattern produced by `glob_match`.
fn simple_match(pattern: &str, text: &str) -> bool {
    fn helper(p: &[u8], t: &[u8]) -> bool {
        match p {
            [] => t.is_empty(),
            [b'.', b'*', rest @ ..] if p.starts_with(b".*") => {
                for i in 0..=t.len() {
                    if helper(rest, &t[i..]) {
                        return true;
                    }
                }
                false
            }
            _ => {
                if let Some(pos) = find_subpattern(p) {
                    let (literal, rest) = p.split_at(pos);
                    if !t.starts_with(literal) {
                        return false;
                    }
                    helper(rest, &t[literal.len()..])
                } else {
                    p == t
                }
            }
        }
    }
    fn find_subpattern(p: &[u8]) -> Option<usize> {
        p.windows(2).position(|w| w == b".*")
    }
    helper(pattern.as_bytes(), text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn read_file_respects_offset_and_limit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        tokio::fs::write(&path, "one\ntwo\nthree\nfour\n").await.unwrap();

        let tool = ReadFileTool;
        let result = tool
            .execute(json!({ "path": path.to_str().unwrap(), "offset": 2, "limit": 2 }))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.content, "two\nthree");
    }

    #[tokio::test]
    async fn edit_file_rejects_ambiguous_match() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("b.txt");
        tokio::fs::write(&path, "dup\ndup\n").await.unwrap();

        let tool = EditFileTool;
        let result = tool
            .execute(json!({ "path": path.to_str().unwrap(), "old_string": "dup", "new_string": "x" }))
            .await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn edit_file_creates_new_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/new.txt");
        let tool = EditFileTool;
        let result = tool
            .execute(json!({ "path": path.to_str().unwrap(), "new_string": "hello", "create": true }))
            .await;
        assert!(!result.is_error);
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "hello");
    }

    #[test]
    fn glob_match_handles_double_star() {
        assert!(glob_match("**/*.rs", "src/tools/catalog.rs"));
        assert!(!glob_match("**/*.rs", "src/tools/catalog.toml"));
    }
}
