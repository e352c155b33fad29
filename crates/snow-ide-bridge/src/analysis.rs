//! Heuristic, language-agnostic backing for the `getDiagnostics` /
//! `aceGoToDefinition` / `aceFindReferences` / `aceGetSymbols` / `showGitDiff`
//! requests. §4.10 only specifies the wire shapes ("Wire Protocol Only");
//! this crate carries no embedded language server (Non-goals: "no embedded
//! editor"), so these are plain text scans in the style of
//! `snow-tools::search`'s substring walk rather than a real compiler
//! frontend — good enough to drive the protocol end to end over arbitrary
//! source files without pulling in a per-language toolchain.

use std::path::Path;

use snow_protocol::types::{Diagnostic, Location, Severity, SymbolInfo};

const MAX_LINE_LEN: usize = 200;

/// Flags a handful of textual issues a real linter would also catch:
/// trailing whitespace, TODO/FIXME markers, and overlong lines. Returns an
/// empty list (not an error) for unreadable or binary files.
pub fn collect_diagnostics(file_path: &str) -> Vec<Diagnostic> {
    let Ok(text) = std::fs::read_to_string(file_path) else {
        return Vec::new();
    };

    let mut diagnostics = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line_no = idx as u32;

        if line.ends_with(' ') || line.ends_with('\t') {
            diagnostics.push(Diagnostic {
                message: "trailing whitespace".to_string(),
                severity: Severity::Hint,
                line: line_no,
                character: line.len() as u32,
                source: Some("snow-ide-bridge".to_string()),
                code: None,
            });
        }

        if let Some(pos) = line.find("TODO").or_else(|| line.find("FIXME")) {
            diagnostics.push(Diagnostic {
                message: "unresolved marker".to_string(),
                severity: Severity::Information,
                line: line_no,
                character: pos as u32,
                source: Some("snow-ide-bridge".to_string()),
                code: None,
            });
        }

        if line.len() > MAX_LINE_LEN {
            diagnostics.push(Diagnostic {
                message: format!("line exceeds {MAX_LINE_LEN} characters"),
                severity: Severity::Warning,
                line: line_no,
                character: 0,
                source: Some("snow-ide-bridge".to_string()),
                code: None,
            });
        }
    }

    diagnostics
}

/// Flattened outline: one entry per line matching a common declaration
/// keyword (`fn`, `struct`, `enum`, `trait`, `impl`, `class`, `function`,
/// `def`, `interface`) — covers Rust, JS/TS, and Python well enough for an
/// outline view without a real parser per language.
pub fn extract_symbols(file_path: &str) -> Vec<SymbolInfo> {
    const KEYWORDS: &[(&str, &str)] = &[
        ("fn ", "function"),
        ("struct ", "struct"),
        ("enum ", "enum"),
        ("trait ", "trait"),
        ("impl ", "impl"),
        ("class ", "class"),
        ("function ", "function"),
        ("def ", "function"),
        ("interface ", "interface"),
    ];

    let Ok(text) = std::fs::read_to_string(file_path) else {
        return Vec::new();
    };

    let mut symbols = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim_start();
        let indent = (line.len() - trimmed.len()) as u32;
        for (keyword, kind) in KEYWORDS {
            if let Some(rest) = trimmed.strip_prefix(keyword) {
                let name = declaration_name(rest);
                if name.is_empty() {
                    continue;
                }
                symbols.push(SymbolInfo {
                    name,
                    kind: kind.to_string(),
                    line: idx as u32,
                    column: indent,
                    end_line: idx as u32,
                    end_column: line.len() as u32,
                    detail: Some(trimmed.to_string()),
                });
                break;
            }
        }
    }
    symbols
}

fn declaration_name(rest: &str) -> String {
    rest.chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// The identifier under `(line, column)`, 0-indexed, or `None` if the
/// position lands outside any word.
fn word_at(file_path: &str, line: u32, column: u32) -> Option<String> {
    let text = std::fs::read_to_string(file_path).ok()?;
    let target_line = text.lines().nth(line as usize)?;
    let chars: Vec<char> = target_line.chars().collect();
    let col = (column as usize).min(chars.len());

    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    if col >= chars.len() || !is_word(chars[col]) {
        return None;
    }

    let mut start = col;
    while start > 0 && is_word(chars[start - 1]) {
        start -= 1;
    }
    let mut end = col;
    while end < chars.len() && is_word(chars[end]) {
        end += 1;
    }
    Some(chars[start..end].iter().collect())
}

/// Best-effort go-to-definition: find the first line in `workspace_root`
/// that declares `word` via one of [`extract_symbols`]'s keywords.
pub fn go_to_definition(workspace_root: &str, file_path: &str, line: u32, column: u32) -> Vec<Location> {
    let Some(word) = word_at(file_path, line, column) else { return Vec::new() };
    let mut hits = Vec::new();
    walk_files(Path::new(workspace_root), &mut |path| {
        for symbol in extract_symbols(&path.to_string_lossy()) {
            if symbol.name == word {
                hits.push(Location {
                    file_path: path.to_string_lossy().to_string(),
                    line: symbol.line,
                    column: symbol.column,
                    end_line: symbol.end_line,
                    end_column: symbol.end_column,
                });
            }
        }
    });
    hits
}

/// Every line in the workspace containing `word` as a whole word.
pub fn find_references(workspace_root: &str, file_path: &str, line: u32, column: u32) -> Vec<Location> {
    let Some(word) = word_at(file_path, line, column) else { return Vec::new() };
    let mut hits = Vec::new();
    walk_files(Path::new(workspace_root), &mut |path| {
        let Ok(text) = std::fs::read_to_string(path) else { return };
        for (idx, text_line) in text.lines().enumerate() {
            if let Some(col) = find_whole_word(text_line, &word) {
                hits.push(Location {
                    file_path: path.to_string_lossy().to_string(),
                    line: idx as u32,
                    column: col as u32,
                    end_line: idx as u32,
                    end_column: (col + word.len()) as u32,
                });
            }
        }
    });
    hits
}

fn find_whole_word(line: &str, word: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let wlen = word.len();
    let mut start = 0;
    while let Some(found) = line[start..].find(word) {
        let pos = start + found;
        let before_ok = pos == 0 || !is_word_byte(bytes[pos - 1]);
        let after_ok = pos + wlen >= bytes.len() || !is_word_byte(bytes[pos + wlen]);
        if before_ok && after_ok {
            return Some(pos);
        }
        start = pos + 1;
        if start >= line.len() {
            break;
        }
    }
    None
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn walk_files(dir: &Path, visit: &mut impl FnMut(&Path)) {
    let Ok(read_dir) = std::fs::read_dir(dir) else { return };
    let mut entries: Vec<_> = read_dir.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    entries.sort();
    for entry in entries {
        if entry.file_name().map(|n| n == ".git").unwrap_or(false) {
            continue;
        }
        if entry.is_dir() {
            walk_files(&entry, visit);
        } else if entry.is_file() {
            visit(&entry);
        }
    }
}

/// `git show HEAD:<relpath>` relative to `workspace_root`; empty string if
/// the file is new (not in HEAD) or the workspace isn't a git repo.
pub async fn git_show_head(workspace_root: &str, file_path: &str) -> String {
    let rel = Path::new(file_path)
        .strip_prefix(workspace_root)
        .unwrap_or_else(|_| Path::new(file_path))
        .to_string_lossy()
        .to_string();

    let output = tokio::process::Command::new("git")
        .arg("show")
        .arg(format!("HEAD:{rel}"))
        .current_dir(workspace_root)
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn flags_trailing_whitespace_and_todo() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.rs");
        std::fs::write(&path, "let x = 1; \n// TODO: fix this\n").unwrap();
        let diagnostics = collect_diagnostics(&path.to_string_lossy());
        assert!(diagnostics.iter().any(|d| d.message.contains("trailing whitespace")));
        assert!(diagnostics.iter().any(|d| d.message.contains("marker")));
    }

    #[test]
    fn extracts_function_and_struct_symbols() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.rs");
        std::fs::write(&path, "struct Foo {}\nfn bar() {}\n").unwrap();
        let symbols = extract_symbols(&path.to_string_lossy());
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "Foo");
        assert_eq!(symbols[1].name, "bar");
    }

    #[test]
    fn finds_definition_across_workspace() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("def.rs"), "fn target_fn() {}\n").unwrap();
        let usage_path = dir.path().join("use.rs");
        std::fs::write(&usage_path, "target_fn();\n").unwrap();

        let locations = go_to_definition(&dir.path().to_string_lossy(), &usage_path.to_string_lossy(), 0, 0);
        assert_eq!(locations.len(), 1);
        assert!(locations[0].file_path.ends_with("def.rs"));
    }

    #[test]
    fn whole_word_match_skips_partial_overlap() {
        assert_eq!(find_whole_word("let foobar = foo;", "foo"), Some(13));
        assert_eq!(find_whole_word("foobar", "foo"), None);
    }
}
