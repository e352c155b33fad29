//! Wire messages for the IDE bridge WebSocket (§4.10).
//!
//! Every frame is a single-line JSON object carrying a `type` discriminator —
//! no `method`/`params` envelope, unlike the gateway's admin-panel protocol
//! this crate used to carry. `IdeRequest` variants are sent request->reply
//! (correlated by `request_id`); `IdePush` variants are unsolicited
//! server->client broadcasts.

use serde::{Deserialize, Serialize};

use crate::types::{Diagnostic, DiffFile, Location, Position, SymbolInfo};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IdeRequest {
    GetDiagnostics {
        file_path: String,
        request_id: String,
    },
    AceGoToDefinition {
        file_path: String,
        line: u32,
        column: u32,
        request_id: String,
    },
    AceFindReferences {
        file_path: String,
        line: u32,
        column: u32,
        request_id: String,
    },
    AceGetSymbols {
        file_path: String,
        request_id: String,
    },
    ShowDiff {
        file_path: String,
        original_content: String,
        new_content: String,
        label: Option<String>,
    },
    CloseDiff,
    ShowDiffReview {
        files: Vec<DiffFile>,
    },
    ShowGitDiff {
        file_path: String,
    },
}

impl IdeRequest {
    /// `None` for fire-and-forget commands (showDiff/closeDiff/showDiffReview/
    /// showGitDiff) that never correlate a reply.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            IdeRequest::GetDiagnostics { request_id, .. }
            | IdeRequest::AceGoToDefinition { request_id, .. }
            | IdeRequest::AceFindReferences { request_id, .. }
            | IdeRequest::AceGetSymbols { request_id, .. } => Some(request_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IdeResponse {
    Diagnostics {
        request_id: String,
        diagnostics: Vec<Diagnostic>,
    },
    DefinitionResult {
        request_id: String,
        locations: Vec<Location>,
    },
    ReferencesResult {
        request_id: String,
        locations: Vec<Location>,
    },
    SymbolsResult {
        request_id: String,
        symbols: Vec<SymbolInfo>,
    },
}

impl IdeResponse {
    pub fn request_id(&self) -> &str {
        match self {
            IdeResponse::Diagnostics { request_id, .. }
            | IdeResponse::DefinitionResult { request_id, .. }
            | IdeResponse::ReferencesResult { request_id, .. }
            | IdeResponse::SymbolsResult { request_id, .. } => request_id,
        }
    }
}

/// Server->client unsolicited push (§4.10 "Push").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IdePush {
    Context {
        workspace_folder: String,
        active_file: Option<String>,
        cursor_position: Option<Position>,
        selected_text: Option<String>,
    },
    ClearedContext,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_diagnostics_round_trips() {
        let json = r#"{"type":"getDiagnostics","filePath":"src/lib.rs","requestId":"r1"}"#;
        let req: IdeRequest = serde_json::from_str(json).unwrap();
        match &req {
            IdeRequest::GetDiagnostics { file_path, request_id } => {
                assert_eq!(file_path, "src/lib.rs");
                assert_eq!(request_id, "r1");
            }
            _ => panic!("wrong variant"),
        }
        assert_eq!(req.request_id(), Some("r1"));
    }

    #[test]
    fn show_diff_has_no_request_id() {
        let req = IdeRequest::ShowDiff {
            file_path: "a.rs".into(),
            original_content: "a".into(),
            new_content: "b".into(),
            label: None,
        };
        assert_eq!(req.request_id(), None);
    }

    #[test]
    fn diagnostics_reply_serializes_camel_case() {
        let res = IdeResponse::Diagnostics {
            request_id: "r1".into(),
            diagnostics: vec![],
        };
        let json = serde_json::to_string(&res).unwrap();
        assert!(json.contains(r#""type":"diagnostics""#));
        assert!(json.contains(r#""requestId":"r1""#));
    }

    #[test]
    fn context_push_round_trips() {
        let push = IdePush::Context {
            workspace_folder: "/repo".into(),
            active_file: Some("src/main.rs".into()),
            cursor_position: Some(Position { line: 4, character: 2 }),
            selected_text: None,
        };
        let json = serde_json::to_string(&push).unwrap();
        let back: IdePush = serde_json::from_str(&json).unwrap();
        match back {
            IdePush::Context { workspace_folder, .. } => assert_eq!(workspace_folder, "/repo"),
            _ => panic!("wrong variant"),
        }
    }
}
