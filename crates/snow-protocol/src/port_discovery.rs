//! The `$TMP/snow-cli-ports.json` discovery file (§6 External Interfaces).
//!
//! Maps workspace folder -> bound port so a CLI process (or another tool)
//! can find a running IDE bridge without scanning the port range itself.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortDiscoveryFile(pub HashMap<String, u16>);

impl PortDiscoveryFile {
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(&self.0)?)
    }

    /// Register `workspace_folder -> port` and persist (read-modify-write —
    /// multiple bridges on the same host is rare enough not to need file
    /// locking here).
    pub fn register(path: &Path, workspace_folder: &str, port: u16) -> std::io::Result<()> {
        let mut file = Self::load(path);
        file.0.insert(workspace_folder.to_string(), port);
        file.save(path)
    }

    /// Remove this workspace's entry on graceful shutdown.
    pub fn unregister(path: &Path, workspace_folder: &str) -> std::io::Result<()> {
        let mut file = Self::load(path);
        file.0.remove(workspace_folder);
        file.save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_unregister_round_trips() {
        let dir = std::env::temp_dir().join(format!("snow-proto-test-{}", std::process::id()));
        let path = dir.join("ports.json");
        PortDiscoveryFile::register(&path, "/repo/a", 9527).unwrap();
        let loaded = PortDiscoveryFile::load(&path);
        assert_eq!(loaded.0.get("/repo/a"), Some(&9527));

        PortDiscoveryFile::unregister(&path, "/repo/a").unwrap();
        let loaded = PortDiscoveryFile::load(&path);
        assert!(loaded.0.get("/repo/a").is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
