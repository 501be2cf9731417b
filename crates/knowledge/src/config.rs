//! Workspace paths for the index and the ledgers.
//!
//! Everything lives under `<workspace>/.relnotes/`.

use std::path::{Path, PathBuf};

/// Get the directory holding the chunk index and its embedding config.
pub fn get_index_dir(workspace: &Path) -> PathBuf {
    workspace.join(".relnotes").join("index")
}

/// Get the SQLite index path.
pub fn get_index_path(workspace: &Path) -> PathBuf {
    get_index_dir(workspace).join("index.sqlite")
}

/// Get the embedding config path for the index.
pub fn get_config_path(workspace: &Path) -> PathBuf {
    get_index_dir(workspace).join("config.yaml")
}

/// Get the directory holding the escalation and contact ledgers.
pub fn get_ledger_dir(workspace: &Path) -> PathBuf {
    workspace.join(".relnotes").join("ledger")
}

/// Get the escalation ledger path.
pub fn get_escalations_path(workspace: &Path) -> PathBuf {
    get_ledger_dir(workspace).join("escalations.jsonl")
}

/// Get the contact ledger path.
pub fn get_contacts_path(workspace: &Path) -> PathBuf {
    get_ledger_dir(workspace).join("contacts.jsonl")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_live_under_relnotes() {
        let ws = Path::new("/tmp/ws");
        assert_eq!(
            get_index_path(ws),
            PathBuf::from("/tmp/ws/.relnotes/index/index.sqlite")
        );
        assert_eq!(
            get_escalations_path(ws),
            PathBuf::from("/tmp/ws/.relnotes/ledger/escalations.jsonl")
        );
        assert!(get_contacts_path(ws).ends_with("contacts.jsonl"));
    }
}
