use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Conversation payload as the backend returns it
#[allow(dead_code)]
pub fn conversation_json(
    document_id: &str,
    conversation_id: &str,
    messages: &[(&str, &str)],
) -> Value {
    json!({
        "conversationid": conversation_id,
        "document": {
            "documentid": document_id,
            "filename": "report.pdf",
            "created": "2024-03-01T10:00:00Z",
            "docstatus": "ready",
            "conversations": [
                { "conversationid": conversation_id, "created": "2024-03-01T10:05:00Z" }
            ]
        },
        "messages": messages
            .iter()
            .map(|(kind, content)| json!({
                "type": kind,
                "data": { "content": content, "additional_kwargs": {}, "example": false }
            }))
            .collect::<Vec<_>>()
    })
}
