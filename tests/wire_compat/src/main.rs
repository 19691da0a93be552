fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use chatline_protocol::frames::{ClientFrame, ServerFrame};
    use chatline_protocol::types::ChatMessage;

    /// Parses a reference frame, re-serializes the typed value, and
    /// compares the JSON values (order-independent comparison).
    fn roundtrip_client(reference: &str) {
        let value: serde_json::Value = serde_json::from_str(reference).unwrap();
        let parsed: ClientFrame = serde_json::from_value(value.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {reference}: {e}"));
        let reserialized = serde_json::to_value(&parsed).unwrap();
        assert_eq!(
            value, reserialized,
            "roundtrip mismatch:\n  reference: {reference}\n  ours:      {reserialized}"
        );
    }

    fn roundtrip_server(reference: &str) {
        let value: serde_json::Value = serde_json::from_str(reference).unwrap();
        let parsed: ServerFrame = serde_json::from_value(value.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {reference}: {e}"));
        let reserialized = serde_json::to_value(&parsed).unwrap();
        assert_eq!(
            value, reserialized,
            "roundtrip mismatch:\n  reference: {reference}\n  ours:      {reserialized}"
        );
    }

    // --- Client → server frames ---

    #[test]
    fn frame_auth() {
        roundtrip_client(r#"{"type":"auth","userId":"17"}"#);
    }

    #[test]
    fn frame_new_message_request() {
        roundtrip_client(r#"{"type":"new_message","receiverId":"42","content":"is the apartment still available?"}"#);
    }

    #[test]
    fn frame_mark_read_request() {
        roundtrip_client(r#"{"type":"mark_read","messageId":"5f0c4b1a-9a9e-4d27-b7a5-0a1d9c2e7f10"}"#);
    }

    // --- Server → client frames ---

    #[test]
    fn frame_auth_success() {
        roundtrip_server(r#"{"type":"auth_success","userId":"17"}"#);
    }

    #[test]
    fn frame_new_message_push() {
        roundtrip_server(
            r#"{"type":"new_message","message":{"id":"5f0c4b1a-9a9e-4d27-b7a5-0a1d9c2e7f10","senderId":"17","receiverId":"42","content":"hi","read":false,"createdAt":"2026-01-15T10:30:00Z"}}"#,
        );
    }

    #[test]
    fn frame_message_sent_ack() {
        roundtrip_server(
            r#"{"type":"message_sent","message":{"id":"5f0c4b1a-9a9e-4d27-b7a5-0a1d9c2e7f10","senderId":"17","receiverId":"42","content":"hi","read":false,"createdAt":"2026-01-15T10:30:00Z"}}"#,
        );
    }

    #[test]
    fn frame_message_read_receipt() {
        roundtrip_server(
            r#"{"type":"message_read","messageId":"5f0c4b1a-9a9e-4d27-b7a5-0a1d9c2e7f10"}"#,
        );
    }

    #[test]
    fn frame_mark_read_status() {
        roundtrip_server(
            r#"{"type":"mark_read_status","success":true,"messageId":"5f0c4b1a-9a9e-4d27-b7a5-0a1d9c2e7f10"}"#,
        );
    }

    #[test]
    fn frame_error() {
        roundtrip_server(r#"{"type":"error","message":"not authenticated"}"#);
    }

    // --- Forward compatibility ---

    #[test]
    fn unknown_client_discriminator_is_tolerated() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"typing","receiverId":"42"}"#).unwrap();
        assert_eq!(frame, ClientFrame::Unknown);
    }

    #[test]
    fn unknown_server_discriminator_is_tolerated() {
        let frame: ServerFrame =
            serde_json::from_str(r#"{"type":"presence","userId":"42","online":true}"#).unwrap();
        assert_eq!(frame, ServerFrame::Unknown);
    }

    // --- Entity shape ---

    #[test]
    fn message_entity_field_names() {
        let json = r#"{
            "id": "5f0c4b1a-9a9e-4d27-b7a5-0a1d9c2e7f10",
            "senderId": "17",
            "receiverId": "42",
            "content": "hi",
            "read": true,
            "createdAt": "2026-01-15T10:30:00Z"
        }"#;
        let message: ChatMessage = serde_json::from_str(json).unwrap();
        assert_eq!(message.sender_id, "17");
        assert_eq!(message.receiver_id, "42");
        assert!(message.read);

        let out = serde_json::to_value(&message).unwrap();
        assert!(out.get("senderId").is_some());
        assert!(out.get("receiverId").is_some());
        assert!(out.get("createdAt").is_some());
        assert!(out.get("sender_id").is_none());
    }
}
