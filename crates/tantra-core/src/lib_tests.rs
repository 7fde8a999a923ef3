#[cfg(test)]
mod tests {
    use crate::*;

    #[test]
    fn test_user_message_starts_pending() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.delivery, DeliveryState::Pending);
        assert!(!msg.id.is_empty());
    }

    #[test]
    fn test_assistant_message_keeps_metadata() {
        let metadata = MessageMetadata {
            confidence: Some(0.9),
            sources: Some(vec!["kb".to_string()]),
            ..Default::default()
        };
        let msg = Message::assistant("Hi", Some(metadata.clone()));
        assert_eq!(msg.delivery, DeliveryState::Delivered);
        assert_eq!(msg.metadata, Some(metadata));
    }

    #[test]
    fn test_message_without_delivery_field_deserializes() {
        let json = r#"{
            "id": "1",
            "content": "hi",
            "role": "assistant",
            "timestamp": "2024-01-01T00:00:00Z"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.delivery, DeliveryState::Delivered);
        assert!(msg.metadata.is_none());
    }

    #[test]
    fn test_session_title_uses_date() {
        let session = ChatSession::new();
        assert!(session.title.starts_with("Chat "));
        assert!(session.messages.is_empty());
        assert_eq!(session.created_at, session.updated_at);
    }

    #[test]
    fn test_error_entry_serializes_category_as_type() {
        let entry = ErrorLogEntry::new(ErrorCategory::Connection, "boom", None);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "connection");
        assert_eq!(json["resolved"], false);
    }

    #[test]
    fn test_user_predicates() {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": "u1",
            "username": "ada",
            "email": "ada@example.com",
            "role": "developer",
            "permissions": ["debug:read"],
        }))
        .unwrap();
        assert!(user.has_role(UserRole::Developer));
        assert!(!user.has_role(UserRole::Admin));
        assert!(user.has_permission("debug:read"));
        assert!(!user.has_permission("admin:write"));
        assert!(user.is_active);
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("ADMIN".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert!("root".parse::<UserRole>().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_notifier_delivers() {
        let notifier = BroadcastNotifier::default();
        let mut rx = notifier.subscribe();
        notifier.error("Connection failed");
        let n = rx.recv().await.unwrap();
        assert_eq!(n.level, NotificationLevel::Error);
        assert_eq!(n.message, "Connection failed");
    }

    #[test]
    fn test_connection_status_default() {
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Disconnected);
        assert!(ConnectionStatus::Connected.is_connected());
    }
}
