use flow_core::{Document, SessionMessage, ShellConfig, UiMessage};
use serde_json::json;

// ============================================================================
// UI -> Session
// ============================================================================

#[test]
fn test_decode_ui_intents() {
    let cases = [
        (json!({"type": "ready"}), UiMessage::Ready),
        (
            json!({"type": "log", "message": "hi"}),
            UiMessage::Log {
                message: "hi".to_string(),
            },
        ),
        (
            json!({"type": "execute", "blockId": "a1", "cmd": "ls"}),
            UiMessage::Execute {
                block_id: "a1".to_string(),
                cmd: "ls".to_string(),
            },
        ),
        (
            json!({"type": "stop", "blockId": "a1"}),
            UiMessage::Stop {
                block_id: "a1".to_string(),
            },
        ),
        (
            json!({"type": "terminalInput", "blockId": "a1", "data": "y\n"}),
            UiMessage::TerminalInput {
                block_id: "a1".to_string(),
                data: "y\n".to_string(),
            },
        ),
        (json!({"type": "requestShellConfig"}), UiMessage::RequestShellConfig),
    ];

    for (value, expected) in cases {
        let decoded: UiMessage = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(decoded, expected, "decoding {}", value);
    }
}

#[test]
fn test_decode_update_carries_document() {
    let value = json!({
        "type": "update",
        "document": { "blocks": [{ "id": "m", "type": "markdown", "content": "x" }] }
    });
    match serde_json::from_value::<UiMessage>(value).unwrap() {
        UiMessage::Update { document } => assert_eq!(document.blocks.len(), 1),
        other => panic!("expected update, got {:?}", other),
    }
}

#[test]
fn test_unknown_intent_is_rejected() {
    assert!(serde_json::from_value::<UiMessage>(json!({"type": "explode"})).is_err());
    assert!(serde_json::from_value::<UiMessage>(json!({"type": "execute"})).is_err());
}

// ============================================================================
// Session -> UI
// ============================================================================

#[test]
fn test_encode_execution_messages() {
    let end = SessionMessage::ExecutionEnd {
        block_id: "b".to_string(),
        exit_code: 127,
    };
    assert_eq!(
        serde_json::to_value(&end).unwrap(),
        json!({"type": "executionEnd", "blockId": "b", "exitCode": 127})
    );

    let out = SessionMessage::ExecutionOutput {
        block_id: "b".to_string(),
        data: "hi\n".to_string(),
    };
    assert_eq!(
        serde_json::to_value(&out).unwrap(),
        json!({"type": "executionOutput", "blockId": "b", "data": "hi\n"})
    );

    let start = SessionMessage::ExecutionStart {
        block_id: "b".to_string(),
    };
    assert_eq!(
        serde_json::to_value(&start).unwrap(),
        json!({"type": "executionStart", "blockId": "b"})
    );
}

#[test]
fn test_encode_ack_and_shell_config() {
    assert_eq!(
        serde_json::to_value(SessionMessage::Ack { success: false }).unwrap(),
        json!({"type": "ack", "success": false})
    );

    let shells = SessionMessage::ShellConfig {
        shells: vec![ShellConfig {
            label: "zsh".to_string(),
            path: "/bin/zsh".to_string(),
            icon: "terminal".to_string(),
        }],
    };
    assert_eq!(
        serde_json::to_value(&shells).unwrap(),
        json!({"type": "shellConfig", "shells": [
            {"label": "zsh", "path": "/bin/zsh", "icon": "terminal"}
        ]})
    );
}

#[test]
fn test_encode_init_embeds_document() {
    let init = SessionMessage::Init {
        document: Document::default(),
    };
    let value = serde_json::to_value(&init).unwrap();
    assert_eq!(value["type"], json!("init"));
    assert_eq!(value["document"]["blocks"], json!([]));
}
