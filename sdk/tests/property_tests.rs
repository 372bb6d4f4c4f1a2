use proptest::prelude::*;
use sdk::errors::{EngineError, MaestroErrorExt};
use sdk::types::ToolInput;

// Property: every error variant always yields a non-empty, user-safe hint
// that never echoes the raw internal message verbatim.
proptest! {
    #[test]
    fn test_error_user_hint_completeness(error_str in "\\PC*") {
        let errs = vec![
            EngineError::Config(error_str.clone()),
            EngineError::Reasoning(error_str.clone()),
            EngineError::AgentNotFound(error_str.clone()),
            EngineError::TaskNotFound(error_str.clone()),
            EngineError::ToolNotFound(error_str.clone()),
            EngineError::ToolError(error_str.clone()),
            EngineError::MemorySerialization(error_str.clone()),
        ];

        for err in errs {
            let hint = err.user_hint();
            // Hint should not be empty
            prop_assert!(!hint.is_empty());

            // Hints are static strings; they must not leak the raw payload
            if error_str.len() > 8 {
                prop_assert!(!hint.contains(&error_str));
            }
        }
    }
}

// Property: ToolInput survives a serde round-trip with arbitrary string
// parameters intact.
proptest! {
    #[test]
    fn test_tool_input_roundtrip(
        key in "[a-z_]{1,16}",
        value in "\\PC{0,64}",
        count in 0i64..10_000
    ) {
        let input = ToolInput::new()
            .with_param(key.clone(), serde_json::json!(value))
            .with_param("count", serde_json::json!(count));

        let serialized = serde_json::to_string(&input).expect("serialize");
        let restored: ToolInput = serde_json::from_str(&serialized).expect("deserialize");

        prop_assert_eq!(restored.params.get(&key), input.params.get(&key));
        prop_assert_eq!(restored.param_i64_opt("count"), Some(count));
    }
}
