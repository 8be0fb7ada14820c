use proptest::prelude::*;
use sdk::errors::{EngineError, TroupeErrorExt};
use sdk::types::{CapabilityInput, CapabilityOutput};

// User hints must never echo the raw error payload back to the user.
proptest! {
    #[test]
    fn test_error_user_hint_completeness(error_str in "[a-z0-9/._-]{8,40}") {
        let errs = vec![
            EngineError::Config(error_str.clone()),
            EngineError::Database(error_str.clone()),
            EngineError::LLMProvider(error_str.clone()),
            EngineError::CapabilityNotFound(error_str.clone()),
            EngineError::GoalNotFound(error_str.clone()),
            EngineError::CommandDenied(error_str.clone()),
            EngineError::PathDenied(std::path::PathBuf::from(&error_str)),
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            prop_assert!(!hint.contains(&error_str));
        }
    }
}

// A failed capability result always exposes exactly one `error` key,
// whatever structured fields ride along with it.
proptest! {
    #[test]
    fn test_error_output_always_has_error_key(
        message in "\\PC{1,60}",
        extra_key in "[a-z]{1,10}",
    ) {
        prop_assume!(extra_key != "error");
        let output = CapabilityOutput::error_with(
            message.clone(),
            serde_json::json!({ extra_key.clone(): true }),
        );
        let map = output.into_map();
        prop_assert_eq!(map.get("error").and_then(|v| v.as_str()), Some(message.as_str()));
        prop_assert!(map.contains_key(&extra_key));
    }

    #[test]
    fn test_input_string_params_survive_json(
        key in "[a-z_]{1,12}",
        value in "[a-zA-Z0-9 ./-]{1,40}",
    ) {
        prop_assume!(!value.trim().is_empty());
        let json = serde_json::json!({ key.clone(): value.clone() }).to_string();
        let input = CapabilityInput::from_json(&json).expect("object arguments parse");
        prop_assert_eq!(input.param_str(&key).expect("present"), value);
    }
}
