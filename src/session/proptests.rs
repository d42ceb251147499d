//! Property-based tests for the session lifecycle
//!
//! Random sequences of loads (some of which fail) must keep:
//! - at most one live engine
//! - the active key equal to the last successful load, or nothing after a failure
//! - engine creation skipped when the requested key is already active
//! - prompts deterministic for any persona

use super::testing::FakeLauncher;
use super::{ignore_progress, SessionConfig, SessionManager};
use crate::engine::ModelKey;
use crate::prompt::{build_system_prompt, PersonaConfig};
use proptest::prelude::*;
use std::sync::Arc;

const FAILING: &str = "broken-model";

fn arb_model_id() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("Qwen2.5-1.5B-Instruct-q4f16_1-MLC"),
        Just("Llama-3.2-1B-Instruct-q4f16_1-MLC"),
        Just("custom-model"),
        Just(FAILING),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_load_sequence_keeps_session_invariant(
        ids in proptest::collection::vec(arb_model_id(), 1..12),
    ) {
        let launcher = Arc::new(FakeLauncher::new().with_failing_key(FAILING));
        let manager = SessionManager::new(launcher.clone(), SessionConfig::default());

        runtime().block_on(async {
            let mut expected_active: Option<ModelKey> = None;
            let mut expected_launches = 0usize;

            for id in ids {
                let key = ModelKey::new(id).unwrap();
                if expected_active.as_ref() != Some(&key) {
                    expected_launches += 1;
                }

                let result = manager.ensure_model_loaded(&key, &ignore_progress).await;
                let session = manager.session().await;

                prop_assert_eq!(session.is_loaded(), session.active_model_key().is_some());
                prop_assert!(launcher.live_engines() <= 1);

                if id == FAILING {
                    prop_assert!(result.is_err());
                    prop_assert!(!session.is_loaded());
                    prop_assert_eq!(launcher.live_engines(), 0);
                    expected_active = None;
                } else {
                    prop_assert!(result.is_ok());
                    prop_assert_eq!(session.active_model_key(), Some(&key));
                    prop_assert_eq!(launcher.live_engines(), 1);
                    expected_active = Some(key);
                }

                prop_assert_eq!(launcher.launch_count(), expected_launches);
            }
            Ok(())
        })?;
    }

    #[test]
    fn prop_system_prompt_deterministic_and_verbatim(
        name in "\\PC{0,24}",
        data in "\\PC{0,200}",
    ) {
        let persona = PersonaConfig::new(name.clone(), data.clone());
        let prompt = build_system_prompt(&persona);

        prop_assert_eq!(&prompt, &build_system_prompt(&persona));
        prop_assert!(prompt.contains(&name));
        prop_assert!(prompt.contains(&data));
    }
}
