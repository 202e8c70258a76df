//! Test utilities for integration tests
use std::path::PathBuf;
use std::sync::Arc;

use mailroom::ai::tools;
use mailroom::core::AppConfig;
use mailroom::openai::BoxedToolCall;
use mailroom::store::InMemoryStore;

/// Path of the sample mailbox shared by the integration tests.
pub fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("mailbox.json")
}

/// A fresh store seeded from the sample mailbox. Each call gets its own
/// copy so tests can run in parallel.
pub fn test_store() -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::from_path(fixture_path()).expect("Failed to load mailbox fixture"))
}

/// Configuration with fixed values instead of the process environment.
pub fn test_config() -> AppConfig {
    AppConfig {
        store_path: fixture_path().display().to_string(),
        tz_offset_hours: 9,
        confirm_before_send: false,
        call_timeout: None,
    }
}

/// Every tool bound to `store`.
pub fn test_tools(store: Arc<InMemoryStore>, config: &AppConfig) -> Vec<BoxedToolCall> {
    tools::all(store, config)
}

/// Call the tool published as `name`.
pub async fn call(tools: &[BoxedToolCall], name: &str, args: &str) -> String {
    let tool = tools
        .iter()
        .find(|t| t.function_name() == name)
        .unwrap_or_else(|| panic!("no tool named {name}"));
    tool.call(args).await.expect("Tool call failed")
}
