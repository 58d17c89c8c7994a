//! Shared test utilities for creating test environments.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::api::{TestState, TestStore, TEST_SPREADSHEET_ID};
use crate::model::Grid;
use crate::Config;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Test environment with a gsheetx home directory and the default in-memory spreadsheet named
/// `Budget` holding `Tmpl` (empty, structure "template"), `Jan` and `Feb`. Stores opened with
/// `Mode::Test` for this environment's config see the same spreadsheet.
/// Holds TempDir to keep the directory alive for the duration of the test.
pub struct TestEnv {
    _temp_dir: TempDir,
    config: Config,
    state: Arc<Mutex<TestState>>,
    spreadsheet_id: String,
}

impl TestEnv {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("gsheetx");
        let secret_path = temp_dir.path().join("client_secret.json");

        // Create minimal client_secret.json
        let secret_content = r#"{
            "installed": {
                "client_id": "test-client-id",
                "client_secret": "test-secret",
                "redirect_uris": ["http://localhost"],
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token"
            }
        }"#;
        std::fs::write(&secret_path, secret_content).unwrap();
        let config = Config::create(&root, &secret_path).await.unwrap();

        let state = TestStore::shared(&config.root().to_string_lossy())
            .unwrap()
            .state();

        Self {
            _temp_dir: temp_dir,
            config,
            state,
            spreadsheet_id: TEST_SPREADSHEET_ID.to_string(),
        }
    }

    /// Returns a clone of the Config.
    pub fn config(&self) -> Config {
        self.config.clone()
    }

    /// The URL of the seeded spreadsheet.
    pub fn url(&self) -> String {
        format!(
            "https://docs.google.com/spreadsheets/d/{}/edit",
            self.spreadsheet_id
        )
    }

    pub fn state(&self) -> Arc<Mutex<TestState>> {
        self.state.clone()
    }

    /// The worksheet titles of the seeded spreadsheet, in order.
    pub fn titles(&self) -> Vec<String> {
        self.state.lock().unwrap().titles(&self.spreadsheet_id)
    }

    pub fn grid(&self, title: &str) -> Grid {
        let state = self.state.lock().unwrap();
        state
            .worksheet(&self.spreadsheet_id, title)
            .unwrap()
            .grid
            .clone()
    }

    pub fn structure(&self, title: &str) -> String {
        let state = self.state.lock().unwrap();
        state
            .worksheet(&self.spreadsheet_id, title)
            .unwrap()
            .structure
            .clone()
    }
}
