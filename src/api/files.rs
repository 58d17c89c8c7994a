//! Serialization and deserialization structures for Google OAuth credential files.
//! - `client_secret.json`: OAuth 2.0 client credentials from Google Cloud Console
//! - `token.json`: the access and refresh tokens we receive from Google

use crate::api::OAUTH_SCOPES;
use crate::error::Res;
use crate::utils;
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::path::Path;

/// This redirect needs to be present in the OAuth credential file, or else OAuth will not work.
const REDIRECT: &str = "http://localhost";

/// Represents the structure of the `client_secret.json` file downloaded from Google Cloud Console.
///
/// This file contains OAuth 2.0 Desktop Application credentials. The standard format from Google
/// has an "installed" wrapper around the actual credentials.
///
/// Example:
/// ```json
/// {
///   "installed": {
///     "client_id": "YOUR_CLIENT_ID.apps.googleusercontent.com",
///     "client_secret": "YOUR_CLIENT_SECRET",
///     "redirect_uris": ["http://localhost"],
///     "auth_uri": "https://accounts.google.com/o/oauth2/auth",
///     "token_uri": "https://oauth2.googleapis.com/token"
///   }
/// }
/// ```
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct SecretFile {
    installed: InstalledCredentials,
}

impl SecretFile {
    pub(super) async fn load(path: &Path) -> Res<SecretFile> {
        utils::deserialize(path)
            .await
            .with_context(|| format!("Unable to read the client secret file {}", path.display()))
    }

    pub(super) fn client_id(&self) -> &str {
        &self.installed.client_id
    }

    pub(super) fn client_secret(&self) -> &str {
        &self.installed.client_secret
    }

    pub(super) fn auth_uri(&self) -> &str {
        &self.installed.auth_uri
    }

    pub(super) fn token_uri(&self) -> &str {
        &self.installed.token_uri
    }
}

/// The actual OAuth credentials nested within the `client_secret.json` file.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,
    /// For this application, should contain "http://localhost" (without a port number)
    redirect_uris: RedirectUris,
    auth_uri: String,
    token_uri: String,
}

#[derive(Default, Debug, Clone)]
struct RedirectUris(Vec<String>);

impl Serialize for RedirectUris {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RedirectUris {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let vec = Vec::<String>::deserialize(deserializer)?;
        if !vec.iter().any(|s| is_valid_redirect(s)) {
            return Err(D::Error::custom(format!(
                "At least one of the redirects needs to be {REDIRECT}, but this was not found. \
                When creating the redirect URI for your Google API Key, you must include \
                '{REDIRECT}'"
            )));
        }
        Ok(RedirectUris(vec))
    }
}

fn is_valid_redirect(s: &str) -> bool {
    s == REDIRECT || s == "http://127.0.0.1"
}

/// How we save the token information that we receive from Google OAuth.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct TokenFile {
    scopes: Vec<String>,
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl TokenFile {
    pub(super) fn new(
        scopes: Vec<String>,
        access_token: String,
        refresh_token: String,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            scopes,
            access_token,
            refresh_token,
            expires_at,
        }
    }

    pub(super) async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let token_file: Self = utils::deserialize(path.as_ref())
            .await
            .context("Unable to deserialize the token JSON file")?;
        token_file.validate_scopes()?;
        Ok(token_file)
    }

    /// Saves the token with permissions restricted to the current user.
    pub(super) async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let path = path.as_ref();
        utils::serialize(path, self).await?;
        utils::restrict_permissions(path)
    }

    fn validate_scopes(&self) -> Res<()> {
        let found_scopes: HashSet<&str> = self.scopes.iter().map(|s| s.as_str()).collect();
        for &required_scope in OAUTH_SCOPES {
            if !found_scopes.contains(required_scope) {
                bail!("OAuth scope '{required_scope}' is missing.");
            }
        }
        Ok(())
    }

    pub(super) fn access_token(&self) -> &str {
        &self.access_token
    }

    pub(super) fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// Check if the token is expired or will expire soon (within 5 minutes)
    pub(super) fn is_expired(&self) -> bool {
        let buffer = chrono::Duration::minutes(5);
        self.expires_at <= Utc::now() + buffer
    }

    pub(super) fn update(
        &mut self,
        access_token: String,
        expires_at: DateTime<Utc>,
        refresh_token: Option<String>,
    ) {
        self.access_token = access_token;
        self.expires_at = expires_at;
        if let Some(rt) = refresh_token {
            self.refresh_token = rt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SECRET: &str = r#"
{
    "installed": {
        "client_id": "YOUR_CLIENT_ID.apps.googleusercontent.com",
        "client_secret": "YOUR_CLIENT_SECRET",
        "redirect_uris": ["REDIRECT", "https://example.com:4040/whatever"],
        "auth_uri": "https://accounts.google.com/o/oauth2/auth",
        "token_uri": "https://oauth2.googleapis.com/token"
    }
}
"#;

    async fn load_secret(redirect: &str) -> Res<SecretFile> {
        let temp_dir = TempDir::new().unwrap();
        let p = temp_dir.path().join("file.json");
        utils::write(&p, SECRET.replace("REDIRECT", redirect))
            .await
            .unwrap();
        SecretFile::load(&p).await
    }

    #[tokio::test]
    async fn test_client_secret_good_redirect() {
        let secret = load_secret("http://localhost").await.unwrap();
        assert_eq!(secret.client_id(), "YOUR_CLIENT_ID.apps.googleusercontent.com");
        assert_eq!(secret.token_uri(), "https://oauth2.googleapis.com/token");
        assert!(load_secret("http://127.0.0.1").await.is_ok());
    }

    #[tokio::test]
    async fn test_client_secret_bad_redirect() {
        let err = load_secret("http://localhost:9900").await.unwrap_err();
        assert!(format!("{err:?}")
            .contains("At least one of the redirects needs to be http://localhost"));
    }

    #[tokio::test]
    async fn test_token_file_missing_scope() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("token.json");
        let token = TokenFile::new(
            vec![OAUTH_SCOPES[0].to_string()],
            "abc12".into(),
            "xyz89".into(),
            Utc::now(),
        );
        token.save(&path).await.unwrap();
        let err = TokenFile::load(&path).await.unwrap_err();
        assert!(err.to_string().contains(OAUTH_SCOPES[1]));
    }

    #[tokio::test]
    async fn test_token_file_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("token.json");
        let expires_at = Utc::now() + chrono::Duration::hours(1);
        let token = TokenFile::new(
            OAUTH_SCOPES.iter().map(|s| s.to_string()).collect(),
            "abc12".into(),
            "xyz89".into(),
            expires_at,
        );
        token.save(&path).await.unwrap();
        let loaded = TokenFile::load(&path).await.unwrap();
        assert_eq!(loaded, token);
        assert!(!loaded.is_expired());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_token_update_keeps_refresh_token_when_absent() {
        let mut token = TokenFile::new(vec![], "a".into(), "r".into(), Utc::now());
        token.update("b".into(), Utc::now(), None);
        assert_eq!(token.access_token(), "b");
        assert_eq!(token.refresh_token(), "r");
        assert!(token.is_expired());
        token.update("c".into(), Utc::now(), Some("r2".into()));
        assert_eq!(token.refresh_token(), "r2");
    }
}
