use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the home directory and its subdirectories, copies `secret_file` into its default
/// location and writes an initial `config.json`.
///
/// # Arguments
/// - `home` - The directory that will be the home directory, e.g. `$HOME/.gsheetx`
/// - `secret_file` - The downloaded OAuth 2.0 client credentials JSON needed to start the Google
///   OAuth workflow. It is copied, the original is left in place.
pub async fn init(home: &Path, secret_file: &Path) -> Result<Out<()>> {
    if !secret_file.is_file() {
        return Err(crate::Error::invalid_argument(format!(
            "The client secret file does not exist '{}'",
            secret_file.display()
        )));
    }
    let config = Config::create(home, secret_file)
        .await
        .context("Unable to create the home directory and configs")
        .pub_result(ErrorType::Config)?;
    Ok(format!(
        "Successfully created the gsheetx home directory at '{}', now run 'gsheetx auth'",
        config.root().display()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init() {
        let dir = TempDir::new().unwrap();
        let secret = dir.path().join("secret.json");
        std::fs::write(&secret, "{}").unwrap();
        let home = dir.path().join("home");

        let out = init(&home, &secret).await.unwrap();
        assert!(out.message().contains("gsheetx auth"));
        assert!(Config::load(&home).await.is_ok());

        let err = init(&home, &dir.path().join("missing.json"))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidArgument);
    }
}
