//! Authentication command handlers for OAuth flow.
//!
//! This module implements the CLI commands for:
//! - `gsheetx auth` - Initial OAuth consent flow
//! - `gsheetx auth --verify` - Verify and refresh authentication

use crate::api::TokenProvider;
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;

/// Handles the `gsheetx auth` command: runs the OAuth consent flow.
///
/// This is the only command that opens a browser. It checks for the client secret, opens the
/// consent page, receives the code on a local callback and saves the tokens to `token.json`.
pub async fn auth(config: &Config) -> Result<Out<()>> {
    let _ = TokenProvider::initialize(config.client_secret_path(), config.token_path())
        .await
        .pub_result(ErrorType::Auth)?;
    Ok(format!(
        "Authorization successful, tokens saved to '{}'",
        config.token_path().display()
    )
    .into())
}

/// Handles the `gsheetx auth --verify` command: verifies and refreshes the saved tokens.
///
/// This never opens a browser. If the token is missing, invalid, or has the wrong scopes it fails
/// with a message telling the user to run `gsheetx auth`.
pub async fn auth_verify(config: &Config) -> Result<Out<()>> {
    let mut token_provider = TokenProvider::load(config.client_secret_path(), config.token_path())
        .await
        .context(
            "Unable to use the existing tokens found in the token JSON file. \n\n\
            You should run 'gsheetx auth' (without the --verify flag).",
        )
        .pub_result(ErrorType::Auth)?;
    token_provider
        .refresh()
        .await
        .context("Unable to refresh the token")
        .pub_result(ErrorType::Auth)?;
    Ok("Your OAuth token is valid!".into())
}
