//! OAuth 2.0 for the Google Sheets and Drive APIs.
//!
//! `TokenProvider::initialize` runs the installed-application consent flow: it prints the Google
//! consent URL, serves the redirect on a local port with hyper, exchanges the authorization code
//! (with PKCE) and saves `token.json`. Every other command uses `TokenProvider::load`, which never
//! opens a browser and only refreshes the token through its refresh token.

use crate::api::files::{SecretFile, TokenFile};
use crate::api::OAUTH_SCOPES;
use crate::error::Res;
use anyhow::{bail, Context};
use chrono::Utc;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

type OAuthClient = BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// The outcome of a request to the local redirect server: `Ok(code)` or `Err(reason)`.
type Callback = std::result::Result<String, String>;

/// Holds the OAuth client credentials and the current token, and keeps `token.json` up to date
/// when the token is refreshed.
#[derive(Debug, Clone)]
pub(crate) struct TokenProvider {
    secret: SecretFile,
    token: TokenFile,
    token_path: PathBuf,
}

impl TokenProvider {
    /// Loads existing credentials and tokens. Never starts an interactive flow.
    pub(crate) async fn load(
        secret_path: impl AsRef<Path>,
        token_path: impl AsRef<Path>,
    ) -> Res<Self> {
        let secret = SecretFile::load(secret_path.as_ref()).await?;
        let token_path = token_path.as_ref().to_path_buf();
        let token = TokenFile::load(&token_path).await.with_context(|| {
            format!("Unable to load the OAuth token at {}", token_path.display())
        })?;
        Ok(Self {
            secret,
            token,
            token_path,
        })
    }

    /// Runs the consent flow and saves the resulting token to `token_path`.
    pub(crate) async fn initialize(
        secret_path: impl AsRef<Path>,
        token_path: impl AsRef<Path>,
    ) -> Res<Self> {
        let secret = SecretFile::load(secret_path.as_ref()).await?;
        let token_path = token_path.as_ref().to_path_buf();

        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .context("Unable to start the local OAuth callback server")?;
        let port = listener
            .local_addr()
            .context("Unable to read the OAuth callback server address")?
            .port();
        let redirect = format!("http://127.0.0.1:{port}");
        let client = oauth_client(&secret, Some(&redirect))?;

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(OAUTH_SCOPES.iter().map(|s| Scope::new(s.to_string())))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(pkce_challenge)
            .url();

        info!("Open this URL in your browser to authorize gsheetx:\n\n{auth_url}\n");
        info!("Waiting for the authorization callback on {redirect}");
        let code = receive_code(listener, csrf.secret()).await?;

        let response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&http_client()?)
            .await
            .context("Failed to exchange the authorization code for a token")?;

        let Some(refresh_token) = response.refresh_token() else {
            bail!("Google did not return a refresh token; revoke access for this app and retry");
        };
        let scopes = match response.scopes() {
            Some(scopes) => scopes.iter().map(|s| s.to_string()).collect(),
            None => OAUTH_SCOPES.iter().map(|s| s.to_string()).collect(),
        };
        let token = TokenFile::new(
            scopes,
            response.access_token().secret().clone(),
            refresh_token.secret().clone(),
            expires_at(response.expires_in()),
        );
        token.save(&token_path).await?;
        info!("Authorization successful, tokens saved to {}", token_path.display());

        Ok(Self {
            secret,
            token,
            token_path,
        })
    }

    /// The access token, refreshed first if it is expired or about to expire.
    pub(crate) async fn token_with_refresh(&mut self) -> Res<&str> {
        if self.token.is_expired() {
            self.refresh().await?;
        }
        Ok(self.token.access_token())
    }

    /// Exchanges the refresh token for a new access token and saves it.
    pub(crate) async fn refresh(&mut self) -> Res<()> {
        debug!("Refreshing the OAuth access token");
        let client = oauth_client(&self.secret, None)?;
        let response = client
            .exchange_refresh_token(&RefreshToken::new(self.token.refresh_token().to_string()))
            .request_async(&http_client()?)
            .await
            .context("Failed to refresh the OAuth token")?;
        self.token.update(
            response.access_token().secret().clone(),
            expires_at(response.expires_in()),
            response.refresh_token().map(|t| t.secret().clone()),
        );
        self.token.save(&self.token_path).await
    }
}

fn oauth_client(secret: &SecretFile, redirect: Option<&str>) -> Res<OAuthClient> {
    let client = BasicClient::new(ClientId::new(secret.client_id().to_string()))
        .set_client_secret(ClientSecret::new(secret.client_secret().to_string()))
        .set_auth_uri(AuthUrl::new(secret.auth_uri().to_string()).context("Invalid auth_uri")?)
        .set_token_uri(
            TokenUrl::new(secret.token_uri().to_string()).context("Invalid token_uri")?,
        );
    match redirect {
        Some(redirect) => Ok(client.set_redirect_uri(
            RedirectUrl::new(redirect.to_string()).context("Invalid redirect URI")?,
        )),
        None => Ok(client),
    }
}

fn http_client() -> Res<oauth2::reqwest::Client> {
    // Redirects must not be followed when talking to the token endpoint.
    oauth2::reqwest::ClientBuilder::new()
        .redirect(oauth2::reqwest::redirect::Policy::none())
        .build()
        .context("Unable to build the OAuth HTTP client")
}

fn expires_at(expires_in: Option<std::time::Duration>) -> chrono::DateTime<Utc> {
    let expires_in = expires_in
        .and_then(|d| chrono::Duration::from_std(d).ok())
        .unwrap_or_else(|| chrono::Duration::hours(1));
    Utc::now() + expires_in
}

/// Serves the OAuth redirect until a request carries either an authorization code or an error.
async fn receive_code(listener: TcpListener, expected_state: &str) -> Res<String> {
    let (tx, mut rx) = mpsc::channel::<Callback>(1);
    loop {
        let (stream, _) = listener
            .accept()
            .await
            .context("The OAuth callback server failed")?;
        let tx = tx.clone();
        let expected_state = expected_state.to_string();
        let service = service_fn(move |request: Request<Incoming>| {
            let tx = tx.clone();
            let outcome = parse_callback(request.uri().query(), &expected_state);
            async move {
                let body = match &outcome {
                    Some(Ok(_)) => "Authorization complete. You can close this window.",
                    Some(Err(_)) => "Authorization failed. See the terminal for details.",
                    None => "Waiting for authorization.",
                };
                if let Some(outcome) = outcome {
                    let _ = tx.send(outcome).await;
                }
                Ok::<_, Infallible>(Response::new(body.to_string()))
            }
        });
        if let Err(e) = http1::Builder::new()
            .keep_alive(false)
            .serve_connection(TokioIo::new(stream), service)
            .await
        {
            warn!("OAuth callback connection error: {e}");
        }
        if let Ok(outcome) = rx.try_recv() {
            return outcome.map_err(|reason| anyhow::anyhow!("OAuth authorization failed: {reason}"));
        }
    }
}

/// Interprets the query string of a redirect request. Returns `None` for requests that are not
/// part of the flow, such as a browser asking for `/favicon.ico`.
fn parse_callback(query: Option<&str>, expected_state: &str) -> Option<Callback> {
    let query = query?;
    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match &*key {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }
    if let Some(error) = error {
        return Some(Err(error));
    }
    let code = code?;
    if state.as_deref() != Some(expected_state) {
        return Some(Err("the state parameter did not match".to_string()));
    }
    Some(Ok(code))
}
