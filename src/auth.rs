use anyhow::{Context, Result};
use async_trait::async_trait;
use google_gmail1::oauth2;
use google_gmail1::oauth2::authenticator_delegate::InstalledFlowDelegate;
use google_gmail1::oauth2::storage::{TokenInfo, TokenStorage};
use google_gmail1::oauth2::{
    ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod,
    read_application_secret,
};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use tracing::{info, warn};

const APP_NAME: &str = "gtriage";
const TOKEN_KEY: &str = "gmail_token";

/// Reading messages and changing their labels.
pub const SCOPES: &[&str] = &["https://www.googleapis.com/auth/gmail.modify"];

/// OAuth types come from the Gmail crate's own oauth2 re-export so the
/// authenticator is the one its hub accepts.
pub type GmailAuthenticator = oauth2::authenticator::DefaultAuthenticator;

#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenData {
    tokens: Vec<TokenInfo>,
}

/// Keeps the OAuth token in the OS keyring.
pub struct RingStorage;

#[async_trait]
impl TokenStorage for RingStorage {
    async fn set(&self, _scopes: &[&str], token: TokenInfo) -> Result<()> {
        let entry = entry()?;

        let mut data = self.get_all().await.unwrap_or_default();
        data.tokens.clear();
        data.tokens.push(token);

        let serialized = serde_json::to_string(&data).context("Failed to serialize tokens")?;

        entry
            .set_password(&serialized)
            .map_err(|e| anyhow::anyhow!("Keyring error: {}", e))?;

        Ok(())
    }

    async fn get(&self, _scopes: &[&str]) -> Option<TokenInfo> {
        self.get_all()
            .await
            .ok()
            .and_then(|data| data.tokens.first().cloned())
    }
}

impl RingStorage {
    async fn get_all(&self) -> Result<TokenData> {
        let entry = entry()?;

        match entry.get_password() {
            Ok(serialized) => {
                serde_json::from_str(&serialized).context("Failed to deserialize tokens")
            }
            Err(keyring::Error::NoEntry) => Ok(TokenData::default()),
            Err(e) => Err(anyhow::anyhow!("Keyring error: {}", e)),
        }
    }

    pub async fn clear_token(&self) -> Result<()> {
        match entry()?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow::anyhow!("Keyring error: {}", e)),
        }
    }
}

fn entry() -> Result<Entry> {
    Entry::new(APP_NAME, TOKEN_KEY).map_err(|e| anyhow::anyhow!("Keyring error: {}", e))
}

/// Opens the consent page in the user's browser, printing the URL as well in
/// case no browser is available.
pub struct BrowserDelegate;

impl InstalledFlowDelegate for BrowserDelegate {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        need_code: bool,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<String, String>> + Send + 'a>> {
        Box::pin(present_user_url(url, need_code))
    }
}

async fn present_user_url(url: &str, need_code: bool) -> std::result::Result<String, String> {
    info!("Authorize gtriage by visiting: {}", url);
    if let Err(e) = open::that(url) {
        warn!("Could not open a browser: {}", e);
    }
    if !need_code {
        return Ok(String::new());
    }

    let mut code = String::new();
    std::io::stdin()
        .read_line(&mut code)
        .map_err(|e| format!("Failed to read authorization code: {}", e))?;
    Ok(code.trim().to_string())
}

pub struct Authenticator;

impl Authenticator {
    pub async fn load_secret<P: AsRef<Path>>(path: P) -> Result<ApplicationSecret> {
        read_application_secret(path)
            .await
            .context("Failed to read application secret")
    }

    pub async fn authenticate(secret: ApplicationSecret) -> Result<GmailAuthenticator> {
        let auth =
            InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPRedirect)
                .with_storage(Box::new(RingStorage))
                .flow_delegate(Box::new(BrowserDelegate))
                .build()
                .await
                .context("Failed to build authenticator")?;

        Ok(auth)
    }
}
