//! Bearer-token resolution for the spreadsheet backend.
//!
//! The consent flow that produces the token runs elsewhere; this only reads its result.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::BackendError;

pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

#[derive(Debug, Clone, Default)]
pub struct CredentialResolver {
    access_token: Option<String>,
    token_file: Option<PathBuf>,
}

#[derive(Deserialize)]
struct TokenFile {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

impl CredentialResolver {
    pub fn new(access_token: Option<String>, token_file: Option<PathBuf>) -> Self {
        Self {
            access_token,
            token_file,
        }
    }

    pub fn resolve(&self) -> Result<String, BackendError> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Configured token, then token file, then environment.
    pub fn resolve_with<F>(&self, env: F) -> Result<String, BackendError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = non_empty(self.access_token.as_deref()) {
            return Ok(token);
        }
        if let Some(path) = &self.token_file {
            return read_token_file(path);
        }
        if let Some(token) = non_empty(env(ACCESS_TOKEN_ENV).as_deref()) {
            return Ok(token);
        }
        Err(BackendError::Auth(format!(
            "No spreadsheet credential found (set sheets.access_token, sheets.token_file or {})",
            ACCESS_TOKEN_ENV
        )))
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn read_token_file(path: &Path) -> Result<String, BackendError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        BackendError::Auth(format!("Cannot read token file {}: {}", path.display(), e))
    })?;
    let parsed: TokenFile = serde_json::from_str(&content).map_err(|e| {
        BackendError::Auth(format!("Token file {} is not valid JSON: {}", path.display(), e))
    })?;
    non_empty(parsed.token.as_deref())
        .or_else(|| non_empty(parsed.access_token.as_deref()))
        .ok_or_else(|| {
            BackendError::Auth(format!(
                "Token file {} has no `token` or `access_token`",
                path.display()
            ))
        })
}
