//! Backend endpoints and listing sizes.
//!
//! The Supabase project URL and anon key are public values; they identify
//! the project and are safe to ship. Secret credentials never live here.

use serde::{Deserialize, Serialize};

use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

/// Sentences fetched per tab page.
pub const SENTENCES_PER_PAGE: usize = 20;
/// Notes per listing page.
pub const NOTES_PER_PAGE: usize = 20;

pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
pub const SUPABASE_ANON_KEY_ENV: &str = "SUPABASE_ANON_KEY";

/// Where the hosted backend lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    url: String,
    anon_key: String,
}

impl BackendConfig {
    /// Validate and normalize a project URL and anon key.
    ///
    /// Accepts the bare project URL or one already ending in `/auth/v1` or
    /// `/rest/v1`.
    pub fn new(url: impl AsRef<str>, anon_key: impl AsRef<str>) -> Result<Self> {
        let url = url.as_ref().trim().trim_end_matches('/');
        if url.is_empty() {
            return Err(Error::Config("Supabase URL must not be empty".to_string()));
        }
        if !is_http_url(url) {
            return Err(Error::Config(
                "Supabase URL must include http:// or https://".to_string(),
            ));
        }
        let url = url
            .strip_suffix("/auth/v1")
            .or_else(|| url.strip_suffix("/rest/v1"))
            .unwrap_or(url);

        let anon_key = anon_key.as_ref().trim();
        if anon_key.is_empty() {
            return Err(Error::Config(
                "Supabase anon key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            url: url.to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    /// Build from optional values. Both absent means "no backend" (guest only);
    /// exactly one present is a configuration error.
    pub fn from_values(url: Option<String>, anon_key: Option<String>) -> Result<Option<Self>> {
        match (normalize_text_option(url), normalize_text_option(anon_key)) {
            (None, None) => Ok(None),
            (Some(url), Some(anon_key)) => Self::new(url, anon_key).map(Some),
            (Some(_), None) => Err(Error::Config(format!(
                "{SUPABASE_ANON_KEY_ENV} is required when {SUPABASE_URL_ENV} is set"
            ))),
            (None, Some(_)) => Err(Error::Config(format!(
                "{SUPABASE_URL_ENV} is required when {SUPABASE_ANON_KEY_ENV} is set"
            ))),
        }
    }

    /// Read `SUPABASE_URL` and `SUPABASE_ANON_KEY` from the environment.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_values(
            std::env::var(SUPABASE_URL_ENV).ok(),
            std::env::var(SUPABASE_ANON_KEY_ENV).ok(),
        )
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    #[must_use]
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.url)
    }

    #[must_use]
    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_service_urls() {
        let config = BackendConfig::new("https://demo.supabase.co/", " anon ").unwrap();
        assert_eq!(config.rest_url(), "https://demo.supabase.co/rest/v1");
        assert_eq!(config.auth_url(), "https://demo.supabase.co/auth/v1");
        assert_eq!(config.anon_key(), "anon");
    }

    #[test]
    fn strips_existing_service_path() {
        let config = BackendConfig::new("https://demo.supabase.co/auth/v1", "anon").unwrap();
        assert_eq!(config.url(), "https://demo.supabase.co");
    }

    #[test]
    fn rejects_non_http_urls_and_blank_keys() {
        assert!(BackendConfig::new("demo.supabase.co", "anon").is_err());
        assert!(BackendConfig::new("https://demo.supabase.co", "  ").is_err());
    }

    #[test]
    fn partial_values_are_an_error() {
        assert!(BackendConfig::from_values(None, None).unwrap().is_none());
        assert!(BackendConfig::from_values(Some("https://x.co".into()), None).is_err());
        assert!(BackendConfig::from_values(None, Some("key".into())).is_err());
        assert!(
            BackendConfig::from_values(Some("https://x.co".into()), Some("key".into()))
                .unwrap()
                .is_some()
        );
    }
}
