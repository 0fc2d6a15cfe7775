//! Secret handling utilities.
//!
//! Re-exports secrecy types and provides helpers for keeping the database
//! URL out of logs.

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

/// Database URL with the password replaced, safe to log.
pub fn redacted_database_url(url: &SecretString) -> String {
    let raw = url.expose_secret();
    let Some((scheme, rest)) = raw.split_once("://") else {
        return "<redacted>".to_string();
    };
    match rest.rsplit_once('@') {
        Some((credentials, host)) => {
            let user = credentials.split(':').next().unwrap_or_default();
            format!("{scheme}://{user}:***@{host}")
        }
        None => raw.to_string(),
    }
}
