// src/credentials.rs
//
// Credential resolution for provider namespaces, environment-only:
// <NAMESPACE>_ACCESS_KEY/SECRET_KEY first, then the standard AWS variables.
// `.env` files are loaded once at startup via dotenvy (see main.rs), so an
// exported environment is all a deployment needs to supply.
//
// The resulting handle is opaque: the engine threads it into the concrete
// executor and never inspects or logs its contents.

use std::collections::HashMap;
use std::fmt;

use crate::error::{BenchError, Result};

/// Opaque credential handle. `Debug` is redacted so the secret can never
/// leak through logging or error formatting.
#[derive(Clone)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
    session_token: Option<String>,
}

impl Credentials {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Credentials {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token,
        }
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Resolves credentials from an environment snapshot. Tests inject their own
/// variable map; production uses `from_env` after dotenvy has run.
pub struct CredentialResolver {
    env: HashMap<String, String>,
}

impl CredentialResolver {
    pub fn from_env() -> Self {
        CredentialResolver {
            env: std::env::vars().collect(),
        }
    }

    pub fn with_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        CredentialResolver {
            env: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Resolve credentials for a provider namespace.
    ///
    /// Order: `<NS>_ACCESS_KEY`/`<NS>_SECRET_KEY` (also the `_ACCESS_KEY_ID`
    /// spellings), then `AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY`.
    /// Missing credentials are a `ConfigError` naming the expected variables.
    pub fn resolve(&self, namespace: &str) -> Result<Credentials> {
        let prefix = env_prefix(namespace);
        if let Some(creds) = self.lookup(&prefix) {
            return Ok(creds);
        }
        if let Some(creds) = self.lookup("AWS") {
            return Ok(creds);
        }
        Err(BenchError::config(format!(
            "missing credentials for namespace '{}': set {}_ACCESS_KEY and {}_SECRET_KEY, \
             or AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY",
            namespace, prefix, prefix
        )))
    }

    fn lookup(&self, prefix: &str) -> Option<Credentials> {
        let get = |suffix: &str| self.env.get(&format!("{}_{}", prefix, suffix)).cloned();
        let access = get("ACCESS_KEY").or_else(|| get("ACCESS_KEY_ID"))?;
        let secret = get("SECRET_KEY").or_else(|| get("SECRET_ACCESS_KEY"))?;
        Some(Credentials::new(access, secret, get("SESSION_TOKEN")))
    }
}

/// Namespace -> env-var prefix: uppercased, non-alphanumerics become '_'
/// ("ic-eu" -> "IC_EU").
fn env_prefix(namespace: &str) -> String {
    namespace
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_env_wins_over_aws() {
        let resolver = CredentialResolver::with_vars([
            ("IC_EU_ACCESS_KEY", "ns-ak"),
            ("IC_EU_SECRET_KEY", "ns-sk"),
            ("AWS_ACCESS_KEY_ID", "aws-ak"),
            ("AWS_SECRET_ACCESS_KEY", "aws-sk"),
        ]);
        let creds = resolver.resolve("ic-eu").unwrap();
        assert_eq!(creds.access_key(), "ns-ak");
        assert_eq!(creds.secret_key(), "ns-sk");
        assert!(creds.session_token().is_none());
    }

    #[test]
    fn test_aws_fallback() {
        let resolver = CredentialResolver::with_vars([
            ("AWS_ACCESS_KEY_ID", "aws-ak"),
            ("AWS_SECRET_ACCESS_KEY", "aws-sk"),
            ("AWS_SESSION_TOKEN", "aws-st"),
        ]);
        let creds = resolver.resolve("ic-eu").unwrap();
        assert_eq!(creds.access_key(), "aws-ak");
        assert_eq!(creds.session_token(), Some("aws-st"));
    }

    #[test]
    fn test_alternate_spellings() {
        let resolver = CredentialResolver::with_vars([
            ("IC_ACCESS_KEY_ID", "ak"),
            ("IC_SECRET_ACCESS_KEY", "sk"),
        ]);
        let creds = resolver.resolve("ic").unwrap();
        assert_eq!(creds.access_key(), "ak");
    }

    #[test]
    fn test_missing_credentials_is_config_error() {
        let resolver = CredentialResolver::with_vars::<_, String, String>([]);
        let err = resolver.resolve("ic-eu").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("IC_EU_ACCESS_KEY"), "got: {}", msg);
    }

    #[test]
    fn test_debug_is_redacted() {
        let creds = Credentials::new("AKIAXXXX", "supersecret", Some("tok".into()));
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("AKIAXXXX"));
        assert!(!debug.contains("supersecret"));
        assert!(!debug.contains("tok"));
    }
}
