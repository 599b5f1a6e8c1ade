//! Account credentials and host configuration
//!
//! # Security
//!
//! The secret is stored using the `secrecy` crate which:
//! - Zeroizes memory on drop
//! - Prevents accidental logging via Debug impl
//! - Provides explicit access via `expose_secret()`

use secrecy::{ExposeSecret, SecretString};
use std::path::Path;
use tracing::debug;

use crate::error::{AuthError, AuthResult};
use crate::signer;

/// API credentials plus the host/group they belong to
pub struct Credentials {
    host: String,
    port: Option<u16>,
    group: String,
    api_key: String,
    secret: SecretString,
    name: Option<String>,
}

impl Credentials {
    /// Create new credentials
    ///
    /// Nothing is validated here; call [`Credentials::validate`] before connecting.
    pub fn new(
        host: impl Into<String>,
        group: impl Into<String>,
        api_key: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: None,
            group: group.into(),
            api_key: api_key.into(),
            secret: SecretString::from(secret.into()),
            name: None,
        }
    }

    /// Set an explicit port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set a display label
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Create credentials from environment variables
    ///
    /// Reads `ASCENDEX_HOST`, `ASCENDEX_GROUP`, `ASCENDEX_API_KEY` and
    /// `ASCENDEX_SECRET`, plus the optional `ASCENDEX_PORT` and `ASCENDEX_NAME`.
    pub fn from_env() -> AuthResult<Self> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| AuthError::EnvVarNotSet(name.to_string()))
        };

        let mut creds = Self::new(
            var("ASCENDEX_HOST")?,
            var("ASCENDEX_GROUP")?,
            var("ASCENDEX_API_KEY")?,
            var("ASCENDEX_SECRET")?,
        );

        if let Ok(port) = std::env::var("ASCENDEX_PORT") {
            creds.port = Some(parse_port(&port)?);
        }
        creds.name = std::env::var("ASCENDEX_NAME").ok();

        Ok(creds)
    }

    /// Read credentials from a `Key:value` file
    ///
    /// See [`Credentials::parse`] for the format.
    pub fn from_file(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| AuthError::File {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "Loaded credentials file");
        Self::parse(&contents)
    }

    /// Parse the line-oriented credentials format
    ///
    /// ```text
    /// Open:<api key>
    /// Secret:<secret>
    /// Group:<group>
    /// Name:<label>
    /// Host:<host>[:<port>]
    /// ```
    ///
    /// Unknown keys and blank lines are ignored. Missing fields are left empty
    /// and reported by [`Credentials::validate`].
    pub fn parse(contents: &str) -> AuthResult<Self> {
        let mut creds = Self::new("", "", "", "");

        for line in contents.lines() {
            let line = line.trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim() {
                "Open" => creds.api_key = value.to_string(),
                "Secret" => creds.secret = SecretString::from(value.to_string()),
                "Group" => creds.group = value.to_string(),
                "Name" => creds.name = Some(value.to_string()),
                "Host" => match value.split_once(':') {
                    Some((host, port)) => {
                        creds.host = host.to_string();
                        creds.port = Some(parse_port(port)?);
                    }
                    None => creds.host = value.to_string(),
                },
                _ => {}
            }
        }

        Ok(creds)
    }

    /// Check that every field needed to connect is present
    pub fn validate(&self) -> AuthResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(AuthError::MissingField("api_key"));
        }
        if self.secret.expose_secret().is_empty() {
            return Err(AuthError::MissingField("secret"));
        }
        if self.host.trim().is_empty() {
            return Err(AuthError::MissingField("host"));
        }
        if self.group.trim().is_empty() {
            return Err(AuthError::MissingField("group"));
        }
        Ok(())
    }

    /// Host name
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Explicit port, if any
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Account group
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Get the API key
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Display label
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Streaming endpoint: `wss://<host>[:<port>]/<group>/api/pro/v1/stream`
    pub fn endpoint_url(&self) -> String {
        let authority = match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        };
        format!("wss://{}/{}/api/pro/v1/stream", authority, self.group)
    }

    /// Sign `payload` with the account secret
    pub fn sign(&self, payload: &str) -> AuthResult<String> {
        signer::sign(self.secret.expose_secret().as_bytes(), payload)
    }
}

fn parse_port(raw: &str) -> AuthResult<u16> {
    raw.trim()
        .parse()
        .map_err(|_| AuthError::InvalidCredentials(format!("invalid port: {}", raw)))
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        Self {
            host: self.host.clone(),
            port: self.port,
            group: self.group.clone(),
            api_key: self.api_key.clone(),
            secret: SecretString::from(self.secret.expose_secret().to_string()),
            name: self.name.clone(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("group", &self.group)
            .field(
                "api_key",
                &format!("{}...", self.api_key.chars().take(8).collect::<String>()),
            )
            .field("secret", &"[REDACTED]")
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = Credentials::new("ascendex.com", "4", "test_api_key", "super_secret_value");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("super_secret_value"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_endpoint_url() {
        let creds = Credentials::new("ascendex.com", "4", "key", "secret");
        assert_eq!(creds.endpoint_url(), "wss://ascendex.com/4/api/pro/v1/stream");

        let creds = creds.with_port(8443);
        assert_eq!(creds.endpoint_url(), "wss://ascendex.com:8443/4/api/pro/v1/stream");
    }

    #[test]
    fn test_validate() {
        assert!(Credentials::new("h", "g", "k", "s").validate().is_ok());
        assert_eq!(
            Credentials::new("h", "g", "", "s").validate(),
            Err(AuthError::MissingField("api_key"))
        );
        assert_eq!(
            Credentials::new("h", "g", "k", "").validate(),
            Err(AuthError::MissingField("secret"))
        );
        assert_eq!(
            Credentials::new("", "g", "k", "s").validate(),
            Err(AuthError::MissingField("host"))
        );
        assert_eq!(
            Credentials::new("h", " ", "k", "s").validate(),
            Err(AuthError::MissingField("group"))
        );
    }

    #[test]
    fn test_parse_file_format() {
        let creds = Credentials::parse(
            "Open:my-key\nSecret:my-secret\nGroup:6\nName:main account\nHost:ascendex.com:443\nUnknown:ignored\n\n",
        )
        .unwrap();

        assert_eq!(creds.api_key(), "my-key");
        assert_eq!(creds.group(), "6");
        assert_eq!(creds.name(), Some("main account"));
        assert_eq!(creds.host(), "ascendex.com");
        assert_eq!(creds.port(), Some(443));
        assert!(creds.validate().is_ok());
        assert_eq!(creds.endpoint_url(), "wss://ascendex.com:443/6/api/pro/v1/stream");
    }

    #[test]
    fn test_parse_missing_keys_fails_validation() {
        let creds = Credentials::parse("Host:ascendex.com\nGroup:1\n").unwrap();
        assert_eq!(creds.port(), None);
        assert_eq!(creds.validate(), Err(AuthError::MissingField("api_key")));
    }

    #[test]
    fn test_parse_bad_port() {
        let result = Credentials::parse("Host:ascendex.com:notaport\n");
        assert!(matches!(result, Err(AuthError::InvalidCredentials(_))));
    }

    #[test]
    fn test_sign_uses_secret() {
        let creds = Credentials::new("h", "g", "k", "secret");
        let expected = signer::sign(b"secret", "1stream").unwrap();
        assert_eq!(creds.sign("1stream").unwrap(), expected);
        assert_eq!(creds.clone().sign("1stream").unwrap(), expected);
    }
}
