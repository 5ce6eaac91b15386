//! Authorization header strategies
//!
//! Pure with respect to protocol state: a strategy may call out to the
//! credential / token / signer collaborators, but it never touches the
//! socket or the registry. The same strategy produces the header set for
//! the connection handshake (empty payload) and for each start message
//! (the serialized subscription body).

use crate::config::ClientConfig;
use crate::endpoint::host_of;
use crate::error::{AuthError, Result};
use crate::traits::{Headers, SigningRequest};
use chrono::Utc;
use std::str::FromStr;

/// Supported authorization modes
///
/// The set is closed: dispatch is an exhaustive match, so an unknown mode
/// cannot reach the wire. Embedders configured by mode name go through
/// [`AuthMode::from_str`], which rejects unrecognized names before any
/// connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Static API key stamped with a request timestamp
    ApiKey { key: String },
    /// Managed-user-pool session token
    UserPool,
    /// OpenID token: federated-session cache first, authenticated-user
    /// lookup as fallback
    OpenId,
    /// Request signing via the external signer primitive
    Signed { service: String, region: String },
    /// Caller-supplied bearer token in the additional header set
    Bearer,
}

impl FromStr for AuthMode {
    type Err = AuthError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "API_KEY" => Ok(AuthMode::ApiKey { key: String::new() }),
            "USER_POOL" => Ok(AuthMode::UserPool),
            "OPENID_CONNECT" => Ok(AuthMode::OpenId),
            "IAM" => Ok(AuthMode::Signed {
                service: String::new(),
                region: String::new(),
            }),
            "BEARER" => Ok(AuthMode::Bearer),
            other => Err(AuthError::UnsupportedMode(other.to_string())),
        }
    }
}

/// Build the authorization header set for one protocol message
///
/// # Arguments
/// * `config` - client configuration carrying the mode and collaborators
/// * `payload` - the serialized message payload being authorized (`"{}"`
///   for the handshake, the subscription body for a start message)
pub async fn build_headers(config: &ClientConfig, payload: &str) -> Result<Headers> {
    let host = host_of(&config.endpoint)?;
    let mut headers = Headers::new();
    headers.insert("host".to_string(), host);

    match &config.auth_mode {
        AuthMode::ApiKey { key } => {
            headers.insert(
                "x-date".to_string(),
                Utc::now().format("%Y%m%dT%H%M%SZ").to_string(),
            );
            headers.insert("x-api-key".to_string(), key.clone());
        }
        AuthMode::UserPool => {
            let token = match &config.tokens {
                Some(provider) => provider.session_token().await,
                None => None,
            };
            let token = token.ok_or(AuthError::NoCredentials)?;
            headers.insert("Authorization".to_string(), token);
        }
        AuthMode::OpenId => {
            let token = match &config.tokens {
                Some(provider) => match provider.federated_token().await {
                    Some(token) => Some(token),
                    None => provider.user_token().await,
                },
                None => None,
            };
            let token = token.ok_or(AuthError::NoCredentials)?;
            headers.insert("Authorization".to_string(), token);
        }
        AuthMode::Signed { service, region } => {
            let credentials = match &config.credentials {
                Some(provider) => provider.credentials().await,
                None => None,
            };
            let credentials = credentials.ok_or(AuthError::NoCredentials)?;
            let signer = config
                .signer
                .as_ref()
                .ok_or(AuthError::NoCredentials)?;
            let signed = signer
                .sign(SigningRequest {
                    method: "POST",
                    url: config.endpoint.clone(),
                    body: payload.to_string(),
                    service: service.clone(),
                    region: region.clone(),
                    credentials,
                })
                .await?;
            headers.extend(signed);
        }
        AuthMode::Bearer => {
            let token = config
                .additional_headers
                .get("Authorization")
                .ok_or(AuthError::MissingToken)?;
            headers.insert("Authorization".to_string(), token.clone());
        }
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::traits::{
        Credentials, CredentialsProvider, RealtimeError, RequestSigner, TokenProvider,
    };
    use async_trait::async_trait;
    use std::sync::Arc;

    fn config_with_mode(mode: AuthMode) -> ClientConfig {
        ClientConfig::new("https://api.example.com/events".to_string(), mode)
    }

    struct FakeTokens {
        session: Option<String>,
        federated: Option<String>,
        user: Option<String>,
    }

    #[async_trait]
    impl TokenProvider for FakeTokens {
        async fn session_token(&self) -> Option<String> {
            self.session.clone()
        }
        async fn federated_token(&self) -> Option<String> {
            self.federated.clone()
        }
        async fn user_token(&self) -> Option<String> {
            self.user.clone()
        }
    }

    struct FakeCredentials(Option<Credentials>);

    #[async_trait]
    impl CredentialsProvider for FakeCredentials {
        async fn credentials(&self) -> Option<Credentials> {
            self.0.clone()
        }
    }

    struct FakeSigner;

    #[async_trait]
    impl RequestSigner for FakeSigner {
        async fn sign(&self, request: SigningRequest) -> Result<Headers> {
            let mut headers = Headers::new();
            headers.insert(
                "Authorization".to_string(),
                format!("SIGNED {} {}", request.service, request.region),
            );
            headers.insert("x-signed-body-length".to_string(), request.body.len().to_string());
            Ok(headers)
        }
    }

    #[tokio::test]
    async fn test_api_key_headers() {
        let config = config_with_mode(AuthMode::ApiKey {
            key: "key-123".to_string(),
        });
        let headers = build_headers(&config, "{}").await.unwrap();
        assert_eq!(headers.get("host").unwrap(), "api.example.com");
        assert_eq!(headers.get("x-api-key").unwrap(), "key-123");
        assert!(headers.get("x-date").unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_user_pool_requires_token() {
        let config = config_with_mode(AuthMode::UserPool);
        let err = build_headers(&config, "{}").await.unwrap_err();
        assert!(matches!(
            err,
            RealtimeError::Auth(AuthError::NoCredentials)
        ));
    }

    #[tokio::test]
    async fn test_open_id_prefers_federated_cache() {
        let mut config = config_with_mode(AuthMode::OpenId);
        config.tokens = Some(Arc::new(FakeTokens {
            session: None,
            federated: Some("federated-token".to_string()),
            user: Some("user-token".to_string()),
        }));
        let headers = build_headers(&config, "{}").await.unwrap();
        assert_eq!(headers.get("Authorization").unwrap(), "federated-token");
    }

    #[tokio::test]
    async fn test_open_id_falls_back_to_user_lookup() {
        let mut config = config_with_mode(AuthMode::OpenId);
        config.tokens = Some(Arc::new(FakeTokens {
            session: None,
            federated: None,
            user: Some("user-token".to_string()),
        }));
        let headers = build_headers(&config, "{}").await.unwrap();
        assert_eq!(headers.get("Authorization").unwrap(), "user-token");
    }

    #[tokio::test]
    async fn test_signed_mode_requires_credentials() {
        let mut config = config_with_mode(AuthMode::Signed {
            service: "events".to_string(),
            region: "eu-west-1".to_string(),
        });
        config.credentials = Some(Arc::new(FakeCredentials(None)));
        config.signer = Some(Arc::new(FakeSigner));
        let err = build_headers(&config, "{}").await.unwrap_err();
        assert!(matches!(
            err,
            RealtimeError::Auth(AuthError::NoCredentials)
        ));
    }

    #[tokio::test]
    async fn test_signed_mode_delegates_to_signer() {
        let mut config = config_with_mode(AuthMode::Signed {
            service: "events".to_string(),
            region: "eu-west-1".to_string(),
        });
        config.credentials = Some(Arc::new(FakeCredentials(Some(Credentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: None,
        }))));
        config.signer = Some(Arc::new(FakeSigner));
        let headers = build_headers(&config, r#"{"query":"{onCreate}"}"#).await.unwrap();
        assert_eq!(
            headers.get("Authorization").unwrap(),
            "SIGNED events eu-west-1"
        );
        assert_eq!(headers.get("host").unwrap(), "api.example.com");
    }

    #[tokio::test]
    async fn test_bearer_requires_caller_supplied_token() {
        let config = config_with_mode(AuthMode::Bearer);
        let err = build_headers(&config, "{}").await.unwrap_err();
        assert!(matches!(err, RealtimeError::Auth(AuthError::MissingToken)));

        let mut config = config_with_mode(AuthMode::Bearer);
        config
            .additional_headers
            .insert("Authorization".to_string(), "Bearer abc".to_string());
        let headers = build_headers(&config, "{}").await.unwrap();
        assert_eq!(headers.get("Authorization").unwrap(), "Bearer abc");
    }

    #[test]
    fn test_unknown_mode_name_is_rejected() {
        let err = AuthMode::from_str("MAGIC").unwrap_err();
        assert_eq!(err, AuthError::UnsupportedMode("MAGIC".to_string()));
        assert_eq!(AuthMode::from_str("USER_POOL").unwrap(), AuthMode::UserPool);
    }
}
