use delta_hedge_core::{DeribitConfig, GatewayError};
use governor::{clock::DefaultClock, state::InMemoryState, Quota, RateLimiter};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::models::AuthResult;

pub(crate) const TOO_MANY_REQUESTS: i64 = 10028;
pub(crate) const NOT_OPEN_ORDER: i64 = 11044;
const INVALID_CREDENTIALS: i64 = 13004;
const UNAUTHORIZED: i64 = 13009;
const INVALID_TOKEN: i64 = 13010;

/// Refresh the access token this long before it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

type DirectRateLimiter = RateLimiter<governor::state::direct::NotKeyed, InMemoryState, DefaultClock>;

#[derive(Clone)]
struct Credentials {
    client_id: String,
    client_secret: String,
}

struct AccessToken {
    token: String,
    expires_at: Instant,
}

/// JSON-RPC over HTTP client for the Deribit v2 API.
pub struct DeribitClient {
    http_client: Client,
    base_url: String,
    credentials: Option<Credentials>,
    token: Mutex<Option<AccessToken>>,
    rate_limiter: Arc<DirectRateLimiter>,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl DeribitClient {
    /// Builds a client from configuration. Credentials are optional; without
    /// them only public methods succeed.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be constructed
    pub fn new(config: &DeribitConfig) -> Result<Self, GatewayError> {
        let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(rps)));

        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let credentials = match (&config.client_id, &config.client_secret) {
            (Some(id), Some(secret)) => Some(Credentials {
                client_id: id.clone(),
                client_secret: secret.clone(),
            }),
            _ => None,
        };

        Ok(Self {
            http_client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            credentials,
            token: Mutex::new(None),
            rate_limiter,
        })
    }

    #[must_use]
    pub const fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Calls a `public/<method>` endpoint.
    ///
    /// # Errors
    /// Returns the mapped exchange or transport error
    pub async fn public<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        self.call(&format!("public/{method}"), params, None).await
    }

    /// Calls a `private/<method>` endpoint, authenticating first if needed.
    /// An expired token is refreshed once before the error is surfaced.
    ///
    /// # Errors
    /// Returns the mapped exchange or transport error
    pub async fn private<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let path = format!("private/{method}");
        let token = self.access_token().await?;

        match self.call(&path, params, Some(&token)).await {
            Err(GatewayError::Auth(reason)) => {
                tracing::warn!(method, %reason, "Access token rejected, re-authenticating");
                self.token.lock().await.take();
                let token = self.access_token().await?;
                self.call(&path, params, Some(&token)).await
            }
            other => other,
        }
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        let credentials = self.credentials.clone().ok_or_else(|| {
            GatewayError::Auth("client_id and client_secret are required".to_string())
        })?;

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_EXPIRY_MARGIN < token.expires_at {
                return Ok(token.token.clone());
            }
        }

        let auth: AuthResult = self
            .public(
                "auth",
                &[
                    ("grant_type", "client_credentials".to_string()),
                    ("client_id", credentials.client_id),
                    ("client_secret", credentials.client_secret),
                ],
            )
            .await?;

        tracing::debug!(expires_in = auth.expires_in, "Authenticated with Deribit");
        let token = auth.access_token.clone();
        *cached = Some(AccessToken {
            token: auth.access_token,
            expires_at: Instant::now() + Duration::from_secs(auth.expires_in),
        });
        Ok(token)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        token: Option<&str>,
    ) -> Result<T, GatewayError> {
        self.rate_limiter.until_ready().await;
        let url = format!("{}/{}", self.base_url, path);

        let mut request = self.http_client.get(&url).query(params);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        match decode_envelope(path, &body) {
            Err(GatewayError::Decode(_)) if !status.is_success() => {
                Err(GatewayError::Network(format!("{path}: HTTP {status}")))
            }
            other => other,
        }
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout(e.to_string())
    } else {
        GatewayError::Network(e.to_string())
    }
}

/// Splits a JSON-RPC response into its result or a mapped error.
pub(crate) fn decode_envelope<T: DeserializeOwned>(
    method: &str,
    body: &str,
) -> Result<T, GatewayError> {
    let envelope: RpcEnvelope<T> = serde_json::from_str(body)
        .map_err(|e| GatewayError::Decode(format!("{method}: {e}")))?;

    if let Some(error) = envelope.error {
        return Err(map_rpc_error(error));
    }

    envelope
        .result
        .ok_or_else(|| GatewayError::missing(format!("{method}: result")))
}

fn map_rpc_error(error: RpcError) -> GatewayError {
    match error.code {
        TOO_MANY_REQUESTS => GatewayError::RateLimited {
            retry_after_secs: 1,
        },
        INVALID_CREDENTIALS | UNAUTHORIZED | INVALID_TOKEN => GatewayError::Auth(error.message),
        code => GatewayError::api(code, error.message),
    }
}
