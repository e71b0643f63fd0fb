//! OAuth2 / OpenID Connect access gate for write routes.
//!
//! Requests without a bearer token are redirected to the provider's login
//! page; tokens are verified against the provider's JWKS.

mod oidc;

#[cfg(test)]
pub(crate) use oidc::test_support;
pub use oidc::{AuthError, OidcProvider, TokenResponse};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::config::OauthConfig;
use crate::errors::AppError;

/// How long a login redirect's `state` stays redeemable.
const STATE_TTL: Duration = Duration::from_secs(600);

/// Upper bound on outstanding states; the oldest is evicted beyond it.
const MAX_PENDING_STATES: usize = 1024;

/// Outstanding `state` values handed out with login redirects.
#[derive(Default)]
pub struct PendingStates {
    issued: Mutex<HashMap<String, Instant>>,
}

impl PendingStates {
    /// Issue a fresh random state.
    pub fn issue(&self) -> String {
        let state = uuid::Uuid::new_v4().to_string();
        let now = Instant::now();
        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        issued.retain(|_, at| now.duration_since(*at) < STATE_TTL);
        while issued.len() >= MAX_PENDING_STATES {
            let Some(oldest) = issued
                .iter()
                .min_by_key(|(_, at)| **at)
                .map(|(state, _)| state.clone())
            else {
                break;
            };
            issued.remove(&oldest);
        }
        issued.insert(state.clone(), now);
        state
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.issued.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Consume a state; true if it was issued and has not expired.
    pub fn redeem(&self, state: &str) -> bool {
        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        match issued.remove(state) {
            Some(at) => at.elapsed() < STATE_TTL,
            None => false,
        }
    }
}

/// Bearer gate shared by all write routes and the callback.
pub struct AccessGate {
    provider: Option<OidcProvider>,
    states: PendingStates,
}

impl AccessGate {
    /// A gate that lets every request through.
    pub fn disabled() -> Self {
        Self {
            provider: None,
            states: PendingStates::default(),
        }
    }

    pub fn new(provider: OidcProvider) -> Self {
        Self {
            provider: Some(provider),
            states: PendingStates::default(),
        }
    }

    /// Build the gate, running OIDC discovery when OAuth is enabled.
    pub async fn from_config(config: &OauthConfig) -> Result<Self, AuthError> {
        if !config.enabled {
            tracing::warn!("OAuth is disabled (CATALOG_OAUTH_ENABLE). Writes are not protected!");
            return Ok(Self::disabled());
        }
        Ok(Self::new(OidcProvider::discover(config).await?))
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// 302 to the provider's login page with a fresh state.
    fn login_redirect(&self, provider: &OidcProvider) -> Response {
        let state = self.states.issue();
        let url = match provider.authorization_url(&state) {
            Ok(url) => url,
            Err(e) => return AppError::Infrastructure(e.to_string()).into_response(),
        };
        match HeaderValue::from_str(url.as_str()) {
            Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
            Err(e) => AppError::Infrastructure(e.to_string()).into_response(),
        }
    }
}

/// Middleware guarding create, update and delete routes.
pub async fn require_bearer(gate: Arc<AccessGate>, request: Request, next: Next) -> Response {
    // No provider configured, allow all requests (dev mode)
    let Some(provider) = gate.provider.as_ref() else {
        return next.run(request).await;
    };

    let Some(value) = request.headers().get(header::AUTHORIZATION) else {
        tracing::debug!("No bearer token, redirecting to login");
        return gate.login_redirect(provider);
    };

    let Ok(value) = value.to_str() else {
        return AppError::BadRequest("Authorization header is not valid ASCII".into())
            .into_response();
    };
    let parts: Vec<&str> = value.split(' ').collect();
    let [_, token] = parts.as_slice() else {
        return AppError::BadRequest("Malformed Authorization header".into()).into_response();
    };
    let token = token.to_string();

    match provider.verify(&token).await {
        Ok(claims) => {
            tracing::debug!(sub = %claims["sub"], "Bearer token accepted");
            next.run(request).await
        }
        Err(e) => {
            tracing::info!(error = %e, "Bearer token rejected, redirecting to login");
            gate.login_redirect(provider)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    #[serde(rename = "OAuth2Token")]
    pub token: TokenResponse,
    #[serde(rename = "IDTokenClaims")]
    pub claims: serde_json::Value,
}

/// `GET /oauth2/callback`: redeem the authorization code and echo the tokens.
pub async fn oauth2_callback(
    State(gate): State<Arc<AccessGate>>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<CallbackResponse>, AppError> {
    let Some(provider) = gate.provider.as_ref() else {
        return Err(AppError::NotImplemented("OAuth2 callback disabled!".into()));
    };

    let state = params.state.unwrap_or_default();
    if !gate.states.redeem(&state) {
        return Err(AppError::BadRequest("state did not match".into()));
    }
    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("missing code".into()))?;

    let token = provider
        .exchange_code(&code)
        .await
        .map_err(|e| AppError::Infrastructure(format!("Failed to exchange token: {e}")))?;
    let id_token = token
        .id_token
        .as_deref()
        .ok_or_else(|| AppError::Infrastructure(AuthError::NoIdToken.to_string()))?;
    let claims = provider
        .verify(id_token)
        .await
        .map_err(|e| AppError::Infrastructure(format!("Failed to verify ID Token: {e}")))?;

    tracing::info!(sub = %claims["sub"], "OAuth2 login completed");
    Ok(Json(CallbackResponse { token, claims }))
}
