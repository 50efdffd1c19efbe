//! FCM HTTP v1 client. Signs a service-account JWT for OAuth2, then posts a
//! multicast batch (up to `max_multicast_batch_size` tokens) per call.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::FcmConfig;
use crate::error::AppError;

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Serialize)]
struct ServiceAccountClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Per-token outcome after one multicast send. `Failed` carries one of
/// `domain::token::STALE_ON_ERROR_CODES`' vocabulary codes (or
/// `"message-rate-exceeded"`, or a passthrough of FCM's own status string)
/// so the push worker can hand it straight to `FcmToken::record_provider_error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FcmTokenDisposition {
    Delivered,
    Failed { code: String },
}

pub struct FcmSendOutcome {
    pub dispositions: Vec<(String, FcmTokenDisposition)>,
}

impl FcmSendOutcome {
    pub fn success_count(&self) -> usize {
        self.dispositions
            .iter()
            .filter(|(_, d)| matches!(d, FcmTokenDisposition::Delivered))
            .count()
    }

    pub fn all_failed(&self) -> bool {
        self.success_count() == 0
    }
}

pub struct FcmClient {
    http: reqwest::Client,
    config: FcmConfig,
}

impl FcmClient {
    pub fn new(config: FcmConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { http, config })
    }

    async fn bearer_token(&self) -> Result<String, AppError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let claims = ServiceAccountClaims {
            iss: self.config.service_account_email.clone(),
            scope: FCM_SCOPE.to_string(),
            aud: TOKEN_URI.to_string(),
            iat: now,
            exp: now + 3600,
        };

        let key = EncodingKey::from_rsa_pem(self.config.service_account_private_key.as_bytes())
            .map_err(AppError::TokenSigning)?;
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(AppError::TokenSigning)?;

        let response: TokenResponse = self
            .http
            .post(TOKEN_URI)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?
            .json()
            .await?;

        Ok(response.access_token)
    }

    /// Sends one notification to every token in `tokens`, batched under
    /// `max_multicast_batch_size`. FCM HTTP v1 has no native multicast
    /// endpoint, so each token is sent individually but rate-limited to the
    /// configured batch concurrency.
    pub async fn send_multicast(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
        data: &std::collections::HashMap<String, Value>,
    ) -> Result<FcmSendOutcome, AppError> {
        let access_token = self.bearer_token().await?;
        let url = format!(
            "https://fcm.googleapis.com/v1/projects/{}/messages:send",
            self.config.project_id
        );

        let batch_size = self.config.max_multicast_batch_size.max(1);
        let mut dispositions = Vec::with_capacity(tokens.len());

        for chunk in tokens.chunks(batch_size) {
            for token in chunk {
                let message = serde_json::json!({
                    "message": {
                        "token": token,
                        "notification": { "title": title, "body": body },
                        "data": data,
                    }
                });

                let response = self
                    .http
                    .post(&url)
                    .bearer_auth(&access_token)
                    .json(&message)
                    .send()
                    .await?;

                if response.status().is_success() {
                    dispositions.push((token.clone(), FcmTokenDisposition::Delivered));
                    continue;
                }

                let fcm_status = response
                    .json::<Value>()
                    .await
                    .ok()
                    .and_then(|v| v["error"]["status"].as_str().map(str::to_string))
                    .unwrap_or_else(|| "UNKNOWN".to_string());

                let code = match fcm_status.as_str() {
                    "UNREGISTERED" => "registration-token-not-registered".to_string(),
                    "INVALID_ARGUMENT" => "invalid-registration-token".to_string(),
                    "RESOURCE_EXHAUSTED" => "message-rate-exceeded".to_string(),
                    other => other.to_lowercase(),
                };
                dispositions.push((token.clone(), FcmTokenDisposition::Failed { code }));
            }
        }

        Ok(FcmSendOutcome { dispositions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_counts_only_delivered_as_success() {
        let outcome = FcmSendOutcome {
            dispositions: vec![
                ("t1".to_string(), FcmTokenDisposition::Delivered),
                (
                    "t2".to_string(),
                    FcmTokenDisposition::Failed { code: "registration-token-not-registered".to_string() },
                ),
            ],
        };
        assert_eq!(outcome.success_count(), 1);
        assert!(!outcome.all_failed());
    }

    #[test]
    fn outcome_all_failed_when_nothing_delivered() {
        let outcome = FcmSendOutcome {
            dispositions: vec![(
                "t1".to_string(),
                FcmTokenDisposition::Failed { code: "invalid-registration-token".to_string() },
            )],
        };
        assert!(outcome.all_failed());
    }
}
