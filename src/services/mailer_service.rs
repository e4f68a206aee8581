//! Servicio de envío de correo vía Gmail
//!
//! Maneja las credenciales OAuth2 de Gmail (refresh de access token con el
//! mismo margen de 5 minutos que Fleetmatics) y envía mensajes por la API
//! REST de Gmail. Sin credenciales configuradas el resultado es un estado
//! explícito `Disabled`: nunca se simula un envío exitoso.

use anyhow::{anyhow, Result};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::EnvironmentConfig;

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GMAIL_SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

/// Margen antes de la expiración real del access token
const TOKEN_EXPIRY_BUFFER_MINUTES: i64 = 5;

/// Credenciales OAuth2 de Gmail
#[derive(Debug, Clone)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub sender: String,
}

/// Resultado de un intento de envío
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MailOutcome {
    /// El mensaje fue aceptado por Gmail
    Sent { message_id: String },
    /// La integración no está configurada - no se envió nada
    Disabled { reason: String },
}

#[derive(Debug, Clone)]
struct CachedAccessToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedAccessToken {
    fn is_expiring(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now + Duration::minutes(TOKEN_EXPIRY_BUFFER_MINUTES)
    }
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct GmailSendResponse {
    id: String,
}

/// Servicio de correo. Las credenciales son opcionales: sin ellas el
/// servicio queda deshabilitado de forma explícita.
pub struct MailerService {
    credentials: Option<GmailCredentials>,
    client: reqwest::Client,
    access_token: RwLock<Option<CachedAccessToken>>,
}

impl MailerService {
    pub fn new(credentials: Option<GmailCredentials>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            credentials,
            client,
            access_token: RwLock::new(None),
        }
    }

    /// Construir desde variables de entorno; faltando cualquiera de las
    /// credenciales, el mailer queda deshabilitado
    pub fn from_environment(config: &EnvironmentConfig) -> Self {
        let credentials = match (
            config.gmail_client_id.clone(),
            config.gmail_client_secret.clone(),
            config.gmail_refresh_token.clone(),
            config.gmail_sender.clone(),
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token), Some(sender)) => {
                Some(GmailCredentials {
                    client_id,
                    client_secret,
                    refresh_token,
                    sender,
                })
            }
            _ => None,
        };

        if credentials.is_none() {
            log::warn!("⚠️ Credenciales Gmail incompletas - envío de correo deshabilitado");
        }

        Self::new(credentials)
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    /// Enviar un correo de texto plano. Sin credenciales devuelve
    /// `MailOutcome::Disabled`; un fallo real de envío es un error.
    pub async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<MailOutcome> {
        let credentials = match &self.credentials {
            Some(credentials) => credentials,
            None => {
                return Ok(MailOutcome::Disabled {
                    reason: "Gmail credentials not configured".to_string(),
                });
            }
        };

        let access_token = self.ensure_access_token(credentials).await?;
        let raw = build_raw_message(&credentials.sender, to, subject, body);

        log::info!("📧 Enviando correo a {} ({})", to, subject);

        let response = self
            .client
            .post(GMAIL_SEND_URL)
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(anyhow!("Gmail API error {}: {}", status, response_text));
        }

        let sent: GmailSendResponse = serde_json::from_str(&response_text)
            .map_err(|e| anyhow!("Error parsing Gmail response: {}", e))?;

        log::info!("✅ Correo enviado, message id {}", sent.id);
        Ok(MailOutcome::Sent { message_id: sent.id })
    }

    /// Access token vigente, refrescando contra Google si hace falta
    async fn ensure_access_token(&self, credentials: &GmailCredentials) -> Result<String> {
        let now = Utc::now();

        if let Some(cached) = self.access_token.read().await.clone() {
            if !cached.is_expiring(now) {
                return Ok(cached.token);
            }
        }

        log::info!("🔄 Refrescando access token de Gmail");

        let response = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("refresh_token", credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(anyhow!("Google token endpoint error {}: {}", status, response_text));
        }

        let tokens: GoogleTokenResponse = serde_json::from_str(&response_text)
            .map_err(|e| anyhow!("Error parsing Google token response: {}", e))?;

        let cached = CachedAccessToken {
            token: tokens.access_token.clone(),
            expires_at: now + Duration::seconds(tokens.expires_in),
        };
        *self.access_token.write().await = Some(cached);

        Ok(tokens.access_token)
    }
}

/// Construir el mensaje RFC 2822 y codificarlo en base64url como exige la
/// API de Gmail
fn build_raw_message(from: &str, to: &str, subject: &str, body: &str) -> String {
    let message = format!(
        "From: {}\r\nTo: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}",
        from, to, subject, body
    );
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(message.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_raw_message_roundtrip() {
        let raw = build_raw_message("ops@pool.example", "client@example.com", "Invoice", "Hola");
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(raw.as_bytes())
            .unwrap();
        let message = String::from_utf8(decoded).unwrap();
        assert!(message.starts_with("From: ops@pool.example\r\n"));
        assert!(message.contains("Subject: Invoice"));
        assert!(message.ends_with("\r\n\r\nHola"));
    }

    #[tokio::test]
    async fn test_send_without_credentials_is_disabled() {
        let mailer = MailerService::new(None);
        assert!(!mailer.is_enabled());

        let outcome = mailer
            .send_email("client@example.com", "Estimate", "body")
            .await
            .unwrap();

        match outcome {
            MailOutcome::Disabled { reason } => assert!(reason.contains("not configured")),
            MailOutcome::Sent { .. } => panic!("mailer sin credenciales no puede enviar"),
        }
    }

    #[test]
    fn test_cached_token_expiry_buffer() {
        let now = Utc::now();
        let fresh = CachedAccessToken {
            token: "t".to_string(),
            expires_at: now + Duration::minutes(10),
        };
        let stale = CachedAccessToken {
            token: "t".to_string(),
            expires_at: now + Duration::minutes(4),
        };
        assert!(!fresh.is_expiring(now));
        assert!(stale.is_expiring(now));
    }
}
