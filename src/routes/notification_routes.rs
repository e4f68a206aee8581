use axum::{extract::State, routing::post, Json, Router};
use validator::Validate;

use crate::dto::fleetmatics_dto::SendEmailRequest;
use crate::services::MailOutcome;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_notification_router() -> Router<AppState> {
    Router::new().route("/email", post(send_email))
}

/// Enviar un correo. Con el mailer deshabilitado la respuesta lo dice
/// explícitamente; nunca se finge un envío exitoso.
async fn send_email(
    State(state): State<AppState>,
    Json(request): Json<SendEmailRequest>,
) -> Result<Json<MailOutcome>, AppError> {
    request.validate()?;

    let outcome = state
        .mailer
        .send_email(&request.to, &request.subject, &request.body)
        .await
        .map_err(|e| AppError::ExternalApi(e.to_string()))?;

    Ok(Json(outcome))
}
