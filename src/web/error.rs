use crate::utils::error::{AppError, ErrorCategory};
use crate::web::render;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match (&self, self.category()) {
            (_, ErrorCategory::Auth) => {
                tracing::debug!("Redirecting to login: {}", self);
                return Redirect::to("/").into_response();
            }
            (AppError::NotFound { .. }, _) => StatusCode::NOT_FOUND,
            (_, ErrorCategory::Input) => StatusCode::BAD_REQUEST,
            (_, ErrorCategory::ExternalService) => StatusCode::BAD_GATEWAY,
            (_, ErrorCategory::Storage) => StatusCode::SERVICE_UNAVAILABLE,
            (_, ErrorCategory::Configuration) | (_, ErrorCategory::Internal) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let title = status.canonical_reason().unwrap_or("Error");
        let body = render::error_page(
            title,
            &self.user_friendly_message(),
            self.recovery_suggestion(),
        );
        (status, Html(body)).into_response()
    }
}
