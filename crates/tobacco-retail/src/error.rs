use crate::addresses::InitError;
use crate::config::ConfigError;
use crate::location::LocationError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Initialization(InitError),
    Location(LocationError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Initialization(err) => {
                write!(f, "address table initialization failed: {}", err)
            }
            AppError::Location(err) => write!(f, "invalid location: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Initialization(err) => Some(err),
            AppError::Location(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Location(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Initialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<InitError> for AppError {
    fn from(value: InitError) -> Self {
        Self::Initialization(value)
    }
}

impl From<LocationError> for AppError {
    fn from(value: LocationError) -> Self {
        Self::Location(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addresses::StoreError;

    #[test]
    fn invalid_locations_map_to_bad_request() {
        let response = AppError::from(LocationError::NotFinite).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let failure = InitError::from(StoreError::MissingTable("address".to_string()));
        let response = AppError::from(failure).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
