//! Error taxonomy shared by the gateway and every manager.
//!
//! Every layer that touches Kubernetes, a database or another component classifies the
//! failure into an [ErrorKind] at the point of first contact. Callers above only pass
//! errors through; the HTTP layer renders them with [IntoResponse].

use ::core::fmt::Display;

use ::anyhow::anyhow;
use ::axum::{
    response::{IntoResponse, Response},
    Json,
};
use ::http::StatusCode;
use ::serde_json::json;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Closed set of error classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    Unauthorized,
    Forbidden,
    BadRequest,
    Internal,
}

impl ErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::AlreadyExists => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Recover the classification of an error response produced by another component.
    /// Any status outside the taxonomy is [ErrorKind::Internal].
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::CONFLICT => Self::AlreadyExists,
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::FORBIDDEN => Self::Forbidden,
            StatusCode::BAD_REQUEST => Self::BadRequest,
            _ => Self::Internal,
        }
    }
}

#[derive(Debug)]
pub struct GatewayError {
    kind: ErrorKind,
    cause: anyhow::Error,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, cause: impl Into<anyhow::Error>) -> Self {
        Self {
            kind,
            cause: cause.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn not_found<E: Into<anyhow::Error>>(e: E) -> Self {
        Self::new(ErrorKind::NotFound, e)
    }

    pub fn already_exists<E: Into<anyhow::Error>>(e: E) -> Self {
        Self::new(ErrorKind::AlreadyExists, e)
    }

    pub fn unauthorized<E: Into<anyhow::Error>>(e: E) -> Self {
        Self::new(ErrorKind::Unauthorized, e)
    }

    pub fn forbidden<E: Into<anyhow::Error>>(e: E) -> Self {
        Self::new(ErrorKind::Forbidden, e)
    }

    pub fn bad_request<E: Into<anyhow::Error>>(e: E) -> Self {
        Self::new(ErrorKind::BadRequest, e)
    }

    pub fn internal<E: Into<anyhow::Error>>(e: E) -> Self {
        Self::new(ErrorKind::Internal, e)
    }

    /// Classify an error returned by the Kubernetes API server.
    pub fn from_kube(e: kube::Error) -> Self {
        match &e {
            kube::Error::Api(response) if response.code == StatusCode::CONFLICT.as_u16() => {
                Self::already_exists(anyhow!(response.message.clone()))
            }
            kube::Error::Api(response) if response.code == StatusCode::NOT_FOUND.as_u16() => {
                Self::not_found(anyhow!(response.message.clone()))
            }
            _ => Self::internal(e),
        }
    }

    /// Keep the classification, put more context in front of the cause.
    pub fn context(self, context: impl Display + Send + Sync + 'static) -> Self {
        Self {
            kind: self.kind,
            cause: self.cause.context(context),
        }
    }
}

/// Only the cause is displayed, the kind is carried by the status code.
impl Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.cause)
    }
}

impl std::error::Error for GatewayError {}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.kind.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use ::axum::body::to_bytes;
    use ::serde_json::Value;

    use super::*;

    async fn render(error: GatewayError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn render_every_kind() {
        let cases = [
            (GatewayError::not_found(anyhow!("a")), 404),
            (GatewayError::already_exists(anyhow!("a")), 409),
            (GatewayError::unauthorized(anyhow!("a")), 401),
            (GatewayError::forbidden(anyhow!("a")), 403),
            (GatewayError::bad_request(anyhow!("a")), 400),
            (GatewayError::internal(anyhow!("a")), 500),
        ];
        for (error, code) in cases {
            let (status, body) = render(error).await;
            assert_eq!(status.as_u16(), code);
            assert_eq!(body, json!({"error": "a"}));
        }
    }

    #[test]
    fn status_round_trip() {
        for kind in [
            ErrorKind::NotFound,
            ErrorKind::AlreadyExists,
            ErrorKind::Unauthorized,
            ErrorKind::Forbidden,
            ErrorKind::BadRequest,
            ErrorKind::Internal,
        ] {
            assert_eq!(ErrorKind::from_status(kind.status_code()), kind);
        }
        assert_eq!(
            ErrorKind::from_status(StatusCode::BAD_GATEWAY),
            ErrorKind::Internal
        );
    }

    #[test]
    fn context_keeps_kind() {
        let error = GatewayError::not_found(anyhow!("missing")).context("reading ns/app");
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(error.to_string(), "reading ns/app: missing");
    }

    #[test]
    fn classify_kube_errors() {
        let api_error = |code: u16| {
            kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_owned(),
                message: format!("code {}", code),
                reason: String::new(),
                code,
            })
        };
        assert_eq!(
            GatewayError::from_kube(api_error(409)).kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            GatewayError::from_kube(api_error(404)).kind(),
            ErrorKind::NotFound
        );
        let other = GatewayError::from_kube(api_error(500));
        assert_eq!(other.kind(), ErrorKind::Internal);
    }
}
