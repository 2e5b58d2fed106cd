use crate::server::ledger::LedgerError;
use crate::server::orchestrator::OrderError;
use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{error, HttpResponse};
use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub(crate) enum CustomError {
    #[display("server is busy")]
    ServerIsBusy,
    #[display("invalid request")]
    BadRequest,
    #[display("resource not found")]
    ResourceNotFound,
    #[display("database error")]
    DbError,
    #[display("upstream provider failed")]
    UpstreamFailed,
    #[display("timeout occurred")]
    Timeout,
}

impl error::ResponseError for CustomError {
    fn status_code(&self) -> StatusCode {
        match *self {
            CustomError::ServerIsBusy | CustomError::DbError => StatusCode::INTERNAL_SERVER_ERROR,
            CustomError::BadRequest => StatusCode::BAD_REQUEST,
            CustomError::ResourceNotFound => StatusCode::NOT_FOUND,
            CustomError::UpstreamFailed => StatusCode::BAD_GATEWAY,
            CustomError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::html())
            .body(self.to_string())
    }
}

impl From<LedgerError> for CustomError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound => Self::ResourceNotFound,
            LedgerError::InvalidStatus | LedgerError::EmptyOrder => Self::BadRequest,
            LedgerError::Busy => Self::ServerIsBusy,
            LedgerError::Storage { .. } => Self::DbError,
        }
    }
}

/// provider payloads and storage details are logged at the failure site,
/// never echoed to callers
impl From<OrderError> for CustomError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::Validation { .. } => Self::BadRequest,
            OrderError::Gateway(gateway) => match gateway {
                crate::server::gateway::GatewayError::Timeout => Self::Timeout,
                _ => Self::UpstreamFailed,
            },
            OrderError::Ledger(ledger) => ledger.into(),
        }
    }
}
