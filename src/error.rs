use std::fmt::Display;

use argon2::Error as Argon2Error;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use log::{error, warn};
use mongodb::{bson::oid::Error as OidError, error::Error as DbError};
use rocket::{
    http::{Status, StatusClass},
    response::{self, status::Custom, Responder},
    serde::json::Json,
    Request,
};
use thiserror::Error;

use crate::model::api::response::Failure;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Invalid ID format: {0}")]
    OidParse(#[from] OidError),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    /// Something was not found.
    pub fn not_found(what: impl Display) -> Self {
        Self::Status(Status::NotFound, format!("{what} not found"))
    }

    /// The request was malformed or violated a precondition.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Status(Status::BadRequest, message.into())
    }

    /// The supplied credentials were wrong.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Status(Status::Unauthorized, message.into())
    }

    /// The HTTP status this error maps to.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Argon2(_) | Self::Io(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::OidParse(_) => Status::BadRequest,
            Self::Status(status, _) => *status,
        }
    }

    /// The message shown to the client. Server-side failures are never described in detail.
    pub fn message(&self) -> String {
        match self {
            Self::Db(_) | Self::Argon2(_) | Self::Io(_) => "Internal server error".to_string(),
            Self::Jwt(_) => "Invalid authentication token".to_string(),
            Self::OidParse(_) => "Invalid ID format".to_string(),
            Self::Status(_, message) => message.clone(),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        match status.class() {
            StatusClass::ServerError => error!("{} {}: {self}", req.method(), req.uri()),
            _ => warn!("{} {}: {self}", req.method(), req.uri()),
        }
        Custom(status, Json(Failure::new(self.message()))).respond_to(req)
    }
}
