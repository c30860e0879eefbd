use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use log::debug;
use rocket::{
    http::{Cookie, SameSite, Status, StatusClass},
    request::{FromRequest, Outcome},
    time::Duration,
    Request,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    db::{candidate::Candidate, voter::Voter},
    mongodb::{Coll, Id},
};

use super::user::{Rights, User};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a specific user with specific rights.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthToken<U> {
    pub id: Id,
    #[serde(rename = "rgt")]
    pub rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// Does this token permit the given rights?
    pub fn permits(&self, target: Rights) -> bool {
        self.rights == target
    }
}

impl<U> AuthToken<U>
where
    U: User,
{
    /// Create a new [`AuthToken`] for the given user, with the correct rights for that user type.
    pub fn new(user: &U) -> Self {
        Self {
            id: user.id(),
            rights: U::RIGHTS,
            phantom: PhantomData,
        }
    }

    /// Serialize this token into a cookie.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;

        Ok(Cookie::build(AUTH_TOKEN_COOKIE, token)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish())
    }

    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'static>, config: &Config) -> Result<Self> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<U>>| claims.claims.token)?;
        Ok(token)
    }

    /// Extract and check the token on a request: it must decode, carry the rights of
    /// this user type, and name a user that still exists.
    async fn authenticate(req: &Request<'_>) -> std::result::Result<Self, (Status, Error)> {
        let config = req.rocket().state::<Config>().ok_or_else(|| {
            (
                Status::InternalServerError,
                Error::Status(
                    Status::InternalServerError,
                    "Configuration not loaded".to_string(),
                ),
            )
        })?;

        let cookie = req.cookies().get(AUTH_TOKEN_COOKIE).ok_or_else(|| {
            (
                Status::Unauthorized,
                Error::unauthorized("Authentication required"),
            )
        })?;

        let token = Self::from_cookie(cookie, config).map_err(|err| {
            debug!("Rejected auth token: {err}");
            (
                Status::Unauthorized,
                Error::unauthorized("Invalid authentication token"),
            )
        })?;

        if !token.permits(U::RIGHTS) {
            return Err((
                Status::Unauthorized,
                Error::unauthorized(format!("Requires {} rights", U::RIGHTS)),
            ));
        }

        let db = req
            .rocket()
            .state::<mongodb::Database>()
            .ok_or_else(|| {
                (
                    Status::InternalServerError,
                    Error::Status(
                        Status::InternalServerError,
                        "Database not connected".to_string(),
                    ),
                )
            })?;
        match Coll::<U>::from_db(db).find_one(token.id.as_doc(), None).await {
            Ok(Some(_)) => Ok(token),
            Ok(None) => Err((
                Status::Unauthorized,
                Error::unauthorized(format!("No {} with ID {}", U::RIGHTS, token.id)),
            )),
            Err(e) => Err((Status::InternalServerError, e.into())),
        }
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: User,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie and verify that it has the correct rights for this user
    /// type. Anything else is a failure, so the client is told it is unauthorized.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match Self::authenticate(req).await {
            Ok(token) => Outcome::Success(token),
            Err(failure) => Outcome::Failure(failure),
        }
    }
}

/// Whoever is casting a vote: registered voters and candidates can both vote.
#[derive(Debug)]
pub enum Caster {
    Voter(AuthToken<Voter>),
    Candidate(AuthToken<Candidate>),
}

impl Caster {
    pub fn id(&self) -> Id {
        match self {
            Self::Voter(token) => token.id,
            Self::Candidate(token) => token.id,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Caster {
    type Error = Error;

    /// A voter session takes precedence, a candidate session is the fallback.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match AuthToken::<Voter>::authenticate(req).await {
            Ok(token) => Outcome::Success(Self::Voter(token)),
            Err((status, err)) if status.class() == StatusClass::ServerError => {
                Outcome::Failure((status, err))
            }
            Err(_) => match AuthToken::<Candidate>::authenticate(req).await {
                Ok(token) => Outcome::Success(Self::Candidate(token)),
                Err(failure) => Outcome::Failure(failure),
            },
        }
    }
}
