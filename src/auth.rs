use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::Id;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Faculty,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub exp: usize,
    pub role: Role,
}

/// Caller identity attached by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub id: Id,
    pub role: Role,
}

/// HS256 secret shared with the token issuer, registered as app data.
#[derive(Clone)]
pub struct JwtKeys {
    secret: Arc<str>,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        Self { secret: Arc::from(secret) }
    }
}

/// Validate a JWT and return its claims.
fn decode_jwt(token: &str, keys: &JwtKeys) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(keys.secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Extractor yielding the validated caller identity. Use `Option<Auth>` for
/// endpoints where authentication is optional.
pub struct Auth(pub Identity);

impl FromRequest for Auth {
    type Error = ApiError;
    type Future = Ready<Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let Some(keys) = req.app_data::<web::Data<JwtKeys>>() else {
            tracing::error!("JwtKeys missing from app data");
            return ready(Err(ApiError::Internal));
        };
        let Ok(bearer) = BearerAuth::from_request(req, pl).into_inner() else {
            return ready(Err(ApiError::Unauthorized));
        };
        let identity = decode_jwt(bearer.token(), keys)
            .ok()
            .and_then(|claims| Id::parse_str(&claims.sub).ok().map(|id| Identity { id, role: claims.role }));
        ready(identity.map(Auth).ok_or(ApiError::Unauthorized))
    }
}

/// Issue a 24h token. Tokens are normally minted by the platform's login
/// service; this exists for tooling and tests.
pub fn create_jwt(keys: &JwtKeys, user_id: Id, role: Role) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = (chrono::Utc::now() + chrono::Duration::hours(24)).timestamp() as usize;
    let claims = Claims { sub: user_id.to_string(), exp: expiration, role };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(keys.secret.as_bytes()),
    )
}
