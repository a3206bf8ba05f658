//! Room access tokens: short-lived HS256 credentials minted from the
//! transport provider's key/secret pair.

use anyhow::{Context, Result};
use govi_core::room::SubscriptionMode;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Claims carried by a room access token. The issuer is the transport API
/// key; the secret only signs, it is never transmitted.
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomAccessClaims {
    pub iss: String,
    /// Participant identity the worker joins under.
    pub sub: String,
    pub room: String,
    pub subscription: SubscriptionMode,
    pub iat: u64,
    pub exp: u64,
}

/// Mints a signed access token for one room join.
pub fn mint_room_token(
    api_key: &str,
    api_secret: &str,
    room: &str,
    identity: &str,
    subscription: SubscriptionMode,
    ttl: Duration,
) -> Result<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the Unix epoch")?
        .as_secs();
    let claims = RoomAccessClaims {
        iss: api_key.to_string(),
        sub: identity.to_string(),
        room: room.to_string(),
        subscription,
        iat: now,
        exp: now + ttl.as_secs(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(api_secret.as_bytes()),
    )
    .context("Failed to encode room access token")
}
