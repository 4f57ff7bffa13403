//! The claim set used for the session token, §6.
//!
//! Kept separate from signing/verification (which lives in `auth-service`,
//! the only service that holds `JWT_SECRET_KEY` directly) so that every
//! service can share the same wire shape.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Decimal user id, per §6 ("claim set {iss: user.id decimal, exp}").
    pub iss: String,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: i64, exp: chrono::DateTime<chrono::Utc>) -> Self {
        Claims {
            iss: user_id.to_string(),
            exp: exp.timestamp(),
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.iss.parse().ok()
    }
}
