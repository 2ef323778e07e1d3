use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SUBJECT: &str = "admin";

/// Issues and checks the signed token that marks a browser as the admin.
///
/// Token format: `admin.<expires_unix>.<hex hmac-sha256>`.
pub struct SessionSigner {
    key: Vec<u8>,
    lifetime_secs: i64,
}

impl SessionSigner {
    pub fn new(secret: &str, lifetime_hours: u64) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
            lifetime_secs: (lifetime_hours as i64).saturating_mul(3600),
        }
    }

    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime_secs
    }

    /// Issue a token valid for the configured lifetime.
    pub fn issue(&self) -> String {
        self.issue_at(Utc::now().timestamp())
    }

    fn issue_at(&self, now: i64) -> String {
        let expires = now.saturating_add(self.lifetime_secs);
        let payload = format!("{}.{}", SUBJECT, expires);
        let signature = hex::encode(self.mac(&payload).finalize().into_bytes());
        format!("{}.{}", payload, signature)
    }

    /// Whether `token` was issued by this signer and has not expired.
    pub fn verify(&self, token: &str) -> bool {
        self.verify_at(token, Utc::now().timestamp())
    }

    fn verify_at(&self, token: &str, now: i64) -> bool {
        let Some((payload, signature)) = token.rsplit_once('.') else {
            return false;
        };
        let Some((subject, expires)) = payload.split_once('.') else {
            return false;
        };
        if subject != SUBJECT {
            return false;
        }
        let Ok(expires) = expires.parse::<i64>() else {
            return false;
        };
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };

        // Constant-time comparison
        if self.mac(payload).verify_slice(&signature).is_err() {
            return false;
        }
        now < expires
    }

    /// Compare a submitted password with the configured one without
    /// leaking timing. An empty configured password never matches.
    pub fn password_matches(&self, configured: &str, submitted: &str) -> bool {
        if configured.is_empty() {
            return false;
        }
        let expected = self.mac(configured).finalize().into_bytes();
        self.mac(submitted).verify_slice(&expected).is_ok()
    }

    fn mac(&self, message: &str) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length");
        mac.update(message.as_bytes());
        mac
    }
}
