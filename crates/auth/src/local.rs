use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, get_current_timestamp,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::{AuthError, Session};

const LOCAL_ISSUER: &str = "lai-local";
const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalOperator {
    pub email: String,
    /// bcrypt hash of the password (`$2b$<cost>$<salt+digest>`).
    pub password_hash: String,
}

impl LocalOperator {
    /// Parses `email:<bcrypt hash>`.
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let (email, hash) = raw
            .trim()
            .split_once(':')
            .ok_or_else(|| AuthError::invalid_config("operator entry must be email:bcrypt-hash"))?;
        let email = normalize_email(email);
        let hash = hash.trim();
        if email.is_empty() {
            return Err(AuthError::invalid_config("operator email must be non-empty"));
        }
        if !is_bcrypt_hash(hash) {
            return Err(AuthError::invalid_config(format!(
                "operator `{}` password hash must be a bcrypt hash",
                email
            )));
        }
        Ok(Self {
            email,
            password_hash: hash.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct LocalConfig {
    pub secret: String,
    pub operators: Vec<LocalOperator>,
    pub session_ttl: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    sub: String,
    email: String,
    iat: u64,
    exp: u64,
    jti: String,
}

/// Operator accounts from configuration, sessions as HS256 tokens.
#[derive(Clone)]
pub struct LocalIdentity {
    operators: Arc<Vec<LocalOperator>>,
    session_ttl: Duration,
    encoding: EncodingKey,
    decoding: DecodingKey,
    // jti -> exp, pruned as entries expire.
    revoked: Arc<RwLock<HashMap<String, u64>>>,
}

impl LocalIdentity {
    pub fn new(config: LocalConfig) -> Result<Self, AuthError> {
        if config.secret.len() < MIN_SECRET_BYTES {
            return Err(AuthError::invalid_config(format!(
                "local auth secret must be at least {} bytes",
                MIN_SECRET_BYTES
            )));
        }
        if config.operators.is_empty() {
            return Err(AuthError::invalid_config(
                "local auth requires at least one operator",
            ));
        }
        if config.session_ttl.is_zero() {
            return Err(AuthError::invalid_config("session ttl must be > 0"));
        }

        Ok(Self {
            operators: Arc::new(config.operators),
            session_ttl: config.session_ttl,
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            revoked: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub(crate) async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email);
        let known = self.operators.iter().find(|op| op.email == email);

        // Unknown emails are verified against the first operator's hash too.
        let Some(hash) = known.or_else(|| self.operators.first()).map(|op| op.password_hash.clone())
        else {
            return Err(AuthError::login_failed());
        };
        let presented = password.to_string();
        let matched = tokio::task::spawn_blocking(move || bcrypt::verify(presented, &hash))
            .await
            .map_err(|_| AuthError::new("ERR_INTERNAL", "password verification aborted"))?
            .unwrap_or(false);

        let operator = known
            .filter(|_| matched)
            .ok_or_else(AuthError::login_failed)?;

        let now = get_current_timestamp();
        let claims = Claims {
            iss: LOCAL_ISSUER.to_string(),
            sub: user_id_for(&operator.email),
            email: operator.email.clone(),
            iat: now,
            exp: now + self.session_ttl.as_secs().max(1),
            jti: ulid::Ulid::new().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|_| AuthError::new("ERR_INTERNAL", "failed to sign session token"))?;

        Ok(Session {
            user_id: claims.sub,
            email: claims.email,
            access_token: token,
            expires_at: Some(claims.exp),
            token_id: Some(claims.jti),
        })
    }

    pub(crate) async fn session_for_token(&self, token: &str) -> Result<Session, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[LOCAL_ISSUER]);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| AuthError::invalid("session token validation failed"))?
            .claims;

        if self.revoked.read().await.contains_key(&claims.jti) {
            return Err(AuthError::invalid("session has been signed out"));
        }
        if !self.operators.iter().any(|op| op.email == claims.email) {
            return Err(AuthError::invalid("operator no longer configured"));
        }

        Ok(Session {
            user_id: claims.sub,
            email: claims.email,
            access_token: token.to_string(),
            expires_at: Some(claims.exp),
            token_id: Some(claims.jti),
        })
    }

    pub(crate) async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        let Some(jti) = session.token_id.as_ref() else {
            return Err(AuthError::invalid("session has no token id"));
        };
        let exp = session.expires_at.unwrap_or_else(get_current_timestamp);

        let now = get_current_timestamp();
        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, expires| *expires > now);
        revoked.insert(jti.clone(), exp);
        Ok(())
    }

    pub async fn revoked_count(&self) -> usize {
        self.revoked.read().await.len()
    }
}

/// bcrypt hash for an `LAI_LOCAL_OPERATORS` entry.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost)
        .map_err(|err| AuthError::invalid_config(format!("cannot hash password: {}", err)))
}

fn is_bcrypt_hash(hash: &str) -> bool {
    let Some(rest) = ["$2a$", "$2b$", "$2y$"]
        .iter()
        .find_map(|prefix| hash.strip_prefix(prefix))
    else {
        return false;
    };
    let Some((cost, body)) = rest.split_once('$') else {
        return false;
    };
    let cost_ok = cost.len() == 2
        && cost
            .parse::<u32>()
            .is_ok_and(|c| (4..=31).contains(&c));
    cost_ok
        && body.len() == 53
        && body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '/'))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn user_id_for(email: &str) -> String {
    let digest = hex::encode(Sha256::digest(email.as_bytes()));
    format!("local-{}", &digest[..24])
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn operator_entry_parses_and_normalizes() {
        let hash = hash_password("rahasia", TEST_COST).expect("hash");
        let op = LocalOperator::parse(&format!(" Admin@Kemenkeu.go.id:{} ", hash))
            .expect("entry parses");
        assert_eq!(op.email, "admin@kemenkeu.go.id");
        assert_eq!(op.password_hash, hash);
    }

    #[test]
    fn operator_entry_rejects_bad_shapes() {
        let unsalted_digest = hex::encode(Sha256::digest(b"rahasia"));
        for raw in [
            "no-colon".to_string(),
            ":$2b$04$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW".to_string(),
            "a@b.c:xyz".to_string(),
            format!("a@b.c:{}", unsalted_digest),
            "a@b.c:$2b$99$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW".to_string(),
        ] {
            let err = LocalOperator::parse(&raw).unwrap_err();
            assert_eq!(err.code, "ERR_INVALID_CONFIG", "{}", raw);
        }
    }

    #[test]
    fn same_password_hashes_differently_per_operator() {
        let first = hash_password("rahasia", TEST_COST).expect("hash");
        let second = hash_password("rahasia", TEST_COST).expect("hash");
        assert_ne!(first, second);
        assert!(bcrypt::verify("rahasia", &first).expect("verify"));
        assert!(bcrypt::verify("rahasia", &second).expect("verify"));
    }

    #[test]
    fn short_secret_is_rejected() {
        let err = LocalIdentity::new(LocalConfig {
            secret: "short".to_string(),
            operators: vec![LocalOperator {
                email: "a@b.c".to_string(),
                password_hash: hash_password("x", TEST_COST).expect("hash"),
            }],
            session_ttl: Duration::from_secs(60),
        })
        .err()
        .expect("must fail");
        assert_eq!(err.code, "ERR_INVALID_CONFIG");
    }

    #[test]
    fn user_ids_are_stable_per_email() {
        assert_eq!(user_id_for("a@b.c"), user_id_for("a@b.c"));
        assert_ne!(user_id_for("a@b.c"), user_id_for("d@b.c"));
    }
}
