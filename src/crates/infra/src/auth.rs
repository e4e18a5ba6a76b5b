use application::auth::{Clock, SystemClock, TokenClaims, TokenError, TokenService};
use application::error::AppError;
use bcrypt::hash as bcrypt_hash;
use bcrypt::verify as bcrypt_verify;
use domain::user::{Role, User};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub trait AuthConfig {
    fn jwt_secret(&self) -> &str;
    fn jwt_expire_secs(&self) -> i64;
    fn salt_cost(&self) -> u32;
}

#[derive(Debug, Clone)]
pub struct BcryptPasswordHasher {
    salt_cost: u32,
}

impl BcryptPasswordHasher {
    pub fn new(salt_cost: u32) -> Self {
        Self { salt_cost }
    }
}

impl application::auth::PasswordHasher for BcryptPasswordHasher {
    fn hash(&self, plain: &str) -> Result<String, AppError> {
        bcrypt_hash(plain, self.salt_cost).map_err(|e| AppError::AuthError(e.to_string()))
    }

    fn verify(&self, pwd: &str, hashed_pwd: &str) -> Result<(), AppError> {
        if bcrypt_verify(pwd, hashed_pwd).unwrap_or(false) {
            Ok(())
        } else {
            Err(AppError::AuthError("invalid password".to_string()))
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 签名的无状态令牌。过期时间用注入的时钟在校验时判断，而不是交给 jsonwebtoken。
#[derive(Clone)]
pub struct JwtTokenService {
    jwt_secret: String,
    exp_secs: i64,
    clock: Arc<dyn Clock>,
}

impl JwtTokenService {
    pub fn new(jwt_secret: &str, exp_secs: i64) -> Self {
        Self::with_clock(jwt_secret, exp_secs, Arc::new(SystemClock))
    }

    pub fn with_clock(jwt_secret: &str, exp_secs: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            jwt_secret: jwt_secret.to_string(),
            exp_secs,
            clock,
        }
    }

    pub fn from_config(cfg: &impl AuthConfig) -> Self {
        Self::new(cfg.jwt_secret(), cfg.jwt_expire_secs())
    }

    fn validation(verify_signature: bool) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);
        if !verify_signature {
            validation.insecure_disable_signature_validation();
        }
        validation
    }

    fn decode_claims(&self, token: &str, verify_signature: bool) -> Result<JwtClaims, TokenError> {
        decode::<JwtClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Self::validation(verify_signature),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                TokenError::SignatureInvalid
            }
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed(e.to_string()),
        })
    }
}

impl TokenService for JwtTokenService {
    fn issue(&self, user: &User) -> Result<String, AppError> {
        let now = self.clock.now();
        let claims = JwtClaims {
            sub: user.username.clone(),
            role: user.role.name().to_string(),
            iat: now,
            exp: now + self.exp_secs,
        };
        let key = EncodingKey::from_secret(self.jwt_secret.as_bytes());
        encode(&Header::new(Algorithm::HS256), &claims, &key)
            .map_err(|e| AppError::AuthError(e.to_string()))
    }

    fn validate(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let claims = self.decode_claims(token, true)?;
        if claims.exp <= self.clock.now() {
            return Err(TokenError::Expired);
        }
        let role = claims
            .role
            .parse::<Role>()
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        Ok(TokenClaims {
            username: claims.sub,
            role,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }

    fn peek_subject(&self, token: &str) -> Result<String, TokenError> {
        self.decode_claims(token, false).map(|claims| claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use application::auth::PasswordHasher;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use domain::value::UserId;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct ManualClock(AtomicI64);

    impl Clock for ManualClock {
        fn now(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    const SECRET: &str = "unit-test-secret-with-enough-entropy";

    fn user(name: &str, role: Role) -> User {
        User::new(
            UserId::from(1),
            name,
            &format!("{}@example.com", name),
            "hash",
            role,
            None,
            None,
        )
    }

    fn service(ttl: i64) -> (JwtTokenService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock(AtomicI64::new(1_700_000_000)));
        (JwtTokenService::with_clock(SECRET, ttl, clock.clone()), clock)
    }

    #[test]
    fn test_issue_and_validate() {
        let (svc, _) = service(3600);
        let alice = user("alice", Role::Company);
        let token = svc.issue(&alice).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let claims = svc.validate(&token).unwrap();
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, Role::Company);
        assert_eq!(claims.issued_at, 1_700_000_000);
        assert_eq!(claims.expires_at, 1_700_000_000 + 3600);
        assert!(svc.is_valid_for(&token, &alice));
    }

    #[test]
    fn test_token_expires_after_ttl() {
        let (svc, clock) = service(60);
        let alice = user("alice", Role::User);
        let token = svc.issue(&alice).unwrap();

        clock.0.fetch_add(59, Ordering::SeqCst);
        assert!(svc.is_valid_for(&token, &alice));

        clock.0.fetch_add(1, Ordering::SeqCst);
        assert!(!svc.is_valid_for(&token, &alice));
        assert_eq!(svc.validate(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_subject_must_match_identity() {
        let (svc, _) = service(60);
        let token = svc.issue(&user("alice", Role::User)).unwrap();
        assert!(!svc.is_valid_for(&token, &user("bob", Role::User)));
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let (svc, _) = service(60);
        let alice = user("alice", Role::User);
        let token = svc.issue(&alice).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let forged_payload = URL_SAFE_NO_PAD.encode(
            serde_json::json!({
                "sub": "alice",
                "role": "ADMIN",
                "iat": 1_700_000_000i64,
                "exp": 1_800_000_000i64,
            })
            .to_string(),
        );
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        assert_eq!(svc.validate(&forged), Err(TokenError::SignatureInvalid));
        assert!(!svc.is_valid_for(&forged, &alice));
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let (svc, clock) = service(60);
        let other = JwtTokenService::with_clock("another-secret", 60, clock);
        let alice = user("alice", Role::Admin);
        let token = other.issue(&alice).unwrap();

        assert_eq!(svc.validate(&token), Err(TokenError::SignatureInvalid));
        assert!(!svc.is_valid_for(&token, &alice));
        // the subject is still readable, it just isn't trusted
        assert_eq!(svc.peek_subject(&token).unwrap(), "alice");
    }

    #[test]
    fn test_garbage_is_malformed() {
        let (svc, _) = service(60);
        assert!(matches!(svc.validate("not-a-token"), Err(TokenError::Malformed(_))));
        assert!(matches!(svc.peek_subject("a.b.c"), Err(TokenError::Malformed(_))));
        assert!(svc.validate("").is_err());
    }

    #[test]
    fn test_unsigned_token_is_rejected() {
        let (svc, _) = service(60);
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(r#"{"sub":"alice","role":"ADMIN","iat":0,"exp":9999999999}"#);
        let token = format!("{}.{}.", header, payload);
        assert!(svc.validate(&token).is_err());
        assert!(!svc.is_valid_for(&token, &user("alice", Role::Admin)));
    }

    #[test]
    fn test_bcrypt_hasher() {
        let hasher = BcryptPasswordHasher::new(4);
        let hashed = hasher.hash("s3cret").unwrap();
        assert_ne!(hashed, "s3cret");
        assert!(hasher.verify("s3cret", &hashed).is_ok());
        assert!(hasher.verify("wrong", &hashed).is_err());
        assert!(hasher.verify("s3cret", "not-a-bcrypt-hash").is_err());
    }
}
