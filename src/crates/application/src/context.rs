use domain::user::{Role, User};

/// 已认证的请求主体
///
/// 目前只有用户名/密码注册的用户一种；以后如果加入 API key 之类的凭据，在这里增加变体。
#[derive(Debug, Clone)]
pub enum Principal {
    User(User),
}

impl Principal {
    pub fn identifier(&self) -> &str {
        match self {
            Principal::User(user) => &user.username,
        }
    }

    pub fn credential_hash(&self) -> &str {
        match self {
            Principal::User(user) => &user.password,
        }
    }

    pub fn authorities(&self) -> Vec<String> {
        match self {
            Principal::User(user) => user.authorities(),
        }
    }

    pub fn user(&self) -> &User {
        match self {
            Principal::User(user) => user,
        }
    }
}

/// Request-scoped result of the security pipeline.
///
/// Built once per request and carried in the request extensions; never shared across requests.
/// The authority set is computed from the identity's current role at resolution time.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationContext {
    principal: Option<Principal>,
    authorities: Vec<String>,
}

impl AuthorizationContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(user: User) -> Self {
        let principal = Principal::User(user);
        let authorities = principal.authorities();
        Self {
            principal: Some(principal),
            authorities,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.principal.as_ref().map(Principal::user)
    }

    pub fn username(&self) -> Option<&str> {
        self.principal.as_ref().map(Principal::identifier)
    }

    pub fn authorities(&self) -> &[String] {
        &self.authorities
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|role| self.has_authority(&role.authority()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::value::UserId;

    fn user(role: Role) -> User {
        User::new(UserId::from(7), "alice", "alice@example.com", "$2b$hash", role, None, None)
    }

    #[test]
    fn test_anonymous_has_nothing() {
        let ctx = AuthorizationContext::anonymous();
        assert!(!ctx.is_authenticated());
        assert!(ctx.authorities().is_empty());
        assert!(!ctx.has_any_role(&[Role::User, Role::Admin, Role::Company]));
        assert!(ctx.username().is_none());
    }

    #[test]
    fn test_authenticated_carries_role_authority() {
        let ctx = AuthorizationContext::authenticated(user(Role::Company));
        assert!(ctx.is_authenticated());
        assert_eq!(ctx.username(), Some("alice"));
        assert_eq!(ctx.authorities(), &["ROLE_COMPANY".to_string()]);
        assert!(ctx.has_any_role(&[Role::Admin, Role::Company]));
        assert!(!ctx.has_any_role(&[Role::Admin]));
        assert_eq!(ctx.principal().unwrap().credential_hash(), "$2b$hash");
    }
}
