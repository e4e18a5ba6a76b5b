//! Authorization policy table.
//!
//! An ordered list of `(method, path pattern, requirement)` rules, first match wins.
//! Requests that match no rule require authentication.

use crate::context::AuthorizationContext;
use domain::user::Role;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl FromStr for HttpMethod {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "HEAD" => Ok(HttpMethod::Head),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => Err(PolicyError::UnknownMethod(other.to_string())),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("unknown http method: {0}")]
    UnknownMethod(String),
    #[error("invalid path pattern '{0}': {1}")]
    InvalidPattern(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Public,
    Authenticated,
    RoleIn(Vec<Role>),
}

/// Why a request was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("Full authentication is required to access this resource")]
    Unauthorized,
    #[error("Access is denied")]
    Forbidden,
}

impl Requirement {
    pub fn check(&self, ctx: &AuthorizationContext) -> Result<(), AccessDenied> {
        match self {
            Requirement::Public => Ok(()),
            Requirement::Authenticated if ctx.is_authenticated() => Ok(()),
            Requirement::Authenticated => Err(AccessDenied::Unauthorized),
            Requirement::RoleIn(_) if !ctx.is_authenticated() => Err(AccessDenied::Unauthorized),
            Requirement::RoleIn(roles) if ctx.has_any_role(roles) => Ok(()),
            Requirement::RoleIn(_) => Err(AccessDenied::Forbidden),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*`, exactly one segment
    Wildcard,
    /// `{name}`, exactly one segment, captured
    Param(String),
    /// trailing `**`, zero or more segments
    Rest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

fn split_path(path: &str) -> Vec<&str> {
    // "/a/b" -> ["a", "b"]; "/a/b/" -> ["a", "b", ""]; "/" -> [""]
    path.strip_prefix('/').unwrap_or(path).split('/').collect()
}

fn is_dot_segment(segment: &str) -> bool {
    segment == "." || segment == ".."
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PolicyError> {
        let invalid = |why: &str| PolicyError::InvalidPattern(pattern.to_string(), why.to_string());
        if !pattern.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }
        let parts = split_path(pattern);
        let last = parts.len() - 1;
        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.into_iter().enumerate() {
            let segment = match part {
                "**" if i == last => Segment::Rest,
                "**" => return Err(invalid("'**' is only allowed as the last segment")),
                "*" => Segment::Wildcard,
                p if p.starts_with('{') && p.ends_with('}') && p.len() > 2 => {
                    Segment::Param(p[1..p.len() - 1].to_string())
                }
                p if p.contains(['*', '{', '}']) => {
                    return Err(invalid("wildcards must span a whole segment"))
                }
                p => Segment::Literal(p.to_string()),
            };
            segments.push(segment);
        }
        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the captured path parameters when `path` matches.
    ///
    /// Wildcards and parameters never match an empty, `.` or `..` segment, so a path that
    /// only looks like a public route after dot-segment resolution falls through to the default.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts = split_path(path);
        let mut params = HashMap::new();
        let mut idx = 0;
        for segment in &self.segments {
            match segment {
                Segment::Rest => {
                    let rest = &parts[idx..];
                    if rest.iter().any(|p| is_dot_segment(p)) {
                        return None;
                    }
                    return Some(params);
                }
                _ if idx >= parts.len() => return None,
                Segment::Literal(lit) => {
                    if parts[idx] != lit.as_str() {
                        return None;
                    }
                }
                Segment::Wildcard | Segment::Param(_) => {
                    let part = parts[idx];
                    if part.is_empty() || is_dot_segment(part) {
                        return None;
                    }
                    if let Segment::Param(name) = segment {
                        params.insert(name.clone(), part.to_string());
                    }
                }
            }
            idx += 1;
        }
        (idx == parts.len()).then_some(params)
    }
}

#[derive(Debug, Clone)]
pub struct RouteRule {
    /// `None` matches any method
    pub method: Option<HttpMethod>,
    pub pattern: PathPattern,
    pub requirement: Requirement,
}

impl fmt::Display for RouteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.method {
            Some(m) => write!(f, "{:?} {} => {:?}", m, self.pattern.as_str(), self.requirement),
            None => write!(f, "* {} => {:?}", self.pattern.as_str(), self.requirement),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PolicyTable {
    rules: Vec<RouteRule>,
    default: Requirement,
}

impl PolicyTable {
    pub fn builder() -> PolicyTableBuilder {
        PolicyTableBuilder {
            rules: Vec::new(),
            error: None,
        }
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// First matching rule's requirement, or the default (`Authenticated`).
    pub fn requirement_for(&self, method: HttpMethod, path: &str) -> &Requirement {
        self.rules
            .iter()
            .find(|rule| {
                rule.method.map_or(true, |m| m == method) && rule.pattern.matches(path).is_some()
            })
            .map(|rule| &rule.requirement)
            .unwrap_or(&self.default)
    }

    pub fn authorize(
        &self,
        method: HttpMethod,
        path: &str,
        ctx: &AuthorizationContext,
    ) -> Result<(), AccessDenied> {
        self.requirement_for(method, path).check(ctx)
    }

    /// The application's route table. `uploads_prefix` is the path part of the public file
    /// base URL, e.g. `/uploads`.
    pub fn melodymix(uploads_prefix: &str) -> Result<Self, PolicyError> {
        let uploads = uploads_prefix.trim_end_matches('/');
        let staff = [Role::Admin, Role::Company];
        Self::builder()
            .permit_all(None, "/api/auth/**")
            .permit_all(Some(HttpMethod::Get), &format!("{}/songs/**", uploads))
            .permit_all(Some(HttpMethod::Get), &format!("{}/covers/**", uploads))
            .permit_all(Some(HttpMethod::Get), "/api/songs")
            .permit_all(Some(HttpMethod::Get), "/api/songs/{songId}")
            // 必须排在 /api/songs 相关的宽泛规则之前
            .has_any_role(Some(HttpMethod::Post), "/api/songs/upload/file", &staff)
            .has_any_role(Some(HttpMethod::Delete), "/api/songs/upload/file", &staff)
            .has_any_role(Some(HttpMethod::Post), "/api/songs", &staff)
            .has_any_role(Some(HttpMethod::Put), "/api/songs/{songId}", &staff)
            .has_any_role(Some(HttpMethod::Delete), "/api/songs/{songId}", &staff)
            .authenticated(Some(HttpMethod::Get), "/api/user/me")
            .has_any_role(Some(HttpMethod::Get), "/api/user/all", &[Role::Admin])
            .authenticated(Some(HttpMethod::Put), "/api/user")
            .authenticated(Some(HttpMethod::Put), "/api/user/change-password")
            .authenticated(None, "/api/user/likes/**")
            .build()
    }
}

pub struct PolicyTableBuilder {
    rules: Vec<RouteRule>,
    error: Option<PolicyError>,
}

impl PolicyTableBuilder {
    pub fn rule(mut self, method: Option<HttpMethod>, pattern: &str, requirement: Requirement) -> Self {
        if self.error.is_some() {
            return self;
        }
        match PathPattern::parse(pattern) {
            Ok(pattern) => self.rules.push(RouteRule {
                method,
                pattern,
                requirement,
            }),
            Err(e) => self.error = Some(e),
        }
        self
    }

    pub fn permit_all(self, method: Option<HttpMethod>, pattern: &str) -> Self {
        self.rule(method, pattern, Requirement::Public)
    }

    pub fn authenticated(self, method: Option<HttpMethod>, pattern: &str) -> Self {
        self.rule(method, pattern, Requirement::Authenticated)
    }

    pub fn has_any_role(self, method: Option<HttpMethod>, pattern: &str, roles: &[Role]) -> Self {
        self.rule(method, pattern, Requirement::RoleIn(roles.to_vec()))
    }

    pub fn build(self) -> Result<PolicyTable, PolicyError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(PolicyTable {
                rules: self.rules,
                default: Requirement::Authenticated,
            }),
        }
    }
}
