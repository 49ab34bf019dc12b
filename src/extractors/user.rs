//! Caller identity forwarded by the upstream identity layer.

use crate::error::AppError;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_ROLE_HEADER: &str = "X-User-Role";
/// Optional display name, recorded when the user first participates.
pub const USER_NAME_HEADER: &str = "X-User-Name";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    fn parse(s: &str) -> Role {
        if s.trim().eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::User
        }
    }
}

/// Authenticated user, or anonymous when no valid id was forwarded. Extraction never fails.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CurrentUser {
    id: Option<Uuid>,
    role: Role,
    name: Option<String>,
}

impl CurrentUser {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(id: Uuid, role: Role) -> Self {
        CurrentUser {
            id: Some(id),
            role,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn is_authenticated(&self) -> bool {
        self.id.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.is_authenticated() && self.role == Role::Admin
    }

    pub fn require_id(&self) -> Result<Uuid, AppError> {
        self.id.ok_or(AppError::Unauthorized)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };
        let id = header(USER_ID_HEADER).and_then(|s| Uuid::parse_str(s).ok());
        let role = header(USER_ROLE_HEADER).map(Role::parse).unwrap_or_default();
        let name = header(USER_NAME_HEADER).map(String::from);
        Ok(match (id, name) {
            (Some(id), Some(name)) => CurrentUser::authenticated(id, role).with_name(name),
            (Some(id), None) => CurrentUser::authenticated(id, role),
            (None, _) => CurrentUser::anonymous(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> CurrentUser {
        let (mut parts, _) = req.into_parts();
        CurrentUser::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn reads_forwarded_identity() {
        let id = Uuid::new_v4();
        let req = Request::builder()
            .header(USER_ID_HEADER, id.to_string())
            .header(USER_ROLE_HEADER, "Admin")
            .header(USER_NAME_HEADER, " ada ")
            .body(())
            .unwrap();
        let user = extract(req).await;
        assert_eq!(user.id(), Some(id));
        assert!(user.is_admin());
        assert_eq!(user.name(), Some("ada"));
    }

    #[tokio::test]
    async fn invalid_id_is_anonymous() {
        let req = Request::builder()
            .header(USER_ID_HEADER, "not-a-uuid")
            .header(USER_ROLE_HEADER, "admin")
            .body(())
            .unwrap();
        let user = extract(req).await;
        assert!(!user.is_authenticated());
        assert!(!user.is_admin());
        assert!(matches!(user.require_id(), Err(AppError::Unauthorized)));
    }
}
