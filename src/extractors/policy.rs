//! Callers that already passed a request-independent policy.
//!
//! These run from headers alone, so handlers list them ahead of [`TenantDb`](super::TenantDb):
//! a 401 or 403 is returned before the registry or a tenant pool is touched.

use crate::error::AppError;
use crate::extractors::CurrentUser;
use crate::policy::Policy;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

async fn authorize<S>(parts: &mut Parts, state: &S, policy: Policy<'static>) -> Result<(CurrentUser, Uuid), AppError>
where
    S: Send + Sync,
{
    let user = match CurrentUser::from_request_parts(parts, state).await {
        Ok(user) => user,
        Err(never) => match never {},
    };
    policy.require(&user)?;
    let id = user.require_id()?;
    Ok((user, id))
}

/// Authenticated caller allowed to post, comment, vote and bookmark.
#[derive(Clone, Debug)]
pub struct Participant {
    pub user: CurrentUser,
    pub id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for Participant
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let (user, id) = authorize(parts, state, Policy::ParticipateInForum).await?;
        Ok(Participant { user, id })
    }
}

/// Caller allowed to moderate users and content.
#[derive(Clone, Debug)]
pub struct ForumAdmin {
    pub user: CurrentUser,
    pub id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for ForumAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let (user, id) = authorize(parts, state, Policy::AdministrateForum).await?;
        Ok(ForumAdmin { user, id })
    }
}

#[derive(Clone, Debug)]
pub struct DashboardViewer {
    pub user: CurrentUser,
}

#[async_trait]
impl<S> FromRequestParts<S> for DashboardViewer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let (user, _) = authorize(parts, state, Policy::ViewAdminDashboard).await?;
        Ok(DashboardViewer { user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::user::{USER_ID_HEADER, USER_ROLE_HEADER};
    use axum::http::Request;

    fn parts(id: Option<Uuid>, role: Option<&str>) -> Parts {
        let mut builder = Request::builder();
        if let Some(id) = id {
            builder = builder.header(USER_ID_HEADER, id.to_string());
        }
        if let Some(role) = role {
            builder = builder.header(USER_ROLE_HEADER, role);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn participant_needs_an_identity() {
        let err = Participant::from_request_parts(&mut parts(None, None), &()).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));

        let id = Uuid::new_v4();
        let participant = Participant::from_request_parts(&mut parts(Some(id), None), &()).await.unwrap();
        assert_eq!(participant.id, id);
    }

    #[tokio::test]
    async fn admin_extractors_reject_plain_users() {
        let mut user = parts(Some(Uuid::new_v4()), Some("user"));
        assert!(matches!(
            ForumAdmin::from_request_parts(&mut user, &()).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            DashboardViewer::from_request_parts(&mut user, &()).await,
            Err(AppError::Forbidden(_))
        ));

        let mut admin = parts(Some(Uuid::new_v4()), Some("admin"));
        assert!(ForumAdmin::from_request_parts(&mut admin, &()).await.is_ok());
        assert!(DashboardViewer::from_request_parts(&mut admin, &()).await.is_ok());
    }
}
