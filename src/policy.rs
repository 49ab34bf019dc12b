//! Authorization policies. Each variant has one evaluation function; there are no string names
//! to look up.

use crate::error::AppError;
use crate::extractors::CurrentUser;
use crate::service::comments::Comment;
use crate::service::posts::Post;
use uuid::Uuid;

#[derive(Clone, Copy, Debug)]
pub enum Policy<'a> {
    ViewPost(&'a Post),
    ViewComment(&'a Comment),
    ParticipateInForum,
    MutatePost(&'a Post),
    MutateComment(&'a Comment),
    AdministrateForum,
    ViewAdminDashboard,
}

impl Policy<'_> {
    pub fn evaluate(&self, user: &CurrentUser) -> bool {
        match self {
            Policy::ViewPost(post) => !post.is_hidden() || user.is_admin() || is_author(user, post.author_id),
            Policy::ViewComment(comment) => {
                !comment.is_hidden() || user.is_admin() || is_author(user, comment.author_id)
            }
            Policy::ParticipateInForum => can_participate(user),
            Policy::MutatePost(post) => is_author(user, post.author_id),
            Policy::MutateComment(comment) => is_author(user, comment.author_id),
            Policy::AdministrateForum | Policy::ViewAdminDashboard => user.is_admin(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Policy::ViewPost(_) => "view this post",
            Policy::ViewComment(_) => "view this comment",
            Policy::ParticipateInForum => "participate in forum",
            Policy::MutatePost(_) => "mutate this post",
            Policy::MutateComment(_) => "mutate this comment",
            Policy::AdministrateForum => "administrate forum",
            Policy::ViewAdminDashboard => "view admin dashboard",
        }
    }

    /// Ok when the policy holds; 401 for anonymous callers, 403 otherwise.
    pub fn require(&self, user: &CurrentUser) -> Result<(), AppError> {
        require_any(&[*self], user)
    }
}

/// Ok when at least one policy holds. The 403 message names the first policy.
pub fn require_any(policies: &[Policy<'_>], user: &CurrentUser) -> Result<(), AppError> {
    if policies.iter().any(|p| p.evaluate(user)) {
        return Ok(());
    }
    if !user.is_authenticated() {
        return Err(AppError::Unauthorized);
    }
    let name = policies.first().map(Policy::name).unwrap_or("no policy");
    Err(AppError::Forbidden(format!("not allowed to {}", name)))
}

fn can_participate(user: &CurrentUser) -> bool {
    user.is_authenticated()
}

fn is_author(user: &CurrentUser, author_id: Uuid) -> bool {
    user.id() == Some(author_id)
}
