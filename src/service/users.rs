//! Forum users of one tenant: registration on first participation, lookup, bans and reports.
//!
//! Identity comes from the upstream layer; a `users` row only records the display name and
//! moderation state. Banned users cannot participate and their posts drop out of listings.

use crate::error::AppError;
use crate::service::validation::{required_text, REPORT_REASON_MAX, USERNAME_MAX};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub is_banned: bool,
    pub created_at: DateTime<Utc>,
}

const USER_COLUMNS: &str = "id, username, is_banned, created_at";

pub async fn find_user_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(user)
}

/// User by id when `key` is a UUID, by username otherwise.
pub async fn find_user(conn: &mut PgConnection, key: &str) -> Result<User, AppError> {
    let user = match Uuid::parse_str(key) {
        Ok(id) => find_user_by_id(conn, id).await?,
        Err(_) => {
            sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS))
                .bind(key)
                .fetch_optional(&mut *conn)
                .await?
        }
    };
    user.ok_or_else(|| AppError::NotFound(format!("user {}", key)))
}

/// Display name to register: the forwarded name, or the id when none was sent.
fn username_for(id: Uuid, forwarded: Option<&str>) -> Result<String, AppError> {
    match forwarded.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => {
            required_text("username", name, USERNAME_MAX)?;
            Ok(name.to_string())
        }
        None => Ok(id.to_string()),
    }
}

async fn insert_user(conn: &mut PgConnection, id: Uuid, username: &str) -> Result<(), AppError> {
    sqlx::query("INSERT INTO users (id, username, created_at) VALUES ($1, $2, NOW()) ON CONFLICT DO NOTHING")
        .bind(id)
        .bind(username)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Make sure the caller has a `users` row and is allowed to participate.
///
/// A name already taken by another user falls back to the id. Banned users get 403.
pub async fn ensure_participant(conn: &mut PgConnection, id: Uuid, forwarded_name: Option<&str>) -> Result<User, AppError> {
    let username = username_for(id, forwarded_name)?;
    insert_user(conn, id, &username).await?;
    let user = match find_user_by_id(conn, id).await? {
        Some(user) => user,
        None => {
            insert_user(conn, id, &id.to_string()).await?;
            find_user_by_id(conn, id)
                .await?
                .ok_or_else(|| AppError::Conflict(format!("username {} is taken", username)))?
        }
    };
    if user.is_banned {
        return Err(AppError::Forbidden("user is banned".into()));
    }
    Ok(user)
}

fn not_self(actor: Uuid, target: Uuid, action: &str) -> Result<(), AppError> {
    if actor == target {
        return Err(AppError::BadRequest(format!("cannot {} yourself", action)));
    }
    Ok(())
}

/// Set the ban flag. Repeating a ban or unban is a no-op.
pub async fn set_banned(conn: &mut PgConnection, actor: Uuid, target: Uuid, banned: bool) -> Result<User, AppError> {
    not_self(actor, target, if banned { "ban" } else { "unban" })?;
    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET is_banned = $2 WHERE id = $1 RETURNING {}",
        USER_COLUMNS
    ))
    .bind(target)
    .bind(banned)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("user {}", target)))?;
    tracing::info!(user_id = %target, %actor, banned, "user ban changed");
    Ok(user)
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStatus {
    pub user_id: Uuid,
    pub reported: bool,
}

/// File a report against `target`, or withdraw the reporter's existing one. A reason is only
/// required when filing.
pub async fn toggle_report(
    conn: &mut PgConnection,
    reporter: Uuid,
    target: Uuid,
    body: &ReportRequest,
) -> Result<ReportStatus, AppError> {
    not_self(reporter, target, "report")?;
    if find_user_by_id(conn, target).await?.is_none() {
        return Err(AppError::NotFound(format!("user {}", target)));
    }
    let withdrawn = sqlx::query("DELETE FROM user_reports WHERE target_user_id = $1 AND reporter_id = $2")
        .bind(target)
        .bind(reporter)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if withdrawn > 0 {
        return Ok(ReportStatus {
            user_id: target,
            reported: false,
        });
    }

    required_text("reason", &body.reason, REPORT_REASON_MAX)?;
    sqlx::query(
        "INSERT INTO user_reports (id, target_user_id, reporter_id, reason, reported_at) \
         VALUES ($1, $2, $3, $4, NOW()) ON CONFLICT DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(target)
    .bind(reporter)
    .bind(&body.reason)
    .execute(&mut *conn)
    .await?;
    tracing::info!(user_id = %target, %reporter, "user reported");
    Ok(ReportStatus {
        user_id: target,
        reported: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_falls_back_to_id() {
        let id = Uuid::new_v4();
        assert_eq!(username_for(id, None).unwrap(), id.to_string());
        assert_eq!(username_for(id, Some("  ")).unwrap(), id.to_string());
        assert_eq!(username_for(id, Some(" ada ")).unwrap(), "ada");
        assert!(matches!(
            username_for(id, Some(&"x".repeat(USERNAME_MAX + 1))),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn moderation_of_self_is_rejected() {
        let id = Uuid::new_v4();
        assert!(matches!(not_self(id, id, "ban"), Err(AppError::BadRequest(m)) if m == "cannot ban yourself"));
        assert!(not_self(id, Uuid::new_v4(), "ban").is_ok());
    }

    #[test]
    fn report_reason_defaults_to_empty() {
        let body: ReportRequest = serde_json::from_str("{}").unwrap();
        assert!(body.reason.is_empty());
    }
}
