//! Up/down votes on posts and comments. A user has at most one vote per target.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VoteType {
    Upvote,
    Downvote,
    #[default]
    NoVote,
}

impl VoteType {
    pub fn as_db(&self) -> Option<&'static str> {
        match self {
            VoteType::Upvote => Some("upvote"),
            VoteType::Downvote => Some("downvote"),
            VoteType::NoVote => None,
        }
    }

    pub fn from_db(s: Option<&str>) -> VoteType {
        match s {
            Some("upvote") => VoteType::Upvote,
            Some("downvote") => VoteType::Downvote,
            _ => VoteType::NoVote,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub vote_type: VoteType,
}

/// What a vote request does to the stored vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteChange {
    Unchanged,
    Insert(VoteType),
    Update(VoteType),
    Remove,
}

pub fn plan_vote(existing: VoteType, requested: VoteType) -> VoteChange {
    match (existing, requested) {
        (VoteType::NoVote, VoteType::NoVote) => VoteChange::Unchanged,
        (_, VoteType::NoVote) => VoteChange::Remove,
        (VoteType::NoVote, v) => VoteChange::Insert(v),
        (_, v) => VoteChange::Update(v),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteTarget {
    Post,
    Comment,
}

impl VoteTarget {
    fn table(&self) -> &'static str {
        match self {
            VoteTarget::Post => "post_votes",
            VoteTarget::Comment => "comment_votes",
        }
    }

    fn column(&self) -> &'static str {
        match self {
            VoteTarget::Post => "post_id",
            VoteTarget::Comment => "comment_id",
        }
    }
}

/// Apply `requested` for `voter_id` on the target and return what changed.
pub async fn cast_vote(
    conn: &mut PgConnection,
    target: VoteTarget,
    target_id: Uuid,
    voter_id: Uuid,
    requested: VoteType,
) -> Result<VoteChange, AppError> {
    let (table, column) = (target.table(), target.column());
    let existing: Option<String> = sqlx::query_scalar(&format!(
        "SELECT vote_type FROM {} WHERE {} = $1 AND voter_id = $2",
        table, column
    ))
    .bind(target_id)
    .bind(voter_id)
    .fetch_optional(&mut *conn)
    .await?;

    let change = plan_vote(VoteType::from_db(existing.as_deref()), requested);
    match change {
        VoteChange::Unchanged => {}
        VoteChange::Insert(v) | VoteChange::Update(v) => {
            // Upsert so a concurrent first vote from the same user cannot violate the unique key.
            sqlx::query(&format!(
                "INSERT INTO {table} (id, {column}, voter_id, vote_type, voted_at) VALUES ($1, $2, $3, $4, NOW()) \
                 ON CONFLICT ({column}, voter_id) DO UPDATE SET vote_type = EXCLUDED.vote_type, voted_at = NOW()",
            ))
            .bind(Uuid::new_v4())
            .bind(target_id)
            .bind(voter_id)
            .bind(v.as_db())
            .execute(&mut *conn)
            .await?;
        }
        VoteChange::Remove => {
            sqlx::query(&format!("DELETE FROM {} WHERE {} = $1 AND voter_id = $2", table, column))
                .bind(target_id)
                .bind(voter_id)
                .execute(&mut *conn)
                .await?;
        }
    }
    tracing::debug!(?target, %target_id, ?change, "vote applied");
    Ok(change)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_transitions() {
        use VoteType::*;
        assert_eq!(plan_vote(NoVote, NoVote), VoteChange::Unchanged);
        assert_eq!(plan_vote(Upvote, NoVote), VoteChange::Remove);
        assert_eq!(plan_vote(NoVote, Downvote), VoteChange::Insert(Downvote));
        assert_eq!(plan_vote(Upvote, Downvote), VoteChange::Update(Downvote));
        assert_eq!(plan_vote(Upvote, Upvote), VoteChange::Update(Upvote));
    }

    #[test]
    fn vote_request_uses_camel_case() {
        let req: VoteRequest = serde_json::from_str(r#"{"voteType":"noVote"}"#).unwrap();
        assert_eq!(req.vote_type, VoteType::NoVote);
        let req: VoteRequest = serde_json::from_str(r#"{"voteType":"upvote"}"#).unwrap();
        assert_eq!(req.vote_type, VoteType::Upvote);
    }

    #[test]
    fn db_round_trip_of_stored_values() {
        assert_eq!(VoteType::from_db(Some("downvote")), VoteType::Downvote);
        assert_eq!(VoteType::from_db(None), VoteType::NoVote);
        assert_eq!(VoteType::NoVote.as_db(), None);
    }
}
