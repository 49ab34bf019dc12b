//! Admin dashboard metrics over a trailing window ending now.

use crate::error::AppError;
use chrono::{DateTime, Duration, Months, Utc};
use serde::Serialize;
use sqlx::PgConnection;
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Period {
    #[default]
    Day,
    Week,
    Month,
    Year,
}

impl FromStr for Period {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "year" => Ok(Period::Year),
            other => Err(AppError::BadRequest(format!(
                "period must be day, week, month or year (got {})",
                other
            ))),
        }
    }
}

impl Period {
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, AppError> {
        match params.get("period").map(|s| s.trim()).filter(|s| !s.is_empty()) {
            Some(s) => s.parse(),
            None => Ok(Period::default()),
        }
    }

    /// Start of the window that ends at `end`.
    pub fn start(self, end: DateTime<Utc>) -> DateTime<Utc> {
        let start = match self {
            Period::Day => Some(end - Duration::days(1)),
            Period::Week => Some(end - Duration::days(7)),
            Period::Month => end.checked_sub_months(Months::new(1)),
            Period::Year => end.checked_sub_months(Months::new(12)),
        };
        start.unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// `date_trunc` unit for time series buckets.
    pub fn bucket_unit(self) -> &'static str {
        match self {
            Period::Day => "hour",
            Period::Week | Period::Month => "day",
            Period::Year => "month",
        }
    }

    fn bucket_interval(self) -> &'static str {
        match self {
            Period::Day => "1 hour",
            Period::Week | Period::Month => "1 day",
            Period::Year => "1 month",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub period: Period,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_posts: i64,
    pub total_upvotes: i64,
    pub total_downvotes: i64,
    pub total_comments: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesBucket {
    pub bucket_start: DateTime<Utc>,
    pub bucket_end: DateTime<Utc>,
    pub post_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeries {
    pub period: Period,
    pub buckets: Vec<TimeSeriesBucket>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TagBucket {
    pub tag_id: Uuid,
    pub tag_name: String,
    pub post_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagBreakdown {
    pub period: Period,
    pub tag_buckets: Vec<TagBucket>,
}

#[derive(sqlx::FromRow)]
struct Totals {
    total_posts: i64,
    total_upvotes: i64,
    total_downvotes: i64,
    total_comments: i64,
}

pub async fn summary(conn: &mut PgConnection, period: Period, end: DateTime<Utc>) -> Result<Summary, AppError> {
    let start = period.start(end);
    let totals = sqlx::query_as::<_, Totals>(
        "SELECT \
         (SELECT COUNT(*) FROM posts WHERE NOT is_deleted AND created_at BETWEEN $1 AND $2) AS total_posts, \
         (SELECT COUNT(*) FROM post_votes WHERE vote_type = 'upvote' AND voted_at BETWEEN $1 AND $2) AS total_upvotes, \
         (SELECT COUNT(*) FROM post_votes WHERE vote_type = 'downvote' AND voted_at BETWEEN $1 AND $2) AS total_downvotes, \
         (SELECT COUNT(*) FROM comments WHERE NOT is_deleted AND created_at BETWEEN $1 AND $2) AS total_comments",
    )
    .bind(start)
    .bind(end)
    .fetch_one(&mut *conn)
    .await?;
    Ok(Summary {
        period,
        start,
        end,
        total_posts: totals.total_posts,
        total_upvotes: totals.total_upvotes,
        total_downvotes: totals.total_downvotes,
        total_comments: totals.total_comments,
    })
}

/// Every bucket in the window is returned, including empty ones.
pub async fn time_series(conn: &mut PgConnection, period: Period, end: DateTime<Utc>) -> Result<TimeSeries, AppError> {
    let start = period.start(end);
    let sql = format!(
        "SELECT b.bucket_start, b.bucket_start + INTERVAL '{step}' AS bucket_end, COUNT(p.id) AS post_count \
         FROM generate_series(date_trunc('{unit}', $1::timestamptz), $2::timestamptz, INTERVAL '{step}') AS b(bucket_start) \
         LEFT JOIN posts p ON NOT p.is_deleted \
           AND p.created_at >= GREATEST(b.bucket_start, $1) \
           AND p.created_at < b.bucket_start + INTERVAL '{step}' \
           AND p.created_at <= $2 \
         GROUP BY b.bucket_start \
         ORDER BY b.bucket_start",
        unit = period.bucket_unit(),
        step = period.bucket_interval(),
    );
    let buckets = sqlx::query_as::<_, TimeSeriesBucket>(&sql)
        .bind(start)
        .bind(end)
        .fetch_all(&mut *conn)
        .await?;
    Ok(TimeSeries { period, buckets })
}

pub async fn tag_breakdown(conn: &mut PgConnection, period: Period, end: DateTime<Utc>) -> Result<TagBreakdown, AppError> {
    let start = period.start(end);
    let tag_buckets = sqlx::query_as::<_, TagBucket>(
        "SELECT t.id AS tag_id, t.name AS tag_name, COUNT(p.id) AS post_count \
         FROM tags t \
         JOIN post_tags pt ON pt.tag_id = t.id \
         JOIN posts p ON p.id = pt.post_id \
         WHERE NOT p.is_deleted AND p.created_at BETWEEN $1 AND $2 \
         GROUP BY t.id, t.name \
         ORDER BY post_count DESC, t.name",
    )
    .bind(start)
    .bind(end)
    .fetch_all(&mut *conn)
    .await?;
    Ok(TagBreakdown { period, tag_buckets })
}
