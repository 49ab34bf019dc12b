//! Forum operations against one tenant database connection.

pub mod analytics;
pub mod bookmarks;
pub mod comments;
pub mod media;
pub mod posts;
pub mod tags;
pub mod users;
pub mod validation;
pub mod votes;

use crate::error::AppError;
use crate::response::Page;
use crate::service::validation::page_limit;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 50;

/// `cursor` and `limit` query parameters of a keyset-paginated listing.
#[derive(Clone, Debug, PartialEq)]
pub struct PageParams {
    pub cursor: Option<Uuid>,
    pub limit: u32,
}

impl PageParams {
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, AppError> {
        let get = |k: &str| params.get(k).map(|s| s.trim()).filter(|s| !s.is_empty());
        Ok(PageParams {
            cursor: parse_cursor(get("cursor"))?,
            limit: page_limit(get("limit"), DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE)?,
        })
    }
}

pub(crate) fn parse_cursor(raw: Option<&str>) -> Result<Option<Uuid>, AppError> {
    raw.map(|s| Uuid::parse_str(s).map_err(|_| AppError::BadRequest("cursor must be a UUID".into())))
        .transpose()
}

/// Sort keys looked up for a cursor. A cursor that matches nothing in the listing is rejected
/// instead of silently restarting from the first page.
pub(crate) fn known_cursor<K>(cursor: Uuid, keys: Option<K>) -> Result<K, AppError> {
    keys.ok_or_else(|| AppError::BadRequest(format!("unknown cursor: {}", cursor)))
}

/// Published items are listed for everyone; hidden ones only reach admins and their authors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    #[default]
    Published,
    Hidden,
}

impl Visibility {
    pub fn as_db(&self) -> &'static str {
        match self {
            Visibility::Published => "published",
            Visibility::Hidden => "hidden",
        }
    }

    pub fn from_db(s: &str) -> Visibility {
        match s {
            "hidden" => Visibility::Hidden,
            _ => Visibility::Published,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub visibility: Visibility,
}

/// Cut a `limit + 1` fetch down to one page; the cursor is the last item kept.
pub(crate) fn into_page<T>(mut rows: Vec<T>, limit: u32, id_of: impl Fn(&T) -> Uuid) -> Page<T> {
    let limit = limit as usize;
    let has_next = rows.len() > limit;
    rows.truncate(limit);
    let next_cursor = if has_next { rows.last().map(&id_of) } else { None };
    Page {
        items: rows,
        next_cursor,
    }
}

/// `%term%` for ILIKE with the pattern metacharacters escaped.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_with_extra_row_has_cursor() {
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let page = into_page(ids.clone(), 3, |id| *id);
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.next_cursor, Some(ids[2]));
    }

    #[test]
    fn last_page_has_no_cursor() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let page = into_page(ids, 3, |id| *id);
        assert_eq!(page.items.len(), 3);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn page_params_parse() {
        let mut q = HashMap::new();
        assert_eq!(PageParams::from_query(&q).unwrap().limit, DEFAULT_PAGE_SIZE);
        let id = Uuid::new_v4();
        q.insert("limit".to_string(), "5".to_string());
        q.insert("cursor".to_string(), id.to_string());
        assert_eq!(PageParams::from_query(&q).unwrap(), PageParams { cursor: Some(id), limit: 5 });

        q.insert("cursor".to_string(), "abc".to_string());
        assert!(matches!(PageParams::from_query(&q), Err(AppError::BadRequest(_))));
        q.remove("cursor");
        q.insert("limit".to_string(), "0".to_string());
        assert!(matches!(PageParams::from_query(&q), Err(AppError::Validation(_))));
    }

    #[test]
    fn unknown_cursor_is_rejected() {
        let id = Uuid::new_v4();
        assert_eq!(known_cursor(id, Some(7)).unwrap(), 7);
        match known_cursor::<i64>(id, None) {
            Err(AppError::BadRequest(msg)) => assert!(msg.contains(&id.to_string())),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn visibility_wire_and_db_forms() {
        let req: VisibilityRequest = serde_json::from_str(r#"{"visibility":"hidden"}"#).unwrap();
        assert_eq!(req.visibility, Visibility::Hidden);
        assert_eq!(Visibility::from_db(Visibility::Hidden.as_db()), Visibility::Hidden);
        assert_eq!(Visibility::from_db("published"), Visibility::Published);
        assert!(serde_json::from_str::<VisibilityRequest>(r#"{"visibility":"secret"}"#).is_err());
    }

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("road"), "%road%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }
}
