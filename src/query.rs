//! Cursor-based pagination and list filters.
//!
//! A [`Cursor`] is an opaque, URL-safe token wrapping the ordering key of
//! the last row of a page. Stores resume strictly after that key, so rows
//! inserted concurrently never shift later pages the way offsets would.
//!
//! Structured filters (visibility, course, class) are evaluated by the
//! store before the limit is applied. Free-text filters run afterwards on
//! the fetched page, so a filtered page can hold fewer than `limit` items
//! while still returning a next cursor: callers keep paging forward.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{ClassId, CourseId, Event, EventId, User, UserId, Visibility};
use crate::error::GatewayError;

/// Opaque pagination token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Encodes an ordering key into a token.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the key cannot be serialized.
    pub fn encode<K: Serialize>(key: &K) -> Result<Self, GatewayError> {
        let json = serde_json::to_vec(key)
            .map_err(|e| GatewayError::Internal(format!("cursor encoding failed: {e}")))?;
        Ok(Self(URL_SAFE_NO_PAD.encode(json)))
    }

    /// Decodes the ordering key carried by this token.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for tokens that were not
    /// produced by [`Cursor::encode`] with the same key type.
    pub fn decode<K: DeserializeOwned>(&self) -> Result<K, GatewayError> {
        let invalid = || GatewayError::InvalidRequest("invalid cursor".to_string());
        let bytes = URL_SAFE_NO_PAD.decode(&self.0).map_err(|_| invalid())?;
        serde_json::from_slice(&bytes).map_err(|_| invalid())
    }

    /// Wraps a token received from a client.
    #[must_use]
    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Ordering key of the event list: newest first, id as tie-breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCursorKey {
    /// Creation time of the last row.
    pub created_at: DateTime<Utc>,
    /// Id of the last row.
    pub id: EventId,
}

impl EventCursorKey {
    /// Key of the given event.
    #[must_use]
    pub fn of(event: &Event) -> Self {
        Self {
            created_at: event.created_at,
            id: event.id,
        }
    }

    /// Returns `true` if `event` sorts strictly after this key in
    /// `(created_at DESC, id DESC)` order.
    #[must_use]
    pub fn precedes(&self, event: &Event) -> bool {
        (event.created_at, event.id) < (self.created_at, self.id)
    }
}

/// Ordering key of the user list: email ascending, id as tie-breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCursorKey {
    /// Email of the last row.
    pub email: String,
    /// Id of the last row.
    pub id: UserId,
}

impl UserCursorKey {
    /// Key of the given user.
    #[must_use]
    pub fn of(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            id: user.id.clone(),
        }
    }

    /// Returns `true` if `user` sorts strictly after this key in
    /// `(email ASC, id ASC)` order.
    #[must_use]
    pub fn precedes(&self, user: &User) -> bool {
        (user.email.as_str(), &user.id) > (self.email.as_str(), &self.id)
    }
}

/// Page size and position requested by a caller.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    /// Maximum number of rows to fetch.
    pub limit: usize,
    /// Resume point; `None` for the first page.
    pub cursor: Option<Cursor>,
}

impl PageRequest {
    /// First page of the given size.
    #[must_use]
    pub const fn first(limit: usize) -> Self {
        Self {
            limit,
            cursor: None,
        }
    }

    /// Page of the given size resuming after `cursor`.
    #[must_use]
    pub const fn after(limit: usize, cursor: Cursor) -> Self {
        Self {
            limit,
            cursor: Some(cursor),
        }
    }

    /// Clamps the limit to `[1, max]`.
    #[must_use]
    pub fn clamped(mut self, max: usize) -> Self {
        self.limit = self.limit.clamp(1, max.max(1));
        self
    }
}

/// One page of results plus the token for the next one.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Page<T> {
    /// Rows of this page (after text filtering).
    pub data: Vec<T>,
    /// Token for the next page; absent on the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

/// Structured and free-text filters for the event list.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Substring matched against name and description, case-insensitive.
    pub search: Option<String>,
    /// Only events with this visibility.
    pub visibility: Option<Visibility>,
    /// Only events whose allowed courses include this course.
    pub course: Option<CourseId>,
}

/// Restriction on the parent linkage of listed events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParentFilter {
    /// Parents and children alike.
    #[default]
    Any,
    /// Only top-level events.
    TopLevel,
    /// Only children of the given parent.
    ChildOf(EventId),
}

/// Store-level event query: structured predicates, ordering resume point
/// and an optional row limit.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    /// Only events with this visibility.
    pub visibility: Option<Visibility>,
    /// Only events whose allowed courses include this course.
    pub course: Option<CourseId>,
    /// Only events whose allowed classes include this class.
    pub class: Option<ClassId>,
    /// Parent linkage restriction.
    pub parent: ParentFilter,
    /// Resume strictly after this key.
    pub after: Option<EventCursorKey>,
    /// Maximum number of rows; `None` for all.
    pub limit: Option<usize>,
}

impl EventQuery {
    /// Returns `true` if the event satisfies the structured predicates
    /// (ordering and limit are not considered).
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if self.visibility.is_some_and(|v| v != event.visibility) {
            return false;
        }
        if let Some(course) = &self.course
            && !event.allowed_courses.contains(course)
        {
            return false;
        }
        if let Some(class) = &self.class
            && !event.allowed_classes.contains(class)
        {
            return false;
        }
        match self.parent {
            ParentFilter::Any => {}
            ParentFilter::TopLevel if event.parent_id.is_some() => return false,
            ParentFilter::ChildOf(parent) if event.parent_id != Some(parent) => return false,
            ParentFilter::TopLevel | ParentFilter::ChildOf(_) => {}
        }
        self.after.is_none_or(|key| key.precedes(event))
    }
}

/// Structured and free-text filters for the user list.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Substring matched against email, display name and roll number.
    pub search: Option<String>,
    /// Only members of this course.
    pub course: Option<CourseId>,
    /// Only members of this class.
    pub class: Option<ClassId>,
}

/// Store-level user query.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    /// Only members of this course.
    pub course: Option<CourseId>,
    /// Only members of this class.
    pub class: Option<ClassId>,
    /// Resume strictly after this key.
    pub after: Option<UserCursorKey>,
    /// Maximum number of rows; `None` for all.
    pub limit: Option<usize>,
}

impl UserQuery {
    /// Returns `true` if the user satisfies the structured predicates.
    #[must_use]
    pub fn matches(&self, user: &User) -> bool {
        if self.course.is_some() && user.course_id != self.course {
            return false;
        }
        if self.class.is_some() && user.class_id != self.class {
            return false;
        }
        self.after.as_ref().is_none_or(|key| key.precedes(user))
    }
}

/// Turns an over-fetched, ordered row set into a page.
///
/// `rows` must hold up to `limit + 1` rows in list order. The extra row
/// only signals that another page exists; the cursor points at the last
/// row kept. `keep` is the post-fetch text predicate.
///
/// # Errors
///
/// Returns [`GatewayError::Internal`] if the cursor cannot be encoded.
pub fn paginate<T, K, F, P>(
    mut rows: Vec<T>,
    limit: usize,
    key_of: F,
    keep: P,
) -> Result<Page<T>, GatewayError>
where
    K: Serialize,
    F: Fn(&T) -> K,
    P: Fn(&T) -> bool,
{
    let has_more = rows.len() > limit;
    rows.truncate(limit);
    let next_cursor = match rows.last() {
        Some(last) if has_more => Some(Cursor::encode(&key_of(last))?),
        _ => None,
    };
    rows.retain(|row| keep(row));
    Ok(Page {
        data: rows,
        next_cursor,
    })
}

/// Normalizes a free-text search term: trimmed and lowercased, `None` when
/// blank.
#[must_use]
pub fn search_term(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}
