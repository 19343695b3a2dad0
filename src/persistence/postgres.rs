//! PostgreSQL implementation of the document store.
//!
//! An event's sessions live in one JSONB column next to a `version`
//! counter, so the whole list is rewritten with a single conditional
//! `UPDATE`. A [`SeatCommit`] runs in one transaction: the session rewrite,
//! the enrollment upsert on the deterministic key (only over a row that is
//! not confirmed) or delete, and the bump of the user's `user_schedules`
//! row. A child event write runs in one transaction with the bump of its
//! parent's version. Any precondition that affects zero rows rolls the
//! transaction back and reports [`GatewayError::TransactionConflict`].

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use super::models::{EnrollmentRow, EventRow, UserRow};
use super::{DocumentStore, EnrollmentWrite, ParentGuard, SeatCommit, UserSchedule, Versioned};
use crate::config::GatewayConfig;
use crate::domain::{Enrollment, EnrollmentId, Event, EventId, User, UserId};
use crate::error::GatewayError;
use crate::query::{EventQuery, ParentFilter, UserQuery};

const EVENT_COLUMNS: &str = "id, parent_id, name, description, location, visibility, \
     allowed_courses, allowed_classes, sessions, created_by, created_at, version";

const ENROLLMENT_COLUMNS: &str = "id, user_id, event_id, session_id, status, enrolled_at";

const USER_COLUMNS: &str =
    "id, email, display_name, roll_number, role, course_id, class_id, created_at";

/// PostgreSQL-backed [`DocumentStore`] using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool from the gateway configuration and applies
    /// pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StoreUnavailable`] if the database cannot be
    /// reached or a migration fails.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| GatewayError::StoreUnavailable(format!("migration failed: {e}")))?;

        tracing::info!("postgres store ready");
        Ok(Self::new(pool))
    }

    async fn bump_schedule(
        tx: &mut Transaction<'_, Postgres>,
        user_id: &UserId,
        expected: u64,
    ) -> Result<(), GatewayError> {
        let expected = i64::try_from(expected)
            .map_err(|_| GatewayError::Internal("schedule version overflow".to_string()))?;
        let result = if expected == 0 {
            sqlx::query(
                "INSERT INTO user_schedules (user_id, version) VALUES ($1, 1) \
                 ON CONFLICT (user_id) DO NOTHING",
            )
            .bind(user_id.as_str())
            .execute(&mut **tx)
            .await?
        } else {
            sqlx::query(
                "UPDATE user_schedules SET version = version + 1 \
                 WHERE user_id = $1 AND version = $2",
            )
            .bind(user_id.as_str())
            .bind(expected)
            .execute(&mut **tx)
            .await?
        };
        if result.rows_affected() == 0 {
            return Err(GatewayError::TransactionConflict);
        }
        Ok(())
    }

    async fn apply_commit(
        tx: &mut Transaction<'_, Postgres>,
        commit: &SeatCommit,
    ) -> Result<(), GatewayError> {
        Self::bump_schedule(tx, &commit.user_id, commit.expected_schedule_version).await?;

        if let Some(update) = &commit.sessions {
            let expected = i64::try_from(update.expected_version)
                .map_err(|_| GatewayError::Internal("event version overflow".to_string()))?;
            let result = sqlx::query(
                "UPDATE events SET sessions = $1, version = version + 1 \
                 WHERE id = $2 AND version = $3",
            )
            .bind(Json(&update.sessions))
            .bind(update.event_id.as_uuid())
            .bind(expected)
            .execute(&mut **tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(GatewayError::TransactionConflict);
            }
        }

        let result = match &commit.enrollment {
            EnrollmentWrite::Insert(enrollment) => {
                sqlx::query(
                    "INSERT INTO enrollments (id, user_id, event_id, session_id, status, enrolled_at) \
                     VALUES ($1, $2, $3, $4, $5, $6) \
                     ON CONFLICT (id) DO UPDATE SET user_id = EXCLUDED.user_id, \
                     event_id = EXCLUDED.event_id, session_id = EXCLUDED.session_id, \
                     status = EXCLUDED.status, enrolled_at = EXCLUDED.enrolled_at \
                     WHERE enrollments.status <> 'confirmed'",
                )
                .bind(enrollment.id.as_str())
                .bind(enrollment.user_id.as_str())
                .bind(enrollment.event_id.as_uuid())
                .bind(enrollment.session_id.as_uuid())
                .bind(enrollment.status.as_str())
                .bind(enrollment.enrolled_at)
                .execute(&mut **tx)
                .await?
            }
            EnrollmentWrite::Delete(id) => {
                sqlx::query("DELETE FROM enrollments WHERE id = $1")
                    .bind(id.as_str())
                    .execute(&mut **tx)
                    .await?
            }
        };
        if result.rows_affected() == 0 {
            return Err(GatewayError::TransactionConflict);
        }
        Ok(())
    }

    /// Bumps the parent's version if it is still top-level and at the
    /// observed version. The row lock it takes serializes the child write
    /// against a concurrent delete or edit of the parent.
    async fn guard_parent(
        tx: &mut Transaction<'_, Postgres>,
        guard: Option<ParentGuard>,
    ) -> Result<(), GatewayError> {
        let Some(guard) = guard else {
            return Ok(());
        };
        let expected = i64::try_from(guard.expected_version)
            .map_err(|_| GatewayError::Internal("event version overflow".to_string()))?;
        let result = sqlx::query(
            "UPDATE events SET version = version + 1 \
             WHERE id = $1 AND parent_id IS NULL AND version = $2",
        )
        .bind(guard.parent_id.as_uuid())
        .bind(expected)
        .execute(&mut **tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(GatewayError::TransactionConflict);
        }
        Ok(())
    }

    async fn write_new_event(
        tx: &mut Transaction<'_, Postgres>,
        event: &Event,
        parent: Option<ParentGuard>,
    ) -> Result<(), GatewayError> {
        Self::guard_parent(tx, parent).await?;

        let (courses, classes) = scope_columns(event);
        let result = sqlx::query(
            "INSERT INTO events (id, parent_id, name, description, location, visibility, \
             allowed_courses, allowed_classes, sessions, created_by, created_at, version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 1) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(event.id.as_uuid())
        .bind(event.parent_id.map(uuid::Uuid::from))
        .bind(&event.name)
        .bind(&event.description)
        .bind(&event.location)
        .bind(event.visibility.as_str())
        .bind(&courses)
        .bind(&classes)
        .bind(Json(&event.sessions))
        .bind(event.created_by.as_str())
        .bind(event.created_at)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::InvalidRequest(format!(
                "event {} already exists",
                event.id
            )));
        }
        Ok(())
    }

    async fn write_replacement(
        tx: &mut Transaction<'_, Postgres>,
        event: &Event,
        expected_version: u64,
        parent: Option<ParentGuard>,
    ) -> Result<u64, GatewayError> {
        let expected = i64::try_from(expected_version)
            .map_err(|_| GatewayError::Internal("event version overflow".to_string()))?;
        // Parent before child, the same lock order as `delete_event_tree`.
        Self::guard_parent(tx, parent).await?;

        let (courses, classes) = scope_columns(event);
        let version = sqlx::query_scalar::<_, i64>(
            "UPDATE events SET parent_id = $2, name = $3, description = $4, location = $5, \
             visibility = $6, allowed_courses = $7, allowed_classes = $8, sessions = $9, \
             version = version + 1 \
             WHERE id = $1 AND version = $10 RETURNING version",
        )
        .bind(event.id.as_uuid())
        .bind(event.parent_id.map(uuid::Uuid::from))
        .bind(&event.name)
        .bind(&event.description)
        .bind(&event.location)
        .bind(event.visibility.as_str())
        .bind(&courses)
        .bind(&classes)
        .bind(Json(&event.sessions))
        .bind(expected)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(version) = version else {
            let exists =
                sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM events WHERE id = $1)")
                    .bind(event.id.as_uuid())
                    .fetch_one(&mut **tx)
                    .await?;
            return Err(if exists {
                GatewayError::TransactionConflict
            } else {
                GatewayError::EventNotFound(event.id)
            });
        };
        u64::try_from(version)
            .map_err(|_| GatewayError::Internal("negative event version".to_string()))
    }
}

fn scope_columns(event: &Event) -> (Vec<String>, Vec<String>) {
    (
        event.allowed_courses.iter().map(|c| c.as_str().to_string()).collect(),
        event.allowed_classes.iter().map(|c| c.as_str().to_string()).collect(),
    )
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn insert_event(
        &self,
        event: &Event,
        parent: Option<ParentGuard>,
    ) -> Result<(), GatewayError> {
        let mut tx = self.pool.begin().await?;
        match Self::write_new_event(&mut tx, event, parent).await {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(err) => {
                tx.rollback().await?;
                Err(err)
            }
        }
    }

    async fn get_event(&self, id: EventId) -> Result<Option<Versioned<Event>>, GatewayError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Versioned::try_from).transpose()
    }

    async fn replace_event(
        &self,
        event: &Event,
        expected_version: u64,
        parent: Option<ParentGuard>,
    ) -> Result<u64, GatewayError> {
        let mut tx = self.pool.begin().await?;
        match Self::write_replacement(&mut tx, event, expected_version, parent).await {
            Ok(version) => {
                tx.commit().await?;
                Ok(version)
            }
            Err(err) => {
                tx.rollback().await?;
                Err(err)
            }
        }
    }

    async fn delete_event_tree(&self, id: EventId) -> Result<Vec<EventId>, GatewayError> {
        let mut tx = self.pool.begin().await?;
        let parent = sqlx::query_scalar::<_, uuid::Uuid>("DELETE FROM events WHERE id = $1 RETURNING id")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        if parent.is_none() {
            tx.rollback().await?;
            return Ok(Vec::new());
        }
        let children = sqlx::query_scalar::<_, uuid::Uuid>(
            "DELETE FROM events WHERE parent_id = $1 RETURNING id",
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let mut removed = Vec::with_capacity(children.len() + 1);
        removed.push(id);
        removed.extend(children.into_iter().map(EventId::from_uuid));
        Ok(removed)
    }

    async fn find_events(&self, query: &EventQuery) -> Result<Vec<Event>, GatewayError> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {EVENT_COLUMNS} FROM events WHERE TRUE"));
        if let Some(visibility) = query.visibility {
            qb.push(" AND visibility = ").push_bind(visibility.as_str());
        }
        if let Some(course) = &query.course {
            qb.push(" AND ")
                .push_bind(course.as_str().to_string())
                .push(" = ANY(allowed_courses)");
        }
        if let Some(class) = &query.class {
            qb.push(" AND ")
                .push_bind(class.as_str().to_string())
                .push(" = ANY(allowed_classes)");
        }
        match query.parent {
            ParentFilter::Any => {}
            ParentFilter::TopLevel => {
                qb.push(" AND parent_id IS NULL");
            }
            ParentFilter::ChildOf(parent) => {
                qb.push(" AND parent_id = ").push_bind(*parent.as_uuid());
            }
        }
        if let Some(after) = &query.after {
            qb.push(" AND (created_at, id) < (")
                .push_bind(after.created_at)
                .push(", ")
                .push_bind(*after.id.as_uuid())
                .push(")");
        }
        qb.push(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ")
                .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = qb.build_query_as::<EventRow>().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| Versioned::try_from(row).map(|v| v.value))
            .collect()
    }

    async fn get_enrollment(&self, id: &EnrollmentId) -> Result<Option<Enrollment>, GatewayError> {
        let row = sqlx::query_as::<_, EnrollmentRow>(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Enrollment::try_from).transpose()
    }

    async fn user_schedule(&self, user_id: &UserId) -> Result<UserSchedule, GatewayError> {
        // Version first: any enrollment change committed after this read
        // bumps it, so a commit conditioned on it cannot miss that change.
        let version = sqlx::query_scalar::<_, i64>(
            "SELECT version FROM user_schedules WHERE user_id = $1",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?
        .unwrap_or(0);

        let rows = sqlx::query_as::<_, EnrollmentRow>(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments \
             WHERE user_id = $1 AND status = 'confirmed' ORDER BY enrolled_at"
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(UserSchedule {
            version: u64::try_from(version).unwrap_or(0),
            enrollments: rows
                .into_iter()
                .map(Enrollment::try_from)
                .collect::<Result<_, _>>()?,
        })
    }

    async fn enrollments_for_event(
        &self,
        event_id: EventId,
    ) -> Result<Vec<Enrollment>, GatewayError> {
        let rows = sqlx::query_as::<_, EnrollmentRow>(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE event_id = $1 ORDER BY enrolled_at"
        ))
        .bind(event_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Enrollment::try_from).collect()
    }

    async fn commit_seat(&self, commit: &SeatCommit) -> Result<(), GatewayError> {
        let mut tx = self.pool.begin().await?;
        match Self::apply_commit(&mut tx, commit).await {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(err) => {
                tx.rollback().await?;
                Err(err)
            }
        }
    }

    async fn upsert_user(&self, user: &User) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO users (id, email, display_name, roll_number, role, course_id, class_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email, \
             display_name = EXCLUDED.display_name, roll_number = EXCLUDED.roll_number, \
             role = EXCLUDED.role, course_id = EXCLUDED.course_id, class_id = EXCLUDED.class_id",
        )
        .bind(user.id.as_str())
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(user.roll_number.as_deref())
        .bind(user.role.as_str())
        .bind(user.course_id.as_ref().map(|c| c.as_str()))
        .bind(user.class_id.as_ref().map(|c| c.as_str()))
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, GatewayError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn find_users(&self, query: &UserQuery) -> Result<Vec<User>, GatewayError> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE TRUE"));
        if let Some(course) = &query.course {
            qb.push(" AND course_id = ")
                .push_bind(course.as_str().to_string());
        }
        if let Some(class) = &query.class {
            qb.push(" AND class_id = ").push_bind(class.as_str().to_string());
        }
        if let Some(after) = &query.after {
            qb.push(" AND (email, id) > (")
                .push_bind(after.email.clone())
                .push(", ")
                .push_bind(after.id.as_str().to_string())
                .push(")");
        }
        qb.push(" ORDER BY email ASC, id ASC");
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ")
                .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = qb.build_query_as::<UserRow>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}
