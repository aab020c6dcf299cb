use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::jobs::SortOrder;
use crate::users::model::{NewUser, User};

#[derive(Clone)]
pub struct UsersRepo {
    pool: PgPool,
}

impl UsersRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user: NewUser) -> anyhow::Result<User> {
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                username, email, full_name, is_client, is_technician,
                latitude, longitude, api_token
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(user.username)
        .bind(user.email)
        .bind(user.full_name)
        .bind(user.is_client)
        .bind(user.is_technician)
        .bind(user.latitude)
        .bind(user.longitude)
        .bind(token)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn by_token(&self, token: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE api_token = $1 AND is_deleted = FALSE",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND is_deleted = FALSE")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_technician(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE id = $1 AND is_technician = TRUE AND is_deleted = FALSE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(user)
    }

    pub async fn count_technicians(&self) -> anyhow::Result<i64> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE is_technician = TRUE AND is_deleted = FALSE",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(n)
    }

    /// One page of active technicians ordered by `updated_at`, ties broken by id.
    pub async fn list_technicians(
        &self,
        order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<User>> {
        let sql = match order {
            SortOrder::Asc => {
                r#"
                SELECT * FROM users
                WHERE is_technician = TRUE AND is_deleted = FALSE
                ORDER BY updated_at ASC, id ASC
                LIMIT $1 OFFSET $2
                "#
            }
            SortOrder::Desc => {
                r#"
                SELECT * FROM users
                WHERE is_technician = TRUE AND is_deleted = FALSE
                ORDER BY updated_at DESC, id DESC
                LIMIT $1 OFFSET $2
                "#
            }
        };

        let rows = sqlx::query_as::<_, User>(sql)
            .bind(limit.clamp(1, 500))
            .bind(offset.max(0))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn by_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
