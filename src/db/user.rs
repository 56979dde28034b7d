use super::DBClient;
use crate::models::User;

const USER_COLUMNS: &str = "id, username, email, password, first_name, last_name, avatar_url, \
     bio, website_url, city, country, created_at, updated_at";

/// Profile fields a user may change. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub website_url: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

/// User database operations trait
pub trait UserExt {
    /// Get single user by ID, username or email (first one given wins)
    /// Returns Option - Some(user) if found, None if not found
    async fn get_user(
        &self,
        user_id: Option<i64>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error>;

    /// Get paginated list of all users, oldest first
    async fn get_users(&self, page: i64, per_page: i64) -> Result<Vec<User>, sqlx::Error>;

    async fn get_user_count(&self) -> Result<i64, sqlx::Error>;

    async fn save_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error>;

    async fn update_user_profile(
        &self,
        user_id: i64,
        update: &ProfileUpdate,
    ) -> Result<User, sqlx::Error>;

    /// Soft delete. RowNotFound if the user is missing or already deleted.
    async fn delete_user(&self, user_id: i64) -> Result<(), sqlx::Error>;
}

impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<i64>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            let query = format!(
                "SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL",
                USER_COLUMNS
            );
            user = sqlx::query_as::<_, User>(&query)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        } else if let Some(username) = username {
            let query = format!(
                "SELECT {} FROM users WHERE username = $1 AND deleted_at IS NULL",
                USER_COLUMNS
            );
            user = sqlx::query_as::<_, User>(&query)
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        } else if let Some(email) = email {
            let query = format!(
                "SELECT {} FROM users WHERE email = $1 AND deleted_at IS NULL",
                USER_COLUMNS
            );
            user = sqlx::query_as::<_, User>(&query)
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        }

        Ok(user)
    }

    async fn get_users(&self, page: i64, per_page: i64) -> Result<Vec<User>, sqlx::Error> {
        // page 1 = offset 0
        let offset = (page - 1).saturating_mul(per_page);

        let query = format!(
            r#"
            SELECT {} FROM users
            WHERE deleted_at IS NULL
            ORDER BY created_at ASC, id ASC
            LIMIT $1 OFFSET $2
            "#,
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&query)
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_user_count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await
    }

    async fn save_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO users (username, email, password)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .bind(email)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .await
    }

    async fn update_user_profile(
        &self,
        user_id: i64,
        update: &ProfileUpdate,
    ) -> Result<User, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE users
            SET first_name = COALESCE($1, first_name),
                last_name = COALESCE($2, last_name),
                avatar_url = COALESCE($3, avatar_url),
                bio = COALESCE($4, bio),
                website_url = COALESCE($5, website_url),
                city = COALESCE($6, city),
                country = COALESCE($7, country),
                updated_at = NOW()
            WHERE id = $8 AND deleted_at IS NULL
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&update.first_name)
            .bind(&update.last_name)
            .bind(&update.avatar_url)
            .bind(&update.bio)
            .bind(&update.website_url)
            .bind(&update.city)
            .bind(&update.country)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn delete_user(&self, user_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
