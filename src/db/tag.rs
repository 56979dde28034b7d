use super::DBClient;
use crate::models::Tag;

const TAG_COLUMNS: &str =
    "id, title, cover_image, description, color, slug, user_id, created_at";

pub trait TagExt {
    async fn get_tag_by_title(&self, title: &str) -> Result<Option<Tag>, sqlx::Error>;

    /// Insert a tag owned by `user_id`. If the title was taken in the
    /// meantime the existing row is returned instead of a duplicate,
    /// undeleted if it had been soft-deleted.
    async fn create_tag(&self, title: &str, user_id: i64) -> Result<Tag, sqlx::Error>;

    /// Tags currently attached to a post, ordered by title
    async fn get_post_tags(&self, post_id: i64) -> Result<Vec<Tag>, sqlx::Error>;

    async fn attach_tag(&self, post_id: i64, tag_id: i64) -> Result<(), sqlx::Error>;

    async fn detach_tag(&self, post_id: i64, tag_id: i64) -> Result<(), sqlx::Error>;
}

impl TagExt for DBClient {
    async fn get_tag_by_title(&self, title: &str) -> Result<Option<Tag>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM tags WHERE title = $1 AND deleted_at IS NULL",
            TAG_COLUMNS
        );
        sqlx::query_as::<_, Tag>(&query)
            .bind(title)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create_tag(&self, title: &str, user_id: i64) -> Result<Tag, sqlx::Error> {
        // The update makes RETURNING yield the existing row on conflict and
        // revives it if it was soft-deleted
        let query = format!(
            r#"
            INSERT INTO tags (title, slug, user_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (title) DO UPDATE
                SET title = EXCLUDED.title, deleted_at = NULL, updated_at = NOW()
            RETURNING {}
            "#,
            TAG_COLUMNS
        );
        sqlx::query_as::<_, Tag>(&query)
            .bind(title)
            .bind(slugify(title))
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_post_tags(&self, post_id: i64) -> Result<Vec<Tag>, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            r#"
            SELECT t.id, t.title, t.cover_image, t.description, t.color, t.slug, t.user_id, t.created_at
            FROM tags t
            INNER JOIN post_hashtags ph ON ph.tag_id = t.id
            WHERE ph.post_id = $1 AND t.deleted_at IS NULL
            ORDER BY t.title ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn attach_tag(&self, post_id: i64, tag_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO post_hashtags (post_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(post_id)
        .bind(tag_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn detach_tag(&self, post_id: i64, tag_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM post_hashtags WHERE post_id = $1 AND tag_id = $2")
            .bind(post_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Lowercase, alphanumerics kept, every other run of characters becomes one `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
