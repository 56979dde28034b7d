use super::DBClient;
use crate::dtos::{MentionDto, PostTagRow, PostWithAuthor};
use crate::models::{Media, OwnerType};

// Post joined with its author
const POST_WITH_AUTHOR_SELECT: &str = r#"
    SELECT p.id, p.user_id, p.title, p.body, p.visibility, p.is_promoted, p.promotion_expiry,
           p.is_featured, p.featured_expiry, p.like_count, p.comment_count, p.view_count,
           p.share_count, p.created_at, p.updated_at,
           u.username AS user_username, u.avatar_url AS user_avatar_url
    FROM posts p
    INNER JOIN users u ON p.user_id = u.id
"#;

/// Read-side queries that assemble posts for presentation.
///
/// Associations are fetched in one query per kind for a whole page of
/// owners (`= ANY($1)`) instead of once per post.
pub trait FeedExt {
    async fn get_posts(&self, page: i64, per_page: i64)
    -> Result<Vec<PostWithAuthor>, sqlx::Error>;

    async fn get_post_count(&self) -> Result<i64, sqlx::Error>;

    async fn get_post_with_author(
        &self,
        post_id: i64,
    ) -> Result<Option<PostWithAuthor>, sqlx::Error>;

    async fn get_media_for_owners(
        &self,
        kind: OwnerType,
        owner_ids: &[i64],
    ) -> Result<Vec<Media>, sqlx::Error>;

    async fn get_mentions_for_owners(
        &self,
        kind: OwnerType,
        owner_ids: &[i64],
    ) -> Result<Vec<MentionDto>, sqlx::Error>;

    async fn get_tags_for_posts(&self, post_ids: &[i64]) -> Result<Vec<PostTagRow>, sqlx::Error>;
}

impl FeedExt for DBClient {
    async fn get_posts(
        &self,
        page: i64,
        per_page: i64,
    ) -> Result<Vec<PostWithAuthor>, sqlx::Error> {
        let offset = (page - 1).saturating_mul(per_page);

        let query = format!(
            r#"{}
            WHERE p.deleted_at IS NULL
            ORDER BY p.created_at ASC, p.id ASC
            LIMIT $1 OFFSET $2
            "#,
            POST_WITH_AUTHOR_SELECT
        );
        sqlx::query_as::<_, PostWithAuthor>(&query)
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_post_count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await
    }

    async fn get_post_with_author(
        &self,
        post_id: i64,
    ) -> Result<Option<PostWithAuthor>, sqlx::Error> {
        let query = format!(
            "{} WHERE p.id = $1 AND p.deleted_at IS NULL",
            POST_WITH_AUTHOR_SELECT
        );
        sqlx::query_as::<_, PostWithAuthor>(&query)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_media_for_owners(
        &self,
        kind: OwnerType,
        owner_ids: &[i64],
    ) -> Result<Vec<Media>, sqlx::Error> {
        sqlx::query_as::<_, Media>(
            r#"
            SELECT id, url, media_type, filename, size, user_id, owner_id, owner_type, created_at
            FROM medias
            WHERE owner_type = $1 AND owner_id = ANY($2) AND deleted_at IS NULL
            ORDER BY id ASC
            "#,
        )
        .bind(kind)
        .bind(owner_ids)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_mentions_for_owners(
        &self,
        kind: OwnerType,
        owner_ids: &[i64],
    ) -> Result<Vec<MentionDto>, sqlx::Error> {
        sqlx::query_as::<_, MentionDto>(
            r#"
            SELECT m.id, m.user_id, u.username, m.owner_id, m.owner_type, m.position, m.created_at
            FROM mentions m
            INNER JOIN users u ON m.user_id = u.id
            WHERE m.owner_type = $1 AND m.owner_id = ANY($2) AND m.deleted_at IS NULL
            ORDER BY m.position ASC, m.id ASC
            "#,
        )
        .bind(kind)
        .bind(owner_ids)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_tags_for_posts(&self, post_ids: &[i64]) -> Result<Vec<PostTagRow>, sqlx::Error> {
        sqlx::query_as::<_, PostTagRow>(
            r#"
            SELECT ph.post_id, t.id, t.title, t.cover_image, t.description, t.color, t.slug,
                   t.user_id, t.created_at
            FROM post_hashtags ph
            INNER JOIN tags t ON ph.tag_id = t.id
            WHERE ph.post_id = ANY($1) AND t.deleted_at IS NULL
            ORDER BY t.title ASC
            "#,
        )
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await
    }
}
