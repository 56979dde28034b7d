use crate::models::{Media, OwnerType, Post, Tag, User, Visibility};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

// DTOs (Data Transfer Objects) define the structure of data exchanged with clients
// They are separate from database models to control exactly what data is exposed

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PER_PAGE: i64 = 10;
pub const MAX_PER_PAGE: i64 = 100;
pub const MAX_PAGE: i64 = 1_000_000;

// ============================================================================
// Response envelope
// ============================================================================

/// Success envelope shared by every handler
///
/// ```text
/// { "type": "success", "message": "...", "data": ..., "meta": {...} }
/// ```
/// Errors use the same `type`/`message` pair, see `error::ErrorResponse`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PaginationMeta>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        ApiResponse {
            kind: "success".to_string(),
            message: message.into(),
            data: Some(data),
            meta: None,
        }
    }

    pub fn paginated(message: impl Into<String>, data: T, meta: PaginationMeta) -> Self {
        ApiResponse {
            kind: "success".to_string(),
            message: message.into(),
            data: Some(data),
            meta: Some(meta),
        }
    }
}

impl ApiResponse<()> {
    /// Envelope without a payload, e.g. after a delete
    pub fn message(message: impl Into<String>) -> Self {
        ApiResponse {
            kind: "success".to_string(),
            message: message.into(),
            data: None,
            meta: None,
        }
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// `?page=&per_page=` query parameters
#[derive(Serialize, Deserialize, Validate, Debug, Default)]
pub struct PaginationQuery {
    #[validate(range(min = 1, max = 1_000_000, message = "Page must be between 1 and 1000000"))]
    pub page: Option<i64>,

    #[validate(range(min = 1, max = 100, message = "per_page must be between 1 and 100"))]
    pub per_page: Option<i64>,
}

impl PaginationQuery {
    /// (page, per_page) with defaults applied
    pub fn resolve(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
        let per_page = self
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        (page, per_page)
    }
}

/// Pagination metadata sent in the envelope's `meta`
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PaginationMeta {
    pub page: i64,
    pub per_page: i64,
    pub sort: String,
    pub total_records: i64,
    pub total_pages: i64,
    pub remaining: i64, // records after this page, never negative
}

impl PaginationMeta {
    pub fn new(page: i64, per_page: i64, total_records: i64) -> Self {
        let per_page = per_page.max(1);
        let total_pages = total_records.saturating_add(per_page - 1) / per_page;
        let remaining = total_records
            .saturating_sub(page.saturating_mul(per_page))
            .max(0);

        PaginationMeta {
            page,
            per_page,
            sort: "created_at asc".to_string(),
            total_records,
            total_pages,
            remaining,
        }
    }
}

// ============================================================================
// Authentication DTOs
// ============================================================================

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct RegisterUserDto {
    #[validate(length(
        min = 3,
        max = 32,
        message = "Username must be between 3 and 32 characters"
    ))]
    pub username: String,

    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Login request - accepts email or username
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginUserDto {
    #[validate(length(min = 1, message = "Email or username is required"))]
    pub identifier: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthData {
    pub token: String,
    pub user: FilterUserDto,
}

// ============================================================================
// User DTOs
// ============================================================================

/// Partial profile update; absent fields are left as they are.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateUserDto {
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[validate(url(message = "Avatar URL is invalid"))]
    pub avatar_url: Option<String>,
    #[validate(length(max = 1000))]
    pub bio: Option<String>,
    #[validate(url(message = "Website URL is invalid"))]
    pub website_url: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
}

/// User data sent to clients, without the password hash
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FilterUserDto {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub website_url: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FilterUserDto {
    pub fn filter_user(user: &User) -> Self {
        FilterUserDto {
            id: user.id,
            username: user.username.to_owned(),
            email: user.email.to_owned(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            avatar_url: user.avatar_url.clone(),
            bio: user.bio.clone(),
            website_url: user.website_url.clone(),
            city: user.city.clone(),
            country: user.country.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }

    pub fn filter_users(users: &[User]) -> Vec<FilterUserDto> {
        users.iter().map(FilterUserDto::filter_user).collect()
    }
}

// ============================================================================
// Association inputs
// ============================================================================

/// A user mentioned in a post or comment body
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MentionInput {
    #[validate(range(min = 1, message = "Mentioned user id must be positive"))]
    pub user_id: i64,
    #[serde(default)]
    pub position: i32,
}

/// Reference to a previously uploaded media row
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MediaRef {
    #[validate(range(min = 1, message = "Media id must be positive"))]
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HashtagInput {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Hashtag must be between 1 and 100 characters"
    ))]
    pub title: String,
}

// ============================================================================
// Post DTOs
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreatePostDto {
    #[validate(length(min = 20, message = "Title must be at least 20 characters"))]
    pub title: String,

    #[validate(length(min = 40, message = "Body must be at least 40 characters"))]
    pub body: String,

    #[validate(
        length(min = 1, max = 5, message = "A post needs between 1 and 5 hashtags"),
        nested
    )]
    #[serde(default)]
    pub hashtags: Vec<HashtagInput>,

    #[validate(length(max = 15, message = "At most 15 mentions"), nested)]
    #[serde(default)]
    pub mentions: Vec<MentionInput>,

    #[validate(length(max = 15, message = "At most 15 medias"), nested)]
    #[serde(default)]
    pub medias: Vec<MediaRef>,

    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub is_promoted: bool,
    pub promotion_expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_featured: bool,
    pub featured_expiry: Option<DateTime<Utc>>,
}

/// Visibility and promotion flags (`PUT /posts/{id}`)
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdatePostSettingsDto {
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub is_promoted: bool,
    pub promotion_expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_featured: bool,
    pub featured_expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdatePostTitleDto {
    #[validate(length(min = 20, message = "Title must be at least 20 characters"))]
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdatePostBodyDto {
    #[validate(length(min = 40, message = "Body must be at least 40 characters"))]
    pub body: String,

    #[validate(length(max = 15, message = "At most 15 mentions"), nested)]
    #[serde(default)]
    pub mentions: Vec<MentionInput>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdatePostMediaDto {
    #[validate(length(max = 15, message = "At most 15 medias"), nested)]
    #[serde(default)]
    pub medias: Vec<MediaRef>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdatePostHashtagsDto {
    #[validate(length(max = 5, message = "At most 5 hashtags"), nested)]
    #[serde(default)]
    pub hashtags: Vec<HashtagInput>,
}

/// Post row joined with its author
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostWithAuthor {
    #[sqlx(flatten)]
    pub post: Post,
    pub user_username: String,
    pub user_avatar_url: Option<String>,
}

/// Full post sent to clients: the post, its author and its associations
#[derive(Debug, Serialize, Deserialize)]
pub struct PostDto {
    #[serde(flatten)]
    pub post: Post,
    pub user_username: String,
    pub user_avatar_url: Option<String>,
    pub medias: Vec<Media>,
    pub mentions: Vec<MentionDto>,
    pub hashtags: Vec<Tag>,
}

impl PostDto {
    pub fn without_associations(row: PostWithAuthor) -> Self {
        PostDto {
            post: row.post,
            user_username: row.user_username,
            user_avatar_url: row.user_avatar_url,
            medias: Vec::new(),
            mentions: Vec::new(),
            hashtags: Vec::new(),
        }
    }
}

/// Mention joined with the mentioned user's name
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MentionDto {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub owner_id: i64,
    pub owner_type: OwnerType,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// Tag row tagged with the post it is attached to, for batch loads
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostTagRow {
    pub post_id: i64,
    #[sqlx(flatten)]
    pub tag: Tag,
}

// ============================================================================
// Comment DTOs
// ============================================================================

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateCommentDto {
    #[validate(length(min = 1, message = "Body is required"))]
    pub body: String,

    pub parent_id: Option<i64>,

    #[validate(length(max = 15, message = "At most 15 mentions"), nested)]
    #[serde(default)]
    pub mentions: Vec<MentionInput>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct UpdateCommentDto {
    #[validate(length(min = 40, message = "Body must be at least 40 characters"))]
    pub body: String,

    #[validate(length(max = 15, message = "At most 15 mentions"), nested)]
    #[serde(default)]
    pub mentions: Vec<MentionInput>,
}

/// Comment with author and like count
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentDto {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub body: String,
    pub user_username: String,
    pub user_avatar_url: Option<String>,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A comment and its nested replies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentThreadDto {
    #[serde(flatten)]
    pub comment: CommentDto,
    pub replies: Vec<CommentThreadDto>,
}

// ============================================================================
// Like & Media DTOs
// ============================================================================

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateLikeDto {
    #[validate(range(min = 1, message = "likeable_id must be positive"))]
    pub likeable_id: i64,
    pub likeable_type: OwnerType,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikeToggleDto {
    pub liked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub like: Option<crate::models::Like>,
}

/// One stored file of a multipart upload
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadMediaResponse {
    pub id: i64,
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub filename: String,
    pub size: i64,
}

impl From<&Media> for UploadMediaResponse {
    fn from(media: &Media) -> Self {
        UploadMediaResponse {
            id: media.id,
            url: media.url.clone(),
            media_type: media.media_type.clone(),
            filename: media.filename.clone(),
            size: media.size,
        }
    }
}
