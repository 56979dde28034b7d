use chrono::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of record a polymorphic association points at.
///
/// Mentions, media and likes all carry an `(owner_id, owner_type)` pair.
/// It is stored as the PostgreSQL ENUM `owner_type`, so a client can never
/// smuggle an arbitrary table name through it.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "owner_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OwnerType {
    Posts,
    Comments,
}

impl OwnerType {
    pub fn to_str(&self) -> &str {
        match self {
            OwnerType::Posts => "posts",
            OwnerType::Comments => "comments",
        }
    }

    /// Table holding the records of this kind.
    pub fn table_name(&self) -> &'static str {
        match self {
            OwnerType::Posts => "posts",
            OwnerType::Comments => "comments",
        }
    }
}

/// The `(id, kind)` pair identifying which record an association belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    pub id: i64,
    pub kind: OwnerType,
}

impl Owner {
    pub fn post(id: i64) -> Self {
        Owner {
            id,
            kind: OwnerType::Posts,
        }
    }

    pub fn comment(id: i64) -> Self {
        Owner {
            id,
            kind: OwnerType::Comments,
        }
    }
}

/// Who can see a post. Stored as the PostgreSQL ENUM `post_visibility`.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "post_visibility", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Friends,
}

/// User model representing the users table
///
/// `password` holds the Argon2 hash, never the plain text. Soft-deleted
/// rows (`deleted_at` set) are filtered out by every query, so the column
/// is not mapped here.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
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

/// Post model
///
/// The counters are denormalized and updated best effort next to the
/// write that changes them, never inside a transaction.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub visibility: Visibility,
    pub is_promoted: bool,
    pub promotion_expiry: Option<DateTime<Utc>>,
    pub is_featured: bool,
    pub featured_expiry: Option<DateTime<Utc>>,
    pub like_count: i64,
    pub comment_count: i64,
    pub view_count: i64,
    pub share_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Comment on a post.
///
/// `parent_id` forms a self-referential tree: `None` is a root comment,
/// otherwise it points at another comment of the same post.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Like {
    pub id: i64,
    pub user_id: i64,
    pub likeable_id: i64,
    pub likeable_type: OwnerType,
    pub created_at: DateTime<Utc>,
}

/// One user referenced inside a post or comment body.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Mention {
    pub id: i64,
    pub user_id: i64,
    pub owner_id: i64,
    pub owner_type: OwnerType,
    pub position: i32, // character offset of the mention in the body
    pub created_at: DateTime<Utc>,
}

/// Uploaded file metadata.
///
/// A media row starts unattached (`owner_id`/`owner_type` are `None`) and
/// is attached to a post or comment when that record is saved.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Media {
    pub id: i64,
    pub url: String,
    pub media_type: String,
    pub filename: String,
    pub size: i64,
    pub user_id: i64, // uploader
    pub owner_id: Option<i64>,
    pub owner_type: Option<OwnerType>,
    pub created_at: DateTime<Utc>,
}

impl Media {
    pub fn owner(&self) -> Option<Owner> {
        match (self.owner_id, self.owner_type) {
            (Some(id), Some(kind)) => Some(Owner { id, kind }),
            _ => None,
        }
    }
}

/// Hashtag. Titles are unique; the creating user owns the row.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Tag {
    pub id: i64,
    pub title: String,
    pub cover_image: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub slug: Option<String>,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}
