use sqlx::{Pool, Postgres};

pub mod scheduler;

mod user;
pub use user::{ProfileUpdate, UserExt};

mod post;
pub use post::{NewPost, PostExt, PostSettings};

mod comment;
pub use comment::CommentExt;

mod like;
pub use like::LikeExt;

mod mention;
pub use mention::MentionExt;

mod media;
pub use media::MediaExt;

mod tag;
pub use tag::{TagExt, slugify};

mod feed;
pub use feed::FeedExt;

#[derive(Debug, Clone)]
pub struct DBClient {
    pool: Pool<Postgres>,
}
impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}
