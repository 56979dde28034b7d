//! In-memory implementation of the persistence traits for service tests.
//!
//! Mirrors the SQL semantics the services rely on (ordering, `RowNotFound`
//! on missing rows, upsert of tag titles), counts successful writes, and can
//! fail the n-th upcoming write to exercise partial failures.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::db::{
    CommentExt, LikeExt, MediaExt, MentionExt, NewPost, PostExt, PostSettings, ProfileUpdate, TagExt,
    UserExt, slugify,
};
use crate::dtos::CommentDto;
use crate::models::{Comment, Like, Media, Mention, Owner, OwnerType, Post, Tag, User};
use crate::storage::StoredFile;

#[derive(Default)]
struct State {
    next_id: i64,
    users: HashMap<i64, String>,
    accounts: BTreeMap<i64, User>,
    posts: BTreeMap<i64, Post>,
    comments: BTreeMap<i64, Comment>,
    likes: BTreeMap<i64, Like>,
    mentions: BTreeMap<i64, Mention>,
    medias: BTreeMap<i64, Media>,
    tags: BTreeMap<i64, Tag>,
    deleted_tags: BTreeSet<i64>,
    post_tags: BTreeSet<(i64, i64)>,
    attempts: usize,
    writes: usize,
    fail_at: Option<usize>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    // Deterministic clock: one second per id handed out
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(self.next_id)
    }

    fn write(&mut self) -> Result<(), sqlx::Error> {
        self.attempts += 1;
        if self.fail_at == Some(self.attempts) {
            self.fail_at = None;
            return Err(sqlx::Error::Protocol("injected write failure".to_string()));
        }
        self.writes += 1;
        Ok(())
    }

    fn comment_dto(&self, comment: &Comment) -> CommentDto {
        let like_count = self
            .likes
            .values()
            .filter(|l| l.likeable_type == OwnerType::Comments && l.likeable_id == comment.id)
            .count() as i64;

        CommentDto {
            id: comment.id,
            post_id: comment.post_id,
            user_id: comment.user_id,
            parent_id: comment.parent_id,
            body: comment.body.clone(),
            user_username: self.users.get(&comment.user_id).cloned().unwrap_or_default(),
            user_avatar_url: None,
            like_count,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }

    fn insert_post(&mut self, user_id: i64, post: &NewPost) -> Post {
        let id = self.next_id();
        let now = self.now();
        let post = Post {
            id,
            user_id,
            title: post.title.clone(),
            body: post.body.clone(),
            visibility: post.settings.visibility,
            is_promoted: post.settings.is_promoted,
            promotion_expiry: post.settings.promotion_expiry,
            is_featured: post.settings.is_featured,
            featured_expiry: post.settings.featured_expiry,
            like_count: 0,
            comment_count: 0,
            view_count: 0,
            share_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.posts.insert(id, post.clone());
        post
    }

    fn insert_comment(
        &mut self,
        user_id: i64,
        post_id: i64,
        parent_id: Option<i64>,
        body: &str,
    ) -> Comment {
        let id = self.next_id();
        let now = self.now();
        let comment = Comment {
            id,
            post_id,
            user_id,
            parent_id,
            body: body.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.comments.insert(id, comment.clone());
        comment
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Successful writes so far. Seeding helpers do not count.
    pub fn writes(&self) -> usize {
        self.state().writes
    }

    /// Makes the n-th write from now (1-based) fail once.
    pub fn fail_on_write(&self, n: usize) {
        let mut state = self.state();
        state.fail_at = Some(state.attempts + n);
    }

    pub fn add_user(&self, username: &str) -> i64 {
        let mut state = self.state();
        let id = state.next_id();
        state.users.insert(id, username.to_string());
        id
    }

    /// New user plus one post by them; returns the post id.
    pub fn seed_post(&self, username: &str) -> i64 {
        let user_id = self.add_user(username);
        self.seed_post_for(user_id)
    }

    pub fn seed_post_for(&self, user_id: i64) -> i64 {
        let post = NewPost {
            title: "A post title long enough".to_string(),
            body: "A post body that is long enough to pass validation".to_string(),
            settings: PostSettings::default(),
        };
        self.state().insert_post(user_id, &post).id
    }

    /// Comment by the post's author, without any parent check.
    pub fn seed_comment(&self, post_id: i64, parent_id: Option<i64>) -> i64 {
        let mut state = self.state();
        let user_id = state.posts[&post_id].user_id;
        state
            .insert_comment(user_id, post_id, parent_id, "seeded comment")
            .id
    }

    pub fn set_parent(&self, comment_id: i64, parent_id: Option<i64>) {
        if let Some(comment) = self.state().comments.get_mut(&comment_id) {
            comment.parent_id = parent_id;
        }
    }

    /// Unattached media row uploaded by `user_id`
    pub fn upload_media(&self, user_id: i64, filename: &str) -> i64 {
        let mut state = self.state();
        let id = state.next_id();
        let now = state.now();
        state.medias.insert(
            id,
            Media {
                id,
                url: format!("http://localhost/uploads/{}", filename),
                media_type: "image/png".to_string(),
                filename: filename.to_string(),
                size: 1,
                user_id,
                owner_id: None,
                owner_type: None,
                created_at: now,
            },
        );
        id
    }

    /// Ids of live posts, oldest first
    pub fn post_ids(&self) -> Vec<i64> {
        self.state().posts.keys().copied().collect()
    }

    pub fn post(&self, post_id: i64) -> Post {
        self.state().posts[&post_id].clone()
    }

    /// Mentioned user ids of `owner`, in insertion order
    pub fn mentioned_users(&self, owner: Owner) -> Vec<i64> {
        self.state()
            .mentions
            .values()
            .filter(|m| m.owner_id == owner.id && m.owner_type == owner.kind)
            .map(|m| m.user_id)
            .collect()
    }

    pub fn owned_media(&self, owner: Owner) -> Vec<i64> {
        self.state()
            .medias
            .values()
            .filter(|m| m.owner() == Some(owner))
            .map(|m| m.id)
            .collect()
    }

    pub fn tag_count(&self) -> usize {
        self.state().tags.len()
    }

    /// Marks a tag deleted the way the soft delete column does.
    pub fn soft_delete_tag(&self, tag_id: i64) {
        self.state().deleted_tags.insert(tag_id);
    }

    pub fn post_tag_titles(&self, post_id: i64) -> Vec<String> {
        let state = self.state();
        let mut titles: Vec<String> = state
            .post_tags
            .iter()
            .filter(|(p, _)| *p == post_id)
            .filter_map(|(_, t)| state.tags.get(t).map(|tag| tag.title.clone()))
            .collect();
        titles.sort();
        titles
    }

    pub fn like_count(&self, user_id: i64, target: Owner) -> usize {
        self.state()
            .likes
            .values()
            .filter(|l| {
                l.user_id == user_id
                    && l.likeable_id == target.id
                    && l.likeable_type == target.kind
            })
            .count()
    }
}

impl UserExt for MemoryStore {
    async fn get_user(
        &self,
        user_id: Option<i64>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        let state = self.state();
        let found = state.accounts.values().find(|u| {
            if let Some(id) = user_id {
                u.id == id
            } else if let Some(name) = username {
                u.username == name
            } else if let Some(email) = email {
                u.email == email
            } else {
                false
            }
        });
        Ok(found.cloned())
    }

    async fn get_users(&self, page: i64, per_page: i64) -> Result<Vec<User>, sqlx::Error> {
        let offset = ((page - 1) * per_page).max(0) as usize;
        Ok(self
            .state()
            .accounts
            .values()
            .skip(offset)
            .take(per_page.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn get_user_count(&self) -> Result<i64, sqlx::Error> {
        Ok(self.state().accounts.len() as i64)
    }

    async fn save_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        let mut state = self.state();
        let taken = state
            .accounts
            .values()
            .any(|u| u.username == username || u.email == email);
        if taken {
            // the unique indexes on users reject the insert
            return Err(sqlx::Error::Protocol(format!(
                "duplicate key for user {}",
                username
            )));
        }
        state.write()?;
        let id = state.next_id();
        let now = state.now();
        let user = User {
            id,
            username: username.to_string(),
            email: email.to_string(),
            password: password_hash.to_string(),
            first_name: None,
            last_name: None,
            avatar_url: None,
            bio: None,
            website_url: None,
            city: None,
            country: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(id, username.to_string());
        state.accounts.insert(id, user.clone());
        Ok(user)
    }

    async fn update_user_profile(
        &self,
        user_id: i64,
        update: &ProfileUpdate,
    ) -> Result<User, sqlx::Error> {
        let mut state = self.state();
        if !state.accounts.contains_key(&user_id) {
            return Err(sqlx::Error::RowNotFound);
        }
        state.write()?;
        let now = state.now();
        let user = state
            .accounts
            .get_mut(&user_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        let fields = [
            (&mut user.first_name, &update.first_name),
            (&mut user.last_name, &update.last_name),
            (&mut user.avatar_url, &update.avatar_url),
            (&mut user.bio, &update.bio),
            (&mut user.website_url, &update.website_url),
            (&mut user.city, &update.city),
            (&mut user.country, &update.country),
        ];
        for (field, value) in fields {
            if value.is_some() {
                *field = value.clone();
            }
        }
        user.updated_at = now;
        Ok(user.clone())
    }

    async fn delete_user(&self, user_id: i64) -> Result<(), sqlx::Error> {
        let mut state = self.state();
        if !state.accounts.contains_key(&user_id) {
            return Err(sqlx::Error::RowNotFound);
        }
        state.write()?;
        state.accounts.remove(&user_id);
        Ok(())
    }
}

impl PostExt for MemoryStore {
    async fn get_post(&self, post_id: i64) -> Result<Option<Post>, sqlx::Error> {
        Ok(self.state().posts.get(&post_id).cloned())
    }

    async fn create_post(&self, user_id: i64, post: &NewPost) -> Result<Post, sqlx::Error> {
        let mut state = self.state();
        state.write()?;
        Ok(state.insert_post(user_id, post))
    }

    async fn update_post_title(&self, post_id: i64, title: &str) -> Result<Post, sqlx::Error> {
        let mut state = self.state();
        state.write()?;
        let post = state.posts.get_mut(&post_id).ok_or(sqlx::Error::RowNotFound)?;
        post.title = title.to_string();
        Ok(post.clone())
    }

    async fn update_post_body(&self, post_id: i64, body: &str) -> Result<Post, sqlx::Error> {
        let mut state = self.state();
        state.write()?;
        let post = state.posts.get_mut(&post_id).ok_or(sqlx::Error::RowNotFound)?;
        post.body = body.to_string();
        Ok(post.clone())
    }

    async fn update_post_settings(
        &self,
        post_id: i64,
        settings: &PostSettings,
    ) -> Result<Post, sqlx::Error> {
        let mut state = self.state();
        state.write()?;
        let post = state.posts.get_mut(&post_id).ok_or(sqlx::Error::RowNotFound)?;
        post.visibility = settings.visibility;
        post.is_promoted = settings.is_promoted;
        post.promotion_expiry = settings.promotion_expiry;
        post.is_featured = settings.is_featured;
        post.featured_expiry = settings.featured_expiry;
        Ok(post.clone())
    }

    async fn delete_post(&self, post_id: i64) -> Result<(), sqlx::Error> {
        let mut state = self.state();
        state.write()?;
        state
            .posts
            .remove(&post_id)
            .map(|_| ())
            .ok_or(sqlx::Error::RowNotFound)
    }

    async fn adjust_like_count(&self, post_id: i64, delta: i64) -> Result<(), sqlx::Error> {
        let mut state = self.state();
        state.write()?;
        if let Some(post) = state.posts.get_mut(&post_id) {
            post.like_count = (post.like_count + delta).max(0);
        }
        Ok(())
    }

    async fn adjust_comment_count(&self, post_id: i64, delta: i64) -> Result<(), sqlx::Error> {
        let mut state = self.state();
        state.write()?;
        if let Some(post) = state.posts.get_mut(&post_id) {
            post.comment_count = (post.comment_count + delta).max(0);
        }
        Ok(())
    }

    async fn increment_view_count(&self, post_id: i64) -> Result<(), sqlx::Error> {
        let mut state = self.state();
        state.write()?;
        if let Some(post) = state.posts.get_mut(&post_id) {
            post.view_count += 1;
        }
        Ok(())
    }
}

impl CommentExt for MemoryStore {
    async fn get_comment(&self, comment_id: i64) -> Result<Option<Comment>, sqlx::Error> {
        Ok(self.state().comments.get(&comment_id).cloned())
    }

    async fn get_comment_dto(&self, comment_id: i64) -> Result<Option<CommentDto>, sqlx::Error> {
        let state = self.state();
        Ok(state
            .comments
            .get(&comment_id)
            .map(|c| state.comment_dto(c)))
    }

    async fn get_replies(&self, parent_id: i64) -> Result<Vec<CommentDto>, sqlx::Error> {
        let state = self.state();
        let mut replies: Vec<&Comment> = state
            .comments
            .values()
            .filter(|c| c.parent_id == Some(parent_id))
            .collect();
        replies.sort_by_key(|c| (c.created_at, c.id));
        Ok(replies.into_iter().map(|c| state.comment_dto(c)).collect())
    }

    async fn get_root_comments(
        &self,
        post_id: i64,
        page: i64,
        per_page: i64,
    ) -> Result<Vec<CommentDto>, sqlx::Error> {
        let state = self.state();
        let mut roots: Vec<&Comment> = state
            .comments
            .values()
            .filter(|c| c.post_id == post_id && c.parent_id.is_none())
            .collect();
        roots.sort_by_key(|c| (c.created_at, c.id));
        Ok(roots
            .into_iter()
            .skip(((page - 1) * per_page) as usize)
            .take(per_page as usize)
            .map(|c| state.comment_dto(c))
            .collect())
    }

    async fn count_root_comments(&self, post_id: i64) -> Result<i64, sqlx::Error> {
        Ok(self
            .state()
            .comments
            .values()
            .filter(|c| c.post_id == post_id && c.parent_id.is_none())
            .count() as i64)
    }

    async fn create_comment(
        &self,
        user_id: i64,
        post_id: i64,
        parent_id: Option<i64>,
        body: &str,
    ) -> Result<Comment, sqlx::Error> {
        let mut state = self.state();
        state.write()?;
        Ok(state.insert_comment(user_id, post_id, parent_id, body))
    }

    async fn update_comment_body(
        &self,
        comment_id: i64,
        body: &str,
    ) -> Result<Comment, sqlx::Error> {
        let mut state = self.state();
        state.write()?;
        let comment = state
            .comments
            .get_mut(&comment_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        comment.body = body.to_string();
        Ok(comment.clone())
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<(), sqlx::Error> {
        let mut state = self.state();
        state.write()?;
        state
            .comments
            .remove(&comment_id)
            .map(|_| ())
            .ok_or(sqlx::Error::RowNotFound)
    }
}

impl LikeExt for MemoryStore {
    async fn likeable_exists(&self, target: Owner) -> Result<bool, sqlx::Error> {
        let state = self.state();
        Ok(match target.kind {
            OwnerType::Posts => state.posts.contains_key(&target.id),
            OwnerType::Comments => state.comments.contains_key(&target.id),
        })
    }

    async fn get_like(&self, like_id: i64) -> Result<Option<Like>, sqlx::Error> {
        Ok(self.state().likes.get(&like_id).cloned())
    }

    async fn find_like(&self, user_id: i64, target: Owner) -> Result<Option<Like>, sqlx::Error> {
        Ok(self
            .state()
            .likes
            .values()
            .find(|l| {
                l.user_id == user_id
                    && l.likeable_id == target.id
                    && l.likeable_type == target.kind
            })
            .cloned())
    }

    async fn create_like(&self, user_id: i64, target: Owner) -> Result<Like, sqlx::Error> {
        let mut state = self.state();
        state.write()?;
        let id = state.next_id();
        let like = Like {
            id,
            user_id,
            likeable_id: target.id,
            likeable_type: target.kind,
            created_at: state.now(),
        };
        state.likes.insert(id, like.clone());
        Ok(like)
    }

    async fn delete_like(&self, like_id: i64) -> Result<(), sqlx::Error> {
        let mut state = self.state();
        state.write()?;
        state
            .likes
            .remove(&like_id)
            .map(|_| ())
            .ok_or(sqlx::Error::RowNotFound)
    }
}

impl MentionExt for MemoryStore {
    async fn get_mentions(&self, owner: Owner) -> Result<Vec<Mention>, sqlx::Error> {
        Ok(self
            .state()
            .mentions
            .values()
            .filter(|m| m.owner_id == owner.id && m.owner_type == owner.kind)
            .cloned()
            .collect())
    }

    async fn create_mention(
        &self,
        owner: Owner,
        user_id: i64,
        position: i32,
    ) -> Result<Mention, sqlx::Error> {
        let mut state = self.state();
        state.write()?;
        let id = state.next_id();
        let mention = Mention {
            id,
            user_id,
            owner_id: owner.id,
            owner_type: owner.kind,
            position,
            created_at: state.now(),
        };
        state.mentions.insert(id, mention.clone());
        Ok(mention)
    }

    async fn delete_mention(&self, owner: Owner, user_id: i64) -> Result<(), sqlx::Error> {
        let mut state = self.state();
        state.write()?;
        state.mentions.retain(|_, m| {
            !(m.owner_id == owner.id && m.owner_type == owner.kind && m.user_id == user_id)
        });
        Ok(())
    }

    async fn existing_user_ids(&self, user_ids: &[i64]) -> Result<Vec<i64>, sqlx::Error> {
        let state = self.state();
        Ok(user_ids
            .iter()
            .copied()
            .filter(|id| state.users.contains_key(id))
            .collect())
    }
}

impl MediaExt for MemoryStore {
    async fn get_media(&self, media_id: i64) -> Result<Option<Media>, sqlx::Error> {
        Ok(self.state().medias.get(&media_id).cloned())
    }

    async fn get_owned_media(&self, owner: Owner) -> Result<Vec<Media>, sqlx::Error> {
        Ok(self
            .state()
            .medias
            .values()
            .filter(|m| m.owner() == Some(owner))
            .cloned()
            .collect())
    }

    async fn create_media(
        &self,
        file: &StoredFile,
        user_id: i64,
        owner: Option<Owner>,
    ) -> Result<Media, sqlx::Error> {
        let mut state = self.state();
        state.write()?;
        let id = state.next_id();
        let media = Media {
            id,
            url: file.url.clone(),
            media_type: file.media_type.clone(),
            filename: file.filename.clone(),
            size: file.size,
            user_id,
            owner_id: owner.map(|o| o.id),
            owner_type: owner.map(|o| o.kind),
            created_at: state.now(),
        };
        state.medias.insert(id, media.clone());
        Ok(media)
    }

    async fn attach_media(
        &self,
        media_id: i64,
        user_id: i64,
        owner: Owner,
    ) -> Result<Media, sqlx::Error> {
        let mut state = self.state();
        let attachable = state
            .medias
            .get(&media_id)
            .is_some_and(|m| m.user_id == user_id && m.owner_id.is_none());
        if !attachable {
            return Err(sqlx::Error::RowNotFound);
        }
        state.write()?;
        let media = state
            .medias
            .get_mut(&media_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        media.owner_id = Some(owner.id);
        media.owner_type = Some(owner.kind);
        Ok(media.clone())
    }

    async fn delete_media(&self, owner: Owner, media_id: i64) -> Result<(), sqlx::Error> {
        let mut state = self.state();
        state.write()?;
        if state.medias.get(&media_id).and_then(|m| m.owner()) == Some(owner) {
            state.medias.remove(&media_id);
        }
        Ok(())
    }
}

impl TagExt for MemoryStore {
    async fn get_tag_by_title(&self, title: &str) -> Result<Option<Tag>, sqlx::Error> {
        let state = self.state();
        Ok(state
            .tags
            .values()
            .find(|t| t.title == title && !state.deleted_tags.contains(&t.id))
            .cloned())
    }

    async fn create_tag(&self, title: &str, user_id: i64) -> Result<Tag, sqlx::Error> {
        let mut state = self.state();
        state.write()?;
        // same outcome as the ON CONFLICT upsert
        if let Some(existing) = state.tags.values().find(|t| t.title == title).cloned() {
            state.deleted_tags.remove(&existing.id);
            return Ok(existing);
        }
        let id = state.next_id();
        let tag = Tag {
            id,
            title: title.to_string(),
            cover_image: None,
            description: None,
            color: None,
            slug: Some(slugify(title)),
            user_id,
            created_at: state.now(),
        };
        state.tags.insert(id, tag.clone());
        Ok(tag)
    }

    async fn get_post_tags(&self, post_id: i64) -> Result<Vec<Tag>, sqlx::Error> {
        let state = self.state();
        let mut tags: Vec<Tag> = state
            .post_tags
            .iter()
            .filter(|(p, t)| *p == post_id && !state.deleted_tags.contains(t))
            .filter_map(|(_, t)| state.tags.get(t).cloned())
            .collect();
        tags.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(tags)
    }

    async fn attach_tag(&self, post_id: i64, tag_id: i64) -> Result<(), sqlx::Error> {
        let mut state = self.state();
        state.write()?;
        state.post_tags.insert((post_id, tag_id));
        Ok(())
    }

    async fn detach_tag(&self, post_id: i64, tag_id: i64) -> Result<(), sqlx::Error> {
        let mut state = self.state();
        state.write()?;
        state.post_tags.remove(&(post_id, tag_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let store = MemoryStore::new();
        let post = store.seed_post("alice");

        store.fail_on_write(1);
        assert!(store.increment_view_count(post).await.is_err());
        assert!(store.increment_view_count(post).await.is_ok());
        assert_eq!(store.writes(), 1);
        assert_eq!(store.post(post).view_count, 1);
    }
}
