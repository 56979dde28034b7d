//! Development data seeder, run with `social_backend seed`.
//!
//! Creates users, tags, posts tagged with those tags, and comment threads
//! with replies. Unique usernames and tag titles come from the generators
//! below; each seeder run owns its own generator state, so names already in
//! the database from an earlier run are skipped and tag titles are reused.

use std::collections::HashSet;
use std::sync::Mutex;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::db::{CommentExt, NewPost, PostExt, PostSettings, TagExt, UserExt};
use crate::dtos::HashtagInput;
use crate::error::ServiceError;
use crate::models::{Post, Tag, User, Visibility};
use crate::services::tags::{find_or_create_tag, sync_hashtags};
use crate::utils::password;

/// Every seeded account logs in with this password.
pub const SEED_PASSWORD: &str = "password123";

const WORDS: &[&str] = &[
    "river", "signal", "copper", "lantern", "harbor", "meadow", "orbit", "pixel", "quartz",
    "summit", "thunder", "velvet", "willow", "cinder", "glacier", "marble", "nectar", "prairie",
    "saffron", "tundra", "beacon", "compass", "ember", "falcon", "garden", "horizon", "island",
    "journey", "kernel", "ledger",
];

const FIRST_NAMES: &[&str] = &[
    "alex", "blake", "casey", "devon", "emery", "finley", "harper", "jordan", "kai", "logan",
    "morgan", "noel", "parker", "quinn", "riley", "sage", "taylor", "avery",
];

const LAST_NAMES: &[&str] = &[
    "stone", "rivers", "hale", "brooks", "frost", "lane", "marsh", "reed", "shaw", "vale",
    "woods", "young", "ford", "grant", "hayes",
];

/// Hands out tag titles that were never returned before by this generator.
///
/// A repeated word gets a `_1`, `_2`, ... suffix.
#[derive(Debug, Default)]
pub struct UniqueTagGenerator {
    used: Mutex<HashSet<String>>,
}

impl UniqueTagGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unique_tag<R: Rng>(&self, rng: &mut R) -> String {
        let base = WORDS.choose(rng).copied().unwrap_or("tag");
        let mut used = self.used.lock().unwrap_or_else(|e| e.into_inner());
        claim(&mut used, base)
    }
}

/// Hands out `first_last` usernames, unique per generator.
#[derive(Debug, Default)]
pub struct UsernameGenerator {
    used: Mutex<HashSet<String>>,
}

impl UsernameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn username<R: Rng>(&self, rng: &mut R) -> String {
        let first = FIRST_NAMES.choose(rng).copied().unwrap_or("user");
        let last = LAST_NAMES.choose(rng).copied().unwrap_or("name");
        let base = format!("{}_{}", first, last);
        let mut used = self.used.lock().unwrap_or_else(|e| e.into_inner());
        claim(&mut used, &base)
    }
}

fn claim(used: &mut HashSet<String>, base: &str) -> String {
    let mut candidate = base.to_string();
    let mut counter = 1;
    while used.contains(&candidate) {
        candidate = format!("{}_{}", base, counter);
        counter += 1;
    }
    used.insert(candidate.clone());
    candidate
}

fn sentence<R: Rng>(rng: &mut R, words: usize) -> String {
    let mut text = (0..words)
        .filter_map(|_| WORDS.choose(rng).copied())
        .collect::<Vec<_>>()
        .join(" ");
    if let Some(first) = text.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    text.push('.');
    text
}

/// How much data one run creates.
#[derive(Debug, Clone, Copy)]
pub struct SeedCounts {
    pub users: usize,
    pub tags: usize,
    pub posts: usize,
    pub comments_per_post: usize,
    pub replies_per_comment: usize,
}

impl Default for SeedCounts {
    fn default() -> Self {
        SeedCounts {
            users: 100,
            tags: 10,
            posts: 200,
            comments_per_post: 5,
            replies_per_comment: 2,
        }
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct SeedSummary {
    pub users: usize,
    pub tags: usize,
    pub posts: usize,
    pub comments: usize,
}

pub struct Seeder<'a, S> {
    store: &'a S,
    tags: &'a UniqueTagGenerator,
    usernames: &'a UsernameGenerator,
    counts: SeedCounts,
}

impl<'a, S> Seeder<'a, S>
where
    S: UserExt + PostExt + TagExt + CommentExt,
{
    pub fn new(
        store: &'a S,
        tags: &'a UniqueTagGenerator,
        usernames: &'a UsernameGenerator,
        counts: SeedCounts,
    ) -> Self {
        Seeder {
            store,
            tags,
            usernames,
            counts,
        }
    }

    pub async fn run<R: Rng>(&self, rng: &mut R) -> Result<SeedSummary, ServiceError> {
        let users = self.seed_users(rng).await?;
        if users.is_empty() {
            return Ok(SeedSummary::default());
        }
        tracing::info!("User seeding completed: {}", users.len());

        let tags = self.seed_tags(rng, &users).await?;
        tracing::info!("Tag seeding completed: {}", tags.len());

        let posts = self.seed_posts(rng, &users, &tags).await?;
        tracing::info!("Post seeding completed: {}", posts.len());

        let comments = self.seed_comments(rng, &users, &posts).await?;
        tracing::info!("Comment seeding completed: {}", comments);

        Ok(SeedSummary {
            users: users.len(),
            tags: tags.len(),
            posts: posts.len(),
            comments,
        })
    }

    async fn seed_users<R: Rng>(&self, rng: &mut R) -> Result<Vec<User>, ServiceError> {
        // one hash for every account, argon2 is slow
        let password_hash = password::hash(SEED_PASSWORD)
            .map_err(|e| ServiceError::BadRequest(e.to_string()))?;

        let mut users = Vec::with_capacity(self.counts.users);
        for _ in 0..self.counts.users {
            let username = self.unused_username(rng).await?;
            let email = format!("{}@example.com", username);
            users.push(
                self.store
                    .save_user(&username, &email, &password_hash)
                    .await?,
            );
        }
        Ok(users)
    }

    async fn unused_username<R: Rng>(&self, rng: &mut R) -> Result<String, ServiceError> {
        loop {
            let username = self.usernames.username(rng);
            let email = format!("{}@example.com", username);
            let taken = self.store.get_user(None, Some(&username), None).await?.is_some()
                || self
                    .store
                    .get_user(None, None, Some(&email))
                    .await?
                    .is_some();
            if !taken {
                return Ok(username);
            }
            tracing::debug!("skipping existing user {}", username);
        }
    }

    async fn seed_tags<R: Rng>(
        &self,
        rng: &mut R,
        users: &[User],
    ) -> Result<Vec<Tag>, ServiceError> {
        let mut created = Vec::with_capacity(self.counts.tags);
        for i in 0..self.counts.tags {
            let title = self.tags.unique_tag(rng);
            let owner = &users[i % users.len()];
            created.push(find_or_create_tag(self.store, &title, owner.id).await?);
        }
        Ok(created)
    }

    async fn seed_posts<R: Rng>(
        &self,
        rng: &mut R,
        users: &[User],
        tags: &[Tag],
    ) -> Result<Vec<Post>, ServiceError> {
        let mut posts = Vec::with_capacity(self.counts.posts);
        for i in 0..self.counts.posts {
            let author = &users[i % users.len()];
            let new_post = NewPost {
                title: sentence(rng, 6),
                body: sentence(rng, 24),
                settings: PostSettings {
                    visibility: Visibility::Public,
                    ..PostSettings::default()
                },
            };
            let post = self.store.create_post(author.id, &new_post).await?;

            if !tags.is_empty() {
                let hashtags = [HashtagInput {
                    title: tags[i % tags.len()].title.clone(),
                }];
                sync_hashtags(self.store, author.id, post.id, &hashtags).await?;
            }
            posts.push(post);
        }
        Ok(posts)
    }

    async fn seed_comments<R: Rng>(
        &self,
        rng: &mut R,
        users: &[User],
        posts: &[Post],
    ) -> Result<usize, ServiceError> {
        let mut total = 0;
        for post in posts {
            let mut added = 0i64;
            for _ in 0..self.counts.comments_per_post {
                let author = &users[rng.gen_range(0..users.len())];
                let root = self
                    .store
                    .create_comment(author.id, post.id, None, &sentence(rng, 10))
                    .await?;
                added += 1;

                let mut parent_id = root.id;
                for _ in 0..self.counts.replies_per_comment {
                    let author = &users[rng.gen_range(0..users.len())];
                    let reply = self
                        .store
                        .create_comment(author.id, post.id, Some(parent_id), &sentence(rng, 10))
                        .await?;
                    parent_id = reply.id;
                    added += 1;
                }
            }
            self.store.adjust_comment_count(post.id, added).await?;
            total += added as usize;
        }
        Ok(total)
    }
}
