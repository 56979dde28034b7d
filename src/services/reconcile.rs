use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::db::{CommentExt, MediaExt, MentionExt, PostExt};
use crate::dtos::{MediaRef, MentionInput};
use crate::error::{ErrorMessage, ServiceError};
use crate::models::{Owner, OwnerType};

/// What a reconciliation did, by natural key (user id for mentions, media
/// id for media, tag id for hashtags).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub added: Vec<i64>,
    pub removed: Vec<i64>,
    pub kept: Vec<i64>,
}

impl ReconcileOutcome {
    /// Number of store writes performed
    pub fn writes(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}

/// Diff between the keys an owner has and the keys it should have.
#[derive(Debug, PartialEq, Eq)]
pub struct Plan<K> {
    /// Desired keys not present yet, in desired order
    pub add: Vec<K>,
    /// Present keys no longer desired, in current order
    pub remove: Vec<K>,
    /// Keys present and desired
    pub keep: Vec<K>,
}

/// Computes the diff. Repeated desired keys count once, at their first
/// occurrence.
pub fn plan<K>(current: impl IntoIterator<Item = K>, desired: impl IntoIterator<Item = K>) -> Plan<K>
where
    K: Eq + Hash + Clone,
{
    let current: Vec<K> = current.into_iter().collect();
    let current_set: HashSet<&K> = current.iter().collect();

    let mut seen = HashSet::new();
    let mut add = Vec::new();
    let mut keep = Vec::new();
    for key in desired {
        if !seen.insert(key.clone()) {
            continue;
        }
        if current_set.contains(&key) {
            keep.push(key);
        } else {
            add.push(key);
        }
    }

    let remove = current
        .iter()
        .filter(|key| !seen.contains(*key))
        .cloned()
        .collect();

    Plan { add, remove, keep }
}

fn distinct(ids: impl IntoIterator<Item = i64>) -> Vec<i64> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

async fn ensure_users_exist<S: MentionExt>(
    store: &S,
    user_ids: &[i64],
) -> Result<(), ServiceError> {
    if user_ids.is_empty() {
        return Ok(());
    }
    let found: HashSet<i64> = store.existing_user_ids(user_ids).await?.into_iter().collect();
    match user_ids.iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(ServiceError::NotFound(format!("User {} not found", missing))),
        None => Ok(()),
    }
}

/// Fails with `NotFound` if any mentioned user has no live account.
/// Call before creating the owner so a bad mention leaves nothing behind.
pub async fn check_mentions<S: MentionExt>(
    store: &S,
    mentions: &[MentionInput],
) -> Result<(), ServiceError> {
    ensure_users_exist(store, &distinct(mentions.iter().map(|m| m.user_id))).await
}

/// Fails unless every id names a live, unattached media row uploaded by
/// `user_id`: `NotFound` for a missing row, `Forbidden` for anything else.
pub async fn check_media<S: MediaExt>(
    store: &S,
    user_id: i64,
    media_ids: &[i64],
) -> Result<(), ServiceError> {
    for &media_id in media_ids {
        let media = store
            .get_media(media_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Media {} not found", media_id)))?;
        if media.user_id != user_id || media.owner().is_some() {
            return Err(ServiceError::Forbidden(format!(
                "Media {} cannot be attached",
                media_id
            )));
        }
    }
    Ok(())
}

/// Fails with `Forbidden` unless `user_id` wrote the post or comment.
pub async fn check_owner<S: PostExt + CommentExt>(
    store: &S,
    user_id: i64,
    owner: Owner,
) -> Result<(), ServiceError> {
    let (author, missing) = match owner.kind {
        OwnerType::Posts => (
            store.get_post(owner.id).await?.map(|p| p.user_id),
            ErrorMessage::PostNotFound,
        ),
        OwnerType::Comments => (
            store.get_comment(owner.id).await?.map(|c| c.user_id),
            ErrorMessage::CommentNotFound,
        ),
    };
    match author {
        None => Err(ServiceError::NotFound(missing.to_string())),
        Some(author) if author != user_id => Err(ServiceError::Forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        )),
        Some(_) => Ok(()),
    }
}

/// Makes the mentions of `owner` equal `desired`, keyed by user id.
///
/// Kept mentions are not rewritten, so they keep their stored position.
/// Every new user is checked before the first write. Writes stop at the
/// first error; earlier writes stay in place.
pub async fn sync_mentions<S: MentionExt>(
    store: &S,
    owner: Owner,
    desired: &[MentionInput],
) -> Result<ReconcileOutcome, ServiceError> {
    let current = store.get_mentions(owner).await?;

    let mut positions: HashMap<i64, i32> = HashMap::new();
    for mention in desired {
        positions.entry(mention.user_id).or_insert(mention.position);
    }

    let plan = plan(
        current.iter().map(|m| m.user_id),
        desired.iter().map(|m| m.user_id),
    );
    ensure_users_exist(store, &plan.add).await?;

    for user_id in &plan.add {
        let position = positions.get(user_id).copied().unwrap_or_default();
        store.create_mention(owner, *user_id, position).await?;
    }

    for user_id in &plan.remove {
        store.delete_mention(owner, *user_id).await?;
    }

    tracing::debug!(
        owner_id = owner.id,
        owner_type = owner.kind.to_str(),
        added = plan.add.len(),
        removed = plan.remove.len(),
        "mentions reconciled"
    );

    Ok(ReconcileOutcome {
        added: plan.add,
        removed: plan.remove,
        kept: plan.keep,
    })
}

/// Makes the media attached to `owner` equal `desired`, keyed by media id.
///
/// New ids must be unattached uploads of `user_id` and are checked before
/// the first write. Stale ones are soft-deleted.
pub async fn sync_media<S: MediaExt>(
    store: &S,
    user_id: i64,
    owner: Owner,
    desired: &[MediaRef],
) -> Result<ReconcileOutcome, ServiceError> {
    let current = store.get_owned_media(owner).await?;

    let plan = plan(current.iter().map(|m| m.id), desired.iter().map(|m| m.id));
    check_media(store, user_id, &plan.add).await?;

    for media_id in &plan.add {
        store
            .attach_media(*media_id, user_id, owner)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    ServiceError::NotFound(format!("Media {} not found", media_id))
                }
                other => ServiceError::Database(other),
            })?;
    }

    for media_id in &plan.remove {
        store.delete_media(owner, *media_id).await?;
    }

    tracing::debug!(
        owner_id = owner.id,
        owner_type = owner.kind.to_str(),
        added = plan.add.len(),
        removed = plan.remove.len(),
        "media reconciled"
    );

    Ok(ReconcileOutcome {
        added: plan.add,
        removed: plan.remove,
        kept: plan.keep,
    })
}
