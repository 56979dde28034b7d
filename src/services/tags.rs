use std::collections::HashMap;

use super::reconcile::{ReconcileOutcome, plan};
use crate::db::{PostExt, TagExt};
use crate::dtos::HashtagInput;
use crate::error::{ErrorMessage, ServiceError};
use crate::models::Tag;

/// Returns the tag titled `title`, creating it for `user_id` if absent.
pub async fn find_or_create_tag<S: TagExt>(
    store: &S,
    title: &str,
    user_id: i64,
) -> Result<Tag, ServiceError> {
    if let Some(tag) = store.get_tag_by_title(title).await? {
        return Ok(tag);
    }
    Ok(store.create_tag(title, user_id).await?)
}

/// Makes the hashtags of `post_id` equal `desired`, keyed by title.
///
/// The post must exist and belong to `actor_id`; both are checked before
/// anything is written. Titles without a tag get one, owned by the actor.
/// The outcome lists tag ids.
pub async fn sync_hashtags<S: PostExt + TagExt>(
    store: &S,
    actor_id: i64,
    post_id: i64,
    desired: &[HashtagInput],
) -> Result<ReconcileOutcome, ServiceError> {
    let post = store
        .get_post(post_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(ErrorMessage::PostNotFound.to_string()))?;

    if post.user_id != actor_id {
        return Err(ServiceError::Forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    let current = store.get_post_tags(post_id).await?;
    let current_ids: HashMap<&str, i64> =
        current.iter().map(|t| (t.title.as_str(), t.id)).collect();

    let plan = plan(
        current.iter().map(|t| t.title.as_str()),
        desired.iter().map(|h| h.title.as_str()),
    );

    let mut outcome = ReconcileOutcome {
        kept: plan.keep.iter().map(|title| current_ids[title]).collect(),
        ..Default::default()
    };

    for title in &plan.add {
        let tag = find_or_create_tag(store, title, actor_id).await?;
        store.attach_tag(post_id, tag.id).await?;
        outcome.added.push(tag.id);
    }

    for title in &plan.remove {
        let tag_id = current_ids[title];
        store.detach_tag(post_id, tag_id).await?;
        outcome.removed.push(tag_id);
    }

    tracing::debug!(
        post_id,
        added = outcome.added.len(),
        removed = outcome.removed.len(),
        "hashtags reconciled"
    );

    Ok(outcome)
}
