use crate::db::{LikeExt, PostExt};
use crate::error::{ErrorMessage, ServiceError};
use crate::models::{Like, Owner, OwnerType};

/// Which branch a like request took.
#[derive(Debug, Clone)]
pub enum LikeToggle {
    Liked(Like),
    Unliked,
}

fn target_not_found(target: Owner) -> ServiceError {
    let message = match target.kind {
        OwnerType::Posts => ErrorMessage::PostNotFound,
        OwnerType::Comments => ErrorMessage::CommentNotFound,
    };
    ServiceError::NotFound(message.to_string())
}

// Counter drift is tolerated, so a failed adjustment is only logged.
async fn adjust_post_likes<S: PostExt>(store: &S, target: Owner, delta: i64) {
    if target.kind != OwnerType::Posts {
        return;
    }
    if let Err(e) = store.adjust_like_count(target.id, delta).await {
        tracing::warn!(post_id = target.id, "failed to adjust like_count: {}", e);
    }
}

/// Likes `target` for `user_id`, or removes the like if one already exists.
pub async fn toggle_like<S: LikeExt + PostExt>(
    store: &S,
    user_id: i64,
    target: Owner,
) -> Result<LikeToggle, ServiceError> {
    if !store.likeable_exists(target).await? {
        return Err(target_not_found(target));
    }

    match store.find_like(user_id, target).await? {
        Some(existing) => {
            store.delete_like(existing.id).await?;
            adjust_post_likes(store, target, -1).await;
            Ok(LikeToggle::Unliked)
        }
        None => {
            let like = store.create_like(user_id, target).await?;
            adjust_post_likes(store, target, 1).await;
            Ok(LikeToggle::Liked(like))
        }
    }
}

/// Deletes a like by id. Only its author may delete it.
pub async fn remove_like<S: LikeExt + PostExt>(
    store: &S,
    user_id: i64,
    like_id: i64,
) -> Result<(), ServiceError> {
    let like = store
        .get_like(like_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(ErrorMessage::LikeNotFound.to_string()))?;

    if like.user_id != user_id {
        return Err(ServiceError::Forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    store.delete_like(like.id).await?;
    adjust_post_likes(
        store,
        Owner {
            id: like.likeable_id,
            kind: like.likeable_type,
        },
        -1,
    )
    .await;

    Ok(())
}
