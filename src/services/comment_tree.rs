use std::collections::{HashSet, VecDeque};

use crate::db::CommentExt;
use crate::dtos::{CommentDto, CommentThreadDto};
use crate::error::{ErrorMessage, ServiceError};

/// A comment and all of its descendant replies, stored as an arena.
///
/// Index 0 is the root. Nodes are appended in breadth-first order, so a
/// child's index is always greater than its parent's.
#[derive(Debug, Clone)]
pub struct CommentTree {
    nodes: Vec<CommentDto>,
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
}

impl CommentTree {
    fn new(root: CommentDto) -> Self {
        CommentTree {
            nodes: vec![root],
            parents: vec![None],
            children: vec![Vec::new()],
        }
    }

    fn push_child(&mut self, parent: usize, comment: CommentDto) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(comment);
        self.parents.push(Some(parent));
        self.children.push(Vec::new());
        self.children[parent].push(idx);
        idx
    }

    pub fn root(&self) -> &CommentDto {
        &self.nodes[0]
    }

    pub fn node(&self, idx: usize) -> &CommentDto {
        &self.nodes[idx]
    }

    pub fn parent_of(&self, idx: usize) -> Option<usize> {
        self.parents[idx]
    }

    /// Direct replies, oldest first
    pub fn children_of(&self, idx: usize) -> &[usize] {
        &self.children[idx]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of replies at any depth below the root
    pub fn descendant_count(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Nests the arena into reply threads.
    pub fn into_thread(self) -> CommentThreadDto {
        let CommentTree {
            mut nodes, parents, ..
        } = self;

        // Children always sit after their parent, so walking backwards
        // finishes every subtree before the node that owns it. Siblings
        // arrive newest first and are flipped back when their parent is built.
        let mut pending: Vec<Vec<CommentThreadDto>> = (0..nodes.len()).map(|_| Vec::new()).collect();
        let root = nodes.remove(0);
        for (offset, comment) in nodes.into_iter().enumerate().rev() {
            let idx = offset + 1;
            let mut replies = std::mem::take(&mut pending[idx]);
            replies.reverse();
            if let Some(parent) = parents[idx] {
                pending[parent].push(CommentThreadDto { comment, replies });
            }
        }

        let mut replies = std::mem::take(&mut pending[0]);
        replies.reverse();
        CommentThreadDto {
            comment: root,
            replies,
        }
    }
}

/// Loads every reply below `root`, one query per node.
///
/// Uses a work queue rather than recursion, and skips any comment already
/// in the tree so corrupted parent links cannot loop forever.
pub async fn load_tree<S: CommentExt>(store: &S, root: CommentDto) -> Result<CommentTree, ServiceError> {
    let mut visited = HashSet::from([root.id]);
    let mut tree = CommentTree::new(root);
    let mut queue = VecDeque::from([0usize]);

    while let Some(idx) = queue.pop_front() {
        let replies = store.get_replies(tree.node(idx).id).await?;
        for reply in replies {
            if !visited.insert(reply.id) {
                tracing::warn!(
                    comment_id = reply.id,
                    parent_id = ?reply.parent_id,
                    "comment reached twice while loading replies, skipping"
                );
                continue;
            }
            let child = tree.push_child(idx, reply);
            queue.push_back(child);
        }
    }

    Ok(tree)
}

/// Loads a comment by id together with its whole reply thread.
pub async fn load_thread<S: CommentExt>(
    store: &S,
    comment_id: i64,
) -> Result<CommentThreadDto, ServiceError> {
    let root = store
        .get_comment_dto(comment_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(ErrorMessage::CommentNotFound.to_string()))?;

    Ok(load_tree(store, root).await?.into_thread())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::MemoryStore;

    #[tokio::test]
    async fn comment_without_replies_has_no_children() {
        let store = MemoryStore::new();
        let post = store.seed_post("alice");
        let root = store.seed_comment(post, None);

        let thread = load_thread(&store, root).await.unwrap();

        assert_eq!(thread.comment.id, root);
        assert!(thread.replies.is_empty());
    }

    #[tokio::test]
    async fn chain_of_depth_n_has_n_descendants() {
        let store = MemoryStore::new();
        let post = store.seed_post("alice");
        let root = store.seed_comment(post, None);

        let mut ids = vec![root];
        for _ in 0..50 {
            let parent = *ids.last().unwrap();
            ids.push(store.seed_comment(post, Some(parent)));
        }

        let root_dto = store.get_comment_dto(root).await.unwrap().unwrap();
        let tree = load_tree(&store, root_dto).await.unwrap();

        assert_eq!(tree.descendant_count(), 50);
        for idx in 1..tree.node_count() {
            let parent = tree.parent_of(idx).unwrap();
            assert_eq!(tree.node(idx).parent_id, Some(tree.node(parent).id));
        }

        let mut thread = tree.into_thread();
        let mut depth = 0;
        while let Some(reply) = thread.replies.pop() {
            depth += 1;
            assert_eq!(reply.comment.id, ids[depth]);
            thread = reply;
        }
        assert_eq!(depth, 50);
    }

    #[tokio::test]
    async fn siblings_are_oldest_first() {
        let store = MemoryStore::new();
        let post = store.seed_post("alice");
        let root = store.seed_comment(post, None);
        let first = store.seed_comment(post, Some(root));
        let second = store.seed_comment(post, Some(root));
        let nested = store.seed_comment(post, Some(first));

        let thread = load_thread(&store, root).await.unwrap();

        let reply_ids: Vec<i64> = thread.replies.iter().map(|r| r.comment.id).collect();
        assert_eq!(reply_ids, vec![first, second]);
        assert_eq!(thread.replies[0].replies[0].comment.id, nested);
        assert!(thread.replies[1].replies.is_empty());
    }

    #[tokio::test]
    async fn cyclic_parent_links_terminate() {
        let store = MemoryStore::new();
        let post = store.seed_post("alice");
        let a = store.seed_comment(post, None);
        let b = store.seed_comment(post, Some(a));
        let c = store.seed_comment(post, Some(b));
        // corrupt: a now claims c as its parent
        store.set_parent(a, Some(c));

        let root_dto = store.get_comment_dto(a).await.unwrap().unwrap();
        let tree = load_tree(&store, root_dto).await.unwrap();

        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.children_of(2), &[] as &[usize]);
    }

    #[tokio::test]
    async fn reload_gives_same_shape() {
        let store = MemoryStore::new();
        let post = store.seed_post("alice");
        let root = store.seed_comment(post, None);
        let child = store.seed_comment(post, Some(root));
        store.seed_comment(post, Some(child));

        let first = serde_json::to_value(load_thread(&store, root).await.unwrap()).unwrap();
        let second = serde_json::to_value(load_thread(&store, root).await.unwrap()).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unknown_comment_is_not_found() {
        let store = MemoryStore::new();
        let err = load_thread(&store, 77).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    // The parent check and the insert are separate statements, so a parent
    // deleted in between leaves a reply no thread reaches.
    #[tokio::test]
    async fn reply_to_parent_deleted_after_check_is_orphaned() {
        let store = MemoryStore::new();
        let post = store.seed_post("alice");
        let parent = store.seed_comment(post, None);
        let author = store.post(post).user_id;

        assert!(store.get_comment(parent).await.unwrap().is_some());
        store.delete_comment(parent).await.unwrap();
        let reply = store
            .create_comment(author, post, Some(parent), "late reply")
            .await
            .unwrap();

        assert_eq!(reply.parent_id, Some(parent));
        assert!(store.get_comment(parent).await.unwrap().is_none());
        assert_eq!(store.count_root_comments(post).await.unwrap(), 0);
    }
}
