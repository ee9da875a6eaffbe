//! GraphQL query resolvers
//!
//! Read-only access to users, posts, and comments. Every collection
//! resolver funnels its pagination arguments through [`page_args`] and its
//! results through the store's visibility-aware listings, so anonymous
//! callers never observe drafts or their comments.

use async_graphql::{Context, ErrorExtensions, Object, Result, ID};
use std::sync::Arc;

use crate::auth::Identity;
use crate::config::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::error::ApiError;
use crate::graphql::types::{parse_id, Comment, Post, User};
use crate::graphql::{current_identity, required_identity};
use crate::store::{Database, Page};

/// GraphQL Query root
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// The authenticated caller's own account.
    async fn me(&self, ctx: &Context<'_>) -> Result<User> {
        let store = ctx.data::<Arc<Database>>()?;
        let Identity(id) = required_identity(ctx).map_err(|e| e.extend())?;
        let user = store
            .user_by_id(id)
            .map_err(|e| e.extend())?
            .ok_or_else(|| ApiError::NotFound("User").extend())?;
        Ok(User(user))
    }

    /// A single post by id. Drafts resolve only for their author; everyone
    /// else reads null, indistinguishable from a missing post.
    async fn post(&self, ctx: &Context<'_>, id: ID) -> Result<Option<Post>> {
        let store = ctx.data::<Arc<Database>>()?;
        let viewer = current_identity(ctx, false).map_err(|e| e.extend())?;
        let Ok(post_id) = id.parse::<i64>() else {
            return Ok(None);
        };
        let post = store.post_by_id(post_id).map_err(|e| e.extend())?;
        Ok(post
            .filter(|p| p.published || viewer == Some(Identity(p.author_id)))
            .map(Post))
    }

    /// List users, name-ascending.
    async fn users(
        &self,
        ctx: &Context<'_>,
        #[graphql(desc = "Substring match over name or email (case-sensitive)")] query: Option<
            String,
        >,
        offset: Option<i64>,
        limit: Option<i64>,
        #[graphql(desc = "Return rows with id greater than this cursor")] after: Option<ID>,
    ) -> Result<Vec<User>> {
        let store = ctx.data::<Arc<Database>>()?;
        let page = page_args(offset, limit, after).map_err(|e| e.extend())?;
        let users = store
            .list_users(query.as_deref(), page)
            .map_err(|e| e.extend())?;
        Ok(users.into_iter().map(User).collect())
    }

    /// List posts visible to the caller: published ones, plus the caller's
    /// own drafts. Most recently updated first.
    async fn posts(
        &self,
        ctx: &Context<'_>,
        #[graphql(desc = "Substring match over title or body (case-sensitive)")] query: Option<
            String,
        >,
        offset: Option<i64>,
        limit: Option<i64>,
        #[graphql(desc = "Return rows with id greater than this cursor")] after: Option<ID>,
    ) -> Result<Vec<Post>> {
        let store = ctx.data::<Arc<Database>>()?;
        let viewer = current_identity(ctx, false).map_err(|e| e.extend())?;
        let page = page_args(offset, limit, after).map_err(|e| e.extend())?;
        let posts = store
            .list_posts(viewer.map(|i| i.0), query.as_deref(), page)
            .map_err(|e| e.extend())?;
        Ok(posts.into_iter().map(Post).collect())
    }

    /// The caller's own posts, drafts included.
    async fn my_posts(
        &self,
        ctx: &Context<'_>,
        #[graphql(desc = "Substring match over title or body (case-sensitive)")] query: Option<
            String,
        >,
        offset: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<Post>> {
        let store = ctx.data::<Arc<Database>>()?;
        let Identity(id) = required_identity(ctx).map_err(|e| e.extend())?;
        let page = page_args(offset, limit, None).map_err(|e| e.extend())?;
        let posts = store
            .posts_by_author(id, true, query.as_deref(), page)
            .map_err(|e| e.extend())?;
        Ok(posts.into_iter().map(Post).collect())
    }

    /// List comments on posts the caller can see. Most recently updated
    /// first.
    async fn comments(
        &self,
        ctx: &Context<'_>,
        #[graphql(desc = "Substring match over comment text (case-sensitive)")] query: Option<
            String,
        >,
        offset: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<Comment>> {
        let store = ctx.data::<Arc<Database>>()?;
        let viewer = current_identity(ctx, false).map_err(|e| e.extend())?;
        let page = page_args(offset, limit, None).map_err(|e| e.extend())?;
        let comments = store
            .list_comments(viewer.map(|i| i.0), query.as_deref(), page)
            .map_err(|e| e.extend())?;
        Ok(comments.into_iter().map(Comment).collect())
    }
}

/// Normalize pagination arguments. Negative offsets and non-positive limits
/// are rejected; oversized limits are capped, not rejected.
pub(crate) fn page_args(
    offset: Option<i64>,
    limit: Option<i64>,
    after: Option<ID>,
) -> std::result::Result<Page, ApiError> {
    let offset = offset.unwrap_or(0);
    if offset < 0 {
        return Err(ApiError::validation("Offset must not be negative"));
    }
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if limit < 1 {
        return Err(ApiError::validation("Limit must be at least 1"));
    }
    let after = match after {
        Some(id) => Some(
            parse_id(&id, "cursor").map_err(|_| ApiError::validation("Malformed after cursor"))?,
        ),
        None => None,
    };
    Ok(Page::new(offset, limit.min(MAX_PAGE_SIZE)).with_after(after))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_args_apply_defaults_and_cap() {
        let page = page_args(None, None, None).expect("defaults");
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(page.after, None);

        let capped = page_args(Some(5), Some(10_000), None).expect("capped");
        assert_eq!(capped.offset, 5);
        assert_eq!(capped.limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn page_args_reject_bad_bounds() {
        assert!(matches!(
            page_args(Some(-1), None, None),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            page_args(None, Some(0), None),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            page_args(None, None, Some(ID("abc".to_string()))),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn page_args_parse_cursor() {
        let page = page_args(None, None, Some(ID("7".to_string()))).expect("cursor");
        assert_eq!(page.after, Some(7));
    }
}
