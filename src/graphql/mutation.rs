//! GraphQL mutation resolvers
//!
//! Write operations over users, posts, and comments. Each resolver performs
//! one authorized store write, then derives bus envelopes from the
//! observable state transition. Envelopes are published only after the
//! write commits; a failed write publishes nothing.

use async_graphql::{Context, ErrorExtensions, Object, Result, ID};
use std::sync::Arc;

use crate::auth::{hash_password, verify_password, Identity, TokenManager, MIN_PASSWORD_LEN};
use crate::error::ApiError;
use crate::events::{topics, Event, EventKind};
use crate::graphql::required_identity;
use crate::graphql::types::{
    parse_id, AuthPayload, Comment, CreateCommentInput, CreatePostInput, CreateUserInput,
    LoginInput, Post, UpdateCommentInput, UpdatePostInput, UpdateUserInput, User,
};
use crate::pubsub::TopicBus;
use crate::store::{Database, PostPatch, UserPatch};

/// GraphQL Mutation root
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Register a new account and sign in as it.
    async fn create_user(&self, ctx: &Context<'_>, data: CreateUserInput) -> Result<AuthPayload> {
        let store = ctx.data::<Arc<Database>>()?;
        let tokens = ctx.data::<Arc<TokenManager>>()?;

        validate_name(&data.name).map_err(|e| e.extend())?;
        validate_email(&data.email).map_err(|e| e.extend())?;
        if data.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            ))
            .extend());
        }

        let password_hash = hash_password(&data.password).map_err(|e| e.extend())?;
        let user = store
            .create_user(data.name.trim(), data.email.trim(), &password_hash)
            .map_err(|e| e.extend())?;
        let token = tokens.issue(user.id).map_err(|e| e.extend())?;

        Ok(AuthPayload {
            token,
            user: User(user),
        })
    }

    /// Exchange credentials for a bearer token. Unknown email and wrong
    /// password fail identically.
    async fn login(&self, ctx: &Context<'_>, data: LoginInput) -> Result<AuthPayload> {
        let store = ctx.data::<Arc<Database>>()?;
        let tokens = ctx.data::<Arc<TokenManager>>()?;

        let user = store
            .user_by_email(data.email.trim())
            .map_err(|e| e.extend())?
            .ok_or_else(|| ApiError::InvalidCredential.extend())?;
        if !verify_password(&data.password, &user.password_hash) {
            return Err(ApiError::InvalidCredential.extend());
        }
        let token = tokens.issue(user.id).map_err(|e| e.extend())?;

        Ok(AuthPayload {
            token,
            user: User(user),
        })
    }

    /// Patch the caller's own account.
    async fn update_user(&self, ctx: &Context<'_>, data: UpdateUserInput) -> Result<User> {
        let store = ctx.data::<Arc<Database>>()?;
        let Identity(id) = required_identity(ctx).map_err(|e| e.extend())?;

        if let Some(name) = data.name.as_deref() {
            validate_name(name).map_err(|e| e.extend())?;
        }
        if let Some(email) = data.email.as_deref() {
            validate_email(email).map_err(|e| e.extend())?;
        }
        let patch = UserPatch {
            name: data.name.map(|n| n.trim().to_string()),
            email: data.email.map(|e| e.trim().to_string()),
        };
        let user = store.update_user(id, patch).map_err(|e| e.extend())?;
        Ok(User(user))
    }

    /// Delete the caller's account, cascading their posts and comments. The
    /// cascade publishes no envelopes.
    async fn delete_user(&self, ctx: &Context<'_>) -> Result<User> {
        let store = ctx.data::<Arc<Database>>()?;
        let Identity(id) = required_identity(ctx).map_err(|e| e.extend())?;
        let user = store.delete_user(id).map_err(|e| e.extend())?;
        Ok(User(user))
    }

    /// Create a post. Landing it published announces it on the global post
    /// topic and the author's topic.
    async fn create_post(&self, ctx: &Context<'_>, data: CreatePostInput) -> Result<Post> {
        let store = ctx.data::<Arc<Database>>()?;
        let bus = ctx.data::<Arc<TopicBus>>()?;
        let Identity(author_id) = required_identity(ctx).map_err(|e| e.extend())?;

        if data.title.trim().is_empty() {
            return Err(ApiError::validation("Title must not be blank").extend());
        }
        let post = store
            .create_post(author_id, data.title.trim(), &data.body, data.published)
            .map_err(|e| e.extend())?;

        if post.published {
            bus.publish(topics::POSTS, Event::post(EventKind::Created, post.clone()))
                .await;
            bus.publish(
                &topics::author_posts(author_id),
                Event::post(EventKind::Created, post.clone()),
            )
            .await;
        }
        Ok(Post(post))
    }

    /// Patch a post the caller owns. A publish-flag transition removes the
    /// post's comments and maps to a lifecycle envelope: draft-to-published
    /// is CREATED, published-to-draft is DELETED carrying the last public
    /// snapshot. An edit that stays published is UPDATED.
    async fn update_post(&self, ctx: &Context<'_>, id: ID, data: UpdatePostInput) -> Result<Post> {
        let store = ctx.data::<Arc<Database>>()?;
        let bus = ctx.data::<Arc<TopicBus>>()?;
        let Identity(owner) = required_identity(ctx).map_err(|e| e.extend())?;
        let post_id = parse_id(&id, "Post").map_err(|e| e.extend())?;

        let patch = PostPatch {
            title: data.title,
            body: data.body,
            published: data.published,
        };
        let update = store
            .update_post(post_id, owner, patch)
            .map_err(|e| e.extend())?;

        match crate::events::post_transition(update.before.published, update.after.published) {
            Some(EventKind::Created) => {
                bus.publish(
                    topics::POSTS,
                    Event::post(EventKind::Created, update.after.clone()),
                )
                .await;
                bus.publish(
                    &topics::author_posts(owner),
                    Event::post(EventKind::Created, update.after.clone()),
                )
                .await;
            }
            Some(EventKind::Updated) => {
                bus.publish(
                    topics::POSTS,
                    Event::post(EventKind::Updated, update.after.clone()),
                )
                .await;
            }
            Some(EventKind::Deleted) => {
                bus.publish(
                    topics::POSTS,
                    Event::post(EventKind::Deleted, update.before.clone()),
                )
                .await;
            }
            None => {}
        }
        Ok(Post(update.after))
    }

    /// Delete a post the caller owns, removing its comments. A published
    /// post announces its removal on the global topic.
    async fn delete_post(&self, ctx: &Context<'_>, id: ID) -> Result<Post> {
        let store = ctx.data::<Arc<Database>>()?;
        let bus = ctx.data::<Arc<TopicBus>>()?;
        let Identity(owner) = required_identity(ctx).map_err(|e| e.extend())?;
        let post_id = parse_id(&id, "Post").map_err(|e| e.extend())?;

        let (post, _comments_removed) = store
            .delete_post(post_id, owner)
            .map_err(|e| e.extend())?;
        if post.published {
            bus.publish(topics::POSTS, Event::post(EventKind::Deleted, post.clone()))
                .await;
        }
        Ok(Post(post))
    }

    /// Comment on a post visible to the caller.
    async fn create_comment(
        &self,
        ctx: &Context<'_>,
        data: CreateCommentInput,
    ) -> Result<Comment> {
        let store = ctx.data::<Arc<Database>>()?;
        let bus = ctx.data::<Arc<TopicBus>>()?;
        let Identity(author_id) = required_identity(ctx).map_err(|e| e.extend())?;
        let post_id = parse_id(&data.post_id, "Post").map_err(|e| e.extend())?;

        let comment = store
            .create_comment(author_id, post_id, &data.text)
            .map_err(|e| e.extend())?;
        bus.publish(
            &topics::post_comments(post_id),
            Event::comment(EventKind::Created, comment.clone()),
        )
        .await;
        Ok(Comment(comment))
    }

    /// Edit a comment the caller owns.
    async fn update_comment(
        &self,
        ctx: &Context<'_>,
        id: ID,
        data: UpdateCommentInput,
    ) -> Result<Comment> {
        let store = ctx.data::<Arc<Database>>()?;
        let bus = ctx.data::<Arc<TopicBus>>()?;
        let Identity(owner) = required_identity(ctx).map_err(|e| e.extend())?;
        let comment_id = parse_id(&id, "Comment").map_err(|e| e.extend())?;

        let comment = store
            .update_comment(comment_id, owner, &data.text)
            .map_err(|e| e.extend())?;
        bus.publish(
            &topics::post_comments(comment.post_id),
            Event::comment(EventKind::Updated, comment.clone()),
        )
        .await;
        Ok(Comment(comment))
    }

    /// Remove a comment the caller owns.
    async fn delete_comment(&self, ctx: &Context<'_>, id: ID) -> Result<Comment> {
        let store = ctx.data::<Arc<Database>>()?;
        let bus = ctx.data::<Arc<TopicBus>>()?;
        let Identity(owner) = required_identity(ctx).map_err(|e| e.extend())?;
        let comment_id = parse_id(&id, "Comment").map_err(|e| e.extend())?;

        let comment = store
            .delete_comment(comment_id, owner)
            .map_err(|e| e.extend())?;
        bus.publish(
            &topics::post_comments(comment.post_id),
            Event::comment(EventKind::Deleted, comment.clone()),
        )
        .await;
        Ok(Comment(comment))
    }
}

fn validate_name(name: &str) -> std::result::Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::validation("Name must not be blank"));
    }
    Ok(())
}

fn validate_email(email: &str) -> std::result::Result<(), ApiError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::validation("Email address is not valid"));
    }
    Ok(())
}
