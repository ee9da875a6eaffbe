//! GraphQL object and input types.
//!
//! Stored rows are wrapped in newtypes with `#[Object]` impls so relational
//! fields (`Post.author`, `User.posts`, ...) resolve lazily against the
//! store, and field-level authorization (a user's email, another author's
//! drafts) can consult the caller's identity.

use async_graphql::{Context, Enum, ErrorExtensions, InputObject, Object, Result, SimpleObject, ID};
use std::sync::Arc;

use crate::auth::Identity;
use crate::error::ApiError;
use crate::events::{Event, EventKind, Resource};
use crate::graphql::current_identity;
use crate::store::{self, Database, Page};

/// Render a stored unix-millisecond timestamp as RFC 3339.
pub fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

/// Parse a client-supplied `ID` into a rowid. An unparsable id cannot name
/// any resource, so it reports as the resource being absent.
pub fn parse_id(id: &ID, kind: &'static str) -> std::result::Result<i64, ApiError> {
    id.parse::<i64>().map_err(|_| ApiError::NotFound(kind))
}

/// Cap applied to nested relation fields, which take no pagination args.
const RELATION_LIMIT: i64 = 100;

/// A user account.
pub struct User(pub store::User);

#[Object]
impl User {
    async fn id(&self) -> ID {
        ID(self.0.id.to_string())
    }

    async fn name(&self) -> &str {
        &self.0.name
    }

    /// The account email, visible only to the account's owner; everyone
    /// else reads null.
    async fn email(&self, ctx: &Context<'_>) -> Result<Option<&str>> {
        let viewer = current_identity(ctx, false).map_err(|e| e.extend())?;
        Ok(match viewer {
            Some(Identity(id)) if id == self.0.id => Some(self.0.email.as_str()),
            _ => None,
        })
    }

    /// The user's posts. Drafts are included only when the caller is the
    /// user themself.
    async fn posts(&self, ctx: &Context<'_>) -> Result<Vec<Post>> {
        let store = ctx.data::<Arc<Database>>()?;
        let viewer = current_identity(ctx, false).map_err(|e| e.extend())?;
        let include_drafts = viewer == Some(Identity(self.0.id));
        let posts = store
            .posts_by_author(self.0.id, include_drafts, None, Page::new(0, RELATION_LIMIT))
            .map_err(|e| e.extend())?;
        Ok(posts.into_iter().map(Post).collect())
    }

    /// The user's comments on posts the caller can see.
    async fn comments(&self, ctx: &Context<'_>) -> Result<Vec<Comment>> {
        let store = ctx.data::<Arc<Database>>()?;
        let viewer = current_identity(ctx, false).map_err(|e| e.extend())?;
        let comments = store
            .comments_by_author(self.0.id, viewer.map(|i| i.0))
            .map_err(|e| e.extend())?;
        Ok(comments.into_iter().map(Comment).collect())
    }

    async fn created_at(&self) -> String {
        format_timestamp(self.0.created_at)
    }

    async fn updated_at(&self) -> String {
        format_timestamp(self.0.updated_at)
    }
}

/// A post, draft or published.
pub struct Post(pub store::Post);

#[Object]
impl Post {
    async fn id(&self) -> ID {
        ID(self.0.id.to_string())
    }

    async fn title(&self) -> &str {
        &self.0.title
    }

    async fn body(&self) -> &str {
        &self.0.body
    }

    async fn published(&self) -> bool {
        self.0.published
    }

    async fn author(&self, ctx: &Context<'_>) -> Result<User> {
        let store = ctx.data::<Arc<Database>>()?;
        let user = store
            .user_by_id(self.0.author_id)
            .map_err(|e| e.extend())?
            .ok_or_else(|| ApiError::NotFound("User").extend())?;
        Ok(User(user))
    }

    async fn comments(&self, ctx: &Context<'_>) -> Result<Vec<Comment>> {
        let store = ctx.data::<Arc<Database>>()?;
        let comments = store.comments_for_post(self.0.id).map_err(|e| e.extend())?;
        Ok(comments.into_iter().map(Comment).collect())
    }

    async fn created_at(&self) -> String {
        format_timestamp(self.0.created_at)
    }

    async fn updated_at(&self) -> String {
        format_timestamp(self.0.updated_at)
    }
}

/// A comment on a post.
pub struct Comment(pub store::Comment);

#[Object]
impl Comment {
    async fn id(&self) -> ID {
        ID(self.0.id.to_string())
    }

    async fn text(&self) -> &str {
        &self.0.text
    }

    async fn author(&self, ctx: &Context<'_>) -> Result<User> {
        let store = ctx.data::<Arc<Database>>()?;
        let user = store
            .user_by_id(self.0.author_id)
            .map_err(|e| e.extend())?
            .ok_or_else(|| ApiError::NotFound("User").extend())?;
        Ok(User(user))
    }

    async fn post(&self, ctx: &Context<'_>) -> Result<Post> {
        let store = ctx.data::<Arc<Database>>()?;
        let post = store
            .post_by_id(self.0.post_id)
            .map_err(|e| e.extend())?
            .ok_or_else(|| ApiError::NotFound("Post").extend())?;
        Ok(Post(post))
    }

    async fn created_at(&self) -> String {
        format_timestamp(self.0.created_at)
    }

    async fn updated_at(&self) -> String {
        format_timestamp(self.0.updated_at)
    }
}

/// Signup/login result: a signed bearer token plus the account.
#[derive(SimpleObject)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

/// What a subscription envelope says happened.
#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum MutationType {
    Created,
    Updated,
    Deleted,
}

impl From<EventKind> for MutationType {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Created => MutationType::Created,
            EventKind::Updated => MutationType::Updated,
            EventKind::Deleted => MutationType::Deleted,
        }
    }
}

/// Post lifecycle envelope delivered to subscribers.
#[derive(SimpleObject)]
pub struct PostEvent {
    pub mutation: MutationType,
    pub data: Post,
}

/// Comment envelope delivered to subscribers of one post's comment stream.
#[derive(SimpleObject)]
pub struct CommentEvent {
    pub mutation: MutationType,
    pub data: Comment,
}

/// Convert a bus envelope into the post wire payload. Non-post envelopes
/// (which should never appear on post topics) convert to nothing.
pub fn event_to_post_payload(event: Event) -> Option<PostEvent> {
    match event.resource {
        Resource::Post(post) => Some(PostEvent {
            mutation: event.kind.into(),
            data: Post(post),
        }),
        Resource::Comment(_) => None,
    }
}

/// Convert a bus envelope into the comment wire payload.
pub fn event_to_comment_payload(event: Event) -> Option<CommentEvent> {
    match event.resource {
        Resource::Comment(comment) => Some(CommentEvent {
            mutation: event.kind.into(),
            data: Comment(comment),
        }),
        Resource::Post(_) => None,
    }
}

#[derive(InputObject, Debug)]
pub struct CreateUserInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(InputObject, Debug)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(InputObject, Debug)]
pub struct UpdateUserInput {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(InputObject, Debug)]
pub struct CreatePostInput {
    pub title: String,
    pub body: String,
    #[graphql(default = false)]
    pub published: bool,
}

#[derive(InputObject, Debug)]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub body: Option<String>,
    pub published: Option<bool>,
}

#[derive(InputObject, Debug)]
pub struct CreateCommentInput {
    pub post_id: ID,
    pub text: String,
}

#[derive(InputObject, Debug)]
pub struct UpdateCommentInput {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_render_rfc3339() {
        let rendered = format_timestamp(1_700_000_000_000);
        assert!(rendered.starts_with("2023-11-14T"));
        assert!(rendered.ends_with("+00:00"));
    }

    #[test]
    fn ids_parse_or_report_absent() {
        assert_eq!(parse_id(&ID("42".to_string()), "Post").unwrap(), 42);
        let err = parse_id(&ID("not-a-number".to_string()), "Post").unwrap_err();
        assert!(matches!(err, ApiError::NotFound("Post")));
    }

    #[test]
    fn event_payload_conversions_are_kind_safe() {
        let post = store::Post {
            id: 1,
            author_id: 1,
            title: "t".into(),
            body: "b".into(),
            published: true,
            created_at: 0,
            updated_at: 0,
        };
        let payload =
            event_to_post_payload(Event::post(EventKind::Updated, post.clone())).expect("post");
        assert_eq!(payload.mutation, MutationType::Updated);
        assert!(event_to_comment_payload(Event::post(EventKind::Updated, post)).is_none());
    }
}
