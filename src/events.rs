//! Content-change events carried by the topic bus.
//!
//! Mutations derive at most one event per observable state transition and
//! publish it after the write commits. Subscribers receive full resource
//! snapshots, never ids-to-refetch, so delivery filters can run without
//! touching the store (the author stream is the one deliberate exception).

use crate::store::{Comment, Post};

/// What happened to the resource, from a subscriber's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

/// Snapshot carried in an event envelope.
#[derive(Debug, Clone)]
pub enum Resource {
    Post(Post),
    Comment(Comment),
}

/// An envelope published to a bus topic.
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub resource: Resource,
}

impl Event {
    pub fn post(kind: EventKind, post: Post) -> Self {
        Event {
            kind,
            resource: Resource::Post(post),
        }
    }

    pub fn comment(kind: EventKind, comment: Comment) -> Self {
        Event {
            kind,
            resource: Resource::Comment(comment),
        }
    }
}

/// Topic naming. Topics are plain strings matched exactly by the bus.
pub mod topics {
    /// Global post lifecycle topic.
    pub const POSTS: &str = "posts";

    /// Per-post comment topic.
    pub fn post_comments(post_id: i64) -> String {
        format!("posts.{post_id}.comments")
    }

    /// Per-author topic carrying that author's post events.
    pub fn author_posts(author_id: i64) -> String {
        format!("authors.{author_id}.posts")
    }
}

/// Event kind implied by a change to a post's published flag.
///
/// From the outside world's perspective a post only exists while it is
/// published, so publishing looks like a creation and unpublishing looks
/// like a deletion; an edit is only an update if the post was public on
/// both sides of the write. A draft edited while still a draft produces
/// nothing.
pub fn post_transition(was_published: bool, is_published: bool) -> Option<EventKind> {
    match (was_published, is_published) {
        (false, false) => None,
        (false, true) => Some(EventKind::Created),
        (true, true) => Some(EventKind::Updated),
        (true, false) => Some(EventKind::Deleted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table() {
        assert_eq!(post_transition(false, false), None);
        assert_eq!(post_transition(false, true), Some(EventKind::Created));
        assert_eq!(post_transition(true, true), Some(EventKind::Updated));
        assert_eq!(post_transition(true, false), Some(EventKind::Deleted));
    }

    #[test]
    fn topic_names_are_stable() {
        assert_eq!(topics::POSTS, "posts");
        assert_eq!(topics::post_comments(7), "posts.7.comments");
        assert_eq!(topics::author_posts(3), "authors.3.posts");
    }
}
