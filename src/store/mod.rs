//! Embedded SQLite persistence for Inkpress
//!
//! All content lives in three relational tables (users, posts, comments)
//! inside a single SQLite database, either file-backed or in-memory. Access
//! is serialized through a `Mutex` around the connection; every operation
//! that reads and then writes (ownership checks, publish-flag transitions,
//! cascades) runs inside one locked transaction, so concurrent mutations
//! can never observe or produce a half-applied state.
//!
//! Timestamps are stored as unix milliseconds and rendered to RFC 3339 at
//! the API boundary.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::error::{ApiError, Result};

/// A stored user account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A stored post. `published` gates visibility: drafts are only visible to
/// their author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub body: String,
    pub published: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A stored comment attached to a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: i64,
    pub author_id: i64,
    pub post_id: i64,
    pub text: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Partial update for a user row. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Partial update for a post row.
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub published: Option<bool>,
}

/// Result of an atomic post update: the row as it was, the row as it is,
/// and how many comments the publish-flag cascade removed.
#[derive(Debug, Clone)]
pub struct PostUpdate {
    pub before: Post,
    pub after: Post,
    pub comments_removed: usize,
}

/// Window into a collection listing. `after` switches the listing to
/// id-ascending cursor pages; otherwise the collection's fixed order
/// applies.
#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
    pub after: Option<i64>,
}

impl Page {
    pub fn new(offset: i64, limit: i64) -> Self {
        Page {
            offset,
            limit,
            after: None,
        }
    }

    pub fn with_after(mut self, after: Option<i64>) -> Self {
        self.after = after;
        self
    }
}

/// SQLite-backed content store.
pub struct Database {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at    INTEGER NOT NULL,
    updated_at    INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS posts (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    author_id  INTEGER NOT NULL REFERENCES users(id),
    title      TEXT NOT NULL,
    body       TEXT NOT NULL,
    published  INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS comments (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    author_id  INTEGER NOT NULL REFERENCES users(id),
    post_id    INTEGER NOT NULL REFERENCES posts(id),
    text       TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id);
CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id);
CREATE INDEX IF NOT EXISTS idx_comments_author ON comments(author_id);
";

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Map a UNIQUE-constraint failure on users.email to a validation error;
/// everything else stays a storage error.
fn map_unique_email(err: rusqlite::Error) -> ApiError {
    if let rusqlite::Error::SqliteFailure(ref e, _) = err {
        if e.code == rusqlite::ErrorCode::ConstraintViolation {
            return ApiError::validation("Email already in use");
        }
    }
    ApiError::Storage(err)
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn post_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        author_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        published: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn comment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        author_id: row.get(1)?,
        post_id: row.get(2)?,
        text: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

const USER_COLS: &str = "id, name, email, password_hash, created_at, updated_at";
const POST_COLS: &str = "id, author_id, title, body, published, created_at, updated_at";
const COMMENT_COLS: &str = "id, author_id, post_id, text, created_at, updated_at";

impl Database {
    /// Open (and bootstrap) a file-backed database, creating the parent
    /// directory if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::bootstrap(conn)
    }

    /// Open an in-memory database; used by `--in-memory` mode and tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(conn)
    }

    fn bootstrap(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    // ---- users ----------------------------------------------------------

    pub fn create_user(&self, name: &str, email: &str, password_hash: &str) -> Result<User> {
        let conn = self.conn.lock();
        let now = now_millis();
        conn.execute(
            "INSERT INTO users (name, email, password_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![name, email, password_hash, now],
        )
        .map_err(map_unique_email)?;
        Ok(User {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn user_by_id(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLS} FROM users WHERE email = ?1"),
                params![email],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Patch a user row, refreshing `updated_at`. A duplicate email maps to
    /// a validation failure.
    pub fn update_user(&self, id: i64, patch: UserPatch) -> Result<User> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let before = Self::user_row(&tx, id)?.ok_or(ApiError::NotFound("User"))?;
        let name = patch.name.unwrap_or_else(|| before.name.clone());
        let email = patch.email.unwrap_or_else(|| before.email.clone());
        let now = now_millis();
        tx.execute(
            "UPDATE users SET name = ?1, email = ?2, updated_at = ?3 WHERE id = ?4",
            params![name, email, now, id],
        )
        .map_err(map_unique_email)?;
        tx.commit()?;
        Ok(User {
            name,
            email,
            updated_at: now,
            ..before
        })
    }

    /// Remove a user and everything that hangs off them: their comments,
    /// comments on their posts, and their posts. Returns the removed row.
    pub fn delete_user(&self, id: i64) -> Result<User> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let user = Self::user_row(&tx, id)?.ok_or(ApiError::NotFound("User"))?;
        tx.execute(
            "DELETE FROM comments
             WHERE author_id = ?1
                OR post_id IN (SELECT id FROM posts WHERE author_id = ?1)",
            params![id],
        )?;
        tx.execute("DELETE FROM posts WHERE author_id = ?1", params![id])?;
        tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(user)
    }

    /// List users, name-ascending. The filter is a case-sensitive substring
    /// match on name or email.
    pub fn list_users(&self, filter: Option<&str>, page: Page) -> Result<Vec<User>> {
        let order = if page.after.is_some() {
            "id ASC"
        } else {
            "name ASC, id ASC"
        };
        let sql = format!(
            "SELECT {USER_COLS} FROM users
             WHERE (?1 IS NULL OR instr(name, ?1) > 0 OR instr(email, ?1) > 0)
               AND (?2 IS NULL OR id > ?2)
             ORDER BY {order} LIMIT ?3 OFFSET ?4"
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![filter, page.after, page.limit, page.offset],
            user_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn user_row(conn: &Connection, id: i64) -> Result<Option<User>> {
        Ok(conn
            .query_row(
                &format!("SELECT {USER_COLS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()?)
    }

    // ---- posts ----------------------------------------------------------

    pub fn create_post(
        &self,
        author_id: i64,
        title: &str,
        body: &str,
        published: bool,
    ) -> Result<Post> {
        let conn = self.conn.lock();
        let now = now_millis();
        conn.execute(
            "INSERT INTO posts (author_id, title, body, published, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![author_id, title, body, published, now],
        )?;
        Ok(Post {
            id: conn.last_insert_rowid(),
            author_id,
            title: title.to_string(),
            body: body.to_string(),
            published,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn post_by_id(&self, id: i64) -> Result<Option<Post>> {
        let conn = self.conn.lock();
        Self::post_row(&conn, id)
    }

    /// Atomically patch a post owned by `owner`. Ownership and existence are
    /// checked under the same lock as the write. A publish-flag transition
    /// (in either direction) removes the post's comments in the same
    /// transaction, before anything downstream can observe the new state.
    pub fn update_post(&self, id: i64, owner: i64, patch: PostPatch) -> Result<PostUpdate> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let before = Self::post_row(&tx, id)?.ok_or(ApiError::NotFound("Post"))?;
        if before.author_id != owner {
            return Err(ApiError::NotAuthorized);
        }
        let title = patch.title.unwrap_or_else(|| before.title.clone());
        let body = patch.body.unwrap_or_else(|| before.body.clone());
        let published = patch.published.unwrap_or(before.published);
        let now = now_millis();
        tx.execute(
            "UPDATE posts SET title = ?1, body = ?2, published = ?3, updated_at = ?4
             WHERE id = ?5",
            params![title, body, published, now, id],
        )?;
        let comments_removed = if published != before.published {
            tx.execute("DELETE FROM comments WHERE post_id = ?1", params![id])?
        } else {
            0
        };
        tx.commit()?;
        let after = Post {
            title,
            body,
            published,
            updated_at: now,
            ..before.clone()
        };
        Ok(PostUpdate {
            before,
            after,
            comments_removed,
        })
    }

    /// Atomically delete a post owned by `owner`, cascading its comments.
    /// Returns the removed snapshot and the number of comments cascaded.
    pub fn delete_post(&self, id: i64, owner: i64) -> Result<(Post, usize)> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let post = Self::post_row(&tx, id)?.ok_or(ApiError::NotFound("Post"))?;
        if post.author_id != owner {
            return Err(ApiError::NotAuthorized);
        }
        let comments_removed =
            tx.execute("DELETE FROM comments WHERE post_id = ?1", params![id])?;
        tx.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok((post, comments_removed))
    }

    /// List posts visible to `viewer`: published ones, plus the viewer's own
    /// drafts. Most-recently-updated first. The filter is a case-sensitive
    /// substring match on title or body.
    pub fn list_posts(
        &self,
        viewer: Option<i64>,
        filter: Option<&str>,
        page: Page,
    ) -> Result<Vec<Post>> {
        let order = if page.after.is_some() {
            "id ASC"
        } else {
            "updated_at DESC, id DESC"
        };
        let sql = format!(
            "SELECT {POST_COLS} FROM posts
             WHERE (published = 1 OR author_id = ?1)
               AND (?2 IS NULL OR instr(title, ?2) > 0 OR instr(body, ?2) > 0)
               AND (?3 IS NULL OR id > ?3)
             ORDER BY {order} LIMIT ?4 OFFSET ?5"
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![viewer, filter, page.after, page.limit, page.offset],
            post_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// List one author's posts, optionally including drafts (only the author
    /// themself gets those).
    pub fn posts_by_author(
        &self,
        author_id: i64,
        include_drafts: bool,
        filter: Option<&str>,
        page: Page,
    ) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT {POST_COLS} FROM posts
             WHERE author_id = ?1
               AND (?2 OR published = 1)
               AND (?3 IS NULL OR instr(title, ?3) > 0 OR instr(body, ?3) > 0)
             ORDER BY updated_at DESC, id DESC LIMIT ?4 OFFSET ?5"
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![author_id, include_drafts, filter, page.limit, page.offset],
            post_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn post_row(conn: &Connection, id: i64) -> Result<Option<Post>> {
        Ok(conn
            .query_row(
                &format!("SELECT {POST_COLS} FROM posts WHERE id = ?1"),
                params![id],
                post_from_row,
            )
            .optional()?)
    }

    // ---- comments -------------------------------------------------------

    /// Create a comment. The parent post must exist and be visible to the
    /// commenting user; an invisible post behaves exactly like a missing
    /// one.
    pub fn create_comment(&self, author_id: i64, post_id: i64, text: &str) -> Result<Comment> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let post = Self::post_row(&tx, post_id)?.ok_or(ApiError::NotFound("Post"))?;
        if !post.published && post.author_id != author_id {
            return Err(ApiError::NotFound("Post"));
        }
        let now = now_millis();
        tx.execute(
            "INSERT INTO comments (author_id, post_id, text, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![author_id, post_id, text, now],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Comment {
            id,
            author_id,
            post_id,
            text: text.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn comment_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                &format!("SELECT {COMMENT_COLS} FROM comments WHERE id = ?1"),
                params![id],
                comment_from_row,
            )
            .optional()?)
    }

    /// Atomically replace a comment's text; only its author may do so.
    pub fn update_comment(&self, id: i64, owner: i64, text: &str) -> Result<Comment> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let before = Self::comment_row(&tx, id)?.ok_or(ApiError::NotFound("Comment"))?;
        if before.author_id != owner {
            return Err(ApiError::NotAuthorized);
        }
        let now = now_millis();
        tx.execute(
            "UPDATE comments SET text = ?1, updated_at = ?2 WHERE id = ?3",
            params![text, now, id],
        )?;
        tx.commit()?;
        Ok(Comment {
            text: text.to_string(),
            updated_at: now,
            ..before
        })
    }

    /// Atomically delete a comment owned by `owner`, returning the snapshot.
    pub fn delete_comment(&self, id: i64, owner: i64) -> Result<Comment> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let comment = Self::comment_row(&tx, id)?.ok_or(ApiError::NotFound("Comment"))?;
        if comment.author_id != owner {
            return Err(ApiError::NotAuthorized);
        }
        tx.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(comment)
    }

    /// List comments on posts visible to `viewer`, most-recently-updated
    /// first. The filter matches the comment text.
    pub fn list_comments(
        &self,
        viewer: Option<i64>,
        filter: Option<&str>,
        page: Page,
    ) -> Result<Vec<Comment>> {
        let order = if page.after.is_some() {
            "c.id ASC"
        } else {
            "c.updated_at DESC, c.id DESC"
        };
        let sql = format!(
            "SELECT c.id, c.author_id, c.post_id, c.text, c.created_at, c.updated_at
             FROM comments c JOIN posts p ON p.id = c.post_id
             WHERE (p.published = 1 OR p.author_id = ?1)
               AND (?2 IS NULL OR instr(c.text, ?2) > 0)
               AND (?3 IS NULL OR c.id > ?3)
             ORDER BY {order} LIMIT ?4 OFFSET ?5"
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![viewer, filter, page.after, page.limit, page.offset],
            comment_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn comments_for_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COMMENT_COLS} FROM comments WHERE post_id = ?1
             ORDER BY updated_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![post_id], comment_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// One author's comments, restricted to parent posts `viewer` can see.
    pub fn comments_by_author(&self, author_id: i64, viewer: Option<i64>) -> Result<Vec<Comment>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.author_id, c.post_id, c.text, c.created_at, c.updated_at
             FROM comments c JOIN posts p ON p.id = c.post_id
             WHERE c.author_id = ?1 AND (p.published = 1 OR p.author_id = ?2)
             ORDER BY c.updated_at DESC, c.id DESC",
        )?;
        let rows = stmt.query_map(params![author_id, viewer], comment_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn comment_row(conn: &Connection, id: i64) -> Result<Option<Comment>> {
        Ok(conn
            .query_row(
                &format!("SELECT {COMMENT_COLS} FROM comments WHERE id = ?1"),
                params![id],
                comment_from_row,
            )
            .optional()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().expect("in-memory database")
    }

    fn seed_user(db: &Database, name: &str, email: &str) -> User {
        db.create_user(name, email, "hash").expect("create user")
    }

    #[test]
    fn create_and_fetch_user() {
        let db = db();
        let user = seed_user(&db, "alice", "alice@example.com");
        assert!(user.id > 0);
        let found = db.user_by_id(user.id).unwrap().unwrap();
        assert_eq!(found, user);
        let by_email = db.user_by_email("alice@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert!(db.user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_is_validation_failure() {
        let db = db();
        seed_user(&db, "alice", "alice@example.com");
        let err = db
            .create_user("impostor", "alice@example.com", "hash")
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)), "got {err:?}");
    }

    #[test]
    fn update_user_patches_and_keeps_rest() {
        let db = db();
        let user = seed_user(&db, "alice", "alice@example.com");
        let updated = db
            .update_user(
                user.id,
                UserPatch {
                    name: Some("alicia".into()),
                    email: None,
                },
            )
            .unwrap();
        assert_eq!(updated.name, "alicia");
        assert_eq!(updated.email, "alice@example.com");
        assert!(updated.updated_at >= user.updated_at);
    }

    #[test]
    fn update_user_duplicate_email_rejected() {
        let db = db();
        seed_user(&db, "alice", "alice@example.com");
        let bob = seed_user(&db, "bob", "bob@example.com");
        let err = db
            .update_user(
                bob.id,
                UserPatch {
                    name: None,
                    email: Some("alice@example.com".into()),
                },
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn delete_user_cascades_posts_and_comments() {
        let db = db();
        let alice = seed_user(&db, "alice", "alice@example.com");
        let bob = seed_user(&db, "bob", "bob@example.com");
        let post = db.create_post(alice.id, "Hello", "world", true).unwrap();
        db.create_comment(bob.id, post.id, "first!").unwrap();
        db.create_comment(alice.id, post.id, "thanks").unwrap();

        let removed = db.delete_user(alice.id).unwrap();
        assert_eq!(removed.id, alice.id);
        assert!(db.user_by_id(alice.id).unwrap().is_none());
        assert!(db.post_by_id(post.id).unwrap().is_none());
        // Bob's comment died with the post it was attached to.
        assert!(db.comments_for_post(post.id).unwrap().is_empty());
        assert!(db.user_by_id(bob.id).unwrap().is_some());
    }

    #[test]
    fn update_post_returns_before_and_after() {
        let db = db();
        let alice = seed_user(&db, "alice", "alice@example.com");
        let post = db.create_post(alice.id, "Draft", "body", false).unwrap();
        let update = db
            .update_post(
                post.id,
                alice.id,
                PostPatch {
                    title: Some("Final".into()),
                    body: None,
                    published: Some(true),
                },
            )
            .unwrap();
        assert!(!update.before.published);
        assert!(update.after.published);
        assert_eq!(update.before.title, "Draft");
        assert_eq!(update.after.title, "Final");
        assert_eq!(update.after.body, "body");
    }

    #[test]
    fn publish_flag_transition_cascades_comments() {
        let db = db();
        let alice = seed_user(&db, "alice", "alice@example.com");
        let bob = seed_user(&db, "bob", "bob@example.com");
        let post = db.create_post(alice.id, "Live", "body", true).unwrap();
        db.create_comment(bob.id, post.id, "nice").unwrap();
        db.create_comment(alice.id, post.id, "cheers").unwrap();

        let update = db
            .update_post(
                post.id,
                alice.id,
                PostPatch {
                    published: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(update.comments_removed, 2);
        assert!(db.comments_for_post(post.id).unwrap().is_empty());
    }

    #[test]
    fn update_without_flag_change_keeps_comments() {
        let db = db();
        let alice = seed_user(&db, "alice", "alice@example.com");
        let post = db.create_post(alice.id, "Live", "body", true).unwrap();
        db.create_comment(alice.id, post.id, "note").unwrap();
        let update = db
            .update_post(
                post.id,
                alice.id,
                PostPatch {
                    title: Some("Live v2".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(update.comments_removed, 0);
        assert_eq!(db.comments_for_post(post.id).unwrap().len(), 1);
    }

    #[test]
    fn update_post_enforces_ownership() {
        let db = db();
        let alice = seed_user(&db, "alice", "alice@example.com");
        let bob = seed_user(&db, "bob", "bob@example.com");
        let post = db.create_post(alice.id, "Mine", "body", true).unwrap();
        let err = db
            .update_post(
                post.id,
                bob.id,
                PostPatch {
                    title: Some("Stolen".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::NotAuthorized));
        let err = db
            .update_post(9999, alice.id, PostPatch::default())
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound("Post")));
    }

    #[test]
    fn delete_post_cascades_and_returns_snapshot() {
        let db = db();
        let alice = seed_user(&db, "alice", "alice@example.com");
        let post = db.create_post(alice.id, "Gone", "soon", true).unwrap();
        db.create_comment(alice.id, post.id, "bye").unwrap();
        let (snapshot, removed) = db.delete_post(post.id, alice.id).unwrap();
        assert_eq!(snapshot.title, "Gone");
        assert_eq!(removed, 1);
        assert!(db.post_by_id(post.id).unwrap().is_none());
    }

    #[test]
    fn list_posts_hides_other_peoples_drafts() {
        let db = db();
        let alice = seed_user(&db, "alice", "alice@example.com");
        let bob = seed_user(&db, "bob", "bob@example.com");
        db.create_post(alice.id, "Public", "body", true).unwrap();
        db.create_post(alice.id, "Secret", "body", false).unwrap();

        let anon = db.list_posts(None, None, Page::new(0, 10)).unwrap();
        assert_eq!(anon.len(), 1);
        assert_eq!(anon[0].title, "Public");

        let as_bob = db.list_posts(Some(bob.id), None, Page::new(0, 10)).unwrap();
        assert_eq!(as_bob.len(), 1);

        let as_alice = db
            .list_posts(Some(alice.id), None, Page::new(0, 10))
            .unwrap();
        assert_eq!(as_alice.len(), 2);
    }

    #[test]
    fn post_filter_is_case_sensitive_substring() {
        let db = db();
        let alice = seed_user(&db, "alice", "alice@example.com");
        db.create_post(alice.id, "Rust ownership", "moves and borrows", true)
            .unwrap();
        db.create_post(alice.id, "Gardening", "rust on my shears", true)
            .unwrap();

        let hits = db
            .list_posts(None, Some("Rust"), Page::new(0, 10))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Rust ownership");

        // Lower-case query matches the body of the second post instead.
        let hits = db
            .list_posts(None, Some("rust"), Page::new(0, 10))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Gardening");
    }

    #[test]
    fn list_users_orders_by_name_and_paginates() {
        let db = db();
        seed_user(&db, "carol", "carol@example.com");
        seed_user(&db, "alice", "alice@example.com");
        seed_user(&db, "bob", "bob@example.com");

        let all = db.list_users(None, Page::new(0, 10)).unwrap();
        let names: Vec<_> = all.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);

        let second_page = db.list_users(None, Page::new(1, 1)).unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].name, "bob");
    }

    #[test]
    fn cursor_pages_follow_id_order() {
        let db = db();
        let alice = seed_user(&db, "alice", "alice@example.com");
        let first = db.create_post(alice.id, "One", "1", true).unwrap();
        let second = db.create_post(alice.id, "Two", "2", true).unwrap();
        let third = db.create_post(alice.id, "Three", "3", true).unwrap();

        let after_first = db
            .list_posts(None, None, Page::new(0, 10).with_after(Some(first.id)))
            .unwrap();
        let ids: Vec<_> = after_first.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![second.id, third.id]);
    }

    #[test]
    fn comment_on_invisible_post_is_not_found() {
        let db = db();
        let alice = seed_user(&db, "alice", "alice@example.com");
        let bob = seed_user(&db, "bob", "bob@example.com");
        let draft = db.create_post(alice.id, "Draft", "wip", false).unwrap();

        let err = db.create_comment(bob.id, draft.id, "sneaky").unwrap_err();
        assert!(matches!(err, ApiError::NotFound("Post")));
        // The author can annotate their own draft.
        assert!(db.create_comment(alice.id, draft.id, "todo: finish").is_ok());
        let err = db.create_comment(bob.id, 424242, "void").unwrap_err();
        assert!(matches!(err, ApiError::NotFound("Post")));
    }

    #[test]
    fn comment_ownership_and_updates() {
        let db = db();
        let alice = seed_user(&db, "alice", "alice@example.com");
        let bob = seed_user(&db, "bob", "bob@example.com");
        let post = db.create_post(alice.id, "Open", "body", true).unwrap();
        let comment = db.create_comment(bob.id, post.id, "v1").unwrap();

        let err = db.update_comment(comment.id, alice.id, "hijack").unwrap_err();
        assert!(matches!(err, ApiError::NotAuthorized));

        let updated = db.update_comment(comment.id, bob.id, "v2").unwrap();
        assert_eq!(updated.text, "v2");

        let err = db.delete_comment(comment.id, alice.id).unwrap_err();
        assert!(matches!(err, ApiError::NotAuthorized));
        let removed = db.delete_comment(comment.id, bob.id).unwrap();
        assert_eq!(removed.text, "v2");
        assert!(db.comment_by_id(comment.id).unwrap().is_none());
    }

    #[test]
    fn list_comments_respects_post_visibility() {
        let db = db();
        let alice = seed_user(&db, "alice", "alice@example.com");
        let bob = seed_user(&db, "bob", "bob@example.com");
        let public = db.create_post(alice.id, "Public", "body", true).unwrap();
        let draft = db.create_post(alice.id, "Draft", "wip", false).unwrap();
        db.create_comment(bob.id, public.id, "hello").unwrap();
        db.create_comment(alice.id, draft.id, "private note").unwrap();

        let anon = db.list_comments(None, None, Page::new(0, 10)).unwrap();
        assert_eq!(anon.len(), 1);
        assert_eq!(anon[0].text, "hello");

        let as_alice = db
            .list_comments(Some(alice.id), None, Page::new(0, 10))
            .unwrap();
        assert_eq!(as_alice.len(), 2);
    }

    #[test]
    fn file_backed_store_persists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("content.db");
        {
            let db = Database::open(&path).unwrap();
            seed_user(&db, "alice", "alice@example.com");
        }
        let reopened = Database::open(&path).unwrap();
        let user = reopened.user_by_email("alice@example.com").unwrap();
        assert!(user.is_some());
    }
}
