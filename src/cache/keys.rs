//! Structured cache keys.
//!
//! Every key is a `(kind, id)` pair. The engine adapters render it as
//! `<prefix>:<id>`; prefixes are a closed set containing no `:`, so two keys
//! render to the same string only if they are equal.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// Rendered home feed of a viewer.
    Home,
    /// Recent posts by an author, newest first.
    AuthorTimeline,
    /// Recent posts carrying a hashtag, newest first.
    Hashtag,
    /// Set of names a follower follows.
    Follows,
}

impl KeyKind {
    pub const fn prefix(self) -> &'static str {
        match self {
            KeyKind::Home => "home",
            KeyKind::AuthorTimeline => "posts",
            KeyKind::Hashtag => "tag",
            KeyKind::Follows => "follows",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "home" => Some(KeyKind::Home),
            "posts" => Some(KeyKind::AuthorTimeline),
            "tag" => Some(KeyKind::Hashtag),
            "follows" => Some(KeyKind::Follows),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Home(String),
    AuthorTimeline(String),
    Hashtag(String),
    Follows(String),
}

impl CacheKey {
    pub fn home(viewer: &str) -> Self {
        Self::Home(viewer.to_string())
    }

    pub fn author_timeline(author: &str) -> Self {
        Self::AuthorTimeline(author.to_string())
    }

    pub fn hashtag(tag: &str) -> Self {
        Self::Hashtag(tag.to_string())
    }

    pub fn follows(follower: &str) -> Self {
        Self::Follows(follower.to_string())
    }

    pub fn kind(&self) -> KeyKind {
        match self {
            CacheKey::Home(_) => KeyKind::Home,
            CacheKey::AuthorTimeline(_) => KeyKind::AuthorTimeline,
            CacheKey::Hashtag(_) => KeyKind::Hashtag,
            CacheKey::Follows(_) => KeyKind::Follows,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            CacheKey::Home(id)
            | CacheKey::AuthorTimeline(id)
            | CacheKey::Hashtag(id)
            | CacheKey::Follows(id) => id,
        }
    }

    /// The string form handed to the cache engine.
    pub fn render(&self) -> String {
        format!("{}:{}", self.kind().prefix(), self.id())
    }

    /// Inverse of [`CacheKey::render`].
    pub fn parse(raw: &str) -> Option<Self> {
        let (prefix, id) = raw.split_once(':')?;
        let id = id.to_string();
        Some(match KeyKind::from_prefix(prefix)? {
            KeyKind::Home => CacheKey::Home(id),
            KeyKind::AuthorTimeline => CacheKey::AuthorTimeline(id),
            KeyKind::Hashtag => CacheKey::Hashtag(id),
            KeyKind::Follows => CacheKey::Follows(id),
        })
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind().prefix(), self.id())
    }
}
