use time::OffsetDateTime;

pub type UserId = i64;
pub type PostId = i64;

/// A registered user. Credential material stays in the record store and is
/// never loaded into the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
}

/// A post as persisted in the record store. `body` is the raw text the author
/// submitted; escaping and hashtag markup are applied when it is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub id: PostId,
    pub user_id: UserId,
    pub body: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FollowEdge {
    pub follower: String,
    pub followee: String,
}

/// Legacy follow-graph row: one row per follower with a comma-joined list of
/// followees. Only read while baking a seed snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyFollowRow {
    pub me: String,
    pub friends: String,
}

impl LegacyFollowRow {
    pub fn edges(&self) -> impl Iterator<Item = FollowEdge> + '_ {
        self.friends
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| FollowEdge {
                follower: self.me.clone(),
                followee: name.to_string(),
            })
    }
}
