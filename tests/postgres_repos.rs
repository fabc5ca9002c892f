use futures::TryStreamExt;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime, macros::datetime};
use warbler::application::repos::{
    HealthRepo, LegacyFollowsRepo, NewPost, PostsRepo, PostsWriteRepo, SeedBoundary, SeedRepo,
    UsersRepo,
};
use warbler::infra::db::PostgresRepositories;

async fn seed_users(pool: &PgPool, names: &[&str]) {
    for name in names {
        sqlx::query("INSERT INTO users (name) VALUES ($1)")
            .bind(name)
            .execute(pool)
            .await
            .expect("insert user");
    }
}

async fn insert_post_at(pool: &PgPool, user_id: i64, body: &str, at: OffsetDateTime) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO posts (user_id, body, created_at) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(user_id)
    .bind(body)
    .bind(at)
    .fetch_one(pool)
    .await
    .expect("insert post")
}

#[sqlx::test(migrations = "./migrations")]
async fn users_are_found_by_id_and_name(pool: PgPool) {
    seed_users(&pool, &["alice", "bob"]).await;
    let repos = PostgresRepositories::new(pool);

    let bob = repos
        .find_by_name("bob")
        .await
        .expect("query")
        .expect("bob exists");
    let same = repos
        .find_by_id(bob.id)
        .await
        .expect("query")
        .expect("bob by id");
    assert_eq!(same, bob);
    assert!(repos.find_by_name("nobody").await.expect("query").is_none());

    let all = repos.list_users().await.expect("list");
    let names: Vec<_> = all.iter().map(|user| user.name.as_str()).collect();
    assert_eq!(names, vec!["alice", "bob"]);
}

#[sqlx::test(migrations = "./migrations")]
async fn scans_are_newest_first_and_respect_the_cursor(pool: PgPool) {
    seed_users(&pool, &["alice"]).await;
    let base = datetime!(2017-10-21 09:00:00 UTC);
    for n in 0..3 {
        insert_post_at(&pool, 1, &format!("post {n}"), base + Duration::seconds(n)).await;
    }
    let repos = PostgresRepositories::new(pool);

    let all: Vec<_> = repos
        .scan_posts(None)
        .try_collect()
        .await
        .expect("scan");
    let bodies: Vec<_> = all.iter().map(|post| post.body.as_str()).collect();
    assert_eq!(bodies, vec!["post 2", "post 1", "post 0"]);

    let older: Vec<_> = repos
        .scan_posts(Some(base + Duration::seconds(2)))
        .try_collect()
        .await
        .expect("scan");
    assert_eq!(older.len(), 2);
    assert_eq!(older[0].body, "post 1");

    let ascending: Vec<_> = repos
        .scan_posts_ascending()
        .try_collect()
        .await
        .expect("scan");
    assert_eq!(ascending[0].body, "post 0");
}

#[sqlx::test(migrations = "./migrations")]
async fn author_listing_filters_and_limits(pool: PgPool) {
    seed_users(&pool, &["alice", "bob"]).await;
    let base = datetime!(2017-10-21 09:00:00 UTC);
    for n in 0..4 {
        let author = if n % 2 == 0 { 1 } else { 2 };
        insert_post_at(&pool, author, &format!("post {n}"), base + Duration::seconds(n)).await;
    }
    let repos = PostgresRepositories::new(pool);

    let alice = repos.list_by_author(1, None, 10).await.expect("list");
    let bodies: Vec<_> = alice.iter().map(|post| post.body.as_str()).collect();
    assert_eq!(bodies, vec!["post 2", "post 0"]);

    let limited = repos.list_by_author(2, None, 1).await.expect("list");
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].body, "post 3");

    let before = repos
        .list_by_author(2, Some(base + Duration::seconds(3)), 10)
        .await
        .expect("list");
    assert_eq!(before.len(), 1);
    assert_eq!(before[0].body, "post 1");
}

#[sqlx::test(migrations = "./migrations")]
async fn insert_returns_the_stored_row(pool: PgPool) {
    seed_users(&pool, &["alice"]).await;
    let repos = PostgresRepositories::new(pool);

    let post = repos
        .insert_post(NewPost {
            user_id: 1,
            body: "hello #go".into(),
        })
        .await
        .expect("insert");
    assert_eq!(post.user_id, 1);
    assert_eq!(post.body, "hello #go");

    let err = repos
        .insert_post(NewPost {
            user_id: 42,
            body: "orphan".into(),
        })
        .await
        .expect_err("unknown author");
    assert!(matches!(
        err,
        warbler::application::repos::RepoError::InvalidInput { .. }
    ));
}

#[sqlx::test(migrations = "./migrations")]
async fn truncation_drops_rows_above_the_boundary(pool: PgPool) {
    seed_users(&pool, &["alice", "bob", "mallory"]).await;
    let at = OffsetDateTime::now_utc();
    insert_post_at(&pool, 1, "kept", at).await;
    insert_post_at(&pool, 2, "dropped", at).await;
    insert_post_at(&pool, 3, "dropped with user", at).await;
    let repos = PostgresRepositories::new(pool);

    let report = repos
        .truncate_above(SeedBoundary {
            post_cutoff: 1,
            user_cutoff: 2,
        })
        .await
        .expect("truncate");
    assert_eq!(report.posts, 2);
    assert_eq!(report.users, 1);

    let remaining: Vec<_> = repos
        .scan_posts(None)
        .try_collect()
        .await
        .expect("scan");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].body, "kept");
    assert!(repos.find_by_name("mallory").await.expect("query").is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn legacy_follow_rows_and_health(pool: PgPool) {
    sqlx::query("INSERT INTO legacy_friends (me, friends) VALUES ('alice', 'bob,carol')")
        .execute(&pool)
        .await
        .expect("insert legacy row");
    let repos = PostgresRepositories::new(pool);

    let rows = repos.list_legacy_follows().await.expect("list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].edges().count(), 2);

    repos.health_check().await.expect("healthy");
}
