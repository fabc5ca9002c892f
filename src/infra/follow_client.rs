//! Follow graph delegated to an external friends service.
//!
//! The service keeps one friend list per user:
//! `GET {endpoint}/{name}` answers `{"friends": [...]}`, `POST` and `DELETE`
//! on the same path take `{"user": "<followee>"}`, and
//! `GET {endpoint}/initialize` restores its seed data.

use std::collections::BTreeSet;

use async_trait::async_trait;
use reqwest::{Client, Method, Response, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::follows::{FollowGraph, FollowGraphError};

#[derive(Debug, Deserialize)]
struct FriendsReply {
    #[serde(default)]
    friends: Vec<String>,
}

#[derive(Debug, Serialize)]
struct FriendRequest<'a> {
    user: &'a str,
}

#[derive(Clone, Debug)]
pub struct RemoteFollowGraph {
    client: Client,
    base: Url,
}

impl RemoteFollowGraph {
    pub fn new(endpoint: Url) -> Result<Self, FollowGraphError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .build()
            .map_err(FollowGraphError::transport)?;
        Self::with_client(client, endpoint)
    }

    pub fn with_client(client: Client, endpoint: Url) -> Result<Self, FollowGraphError> {
        if endpoint.cannot_be_a_base() {
            return Err(FollowGraphError::transport(format!(
                "follow endpoint `{endpoint}` cannot carry a path"
            )));
        }
        Ok(Self {
            client,
            base: endpoint,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("warbler/", env!("CARGO_PKG_VERSION"))
    }

    /// `{endpoint}/{segment}` with the segment percent-encoded.
    pub fn url(&self, segment: &str) -> Result<Url, FollowGraphError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| FollowGraphError::transport("follow endpoint cannot carry a path"))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        segment: &str,
        body: Option<FriendRequest<'_>>,
    ) -> Result<Response, FollowGraphError> {
        let url = self.url(segment)?;
        debug!(
            target = "warbler::infra::follow_client",
            method = %method,
            url = %url,
            "calling follow service"
        );

        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await.map_err(FollowGraphError::transport)?;
        Self::check(resp).await
    }

    async fn check(resp: Response) -> Result<Response, FollowGraphError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let detail = resp.text().await.unwrap_or_default();
        Err(FollowGraphError::Status {
            status: status.as_u16(),
            detail,
        })
    }
}

#[async_trait]
impl FollowGraph for RemoteFollowGraph {
    async fn followees(&self, name: &str) -> Result<BTreeSet<String>, FollowGraphError> {
        let reply: FriendsReply = self
            .send(Method::GET, name, None)
            .await?
            .json()
            .await
            .map_err(FollowGraphError::decode)?;
        Ok(reply.friends.into_iter().collect())
    }

    async fn follow(&self, follower: &str, followee: &str) -> Result<(), FollowGraphError> {
        self.send(
            Method::POST,
            follower,
            Some(FriendRequest { user: followee }),
        )
        .await
        .map(|_| ())
    }

    async fn unfollow(&self, follower: &str, followee: &str) -> Result<(), FollowGraphError> {
        self.send(
            Method::DELETE,
            follower,
            Some(FriendRequest { user: followee }),
        )
        .await
        .map(|_| ())
    }

    async fn reset(&self) -> Result<(), FollowGraphError> {
        self.send(Method::GET, "initialize", None).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(endpoint: &str) -> RemoteFollowGraph {
        RemoteFollowGraph::new(Url::parse(endpoint).expect("endpoint")).expect("client")
    }

    #[test]
    fn user_names_are_percent_encoded_path_segments() {
        let graph = graph("http://friends.local:8081/api");
        let url = graph.url("a b/c").expect("url");
        assert_eq!(url.as_str(), "http://friends.local:8081/api/a%20b%2Fc");
    }

    #[test]
    fn trailing_slash_on_endpoint_is_not_doubled() {
        let graph = graph("http://friends.local:8081/");
        let url = graph.url("initialize").expect("url");
        assert_eq!(url.as_str(), "http://friends.local:8081/initialize");
    }

    #[test]
    fn rejects_endpoints_without_a_path() {
        let endpoint = Url::parse("mailto:friends@example.com").expect("url");
        assert!(RemoteFollowGraph::new(endpoint).is_err());
    }

    #[test]
    fn missing_friends_field_decodes_as_empty() {
        let reply: FriendsReply = serde_json::from_str("{}").expect("decode");
        assert!(reply.friends.is_empty());
    }

    #[test]
    fn not_cache_backed() {
        assert!(!graph("http://friends.local/").is_cache_backed());
    }

    mod against_service {
        use std::sync::{Arc, Mutex};

        use axum::{
            Json, Router,
            extract::{Path, State},
            http::StatusCode,
            response::{IntoResponse, Response},
            routing::get,
        };
        use serde_json::{Value, json};

        use super::super::*;

        type Calls = Arc<Mutex<Vec<String>>>;

        async fn friends(State(calls): State<Calls>, Path(name): Path<String>) -> Response {
            calls.lock().expect("calls").push(format!("GET {name}"));
            match name.as_str() {
                "broken" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
                "garbled" => "<html>not json</html>".into_response(),
                _ => Json(json!({ "friends": ["bob", "carol"] })).into_response(),
            }
        }

        async fn add_friend(
            State(calls): State<Calls>,
            Path(name): Path<String>,
            Json(body): Json<Value>,
        ) -> StatusCode {
            let user = body["user"].as_str().unwrap_or_default().to_string();
            calls.lock().expect("calls").push(format!("POST {name} {user}"));
            StatusCode::OK
        }

        async fn remove_friend(
            State(calls): State<Calls>,
            Path(name): Path<String>,
            Json(body): Json<Value>,
        ) -> StatusCode {
            let user = body["user"].as_str().unwrap_or_default().to_string();
            calls.lock().expect("calls").push(format!("DELETE {name} {user}"));
            StatusCode::OK
        }

        async fn initialize(State(calls): State<Calls>) -> StatusCode {
            calls.lock().expect("calls").push("GET initialize".to_string());
            StatusCode::OK
        }

        async fn spawn_service() -> (RemoteFollowGraph, Calls) {
            let calls: Calls = Arc::new(Mutex::new(Vec::new()));
            let router = Router::new()
                .route("/api/initialize", get(initialize))
                .route(
                    "/api/{name}",
                    get(friends).post(add_friend).delete(remove_friend),
                )
                .with_state(calls.clone());

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind");
            let addr = listener.local_addr().expect("local addr");
            tokio::spawn(async move { axum::serve(listener, router).await });

            let endpoint = Url::parse(&format!("http://{addr}/api")).expect("endpoint");
            let graph = RemoteFollowGraph::new(endpoint).expect("client");
            (graph, calls)
        }

        #[tokio::test]
        async fn followees_are_read_from_the_service() {
            let (graph, calls) = spawn_service().await;

            let followees = graph.followees("a b").await.expect("followees");
            assert_eq!(
                followees.into_iter().collect::<Vec<_>>(),
                vec!["bob".to_string(), "carol".to_string()]
            );
            assert_eq!(*calls.lock().expect("calls"), vec!["GET a b".to_string()]);
        }

        #[tokio::test]
        async fn error_status_fails_the_read() {
            let (graph, _calls) = spawn_service().await;

            let err = graph.followees("broken").await.expect_err("500 reply");
            match err {
                FollowGraphError::Status { status, detail } => {
                    assert_eq!(status, 500);
                    assert_eq!(detail, "boom");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[tokio::test]
        async fn undecodable_reply_fails_the_read() {
            let (graph, _calls) = spawn_service().await;

            let err = graph.followees("garbled").await.expect_err("non-json reply");
            assert!(matches!(err, FollowGraphError::Decode(_)), "{err:?}");
        }

        #[tokio::test]
        async fn mutations_and_reset_hit_the_expected_routes() {
            let (graph, calls) = spawn_service().await;

            graph.follow("alice", "bob").await.expect("follow");
            graph.unfollow("alice", "bob").await.expect("unfollow");
            graph.reset().await.expect("reset");

            assert_eq!(
                *calls.lock().expect("calls"),
                vec![
                    "POST alice bob".to_string(),
                    "DELETE alice bob".to_string(),
                    "GET initialize".to_string(),
                ]
            );
        }
    }
}
