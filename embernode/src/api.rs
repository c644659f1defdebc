//! Local Control Plane: a request/response API bound strictly
//! to the loopback interface. No authentication — safety relies on the
//! loopback bind.

use std::sync::Arc;

use actix_web::{HttpResponse, Responder, web};
use embercore::{Node, NodeError, SendOutcome};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Malformed/rejected requests all answer with this shape.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: actix_web::http::StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ErrorBody {
            error: message.into(),
    })
}

/// Translates a pipeline/store error into the control plane's status code
/// and error body, carrying the specific error string through to the
/// response JSON.
fn node_error_response(err: NodeError) -> HttpResponse {
    use actix_web::http::StatusCode;
    let status = match &err {
        NodeError::UnknownFriend(_) => StatusCode::NOT_FOUND,
        NodeError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        NodeError::UnknownInDirectory(_) => StatusCode::NOT_FOUND,
        NodeError::AlreadyFriends(_) => StatusCode::CONFLICT,
        NodeError::KeyConflict(_) => StatusCode::CONFLICT,
        NodeError::NoKeyConflict(_) => StatusCode::CONFLICT,
        NodeError::Unreliable => StatusCode::ACCEPTED,
        NodeError::Store(emberstore::StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
        NodeError::Store(_) | NodeError::Directory(_) | NodeError::Crypto(_) => {
            warn!(error = %err, "control plane request failed with an internal error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, err.to_string())
}

pub async fn get_status(node: web::Data<Arc<Node>>) -> impl Responder {
    match node.status().await {
        Ok(status) => HttpResponse::Ok().json(status),
        Err(e) => node_error_response(e),
    }
}

pub async fn list_friends(node: web::Data<Arc<Node>>) -> impl Responder {
    match node.list_friends().await {
        Ok(friends) => HttpResponse::Ok().json(friends),
        Err(e) => node_error_response(e),
    }
}

#[derive(Deserialize)]
pub struct AddFriendBody {
    username: Option<String>,
}

pub async fn add_friend(
    node: web::Data<Arc<Node>>,
    body: web::Json<AddFriendBody>,
) -> impl Responder {
    let Some(username) = body.username.as_deref().filter(|s| !s.is_empty()) else {
        return error_response(
            actix_web::http::StatusCode::BAD_REQUEST,
            "missing required field 'username'",
        );
    };
    match node.add_friend(username).await {
        Ok(friend) => HttpResponse::Created().json(friend),
        Err(e) => node_error_response(e),
    }
}

pub async fn remove_friend(
    node: web::Data<Arc<Node>>,
    path: web::Path<String>,
) -> impl Responder {
    let username = path.into_inner();
    match node.remove_friend(&username).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => node_error_response(e),
    }
}

pub async fn repin_friend(
    node: web::Data<Arc<Node>>,
    path: web::Path<String>,
) -> impl Responder {
    let username = path.into_inner();
    match node.repin_friend(&username).await {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(e) => node_error_response(e),
    }
}

#[derive(Deserialize)]
pub struct ListMessagesQuery {
    peer: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Serialize)]
struct ListMessagesResponse {
    messages: Vec<emberstore::Message>,
    total: i64,
    has_more: bool,
}

pub async fn list_messages(
    node: web::Data<Arc<Node>>,
    query: web::Query<ListMessagesQuery>,
) -> impl Responder {
    let Some(peer) = query.peer.as_deref().filter(|s| !s.is_empty()) else {
        return error_response(
            actix_web::http::StatusCode::BAD_REQUEST,
            "missing required query parameter 'peer'",
        );
    };
    let limit = query.limit.unwrap_or(50);
    let offset = query.offset.unwrap_or(0);
    match node.list_messages(peer, offset, limit).await {
        Ok((messages, total, has_more)) => HttpResponse::Ok().json(ListMessagesResponse {
                messages,
                total,
                has_more,
        }),
        Err(e) => node_error_response(e),
    }
}

#[derive(Deserialize)]
pub struct SendMessageBody {
    to: Option<String>,
    text: Option<String>,
}

#[derive(Serialize)]
struct SendMessageResponse {
    msg_id: Uuid,
    delivered: bool,
    delivery_method: &'static str,
}

pub async fn send_message(
    node: web::Data<Arc<Node>>,
    body: web::Json<SendMessageBody>,
) -> impl Responder {
    let (to, text) = match (
        body.to.as_deref().filter(|s| !s.is_empty()),
        body.text.as_deref(),
    ) {
        (Some(to), Some(text)) => (to, text),
        _ => {
            return error_response(
                actix_web::http::StatusCode::BAD_REQUEST,
                "missing required field 'to' or 'text'",
            );
        }
    };

    match node.send_message(to, text).await {
        Ok(SendOutcome::Direct { msg_id }) => HttpResponse::Ok().json(SendMessageResponse {
                msg_id,
                delivered: true,
                delivery_method: "direct",
        }),
        Ok(SendOutcome::Offline { msg_id }) => {
            HttpResponse::Accepted().json(SendMessageResponse {
                    msg_id,
                    delivered: false,
                    delivery_method: "offline",
            })
        }
        Ok(SendOutcome::Unreliable { msg_id }) => {
            HttpResponse::Accepted().json(SendMessageResponse {
                    msg_id,
                    delivered: false,
                    delivery_method: "offline_pending",
            })
        }
        Err(e) => node_error_response(e),
    }
}

pub async fn delete_message(
    node: web::Data<Arc<Node>>,
    path: web::Path<Uuid>,
) -> impl Responder {
    match node.delete_message(path.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => node_error_response(e),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/status", web::get().to(get_status))
    .route("/friends", web::get().to(list_friends))
    .route("/friends", web::post().to(add_friend))
    .route("/friends/{username}", web::delete().to(remove_friend))
    .route("/friends/{username}/repin", web::post().to(repin_friend))
    .route("/messages", web::get().to(list_messages))
    .route("/messages", web::post().to(send_message))
    .route("/messages/{msg_id}", web::delete().to(delete_message));
}

#[cfg(test)]
mod tests {
    use actix_web::{App, http::StatusCode, test, web::Data};
    use embercrypto::IdentityKeys;
    use emberdirectory::DirectoryClient;
    use embercore::NullEventSink;
    use emberstore::Store;

    use super::*;

    async fn test_node() -> Arc<Node> {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        // Nothing listens here, so any directory call fails fast with a
        // connection error rather than hanging the test.
        let directory = Arc::new(DirectoryClient::new("http://127.0.0.1:1", "test-key").unwrap());
        Arc::new(Node::new(
                Uuid::new_v4(),
                "alice".to_string(),
                IdentityKeys::generate(),
                9100,
                store,
                directory,
                Arc::new(NullEventSink),
        ))
    }

    #[actix_web::test]
    async fn status_reports_zero_friends_for_a_fresh_node() {
        let node = test_node().await;
        let app = test::init_service(
            App::new().app_data(Data::new(node)).configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/status").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["friends_count"], 0);
        assert_eq!(body["username"], "alice");
    }

    #[actix_web::test]
    async fn add_friend_missing_username_is_bad_request() {
        let node = test_node().await;
        let app = test::init_service(
            App::new().app_data(Data::new(node)).configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
        .uri("/friends")
        .set_json(&serde_json::json!({}))
        .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn add_friend_unreachable_directory_is_not_found() {
        let node = test_node().await;
        let app = test::init_service(
            App::new().app_data(Data::new(node)).configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
        .uri("/friends")
        .set_json(&serde_json::json!({"username": "bob"}))
        .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn send_message_to_unknown_friend_is_not_found() {
        let node = test_node().await;
        let app = test::init_service(
            App::new().app_data(Data::new(node)).configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
        .uri("/messages")
        .set_json(&serde_json::json!({"to": "bob", "text": "hi"}))
        .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn send_message_missing_fields_is_bad_request() {
        let node = test_node().await;
        let app = test::init_service(
            App::new().app_data(Data::new(node)).configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
        .uri("/messages")
        .set_json(&serde_json::json!({"to": "bob"}))
        .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn list_messages_missing_peer_is_bad_request() {
        let node = test_node().await;
        let app = test::init_service(
            App::new().app_data(Data::new(node)).configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/messages").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn list_messages_for_unseen_peer_is_empty() {
        let node = test_node().await;
        let app = test::init_service(
            App::new().app_data(Data::new(node)).configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
        .uri("/messages?peer=bob")
        .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["total"], 0);
        assert_eq!(body["has_more"], false);
    }

    #[actix_web::test]
    async fn delete_unknown_message_is_not_found() {
        let node = test_node().await;
        let app = test::init_service(
            App::new().app_data(Data::new(node)).configure(configure),
        )
        .await;

        let req = test::TestRequest::delete()
        .uri(&format!("/messages/{}", Uuid::new_v4()))
        .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
