use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dbmsdb_core::codec;
use dbmsdb_core::errno;
use dbmsdb_core::request::{Headers, Method, Params};
use parking_lot::Mutex;

use crate::batch;
use crate::config::MockConfig;
use crate::store::{Call, MockResponse, Store};

/// Header reporting how many parts of a composite request failed
pub const BATCH_ERRORS_HEADER: &str = "x-dbms-errors";

/// Shared state of every worker
pub struct AppState {
    pub store: Mutex<Store>,
    pub config: MockConfig,
}

impl AppState {
    pub fn new(config: MockConfig) -> Self {
        Self {
            store: Mutex::new(Store::new()),
            config,
        }
    }
}

fn authorized(req: &HttpRequest, config: &MockConfig) -> bool {
    let Some(value) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };
    let Some(encoded) = value.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
        return false;
    };
    let Ok(credentials) = String::from_utf8(decoded) else {
        return false;
    };
    credentials.split_once(':') == Some((config.username.as_str(), config.password.as_str()))
}

fn json_response(resp: MockResponse) -> HttpResponse {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if resp.body.is_null() {
        return HttpResponse::build(status).finish();
    }
    HttpResponse::build(status).json(resp.body)
}

fn unauthorized() -> HttpResponse {
    json_response(MockResponse::error(401, errno::HTTP_UNAUTHORIZED, "not authorized to execute this request"))
}

/// Split `/_db/{name}/rest` into the database name and the rest.
/// Paths without a database prefix address `_system`.
fn split_db_path(path: &str) -> (&str, &str) {
    match path.strip_prefix("/_db/") {
        Some(rest) => match rest.split_once('/') {
            Some((db, _)) => (db, &rest[db.len()..]),
            None => (rest, "/"),
        },
        None => ("_system", path),
    }
}

/// Every route except the batch endpoint
#[tracing::instrument(skip(req, body, state), fields(method = %req.method(), path = %req.path()))]
pub async fn dispatch(req: HttpRequest, body: web::Bytes, state: web::Data<AppState>) -> HttpResponse {
    if !authorized(&req, &state.config) {
        return unauthorized();
    }
    let Some(method) = Method::parse(req.method().as_str()) else {
        return json_response(MockResponse::error(
            405,
            errno::HTTP_METHOD_NOT_ALLOWED,
            "method not supported",
        ));
    };

    let (db, path) = split_db_path(req.path());
    let params: Params = url::form_urlencoded::parse(req.query_string().as_bytes())
        .into_owned()
        .collect();
    let headers: Headers = req
        .headers()
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
        .collect();
    let call = Call {
        method,
        path: path.to_string(),
        params,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    };

    let resp = state.store.lock().handle(db, &call);
    json_response(resp)
}

/// `POST /_db/{db}/_api/batch`
#[tracing::instrument(skip(req, body, state))]
pub async fn batch_endpoint(
    req: HttpRequest,
    db: web::Path<String>,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> HttpResponse {
    if !authorized(&req, &state.config) {
        return unauthorized();
    }
    let Some(boundary) = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(codec::boundary_from_content_type)
    else {
        return json_response(batch::missing_boundary());
    };

    let text = String::from_utf8_lossy(&body);
    let outcome = {
        let mut store = state.store.lock();
        batch::execute_batch(&mut store, &db, boundary, &text)
    };

    match outcome {
        Ok(reply) => {
            tracing::info!(db = %db, errors = reply.errors, "Batch answered");
            HttpResponse::Ok()
                .content_type(codec::content_type(boundary))
                .insert_header((BATCH_ERRORS_HEADER, reply.errors.to_string()))
                .body(reply.body)
        }
        Err(resp) => json_response(resp),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/_db/{db}/_api/batch", web::post().to(batch_endpoint))
        .default_service(web::to(dispatch));
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test as actix_test, App};
    use dbmsdb_core::Request;
    use serde_json::{json, Value};

    fn state() -> web::Data<AppState> {
        web::Data::new(AppState::new(MockConfig {
            password: "secret".to_string(),
            ..MockConfig::ephemeral()
        }))
    }

    fn auth() -> (header::HeaderName, String) {
        (header::AUTHORIZATION, format!("Basic {}", STANDARD.encode("root:secret")))
    }

    #[test]
    fn test_split_db_path() {
        assert_eq!(split_db_path("/_db/school/_api/version"), ("school", "/_api/version"));
        assert_eq!(split_db_path("/_db/school"), ("school", "/"));
        assert_eq!(split_db_path("/_api/version"), ("_system", "/_api/version"));
    }

    #[actix_web::test]
    async fn test_requires_credentials() {
        let app = actix_test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = actix_test::TestRequest::get().uri("/_db/school/_api/version").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["errorNum"], json!(errno::HTTP_UNAUTHORIZED));

        let req = actix_test::TestRequest::get()
            .uri("/_db/school/_api/version")
            .insert_header(auth())
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["server"], json!("dbms"));
    }

    #[actix_web::test]
    async fn test_document_round_trip() {
        let app = actix_test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/_db/school/_api/relation")
            .insert_header(auth())
            .set_json(json!({"name": "students"}))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = actix_test::TestRequest::post()
            .uri("/_db/school/_api/document/students?returnNew=1")
            .insert_header(auth())
            .set_json(json!({"_key": "Kris"}))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["new"]["_id"], json!("students/Kris"));

        let req = actix_test::TestRequest::get()
            .uri("/_db/school/_api/document/students/Rita")
            .insert_header(auth())
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_batch_endpoint() {
        let app = actix_test::init_service(App::new().app_data(state()).configure(configure)).await;

        let version = Request::new(Method::Get, "/_api/version");
        let bad = Request::new(Method::Post, "/_api/cursor").with_json(json!({"query": "NOPE"}));
        let body = codec::encode_batch("xyz", [("a", &version), ("b", &bad)]);

        let req = actix_test::TestRequest::post()
            .uri("/_db/school/_api/batch")
            .insert_header(auth())
            .insert_header((header::CONTENT_TYPE, codec::content_type("xyz")))
            .set_payload(body)
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(BATCH_ERRORS_HEADER).and_then(|v| v.to_str().ok()),
            Some("1")
        );

        let bytes = actix_test::read_body(resp).await;
        let parts = codec::decode_batch("xyz", std::str::from_utf8(&bytes).unwrap()).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].status_code, 200);
        assert_eq!(parts[1].status_code, 400);
    }

    #[actix_web::test]
    async fn test_batch_without_boundary() {
        let app = actix_test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = actix_test::TestRequest::post()
            .uri("/_db/school/_api/batch")
            .insert_header(auth())
            .insert_header((header::CONTENT_TYPE, "text/plain"))
            .set_payload("hello")
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }
}
