mod admin;
mod auth;
mod chat;
mod community;
mod generate;
mod pages;
mod user;

use axum::Router;

use crate::state::AppState;

/// Entries on the history page and the default for history APIs
pub const HISTORY_LIMIT: usize = 10;
pub const CHAT_LIMIT: usize = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(pages::router())
        .merge(auth::router())
        .merge(generate::router())
        .merge(community::router())
        .merge(chat::router())
        .merge(admin::router())
        .merge(user::router())
}

#[cfg(test)]
mod tests {
    use std::fmt::Write;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, Response, StatusCode},
    };
    use tempfile::TempDir;
    use text2dataset_core::labeling::{LabelResult, Recognizer, Span};
    use text2dataset_core::{
        Dataset, FileStore, GenerationParams, InputSource, LabelMode, LabelPipeline, LabeledRow,
        OutputDirectory, OutputFormat, User,
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::build_router;
    use crate::config::ServerConfig;
    use crate::state::AppState;

    const BOUNDARY: &str = "text2dataset-test-boundary";
    const SAMPLE: &str = "Apple Inc. opened an office in Paris on 5 May 2020. \
                          Dr. Smith said the deal was worth $3 million.";

    async fn test_state(dir: &TempDir) -> AppState {
        test_state_with(dir, LabelPipeline::new()).await
    }

    async fn test_state_with(dir: &TempDir, pipeline: LabelPipeline) -> AppState {
        let config = ServerConfig {
            secret_key: "router-test-secret-key-0123456789".into(),
            ..ServerConfig::default()
        };
        let store = FileStore::open(dir.path().join("data")).await.unwrap();
        let outputs = OutputDirectory::create(dir.path().join("outputs")).await.unwrap();
        AppState::with_pipeline(config, Arc::new(store), outputs, pipeline)
    }

    async fn send(state: &AppState, request: Request<Body>) -> Response<Body> {
        build_router(state.clone()).oneshot(request).await.unwrap()
    }

    async fn body_string(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response<Body>) -> serde_json::Value {
        serde_json::from_str(&body_string(response).await).unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::get(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_form(uri: &str, form: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(form.to_string())).unwrap()
    }

    fn generate_request(
        fields: &[(&str, &str)],
        file: Option<(&str, &str)>,
        cookie: Option<&str>,
    ) -> Request<Body> {
        let mut body = String::new();
        for (name, value) in fields {
            let _ = write!(
                body,
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            );
        }
        if let Some((filename, contents)) = file {
            let _ = write!(
                body,
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file_upload\"; \
                 filename=\"{filename}\"\r\nContent-Type: text/plain\r\n\r\n{contents}\r\n"
            );
        }
        let _ = write!(body, "--{BOUNDARY}--\r\n");

        let mut builder = Request::post("/generate").header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn session_cookie(response: &Response<Body>) -> String {
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("session cookie")
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    fn dataset_id(response: &Response<Body>) -> Uuid {
        response.headers()["x-dataset-id"]
            .to_str()
            .unwrap()
            .parse()
            .unwrap()
    }

    /// Create an account directly in the store and log in through the router.
    async fn login_as(state: &AppState, username: &str, is_admin: bool) -> String {
        state
            .store
            .create_user(&User::new(username.into(), "secret123", is_admin))
            .await
            .unwrap();
        let response = send(
            state,
            post_form("/login", &format!("username={username}&password=secret123"), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response)
    }

    async fn generate_owned(state: &AppState, cookie: &str) -> Uuid {
        let response = send(
            state,
            generate_request(&[("text_input", SAMPLE), ("custom_name", "news")], None, Some(cookie)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        dataset_id(&response)
    }

    fn stored_dataset(retention: chrono::Duration) -> Dataset {
        let id = Uuid::now_v7();
        Dataset::new(
            id,
            format!("dataset_{id}.csv"),
            Some("alice".into()),
            GenerationParams {
                mode: LabelMode::Fast,
                format: OutputFormat::Csv,
                custom_name: None,
                sentence_count: 1,
                source: InputSource::Text,
            },
            vec![LabeledRow::new("Paris is big.", "Paris", "GPE")],
            retention,
        )
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;

        let response = send(&state, get("/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["storage"], "file");
    }

    #[tokio::test]
    async fn test_pages_render() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;

        for uri in ["/", "/history", "/community", "/global_chat_page", "/login", "/signup"] {
            let response = send(&state, get(uri, None)).await;
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
            assert!(body_string(response).await.contains("<!DOCTYPE html>"));
        }
    }

    #[tokio::test]
    async fn test_generate_and_download_csv() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;

        let response = send(
            &state,
            generate_request(
                &[
                    ("text_input", SAMPLE),
                    ("output_format", "csv"),
                    ("mode", "fast"),
                    ("custom_name", "news"),
                ],
                None,
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let id = dataset_id(&response);
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(disposition, format!("attachment; filename=\"dataset_news_{id}.csv\""));
        let generated = body_string(response).await;
        assert!(generated.starts_with("text,entity,label\n"));
        assert!(generated.contains("Paris"));

        let response = send(&state, get(&format!("/download/{id}"), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, generated);

        let history = state.store.list_history(None, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].dataset_id, id);
        assert!(history[0].owner.is_none());
    }

    #[tokio::test]
    async fn test_generate_spacy_smart() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;

        let response = send(
            &state,
            generate_request(
                &[
                    ("text_input", "Real Madrid won the football match in Madrid."),
                    ("output_format", "spacy"),
                    ("mode", "smart"),
                ],
                None,
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let json = body_json(response).await;
        let example = &json[0];
        assert_eq!(example[0], "Real Madrid won the football match in Madrid.");
        assert!(example[1]["entities"].is_array());
    }

    #[tokio::test]
    async fn test_generate_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;

        let response = send(&state, generate_request(&[("text_input", "Too short")], None, None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");

        let response = send(&state, generate_request(&[("text_input", "")], None, None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &state,
            generate_request(&[("text_input", SAMPLE), ("output_format", "xml")], None, None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &state,
            generate_request(&[], Some(("report.pdf", SAMPLE)), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body_json(response).await["error"]["code"], "UNSUPPORTED_FILE");
    }

    #[tokio::test]
    async fn test_uploaded_file_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;

        let response = send(
            &state,
            generate_request(
                &[("text_input", "This pasted text is ignored entirely.")],
                Some(("notes.txt", SAMPLE)),
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let dataset = state.store.get_dataset(dataset_id(&response)).await.unwrap();
        assert_eq!(
            dataset.params.source,
            InputSource::File {
                filename: "notes.txt".into()
            }
        );
        assert!(dataset.rows.iter().all(|r| !r.text.contains("ignored")));
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            max_file_size: 1024,
            ..ServerConfig::default()
        };
        let store = FileStore::open(dir.path().join("data")).await.unwrap();
        let outputs = OutputDirectory::create(dir.path().join("outputs")).await.unwrap();
        let state = AppState::new(config, Arc::new(store), outputs);

        // Over the per-file limit but inside the request body limit.
        let text = "Paris is lovely. ".repeat(200);
        let response = send(&state, generate_request(&[], Some(("notes.txt", &text)), None)).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_json(response).await["error"]["code"], "PAYLOAD_TOO_LARGE");

        // Over the request body limit itself.
        let text = "Paris is lovely. ".repeat(8000);
        let response = send(&state, generate_request(&[], Some(("notes.txt", &text)), None)).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_json(response).await["error"]["code"], "PAYLOAD_TOO_LARGE");
    }

    #[tokio::test]
    async fn test_failed_insert_leaves_no_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;
        // A directory where the datasets file belongs makes every dataset write fail.
        std::fs::create_dir_all(dir.path().join("data").join("datasets.json")).unwrap();

        let response = send(&state, generate_request(&[("text_input", SAMPLE)], None, None)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let leftovers = std::fs::read_dir(dir.path().join("outputs")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    struct Offline;

    impl Recognizer for Offline {
        fn name(&self) -> &str {
            "rule-ner"
        }

        fn is_available(&self) -> bool {
            false
        }

        fn recognize(&self, _sentence: &str) -> LabelResult<Vec<Span>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_unavailable_model() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state_with(&dir, LabelPipeline::new().with_entities(Offline)).await;

        let response = send(&state, generate_request(&[("text_input", SAMPLE)], None, None)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["error"]["code"], "MODEL_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_expired_and_missing_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;

        let expired = stored_dataset(chrono::Duration::hours(-1));
        state.store.insert_dataset(&expired).await.unwrap();
        state.outputs.write(&expired.filename, b"text,entity,label\n").await.unwrap();
        let response = send(&state, get(&format!("/download/{}", expired.id), None)).await;
        assert_eq!(response.status(), StatusCode::GONE);
        assert_eq!(body_json(response).await["error"]["code"], "EXPIRED");

        let missing = stored_dataset(chrono::Duration::hours(24));
        state.store.insert_dataset(&missing).await.unwrap();
        let response = send(&state, get(&format!("/download/{}", missing.id), None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&state, get(&format!("/download/{}", Uuid::now_v7()), None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_signup_flow() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;

        let form = "username=admin&password=abcdefg1&confirm_password=abcdefg1";
        let response = send(&state, post_form("/signup", form, None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let cookie = session_cookie(&response);
        let admin = state.store.get_user("admin").await.unwrap().unwrap();
        assert!(admin.is_admin);

        let page = body_string(send(&state, get("/", Some(&cookie))).await).await;
        assert!(page.contains("admin (admin)"));

        let response = send(&state, post_form("/signup", form, None)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let mismatch = "username=bob_1&password=abcdefg1&confirm_password=abcdefg2";
        let response = send(&state, post_form("/signup", mismatch, None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("Passwords do not match"));
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;
        let cookie = login_as(&state, "alice", false).await;

        let response = send(
            &state,
            post_form("/login", "username=alice&password=wrong123", None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(&state, get("/api/user_datasets", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&state, get("/logout", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = send(&state, get("/api/user_datasets", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_tampered_cookie_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;
        let id = state.sessions.write().await.create("alice".into());

        let forged = format!("t2d_session={id}");
        let response = send(&state, get("/api/user_datasets", Some(&forged))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_user_datasets_are_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;
        let alice = login_as(&state, "alice", false).await;
        let bob = login_as(&state, "bob", false).await;

        let id = generate_owned(&state, &alice).await;
        send(&state, generate_request(&[("text_input", SAMPLE)], None, None)).await;

        let json = body_json(send(&state, get("/api/user_datasets", Some(&alice))).await).await;
        let datasets = json["datasets"].as_array().unwrap();
        assert_eq!(datasets.len(), 1);
        assert_eq!(datasets[0]["dataset_id"], id.to_string());

        let json = body_json(send(&state, get("/api/user_datasets", Some(&bob))).await).await;
        assert!(json["datasets"].as_array().unwrap().is_empty());

        let json = body_json(send(&state, get("/api/history", None)).await).await;
        assert_eq!(json["datasets"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_share_and_like() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;
        let alice = login_as(&state, "alice", false).await;
        let bob = login_as(&state, "bob", false).await;
        let id = generate_owned(&state, &alice).await;

        let form = format!("dataset_id={id}&description=Business+news+entities&tags=news,finance");
        let response = send(&state, post_form("/share_dataset", &form, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(&state, post_form("/share_dataset", &form, Some(&bob))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(&state, post_form("/share_dataset", &form, Some(&alice))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = send(&state, post_form("/share_dataset", &form, Some(&alice))).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let share = state.store.share_for_dataset(id).await.unwrap().unwrap();
        let like = format!("share_id={}", share.id);
        for _ in 0..3 {
            let response = send(&state, post_form("/like_dataset", &like, Some(&bob))).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
        }
        assert_eq!(state.store.get_share(share.id).await.unwrap().likes, 1);

        let json = body_json(send(&state, get("/api/community?tag=finance", None)).await).await;
        assert_eq!(json["total"], 1);
        let json = body_json(send(&state, get("/api/community?q=weather", None)).await).await;
        assert_eq!(json["total"], 0);

        let page = body_string(send(&state, get("/community", None)).await).await;
        assert!(page.contains("Business news entities"));
    }

    #[tokio::test]
    async fn test_chat() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;
        let alice = login_as(&state, "alice", false).await;
        let id = generate_owned(&state, &alice).await;

        let response = send(&state, post_form("/global_chat", "message=hello", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(&state, post_form("/global_chat", "message=hello+all", Some(&alice))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let json = body_json(send(&state, get("/global_chat", None)).await).await;
        assert_eq!(json["messages"][0]["body"], "hello all");
        assert_eq!(json["messages"][0]["author"], "alice");

        let uri = format!("/chat/{id}");
        let response = send(&state, post_form(&uri, "message=nice+dataset", Some(&alice))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let json = body_json(send(&state, get(&uri, None)).await).await;
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);

        let response = send(&state, post_form(&uri, "message=+++", Some(&alice))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&state, get(&format!("/chat/{}", Uuid::now_v7()), None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let page = body_string(send(&state, get(&format!("/view/{id}"), None)).await).await;
        assert!(page.contains("nice dataset"));
    }

    #[tokio::test]
    async fn test_admin_moderation() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;
        let admin = login_as(&state, "root_admin", true).await;
        let alice = login_as(&state, "alice", false).await;
        let id = generate_owned(&state, &alice).await;
        let filename = state.store.get_dataset(id).await.unwrap().filename;

        let response = send(&state, post_form("/admin/ban_user", "username=root_admin", Some(&alice))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(&state, post_form("/admin/ban_user", "username=root_admin", Some(&admin))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(&state, post_form("/admin/ban_user", "username=alice", Some(&admin))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(state.store.get_user("alice").await.unwrap().unwrap().banned);

        // Sessions of the banned user are gone and they cannot log back in.
        let response = send(&state, post_form("/global_chat", "message=hi", Some(&alice))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let response = send(
            &state,
            post_form("/login", "username=alice&password=secret123", None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let uri = format!("/admin/delete_dataset/{id}");
        let response = send(&state, post_form(&uri, "", Some(&admin))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(!state.outputs.root().join(&filename).exists());

        let response = send(&state, get(&format!("/view/{id}"), None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = send(&state, post_form(&uri, "", Some(&admin))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
