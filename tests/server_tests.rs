use std::sync::Arc;

use actix_web::{App, test, web};
use assert_json_diff::assert_json_include;
use serde_json::json;

use snippetd::config::{JudgeConfig, LanguageBackend, LanguageConfig, LimitsConfig};
use snippetd::dispatch::Dispatcher;
use snippetd::exec::ExecutionResult;
use snippetd::judge::JudgeClient;
use snippetd::routes::{get_languages_handler, json_error_handler, post_run_handler};
use snippetd::sandbox::LocalRunner;
use snippetd::workspace::WorkspaceRegistry;

fn test_registry() -> WorkspaceRegistry {
    let languages = vec![
        LanguageConfig {
            name: "shell".to_string(),
            backend: LanguageBackend::Local {
                file_name: "main.sh".to_string(),
                command: vec!["sh".to_string(), "%INPUT%".to_string()],
            },
        },
        LanguageConfig {
            name: "react".to_string(),
            backend: LanguageBackend::Preview,
        },
    ];
    let judge_config = JudgeConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        api_key: None,
        poll_interval_ms: 50,
        submit_attempts: 1,
    };
    let local = Arc::new(LocalRunner::new());
    let judge = Arc::new(JudgeClient::new(&judge_config).unwrap());
    let dispatcher = Dispatcher::new(languages, local, judge, LimitsConfig::default());
    WorkspaceRegistry::new(Arc::new(dispatcher))
}

macro_rules! test_app {
    () => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(test_registry()))
                .app_data(web::JsonConfig::default().error_handler(json_error_handler))
                .service(post_run_handler)
                .service(get_languages_handler),
        )
        .await
    };
}

#[actix_web::test]
async fn post_run_returns_the_execution_result() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/runs")
        .set_json(json!({
            "workspace_id": "ws-1",
            "language": "shell",
            "source_code": "echo over http",
            "stdin": null,
            "time_limit_ms": 2000
        }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let result: ExecutionResult = test::read_body_json(resp).await;
    assert_eq!(result.stdout, "over http\n");
}

#[actix_web::test]
async fn internal_error_outcomes_are_still_http_200() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/runs")
        .set_json(json!({
            "workspace_id": "ws-1",
            "language": "UnknownLang",
            "source_code": "whatever"
        }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_json_include!(actual: body, expected: json!({ "outcome": "InternalError" }));
}

#[actix_web::test]
async fn preview_language_is_rejected_with_invalid_state() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/runs")
        .set_json(json!({
            "workspace_id": "ws-1",
            "language": "react",
            "source_code": "export default () => <div/>;"
        }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_json_include!(
        actual: body,
        expected: json!({ "reason": "ERR_INVALID_STATE", "code": 2 })
    );
}

#[actix_web::test]
async fn malformed_json_is_an_invalid_argument() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/runs")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_json_include!(
        actual: body,
        expected: json!({ "reason": "ERR_INVALID_ARGUMENT", "code": 1 })
    );
}

#[actix_web::test]
async fn languages_listing_flags_preview_languages() {
    let app = test_app!();

    let req = test::TestRequest::get().uri("/languages").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_json_include!(
        actual: body,
        expected: json!([
            { "name": "shell", "runnable": true },
            { "name": "react", "runnable": false }
        ])
    );
}
