mod common;

use actix_web::{test, web, App};
use serde_json::{json, Value};
use std::sync::Arc;

use common::{fast_config, SyntheticProvider, UNKNOWN_SYMBOL};
use stock_forecast::server::{cors_headers, routes};
use stock_forecast::ForecastPipeline;

fn pipeline(provider: Arc<SyntheticProvider>) -> web::Data<ForecastPipeline> {
    web::Data::new(ForecastPipeline::new(provider, fast_config()))
}

#[actix_web::test]
async fn test_health_check() {
    let app = test::init_service(
        App::new()
            .app_data(pipeline(Arc::default()))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn test_prediction_success() {
    let app = test::init_service(
        App::new()
            .app_data(pipeline(Arc::default()))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/prediction/")
        .set_json(json!({"symbol": "aapl", "start_date": "2024-06-12", "days": 3}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 200);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["symbol"], "AAPL");
    assert_eq!(body["predicted_data"].as_array().unwrap().len(), 3);
    assert_eq!(body["predicted_dates"][0], "2024-06-12");
    assert!(body["historical_data"][0]["date"].is_string());
    assert!(body["historical_data"][0]["price"].is_number());
    let accuracy = body["accuracy"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&accuracy));
}

#[actix_web::test]
async fn test_path_without_trailing_slash() {
    let app = test::init_service(
        App::new()
            .app_data(pipeline(Arc::default()))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/prediction")
        .set_json(json!({"symbol": "MSFT", "start_date": "2024-06-12"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 200);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["predicted_data"].as_array().unwrap().len(), 3);
}

#[actix_web::test]
async fn test_invalid_date_is_bad_request() {
    let provider = Arc::new(SyntheticProvider::default());
    let app = test::init_service(
        App::new()
            .app_data(pipeline(provider.clone()))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/prediction/")
        .set_json(json!({"symbol": "AAPL", "start_date": "2019/13/45", "days": 3}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["kind"], "invalid_request");
    assert!(body["error"].as_str().unwrap().contains("YYYY-MM-DD"));
    assert_eq!(provider.calls(), 0);
}

#[actix_web::test]
async fn test_unknown_symbol_is_not_found() {
    let app = test::init_service(
        App::new()
            .app_data(pipeline(Arc::default()))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/prediction/")
        .set_json(json!({"symbol": UNKNOWN_SYMBOL, "start_date": "2024-06-12"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["kind"], "data_unavailable");
}

#[actix_web::test]
async fn test_malformed_body_is_bad_request() {
    let app = test::init_service(
        App::new()
            .app_data(pipeline(Arc::default()))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/prediction/")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{\"symbol\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["kind"], "invalid_request");
}

#[actix_web::test]
async fn test_days_out_of_range_is_bad_request() {
    let app = test::init_service(
        App::new()
            .app_data(pipeline(Arc::default()))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/prediction/")
        .set_json(json!({"symbol": "AAPL", "days": 0}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[actix_web::test]
async fn test_cors_headers_and_preflight() {
    let app = test::init_service(
        App::new()
            .app_data(pipeline(Arc::default()))
            .wrap(cors_headers("*"))
            .configure(routes),
    )
    .await;

    for path in ["/prediction/", "/prediction", "/"] {
        let req = test::TestRequest::default()
            .method(actix_web::http::Method::OPTIONS)
            .uri(path)
            .insert_header(("Access-Control-Request-Headers", "authorization, x-requested-with"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 204, "preflight on {}", path);
        assert_eq!(resp.headers().get("access-control-allow-origin").unwrap(), "*");
        assert_eq!(resp.headers().get("access-control-allow-headers").unwrap(), "*");
    }

    // Preflight routing does not shadow the real handlers
    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 200);
}
