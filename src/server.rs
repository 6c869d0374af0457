//! HTTP front end.
//!
//! `POST /prediction/` accepts `{"symbol", "start_date"?, "days"?}` and
//! answers with a [`ForecastReport`] or `{"error", "kind"}`. Training is
//! CPU-bound and the market data client blocks, so every forecast runs on the
//! blocking thread pool.

use actix_web::http::{Method, StatusCode};
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{get, web, App, HttpResponse, HttpServer, Responder, ResponseError};
use log::{error, info, warn};
use serde::Serialize;

use crate::error::{ErrorKind, ForecastError};
use crate::pipeline::{ForecastPipeline, ForecastReport, PredictionRequest};

const PREDICTION_PATHS: [&str; 2] = ["/prediction/", "/prediction"];

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: ErrorKind,
}

impl ResponseError for ForecastError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorKind::DataUnavailable => StatusCode::NOT_FOUND,
            ErrorKind::InsufficientData => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::ProviderFailure => StatusCode::BAD_GATEWAY,
            ErrorKind::TrainingFailure | ErrorKind::PredictionInvalid | ErrorKind::Config => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
        })
    }
}

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "stock-forecast",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn predict(
    pipeline: web::Data<ForecastPipeline>,
    payload: web::Json<PredictionRequest>,
) -> Result<web::Json<ForecastReport>, ForecastError> {
    let pipeline = pipeline.into_inner();
    let payload = payload.into_inner();
    info!("Forecast requested for {:?}", payload.symbol);

    let outcome = web::block(move || pipeline.handle(&payload))
        .await
        .map_err(|e| ForecastError::TrainingFailure(format!("forecast worker failed: {}", e)))?;

    match outcome {
        Ok(report) => Ok(web::Json(report)),
        Err(e) => {
            match e.kind() {
                ErrorKind::InvalidRequest => warn!("Rejected request: {}", e),
                kind => error!("Forecast failed ({}): {}", kind, e),
            }
            Err(e)
        }
    }
}

async fn preflight() -> HttpResponse {
    HttpResponse::NoContent().finish()
}

/// Malformed JSON bodies are reported like any other invalid request.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        ForecastError::InvalidRequest(format!("malformed request body: {}", err)).into()
    })
}

/// CORS headers added to every response.
pub fn cors_headers(allowed_origin: &str) -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", allowed_origin.to_string()))
        .add(("Access-Control-Allow-Methods", "GET, POST, OPTIONS"))
        .add(("Access-Control-Allow-Headers", "*"))
        .add(("Access-Control-Max-Age", "3600"))
}

/// Registers every route. The pipeline itself is supplied as app data.
///
/// CORS preflight is answered on any path.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config()).service(index);
    for path in PREDICTION_PATHS {
        cfg.route(path, web::post().to(predict));
    }
    cfg.route("/{tail:.*}", web::method(Method::OPTIONS).to(preflight));
}

/// Serves `pipeline` until the process is stopped.
///
/// Must be called outside any async runtime: the actix system is started
/// here.
pub fn run(pipeline: ForecastPipeline) -> std::io::Result<()> {
    let server_config = pipeline.config().server.clone();
    let pipeline = web::Data::new(pipeline);

    actix_web::rt::System::new().block_on(async move {
        let origin = server_config.allowed_origin.clone();
        let mut server = HttpServer::new(move || {
            App::new()
                .app_data(pipeline.clone())
                .wrap(cors_headers(&origin))
                .wrap(Logger::default())
                .configure(routes)
        });
        if let Some(workers) = server_config.workers {
            server = server.workers(workers);
        }

        info!(
            "Listening on http://{}:{}",
            server_config.host, server_config.port
        );
        server
            .bind((server_config.host.as_str(), server_config.port))?
            .run()
            .await
    })
}
