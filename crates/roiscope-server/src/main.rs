//! Roiscope ROI Server
//!
//! A small reference server for the ROI fetch and save endpoints, keeping
//! every image's ROIs in memory.
//!
//! ## Endpoints
//!
//! ```text
//! GET  /rois?image=<id>   -> [ { "@id": 1, "shapes": [ ... ] } ]
//! POST /rois              <- { "imageId": 1, "rois": { "-1": { "shapes": [ ... ] } } }
//!                         -> { "ids": { "-1:1": "1:1" } }
//! ```

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use dashmap::DashMap;
use roiscope_core::service::{RoiRepository, ServiceError};
use roiscope_core::{RoiJson, SaveRequest, SaveResponse};
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

const DEFAULT_ADDR: &str = "0.0.0.0:4080";

/// Shared application state
#[derive(Default)]
struct AppState {
    /// ROIs per image id
    images: DashMap<i64, RoiRepository>,
}

impl AppState {
    fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Deserialize)]
struct RoisQuery {
    image: i64,
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/rois", get(fetch_rois).post(save_rois))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roiscope_server=info,tower_http=info".into()),
        )
        .init();

    let addr: SocketAddr = std::env::var("ROISCOPE_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;
    let app = router(Arc::new(AppState::new()));

    info!("Roiscope ROI server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Index page
async fn index() -> &'static str {
    "Roiscope ROI Server - GET or POST /rois"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// All ROIs of an image. Unknown images have none.
async fn fetch_rois(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RoisQuery>,
) -> Json<Vec<RoiJson>> {
    let rois = state
        .images
        .get(&query.image)
        .map(|repo| repo.rois())
        .unwrap_or_default();
    info!("Fetched {} ROIs of image {}", rois.len(), query.image);
    Json(rois)
}

/// Store new and changed shapes and drop deleted ones.
async fn save_rois(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SaveRequest>,
) -> Result<Json<SaveResponse>, (StatusCode, String)> {
    let mut repo = state.images.entry(request.image_id).or_default();
    match repo.save(&request.rois) {
        Ok(response) => {
            info!(
                "Saved {} shapes of image {}",
                response.ids.len(),
                request.image_id
            );
            Ok(Json(response))
        }
        Err(e) => {
            warn!("Rejected save for image {}: {}", request.image_id, e);
            let status = match e {
                ServiceError::Serialization(_) => StatusCode::BAD_REQUEST,
                ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err((status, e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roiscope_core::codec::RoiPayload;
    use roiscope_core::{HttpRoiService, RegionsConfig, RoiService};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn request(shapes: Vec<serde_json::Value>) -> SaveRequest {
        SaveRequest {
            image_id: 7,
            rois: BTreeMap::from([("-1".to_string(), RoiPayload { shapes })]),
        }
    }

    #[tokio::test]
    async fn test_save_then_fetch() {
        let state = Arc::new(AppState::new());
        let saved = save_rois(
            State(state.clone()),
            Json(request(vec![
                json!({ "@type": "#Rectangle", "X": 1.0, "Y": 2.0, "Width": 3.0, "Height": 4.0, "oldId": "-1:1" }),
            ])),
        )
        .await
        .unwrap();
        assert_eq!(saved.0.ids["-1:1"], "1:1");

        let Json(rois) = fetch_rois(State(state.clone()), Query(RoisQuery { image: 7 })).await;
        assert_eq!(rois.len(), 1);
        assert_eq!(rois[0].id, 1);
        assert_eq!(rois[0].shapes[0]["@id"], json!(1));

        let Json(other) = fetch_rois(State(state), Query(RoisQuery { image: 8 })).await;
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_bad_request() {
        let state = Arc::new(AppState::new());
        let result = save_rois(State(state), Json(request(vec![json!({ "@type": "#Point" })]))).await;
        let (status, _) = result.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    /// Serve the router on an ephemeral local port.
    async fn serve() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(Arc::new(AppState::new())))
                .await
                .unwrap();
        });
        format!("http://{addr}")
    }

    fn http_service(server_url: String) -> HttpRoiService {
        HttpRoiService::new(RegionsConfig {
            server_url,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_http_service_round_trip() {
        let service = http_service(serve().await);
        let saved = tokio::task::spawn_blocking(move || {
            let saved = pollster::block_on(service.save_rois(&request(vec![
                json!({ "@type": "#Ellipse", "X": 5.0, "Y": 5.0, "RadiusX": 2.0, "RadiusY": 1.0, "oldId": "-1:1" }),
            ])));
            let fetched = pollster::block_on(service.fetch_rois(7));
            let other = pollster::block_on(service.fetch_rois(8));
            (saved, fetched, other)
        })
        .await
        .unwrap();

        let (saved, fetched, other) = saved;
        assert_eq!(saved.unwrap().ids["-1:1"], "1:1");
        let fetched = fetched.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].shapes[0]["@type"], json!("#Ellipse"));
        assert!(other.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_http_service_bad_request() {
        let service = http_service(serve().await);
        let result = tokio::task::spawn_blocking(move || {
            pollster::block_on(service.save_rois(&request(vec![json!({ "@type": "#Point" })])))
        })
        .await
        .unwrap();
        assert!(matches!(result, Err(ServiceError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_health() {
        assert_eq!(health().await, "ok");
    }
}
