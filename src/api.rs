//! REST API for the measurement and loading-plan service.
//!
//! Exposes corner selection, depth-based measurement and container planning
//! over HTTP. Uses Axum as the web framework and supports CORS.

use std::collections::HashSet;
use std::sync::OnceLock;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::config::ApiConfig;
use crate::corners::{
    ContourApproximation, CornerSelector, FrontBack, GeometryError, approximate_corners,
};
use crate::dimensions::{Dimensions, Side, compute_dimensions};
use crate::distance::{DepthDistanceEstimator, DepthFrame, DepthSampling, Intrinsics};
use crate::model::{
    BoxId, BoxRecord, Container, LoadingPlan, Orientation, PlacedItem, ValidationError,
};
use crate::planner::{ContainerPlanner, PlanEvent, PlannerConfig, Rejection, UnplacedReason};
use crate::types::Point2D;

/// Shared handler state: the configured algorithm parameters.
#[derive(Clone, Debug, Default)]
pub struct ApiState {
    pub planner: PlannerConfig,
    pub corners: CornerSelector,
    pub depth: DepthSampling,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>boxfit API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Request body of the planning endpoints.
#[derive(Deserialize, Clone, Debug, ToSchema)]
#[schema(
    example = json!({
        "container": { "width": 120.0, "height": 100.0, "depth": 80.0 },
        "boxes": [
            { "id": "3f2b8c1e-7a4d-4e8b-9c0f-1d2e3a4b5c6d", "width": 30.0, "height": 20.0, "depth": 40.0 },
            { "id": "8a1c2d3e-4f5a-4b6c-8d7e-9f0a1b2c3d4e", "width": 50.0, "height": 50.0, "depth": 50.0 }
        ],
        "allow_rotations": false
    })
)]
pub struct PlanRequest {
    pub container: Container,
    pub boxes: Vec<BoxRecord>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub allow_rotations: Option<bool>,
}

#[derive(Debug)]
enum PlanRequestValidationError {
    InvalidBox(BoxId, ValidationError),
    DuplicateId(BoxId),
}

impl PlanRequest {
    /// Checks box dimensions and id uniqueness. An invalid container is left
    /// to the planner, which reports every box as left over.
    fn validate(&self) -> Result<(), PlanRequestValidationError> {
        let mut seen = HashSet::with_capacity(self.boxes.len());
        for b in &self.boxes {
            BoxRecord::new(b.id.clone(), b.width, b.height, b.depth)
                .map_err(|err| PlanRequestValidationError::InvalidBox(b.id.clone(), err))?;
            if !seen.insert(&b.id) {
                return Err(PlanRequestValidationError::DuplicateId(b.id.clone()));
            }
        }
        Ok(())
    }

    fn planner_config(&self, base: PlannerConfig) -> PlannerConfig {
        let mut config = base;
        if let Some(allow_rotations) = self.allow_rotations {
            config.allow_rotations = allow_rotations;
        }
        config
    }
}

/// Request body of `/corners`.
#[derive(Deserialize, Clone, Debug, ToSchema)]
pub struct CornersRequest {
    /// Polygon vertices, or a dense contour when `simplify` is set.
    pub points: Vec<Point2D>,
    /// Candidate cap for this request, at most 20.
    #[serde(default)]
    #[schema(nullable = true)]
    pub max_candidates: Option<usize>,
    /// Run the contour tolerance sweep before selecting corners.
    #[serde(default)]
    pub simplify: bool,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct CornersResponse {
    pub corners: Vec<Point2D>,
    pub front: Vec<Point2D>,
    pub back: Vec<Point2D>,
    pub mid_front: Point2D,
}

impl CornersResponse {
    fn from_corners(corners: [Point2D; 6]) -> Self {
        let faces = FrontBack::build(&corners);
        Self {
            corners: corners.to_vec(),
            front: faces.front.to_vec(),
            back: faces.back.to_vec(),
            mid_front: faces.mid_front_point(),
        }
    }
}

/// Request body of `/measure`.
#[derive(Deserialize, Clone, Debug, ToSchema)]
pub struct MeasureRequest {
    /// Candidate outline points in depth-frame pixels.
    pub points: Vec<Point2D>,
    pub depth_frame: DepthFrame,
    pub intrinsics: Intrinsics,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct MeasureResponse {
    pub dimensions: Dimensions,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub volume: f64,
    /// Whether every side length could be resolved.
    pub complete: bool,
}

impl From<Dimensions> for MeasureResponse {
    fn from(dimensions: Dimensions) -> Self {
        Self {
            width: dimensions.width(),
            height: dimensions.height(),
            depth: dimensions.depth(),
            volume: dimensions.volume(),
            complete: dimensions.is_complete(),
            dimensions,
        }
    }
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid input data",
        details,
    )
}

fn geometry_error(err: GeometryError) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "No usable corners",
        err.to_string(),
    )
}

fn parse_plan_request(
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Result<PlanRequest, Response> {
    let Json(payload) = payload.map_err(json_deserialize_error)?;

    match payload.validate() {
        Ok(()) => Ok(payload),
        Err(PlanRequestValidationError::InvalidBox(id, err)) => {
            Err(validation_error(format!("box {}: {}", id, err)))
        }
        Err(PlanRequestValidationError::DuplicateId(id)) => {
            Err(validation_error(format!("box id {} appears more than once", id)))
        }
    }
}

impl CornersRequest {
    /// Selector for this request; a requested cap may not exceed
    /// [`CornerSelector::MAX_CANDIDATES_LIMIT`].
    fn selector(&self, configured: CornerSelector) -> Result<CornerSelector, String> {
        match self.max_candidates {
            None => Ok(configured),
            Some(limit) if limit > CornerSelector::MAX_CANDIDATES_LIMIT => Err(format!(
                "max_candidates must not exceed {}, got {}",
                CornerSelector::MAX_CANDIDATES_LIMIT,
                limit
            )),
            Some(limit) => Ok(CornerSelector::new(limit)),
        }
    }
}

fn select_for_request(
    selector: CornerSelector,
    points: &[Point2D],
    simplify: bool,
) -> Result<[Point2D; 6], GeometryError> {
    if simplify {
        approximate_corners(points, &ContourApproximation::default(), &selector)
    } else {
        selector.select(points)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_plan, handle_plan_stream, handle_corners, handle_measure),
    components(
        schemas(
            PlanRequest,
            CornersRequest,
            CornersResponse,
            MeasureRequest,
            MeasureResponse,
            ErrorResponse,
            BoxId,
            BoxRecord,
            Container,
            LoadingPlan,
            PlacedItem,
            Orientation,
            Rejection,
            UnplacedReason,
            PlanEvent,
            Point2D,
            Side,
            Dimensions,
            DepthFrame,
            Intrinsics
        )
    ),
    tags(
        (name = "planning", description = "Container loading plans"),
        (name = "measurement", description = "Box corner detection and measurement")
    )
)]
struct ApiDoc;

/// Builds the router with all endpoints.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/plan", post(handle_plan))
        .route("/plan_stream", post(handle_plan_stream))
        .route("/corners", post(handle_corners))
        .route("/measure", post(handle_measure))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state)
}

/// Binds the configured address and serves until the server stops.
pub async fn start_api_server(config: ApiConfig, state: ApiState) -> std::io::Result<()> {
    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        "Server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() {
        info!("Local access: http://localhost:{}", config.port());
    }
    info!("Endpoints: POST /plan, /plan_stream, /corners, /measure; GET /docs, /docs/openapi.json");

    axum::serve(listener, router(state)).await
}

/// Handler for POST /plan.
///
/// Places the boxes into the container and returns the loading plan.
#[utoipa::path(
    post,
    path = "/plan",
    request_body = PlanRequest,
    responses(
        (status = 200, description = "Loading plan computed", body = LoadingPlan),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "planning"
)]
async fn handle_plan(
    State(state): State<ApiState>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Response {
    let request = match parse_plan_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    info!("New plan request: {} boxes", request.boxes.len());
    let planner = ContainerPlanner::new(request.planner_config(state.planner));
    let plan = planner.plan(&request.container, &request.boxes);
    info!("Result: {}", plan.remarks);

    (StatusCode::OK, Json(plan)).into_response()
}

/// Handler for POST /plan_stream (SSE).
///
/// Streams planner events as they happen, ending with a `finished` event.
#[utoipa::path(
    post,
    path = "/plan_stream",
    request_body = PlanRequest,
    responses(
        (
            status = 200,
            description = "Streams planner events in real-time",
            content_type = "text/event-stream",
            body = PlanEvent
        ),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "planning"
)]
async fn handle_plan_stream(
    State(state): State<ApiState>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Response {
    let request = match parse_plan_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let planner = ContainerPlanner::new(request.planner_config(state.planner));
    let (tx, rx) = mpsc::channel::<String>(32);

    tokio::task::spawn_blocking(move || {
        planner.plan_with_progress(&request.container, &request.boxes, |evt| {
            if let Ok(json) = serde_json::to_string(evt) {
                // A closed receiver only means the client went away.
                if tx.blocking_send(json).is_err() {
                    debug!("plan stream receiver closed");
                }
            }
        });
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for POST /corners.
///
/// Selects the six box corners and splits them into front and back faces.
#[utoipa::path(
    post,
    path = "/corners",
    request_body = CornersRequest,
    responses(
        (status = 200, description = "Corners found", body = CornersResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid candidate cap, insufficient or degenerate geometry", body = ErrorResponse)
    ),
    tag = "measurement"
)]
async fn handle_corners(
    State(state): State<ApiState>,
    payload: Result<Json<CornersRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };

    let selector = match request.selector(state.corners) {
        Ok(selector) => selector,
        Err(details) => return validation_error(details),
    };

    // The subset search is CPU-bound; keep it off the async workers.
    let selection = tokio::task::spawn_blocking(move || {
        select_for_request(selector, &request.points, request.simplify)
    })
    .await;

    match selection {
        Ok(Ok(corners)) => (StatusCode::OK, Json(CornersResponse::from_corners(corners))).into_response(),
        Ok(Err(err)) => geometry_error(err),
        Err(err) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Corner selection failed",
            err.to_string(),
        ),
    }
}

/// Handler for POST /measure.
///
/// Selects corners and resolves the side lengths from the depth frame.
#[utoipa::path(
    post,
    path = "/measure",
    request_body = MeasureRequest,
    responses(
        (status = 200, description = "Box measured", body = MeasureResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid frame or no usable corners", body = ErrorResponse)
    ),
    tag = "measurement"
)]
async fn handle_measure(
    State(state): State<ApiState>,
    payload: Result<Json<MeasureRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };

    if !request.depth_frame.is_consistent() {
        return validation_error(format!(
            "depth frame declares {}x{} pixels but carries {} samples",
            request.depth_frame.width,
            request.depth_frame.height,
            request.depth_frame.data.len()
        ));
    }

    let corners = match state.corners.select(&request.points) {
        Ok(corners) => corners,
        Err(err) => return geometry_error(err),
    };

    let estimator =
        DepthDistanceEstimator::new(&request.depth_frame, request.intrinsics, state.depth);
    let dimensions = compute_dimensions(&corners, &estimator);
    info!(
        "Measured box: {:.1} x {:.1} x {:.1}",
        dimensions.width(),
        dimensions.height(),
        dimensions.depth()
    );

    (StatusCode::OK, Json(MeasureResponse::from(dimensions))).into_response()
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
