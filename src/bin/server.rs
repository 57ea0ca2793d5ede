use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use bar_optimizer::packer::Packer;
use bar_optimizer::scenario::ScenarioGenerator;
use bar_optimizer::types::{self, Bar, Demand, Error, Scenario, StockBar};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Deserialize, Serialize)]
struct PackRequest {
    bars: Vec<StockBar>,
    cuts: Vec<Demand>,
    #[serde(default)]
    kerf: f64,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    costs: Vec<CostEntry>,
}

#[derive(Deserialize, Serialize)]
struct ScenariosRequest {
    catalog: Vec<f64>,
    cuts: Vec<Demand>,
    #[serde(default)]
    kerf: f64,
    #[serde(default)]
    costs: Vec<CostEntry>,
}

#[derive(Deserialize, Serialize)]
struct CostEntry {
    length: f64,
    price: f64,
}

#[derive(Serialize)]
struct PackResponse {
    bars: Vec<Bar>,
    bar_count: usize,
    total_waste: f64,
    waste_percent: f64,
    total_cost: Option<f64>,
    effective_cost: Option<f64>,
}

#[derive(Serialize)]
struct ScenariosResponse {
    scenarios: Vec<Scenario>,
}

fn error_status(e: Error) -> (StatusCode, String) {
    let status = match e {
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (status, e.to_string())
}

fn cost_table(costs: &[CostEntry]) -> Vec<(f64, f64)> {
    costs.iter().map(|c| (c.length, c.price)).collect()
}

async fn pack(Json(req): Json<PackRequest>) -> Result<Json<PackResponse>, (StatusCode, String)> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /pack"
    );

    if req.bars.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "at least one stock bar is required".to_string(),
        ));
    }

    let costs = cost_table(&req.costs);
    types::check_costs(&costs).map_err(error_status)?;

    let packer = Packer::new(req.bars, req.kerf);
    let packed = match req.seed {
        Some(seed) => packer.pack_with_rng(&req.cuts, &mut SmallRng::seed_from_u64(seed)),
        None => packer.pack(&req.cuts),
    }
    .map_err(error_status)?;

    let (total_cost, effective_cost) = if costs.is_empty() {
        (None, None)
    } else {
        (
            Some(types::total_cost(&packed, &costs)),
            Some(types::effective_cost(&packed, &costs)),
        )
    };

    Ok(Json(PackResponse {
        bar_count: packed.len(),
        total_waste: types::total_waste(&packed),
        waste_percent: types::waste_percent(&packed),
        total_cost,
        effective_cost,
        bars: packed,
    }))
}

async fn scenarios(
    Json(req): Json<ScenariosRequest>,
) -> Result<Json<ScenariosResponse>, (StatusCode, String)> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /scenarios"
    );

    let costs = cost_table(&req.costs);
    types::check_costs(&costs).map_err(error_status)?;

    let generator = ScenarioGenerator::new(
        req.catalog,
        req.kerf,
        if costs.is_empty() { None } else { Some(costs) },
    );
    let found = generator.generate(&req.cuts).map_err(error_status)?;

    Ok(Json(ScenariosResponse { scenarios: found }))
}

#[tokio::main]
async fn main() {
    let _sentry = sentry::init(sentry::ClientOptions {
        dsn: std::env::var("SENTRY_DSN").ok().and_then(|d| d.parse().ok()),
        release: sentry::release_name!(),
        ..Default::default()
    });

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
        .expect("failed to open development.log");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let app = Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/pack", post(pack))
        .route("/scenarios", post(scenarios))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    eprintln!("Listening on {addr}");
    axum::serve(listener, app).await.unwrap();
}
