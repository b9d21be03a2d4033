use actix_web::{HttpResponse, get, post, web};
use serde::Serialize;
use statusboard_service::{ProbeResult, Scheduler, Snapshot};

use crate::error::ApiError;

macros_utils::routes! {
    route status_route,
    route history_route,
    route refresh_route,
}

#[derive(Serialize)]
struct StatusResponse<'a> {
    timestamp: String,
    data: Vec<StatusEntry<'a>>,
}

#[derive(Serialize)]
struct StatusEntry<'a> {
    state: &'a str,
    main: Option<&'a ProbeResult>,
    label: Option<String>,
}

impl<'a> StatusResponse<'a> {
    fn from_snapshot(snapshot: &'a Snapshot) -> Self {
        Self {
            timestamp: snapshot.timestamp_iso(),
            data: snapshot
                .entries()
                .map(|(state, main)| StatusEntry { state, main, label: main.map(ProbeResult::label) })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct RefreshResponse {
    message: &'static str,
    timestamp: String,
}

/// Latest snapshot, entries sorted by jurisdiction. Runs a round first if
/// nothing has been recorded yet.
#[get("/api/status")]
pub async fn status_route(scheduler: web::Data<Scheduler>) -> Result<HttpResponse, ApiError> {
    let latest = match scheduler.history().latest().await {
        Some(latest) => latest,
        None => scheduler.trigger_round_and_await().await?,
    };

    Ok(HttpResponse::Ok().json(StatusResponse::from_snapshot(&latest)))
}

/// Full retained history, in the persisted layout.
#[get("/api/history")]
pub async fn history_route(scheduler: web::Data<Scheduler>) -> HttpResponse {
    let history = scheduler.history().all().await;
    let snapshots: Vec<&Snapshot> = history.iter().map(AsRef::as_ref).collect();

    HttpResponse::Ok().json(snapshots)
}

/// Run a round now, or wait for the one already in flight.
#[post("/api/refresh")]
pub async fn refresh_route(scheduler: web::Data<Scheduler>) -> Result<HttpResponse, ApiError> {
    let snapshot = scheduler.trigger_round_and_await().await?;

    Ok(HttpResponse::Ok().json(RefreshResponse { message: "Checks performed", timestamp: snapshot.timestamp_iso() }))
}
