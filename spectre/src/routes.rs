//! The Query contract's HTTP surface (spec.md §6), generalizing the
//! teacher's single `#[rocket::post("/export", ...)]` handler
//! (`sk-tracer::main`) into one route per query operation.

use std::sync::Arc;

use rocket::form::FromForm;
use rocket::serde::json::Json;
use rocket::State;
use spectre_types::{BlastRadiusQuery, BlastRadiusResult, QueryEventsResult, RootCauseCandidate, RootCauseQuery, TimelineFilters, TimelineQuery, TopologyResult};

use crate::errors::ApiError;
use crate::query_engine::QueryEngine;

#[derive(FromForm)]
pub struct TimelineParams {
    start_sec: i64,
    end_sec: i64,
    kind: Option<String>,
    namespace: Option<String>,
    api_group: Option<String>,
}

#[rocket::get("/timeline?<params..>")]
pub async fn timeline(params: TimelineParams, engine: &State<Arc<QueryEngine>>) -> Result<Json<QueryEventsResult>, ApiError> {
    let query = TimelineQuery {
        start_sec: params.start_sec,
        end_sec: params.end_sec,
        filters: TimelineFilters { kind: params.kind, namespace: params.namespace, api_group: params.api_group },
    };
    Ok(Json(engine.timeline(&query).await?))
}

#[rocket::get("/topology/<resource_uid>")]
pub async fn topology(resource_uid: &str, engine: &State<Arc<QueryEngine>>) -> Result<Json<TopologyResult>, ApiError> {
    Ok(Json(engine.topology(resource_uid).await?))
}

#[rocket::post("/root-cause", data = "<query>")]
pub async fn root_cause(query: Json<RootCauseQuery>, engine: &State<Arc<QueryEngine>>) -> Result<Json<Vec<RootCauseCandidate>>, ApiError> {
    Ok(Json(engine.root_cause(&query).await?))
}

#[rocket::post("/blast-radius", data = "<query>")]
pub async fn blast_radius(query: Json<BlastRadiusQuery>, engine: &State<Arc<QueryEngine>>) -> Result<Json<BlastRadiusResult>, ApiError> {
    Ok(Json(engine.blast_radius(&query).await?))
}
