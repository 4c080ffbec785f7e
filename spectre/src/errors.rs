//! HTTP error mapping for the query routes, following the teacher's
//! `sk-tracer::errors::ExportResponseError` shape: a `Responder` enum with
//! `From` impls for whatever the route handlers can fail with.

use rocket::Responder;

use crate::query_engine::QueryEngineError;

#[derive(Responder)]
pub enum ApiError {
    #[response(status = 504)]
    Timeout(String),
}

impl From<QueryEngineError> for ApiError {
    fn from(e: QueryEngineError) -> Self {
        match e {
            QueryEngineError::Timeout(_) => ApiError::Timeout(format!("{e}")),
        }
    }
}
