use std::convert::Infallible;

use log::{error, warn};
use serde::Serialize;
use serde_json::{Map, Value};
use warp::http::StatusCode;
use warp::reject::{InvalidHeader, InvalidQuery, MethodNotAllowed, Reject};
use warp::reply::{json, with_status, Response};
use warp::{Rejection, Reply};

use crate::http::probe_request::ParamsError;
use crate::store::store::StoreError;

const MISSING_PARAMETER: &str =
    "Missing required parameter in the JSON body or the post body or the query string";

#[derive(Debug, Serialize, Clone)]
pub struct Error {
    message: Value,
}

impl Error {
    pub fn new(message: String) -> Error {
        Error {
            message: Value::String(message)
        }
    }

    /// One entry per missing field, keyed by field name.
    pub fn missing(fields: &[&str]) -> Error {
        let message = fields.iter()
            .map(|field| (field.to_string(), Value::String(MISSING_PARAMETER.to_string())))
            .collect::<Map<String, Value>>();
        Error {
            message: Value::Object(message)
        }
    }
}

#[derive(Debug)]
pub struct StorageUnavailable;

impl Reject for StorageUnavailable {}

#[derive(Debug)]
pub struct BodyTooLarge;

impl Reject for BodyTooLarge {}

#[derive(Debug)]
pub struct InvalidIdentifier;

impl Reject for InvalidIdentifier {}

pub fn storage_unavailable(err: StoreError) -> Rejection {
    error!("Probe store unavailable: {}", err);
    warp::reject::custom(StorageUnavailable)
}

pub fn bad_request(err: ParamsError) -> Response {
    warn!("Rejecting probe request: {}", err);
    let body = match &err {
        ParamsError::Missing(fields) => Error::missing(fields),
        _ => Error::new(err.to_string()),
    };
    with_status(json(&body), StatusCode::BAD_REQUEST).into_response()
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "The requested URL was not found on the server.".to_string())
    } else if err.find::<StorageUnavailable>().is_some() {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
    } else if err.find::<BodyTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "The data value transmitted exceeds the capacity limit.".to_string(),
        )
    } else if err.find::<InvalidIdentifier>().is_some() {
        (StatusCode::BAD_REQUEST, "Probe identifier is not valid UTF-8".to_string())
    } else if let Some(invalid) = err.find::<InvalidQuery>() {
        (StatusCode::BAD_REQUEST, invalid.to_string())
    } else if let Some(invalid) = err.find::<InvalidHeader>() {
        (StatusCode::BAD_REQUEST, invalid.to_string())
    } else if err.find::<MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "The method is not allowed for the requested URL.".to_string(),
        )
    } else {
        error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
    };

    Ok(with_status(json(&Error::new(message)), status))
}
