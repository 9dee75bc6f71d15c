use std::sync::Arc;

use log::info;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use serde_json::json as json_value;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::{json, with_status, Response};
use warp::{Filter, Rejection, Reply};

use crate::http::error::{bad_request, storage_unavailable, BodyTooLarge, InvalidIdentifier};
use crate::http::probe_request::RawParams;
use crate::store::store::{Backend, ProbeStore};

pub type SharedBackend = Arc<dyn Backend>;

#[derive(Debug, Serialize)]
struct Envelope<'a, T: Serialize> {
    message: &'a str,
    data: T,
}

fn respond<T: Serialize>(message: &str, data: T, status: StatusCode) -> Response {
    with_status(json(&Envelope { message, data }), status).into_response()
}

fn not_found() -> Response {
    respond("Probe not found", json_value!({}), StatusCode::NOT_FOUND)
}

fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Path segment naming a probe, percent-decoded.
pub fn identifier_param() -> impl Filter<Extract=(String, ), Error=Rejection> + Clone {
    warp::path::param::<String>().and_then(|segment: String| async move {
        percent_decode_str(&segment)
            .decode_utf8()
            .map(|identifier| identifier.into_owned())
            .map_err(|_| warp::reject::custom(InvalidIdentifier))
    })
}

/// Query string, content type and raw body. Decoding is left to the handler.
pub fn probe_params(limit: u64) -> impl Filter<Extract=(RawParams, ), Error=Rejection> + Clone {
    content_length_limit(limit)
        .and(warp::query::<Vec<(String, String)>>())
        .and(warp::header::optional::<String>("content-type"))
        .and(body_bytes(limit))
        .map(RawParams::new)
}

/// Rejects early when the declared length is over the limit. Bodies without
/// a content length are checked by `body_bytes` once read.
fn content_length_limit(limit: u64) -> impl Filter<Extract=(), Error=Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and_then(move |length: Option<u64>| async move {
            match length {
                Some(length) if length > limit => Err(warp::reject::custom(BodyTooLarge)),
                _ => Ok(()),
            }
        })
        .untuple_one()
}

fn body_bytes(limit: u64) -> impl Filter<Extract=(Bytes, ), Error=Rejection> + Clone {
    warp::body::bytes().and_then(move |body: Bytes| async move {
        if body.len() as u64 > limit {
            Err(warp::reject::custom(BodyTooLarge))
        } else {
            Ok(body)
        }
    })
}

/// Opens a store for this request, runs one operation against it and closes it.
/// The handle is released on every path; writes only land when close succeeds.
async fn with_store<F>(backend: &SharedBackend, operation: F) -> Result<Response, Rejection>
where
    F: FnOnce(&mut dyn ProbeStore) -> Response + Send,
{
    let mut store = backend.open().await.map_err(storage_unavailable)?;
    let response = operation(store.as_mut());
    store.close().await.map_err(storage_unavailable)?;
    Ok(response)
}

pub async fn list_probes(backend: SharedBackend) -> Result<Response, Rejection> {
    with_store(&backend, |store| {
        respond("Success", store.list(), StatusCode::OK)
    }).await
}

pub async fn register_probe(
    params: RawParams,
    backend: SharedBackend,
) -> Result<Response, Rejection> {
    let probe = match params.parse().and_then(|params| params.into_registration()) {
        Ok(probe) => probe,
        Err(err) => return Ok(bad_request(err)),
    };

    with_store(&backend, |store| {
        if let Some(existing) = store.get(probe.get_identifier()) {
            info!("Probe {} already registered", probe.get_identifier());
            return respond("Probe already exists", existing, StatusCode::OK);
        }

        store.put(probe.get_identifier(), probe.clone());
        info!("Registered probe {}", probe.get_identifier());
        respond("Probe registered", probe, StatusCode::CREATED)
    }).await
}

pub async fn get_probe(
    identifier: String,
    backend: SharedBackend,
) -> Result<Response, Rejection> {
    with_store(&backend, |store| {
        match store.get(&identifier) {
            Some(probe) => respond("Probe found", probe, StatusCode::OK),
            None => not_found(),
        }
    }).await
}

pub async fn update_probe(
    identifier: String,
    params: RawParams,
    backend: SharedBackend,
) -> Result<Response, Rejection> {
    with_store(&backend, |store| {
        let mut probe = match store.get(&identifier) {
            Some(probe) => probe,
            None => return not_found(),
        };

        let update = match params.parse() {
            Ok(params) => params.into_update(),
            Err(err) => return bad_request(err),
        };
        if update.is_empty() {
            return no_content();
        }

        probe.merge(update);
        store.put(&identifier, probe.clone());
        info!("Updated probe {}", identifier);
        respond("Probe updated", probe, StatusCode::OK)
    }).await
}

pub async fn delete_probe(
    identifier: String,
    backend: SharedBackend,
) -> Result<Response, Rejection> {
    with_store(&backend, |store| {
        if !store.exists(&identifier) {
            return not_found();
        }

        store.delete(&identifier);
        info!("Deleted probe {}", identifier);
        no_content()
    }).await
}
