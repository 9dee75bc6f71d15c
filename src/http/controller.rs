use std::convert::Infallible;
use std::net::SocketAddr;

use log::info;
use warp::{Filter, Reply};

use crate::config::Config;
use crate::http::error::handle_rejection;
use crate::http::handlers::{
    delete_probe, get_probe, identifier_param, list_probes, probe_params, register_probe,
    update_probe, SharedBackend,
};

pub fn routes(
    backend: SharedBackend,
    body_limit: u64,
) -> impl Filter<Extract=(impl Reply, ), Error=Infallible> + Clone {
    let store_filter = warp::any().map(move || backend.clone());

    let list_probes_route = warp::path("probes")
        .and(warp::path::end())
        .and(warp::get())
        .and(store_filter.clone())
        .and_then(list_probes);

    let register_probe_route = warp::path("probes")
        .and(warp::path::end())
        .and(warp::post())
        .and(probe_params(body_limit))
        .and(store_filter.clone())
        .and_then(register_probe);

    let get_probe_route = warp::path("probes")
        .and(identifier_param())
        .and(warp::path::end())
        .and(warp::get())
        .and(store_filter.clone())
        .and_then(get_probe);

    let update_probe_route = warp::path("probes")
        .and(identifier_param())
        .and(warp::path::end())
        .and(warp::put())
        .and(probe_params(body_limit))
        .and(store_filter.clone())
        .and_then(update_probe);

    let delete_probe_route = warp::path("probes")
        .and(identifier_param())
        .and(warp::path::end())
        .and(warp::delete())
        .and(store_filter.clone())
        .and_then(delete_probe);

    list_probes_route
        .or(register_probe_route)
        .or(get_probe_route)
        .or(update_probe_route)
        .or(delete_probe_route)
        .recover(handle_rejection)
        .with(warp::log("probereg::http"))
}

pub async fn setup_controller(config: &Config, backend: SharedBackend) -> Result<(), warp::Error> {
    let address = SocketAddr::new(config.host, config.port);
    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, shutting down");
    };

    let (bound, server) = warp::serve(routes(backend, config.body_limit))
        .try_bind_with_graceful_shutdown(address, shutdown)?;
    info!("Probe registry listening on {}", bound);

    server.await;
    Ok(())
}
