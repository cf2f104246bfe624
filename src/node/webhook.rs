//! Transfer event webhook receiver
//!
//! The server node delivers `CONDITIONAL_TRANSFER_CREATED` notifications by
//! POSTing them to a URL registered at connect time. This receiver parses
//! each notification and publishes it on the node client's event bus.

use anyhow::Context;
use serde::Serialize;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tracing::info;
use warp::Filter;

use super::TransferCreatedEvent;
use crate::events::TransferEventBus;

/// Standard API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

/// Builds the webhook routes.
///
/// Exposes `POST /webhooks/conditional-transfer-created`.
pub fn routes(
    bus: TransferEventBus,
) -> impl Filter<Extract = (impl warp::Reply,), Error = std::convert::Infallible> + Clone {
    let bus_filter = warp::any().map(move || bus.clone());

    warp::path!("webhooks" / "conditional-transfer-created")
        .and(warp::post())
        .and(warp::body::json::<TransferCreatedEvent>())
        .and(bus_filter)
        .and_then(transfer_created_handler)
        .recover(handle_rejection)
}

/// Binds the webhook receiver.
///
/// Binding happens before this returns, so a busy port is reported to the
/// caller instead of surfacing later inside a spawned task.
///
/// # Arguments
///
/// * `bus` - Event bus shared with the node client
/// * `host` - Bind host
/// * `port` - Bind port, 0 for any free port
///
/// # Returns
///
/// * `Ok((SocketAddr, Future))` - Bound address and the server future to drive
/// * `Err(anyhow::Error)` - The address could not be bound
pub fn bind_webhook_server(
    bus: TransferEventBus,
    host: &str,
    port: u16,
) -> anyhow::Result<(SocketAddr, impl Future<Output = ()>)> {
    // Fall back to loopback if host parsing fails.
    let ip: IpAddr = host.parse().unwrap_or(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
    let (addr, server) = warp::serve(routes(bus))
        .try_bind_ephemeral((ip, port))
        .with_context(|| format!("Failed to bind transfer event webhook on {}:{}", ip, port))?;
    info!("Transfer event webhook listening on {}", addr);
    Ok((addr, server))
}

async fn transfer_created_handler(
    event: TransferCreatedEvent,
    bus: TransferEventBus,
) -> Result<impl warp::Reply, warp::Rejection> {
    let delivered = bus.publish(event);
    Ok(warp::reply::json(&ApiResponse::<usize> {
        success: true,
        data: Some(delivered),
        error: None,
    }))
}

/// Normalize rejections into a consistent JSON error response.
async fn handle_rejection(err: warp::Rejection) -> Result<impl warp::Reply, std::convert::Infallible> {
    let (status, message) = if err.is_not_found() {
        (warp::http::StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (warp::http::StatusCode::BAD_REQUEST, format!("Invalid event payload: {}", e))
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (warp::http::StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        (warp::http::StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };

    let response = ApiResponse::<()> {
        success: false,
        data: None,
        error: Some(message),
    };

    Ok(warp::reply::with_status(warp::reply::json(&response), status))
}
