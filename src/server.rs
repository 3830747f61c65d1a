use crate::bus_list;
use crate::error::FleetError;
use crate::fleet::{self, LocationUpdate, NewBus, NewDriver};
use crate::state::AppState;
use crate::vehicle_feed::build_feed;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use prost::Message;
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{error, warn};
use warp::http::StatusCode;
use warp::reply::{Reply, Response};
use warp::{Filter, Rejection};

pub type Admins = Arc<HashMap<String, String>>;

#[derive(Debug)]
struct Unauthorized;

impl warp::reject::Reject for Unauthorized {}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub fn routes(
    state: Arc<AppState>,
    admins: Admins,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let state_filter = warp::any().map(move || state.clone());

    // GET /buses
    let buses_route = warp::path("buses")
        .and(warp::path::end())
        .and(warp::get())
        .and(state_filter.clone())
        .map(|state: Arc<AppState>| {
            let list = bus_list::build(&fleet::snapshots(&state), Utc::now());
            warp::reply::json(&list)
        });

    // GET /map
    let map_route = warp::path("map")
        .and(warp::path::end())
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(|state: Arc<AppState>| async move {
            let map = state.live_map.lock().await;
            Ok::<_, Rejection>(warp::reply::json(&map.payload()))
        });

    // GET /vehicle-positions
    let positions_route = warp::path("vehicle-positions")
        .and(warp::path::end())
        .and(warp::get())
        .and(state_filter.clone())
        .map(|state: Arc<AppState>| {
            let feed = build_feed(&fleet::snapshots(&state), Utc::now());
            warp::reply::with_header(
                feed.encode_to_vec(),
                "content-type",
                "application/x-protobuf",
            )
        });

    // POST /driver/location
    let driver_route = warp::path!("driver" / "location")
        .and(warp::post())
        .and(warp::body::json())
        .and(state_filter.clone())
        .map(|update: LocationUpdate, state: Arc<AppState>| {
            fleet_reply(fleet::update_location(&state, update), StatusCode::OK)
        });

    let admin = with_admin(admins);

    // GET /drivers
    let drivers_route = warp::path("drivers")
        .and(warp::path::end())
        .and(warp::get())
        .and(admin.clone())
        .and(state_filter.clone())
        .map(|state: Arc<AppState>| warp::reply::json(&fleet::list_drivers(&state)));

    // POST /admin/buses
    let add_bus_route = warp::path!("admin" / "buses")
        .and(warp::post())
        .and(admin.clone())
        .and(warp::body::json())
        .and(state_filter.clone())
        .map(|new: NewBus, state: Arc<AppState>| {
            fleet_reply(fleet::add_bus(&state, new), StatusCode::CREATED)
        });

    // DELETE /admin/buses/{id}
    let delete_bus_route = warp::path!("admin" / "buses" / String)
        .and(warp::delete())
        .and(admin.clone())
        .and(state_filter.clone())
        .map(|id: String, state: Arc<AppState>| {
            fleet_reply(fleet::delete_bus(&state, &id), StatusCode::OK)
        });

    // POST /admin/drivers
    let add_driver_route = warp::path!("admin" / "drivers")
        .and(warp::post())
        .and(admin.clone())
        .and(warp::body::json())
        .and(state_filter.clone())
        .map(|new: NewDriver, state: Arc<AppState>| {
            fleet_reply(fleet::add_driver(&state, new), StatusCode::CREATED)
        });

    // PUT /admin/drivers/{id}
    let update_driver_route = warp::path!("admin" / "drivers" / String)
        .and(warp::put())
        .and(admin.clone())
        .and(warp::body::json())
        .and(state_filter.clone())
        .map(|id: String, edit: NewDriver, state: Arc<AppState>| {
            fleet_reply(fleet::update_driver(&state, &id, edit), StatusCode::OK)
        });

    // DELETE /admin/drivers/{id}
    let delete_driver_route = warp::path!("admin" / "drivers" / String)
        .and(warp::delete())
        .and(admin)
        .and(state_filter)
        .map(|id: String, state: Arc<AppState>| {
            fleet_reply(fleet::delete_driver(&state, &id), StatusCode::OK)
        });

    buses_route
        .or(map_route)
        .or(positions_route)
        .or(driver_route)
        .or(drivers_route)
        .or(add_bus_route)
        .or(delete_bus_route)
        .or(add_driver_route)
        .or(update_driver_route)
        .or(delete_driver_route)
        .recover(handle_rejection)
}

fn with_admin(admins: Admins) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and_then(move |header: Option<String>| {
            let admins = admins.clone();
            async move {
                match header.as_deref().and_then(basic_credentials) {
                    Some((user, pass)) if admins.get(&user) == Some(&pass) => Ok(()),
                    _ => Err(warp::reject::custom(Unauthorized)),
                }
            }
        })
        .untuple_one()
}

fn basic_credentials(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn fleet_reply<T: Serialize>(result: Result<T, FleetError>, ok: StatusCode) -> Response {
    match result {
        Ok(v) => warp::reply::with_status(warp::reply::json(&v), ok).into_response(),
        Err(e) => {
            let status = match e {
                FleetError::BusNotFound(_) | FleetError::DriverNotFound(_) => StatusCode::NOT_FOUND,
                FleetError::Invalid(_) => StatusCode::BAD_REQUEST,
                FleetError::ReadOnly => StatusCode::CONFLICT,
            };
            warn!(error = %e, "fleet write rejected");
            error_reply(status, e.to_string())
        }
    }
}

fn error_reply(status: StatusCode, error: String) -> Response {
    warp::reply::with_status(warp::reply::json(&ErrorBody { error }), status).into_response()
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if err.is_not_found() {
        return Ok(error_reply(StatusCode::NOT_FOUND, "not found".to_string()));
    }
    if err.find::<Unauthorized>().is_some() {
        let reply = error_reply(StatusCode::UNAUTHORIZED, "admin credentials required".to_string());
        return Ok(warp::reply::with_header(reply, "www-authenticate", "Basic realm=\"admin\"")
            .into_response());
    }
    if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        return Ok(error_reply(StatusCode::BAD_REQUEST, e.to_string()));
    }
    if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(error_reply(
            StatusCode::METHOD_NOT_ALLOWED,
            "method not allowed".to_string(),
        ));
    }
    error!(rejection = ?err, "unhandled rejection");
    Ok(error_reply(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal error".to_string(),
    ))
}
