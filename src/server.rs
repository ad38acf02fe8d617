use async_graphql::http::{playground_source, GraphQLPlaygroundConfig, ALL_WEBSOCKET_PROTOCOLS};
use async_graphql::{Data, Request, Response};
use async_graphql_axum::{GraphQLProtocol, GraphQLWebSocket};
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::Extension;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer};

use crate::config::Config;
use crate::error::{ConsoleError, ConsoleResult};
use crate::graphql::{ConsoleSchema, IntoGql};
use crate::models::session::Session;

pub const SUBSCRIPTION_PATH: &str = "/ws";

/// The console's HTTP surface: the playground and queries on `/`, live
/// subscriptions on `/ws`, and a health check.
pub fn router(schema: ConsoleSchema, config: &Config) -> ConsoleResult<Router> {
    Ok(Router::new()
        .route("/", get(playground).post(graphql))
        .route(SUBSCRIPTION_PATH, get(subscriptions))
        .route("/health", get(health))
        .layer(cors(config)?)
        .layer(Extension(schema))
        .layer(Extension(PlaygroundEndpoint(
            config.playground_endpoint.clone(),
        ))))
}

#[derive(Clone)]
struct PlaygroundEndpoint(String);

fn cors(config: &Config) -> ConsoleResult<CorsLayer> {
    let origin = match &config.allowed_origin {
        Some(origin) => AllowOrigin::exact(HeaderValue::from_str(origin).map_err(|err| {
            ConsoleError::Config(format!("ALLOWED_ORIGIN is invalid: {}", err))
        })?),
        None => AllowOrigin::from(Any),
    };

    Ok(CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_origin(origin))
}

async fn graphql(
    Extension(schema): Extension<ConsoleSchema>,
    headers: HeaderMap,
    Json(request): Json<Request>,
) -> ConsoleResult<Json<Response>> {
    let header = headers
        .get(Session::HEADER)
        .map(|value| {
            value.to_str().map_err(|err| {
                ConsoleError::InvalidSessionHeader(err.to_string())
            })
        })
        .transpose()?;
    let session = Session::from_header(header)?;

    Ok(Json(schema.execute(request.data(session)).await))
}

/// Serves subscriptions over a websocket. The admin record travels in the
/// `connection_init` payload, since browsers can't set headers on the upgrade.
async fn subscriptions(
    Extension(schema): Extension<ConsoleSchema>,
    protocol: GraphQLProtocol,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade
        .protocols(ALL_WEBSOCKET_PROTOCOLS)
        .on_upgrade(move |socket| {
            GraphQLWebSocket::new(socket, schema, protocol)
                .on_connection_init(connection_data)
                .serve()
        })
}

async fn connection_data(payload: serde_json::Value) -> async_graphql::Result<Data> {
    let session = Session::from_init_payload(&payload).gql()?;
    let mut data = Data::default();
    data.insert(session);

    Ok(data)
}

async fn playground(Extension(endpoint): Extension<PlaygroundEndpoint>) -> Html<String> {
    Html(playground_source(
        GraphQLPlaygroundConfig::new(&endpoint.0).subscription_endpoint(SUBSCRIPTION_PATH),
    ))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
