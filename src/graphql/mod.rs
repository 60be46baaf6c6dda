/// GraphQL API surface
///
/// Queries and mutations are served over HTTP at `/graphql`; subscriptions
/// over WebSocket at `/graphql/ws`. The viewer comes from the bearer token
/// (HTTP) or the `authorization` key of the `connection_init` payload (WS).
mod mutation;
mod query;
mod subscription;

pub use mutation::MutationRoot;
pub use query::QueryRoot;
pub use subscription::SubscriptionRoot;

use crate::{
    auth::{self, OptionalAuthContext, Viewer},
    context::AppContext,
    error::AppError,
    metrics,
};
use async_graphql::{
    http::{GraphiQLSource, ALL_WEBSOCKET_PROTOCOLS},
    Context, Data, ErrorExtensions, Schema,
};
use async_graphql_axum::{GraphQLProtocol, GraphQLRequest, GraphQLResponse, GraphQLWebSocket};
use axum::{
    extract::{State, WebSocketUpgrade},
    response::{Html, IntoResponse, Response},
    Extension,
};

pub type AppSchema = Schema<QueryRoot, MutationRoot, SubscriptionRoot>;

/// Build the executable schema over the application context
pub fn build_schema(ctx: AppContext) -> AppSchema {
    Schema::build(QueryRoot, MutationRoot, SubscriptionRoot)
        .data(ctx)
        .limit_depth(16)
        .finish()
}

/// Shared context of the running application
pub(crate) fn app<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a AppContext> {
    ctx.data::<AppContext>()
}

/// The caller, if a valid token was presented
pub(crate) fn viewer(ctx: &Context<'_>) -> Option<Viewer> {
    ctx.data_opt::<Viewer>().copied()
}

/// The caller, or an UNAUTHORIZED error
pub(crate) fn require_viewer(ctx: &Context<'_>) -> async_graphql::Result<Viewer> {
    viewer(ctx).ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()).extend())
}

/// POST /graphql
pub async fn graphql_handler(
    Extension(schema): Extension<AppSchema>,
    auth: OptionalAuthContext,
    request: GraphQLRequest,
) -> GraphQLResponse {
    let mut request = request.into_inner();
    let kind = operation_kind(&request.query);
    if let Some(viewer) = auth.viewer {
        request = request.data(viewer);
    }

    let response = schema.execute(request).await;
    metrics::record_graphql_request(kind, response.errors.is_empty());
    response.into()
}

/// GET /graphql
pub async fn graphiql() -> impl IntoResponse {
    Html(
        GraphiQLSource::build()
            .endpoint("/graphql")
            .subscription_endpoint("/graphql/ws")
            .finish(),
    )
}

/// GET /graphql/ws
pub async fn graphql_ws_handler(
    State(ctx): State<AppContext>,
    Extension(schema): Extension<AppSchema>,
    protocol: GraphQLProtocol,
    upgrade: WebSocketUpgrade,
) -> Response {
    let secret = ctx.config.authentication.jwt_secret.clone();

    upgrade
        .protocols(ALL_WEBSOCKET_PROTOCOLS)
        .on_upgrade(move |stream| async move {
            metrics::GRAPHQL_SUBSCRIPTIONS_ACTIVE.inc();
            metrics::record_graphql_request("subscription", true);

            GraphQLWebSocket::new(stream, schema, protocol)
                .on_connection_init(move |payload| connection_data(payload, secret))
                .serve()
                .await;

            metrics::GRAPHQL_SUBSCRIPTIONS_ACTIVE.dec();
        })
}

/// Resolve the viewer from a `connection_init` payload.
/// Anonymous connections are accepted; subscriptions that need a viewer
/// fail individually.
async fn connection_data(payload: serde_json::Value, secret: String) -> async_graphql::Result<Data> {
    let mut data = Data::default();

    if let Some(value) = payload
        .get("authorization")
        .or_else(|| payload.get("Authorization"))
        .and_then(|v| v.as_str())
    {
        let viewer = auth::viewer_from_authorization(value, &secret).map_err(|e| e.extend())?;
        tracing::debug!(user_id = viewer.id, "WebSocket connection authenticated");
        data.insert(viewer);
    }

    Ok(data)
}

fn operation_kind(query: &str) -> &'static str {
    let query = query.trim_start();
    if query.starts_with("mutation") {
        "mutation"
    } else if query.starts_with("subscription") {
        "subscription"
    } else {
        "query"
    }
}
