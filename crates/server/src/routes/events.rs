use std::{convert::Infallible, time::Duration};

use axum::{
    Extension, Router,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use deployment::Deployment;
use futures_util::stream::{self, Stream, StreamExt};
use protocol::RealtimeEvent;
use utils::event_hub::to_sse_event;

use crate::{DeploymentImpl, http::RequestContext};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Realtime feed for the caller's session. The first frame tells the client
/// the subscription is live, so it can reload its REST snapshot.
pub async fn stream_events(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let user_id = ctx.actor.id();
    let workspace_id = ctx.actor.workspace_id();
    tracing::debug!(%user_id, %workspace_id, "realtime session opened");

    let ready = stream::once(async move { Ok(to_sse_event(&RealtimeEvent::connected(workspace_id))) });
    let live = deployment.stream_events_for(ctx.actor.subscriber());

    Sse::new(ready.chain(live))
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("ping"))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new().route("/events", get(stream_events))
}
