use crate::state::AppState;
use crate::websocket::{message_types::WsInboundEvent, ChatHub, ConnectionId};
use actix::{Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web::http::StatusCode;
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

// Serialized event forwarded from the registry channel into the actor
// mailbox; mailbox order preserves issuance order per connection.
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct OutboundFrame(String);

// WebSocket session actor, one per live connection
struct WsSession {
    conn_id: ConnectionId,
    // Verified identity from the upgrade's JWT; the hub checks JoinChat
    // against it.
    user_id: Uuid,
    hub: Arc<ChatHub>,
    hb: Instant,
}

impl WsSession {
    fn new(conn_id: ConnectionId, user_id: Uuid, hub: Arc<ChatHub>) -> Self {
        Self {
            conn_id,
            user_id,
            hub,
            hb: Instant::now(),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::warn!("WebSocket heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            "WebSocket session started for user {} on connection {}",
            self.user_id,
            self.conn_id
        );

        self.hb(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            "WebSocket session stopped for user {} on connection {}",
            self.user_id,
            self.conn_id
        );

        // Cleanup: the hub removes the presence association and announces
        // the user offline if this connection had joined.
        let hub = self.hub.clone();
        let conn_id = self.conn_id;

        actix::spawn(async move {
            hub.handle_disconnect(conn_id).await;
        });
    }
}

// Forward hub-issued frames to the socket
impl Handler<OutboundFrame> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: OutboundFrame, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

// Handle WebSocket protocol messages
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<WsInboundEvent>(&text) {
                Ok(event) => {
                    let hub = self.hub.clone();
                    let conn_id = self.conn_id;
                    let user_id = self.user_id;

                    // ctx.wait keeps this connection's events strictly
                    // ordered: the mailbox is parked until the hub call
                    // completes, without blocking other connections.
                    ctx.wait(actix::fut::wrap_future(async move {
                        hub.handle_event(conn_id, user_id, event).await;
                    }));
                }
                Err(e) => {
                    tracing::warn!("Failed to parse WS message: {:?}", e);
                }
            },
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("Binary WebSocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!("WebSocket close message received: {:?}", reason);
                ctx.stop();
            }
            _ => {}
        }
    }
}

// Token validation: Authorization header or `token` query parameter,
// since browsers cannot set headers on a WebSocket upgrade.
fn authenticate(params: &WsParams, req: &HttpRequest) -> Result<Uuid, StatusCode> {
    let token = params.token.clone().or_else(|| {
        req.headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|s| s.to_string())
    });

    let Some(token) = token else {
        tracing::warn!("WebSocket connection rejected: no token provided");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let claims = actix_middleware::jwt::validate_token(&token)
        .map_err(|e| {
            tracing::warn!(error = %e, "WebSocket connection rejected: invalid token");
            StatusCode::UNAUTHORIZED
        })?
        .claims;

    Uuid::parse_str(&claims.sub).map_err(|_| {
        tracing::warn!("WebSocket connection rejected: malformed subject claim");
        StatusCode::UNAUTHORIZED
    })
}

// HTTP handler
#[get("/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let params = query.into_inner();

    // Authentication; identity binding happens later via JoinChat.
    let user_id = match authenticate(&params, &req) {
        Ok(user_id) => user_id,
        Err(status) => return Ok(HttpResponse::build(status).finish()),
    };

    let (conn_id, mut rx) = state.registry.register().await;
    let session = WsSession::new(conn_id, user_id, state.hub.clone());

    let (addr, resp) = ws::WsResponseBuilder::new(session, &req, stream).start_with_addr()?;

    // Bridge the registry's outbound channel into the actor mailbox. The
    // task ends once the registry drops the sender on disconnect.
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            addr.do_send(OutboundFrame(frame));
        }
    });

    Ok(resp)
}
