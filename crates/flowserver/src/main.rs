mod config;

use actix_cors::Cors;
use actix_web::{get, put, web, App, HttpResponse, HttpServer, Responder, Result as ActixResult};
use actix_ws::Message;
use config::ServerConfig;
use flowcore::{DocumentFormat, FlowDocument};
use flowruntime::{ComponentRegistry, FlowRuntime, RuntimeConfig};
use flowsession::{
    ClientMessage, FileFlowStore, FlowStore, MemoryFlowStore, Peer, ServerMessage,
    SessionConfig, SessionRegistry, User,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
struct AppState {
    components: Arc<ComponentRegistry>,
    sessions: Arc<SessionRegistry>,
    format: DocumentFormat,
}

#[derive(Debug, Deserialize)]
struct FormatQuery {
    format: Option<String>,
}

impl FormatQuery {
    fn resolve(&self, fallback: DocumentFormat) -> Result<DocumentFormat, HttpResponse> {
        match &self.format {
            Some(format) => format.parse().map_err(|e: flowcore::FlowError| {
                HttpResponse::BadRequest().json(ErrorResponse {
                    error: e.to_string(),
                })
            }),
            None => Ok(fallback),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    user: Option<String>,
}

/// Error response
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn internal_error(e: impl std::fmt::Display) -> HttpResponse {
    HttpResponse::InternalServerError().json(ErrorResponse {
        error: e.to_string(),
    })
}

/// Health check endpoint
#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "flowserver"
    }))
}

/// List installed components
#[get("/api/components")]
async fn list_components(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    Ok(HttpResponse::Ok().json(data.components.descriptors()))
}

/// List stored flows
#[get("/api/flows")]
async fn list_flows(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    match data.sessions.store().list().await {
        Ok(ids) => Ok(HttpResponse::Ok().json(ids)),
        Err(e) => Ok(internal_error(e)),
    }
}

/// Export a flow; a live session wins over the stored copy
#[get("/api/flows/{id}")]
async fn get_flow(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<FormatQuery>,
) -> ActixResult<impl Responder> {
    let flow_id = path.into_inner();
    let format = match query.resolve(DocumentFormat::Json) {
        Ok(format) => format,
        Err(response) => return Ok(response),
    };

    let document = match data.sessions.get(&flow_id).await {
        Some(session) => session.document().await.map(Some).map_err(|e| e.to_string()),
        None => data
            .sessions
            .store()
            .load(&flow_id)
            .await
            .map_err(|e| e.to_string()),
    };

    match document {
        Ok(Some(document)) => match document.encode(format) {
            Ok(body) => Ok(HttpResponse::Ok()
                .content_type(content_type(format))
                .body(body)),
            Err(e) => Ok(internal_error(e)),
        },
        Ok(None) => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: format!("Flow {} not found", flow_id),
        })),
        Err(e) => Ok(internal_error(e)),
    }
}

/// Import a flow document, replacing any live session
#[put("/api/flows/{id}")]
async fn put_flow(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<FormatQuery>,
    body: String,
) -> ActixResult<impl Responder> {
    let flow_id = path.into_inner();
    let format = match query.resolve(data.format) {
        Ok(format) => format,
        Err(response) => return Ok(response),
    };

    let document = match FlowDocument::decode(&body, format) {
        Ok(document) => document,
        Err(e) => {
            return Ok(HttpResponse::BadRequest().json(ErrorResponse {
                error: e.to_string(),
            }))
        }
    };

    match data.sessions.import(&flow_id, document).await {
        Ok(()) => {
            info!("Imported flow {}", flow_id);
            Ok(HttpResponse::Ok().json(serde_json::json!({ "id": flow_id })))
        }
        Err(e) => {
            error!("Import of flow {} failed: {}", flow_id, e);
            Ok(HttpResponse::BadRequest().json(ErrorResponse {
                error: e.to_string(),
            }))
        }
    }
}

/// Delete a flow and close its session
#[actix_web::delete("/api/flows/{id}")]
async fn delete_flow(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let flow_id = path.into_inner();

    match data.sessions.delete(&flow_id).await {
        Ok(true) => {
            info!("Deleted flow: {}", flow_id);
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "message": "Flow deleted successfully"
            })))
        }
        Ok(false) => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: format!("Flow {} not found", flow_id),
        })),
        Err(e) => Ok(internal_error(e)),
    }
}

/// WebSocket endpoint joining the caller to a flow's session
#[get("/api/flows/{id}/session")]
async fn flow_session(
    req: actix_web::HttpRequest,
    stream: web::Payload,
    path: web::Path<String>,
    query: web::Query<SessionQuery>,
    data: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let flow_id = path.into_inner();
    let name = query
        .into_inner()
        .user
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "anonymous".to_string());
    let (res, mut ws, mut msg_stream) = actix_ws::handle(&req, stream)?;

    let (peer, mut outbound) = Peer::channel();
    let peer_id = peer.id;
    let sessions = data.sessions.clone();
    let session = match sessions
        .subscribe(&flow_id, peer, User::new(name.clone(), name.clone()))
        .await
    {
        Ok(session) => session,
        Err(e) => {
            error!("Could not join {} to flow {}: {}", name, flow_id, e);
            actix_web::rt::spawn(async move {
                if let Ok(json) = serde_json::to_string(&ServerMessage::error(e.to_string())) {
                    let _ = ws.text(json).await;
                }
                let _ = ws.close(None).await;
            });
            return Ok(res);
        }
    };

    info!("{} connected to flow {} as peer {}", name, flow_id, peer_id);

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                // Messages from the session
                message = outbound.recv() => {
                    let Some(message) = message else { break };
                    match serde_json::to_string(&message) {
                        Ok(json) => {
                            if ws.text(json).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping unserializable message: {}", e),
                    }
                }

                // Commands from the peer
                Some(Ok(msg)) = msg_stream.recv() => {
                    match msg {
                        Message::Text(text) => {
                            match serde_json::from_str::<ClientMessage>(&text) {
                                Ok(command) => {
                                    let leaving = matches!(command, ClientMessage::UserLeave);
                                    if session.on_message(peer_id, command).await.is_err() || leaving {
                                        break;
                                    }
                                }
                                Err(e) => {
                                    warn!("Peer {} sent an invalid command: {}", peer_id, e);
                                    let reply = ServerMessage::error(format!("Invalid command: {}", e));
                                    if let Ok(json) = serde_json::to_string(&reply) {
                                        if ws.text(json).await.is_err() {
                                            break;
                                        }
                                    }
                                }
                            }
                        }
                        Message::Ping(bytes) => {
                            if ws.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }

                else => break,
            }
        }

        if let Err(e) = sessions.unsubscribe(peer_id).await {
            warn!("Unsubscribing peer {} failed: {}", peer_id, e);
        }
        info!("Peer {} disconnected from flow {}", peer_id, flow_id);
        let _ = ws.close(None).await;
    });

    Ok(res)
}

fn content_type(format: DocumentFormat) -> &'static str {
    match format {
        DocumentFormat::Json => "application/json",
        DocumentFormat::Yaml => "application/yaml",
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    info!("Starting flow server");

    let mut registry = ComponentRegistry::new();
    flownodes::register_all(&mut registry);
    let components = Arc::new(registry);
    // Peers feed unfed inputs over the session socket.
    let runtime = FlowRuntime::with_config(RuntimeConfig {
        await_inputs: true,
        ..RuntimeConfig::default()
    })
    .with_components(components.clone());

    info!("Runtime initialized with {} components", components.len());

    let store: Arc<dyn FlowStore> = match &config.flow_dir {
        Some(dir) => {
            info!("Storing flows in {} as {}", dir.display(), config.format.extension());
            Arc::new(FileFlowStore::new(dir.clone(), config.format))
        }
        None => {
            warn!("FLOW_DIR is not set; flows are kept in memory only");
            Arc::new(MemoryFlowStore::new())
        }
    };

    let app_state = web::Data::new(AppState {
        components,
        sessions: Arc::new(SessionRegistry::new(
            runtime,
            store,
            SessionConfig::default(),
        )),
        format: config.format,
    });

    info!("Server starting on http://{}", config.bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .service(health_check)
            .service(list_components)
            .service(list_flows)
            .service(flow_session)
            .service(get_flow)
            .service(put_flow)
            .service(delete_flow)
    })
    .bind(&config.bind_address)?
    .run()
    .await?;

    Ok(())
}
