//! Daemon API regression tests.
//!
//! Drives the assembled router the way dozed serves it: a mock cloud
//! provider, a recording SSH runner, and a real status listener stand in
//! for the outside world.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

use doze_api::build_router;
use doze_control::{CleanupCommands, ControlPlane, InstanceService, WatchDelays};
use doze_exec::{ExecFuture, RemoteExec};
use doze_ovh::{OvhClient, OvhCredentials};
use doze_ping::{ServerPinger, wire};

struct RecorderExec {
    log: Arc<Mutex<Vec<String>>>,
}

impl RemoteExec for RecorderExec {
    fn run(&self, command: &str) -> ExecFuture {
        self.log.lock().unwrap().push(command.to_string());
        Box::pin(async { Ok(()) })
    }
}

fn provider_router(status: Arc<Mutex<String>>, hits: Arc<Mutex<Vec<String>>>) -> Router {
    let unshelve_hits = hits.clone();
    let shelve_hits = hits;
    Router::new()
        .route(
            "/cloud/project/{service}/instance/{instance}",
            get(move || {
                let status = status.clone();
                async move { format!(r#"{{"id":"inst-1","status":"{}"}}"#, status.lock().unwrap()) }
            }),
        )
        .route(
            "/cloud/project/{service}/instance/{instance}/unshelve",
            post(move || {
                let hits = unshelve_hits.clone();
                async move {
                    hits.lock().unwrap().push("unshelve".to_string());
                    "null"
                }
            }),
        )
        .route(
            "/cloud/project/{service}/instance/{instance}/shelve",
            post(move || {
                let hits = shelve_hits.clone();
                async move {
                    hits.lock().unwrap().push("shelve".to_string());
                    "null"
                }
            }),
        )
}

async fn spawn_provider(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to random port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Minimal Minecraft status listener: consumes the handshake and the
/// status request, answers with the given player count.
async fn spawn_minecraft_server(players: u32) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to random port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = answer_status(&mut socket, players).await;
            });
        }
    });
    addr
}

async fn answer_status(
    socket: &mut tokio::net::TcpStream,
    players: u32,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Handshake frame, then the one-byte status request frame.
    for _ in 0..2 {
        let frame_len = wire::read_varint_from(socket).await?;
        let mut frame = vec![0u8; frame_len as usize];
        socket.read_exact(&mut frame).await?;
    }

    let json = format!(
        r#"{{"version":{{"name":"1.20.4","protocol":47}},"players":{{"max":20,"online":{players}}},"description":{{"text":"test"}}}}"#
    );
    let mut packet = Vec::new();
    wire::write_varint(&mut packet, i32::from(wire::PACKET_STATUS));
    wire::write_varint(&mut packet, json.len() as i32);
    packet.extend_from_slice(json.as_bytes());

    let mut frame = Vec::new();
    wire::write_varint(&mut frame, packet.len() as i32);
    frame.extend_from_slice(&packet);
    socket.write_all(&frame).await?;
    socket.flush().await?;
    Ok(())
}

fn control_plane(
    provider_addr: SocketAddr,
    minecraft: Option<SocketAddr>,
    exec_log: Arc<Mutex<Vec<String>>>,
) -> Arc<ControlPlane> {
    let client = OvhClient::new(OvhCredentials {
        endpoint: format!("http://{provider_addr}"),
        application_key: "app-key".to_string(),
        application_secret: "app-secret".to_string(),
        consumer_key: "consumer-key".to_string(),
    })
    .expect("client against mock provider");

    let instances = Arc::new(InstanceService::new(
        client,
        "svc-1",
        "inst-1",
        Arc::new(RecorderExec { log: exec_log }),
        CleanupCommands::default(),
    ));

    // Port 1 refuses connections, so the probe reports offline.
    let pinger = match minecraft {
        Some(addr) => ServerPinger::new(addr.ip().to_string(), addr.port(), Duration::from_secs(2)),
        None => ServerPinger::new("127.0.0.1", 1, Duration::from_millis(200)),
    };

    Arc::new(ControlPlane::new(instances, pinger, WatchDelays::default()))
}

struct MockWorld {
    app: Router,
    status: Arc<Mutex<String>>,
    provider_hits: Arc<Mutex<Vec<String>>>,
    exec_log: Arc<Mutex<Vec<String>>>,
}

async fn daemon_app(
    initial_status: &str,
    auth_token: Option<String>,
    minecraft: Option<SocketAddr>,
) -> MockWorld {
    let status = Arc::new(Mutex::new(initial_status.to_string()));
    let provider_hits = Arc::new(Mutex::new(Vec::new()));
    let exec_log = Arc::new(Mutex::new(Vec::new()));

    let addr = spawn_provider(provider_router(status.clone(), provider_hits.clone())).await;
    let plane = control_plane(addr, minecraft, exec_log.clone());

    MockWorld {
        app: build_router(plane, auth_token),
        status,
        provider_hits,
        exec_log,
    }
}

fn get_req(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

fn post_req(path: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn wake_then_shelve_over_http() {
    let world = daemon_app("SHELVED", None, None).await;

    let resp = world
        .app
        .clone()
        .oneshot(post_req("/instance/start"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["code"], "INSTANCE_STARTING");
    assert_eq!(*world.provider_hits.lock().unwrap(), vec!["unshelve"]);

    // The instance came up in the meantime.
    *world.status.lock().unwrap() = "ACTIVE".to_string();

    let resp = world
        .app
        .clone()
        .oneshot(post_req("/instance/stop"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["code"], "INSTANCE_STOPPING");

    // Cleanup ran in order, then the provider was asked to shelve.
    let commands = CleanupCommands::default();
    assert_eq!(
        *world.exec_log.lock().unwrap(),
        vec![commands.stop_proxy, commands.clear_build_data]
    );
    assert_eq!(*world.provider_hits.lock().unwrap(), vec!["unshelve", "shelve"]);
}

#[tokio::test]
async fn start_on_active_instance_conflicts() {
    let world = daemon_app("ACTIVE", None, None).await;

    let resp = world
        .app
        .oneshot(post_req("/instance/start"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body = json_body(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "INSTANCE_ALREADY_ACTIVE");
    assert!(world.provider_hits.lock().unwrap().is_empty());
}

#[tokio::test]
async fn instance_status_reports_raw_provider_state() {
    let world = daemon_app("SHELVED_OFFLOADED", None, None).await;

    let resp = world
        .app
        .oneshot(get_req("/instance/status"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["code"], "INSTANCE_STATUS");
    assert_eq!(body["message"], "SHELVED_OFFLOADED");
}

#[tokio::test]
async fn players_reported_from_live_server() {
    let minecraft = spawn_minecraft_server(7).await;
    let world = daemon_app("ACTIVE", None, Some(minecraft)).await;

    let resp = world
        .app
        .clone()
        .oneshot(get_req("/minecraft/players"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["code"], "ONLINE_PLAYERS");
    assert_eq!(body["message"], "7");

    let resp = world
        .app
        .oneshot(get_req("/minecraft/status"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["code"], "SERVER_ONLINE");
    assert_eq!(body["message"], "true");
}

#[tokio::test]
async fn offline_server_answers_but_players_are_unavailable() {
    let world = daemon_app("ACTIVE", None, None).await;

    let resp = world
        .app
        .clone()
        .oneshot(get_req("/minecraft/status"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["code"], "SERVER_ONLINE");
    assert_eq!(body["message"], "false");

    let resp = world
        .app
        .oneshot(get_req("/minecraft/players"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn bearer_token_guards_private_routes() {
    let world = daemon_app("ACTIVE", Some("sesame".to_string()), None).await;

    // No token.
    let resp = world
        .app
        .clone()
        .oneshot(get_req("/instance/status"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Wrong token.
    let req = Request::builder()
        .uri("/instance/status")
        .header("authorization", "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let resp = world.app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Right token.
    let req = Request::builder()
        .uri("/instance/status")
        .header("authorization", "Bearer sesame")
        .body(Body::empty())
        .unwrap();
    let resp = world.app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Liveness stays open.
    let resp = world.app.oneshot(get_req("/public/ping")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn provider_failure_is_bad_gateway() {
    let app = Router::new().route(
        "/cloud/project/{service}/instance/{instance}",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "backend down") }),
    );
    let addr = spawn_provider(app).await;
    let plane = control_plane(addr, None, Arc::new(Mutex::new(Vec::new())));
    let router = build_router(plane, None);

    let resp = router.oneshot(get_req("/instance/status")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "PROVIDER_ERROR");
}
