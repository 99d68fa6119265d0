//! The HTTP client against a live server backed by the in-memory table.

use std::sync::Arc;
use std::time::Duration;

use taskboard_core::datastore::MemoryStore;
use taskboard_core::local::LocalStore;
use taskboard_core::network::{NetworkStatus, ProbeNetwork};
use taskboard_core::remote::{HttpRemote, RemoteApi, RemoteError};
use taskboard_core::sync::SyncController;
use taskboard_core::task::{NewTask, View};
use taskboard_server::{AppState, MemoryTaskTable, StopReason, app, cors_layer, serve};
use taskboard_shared::{TaskDto, TaskPatch};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct Server {
    base_url: String,
    stop: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl Server {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let router = app(
            AppState::new(Arc::new(MemoryTaskTable::new())),
            cors_layer(None).expect("cors"),
        );
        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve(listener, router, async move {
            let _ = stopped.await;
            StopReason::Interrupt
        }));
        Self {
            base_url: format!("http://{addr}"),
            stop: Some(stop),
            handle,
        }
    }

    async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let served = self.handle.await.expect("server task");
        assert!(served.is_ok());
    }
}

fn client(base_url: &str) -> HttpRemote {
    HttpRemote::new(base_url, Duration::from_secs(5)).expect("client")
}

#[tokio::test]
async fn http_remote_speaks_the_task_api() {
    let server = Server::start().await;
    let remote = client(&server.base_url);

    remote.health().await.expect("health");

    let created = remote
        .create(&TaskDto {
            id: "42".to_string(),
            title: "water plants".to_string(),
            date: "2026-03-01".to_string(),
            time: String::new(),
            completed: false,
        })
        .await
        .expect("create");
    assert_eq!(created.id, "42");

    let updated = remote
        .update("42", &TaskPatch::completed_only(true))
        .await
        .expect("update");
    assert!(updated.completed);
    assert_eq!(updated.title, "water plants");

    let listed = remote.list().await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].time, "");

    match remote.update("nope", &TaskPatch::completed_only(true)).await {
        Err(RemoteError::Status { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected 404, got {other:?}"),
    }

    remote.delete("42").await.expect("delete");
    remote.delete("42").await.expect("delete twice");
    assert!(remote.list().await.expect("list").is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn blank_title_comes_back_as_status_error() {
    let server = Server::start().await;
    let remote = client(&server.base_url);

    let err = remote
        .create(&TaskDto {
            id: "1".to_string(),
            title: " ".to_string(),
            date: String::new(),
            time: String::new(),
            completed: false,
        })
        .await
        .expect_err("blank title");
    match err {
        RemoteError::Status {
            status, message, ..
        } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Task title is required");
        }
        other => panic!("unexpected error: {other}"),
    }

    server.shutdown().await;
}

#[tokio::test]
async fn controller_round_trips_through_server() {
    let server = Server::start().await;
    let remote: Arc<dyn RemoteApi> = Arc::new(client(&server.base_url));
    let network = Arc::new(ProbeNetwork::connect(Arc::clone(&remote)).await);
    assert!(network.is_online());

    let local = LocalStore::open(Arc::new(MemoryStore::new()), network.is_online());
    let controller = SyncController::new(local, Arc::clone(&remote), network);
    controller.initialize_app().await;
    assert!(controller.board().is_initialized());

    let (first, write) = controller.add_task(NewTask::titled("first")).expect("add");
    write.settle().await;
    let (second, write) = controller.add_task(NewTask::titled("second")).expect("add");
    write.settle().await;
    controller
        .toggle_complete(&first.id)
        .expect("toggle")
        .settle()
        .await;

    controller.fetch_tasks().await;
    let board = controller.board();
    let all: Vec<&str> = board.view(View::All).iter().map(|t| t.id.as_str()).collect();
    assert_eq!(all, vec![second.id.as_str(), first.id.as_str()]);
    assert_eq!(board.completed().len(), 1);
    assert_eq!(board.completed()[0].id, first.id);
    assert_eq!(board.completed()[0].date, first.date);

    server.shutdown().await;
}

#[tokio::test]
async fn probe_reports_offline_when_nothing_listens() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let remote: Arc<dyn RemoteApi> = Arc::new(client(&format!("http://{addr}")));
    let network = Arc::new(ProbeNetwork::connect(remote).await);
    assert!(!network.is_online());

    let polling = Arc::clone(&network).spawn_polling(Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(50)).await;
    polling.abort();
    assert!(!network.is_online());
}
