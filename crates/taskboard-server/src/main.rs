use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use taskboard_server::{
  AppState,
  MemoryTaskTable,
  PgTaskTable,
  ServerConfig,
  TaskTable
};
use tracing::{
  error,
  info,
  warn
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{
  EnvFilter,
  fmt
};

fn init_tracing(
  log_dir: Option<&Path>
) -> Option<WorkerGuard> {
  let filter =
    EnvFilter::try_from_default_env()
      .or_else(|_| {
        EnvFilter::try_new(
          "info,taskboard_server=debug"
        )
      })
      .unwrap_or_else(|_| {
        EnvFilter::new("info")
      });

  let (file_layer, guard) = match log_dir
  {
    | Some(dir) => {
      let appender =
        tracing_appender::rolling::daily(
          dir,
          "taskboard-server.log"
        );
      let (writer, guard) =
        tracing_appender::non_blocking(
          appender
        );
      (
        Some(
          fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
        ),
        Some(guard)
      )
    }
    | None => (None, None)
  };

  let _ =
    tracing_subscriber::registry()
      .with(filter)
      .with(
        fmt::layer()
          .with_target(true)
          .with_line_number(true)
      )
      .with(file_layer)
      .try_init();

  guard
}

/// Builds and probes the table. Runs
/// before the async runtime exists: the
/// blocking postgres client refuses to
/// run inside one.
fn open_table(
  cfg: &ServerConfig
) -> anyhow::Result<Arc<dyn TaskTable>> {
  let table: Arc<dyn TaskTable> =
    match cfg.database_url.as_deref() {
      | Some(url) => {
        let table = PgTaskTable::connect(
          url,
          cfg.pool_size
        )?;
        table.ensure_schema().context(
          "failed to create tasks table"
        )?;
        Arc::new(table)
      }
      | None => {
        warn!(
          "DATABASE_URL not set; tasks \
           live in memory and vanish on \
           exit"
        );
        Arc::new(MemoryTaskTable::new())
      }
    };

  table
    .ping()
    .context("database connection failed")?;
  info!("database connected successfully");
  Ok(table)
}

fn main() {
  let cfg = match ServerConfig::from_env()
  {
    | Ok(cfg) => cfg,
    | Err(err) => {
      eprintln!(
        "error: invalid server \
         configuration: {err:#}"
      );
      std::process::exit(1);
    }
  };

  let _log_guard =
    init_tracing(cfg.log_dir.as_deref());

  info!(
    port = cfg.port,
    database = cfg.database_url.is_some(),
    client_url = ?cfg.client_url,
    "starting taskboard server"
  );

  if let Err(err) = run(&cfg) {
    error!(error = %format!("{err:#}"), "server failed");
    std::process::exit(1);
  }
}

fn run(
  cfg: &ServerConfig
) -> anyhow::Result<()> {
  let table = open_table(cfg)?;
  let cors = taskboard_server::cors_layer(
    cfg.client_url.as_deref()
  )?;
  let router = taskboard_server::app(
    AppState::new(table),
    cors
  );

  let runtime =
    tokio::runtime::Builder::new_multi_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  let addr = SocketAddr::from((
    [0, 0, 0, 0],
    cfg.port
  ));
  runtime.block_on(async move {
    let listener =
      tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| {
          format!(
            "failed to bind to {addr}"
          )
        })?;
    taskboard_server::serve(
      listener,
      router,
      taskboard_server::stop_signal()
    )
    .await
    .context("server error")
  })?;

  info!("taskboard server stopped");
  Ok(())
}
