pub mod board;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod local;
pub mod network;
pub mod remote;
pub mod render;
pub mod sync;
pub mod task;

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info,
  warn
};

use crate::network::NetworkStatus;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    offline = cli.offline,
    "starting taskboard CLI"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );
  if let Some(api) = cli.api {
    cfg.apply_overrides([(
      "api.url".to_string(),
      api
    )]);
  }

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    datastore::JsonFileStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;

  let remote = remote::HttpRemote::new(
    &cfg.api_url(),
    cfg.api_timeout()?
  )?;
  let renderer =
    render::Renderer::new(&cfg)?;
  let offline = cli.offline;
  let command = cli
    .command
    .unwrap_or(cli::Command::List {
      view: None
    });

  let runtime =
    tokio::runtime::Builder::new_multi_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  runtime.block_on(async move {
    let remote: Arc<dyn remote::RemoteApi> =
      Arc::new(remote);
    let probe = if offline {
      None
    } else {
      Some(Arc::new(
        network::ProbeNetwork::connect(
          Arc::clone(&remote)
        )
        .await
      ))
    };
    let network: Arc<dyn NetworkStatus> =
      match &probe {
        | Some(probe) => probe.clone(),
        | None => Arc::new(
          network::ManualNetwork::new(
            false
          )
        )
      };
    debug!(
      online = network.is_online(),
      api = %cfg.api_url(),
      api_source = ?cfg.origin("api.url"),
      "resolved network status"
    );

    let local = local::LocalStore::open(
      Arc::new(store),
      network.is_online()
    );
    let controller = Arc::new(
      sync::SyncController::new(
        local, remote, network
      )
    );
    controller.initialize_app().await;

    match command {
      | cli::Command::Watch { every } => {
        commands::watch(
          Arc::clone(&controller),
          probe,
          Duration::from_secs(every),
          interrupted()
        )
        .await?;
        renderer.print_status(
          &controller.board(),
          controller.is_online()
        )
      }
      | command => {
        commands::dispatch(
          &controller,
          &renderer,
          command
        )
        .await
      }
    }
  })?;

  info!("done");
  Ok(())
}

async fn interrupted() {
  if let Err(err) =
    tokio::signal::ctrl_c().await
  {
    warn!(
      error = %err,
      "cannot listen for ctrl-c; \
       watching until killed"
    );
    std::future::pending::<()>().await;
  }
}
