use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use taskboard_shared::TaskPatch;
use tracing::{debug, info, instrument};

use crate::cli::{Command, position_to_index};
use crate::network::ProbeNetwork;
use crate::render::Renderer;
use crate::sync::{DragLocation, DragResult, SyncController};
use crate::task::NewTask;

/// Runs one command-line intent. Remote writes are awaited before returning
/// so the process does not exit with a request in flight.
#[instrument(skip(controller, renderer, command))]
pub async fn dispatch(
    controller: &SyncController,
    renderer: &Renderer,
    command: Command,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::Add { title, date, time } => {
            let data = NewTask {
                title: title.join(" "),
                date,
                time,
            };
            let (task, write) = controller.add_task(data)?;
            write.settle().await;
            println!("Added task {} ({} {}).", task.id, task.date, task.time);
            Ok(())
        }
        Command::List { view } => renderer.print_board(&controller.board(), view),
        Command::Edit {
            id,
            title,
            date,
            time,
        } => {
            let patch = TaskPatch {
                title,
                date,
                time,
                completed: None,
            };
            if patch.is_empty() {
                return Err(anyhow!("nothing to change; pass --title, --date or --time"));
            }
            ensure_known(controller, &id)?;
            controller.update_task(&id, patch)?.settle().await;
            println!("Updated task {id}.");
            Ok(())
        }
        Command::Toggle { id } => {
            ensure_known(controller, &id)?;
            controller.toggle_complete(&id)?.settle().await;
            let state = match controller.board().find(&id) {
                Some(task) if task.completed => "completed",
                _ => "active",
            };
            println!("Task {id} is now {state}.");
            Ok(())
        }
        Command::Delete { id } => {
            ensure_known(controller, &id)?;
            controller.delete_task(&id).settle().await;
            println!("Deleted task {id}.");
            Ok(())
        }
        Command::Move {
            source,
            source_position,
            destination,
            destination_position,
        } => {
            let source = DragLocation {
                view: source,
                index: position_to_index(source_position)?,
            };
            let destination = match destination {
                Some(view) => Some(DragLocation {
                    view,
                    index: position_to_index(destination_position.unwrap_or(1))?,
                }),
                None => None,
            };
            if controller.board().view(source.view).get(source.index).is_none() {
                return Err(anyhow!(
                    "{} has no task at position {source_position}",
                    source.view
                ));
            }

            controller
                .reorder_task(DragResult {
                    source,
                    destination,
                })
                .settle()
                .await;
            match destination {
                Some(_) => renderer.print_board(&controller.board(), None),
                None => {
                    println!("Drag cancelled.");
                    Ok(())
                }
            }
        }
        Command::Sync => {
            if !controller.is_online() {
                return Err(anyhow!("server unreachable; board left as is"));
            }
            controller.fetch_tasks().await;
            renderer.print_status(&controller.board(), controller.is_online())
        }
        Command::Status => renderer.print_status(&controller.board(), controller.is_online()),
        Command::Watch { .. } => Err(anyhow!("watch is not a one-shot command")),
    }
}

/// Follows the server until `stop` resolves: reachability is re-probed every
/// `every` and each reconnect reconciles the board.
#[instrument(skip(controller, probe, stop))]
pub async fn watch<S>(
    controller: Arc<SyncController>,
    probe: Option<Arc<ProbeNetwork>>,
    every: Duration,
    stop: S,
) -> anyhow::Result<()>
where
    S: Future<Output = ()>,
{
    let Some(probe) = probe else {
        return Err(anyhow!("watch needs the server; drop --offline"));
    };
    if every.is_zero() {
        return Err(anyhow!("--every must be at least 1 second"));
    }

    info!(online = controller.is_online(), "watching server");
    let following = tokio::spawn(Arc::clone(&controller).watch_network());
    let polling = probe.spawn_polling(every);

    stop.await;
    polling.abort();
    following.abort();
    info!("stopped watching");
    Ok(())
}

fn ensure_known(controller: &SyncController, id: &str) -> anyhow::Result<()> {
    if controller.board().find(id).is_none() {
        return Err(anyhow!("no task with id {id}"));
    }
    Ok(())
}
