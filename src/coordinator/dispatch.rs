//! The coordinator loop
//!
//! One task owns all mutable state and serializes three inputs: commands
//! from handles, events from runners, and a periodic admission tick. The
//! tick is a safety net; every state change that can open capacity already
//! triggers admission directly.

use std::ops::ControlFlow;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::types::{Category, Event};

use super::runner::RunnerEvent;
use super::state::CoordinatorState;
use super::Command;

/// Runs until shutdown is requested or every handle is dropped
pub(crate) async fn run(
    mut state: CoordinatorState,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
    mut runner_rx: mpsc::UnboundedReceiver<RunnerEvent>,
) {
    let mut tick = tokio::time::interval(state.config.dispatch_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = command_rx.recv() => {
                match command {
                    Some(command) => {
                        if handle_command(&mut state, command).is_break() {
                            break;
                        }
                    }
                    // every handle dropped: same as an explicit shutdown
                    None => break,
                }
            }
            Some(event) = runner_rx.recv() => {
                state.handle_runner_event(event);
            }
            _ = tick.tick() => {
                state.admit(Category::Download);
                state.admit(Category::Conversion);
            }
        }
    }

    state.cancel_all_runners();
    state.emit(Event::Shutdown);
    info!("coordinator loop stopped");
}

fn handle_command(state: &mut CoordinatorState, command: Command) -> ControlFlow<()> {
    match command {
        Command::Submit(task) => {
            let category = task.kind.category();
            debug!(task_id = task.id.0, ?category, "task submitted");
            state.insert_task(*task);
            state.admit(category);
        }
        Command::Pause(id, reply) => {
            let _ = reply.send(state.pause_task(id));
        }
        Command::Resume(id, reply) => {
            let _ = reply.send(state.resume_task(id));
        }
        Command::Cancel(id, reply) => {
            let _ = reply.send(state.cancel_task(id));
        }
        Command::Clear(id, reply) => {
            let _ = reply.send(state.clear_task(id));
        }
        Command::AutoClear(id) => {
            state.auto_clear_task(id);
        }
        Command::ClearFinished(reply) => {
            let _ = reply.send(state.clear_finished());
        }
        Command::GetTask(id, reply) => {
            let _ = reply.send(state.task_info(id));
        }
        Command::ListTasks(reply) => {
            let _ = reply.send(state.list_tasks());
        }
        Command::Stats(reply) => {
            let _ = reply.send(state.stats());
        }
        Command::SetLimit(category, limit) => {
            state.set_limit(category, limit);
        }
        Command::Shutdown => {
            info!("shutdown requested");
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}
