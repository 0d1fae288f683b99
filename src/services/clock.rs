//! Fixed-step task driving the match clock while a round is playing.

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;

use crate::{
    services::match_service,
    state::{
        SharedState,
        match_machine::{MatchStatus, TICK_INTERVAL},
    },
};

/// Start the clock task when the match plays and cancel it otherwise.
///
/// The status is read while the task slot is held, so racing callers settle on the latest
/// state. A tick already holding the match lock completes before the cancellation takes effect.
pub async fn sync(state: &SharedState) {
    let mut slot = state.clock_task().lock().await;
    let status = state.machine().read().await.status();
    let running = slot.as_ref().is_some_and(|task| !task.is_finished());

    match (status == MatchStatus::Playing, running) {
        (true, false) => {
            debug!("starting match clock");
            *slot = Some(tokio::spawn(run(state.clone())));
        }
        (false, true) => {
            if let Some(task) = slot.take() {
                debug!("cancelling match clock");
                task.abort();
            }
        }
        _ => {}
    }
}

async fn run(state: SharedState) {
    let mut ticker = interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    loop {
        ticker.tick().await;
        if !match_service::tick(&state).await {
            break;
        }
    }
    debug!("match clock stopped");
}
