//! Controller connection supervision and the bytes → packets → kicks pipeline.

use std::time::Duration;

use rand::Rng;
use tokio::{
    sync::{mpsc, watch},
    time::{Instant, sleep},
};
use tracing::{debug, info, warn};

use crate::{
    device::{
        DeviceStatus,
        detector::KickEvent,
        framer::PacketFramer,
        packet::{ControlPacket, Packet},
        serial::{DeviceChunk, DeviceError, SerialLink, SerialSettings},
    },
    error::ServiceError,
    services::match_service,
    state::{
        SharedState, StationEvent,
        roster::{CHANNEL_COUNT, Channel},
    },
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);

/// Keep the controller connected, reconnecting with exponential backoff.
///
/// An operator [`disconnect`] closes the link and parks the loop until [`reconnect`].
pub async fn run(state: SharedState, settings: SerialSettings) {
    let mut delay = INITIAL_DELAY;

    loop {
        let mut enabled = state.device_enabled_watcher();
        if !*enabled.borrow_and_update() {
            state.set_device_status(DeviceStatus::Disconnected);
            info!(path = %settings.path, "controller released by operator");
            if enabled.wait_for(|on| *on).await.is_err() {
                return;
            }
            delay = INITIAL_DELAY;
            continue;
        }

        state.set_device_status(DeviceStatus::Connecting);
        let open_settings = settings.clone();
        let opened = tokio::task::spawn_blocking(move || SerialLink::open(&open_settings))
            .await
            .map_err(|err| DeviceError::Read {
                source: std::io::Error::other(err),
            })
            .and_then(|result| result);

        match opened {
            Ok(link) => {
                delay = INITIAL_DELAY;
                let (chunks, writer, reader_guard) = link.into_parts();
                state.set_device_writer(Some(writer)).await;
                state.set_device_status(DeviceStatus::Connected);
                info!(path = %settings.path, "controller connected");

                let threshold = state.snapshot().await.force_threshold;
                if let Err(err) = push_threshold(&state, threshold).await {
                    warn!(error = %err, "failed to push force threshold on connect");
                }

                let failure = pump(&state, chunks).await;
                drop(reader_guard);
                state.set_device_writer(None).await;

                match failure {
                    Some(err) => {
                        warn!(error = %err, "controller connection lost");
                        state.set_device_status(DeviceStatus::Failed(err.to_string()));
                    }
                    None => state.set_device_status(DeviceStatus::Disconnected),
                }
            }
            Err(err) => {
                warn!(error = %err, path = %settings.path, "controller connection attempt failed");
                state.set_device_status(DeviceStatus::Failed(err.to_string()));
            }
        }

        tokio::select! {
            _ = sleep(delay) => delay = (delay * 2).min(MAX_DELAY),
            _ = enabled.changed() => delay = INITIAL_DELAY,
        }
    }
}

/// Read chunks until the link fails, closes or the operator releases it. A fresh framer per
/// connection drops any partial packet left over from the previous link.
async fn pump(state: &SharedState, mut chunks: mpsc::Receiver<DeviceChunk>) -> Option<DeviceError> {
    let mut framer = PacketFramer::new();
    let mut enabled = state.device_enabled_watcher();

    loop {
        tokio::select! {
            chunk = chunks.recv() => match chunk {
                Some(Ok(bytes)) => {
                    process_bytes(state, &mut framer, &bytes).await;
                }
                Some(Err(err)) => return Some(err),
                None => break,
            },
            _ = released(&mut enabled) => {
                info!("controller disconnect requested");
                break;
            }
        }
    }

    let stats = framer.stats();
    debug!(
        accepted = stats.accepted,
        rejected = stats.rejected,
        discarded = stats.discarded_bytes,
        "controller stream closed"
    );
    None
}

async fn released(enabled: &mut watch::Receiver<bool>) {
    if enabled.wait_for(|on| !*on).await.is_err() {
        // state dropped; only the chunk stream can end the pump now
        std::future::pending::<()>().await;
    }
}

/// Release the controller; the device task stays idle until [`reconnect`].
pub fn disconnect(state: &SharedState) {
    state.set_device_enabled(false);
}

/// Reconnect the controller now, skipping any pending backoff.
pub fn reconnect(state: &SharedState) {
    state.set_device_enabled(true);
}

/// Inject a simulated strike as if the controller had sent it.
///
/// The packet goes through the framer and detector like real input, so debounce and the
/// difficulty threshold still apply. `channel` defaults to a random one and `force` to the
/// smallest value that clears the current threshold.
pub async fn test_hit(
    state: &SharedState,
    channel: Option<Channel>,
    force: Option<u16>,
) -> (Channel, u16, Vec<KickEvent>) {
    let channel =
        channel.unwrap_or_else(|| Channel::ALL[rand::rng().random_range(0..Channel::ALL.len())]);
    let force = match force {
        Some(force) => force,
        None => {
            let threshold = state.detector().lock().await.settings().threshold();
            u16::try_from(threshold + 1).unwrap_or(u16::MAX)
        }
    };

    let mut forces = [0u16; CHANNEL_COUNT];
    forces[channel.index()] = force;
    let packet = Packet::encode(forces, channel.mask());

    let mut framer = PacketFramer::new();
    let kicks = process_bytes(state, &mut framer, packet.as_bytes()).await;
    debug!(%channel, force, accepted = kicks.len(), "simulated strike injected");
    (channel, force, kicks)
}

/// Feed raw bytes through the framer and detector and score every resulting kick, in order.
pub async fn process_bytes(
    state: &SharedState,
    framer: &mut PacketFramer,
    bytes: &[u8],
) -> Vec<KickEvent> {
    let packets: Vec<_> = framer.push(bytes).collect();
    let mut accepted = Vec::new();

    for packet in packets {
        let kicks = {
            let mut detector = state.detector().lock().await;
            detector.process(&packet, Instant::now())
        };

        for kick in kicks {
            accepted.push(kick);
            if let Err(err) = match_service::handle_kick(state, kick).await {
                warn!(error = %err, channel = %kick.channel, "kick could not be scored");
            }
        }
    }

    accepted
}

/// Record the hardware sensitivity and send it to the controller when connected.
///
/// Returns whether the control packet was written.
pub async fn set_force_threshold(state: &SharedState, threshold: u8) -> Result<bool, ServiceError> {
    let snapshot = {
        let mut machine = state.machine().write().await;
        machine.set_force_threshold(threshold);
        machine.snapshot()
    };
    state.events().publish(StationEvent::Match(snapshot));

    match push_threshold(state, threshold).await {
        Ok(()) => Ok(true),
        Err(DeviceError::NotConnected) => {
            debug!(threshold, "no controller connected; threshold stored only");
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

async fn push_threshold(state: &SharedState, threshold: u8) -> Result<(), DeviceError> {
    let writer = state.device_writer().await.ok_or(DeviceError::NotConnected)?;
    writer.send(ControlPacket::force_threshold(threshold)).await?;
    info!(threshold, "force threshold sent to controller");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::time::timeout;

    use super::*;
    use crate::{
        config::StationConfig,
        state::AppState,
        sync::{local_store::MemoryDeltaLog, queue::OfflineQueue},
    };

    fn station() -> SharedState {
        AppState::new(
            StationConfig::default(),
            OfflineQueue::new(Arc::new(MemoryDeltaLog::new())),
        )
    }

    async fn wait_for_status<F>(state: &SharedState, mut accept: F) -> DeviceStatus
    where
        F: FnMut(&DeviceStatus) -> bool,
    {
        timeout(Duration::from_secs(3), async {
            loop {
                let status = state.device_status();
                if accept(&status) {
                    return status;
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("device status reached")
    }

    #[tokio::test]
    async fn simulated_strike_scores_like_real_input() {
        let state = station();
        match_service::prepare(&state).await;
        match_service::request_start(&state).await;
        match_service::countdown_finished(&state).await;

        let (channel, force, kicks) = test_hit(&state, Channel::new(2), None).await;
        assert_eq!(channel.number(), 2);
        assert_eq!(force, 201);
        assert_eq!(kicks.len(), 1);

        let (_, _, soft) = test_hit(&state, Channel::new(3), Some(150)).await;
        assert!(soft.is_empty());

        let scores: Vec<u32> = state
            .snapshot()
            .await
            .players
            .iter()
            .map(|player| player.score)
            .collect();
        assert_eq!(scores, vec![0, 1, 0, 0]);
        match_service::stop(&state).await;
    }

    #[tokio::test]
    async fn random_strike_lands_on_some_channel() {
        let state = station();
        let (channel, _, kicks) = test_hit(&state, None, Some(900)).await;

        assert!(Channel::ALL.contains(&channel));
        assert_eq!(kicks.len(), 1);
        assert_eq!(kicks[0].channel, channel);
    }

    #[tokio::test]
    async fn operator_disconnect_parks_the_link_until_reconnect() {
        let state = station();
        let task = tokio::spawn(run(
            state.clone(),
            SerialSettings {
                path: "/dev/kicklab-missing-port".into(),
                baud_rate: 115_200,
            },
        ));

        wait_for_status(&state, |status| matches!(status, DeviceStatus::Failed(_))).await;

        disconnect(&state);
        wait_for_status(&state, |status| *status == DeviceStatus::Disconnected).await;
        assert!(!state.device_enabled());

        reconnect(&state);
        wait_for_status(&state, |status| *status != DeviceStatus::Disconnected).await;
        assert!(state.device_enabled());

        task.abort();
    }
}
