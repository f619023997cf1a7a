//! The energy ticker: a single-writer loop advancing storage levels on a
//! wall-clock cadence and streaming the resulting scene to subscribers.
//!
//! A failed tick is logged and dropped; the loop itself only exits on the
//! shutdown signal.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{Duration, MissedTickBehavior};

use crate::state::GameApi;
use crate::stream::SceneBroadcaster;

pub async fn run_energy_ticker(
    game: Arc<dyn GameApi>,
    broadcaster: Arc<SceneBroadcaster>,
    interval: Duration,
    seconds: f64,
    drain_factor: f64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // discard the immediate first tick

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match game.advance_energy_state(seconds, drain_factor).await {
                    Ok(scene) => broadcaster.publish_scene(&scene),
                    Err(err) => tracing::warn!("energy tick failed: {err}"),
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockGame;
    use outpost_game::GameError;

    fn spawn_ticker(
        game: Arc<MockGame>,
        broadcaster: Arc<SceneBroadcaster>,
        seconds: f64,
        drain_factor: f64,
    ) -> (tokio::task::JoinHandle<()>, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_energy_ticker(
            game,
            broadcaster,
            Duration::from_millis(10),
            seconds,
            drain_factor,
            shutdown_rx,
        ));
        (handle, shutdown_tx)
    }

    #[tokio::test]
    async fn ticker_advances_and_publishes() {
        let game = Arc::new(MockGame::new());
        let broadcaster = Arc::new(SceneBroadcaster::new());
        let mut subscription = broadcaster.subscribe(None);

        let (handle, shutdown_tx) = spawn_ticker(game.clone(), broadcaster.clone(), 2.0, 0.5);

        let frame = tokio::time::timeout(Duration::from_secs(1), subscription.rx.recv())
            .await
            .expect("expected a scene frame within a second")
            .expect("channel should stay open");
        let scene: outpost_core::Scene = serde_json::from_str(&frame).unwrap();
        assert_eq!(scene.id, game.scene.id);

        assert!(game.advance_calls() >= 1);
        assert_eq!(game.last_advance_input(), Some((2.0, 0.5)));

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("ticker should stop on shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn failed_tick_does_not_kill_the_loop() {
        let game = Arc::new(MockGame::new());
        game.fail_advances(2, || GameError::LoadTimeout);
        let broadcaster = Arc::new(SceneBroadcaster::new());
        let mut subscription = broadcaster.subscribe(None);

        let (handle, shutdown_tx) = spawn_ticker(game.clone(), broadcaster.clone(), 1.0, 1.0);

        // The first two ticks fail; a frame still arrives from a later one.
        let frame = tokio::time::timeout(Duration::from_secs(1), subscription.rx.recv())
            .await
            .expect("loop must survive failed ticks")
            .expect("channel should stay open");
        assert!(!frame.is_empty());
        assert!(game.advance_calls() >= 3);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_stops_an_idle_ticker() {
        let game = Arc::new(MockGame::new());
        let broadcaster = Arc::new(SceneBroadcaster::new());
        let (handle, shutdown_tx) = spawn_ticker(game, broadcaster, 1.0, 1.0);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("ticker should observe shutdown promptly")
            .unwrap();
    }
}
