use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use proximity_client::connection;
use proximity_client::{
    ClientConfig, LocalEvent, MediaCall, MediaDialer, MediaError, MediaEvent, ProximityClient,
};
use proximity_common::id::{ClientId, PrefixedId};

/// Stands in for a real media transport: every dial is answered at once and
/// gain changes are only logged.
struct LoggingDialer {
    events: mpsc::Sender<MediaEvent>,
}

impl MediaDialer for LoggingDialer {
    fn dial(&mut self, peer_id: &str, call_id: &str) -> Result<Box<dyn MediaCall>, MediaError> {
        tracing::info!(peer_id = %peer_id, call_id = %call_id, "dial");
        self.events
            .try_send(MediaEvent::Established {
                peer_id: peer_id.to_string(),
                call_id: call_id.to_string(),
            })
            .map_err(|e| MediaError::Unavailable(e.to_string()))?;
        Ok(Box::new(LoggedCall {
            peer_id: peer_id.to_string(),
        }))
    }
}

struct LoggedCall {
    peer_id: String,
}

impl MediaCall for LoggedCall {
    fn set_gain(&mut self, gain: f64) {
        tracing::debug!(peer_id = %self.peer_id, gain, "gain");
    }

    fn close(&mut self) {
        tracing::info!(peer_id = %self.peer_id, "hang up");
    }
}

/// Walk the cursor around a circle and pulse the volume.
async fn wander(tx: mpsc::Sender<LocalEvent>, seed: f64) {
    let mut ticker = tokio::time::interval(Duration::from_millis(50));
    let mut t = seed;
    loop {
        ticker.tick().await;
        t += 0.02;
        let moved = LocalEvent::Moved {
            x: 400.0 + 350.0 * t.cos(),
            y: 300.0 + 250.0 * t.sin(),
        };
        let volume = LocalEvent::Volume((t * 3.0).sin().abs() * 0.05);
        if tx.send(moved).await.is_err() || tx.send(volume).await.is_err() {
            return;
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing; env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env();
    let id = ClientId::generate();
    let url = config.room_url();
    tracing::info!(peer_id = %id, url = %url, "starting proximity client");

    let (media_tx, media_rx) = mpsc::channel(64);
    let (local_tx, local_rx) = mpsc::channel(64);

    let seed = id.bytes().map(f64::from).sum::<f64>();
    let walker = tokio::spawn(wander(local_tx, seed));
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
        }
        // Dropping the input channel ends the session cleanly.
        walker.abort();
    });

    let mut client = ProximityClient::new(id, &config, LoggingDialer { events: media_tx });
    if let Err(e) = connection::run(
        &mut client,
        &url,
        local_rx,
        media_rx,
        config.flush_interval,
    )
    .await
    {
        tracing::error!(error = %e, "room connection ended");
        std::process::exit(1);
    }
}
