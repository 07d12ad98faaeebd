// Command endpoint + 50 Hz actuation loop
//
// Commands arrive as zenoh queries on ninja/cmd/<name>; the reply carries the
// narration string. Handlers hold shared state for up to 3.5 s, so queries
// are served strictly one at a time - a second command cannot race the
// in-flight one. The actuation task runs underneath, continuously reading
// the shared drive vector.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{info, warn};

use crate::body::Body;
use crate::config::{LOOP_HZ, TOPIC_CMD, TOPIC_RT_STATE};
use crate::messages::Command;
use crate::orchestrator::Orchestrator;
use crate::state::{Mode, StateHandle};

pub async fn run<B: Body + 'static>(
    state: StateHandle,
    body: Arc<B>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up command queryable...");
    let queryable = session.declare_queryable(TOPIC_CMD).await?;

    // Actuation task: drives the wheels from the shared state and publishes
    // telemetry, independently of the command loop
    {
        let session = session.clone();
        let state = state.clone();
        let body = body.clone();
        tokio::spawn(async move {
            if let Err(e) = actuation_loop(session, state, body).await {
                warn!("Actuation loop stopped: {}", e);
            }
        });
    }

    let orchestrator = Orchestrator::new(state, body);
    let cmd_prefix = TOPIC_CMD.trim_end_matches('*');

    info!("Runtime started: commands on {}, telemetry on {}", TOPIC_CMD, TOPIC_RT_STATE);

    // One command in flight at a time: each query is served to completion
    // before the next is taken
    while let Ok(query) = queryable.recv_async().await {
        let key = query.key_expr().as_str();
        let name = key.strip_prefix(cmd_prefix).unwrap_or(key);

        let cmd: Command = match name.parse() {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!("Rejecting query {}: {}", key, e);
                if let Err(e) = query.reply_err(format!("{}", e)).await {
                    warn!("Failed to send error reply: {}", e);
                }
                continue;
            }
        };

        match orchestrator.dispatch(cmd).await {
            Ok(narration) => {
                if let Err(e) = query.reply(query.key_expr().clone(), narration).await {
                    warn!("Failed to reply to {}: {}", key, e);
                }
            }
            Err(e) => {
                warn!("Command {} failed: {}", cmd, e);
                if let Err(e) = query.reply_err(format!("{}", e)).await {
                    warn!("Failed to send error reply: {}", e);
                }
            }
        }
    }

    Ok(())
}

/// 50 Hz loop: in ROLL mode with no manual override, apply the shared drive
/// vector to the wheels; publish a state snapshot every tick.
async fn actuation_loop<B: Body>(
    session: zenoh::Session,
    state: StateHandle,
    body: Arc<B>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let pub_state = session.declare_publisher(TOPIC_RT_STATE).await?;
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!("Actuation loop started: {}Hz", LOOP_HZ);

    loop {
        tick.tick().await;

        let snapshot = state.snapshot();

        if snapshot.mode == Mode::Roll && !snapshot.manual_override {
            if let Err(e) = body.drive_wheels(snapshot.drive) {
                warn!("Wheel drive write failed: {}", e);
            }
        }

        let snapshot_json = serde_json::to_string(&snapshot)?;
        pub_state.put(snapshot_json).await?;
    }
}
