// Keyboard command console: W/S move, A/D turn, M mode, 1/2 switch, H home, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::Duration;
use tracing::{info, warn};

const CMD_PREFIX: &str = "ninja/cmd";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Controls: W/S=forward/back, A/D=turn, M=mode, 1=walk, 2=roll, H=home, Q=quit");
    info!("Note: motion commands block up to 3.5s while the robot moves");

    enable_raw_mode()?;
    let result = run_console(&session).await;
    disable_raw_mode()?;

    result
}

async fn run_console(
    session: &zenoh::Session,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        // Poll for key with 50ms timeout so ctrl-c stays responsive
        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }

        let command = match code {
            KeyCode::Char('w') => "move_forward",
            KeyCode::Char('s') => "move_backward",
            KeyCode::Char('a') => "turn_left",
            KeyCode::Char('d') => "turn_right",
            KeyCode::Char('m') => "get_mode",
            KeyCode::Char('1') => "set_walk_mode",
            KeyCode::Char('2') => "set_roll_mode",
            KeyCode::Char('h') => "go_home",
            KeyCode::Char('q') | KeyCode::Esc => break,
            _ => continue,
        };

        let selector = format!("{}/{}", CMD_PREFIX, command);
        info!("-> {}", selector);

        let replies = session.get(selector.as_str()).await?;
        while let Ok(reply) = replies.recv_async().await {
            match reply.result() {
                Ok(sample) => {
                    let text = String::from_utf8_lossy(&sample.payload().to_bytes()).to_string();
                    info!("<- {}", text);
                }
                Err(err) => {
                    let text = String::from_utf8_lossy(&err.payload().to_bytes()).to_string();
                    warn!("<- error: {}", text);
                }
            }
        }
    }

    Ok(())
}
