//! QuizWiz Player
//!
//! Joins a hosted session from the terminal. Type `1`-`4` or a color name to
//! answer, `join CODE NAME` to (re)join, `leave`, or `quit`.

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use quizwiz::config::PlayerConfig;
use quizwiz::network::{ParticipantController, ParticipantHandle, ParticipantSnapshot, WsLink};
use quizwiz::session::{LinkStatus, ParticipantPhase};
use quizwiz::{OptionColor, VERSION};

#[derive(Parser, Debug)]
#[command(name = "quizwiz-player", version, about = "Join a live quiz session")]
struct Args {
    /// Game code shown by the host
    code: Option<String>,

    /// Display name (at most 12 characters)
    name: Option<String>,

    /// Host WebSocket URL, without the code
    #[arg(long)]
    host_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let mut config = PlayerConfig::from_env();
    if let Some(url) = args.host_url {
        config.host_url = url;
    }
    info!("QuizWiz player v{} -> {}", VERSION, config.host_url);

    // Participants never listen, so the bind address is unused.
    let link = WsLink::new(([0, 0, 0, 0], 0).into(), config.host_url);
    let player = ParticipantController::spawn(link);
    let mut updates = player.watch();

    if let (Some(code), Some(name)) = (&args.code, &args.name) {
        join(&player, code, name).await;
    } else {
        println!("Type: join CODE NAME");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !handle_input(&player, line.trim()).await {
                        break;
                    }
                }
                None => break,
            },
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                render(&snapshot);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    player.shutdown().await;
    Ok(())
}

async fn join(player: &ParticipantHandle, code: &str, name: &str) {
    if let Err(e) = player.join(code, name).await {
        println!("{}", e);
    }
}

/// Handle one line of input. Returns false to quit.
async fn handle_input(player: &ParticipantHandle, input: &str) -> bool {
    let mut words = input.split_whitespace();
    match words.next() {
        None => {}
        Some("quit") | Some("exit") => return false,
        Some("leave") => {
            let _ = player.leave().await;
        }
        Some("join") => match (words.next(), words.next()) {
            (Some(code), Some(name)) => join(player, code, name).await,
            _ => println!("Usage: join CODE NAME"),
        },
        Some(key) => match OptionColor::from_key(key) {
            Some(color) => {
                if let Err(e) = player.vote(color).await {
                    println!("{}", e);
                }
            }
            None => println!("Unknown input {key:?}"),
        },
    }
    true
}

fn render(snapshot: &ParticipantSnapshot) {
    match &snapshot.status {
        LinkStatus::Idle => return,
        LinkStatus::Connecting => {
            println!("Connecting...");
            return;
        }
        LinkStatus::Failed(reason) => {
            println!("Connection failed: {}", reason);
            return;
        }
        LinkStatus::Connected => {}
    }

    match snapshot.phase {
        ParticipantPhase::Lobby => match &snapshot.game_id {
            Some(code) => println!("In game {}. Waiting for the host...", code),
            None => println!("Joining..."),
        },
        ParticipantPhase::Answering => println!("Answer now: 1 red, 2 blue, 3 green, 4 yellow"),
        ParticipantPhase::Submitted => println!("Answer sent. Waiting for the reveal..."),
        ParticipantPhase::Result => match snapshot.is_correct {
            Some(true) => println!("Correct!"),
            _ => println!("Wrong."),
        },
    }
}
