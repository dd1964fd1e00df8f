//! QuizWiz Host
//!
//! Serves a stored quiz over WebSocket and takes operator commands on stdin:
//! `start`, `reveal`, `next`, `status`, `quit`.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use quizwiz::config::HostConfig;
use quizwiz::network::{join_url, HostController, HostHandle, HostStatus, WsLink};
use quizwiz::quiz::{JsonFileStore, QuizStore};
use quizwiz::session::Advance;
use quizwiz::{SessionCode, VERSION};

#[derive(Parser, Debug)]
#[command(name = "quizwiz-host", version, about = "Host a live quiz session")]
struct Args {
    /// Address to listen on
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Quiz store file
    #[arg(long)]
    store: Option<PathBuf>,

    /// Id of the quiz to play; defaults to the first stored quiz
    #[arg(long)]
    quiz: Option<String>,

    /// Base URL advertised in the join link
    #[arg(long)]
    join_base_url: Option<String>,

    /// Session code to use instead of a random one
    #[arg(long)]
    code: Option<String>,

    /// List stored quizzes and exit
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = HostConfig::from_env();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(store) = args.store {
        config.store_path = store;
    }
    if let Some(base) = args.join_base_url {
        config.join_base_url = base;
    }

    info!("QuizWiz host v{}", VERSION);

    let store = JsonFileStore::open(&config.store_path)
        .with_context(|| format!("opening quiz store {}", config.store_path.display()))?;
    let quizzes = store.list()?;

    if args.list {
        for quiz in &quizzes {
            println!("{}  {} ({} questions)", quiz.id, quiz.title, quiz.len());
        }
        return Ok(());
    }

    let quiz = match &args.quiz {
        Some(id) => store
            .get(id)?
            .with_context(|| format!("no quiz with id {id}"))?,
        None => match quizzes.into_iter().next() {
            Some(quiz) => quiz,
            None => bail!("quiz store {} is empty", config.store_path.display()),
        },
    };

    let code = match &args.code {
        Some(raw) => SessionCode::parse(raw)?,
        None => SessionCode::generate(),
    };

    let link = WsLink::new(config.bind_addr, format!("ws://{}", config.bind_addr));
    let host = HostController::spawn(&link, code.clone(), quiz).await?;

    println!("Game code: {}", code);
    match join_url(&config.join_base_url, &code) {
        Ok(url) => println!("Join link: {}", url),
        Err(e) => warn!("Cannot build join link from {}: {}", config.join_base_url, e),
    }
    println!("Commands: start, reveal, next, status, quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !handle_command(&host, line.trim()).await {
                        break;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("Shutting down");
    host.shutdown().await;
    Ok(())
}

/// Run one operator command. Returns false to quit.
async fn handle_command(host: &HostHandle, command: &str) -> bool {
    let outcome = match command {
        "" => return true,
        "quit" | "exit" => return false,
        "start" => host.start_game().await.map(|_| ()),
        "reveal" => host.reveal_answer().await.map(|correct| println!("Correct answer: {}", correct)),
        "next" => host.next_question().await.map(|advance| match advance {
            Advance::Question(i) => println!("Question {}", i + 1),
            Advance::Finished => println!("Game over, back to the lobby"),
        }),
        "status" => Ok(()),
        other => {
            println!("Unknown command {other:?}");
            return true;
        }
    };

    if let Err(e) = outcome {
        println!("Cannot {}: {}", command, e);
    }
    match host.status().await {
        Ok(status) => print_status(&status),
        Err(e) => warn!("Status unavailable: {}", e),
    }
    true
}

fn print_status(status: &HostStatus) {
    println!(
        "[{}] {} | question {}/{} | {} players: {}",
        status.code,
        status.phase,
        status.question_index + 1,
        status.question_count,
        status.players.len(),
        status.players.join(", ")
    );

    let Some(view) = &status.view else {
        return;
    };
    println!("Q{}: {}", view.number, view.text);
    for option in &view.options {
        println!(
            "  {:<6} {:>3} votes {:>3}%  {}{}",
            option.color.to_string(),
            option.votes,
            option.share_percent,
            option.text,
            if option.correct { "  <- correct" } else { "" }
        );
    }
    println!("  {} of {} answered", view.total_votes, view.players);
}
