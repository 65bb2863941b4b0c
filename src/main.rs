//! pastewire CLI: host or join a peer-to-peer chat with copy/paste signaling.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pastewire::{ChatMessage, ChatSession, ConnectionState, OutgoingFile, Sender};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

/// Pastewire - serverless P2P chat and file drop.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Verbosity level (-v, -vv, -vvv).
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a session and print the offer payload to share with a peer.
    Host,
    /// Join a session from a host's offer payload (reads stdin when omitted).
    Join {
        /// The offer payload produced by the host.
        offer: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Note: webrtc_ice logs "unknown TransactionID" warnings for
    // late-arriving STUN responses, which are normal. Filter them out.
    let filter = match args.verbose {
        0 => "warn,pastewire=info,webrtc_ice::agent=error",
        1 => "info,webrtc_ice::agent=error",
        2 => "debug,webrtc_ice::agent=error",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let session = Arc::new(ChatSession::with_webrtc());
    print_session_updates(&session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    match args.command {
        Command::Host => host(&session, &mut lines).await?,
        Command::Join { offer } => join(&session, offer, &mut lines).await?,
    }

    chat_loop(&session, &mut lines).await;
    session.cleanup().await;
    Ok(())
}

async fn host(session: &Arc<ChatSession>, lines: &mut Lines<BufReader<Stdin>>) -> Result<()> {
    let offer = session.host_chat().await.context("failed to create offer")?;
    println!("Share this offer with your peer:\n\n{offer}\n");

    println!("Paste their answer payload:");
    let answer = read_payload(lines).await?;
    session
        .accept_answer(&answer)
        .await
        .context("failed to accept answer")?;
    println!("Answer accepted, connecting...");
    Ok(())
}

async fn join(
    session: &Arc<ChatSession>,
    offer: Option<String>,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<()> {
    let offer = match offer {
        Some(offer) => offer,
        None => {
            println!("Paste the host's offer payload:");
            read_payload(lines).await?
        }
    };

    let answer = session
        .join_chat(&offer)
        .await
        .context("failed to join session")?;
    println!("Send this answer back to the host:\n\n{answer}\n");
    println!("Connecting...");
    Ok(())
}

/// Read one non-empty line (pasted payloads arrive as a single line).
async fn read_payload(lines: &mut Lines<BufReader<Stdin>>) -> Result<String> {
    loop {
        let line = lines
            .next_line()
            .await?
            .context("stdin closed before a payload was provided")?;
        if !line.trim().is_empty() {
            return Ok(line);
        }
    }
}

/// Line-oriented chat: plain lines are messages, `/send <path>` transmits
/// a file, `/quit` leaves.
async fn chat_loop(session: &Arc<ChatSession>, lines: &mut Lines<BufReader<Stdin>>) {
    println!("Type to chat. Commands: /send <path>, /quit");
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        if let Some(path) = line.strip_prefix("/send ") {
            match OutgoingFile::from_path(path.trim()).await {
                Ok(file) => session.send_file(file).await,
                Err(err) => eprintln!("could not read {path}: {err}"),
            }
            continue;
        }
        session.send_text(line).await;
    }
}

/// Mirror session changes onto the terminal.
fn print_session_updates(session: &Arc<ChatSession>) {
    session.state().connection_state().subscribe(|state| {
        if *state == ConnectionState::Connected {
            println!("· connected");
        } else {
            println!("· {state}");
        }
    });

    // The log is append-only; remember how much has been printed.
    let printed = Mutex::new(0usize);
    session.state().messages().subscribe(move |log| {
        let mut printed = match printed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for message in log.iter().skip(*printed) {
            print_message(message);
        }
        *printed = log.len();
    });
}

fn print_message(message: &ChatMessage) {
    let who = match message.sender {
        Sender::Me => "me",
        Sender::Them => "them",
    };
    if let Some(text) = &message.text {
        println!("{who}> {text}");
    } else if let Some(file) = &message.file {
        println!(
            "{who}> [file] {} ({}, {} bytes)",
            file.name,
            file.mime_type,
            file.data.len()
        );
    }
}
