//! Herald - A terminal client for the messaging relay
//!
//! This is the main entry point for the Herald chat application.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, error, info};
use std::io::{BufRead, Write};
use std::time::Instant;
use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;

mod app;
mod views;

use app::HeraldApp;
use chat::sync::driver;
use chat::{Backend, Command, ContactId, MessageId};
use views::{ThreadPrinter, format_timestamp, render_conversation_list};

#[derive(Parser)]
#[command(name = "herald", version, about = "Read and send messages through the relay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store an access token
    Login {
        /// Relay username; prompted for when omitted
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Forget the stored access token
    Logout,
    /// List conversations with unread counts
    Conversations {
        /// Only list group conversations
        #[arg(long)]
        groups: bool,
    },
    /// Open a conversation and chat interactively
    Chat {
        /// Phone number or group id
        contact: String,
        /// Start a conversation that is not in the list yet
        #[arg(long)]
        new: bool,
    },
    /// Send a single message
    Send {
        contact: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Show one message by id
    Show { id: String },
    /// Show account details and message statistics
    Profile,
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let app = HeraldApp::new()?;

    match cli.command {
        Commands::Login { username } => login(&app, username),
        Commands::Logout => app.client().auth().logout(),
        Commands::Conversations { groups } => list_conversations(&app, groups),
        Commands::Chat { contact, new } => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            runtime.block_on(chat_session(&app, ContactId::new(contact), new))
        }
        Commands::Send { contact, text } => {
            send_once(&app, ContactId::new(contact), text.join(" "))
        }
        Commands::Show { id } => show_message(&app, MessageId::new(id)),
        Commands::Profile => show_profile(&app),
    }
}

fn login(app: &HeraldApp, username: Option<String>) -> Result<()> {
    let username = match username {
        Some(name) => name,
        None => {
            print!("Username: ");
            std::io::stdout().flush()?;
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("Failed to read username")?;
            line.trim().to_string()
        }
    };
    anyhow::ensure!(!username.is_empty(), "Username is required");

    let password = match std::env::var("HERALD_PASSWORD") {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };

    app.client().login(&username, &password)?;
    println!("Logged in as {}", username);
    Ok(())
}

fn list_conversations(app: &HeraldApp, groups_only: bool) -> Result<()> {
    app.require_login()?;
    let mut engine = app.engine()?;

    let summaries = if groups_only {
        let groups = app.client().list_groups().map_err(|e| app.api_error(e))?;
        chat::query::summarize(&groups, engine.read_state())
    } else {
        let now = Instant::now();
        engine.start(now);
        engine.pump(app.relay(), now);
        let snapshot = engine.snapshot();
        if snapshot.unauthorized {
            return Err(app.expire_session());
        }
        if let Some(e) = snapshot.conversation_error {
            return Err(e.into());
        }
        snapshot.conversations
    };

    print!("{}", render_conversation_list(&summaries));
    Ok(())
}

fn send_once(app: &HeraldApp, contact_id: ContactId, text: String) -> Result<()> {
    app.require_login()?;
    let mut engine = app.engine()?;
    engine.start_new_chat(contact_id.clone(), Instant::now());
    engine.set_draft(text);

    match engine.send_blocking(app.relay()) {
        Ok(()) => {
            println!("Sent to {}", contact_id);
            Ok(())
        }
        Err(chat::SendError::Rejected(e)) if e.is_unauthorized() => Err(app.expire_session()),
        Err(e) => Err(e.into()),
    }
}

fn show_message(app: &HeraldApp, id: MessageId) -> Result<()> {
    app.require_login()?;
    let message = app.client().get_message(&id).map_err(|e| app.api_error(e))?;
    let classifier = chat::Classifier::new(chat::LocalIdentities::from_numbers(
        &app.config().local_numbers,
    ));

    let direction = match classifier.side(&message) {
        chat::Side::Outbound => "to",
        chat::Side::Inbound => "from",
    };
    println!(
        "{} {} {}",
        direction,
        message.sender_label().unwrap_or("unknown"),
        message.received_at.map(format_timestamp).unwrap_or_default()
    );
    println!("{}", message.body);
    Ok(())
}

fn show_profile(app: &HeraldApp) -> Result<()> {
    app.require_login()?;
    let profile = app.client().user_profile().map_err(|e| app.api_error(e))?;
    let stats = app.client().stats().map_err(|e| app.api_error(e))?;

    println!("{} ({})", profile.full_name(), profile.username);
    if let Some(email) = &profile.email {
        println!("{}", email);
    }
    println!("Messages:      {}", stats.total_messages);
    println!("Conversations: {}", stats.total_conversations);
    if let Some(groups) = stats.total_groups {
        println!("Groups:        {}", groups);
    }
    Ok(())
}

/// Interactive session: stdin lines are sent, new messages are printed
async fn chat_session(app: &HeraldApp, contact_id: ContactId, new_chat: bool) -> Result<()> {
    app.require_login()?;
    let engine = app.engine()?;
    let backend: std::sync::Arc<dyn Backend> = app.client().clone();

    let cancel = install_signal_handler();
    let handle = driver::spawn_with_token(engine, backend, cancel.clone());

    let open = if new_chat {
        Command::NewChat(contact_id.clone())
    } else {
        Command::OpenConversation(contact_id.clone())
    };
    handle.command(open).await?;
    println!("Chatting with {}. Type a message and press enter; /quit to leave.", contact_id);

    let mut printer = ThreadPrinter::new();
    let mut snapshots = handle.subscribe();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut expired = false;
    // Finished-send count that marks our outstanding send as answered
    let mut awaiting: Option<u64> = None;
    // Lines typed while a send was outstanding
    let mut held: Vec<String> = Vec::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if snapshot.unauthorized {
                    expired = true;
                    break;
                }
                print!("{}", printer.update(&snapshot));
                std::io::stdout().flush()?;

                if awaiting.is_some_and(|target| snapshot.sends_finished >= target) {
                    awaiting = None;
                    if !held.is_empty() {
                        let text = held.join("\n");
                        held.clear();
                        if snapshot.send_error.is_some() {
                            // Leave everything in the draft for a manual retry
                            let draft = format!("{}\n{}", snapshot.draft, text);
                            handle.command(Command::SetDraft(draft)).await?;
                        } else {
                            awaiting = Some(snapshot.sends_finished + 1);
                            handle.command(Command::SetDraft(text)).await?;
                            handle.command(Command::Send).await?;
                        }
                    }
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match line.trim() {
                    "/quit" => break,
                    "/refresh" => handle.command(Command::Refresh).await?,
                    "" if awaiting.is_some() => {}
                    _ if awaiting.is_some() => {
                        println!("(still sending, this line goes out next)");
                        held.push(line);
                    }
                    "" => {
                        let (draft_blank, finished) = {
                            let latest = snapshots.borrow();
                            (latest.draft.trim().is_empty(), latest.sends_finished)
                        };
                        if !draft_blank {
                            awaiting = Some(finished + 1);
                            handle.command(Command::Send).await?;
                        }
                    }
                    _ => {
                        awaiting = Some(snapshots.borrow().sends_finished + 1);
                        handle.command(Command::SetDraft(line)).await?;
                        handle.command(Command::Send).await?;
                    }
                }
            }
        }
    }

    debug!("Leaving chat with {}", contact_id);
    handle.shutdown().await?;
    if expired {
        return Err(app.expire_session());
    }
    info!("Chat closed");
    Ok(())
}

/// Cancel the returned token on Ctrl+C
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, leaving chat");
            token_clone.cancel();
        }
    });

    token
}
