use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use colored::*;
use std::sync::Arc;
use std::time::Duration;
use tandem::client::{
    ClientConfig, CollabSession, HttpDocumentStore, LinkState, MeshObserver, RemoteTrack,
    RtcTransportFactory, SessionParts, SyntheticMediaSource, WsRelayConnector,
};
use tandem::model::{Delta, ParticipantId, RoomId, SessionContext};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tandem", version, about = "Join a shared document from the terminal")]
struct Cli {
    /// Relay websocket url (default: $TANDEM_RELAY_URL or ws://localhost:5001)
    #[arg(long, global = true)]
    relay: Option<String>,

    /// Document API base url (default: $TANDEM_STORE_URL or http://localhost:5001/api)
    #[arg(long, global = true)]
    store: Option<String>,

    /// Bearer token for the relay and the document API
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the document every time it changes.
    Watch {
        #[arg(long)]
        doc: String,
    },

    /// Append text to the end of the document.
    Append {
        #[arg(long)]
        doc: String,

        #[arg(long)]
        text: String,
    },

    /// Join the document's call with synthetic media and report links.
    Call {
        #[arg(long)]
        doc: String,

        #[arg(long, default_value_t = 60)]
        seconds: u64,
    },
}

impl Commands {
    fn doc(&self) -> RoomId {
        match self {
            Commands::Watch { doc } | Commands::Append { doc, .. } | Commands::Call { doc, .. } => {
                RoomId::from(doc.as_str())
            }
        }
    }
}

struct PrintObserver;

#[async_trait]
impl MeshObserver for PrintObserver {
    async fn on_link_state(&self, remote: &ParticipantId, state: LinkState) {
        let line = format!("🔗 {remote}: {state:?}");
        match state {
            LinkState::Connected => println!("{}", line.green()),
            LinkState::Closed => println!("{}", line.red()),
            _ => println!("{}", line.dimmed()),
        }
    }

    async fn on_remote_track(&self, remote: &ParticipantId, track: RemoteTrack) {
        println!("{}", format!("🎥 {} track from {remote}", track.kind).cyan());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env();
    if let Some(relay) = cli.relay {
        config.relay_url = relay;
    }
    if let Some(store) = cli.store {
        config.store_url = store;
    }
    let ctx = SessionContext {
        user: None,
        auth_token: cli.token,
    };

    let room_id = cli.command.doc();
    let parts = SessionParts {
        connector: Arc::new(
            WsRelayConnector::new(&config.relay_url, config.handshake_timeout)
                .context("Invalid relay url")?,
        ),
        store: Arc::new(HttpDocumentStore::new(&config.store_url, ctx.clone())),
        media: Arc::new(SyntheticMediaSource),
        transports: Arc::new(RtcTransportFactory::new(config.transport.clone())),
        observer: Arc::new(PrintObserver),
    };

    println!("{}", format!("📡 Connecting to {}...", config.relay_url).cyan());
    let session = CollabSession::open(ctx, &config, room_id.clone(), parts)
        .await
        .context("Failed to connect to the relay")?;
    session.document().wait_loaded().await;
    println!("{}", format!("📄 Joined {room_id}").green().bold());

    let result = match cli.command {
        Commands::Watch { .. } => watch(&session).await,
        Commands::Append { text, .. } => append(&session, &config, text).await,
        Commands::Call { seconds, .. } => call(&session, seconds).await,
    };

    session.close().await;
    result
}

async fn watch(session: &CollabSession) -> Result<()> {
    let mut content = session.document().watch_content();
    print_document(&content.borrow_and_update());

    loop {
        tokio::select! {
            changed = content.changed() => {
                if changed.is_err() {
                    break;
                }
                print_document(&content.borrow_and_update());
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn append(session: &CollabSession, config: &ClientConfig, text: String) -> Result<()> {
    let len = session.document().content().text_len();
    session
        .document()
        .local_edit(Delta::new().retain(len).insert(text))
        .context("Edit was not delivered")?;

    // Let one autosave go out so the store has the new content.
    tokio::time::sleep(config.document.autosave_interval + Duration::from_millis(200)).await;
    println!("{}", "✨ Appended".green().bold());
    Ok(())
}

async fn call(session: &CollabSession, seconds: u64) -> Result<()> {
    session.join_call().await.context("Could not join the call")?;
    println!("{}", "📞 In call, waiting for participants...".cyan());

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
        _ = tokio::signal::ctrl_c() => {}
    }

    let links = session.mesh().links().await?;
    println!("{}", format!("👋 Leaving call ({} links)", links.len()).yellow());
    session.leave_call().await?;
    Ok(())
}

fn print_document(content: &Delta) {
    println!("{}", "─".repeat(40).dimmed());
    println!("{}", content.plain_text());
}
