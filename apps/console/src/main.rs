use std::sync::Arc;

use anyhow::Result;
use axum::{routing::post, Json, Router};
use clap::Parser;
use client_core::{
    config, DurableKeyValueStore, IdentityStore, KeyValueStore, Session, SessionEvent,
};
use comms_integration::VoiceDevice;
use shared::domain::{MessageDirection, MessageStatus};
use shared::protocol::TokenRequest;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing::{error, info};

mod loopback;

use loopback::{LoopbackChat, LoopbackVoice};

/// Terminal front end for the demo-bank support session: chat with the
/// loopback agent, toggle a call, inspect the transcript.
#[derive(Parser, Debug)]
struct Args {
    /// Override the sqlite database holding persisted client state
    #[arg(long)]
    database_url: Option<String>,
    /// Run without a voice capability (the call toggle becomes a no-op)
    #[arg(long)]
    no_voice: bool,
    /// Mint tokens from a built-in local issuer instead of the configured
    /// endpoint
    #[arg(long)]
    demo_issuer: bool,
}

async fn spawn_demo_issuer() -> Result<String> {
    async fn handle(Json(request): Json<TokenRequest>) -> Json<serde_json::Value> {
        Json(serde_json::json!({
            "token": format!("demo-{}", uuid::Uuid::new_v4().simple()),
            "identity": request.identity,
        }))
    }

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new().route("/issue-access-token", post(handle));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}/issue-access-token"))
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::MessageAppended(view) => {
            let label = match view.direction {
                MessageDirection::Outgoing => "you",
                MessageDirection::Incoming => "agent",
                MessageDirection::System => "*",
            };
            let status = match view.status {
                MessageStatus::Sending => " (sending)",
                MessageStatus::Sent => "",
            };
            println!("[{label}] {}{status}", view.text);
        }
        SessionEvent::MessageConfirmed(_) => println!("    ... sent"),
        SessionEvent::SystemMessagesRemoved { .. } => {}
        SessionEvent::CallStateChanged { active } => {
            println!("== call {}", if *active { "connected" } else { "ended" });
        }
        SessionEvent::ConversationResolved(sid) => println!("== conversation {sid}"),
        SessionEvent::CredentialRefreshed => info!("access token refreshed"),
        SessionEvent::Error(message) => error!("{message}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let mut config = config::load_config();
    if let Some(url) = args.database_url {
        config.database_url = url;
    }
    if args.demo_issuer {
        config.token_url = spawn_demo_issuer().await?;
    }
    config.validate()?;

    let storage = storage::Storage::new(&config.database_url).await?;
    let store: Arc<dyn KeyValueStore> = Arc::new(DurableKeyValueStore::new(storage));

    // the loopback transport needs to know who "we" are to echo correctly
    let local_identity = IdentityStore::new(Arc::clone(&store)).get_identity().await?;
    let chat = LoopbackChat::new(local_identity);
    let voice: Option<Arc<dyn VoiceDevice>> = if args.no_voice {
        None
    } else {
        Some(LoopbackVoice::new())
    };

    let session = Session::new(config, store, chat, voice)?;
    session.bootstrap().await?;

    let mut events = session.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            print_event(&event);
        }
    });

    println!("type a message, or /call, /history, /logout, /quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => {}
            "/quit" => break,
            "/call" => session.toggle_call().await?,
            "/history" => {
                for view in session.transcript().await {
                    print_event(&SessionEvent::MessageAppended(view));
                }
            }
            "/logout" => {
                session.logout().await?;
                println!("logged out");
                break;
            }
            text => {
                session.send_message(text).await?;
            }
        }
    }

    session.shutdown().await;
    Ok(())
}
