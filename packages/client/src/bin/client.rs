//! hiroba command-line client.
//!
//! `servers` merges the server lists of every account listed in a sessions file.
//! `stream` connects to the event server and prints incoming events.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin hiroba-client -- servers --sessions accounts.json
//! cargo run --bin hiroba-client -- stream --user-id alice --room 42
//! ```

use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use hiroba_client::{
    SessionCache, ShellCommands,
    api::HttpServerApi,
    formatter::EventFormatter,
    store::{JsonFileOrderStore, load_accounts},
    stream::EventStreamClient,
};
use hiroba_shared::{logger::setup_logger, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "hiroba-client")]
#[command(about = "Multi-account server list and event stream client", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the servers of every account in the sessions file
    Servers {
        /// JSON file with an array of {user_id, username, token, api_base_url}
        #[arg(short = 's', long, env = "HIROBA_SESSIONS_FILE")]
        sessions: PathBuf,

        /// JSON file holding local display-order overrides
        #[arg(short = 'o', long, env = "HIROBA_ORDER_FILE", default_value = "hiroba-order.json")]
        order_file: PathBuf,
    },

    /// Print events from the event server
    Stream {
        /// Event server URL
        #[arg(short = 'u', long, env = "HIROBA_URL", default_value = "http://127.0.0.1:8080")]
        url: String,

        /// User the connection belongs to
        #[arg(short = 'i', long)]
        user_id: String,

        /// Room to subscribe to (omit for a global connection)
        #[arg(short = 'r', long)]
        room: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    let result = match args.command {
        Command::Servers {
            sessions,
            order_file,
        } => list_servers(sessions, order_file).await,
        Command::Stream { url, user_id, room } => stream_events(url, user_id, room).await,
    };

    if let Err(e) = result {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}

async fn list_servers(
    sessions: PathBuf,
    order_file: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let accounts = load_accounts(&sessions).await?;

    let cache = SessionCache::new(
        Arc::new(HttpServerApi::new(reqwest::Client::new())),
        Arc::new(JsonFileOrderStore::new(order_file)),
        Arc::new(SystemClock),
    );
    let shell = ShellCommands::new(Arc::new(cache));

    for account in accounts {
        shell.add_session(account).await;
    }

    let response = shell.fetch_all_servers().await;
    match response.data {
        Some(servers) => {
            print!("{}", EventFormatter::format_servers(&servers));
            Ok(())
        }
        None => Err(response
            .error
            .unwrap_or_else(|| "failed to fetch servers".to_string())
            .into()),
    }
}

async fn stream_events(
    url: String,
    user_id: String,
    room: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = EventStreamClient::new(reqwest::Client::new(), url);
    let mut stream = match &room {
        Some(room_id) => client.open_room(room_id, &user_id).await?,
        None => client.open_global(&user_id).await?,
    };

    println!(
        "\nListening as '{}' ({}). Press Ctrl+C to exit.\n",
        user_id,
        room.as_deref().map_or("global".to_string(), |r| format!("room {}", r))
    );

    loop {
        tokio::select! {
            frame = stream.next_frame() => match frame? {
                Some(frame) => print!("{}", EventFormatter::format_frame(&frame)),
                None => {
                    tracing::info!("Server closed the stream");
                    return Ok(());
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, closing stream");
                return Ok(());
            }
        }
    }
}
