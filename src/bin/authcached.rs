//! Process entry point: load configuration, build the runtime, and serve
//! authentication requests over a minimal line-oriented TCP protocol.
//!
//! This binary exists to give the library a runnable host during
//! development and in integration tests; the façade in
//! `authcache::client` is the real integration surface for an embedding
//! application.

use authcache::client::facade::AuthClient;
use authcache::config::Config;
use authcache::Runtime;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Command-line options for the authentication cache daemon.
#[derive(Parser, Debug)]
#[command(name = "authcached", about = "Distributed authentication cache daemon")]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "AUTHCACHED_BIND", default_value = "127.0.0.1:8700")]
    bind: String,
}

#[tokio::main(worker_threads = 10)]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    log::info!(
        "{} {} starting, binding {}",
        authcache::NAME,
        authcache::VERSION,
        cli.bind
    );

    let runtime = Runtime::init(&config).await?;
    let client = runtime.client().clone();

    let listener = TcpListener::bind(&cli.bind).await?;
    log::info!("listening on {}", cli.bind);

    loop {
        let (socket, peer) = listener.accept().await?;
        let client = client.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, client).await {
                log::warn!("connection from {peer} ended with error: {e}");
            }
        });
    }
}

/// Reads one `username:password` pair per line and writes back
/// `ok`/`denied: <reason>`. Deliberately minimal: this is a harness for the
/// library's pipeline, not a production wire protocol.
async fn handle_connection(
    socket: tokio::net::TcpStream,
    client: AuthClient,
) -> anyhow::Result<()> {
    let (reader, mut writer) = socket.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let Some((username, password)) = line.split_once(':') else {
            writer.write_all(b"denied: malformed request\n").await?;
            continue;
        };

        let response = match client
            .authenticate_async(username, password.as_bytes().to_vec())
            .await
        {
            Ok(result) if result.success => "ok\n".to_string(),
            Ok(result) => format!("denied: {}\n", result.public_message()),
            Err(e) => format!("denied: {}\n", e.kind().public_message()),
        };
        writer.write_all(response.as_bytes()).await?;
    }
    Ok(())
}
