use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

use tidedb_common::{DEFAULT_AOL, DEFAULT_HOST, DEFAULT_PORT, MAX_CONNECTIONS};
use tidedb_server::{Connection, handle_connection};
use tidedb_storage::{Options, Store};

#[derive(Parser, Debug)]
#[command(name = "tidedb-server", about = "TideDB — persistent in-memory data store")]
struct Args {
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    #[arg(long, default_value_t = MAX_CONNECTIONS)]
    max_connections: usize,

    /// Arquivo do log append-only
    #[arg(long, value_name = "FILE", default_value = DEFAULT_AOL)]
    aol: PathBuf,
    /// Número de shards do keyspace
    #[arg(long, default_value_t = 1)]
    shards: usize,
    /// TTL padrão em segundos para chaves criadas sem TTL (0 = sem)
    #[arg(long, default_value_t = 0)]
    default_ttl: u64,
    /// Escreve cada registro direto no arquivo, sem buffer
    #[arg(long)]
    no_async: bool,
    /// Período de flush do buffer do log, em segundos
    #[arg(long, default_value_t = 1)]
    sync_period: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tidedb_server=info,tidedb_storage=info".into()),
        )
        .init();

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    let store = Store::open(
        &args.aol,
        Options {
            shard_count: args.shards,
            default_ttl: Duration::from_secs(args.default_ttl),
            cluster_size: 1,
            no_async: args.no_async,
            sync_period: Duration::from_secs(args.sync_period),
        },
    )?;

    let listener = TcpListener::bind(&addr).await?;
    info!("TideDB escutando em {addr} (log: {})", args.aol.display());

    let semaphore = std::sync::Arc::new(tokio::sync::Semaphore::new(args.max_connections));
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    loop {
        let permit = tokio::select! {
            permit = semaphore.clone().acquire_owned() => permit?,
            _ = signal::ctrl_c() => {
                info!("shutdown solicitado");
                break;
            }
        };

        let (socket, peer) = tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok(v) => v,
                    Err(e) => {
                        error!("erro ao aceitar conexão: {e}");
                        continue;
                    }
                }
            }
            _ = signal::ctrl_c() => {
                info!("shutdown solicitado");
                break;
            }
        };

        info!("nova conexão: {peer}");
        let store = store.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();

        tokio::spawn(async move {
            let conn = Connection::new(socket);
            if let Err(e) = handle_connection(conn, store, &mut shutdown_rx).await {
                error!("erro na conexão {peer}: {e}");
            }
            info!("conexão encerrada: {peer}");
            drop(permit);
        });
    }

    drop(shutdown_tx);
    store.close()?;

    Ok(())
}
