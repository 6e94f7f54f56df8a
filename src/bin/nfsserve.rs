use clap::Parser;
use nfsserve::tcp::{NFSTcp, NFSTcpListener};
use tracing::info;

/// A userspace NFSv3 server backed by an in-memory filesystem.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to listen on, of the form host:port.
    #[arg(long, default_value = "127.0.0.1:12049")]
    listen: String,

    /// Enable verbose per-procedure tracing.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    let max_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_writer(std::io::stderr)
        .init();

    let mux = nfsserve::bootstrap();
    let listener = NFSTcpListener::bind(&args.listen, mux).await?;
    info!("nfsserve listening on {}", args.listen);
    listener.handle_forever().await?;
    Ok(())
}
// Test with
// mount -t nfs -o nolocks,vers=3,tcp,port=12049,mountport=12049,soft 127.0.0.1:/ mnt/
