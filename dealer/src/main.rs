use std::process;

use argh::FromArgs;
use doram::pairing;
use tokio::net::TcpListener;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Du-Atallah pairing dealer: matches triple requests by dimension and
/// hands each matched pair one half of fresh correlated randomness.
#[derive(FromArgs, Debug)]
struct Options {
    /// listen address for triple requests
    #[argh(option, default = "String::from(\"0.0.0.0:9300\")")]
    listen: String,
}

#[tokio::main]
async fn main() {
    let options: Options = argh::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let listener = match TcpListener::bind(&options.listen).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, addr = %options.listen, "failed to bind listen address");
            process::exit(1);
        }
    };

    if let Err(err) = pairing::serve(listener).await {
        error!(%err, "dealer terminated");
        process::exit(1);
    }
}
