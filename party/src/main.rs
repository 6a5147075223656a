use std::process;
use std::sync::Arc;

use argh::FromArgs;
use doram::party::Party;
use doram::session::Role;
use doram::triple::DealerClient;
use tokio::net::TcpListener;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// DORAM party server: holds one additive share of the array, answers
/// coordinator reads and writes, and runs the online protocol against
/// the peer party.
#[derive(FromArgs, Debug)]
struct Options {
    /// party role, A or B
    #[argh(option)]
    role: Role,

    /// number of rows in the share store
    #[argh(option)]
    rows: u32,

    /// listen address for coordinator requests
    #[argh(option, default = "String::from(\"0.0.0.0:9700\")")]
    listen: String,

    /// listen port for inbound peer residuals
    #[argh(option, default = "9701")]
    peer_listen: u16,

    /// address of the peer party's residual listener
    #[argh(option, default = "String::from(\"127.0.0.1:9801\")")]
    peer: String,

    /// address of the pairing dealer
    #[argh(option, default = "String::from(\"127.0.0.1:9300\")")]
    share: String,
}

#[tokio::main]
async fn main() {
    let options: Options = argh::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if options.rows == 0 {
        error!("--rows must be nonzero");
        process::exit(1);
    }

    // The residual listener binds on the same host as the user listener.
    let listen_host = options
        .listen
        .rsplit_once(':')
        .map(|(host, _)| host)
        .unwrap_or("0.0.0.0");
    let peer_listen_addr = format!("{}:{}", listen_host, options.peer_listen);

    let users = match TcpListener::bind(&options.listen).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, addr = %options.listen, "failed to bind user listener");
            process::exit(1);
        }
    };
    let inbound = match TcpListener::bind(&peer_listen_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, addr = %peer_listen_addr, "failed to bind residual listener");
            process::exit(1);
        }
    };

    let party = Arc::new(Party::new(
        options.role,
        options.rows,
        options.peer,
        DealerClient::new(options.share),
        inbound,
    ));

    if let Err(err) = party.serve(users).await {
        error!(%err, "party terminated");
        process::exit(1);
    }
}
