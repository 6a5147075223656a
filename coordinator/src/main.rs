use std::process;
use std::str::FromStr;

use argh::FromArgs;
use doram::coordinator::CoordinatorClient;
use doram::ring::Ring31;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Requested operation.
#[derive(Debug)]
enum Op {
    Read,
    Write,
    Set,
}

impl FromStr for Op {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Op::Read),
            "write" => Ok(Op::Write),
            "set" => Ok(Op::Set),
            _ => Err("op must be read, write or set"),
        }
    }
}

/// DORAM coordinator: splits a plaintext request into share vectors,
/// drives both parties and reconstructs the result.
#[derive(FromArgs, Debug)]
struct Options {
    /// operation to perform: read, write or set
    #[argh(option)]
    op: Op,

    /// logical array size
    #[argh(option)]
    dim: u32,

    /// target index
    #[argh(option)]
    idx: u32,

    /// value to write (write and set only)
    #[argh(option, default = "0")]
    val: u32,

    /// user address of party A
    #[argh(option)]
    c0: String,

    /// user address of party B
    #[argh(option)]
    c1: String,
}

#[tokio::main]
async fn main() {
    let options: Options = argh::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if options.dim == 0 || options.idx >= options.dim {
        eprintln!("idx must satisfy idx < dim and dim must be nonzero");
        process::exit(1);
    }

    let client = CoordinatorClient::new(options.c0, options.c1);
    let value = Ring31::new(options.val);

    let outcome = match options.op {
        Op::Read => match client.read(options.dim, options.idx).await {
            Ok(result) => {
                println!("READ idx={} -> {}", options.idx, result);
                Ok(())
            }
            Err(err) => Err(err),
        },
        Op::Write => match client.write(options.dim, options.idx, value).await {
            Ok(()) => {
                println!("WRITE idx={} value={}", options.idx, value);
                Ok(())
            }
            Err(err) => Err(err),
        },
        Op::Set => match client.set(options.dim, options.idx, value).await {
            Ok(()) => {
                println!("SET idx={} value={}", options.idx, value);
                Ok(())
            }
            Err(err) => Err(err),
        },
    };

    if let Err(err) = outcome {
        error!(%err, "request failed");
        process::exit(2);
    }
}
