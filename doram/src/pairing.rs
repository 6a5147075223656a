//! Dealer side: parks triple requests by dimension and serves each
//! matched pair one freshly generated correlated pair.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};

use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::triple;
use crate::wire::OP_TRIPLE_REQUEST;

/// Waiting room keyed by requested dimension.
///
/// A parked connection stays owned by the map until its peer arrives, so
/// per dimension the queue never holds more than one entry. Only the
/// park-or-match decision runs under the lock; generation and socket
/// writes happen in the worker.
pub struct PairingRoom {
    waiting: Mutex<HashMap<u32, VecDeque<TcpStream>>>,
}

impl PairingRoom {
    pub fn new() -> Self {
        Self {
            waiting: Mutex::new(HashMap::new()),
        }
    }

    /// Either take the waiting peer for this dimension, or park the
    /// given socket and signal the worker to return.
    fn pair_or_park(&self, dim: u32, sock: TcpStream) -> Option<(TcpStream, TcpStream)> {
        let mut waiting = self.waiting.lock().unwrap();
        let queue = waiting.entry(dim).or_default();
        match queue.pop_front() {
            Some(peer) => {
                if queue.is_empty() {
                    waiting.remove(&dim);
                }
                Some((peer, sock))
            }
            None => {
                queue.push_back(sock);
                None
            }
        }
    }
}

impl Default for PairingRoom {
    fn default() -> Self {
        Self::new()
    }
}

/// Accept triple requests forever, one detached worker per connection.
pub async fn serve(listener: TcpListener) -> io::Result<()> {
    info!(addr = %listener.local_addr()?, "dealer listening");
    let room = Arc::new(PairingRoom::new());
    loop {
        let (sock, addr) = listener.accept().await?;
        let room = room.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_request(&room, sock).await {
                warn!(%err, %addr, "pairing request failed");
            }
        });
    }
}

async fn handle_request(room: &PairingRoom, mut sock: TcpStream) -> Result<(), Error> {
    let op = sock.read_u8().await?;
    if op != OP_TRIPLE_REQUEST {
        return Err(Error::UnexpectedOpcode(op));
    }
    let dim = sock.read_u32().await?;
    if dim == 0 {
        return Err(Error::ZeroDim);
    }

    let Some((mut first, mut second)) = room.pair_or_park(dim, sock) else {
        debug!(dim, "request parked, waiting for a peer");
        return Ok(());
    };

    let mut rng = StdRng::from_entropy();
    let id = rng.gen();
    let (half0, half1) = triple::generate(dim, id, &mut rng);
    half0.write_to(&mut first).await?;
    half1.write_to(&mut second).await?;
    debug!(dim, id, "pair matched and served");
    Ok(())
}
