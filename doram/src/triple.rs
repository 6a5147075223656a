//! Du-Atallah correlated randomness: generation on the dealer side and
//! the sources parties fetch their halves from.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use rand::Rng;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::Error;
use crate::ring::{self, Ring31};
use crate::wire::{self, OP_TRIPLE_REQUEST, OP_TRIPLE_RESPONSE};

/// One party's half of a correlated triple.
///
/// Across the two halves of a pair: `a = a0 + a1`, `b = b0 + b1` and
/// `c0 + c1 = <a, b>`. The id is minted by the dealer and shared by both
/// halves; the online protocol does not interpret it.
#[derive(Clone, Debug)]
pub struct TripleShare {
    pub id: u64,
    pub dim: u32,
    pub a: Vec<Ring31>,
    pub b: Vec<Ring31>,
    pub c: Ring31,
}

impl TripleShare {
    /// Decode a dealer response, checking opcode and dimension.
    pub async fn read_from<R>(src: &mut R, expected_dim: u32) -> Result<Self, Error>
    where
        R: AsyncRead + Unpin,
    {
        let op = src.read_u8().await?;
        if op != OP_TRIPLE_RESPONSE {
            return Err(Error::UnexpectedOpcode(op));
        }
        let dim = src.read_u32().await?;
        if dim != expected_dim {
            return Err(Error::DimMismatch {
                expected: expected_dim,
                found: dim,
            });
        }
        let id = src.read_u64().await?;
        let a = wire::read_ring_vec(src, dim).await?;
        let b = wire::read_ring_vec(src, dim).await?;
        let c = wire::read_ring(src).await?;
        Ok(Self { id, dim, a, b, c })
    }

    /// Encode as a dealer response.
    pub async fn write_to<W>(&self, dst: &mut W) -> Result<(), Error>
    where
        W: AsyncWrite + Unpin,
    {
        dst.write_u8(OP_TRIPLE_RESPONSE).await?;
        dst.write_u32(self.dim).await?;
        dst.write_u64(self.id).await?;
        wire::write_ring_vec(dst, &self.a).await?;
        wire::write_ring_vec(dst, &self.b).await?;
        wire::write_ring(dst, self.c).await?;
        dst.flush().await?;
        Ok(())
    }
}

/// Generate a fresh correlated pair for the given dimension.
///
/// All four mask vectors are drawn independently; the scalar is split so
/// that the halves sum to the inner product of the combined masks.
pub fn generate<R: Rng + ?Sized>(dim: u32, id: u64, rng: &mut R) -> (TripleShare, TripleShare) {
    let n = dim as usize;
    let a0 = ring::random_vector(n, rng);
    let a1 = ring::random_vector(n, rng);
    let b0 = ring::random_vector(n, rng);
    let b1 = ring::random_vector(n, rng);
    let mut c = Ring31::new(0);
    for i in 0..n {
        c += (a0[i] + a1[i]) * (b0[i] + b1[i]);
    }
    let c0: Ring31 = rng.gen();
    let c1 = c - c0;
    (
        TripleShare {
            id,
            dim,
            a: a0,
            b: b0,
            c: c0,
        },
        TripleShare {
            id,
            dim,
            a: a1,
            b: b1,
            c: c1,
        },
    )
}

/// Supplies one fresh triple half per read session.
#[async_trait]
pub trait TripleSource: Send + Sync {
    async fn fetch(&self, dim: u32) -> Result<TripleShare, Error>;
}

/// Fetches halves from the network pairing dealer.
///
/// One connection per fetch; the dealer blocks the request until a peer
/// of the same dimension arrives.
pub struct DealerClient {
    addr: String,
}

impl DealerClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl TripleSource for DealerClient {
    async fn fetch(&self, dim: u32) -> Result<TripleShare, Error> {
        let mut sock = TcpStream::connect(&self.addr).await?;
        sock.write_u8(OP_TRIPLE_REQUEST).await?;
        sock.write_u32(dim).await?;
        sock.flush().await?;
        let share = TripleShare::read_from(&mut sock, dim).await?;
        debug!(id = share.id, dim, "fetched triple half from dealer");
        Ok(share)
    }
}

/// Hands out pre-generated halves, for tests and offline experiments.
pub struct PresharedTripleSource {
    queue: Mutex<VecDeque<TripleShare>>,
}

#[async_trait]
impl TripleSource for PresharedTripleSource {
    async fn fetch(&self, dim: u32) -> Result<TripleShare, Error> {
        let share = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(Error::TriplesExhausted)?;
        if share.dim != dim {
            return Err(Error::DimMismatch {
                expected: dim,
                found: share.dim,
            });
        }
        Ok(share)
    }
}

/// Two sources whose queues hold matching halves of the same pairs.
pub fn preshared_pair<R: Rng + ?Sized>(
    dim: u32,
    count: usize,
    rng: &mut R,
) -> (PresharedTripleSource, PresharedTripleSource) {
    let mut first = VecDeque::with_capacity(count);
    let mut second = VecDeque::with_capacity(count);
    for id in 0..count {
        let (half0, half1) = generate(dim, id as u64, rng);
        first.push_back(half0);
        second.push_back(half1);
    }
    (
        PresharedTripleSource {
            queue: Mutex::new(first),
        },
        PresharedTripleSource {
            queue: Mutex::new(second),
        },
    )
}
