//! Coordinator side: splits plaintext requests into additive share
//! vectors and drives both parties over the user-port protocol.

use futures::future::try_join;
use num_traits::One;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::Error;
use crate::ring::{self, Ring31};
use crate::wire::{self, OP_READ_SECURE, OP_WRITE_VEC, WRITE_ACK};

/// Additive sharing of `value * e_index` over dimension `dim`.
///
/// The second share is a fresh uniform vector f, the first is
/// `value * e_index - f`, so the two sum to the scaled basis vector.
pub fn split_basis<R: Rng + ?Sized>(
    dim: u32,
    index: u32,
    value: Ring31,
    rng: &mut R,
) -> Result<(Vec<Ring31>, Vec<Ring31>), Error> {
    if index >= dim {
        return Err(Error::IndexOutOfRange {
            index: index as usize,
            rows: dim as usize,
        });
    }
    let f = ring::random_vector(dim as usize, rng);
    let mut masked: Vec<Ring31> = f.iter().map(|&x| -x).collect();
    masked[index as usize] += value;
    Ok((masked, f))
}

/// Issues reads and writes against both parties and reconstructs.
pub struct CoordinatorClient {
    party_a: String,
    party_b: String,
}

impl CoordinatorClient {
    pub fn new(party_a: impl Into<String>, party_b: impl Into<String>) -> Self {
        Self {
            party_a: party_a.into(),
            party_b: party_b.into(),
        }
    }

    /// Obliviously add `value` to the cell at `index`.
    pub async fn write(&self, dim: u32, index: u32, value: Ring31) -> Result<(), Error> {
        let mut rng = StdRng::from_entropy();
        let (share_a, share_b) = split_basis(dim, index, value, &mut rng)?;
        try_join(
            write_share(&self.party_a, &share_a),
            write_share(&self.party_b, &share_b),
        )
        .await?;
        debug!(index, %value, "write acknowledged by both parties");
        Ok(())
    }

    /// Reconstruct the cell at `index`.
    pub async fn read(&self, dim: u32, index: u32) -> Result<Ring31, Error> {
        let mut rng = StdRng::from_entropy();
        let (share_a, share_b) = split_basis(dim, index, Ring31::one(), &mut rng)?;
        let (out_a, out_b) = try_join(
            read_share(&self.party_a, &share_a),
            read_share(&self.party_b, &share_b),
        )
        .await?;
        Ok(out_a + out_b)
    }

    /// Overwrite the cell at `index` with `value`: read the current
    /// content, then add the difference.
    pub async fn set(&self, dim: u32, index: u32, value: Ring31) -> Result<(), Error> {
        let current = self.read(dim, index).await?;
        self.write(dim, index, value - current).await
    }
}

async fn write_share(addr: &str, share: &[Ring31]) -> Result<(), Error> {
    let mut sock = TcpStream::connect(addr).await?;
    sock.write_u8(OP_WRITE_VEC).await?;
    sock.write_u32(share.len() as u32).await?;
    wire::write_ring_vec(&mut sock, share).await?;
    sock.flush().await?;
    let mut ack = [0u8; 2];
    sock.read_exact(&mut ack).await?;
    if &ack != WRITE_ACK {
        return Err(Error::WriteNotAcknowledged);
    }
    Ok(())
}

async fn read_share(addr: &str, e_share: &[Ring31]) -> Result<Ring31, Error> {
    let mut sock = TcpStream::connect(addr).await?;
    sock.write_u8(OP_READ_SECURE).await?;
    sock.write_u32(e_share.len() as u32).await?;
    wire::write_ring_vec(&mut sock, e_share).await?;
    sock.flush().await?;
    Ok(wire::read_ring(&mut sock).await?)
}
