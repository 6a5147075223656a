//! Framed wire protocol shared by the dealer, the parties and the
//! coordinator. All integers travel big-endian; ring elements are 32-bit
//! words with the high bit clear.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Error;
use crate::ring::Ring31;

/// Requester asks the dealer for one triple half: `[op][dim:be32]`.
pub const OP_TRIPLE_REQUEST: u8 = 0x31;
/// Dealer answer: `[op][dim:be32][sid:be64][a_i][b_i][c_i]`.
pub const OP_TRIPLE_RESPONSE: u8 = 0x33;
/// Coordinator write: `[op][dim:be32][vec]`, answered with `OK`.
pub const OP_WRITE_VEC: u8 = 0x40;
/// Coordinator secure read: `[op][dim:be32][e_share]`, answered with one word.
pub const OP_READ_SECURE: u8 = 0x41;

/// Two-byte acknowledgement for an applied write.
pub const WRITE_ACK: &[u8; 2] = b"OK";

/// Identifies one of the two residual exchanges of a read session.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExchangeTag {
    /// Party A masks its store share, party B masks its basis share.
    Forward,
    /// The opposite orientation.
    Reverse,
}

impl ExchangeTag {
    pub const fn byte(self) -> u8 {
        match self {
            Self::Forward => 0x01,
            Self::Reverse => 0x10,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self, Error> {
        match byte {
            0x01 => Ok(Self::Forward),
            0x10 => Ok(Self::Reverse),
            other => Err(Error::BadTag(other)),
        }
    }
}

/// One masked vector exchanged between the parties.
///
/// Travels as `[sid:be64][tag:u8][dim:be32][vec]`, one message per
/// connection.
#[derive(Clone, Debug)]
pub struct Residual {
    pub sid: u64,
    pub tag: ExchangeTag,
    pub payload: Vec<Ring31>,
}

impl Residual {
    pub fn dim(&self) -> u32 {
        self.payload.len() as u32
    }

    pub async fn read_from<R>(src: &mut R) -> Result<Self, Error>
    where
        R: AsyncRead + Unpin,
    {
        let sid = src.read_u64().await?;
        let tag = ExchangeTag::from_byte(src.read_u8().await?)?;
        let dim = src.read_u32().await?;
        if dim == 0 {
            return Err(Error::ZeroDim);
        }
        let payload = read_ring_vec(src, dim).await?;
        Ok(Self { sid, tag, payload })
    }

    pub async fn write_to<W>(&self, dst: &mut W) -> Result<(), Error>
    where
        W: AsyncWrite + Unpin,
    {
        dst.write_u64(self.sid).await?;
        dst.write_u8(self.tag.byte()).await?;
        dst.write_u32(self.dim()).await?;
        write_ring_vec(dst, &self.payload).await?;
        dst.flush().await?;
        Ok(())
    }
}

/// Read one ring element, masking the reserved high bit.
pub async fn read_ring<R>(src: &mut R) -> io::Result<Ring31>
where
    R: AsyncRead + Unpin,
{
    Ok(Ring31::new(src.read_u32().await?))
}

pub async fn write_ring<W>(dst: &mut W, x: Ring31) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    dst.write_u32(x.raw()).await
}

pub async fn read_ring_vec<R>(src: &mut R, dim: u32) -> io::Result<Vec<Ring31>>
where
    R: AsyncRead + Unpin,
{
    let mut vec = Vec::with_capacity(dim as usize);
    for _ in 0..dim {
        vec.push(read_ring(src).await?);
    }
    Ok(vec)
}

pub async fn write_ring_vec<W>(dst: &mut W, xs: &[Ring31]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    for &x in xs {
        write_ring(dst, x).await?;
    }
    Ok(())
}
