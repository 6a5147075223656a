//! Online state of one secure read: residual construction, header
//! validation and role-asymmetric reconstruction.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Error;
use crate::ring::{add_vectors, dot, Ring31};
use crate::triple::TripleShare;
use crate::wire::{ExchangeTag, Residual};

/// Which of the two parties this process is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    A,
    B,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }

    /// Whether this party opens the given exchange by sending first.
    /// The opener masks its store share; the responder masks its basis
    /// share. Orientation swaps between the two exchanges.
    pub fn sends_first(self, tag: ExchangeTag) -> bool {
        match tag {
            ExchangeTag::Forward => self == Self::A,
            ExchangeTag::Reverse => self == Self::B,
        }
    }
}

impl FromStr for Role {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" | "a" => Ok(Self::A),
            "B" | "b" => Ok(Self::B),
            _ => Err("role must be A or B"),
        }
    }
}

/// Mints session ids unique within this process.
///
/// The epoch mixes wall-clock nanoseconds with OS randomness at startup,
/// so ids stay distinct across restarts; a counter keeps them distinct
/// across concurrent sessions.
pub struct SidGenerator {
    epoch: u64,
    counter: AtomicU64,
}

impl SidGenerator {
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self {
            epoch: nanos ^ rand::random::<u64>(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn next(&self, dim: u32) -> u64 {
        let count = self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        self.epoch ^ count ^ u64::from(dim)
    }
}

impl Default for SidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn slot(tag: ExchangeTag) -> usize {
    match tag {
        ExchangeTag::Forward => 0,
        ExchangeTag::Reverse => 1,
    }
}

/// One read session on one party.
///
/// Over the two exchanges each party sends its store share masked by its
/// `a` half and its basis share masked by its `b` half, and receives the
/// peer's counterparts. Summing each pair yields the fully masked
/// residuals `u = (A_A + A_B) + a` and `v = (e_A + e_B) + b`, from which
/// the parties reconstruct additive shares of the inner product:
///
///   s_A = -<u, b_A> - <a_A, v> + c_A
///   s_B = <u, v> - <u, b_B> - <a_B, v> + c_B
///
/// so that s_A + s_B = <u - a, v - b> = <A_A + A_B, e_A + e_B>.
pub struct ReadSession {
    role: Role,
    sid: u64,
    dim: u32,
    triple: TripleShare,
    store_share: Vec<Ring31>,
    basis_share: Vec<Ring31>,
    sent: [Option<Vec<Ring31>>; 2],
    received: [Option<Vec<Ring31>>; 2],
    peer_sid: Option<u64>,
}

impl ReadSession {
    pub fn new(
        role: Role,
        sid: u64,
        store_share: Vec<Ring31>,
        basis_share: Vec<Ring31>,
        triple: TripleShare,
    ) -> Result<Self, Error> {
        if store_share.is_empty() {
            return Err(Error::ZeroDim);
        }
        if basis_share.len() != store_share.len() {
            return Err(Error::LengthMismatch {
                expected: store_share.len(),
                found: basis_share.len(),
            });
        }
        let dim = store_share.len() as u32;
        if triple.dim != dim {
            return Err(Error::DimMismatch {
                expected: dim,
                found: triple.dim,
            });
        }
        Ok(Self {
            role,
            sid,
            dim,
            triple,
            store_share,
            basis_share,
            sent: [None, None],
            received: [None, None],
            peer_sid: None,
        })
    }

    pub fn sid(&self) -> u64 {
        self.sid
    }

    pub fn dim(&self) -> u32 {
        self.dim
    }

    /// Residual this party contributes to the given exchange.
    pub fn outbound(&mut self, tag: ExchangeTag) -> Residual {
        let masked = if self.role.sends_first(tag) {
            add_masked(&self.store_share, &self.triple.a)
        } else {
            add_masked(&self.basis_share, &self.triple.b)
        };
        self.sent[slot(tag)] = Some(masked.clone());
        Residual {
            sid: self.sid,
            tag,
            payload: masked,
        }
    }

    /// Validate an inbound residual against the expected exchange and
    /// record its payload. The first inbound fixes the peer's session id;
    /// the second must repeat it.
    pub fn absorb(&mut self, expected: ExchangeTag, residual: &Residual) -> Result<(), Error> {
        if residual.tag != expected {
            return Err(Error::TagMismatch {
                expected: expected.byte(),
                found: residual.tag.byte(),
            });
        }
        if residual.dim() != self.dim {
            return Err(Error::DimMismatch {
                expected: self.dim,
                found: residual.dim(),
            });
        }
        match self.peer_sid {
            None => self.peer_sid = Some(residual.sid),
            Some(sid) if sid != residual.sid => {
                return Err(Error::SidMismatch {
                    expected: sid,
                    found: residual.sid,
                });
            }
            Some(_) => {}
        }
        self.received[slot(expected)] = Some(residual.payload.clone());
        Ok(())
    }

    /// This party's additive share of the array cell, available once both
    /// exchanges completed.
    pub fn output_share(&self) -> Result<Ring31, Error> {
        fn opened(
            side: &[Option<Vec<Ring31>>; 2],
            tag: ExchangeTag,
        ) -> Result<&[Ring31], Error> {
            side[slot(tag)].as_deref().ok_or(Error::SessionIncomplete)
        }
        // My opener plus the peer's opener of the other exchange covers
        // one full mask; the two responder messages cover the other.
        let mine = add_vectors(
            opened(&self.sent, ExchangeTag::Forward)?,
            opened(&self.received, ExchangeTag::Reverse)?,
        )?;
        let theirs = add_vectors(
            opened(&self.received, ExchangeTag::Forward)?,
            opened(&self.sent, ExchangeTag::Reverse)?,
        )?;
        let (u, v) = match self.role {
            Role::A => (mine, theirs),
            Role::B => (theirs, mine),
        };
        let mut share = self.triple.c - dot(&u, &self.triple.b)? - dot(&self.triple.a, &v)?;
        if self.role == Role::B {
            share += dot(&u, &v)?;
        }
        Ok(share)
    }
}

fn add_masked(input: &[Ring31], mask: &[Ring31]) -> Vec<Ring31> {
    input.iter().zip(mask).map(|(&x, &m)| x + m).collect()
}
