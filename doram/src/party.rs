//! Long-lived party server: coordinator RPCs on the user port, residual
//! exchange with the peer party, triple fetch per read session.

use std::io;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::ring::Ring31;
use crate::session::{ReadSession, Role, SidGenerator};
use crate::store::ShareStore;
use crate::triple::TripleSource;
use crate::wire::{
    self, ExchangeTag, Residual, OP_READ_SECURE, OP_WRITE_VEC, WRITE_ACK,
};

/// One party of the two-party protocol.
///
/// The share store is guarded by a lock because every user connection is
/// handled by its own task. The inbound residual listener is a lock too:
/// whichever session expects a message next accepts the next connection,
/// and header validation rejects anything that was not meant for it.
pub struct Party<S> {
    role: Role,
    rows: u32,
    peer_addr: String,
    store: Mutex<ShareStore>,
    inbound: tokio::sync::Mutex<TcpListener>,
    sids: SidGenerator,
    triples: S,
}

impl<S> Party<S>
where
    S: TripleSource + 'static,
{
    pub fn new(
        role: Role,
        rows: u32,
        peer_addr: impl Into<String>,
        triples: S,
        inbound: TcpListener,
    ) -> Self {
        Self {
            role,
            rows,
            peer_addr: peer_addr.into(),
            store: Mutex::new(ShareStore::new(rows as usize)),
            inbound: tokio::sync::Mutex::new(inbound),
            sids: SidGenerator::new(),
            triples,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Accept coordinator connections forever, one task per request.
    /// Request failures are logged and close that request's sockets; the
    /// loop keeps serving.
    pub async fn serve(self: Arc<Self>, users: TcpListener) -> io::Result<()> {
        info!(
            role = self.role.as_str(),
            rows = self.rows,
            addr = %users.local_addr()?,
            "party serving"
        );
        loop {
            let (sock, addr) = users.accept().await?;
            let party = self.clone();
            tokio::spawn(async move {
                if let Err(err) = party.handle_user(sock).await {
                    warn!(%err, %addr, "request aborted");
                }
            });
        }
    }

    async fn handle_user(&self, mut sock: TcpStream) -> Result<(), Error> {
        match sock.read_u8().await? {
            OP_WRITE_VEC => self.handle_write(&mut sock).await,
            OP_READ_SECURE => self.handle_read(&mut sock).await,
            other => Err(Error::UnexpectedOpcode(other)),
        }
    }

    async fn handle_write(&self, sock: &mut TcpStream) -> Result<(), Error> {
        let dim = self.negotiated_dim(sock).await?;
        let delta = wire::read_ring_vec(sock, dim).await?;
        self.store.lock().unwrap().oblivious_add(&delta)?;
        debug!(dim, "oblivious write applied");
        sock.write_all(WRITE_ACK).await?;
        sock.flush().await?;
        Ok(())
    }

    async fn handle_read(&self, sock: &mut TcpStream) -> Result<(), Error> {
        let dim = self.negotiated_dim(sock).await?;
        let basis_share = wire::read_ring_vec(sock, dim).await?;
        let share = self.run_read(basis_share).await?;
        wire::write_ring(sock, share).await?;
        sock.flush().await?;
        Ok(())
    }

    /// The dimension of every request must match the configured store
    /// size; checked before any payload is consumed.
    async fn negotiated_dim(&self, sock: &mut TcpStream) -> Result<u32, Error> {
        let dim = sock.read_u32().await?;
        if dim == 0 {
            return Err(Error::ZeroDim);
        }
        if dim != self.rows {
            return Err(Error::DimMismatch {
                expected: self.rows,
                found: dim,
            });
        }
        Ok(dim)
    }

    /// One secure read: fresh triple, store snapshot, two strictly ordered
    /// residual exchanges, reconstruction.
    async fn run_read(&self, basis_share: Vec<Ring31>) -> Result<Ring31, Error> {
        let triple = self.triples.fetch(self.rows).await?;
        let triple_id = triple.id;
        let snapshot = self.store.lock().unwrap().snapshot();
        let sid = self.sids.next(self.rows);
        let mut session = ReadSession::new(self.role, sid, snapshot, basis_share, triple)?;
        debug!(sid, triple = triple_id, "read session started");

        for tag in [ExchangeTag::Forward, ExchangeTag::Reverse] {
            if self.role.sends_first(tag) {
                self.send_residual(&session.outbound(tag)).await?;
                let inbound = self.recv_residual().await?;
                session.absorb(tag, &inbound)?;
            } else {
                let inbound = self.recv_residual().await?;
                session.absorb(tag, &inbound)?;
                self.send_residual(&session.outbound(tag)).await?;
            }
        }

        let share = session.output_share()?;
        debug!(sid, "read session complete");
        Ok(share)
    }

    /// One connection per outbound residual; closed after the write.
    async fn send_residual(&self, residual: &Residual) -> Result<(), Error> {
        let mut sock = TcpStream::connect(&self.peer_addr).await?;
        residual.write_to(&mut sock).await?;
        Ok(())
    }

    /// Accept the next inbound residual connection in arrival order.
    async fn recv_residual(&self) -> Result<Residual, Error> {
        let mut sock = {
            let listener = self.inbound.lock().await;
            let (sock, _) = listener.accept().await?;
            sock
        };
        Residual::read_from(&mut sock).await
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::ring::{add_vectors, dot, random_vector};
    use crate::triple;

    async fn spawn_party_pair(
        rows: u32,
        triples: usize,
    ) -> (String, String) {
        let mut rng = StdRng::seed_from_u64(21);
        let (src_a, src_b) = triple::preshared_pair(rows, triples, &mut rng);

        let user_a = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let user_b = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let res_a = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let res_b = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let user_a_addr = user_a.local_addr().unwrap().to_string();
        let user_b_addr = user_b.local_addr().unwrap().to_string();
        let res_a_addr = res_a.local_addr().unwrap().to_string();
        let res_b_addr = res_b.local_addr().unwrap().to_string();

        let party_a = Arc::new(Party::new(Role::A, rows, res_b_addr, src_a, res_a));
        let party_b = Arc::new(Party::new(Role::B, rows, res_a_addr, src_b, res_b));
        tokio::spawn(party_a.serve(user_a));
        tokio::spawn(party_b.serve(user_b));
        (user_a_addr, user_b_addr)
    }

    async fn write_share(addr: &str, share: &[Ring31]) {
        let mut sock = TcpStream::connect(addr).await.unwrap();
        sock.write_u8(OP_WRITE_VEC).await.unwrap();
        sock.write_u32(share.len() as u32).await.unwrap();
        wire::write_ring_vec(&mut sock, share).await.unwrap();
        let mut ack = [0u8; 2];
        sock.read_exact(&mut ack).await.unwrap();
        assert_eq!(&ack, WRITE_ACK);
    }

    async fn read_share(addr: &str, e_share: &[Ring31]) -> Ring31 {
        let mut sock = TcpStream::connect(addr).await.unwrap();
        sock.write_u8(OP_READ_SECURE).await.unwrap();
        sock.write_u32(e_share.len() as u32).await.unwrap();
        wire::write_ring_vec(&mut sock, e_share).await.unwrap();
        Ring31::new(sock.read_u32().await.unwrap())
    }

    #[tokio::test]
    async fn secure_read_over_sockets() {
        let rows = 4u32;
        let (addr_a, addr_b) = spawn_party_pair(rows, 2).await;

        let mut rng = StdRng::seed_from_u64(22);
        let store_a = random_vector(rows as usize, &mut rng);
        let store_b = random_vector(rows as usize, &mut rng);
        write_share(&addr_a, &store_a).await;
        write_share(&addr_b, &store_b).await;

        let e_a = random_vector(rows as usize, &mut rng);
        let e_b = random_vector(rows as usize, &mut rng);
        let (s_a, s_b) = tokio::join!(read_share(&addr_a, &e_a), read_share(&addr_b, &e_b));

        let logical = add_vectors(&store_a, &store_b).unwrap();
        let basis = add_vectors(&e_a, &e_b).unwrap();
        assert_eq!(s_a + s_b, dot(&logical, &basis).unwrap());
    }

    #[tokio::test]
    async fn unknown_opcode_closes_connection() {
        let (addr_a, _) = spawn_party_pair(2, 0).await;
        let mut sock = TcpStream::connect(&addr_a).await.unwrap();
        sock.write_u8(0x55).await.unwrap();
        sock.flush().await.unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(sock.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn write_with_wrong_dimension_is_rejected() {
        let (addr_a, _) = spawn_party_pair(3, 0).await;
        let mut sock = TcpStream::connect(&addr_a).await.unwrap();
        sock.write_u8(OP_WRITE_VEC).await.unwrap();
        sock.write_u32(5).await.unwrap();
        sock.flush().await.unwrap();
        let mut buf = [0u8; 2];
        assert_eq!(sock.read(&mut buf).await.unwrap(), 0);
    }
}
