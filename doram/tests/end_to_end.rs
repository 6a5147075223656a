//! Full-system tests: in-process dealer and both parties on ephemeral
//! ports, driven through the coordinator client.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use doram::coordinator::CoordinatorClient;
use doram::pairing;
use doram::party::Party;
use doram::ring::Ring31;
use doram::session::Role;
use doram::triple::DealerClient;
use doram::wire::{self, OP_READ_SECURE, OP_WRITE_VEC, WRITE_ACK};

struct System {
    client: CoordinatorClient,
    user_a: String,
    user_b: String,
}

async fn spawn_system(rows: u32) -> System {
    let dealer_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dealer_addr = dealer_listener.local_addr().unwrap().to_string();
    tokio::spawn(pairing::serve(dealer_listener));

    let user_a = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let user_b = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let res_a = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let res_b = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let user_a_addr = user_a.local_addr().unwrap().to_string();
    let user_b_addr = user_b.local_addr().unwrap().to_string();
    let res_a_addr = res_a.local_addr().unwrap().to_string();
    let res_b_addr = res_b.local_addr().unwrap().to_string();

    let party_a = Arc::new(Party::new(
        Role::A,
        rows,
        res_b_addr,
        DealerClient::new(dealer_addr.clone()),
        res_a,
    ));
    let party_b = Arc::new(Party::new(
        Role::B,
        rows,
        res_a_addr,
        DealerClient::new(dealer_addr),
        res_b,
    ));
    tokio::spawn(party_a.serve(user_a));
    tokio::spawn(party_b.serve(user_b));

    System {
        client: CoordinatorClient::new(user_a_addr.clone(), user_b_addr.clone()),
        user_a: user_a_addr,
        user_b: user_b_addr,
    }
}

/// Raw user-port write, used to install exact share vectors on one party.
async fn install_shares(addr: &str, shares: &[Ring31]) {
    let mut sock = TcpStream::connect(addr).await.unwrap();
    sock.write_u8(OP_WRITE_VEC).await.unwrap();
    sock.write_u32(shares.len() as u32).await.unwrap();
    wire::write_ring_vec(&mut sock, shares).await.unwrap();
    let mut ack = [0u8; 2];
    sock.read_exact(&mut ack).await.unwrap();
    assert_eq!(&ack, WRITE_ACK);
}

#[tokio::test]
async fn write_then_read_round_trip() {
    let sys = spawn_system(4).await;
    sys.client.write(4, 2, Ring31::new(7)).await.unwrap();
    assert_eq!(sys.client.read(4, 2).await.unwrap(), Ring31::new(7));
    assert_eq!(sys.client.read(4, 0).await.unwrap(), Ring31::new(0));
}

#[tokio::test]
async fn read_reconstructs_preinstalled_shares() {
    let sys = spawn_system(8).await;
    let shares_a: Vec<Ring31> = [1u32, 2, 3, 4, 5, 6, 7, 8]
        .into_iter()
        .map(Ring31::new)
        .collect();
    let shares_b: Vec<Ring31> = [9u32, 8, 7, 6, 5, 4, 3, 2]
        .into_iter()
        .map(Ring31::new)
        .collect();
    install_shares(&sys.user_a, &shares_a).await;
    install_shares(&sys.user_b, &shares_b).await;
    assert_eq!(sys.client.read(8, 5).await.unwrap(), Ring31::new(10));
}

#[tokio::test]
async fn additions_wrap_around_the_modulus() {
    let sys = spawn_system(3).await;
    sys.client.write(3, 0, Ring31::new(Ring31::MASK)).await.unwrap();
    sys.client.write(3, 0, Ring31::new(1)).await.unwrap();
    assert_eq!(sys.client.read(3, 0).await.unwrap(), Ring31::new(0));
}

#[tokio::test]
async fn opposite_writes_cancel() {
    let sys = spawn_system(5).await;
    let v = Ring31::new(12345);
    sys.client.write(5, 3, v).await.unwrap();
    sys.client.write(5, 3, -v).await.unwrap();
    for idx in 0..5 {
        assert_eq!(sys.client.read(5, idx).await.unwrap(), Ring31::new(0));
    }
}

#[tokio::test]
async fn zero_write_is_a_no_op() {
    let sys = spawn_system(3).await;
    sys.client.write(3, 1, Ring31::new(9)).await.unwrap();
    sys.client.write(3, 1, Ring31::new(0)).await.unwrap();
    assert_eq!(sys.client.read(3, 1).await.unwrap(), Ring31::new(9));
}

#[tokio::test]
async fn set_overwrites_previous_value() {
    let sys = spawn_system(4).await;
    sys.client.write(4, 1, Ring31::new(100)).await.unwrap();
    sys.client.set(4, 1, Ring31::new(42)).await.unwrap();
    assert_eq!(sys.client.read(4, 1).await.unwrap(), Ring31::new(42));
}

#[tokio::test]
async fn mismatched_dimension_is_rejected_and_state_kept() {
    let sys = spawn_system(4).await;
    sys.client.write(4, 2, Ring31::new(5)).await.unwrap();

    // A read announcing the wrong dimension is cut off before any
    // protocol work happens.
    let mut sock = TcpStream::connect(&sys.user_a).await.unwrap();
    sock.write_u8(OP_READ_SECURE).await.unwrap();
    sock.write_u32(5).await.unwrap();
    sock.flush().await.unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(sock.read(&mut buf).await.unwrap(), 0);

    // The store is untouched.
    assert_eq!(sys.client.read(4, 2).await.unwrap(), Ring31::new(5));
}

#[tokio::test]
async fn coordinator_surfaces_aborted_reads() {
    let sys = spawn_system(2).await;
    let err = sys.client.read(5, 0).await.unwrap_err();
    assert!(matches!(err, doram::Error::Io(_)));
}
