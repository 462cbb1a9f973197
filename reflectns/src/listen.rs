//! C9: the UDP/TCP listener tasks, grounded on `bin-resolved/src/main.rs`'s
//! `listen_tcp_task`/`listen_udp_task` shape (metrics calls stripped, see
//! DESIGN.md).

use std::net::SocketAddr;
use std::sync::Arc;

use dns_core::resolver;
use dns_core::store::RecordStore;
use dns_core::upstream::UpstreamResolver;
use dns_types::protocol::types::{Message, Opcode, Rcode};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::RwLock;

use crate::net_util::{read_tcp_bytes, send_tcp_bytes, send_udp_bytes_to};

/// Shared, read-mostly state every connection handler needs.
pub struct Shared<U> {
    pub store: RwLock<RecordStore>,
    pub default_ttl: u32,
    pub upstream: U,
}

async fn resolve_and_compose<U: UpstreamResolver>(shared: &Shared<U>, query: Message) -> Message {
    let store = shared.store.read().await;
    let response = query.make_response();

    let mut per_question = Vec::with_capacity(query.questions.len());
    for question in &query.questions {
        if question.is_unknown() {
            per_question.push(resolver::Resolved {
                records: Vec::new(),
                owner: String::new(),
            });
            continue;
        }
        let resolved = resolver::resolve(
            &question.name,
            question.qtype,
            &store,
            shared.default_ttl,
            &shared.upstream,
        )
        .await;
        per_question.push(resolved);
    }

    dns_core::compose::compose(response, per_question, &store, shared.default_ttl)
}

async fn handle_raw_message<U: UpstreamResolver>(shared: &Shared<U>, buf: &[u8]) -> Option<Message> {
    match Message::from_octets(buf) {
        Ok(msg) if msg.header.is_response => {
            Some(Message::make_format_error_response(msg.header.id))
        }
        Ok(msg) if msg.header.opcode == Opcode::Standard => {
            Some(resolve_and_compose(shared, msg).await)
        }
        Ok(msg) => {
            let mut response = msg.make_response();
            response.header.rcode = Rcode::NotImplemented;
            Some(response)
        }
        Err(error) => {
            tracing::debug!(?error, "malformed datagram");
            error.id().map(Message::make_format_error_response)
        }
    }
}

pub async fn listen_tcp_task<U>(shared: Arc<Shared<U>>, listener: TcpListener)
where
    U: UpstreamResolver + Send + Sync + 'static,
{
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tracing::info!(?peer, "TCP request");
                let shared = shared.clone();
                tokio::spawn(handle_tcp_connection(shared, stream, peer));
            }
            Err(error) => tracing::debug!(?error, "TCP accept error"),
        }
    }
}

async fn handle_tcp_connection<U: UpstreamResolver>(
    shared: Arc<Shared<U>>,
    mut stream: TcpStream,
    peer: SocketAddr,
) {
    let response = match read_tcp_bytes(&mut stream).await {
        Ok(bytes) => handle_raw_message(&shared, bytes.as_ref()).await,
        Err(error) => {
            tracing::debug!(?peer, ?error, "TCP read error");
            error.id().map(Message::make_format_error_response)
        }
    };

    if let Some(message) = response {
        match message.clone().to_octets() {
            Ok(mut serialised) => {
                if let Err(error) = send_tcp_bytes(&mut stream, &mut serialised).await {
                    tracing::debug!(?peer, ?error, "TCP send error");
                }
            }
            Err(error) => {
                tracing::warn!(?peer, ?message, ?error, "could not serialise message");
            }
        }
    }
}

pub async fn listen_udp_task<U>(shared: Arc<Shared<U>>, socket: UdpSocket)
where
    U: UpstreamResolver + Send + Sync + 'static,
{
    let socket = Arc::new(socket);
    let mut buf = vec![0u8; 512];

    loop {
        let (size, peer) = match socket.recv_from(&mut buf).await {
            Ok(ok) => ok,
            Err(error) => {
                tracing::debug!(?error, "UDP recv error");
                continue;
            }
        };
        tracing::info!(?peer, "UDP request");
        let datagram = buf[..size].to_vec();
        let shared = shared.clone();
        let socket = socket.clone();
        tokio::spawn(async move {
            if let Some(response) = handle_raw_message(&shared, &datagram).await {
                match response.clone().to_octets() {
                    Ok(mut serialised) => {
                        if let Err(error) = send_udp_bytes_to(&socket, peer, &mut serialised).await
                        {
                            tracing::debug!(?peer, ?error, "UDP send error");
                        }
                    }
                    Err(error) => {
                        tracing::warn!(?peer, ?response, ?error, "could not serialise message");
                    }
                }
            }
        });
    }
}
