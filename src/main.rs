//! Minimal binary demonstrating `udpfrag` usage.
//!
//! `listen` prints reassembled messages; `send` delivers one message.

mod cli;

use std::net::{Ipv4Addr, SocketAddr};

use clap::Parser;
use cli::{Cli, Command};
use udpfrag::{Encryption, ReceiverConfig, SenderConfig, UdpReceiver, UdpSender};

fn encryption(secret: Option<&str>) -> udpfrag::Result<Encryption> {
    Ok(secret
        .map(Encryption::from_hex_secret)
        .transpose()?
        .unwrap_or_default())
}

async fn listen(port: u16, secret: Option<&str>) -> udpfrag::Result<()> {
    let config = ReceiverConfig::default().with_decryption(encryption(secret)?);
    let mut receiver = UdpReceiver::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)), config).await?;
    tracing::info!(addr = %receiver.local_addr()?, "listening");

    loop {
        tokio::select! {
            message = receiver.recv() => {
                let message = message?;
                let from = message
                    .head
                    .from
                    .map_or_else(|| "unknown".to_owned(), |addr| addr.to_string());
                println!(
                    "{from} ({} bytes): {}",
                    message.head.size,
                    String::from_utf8_lossy(&message.payload)
                );
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn send(
    addr: SocketAddr,
    text: &str,
    packet_size: usize,
    secret: Option<&str>,
) -> udpfrag::Result<()> {
    let config = SenderConfig::default()
        .with_packet_size(packet_size)
        .with_encryption(encryption(secret)?);
    let mut sender = UdpSender::connect(addr, config).await?;
    sender.send(text).await?;
    tracing::info!(%addr, bytes = text.len(), "message sent");
    Ok(())
}

#[tokio::main]
async fn main() -> udpfrag::Result<()> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    match Cli::parse().command {
        Command::Listen { port, secret } => listen(port, secret.as_deref()).await,
        Command::Send {
            addr,
            text,
            packet_size,
            secret,
        } => send(addr, &text, packet_size, secret.as_deref()).await,
    }
}
