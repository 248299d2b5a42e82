//! Command line interface for the `udpfrag` binary.
//!
//! Shared with `build.rs`, which renders the man page, so it depends only on
//! `clap` and the standard library.

use std::net::SocketAddr;

use clap::{Parser, Subcommand};

/// Command line arguments for the `udpfrag` binary.
#[derive(Debug, Parser)]
#[command(
    name = "udpfrag",
    version,
    about = "Send and receive fragmented UDP messages"
)]
pub struct Cli {
    /// Operation to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands understood by the binary.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print every reassembled message received on a port.
    Listen {
        /// UDP port to bind.
        #[arg(short, long, default_value_t = 44_302)]
        port: u16,
        /// 64-character hex secret shared with senders.
        #[arg(short, long)]
        secret: Option<String>,
    },
    /// Send one text message.
    Send {
        /// Destination address, for example `127.0.0.1:44302`.
        addr: SocketAddr,
        /// Message text.
        text: String,
        /// Maximum datagram size in bytes.
        #[arg(long, default_value_t = 1280)]
        packet_size: usize,
        /// 64-character hex secret shared with the listener.
        #[arg(short, long)]
        secret: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn parses_listen_defaults() {
        let cli = Cli::parse_from(["udpfrag", "listen"]);
        assert!(matches!(
            cli.command,
            Command::Listen {
                port: 44_302,
                secret: None
            }
        ));
    }

    #[test]
    fn parses_send_arguments() {
        let cli = Cli::parse_from([
            "udpfrag",
            "send",
            "127.0.0.1:9000",
            "hello",
            "--packet-size",
            "300",
        ]);
        let Command::Send {
            addr,
            text,
            packet_size,
            secret,
        } = cli.command
        else {
            panic!("expected send command");
        };
        assert_eq!(addr.port(), 9000);
        assert_eq!(text, "hello");
        assert_eq!(packet_size, 300);
        assert!(secret.is_none());
    }

    #[test]
    fn rejects_invalid_address() {
        assert!(Cli::try_parse_from(["udpfrag", "send", "not-an-addr", "hi"]).is_err());
    }
}
