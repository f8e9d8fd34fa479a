//! Command Codec
//!
//! One whitespace-separated command per datagram:
//!
//! ```text
//! register <peer> <ipv4> <mgmt-port> <data-port>
//! setup-dht <leader> <n> <year>
//! join-dht <peer>
//! leave-dht <peer>
//! teardown-dht <leader>
//! deregister <peer>
//! query-dht <peer> <event-id>
//! ```

use ringmesh_core::PeerAddress;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register { name: String, address: PeerAddress },
    SetupDht { leader: String, size: usize, year: String },
    JoinDht { peer: String },
    LeaveDht { peer: String },
    TeardownDht { leader: String },
    Deregister { peer: String },
    QueryDht { peer: String, event_id: String },
}

impl Command {
    /// Wire keyword, also used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Register { .. } => "register",
            Command::SetupDht { .. } => "setup-dht",
            Command::JoinDht { .. } => "join-dht",
            Command::LeaveDht { .. } => "leave-dht",
            Command::TeardownDht { .. } => "teardown-dht",
            Command::Deregister { .. } => "deregister",
            Command::QueryDht { .. } => "query-dht",
        }
    }

    /// Name of the registered peer the command speaks for.
    pub fn sender(&self) -> &str {
        match self {
            Command::Register { name, .. } => name,
            Command::SetupDht { leader, .. } | Command::TeardownDht { leader } => leader,
            Command::JoinDht { peer }
            | Command::LeaveDht { peer }
            | Command::Deregister { peer }
            | Command::QueryDht { peer, .. } => peer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unrecognized command '{0}'")]
    Unrecognized(String),
    #[error("'{command}' expects {expected} arguments, got {got}")]
    Arity {
        command: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("invalid {field} '{value}'")]
    InvalidArgument { field: &'static str, value: String },
}

impl CommandError {
    /// Unrecognized input is only logged; everything else is answered.
    pub fn is_unrecognized(&self) -> bool {
        matches!(self, CommandError::Empty | CommandError::Unrecognized(_))
    }
}

fn expect_args<'a>(
    command: &'static str,
    args: &'a [&'a str],
    expected: usize,
) -> Result<&'a [&'a str], CommandError> {
    if args.len() != expected {
        return Err(CommandError::Arity {
            command,
            expected,
            got: args.len(),
        });
    }
    Ok(args)
}

fn parse_field<T: FromStr>(field: &'static str, value: &str) -> Result<T, CommandError> {
    value.parse().map_err(|_| CommandError::InvalidArgument {
        field,
        value: value.to_string(),
    })
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split_whitespace();
        let keyword = tokens.next().ok_or(CommandError::Empty)?;
        let args: Vec<&str> = tokens.collect();

        let command = match keyword {
            "register" => {
                let args = expect_args("register", &args, 4)?;
                let ip: Ipv4Addr = parse_field("ipv4 address", args[1])?;
                Command::Register {
                    name: args[0].to_string(),
                    address: PeerAddress::new(
                        ip,
                        parse_field("management port", args[2])?,
                        parse_field("data port", args[3])?,
                    ),
                }
            }
            "setup-dht" => {
                let args = expect_args("setup-dht", &args, 3)?;
                Command::SetupDht {
                    leader: args[0].to_string(),
                    size: parse_field("ring size", args[1])?,
                    year: args[2].to_string(),
                }
            }
            "join-dht" => Command::JoinDht {
                peer: expect_args("join-dht", &args, 1)?[0].to_string(),
            },
            "leave-dht" => Command::LeaveDht {
                peer: expect_args("leave-dht", &args, 1)?[0].to_string(),
            },
            "teardown-dht" => Command::TeardownDht {
                leader: expect_args("teardown-dht", &args, 1)?[0].to_string(),
            },
            "deregister" => Command::Deregister {
                peer: expect_args("deregister", &args, 1)?[0].to_string(),
            },
            "query-dht" => {
                let args = expect_args("query-dht", &args, 2)?;
                Command::QueryDht {
                    peer: args[0].to_string(),
                    event_id: args[1].to_string(),
                }
            }
            other => return Err(CommandError::Unrecognized(other.to_string())),
        };
        Ok(command)
    }
}

/// Reply sent back to the command's sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Success,
    Failure,
    /// Failure with an explanation, used where the caller needs one
    FailureWithReason(String),
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Success => f.write_str("SUCCESS"),
            Response::Failure => f.write_str("FAILURE"),
            Response::FailureWithReason(reason) => write!(f, "FAILURE: {reason}"),
        }
    }
}
