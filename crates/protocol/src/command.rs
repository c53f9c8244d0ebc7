use std::time::Duration;

use bytes::Bytes;

use tidedb_common::CommandError;

use crate::{Frame, Parse};

/// Comandos aceitos pelo servidor.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ping,
    Get(String),
    Set {
        key: String,
        value: Bytes,
        /// TTL em segundos, opcional no fim do comando.
        ttl: Option<Duration>,
    },
    Del(String),
    Ttl {
        key: String,
        ttl: Duration,
    },
    LPush {
        key: String,
        values: Vec<Bytes>,
    },
    LPop(String),
    LLen(String),
    LIndex {
        key: String,
        index: i64,
    },
    LRange {
        key: String,
        from: i64,
        to: i64,
    },
    HSet {
        key: String,
        /// Campos e valores alternados, crus; a validação de paridade é
        /// do engine.
        args: Vec<Bytes>,
    },
    HGet {
        key: String,
        field: String,
    },
    HGetAll(String),
    HKeys(String),
    HDel {
        key: String,
        field: String,
    },
}

impl Command {
    /// Interpreta um frame como comando.
    pub fn from_frame(frame: Frame) -> Result<Command, CommandError> {
        let mut parse = Parse::new(frame)?;
        let name = parse.next_string()?.to_uppercase();

        let cmd = match name.as_str() {
            "PING" => {
                parse.finish()?;
                Command::Ping
            }
            "GET" => {
                let key = parse.next_string()?;
                parse.finish()?;
                Command::Get(key)
            }
            "SET" => {
                let key = parse.next_string()?;
                let value = parse.next_bytes()?;
                let ttl = if parse.has_remaining() {
                    Some(next_ttl(&mut parse)?)
                } else {
                    None
                };
                parse.finish()?;
                Command::Set { key, value, ttl }
            }
            "DEL" => {
                let key = parse.next_string()?;
                parse.finish()?;
                Command::Del(key)
            }
            "TTL" => {
                let key = parse.next_string()?;
                let ttl = next_ttl(&mut parse)?;
                parse.finish()?;
                Command::Ttl { key, ttl }
            }
            "LPUSH" => {
                let key = parse.next_string()?;
                if !parse.has_remaining() {
                    return Err(CommandError::WrongArgNum);
                }
                let mut values = Vec::new();
                while parse.has_remaining() {
                    values.push(parse.next_bytes()?);
                }
                Command::LPush { key, values }
            }
            "LPOP" => {
                let key = parse.next_string()?;
                parse.finish()?;
                Command::LPop(key)
            }
            "LLEN" => {
                let key = parse.next_string()?;
                parse.finish()?;
                Command::LLen(key)
            }
            "LINDEX" => {
                let key = parse.next_string()?;
                let index = parse.next_int()?;
                parse.finish()?;
                Command::LIndex { key, index }
            }
            "LRANGE" => {
                let key = parse.next_string()?;
                let from = parse.next_int()?;
                let to = parse.next_int()?;
                parse.finish()?;
                Command::LRange { key, from, to }
            }
            "HSET" => {
                let key = parse.next_string()?;
                if !parse.has_remaining() {
                    return Err(CommandError::WrongArgNum);
                }
                let mut args = Vec::new();
                while parse.has_remaining() {
                    args.push(parse.next_bytes()?);
                }
                Command::HSet { key, args }
            }
            "HGET" => {
                let key = parse.next_string()?;
                let field = parse.next_string()?;
                parse.finish()?;
                Command::HGet { key, field }
            }
            "HGETALL" => {
                let key = parse.next_string()?;
                parse.finish()?;
                Command::HGetAll(key)
            }
            "HKEYS" => {
                let key = parse.next_string()?;
                parse.finish()?;
                Command::HKeys(key)
            }
            "HDEL" => {
                let key = parse.next_string()?;
                let field = parse.next_string()?;
                parse.finish()?;
                Command::HDel { key, field }
            }
            _ => return Err(CommandError::UnknownCommand(name)),
        };

        Ok(cmd)
    }
}

/// TTL em segundos; qualquer coisa que não seja um inteiro >= 0 é erro.
fn next_ttl(parse: &mut Parse) -> Result<Duration, CommandError> {
    let s = parse.next_string()?;
    let secs = s.parse::<u64>().map_err(|_| CommandError::WrongTtl)?;
    Ok(Duration::from_secs(secs))
}
