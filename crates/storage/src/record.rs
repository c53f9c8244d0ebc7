//! Codec do log append-only.
//!
//! Cada registro é 1 byte de opcode seguido do payload. Inteiros são u64
//! little-endian; strings são prefixadas pelo tamanho (u64) e seguidas
//! dos bytes crus. Não há terminador, checksum nem versionamento: o
//! arquivo é a concatenação crua dos registros, e um opcode desconhecido
//! é erro fatal de decodificação.

use std::io::{self, Read};
use std::time::Duration;

use bytes::Bytes;

use tidedb_common::AofError;

pub const OP_SET: u8 = 1;
pub const OP_REMOVE: u8 = 2;
pub const OP_TTL: u8 = 3;
pub const OP_LIST_PUSH: u8 = 4;
pub const OP_LIST_POP: u8 = 5;
pub const OP_HASH_DEL: u8 = 6;
pub const OP_HASH_SET: u8 = 7;

/// Uma mutação registrada no log. `ttl == 0` codifica "sem TTL".
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Set {
        key: String,
        ttl: Duration,
        value: Bytes,
    },
    Remove {
        key: String,
    },
    Ttl {
        key: String,
        ttl: Duration,
    },
    ListPush {
        key: String,
        values: Vec<Bytes>,
    },
    ListPop {
        key: String,
    },
    HashDel {
        key: String,
        field: String,
    },
    HashSet {
        key: String,
        pairs: Vec<(String, Bytes)>,
    },
}

impl Record {
    /// Codifica o registro no fim do buffer.
    pub fn encode(&self, dst: &mut Vec<u8>) {
        match self {
            Record::Set { key, ttl, value } => {
                dst.push(OP_SET);
                put_str(dst, key.as_bytes());
                put_u64(dst, ttl.as_secs());
                put_str(dst, value);
            }
            Record::Remove { key } => {
                dst.push(OP_REMOVE);
                put_str(dst, key.as_bytes());
            }
            Record::Ttl { key, ttl } => {
                dst.push(OP_TTL);
                put_str(dst, key.as_bytes());
                put_u64(dst, ttl.as_secs());
            }
            Record::ListPush { key, values } => {
                dst.push(OP_LIST_PUSH);
                put_str(dst, key.as_bytes());
                put_u64(dst, values.len() as u64);
                for v in values {
                    put_str(dst, v);
                }
            }
            Record::ListPop { key } => {
                dst.push(OP_LIST_POP);
                put_str(dst, key.as_bytes());
            }
            Record::HashDel { key, field } => {
                dst.push(OP_HASH_DEL);
                put_str(dst, key.as_bytes());
                put_str(dst, field.as_bytes());
            }
            Record::HashSet { key, pairs } => {
                dst.push(OP_HASH_SET);
                put_str(dst, key.as_bytes());
                // n é o total de strings achatadas (sempre par)
                put_u64(dst, (pairs.len() * 2) as u64);
                for (field, value) in pairs {
                    put_str(dst, field.as_bytes());
                    put_str(dst, value);
                }
            }
        }
    }

    /// Decodifica o próximo registro. `Ok(None)` num fim de arquivo
    /// limpo, exatamente na fronteira de um opcode; EOF no meio de um
    /// registro sobe como `io::ErrorKind::UnexpectedEof` para o replay
    /// decidir.
    pub fn decode<R: Read>(src: &mut R) -> Result<Option<Record>, AofError> {
        let mut op = [0u8; 1];
        match src.read_exact(&mut op) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let rec = match op[0] {
            OP_SET => {
                let key = read_string(src)?;
                let ttl = Duration::from_secs(read_u64(src)?);
                let value = read_bytes(src)?;
                Record::Set { key, ttl, value }
            }
            OP_REMOVE => Record::Remove {
                key: read_string(src)?,
            },
            OP_TTL => {
                let key = read_string(src)?;
                let ttl = Duration::from_secs(read_u64(src)?);
                Record::Ttl { key, ttl }
            }
            OP_LIST_PUSH => {
                let key = read_string(src)?;
                let n = read_u64(src)?;
                let mut values = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    values.push(read_bytes(src)?);
                }
                Record::ListPush { key, values }
            }
            OP_LIST_POP => Record::ListPop {
                key: read_string(src)?,
            },
            OP_HASH_DEL => {
                let key = read_string(src)?;
                let field = read_string(src)?;
                Record::HashDel { key, field }
            }
            OP_HASH_SET => {
                let key = read_string(src)?;
                let n = read_u64(src)?;
                let mut pairs = Vec::with_capacity((n / 2) as usize);
                for _ in 0..n / 2 {
                    let field = read_string(src)?;
                    let value = read_bytes(src)?;
                    pairs.push((field, value));
                }
                Record::HashSet { key, pairs }
            }
            other => return Err(AofError::UnknownOpcode(other)),
        };

        Ok(Some(rec))
    }
}

fn put_u64(dst: &mut Vec<u8>, n: u64) {
    dst.extend_from_slice(&n.to_le_bytes());
}

fn put_str(dst: &mut Vec<u8>, bytes: &[u8]) {
    put_u64(dst, bytes.len() as u64);
    dst.extend_from_slice(bytes);
}

fn read_u64<R: Read>(src: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    src.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_bytes<R: Read>(src: &mut R) -> io::Result<Bytes> {
    let len = read_u64(src)? as usize;
    let mut buf = vec![0u8; len];
    src.read_exact(&mut buf)?;
    Ok(Bytes::from(buf))
}

fn read_string<R: Read>(src: &mut R) -> Result<String, AofError> {
    let bytes = read_bytes(src)?;
    Ok(String::from_utf8(bytes.to_vec())?)
}
