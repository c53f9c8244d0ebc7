use tokio::sync::broadcast;
use tracing::debug;

use tidedb_common::{ConnectionError, StorageError};
use tidedb_protocol::{Command, Frame};
use tidedb_storage::Store;

use crate::Connection;

/// Loop de tratamento de uma conexão: lê frames, despacha no store,
/// responde. Todo erro do engine vira um erro RESP cujo corpo é a
/// mensagem canônica.
pub async fn handle_connection(
    mut conn: Connection,
    store: Store,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<(), ConnectionError> {
    loop {
        let frame = tokio::select! {
            result = conn.read_frame() => result?,
            _ = shutdown.recv() => return Ok(()),
        };

        let frame = match frame {
            Some(f) => f,
            None => return Ok(()), // EOF
        };

        let cmd = match Command::from_frame(frame) {
            Ok(cmd) => cmd,
            Err(e) => {
                conn.write_frame(&Frame::Error(e.to_string())).await?;
                continue;
            }
        };

        debug!("comando recebido: {cmd:?}");
        let reply = execute(&cmd, &store);
        conn.write_frame(&reply).await?;
    }
}

/// Executa um comando contra o store e monta o frame de resposta.
pub fn execute(cmd: &Command, store: &Store) -> Frame {
    match cmd {
        Command::Ping => Frame::Simple("PONG".into()),
        Command::Get(key) => match store.get(key) {
            Ok(value) => Frame::Bulk(value),
            Err(e) => err(e),
        },
        Command::Set { key, value, ttl } => ok_or(store.set(key, value.clone(), *ttl)),
        Command::Del(key) => ok_or(store.remove(key)),
        Command::Ttl { key, ttl } => ok_or(store.ttl(key, *ttl)),
        Command::LPush { key, values } => int_or(store.list_push(key, values.clone())),
        Command::LPop(key) => int_or(store.list_pop(key)),
        Command::LLen(key) => int_or(store.list_len(key)),
        Command::LIndex { key, index } => match store.list_index(key, *index) {
            Ok(value) => Frame::Bulk(value),
            Err(e) => err(e),
        },
        Command::LRange { key, from, to } => match store.list_range(key, *from, *to) {
            Ok(items) => Frame::Array(items.into_iter().map(Frame::Bulk).collect()),
            Err(e) => err(e),
        },
        Command::HSet { key, args } => ok_or(store.hash_set(key, args)),
        Command::HGet { key, field } => match store.hash_get(key, field) {
            Ok(value) => Frame::Bulk(value),
            Err(e) => err(e),
        },
        Command::HGetAll(key) => match store.hash_get_all(key) {
            Ok(map) => {
                // Pares achatados campo, valor (convenção Redis).
                let mut items = Vec::with_capacity(map.len() * 2);
                for (field, value) in map {
                    items.push(Frame::bulk(&field));
                    items.push(Frame::Bulk(value));
                }
                Frame::Array(items)
            }
            Err(e) => err(e),
        },
        Command::HKeys(key) => match store.hash_keys(key) {
            Ok(fields) => Frame::Array(fields.iter().map(|f| Frame::bulk(f)).collect()),
            Err(e) => err(e),
        },
        Command::HDel { key, field } => ok_or(store.hash_del(key, field)),
    }
}

fn err(e: StorageError) -> Frame {
    Frame::Error(e.to_string())
}

fn ok_or(res: Result<(), StorageError>) -> Frame {
    match res {
        Ok(()) => Frame::Simple("OK".into()),
        Err(e) => err(e),
    }
}

fn int_or(res: Result<usize, StorageError>) -> Frame {
    match res {
        Ok(n) => Frame::Integer(n as i64),
        Err(e) => err(e),
    }
}
