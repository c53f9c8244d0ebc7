use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info, warn};

use tidedb_common::{AofError, StorageError};

use crate::aof::{self, AofWriter};
use crate::clock;
use crate::entry::{Entry, Expiry, Value};
use crate::record::Record;
use crate::shard::Keyspace;
use crate::ttl::{TtlIndex, TtlItem};

/// Opções consumidas em `Store::open`.
#[derive(Debug, Clone)]
pub struct Options {
    /// Número de shards do keyspace; 0 vira 1.
    pub shard_count: usize,
    /// TTL aplicado a escalares criados sem TTL explícito, se > 0.
    pub default_ttl: Duration,
    /// Reservado para dimensionamento de cluster; sem efeito em runtime.
    pub cluster_size: usize,
    /// Desliga o buffer do log: toda escrita vai direto ao arquivo.
    pub no_async: bool,
    /// Período de flush do buffer do log.
    pub sync_period: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            shard_count: 1,
            default_ttl: Duration::ZERO,
            cluster_size: 1,
            no_async: false,
            sync_period: Duration::from_secs(1),
        }
    }
}

struct Shared {
    keyspace: Keyspace,
    ttl: TtlIndex,
    aof: AofWriter,
    opts: Options,
    shutdown: watch::Sender<bool>,
}

/// Handle do store. Clone barato; todas as conexões compartilham o mesmo
/// estado.
#[derive(Clone)]
pub struct Store {
    shared: Arc<Shared>,
}

impl Store {
    /// Abre o store: abre/cria o log, faz o replay e sobe o reaper e o
    /// flusher. Precisa rodar dentro de um runtime tokio.
    pub fn open(path: impl AsRef<Path>, opts: Options) -> Result<Store, AofError> {
        let mut opts = opts;
        if opts.shard_count == 0 {
            opts.shard_count = 1;
        }
        if opts.cluster_size == 0 {
            opts.cluster_size = 1;
        }
        if opts.sync_period.is_zero() {
            opts.sync_period = Duration::from_secs(1);
        }

        let path = path.as_ref();
        let aof = AofWriter::open(path, opts.no_async)?;
        let (shutdown, _) = watch::channel(false);

        let store = Store {
            shared: Arc::new(Shared {
                keyspace: Keyspace::new(opts.shard_count),
                ttl: TtlIndex::default(),
                aof,
                opts,
                shutdown,
            }),
        };

        // Replay é mutação pura em memória: os mutators internos rodam
        // com o log desligado.
        let restored = aof::replay(path, |rec| store.apply(rec).map_err(AofError::Apply))?;
        if restored > 0 {
            info!("aol: {restored} registros restaurados de {}", path.display());
        }

        store.spawn_reaper();
        if !store.shared.opts.no_async {
            store.spawn_flusher();
        }

        Ok(store)
    }

    /// Encerra: sinaliza os workers e descarrega o buffer do log. O
    /// arquivo fecha quando o último handle cai.
    pub fn close(&self) -> Result<(), StorageError> {
        let _ = self.shared.shutdown.send(true);
        self.shared.aof.flush()?;
        Ok(())
    }

    /// Dispara uma varredura de expiração imediata (testes com relógio
    /// injetado).
    pub fn force_ttl_recheck(&self) {
        sweep_expired(&self.shared);
    }

    // --- Escalares ---

    /// Valor escalar de `key`.
    pub fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let entry = self
            .shared
            .keyspace
            .get(key)
            .ok_or(StorageError::KeyNotFound)?;
        match &entry.value {
            Value::Scalar(v) => Ok(v.clone()),
            _ => Err(StorageError::KeyTypeError),
        }
    }

    /// Grava um escalar, sobrescrevendo qualquer entrada anterior seja
    /// qual for o tipo. Sem TTL explícito, vale `default_ttl` quando
    /// configurado.
    pub fn set(
        &self,
        key: &str,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let ttl = ttl.unwrap_or(self.shared.opts.default_ttl);
        self.set_impl(key.to_string(), value, ttl, true)
    }

    /// Remove a entrada de `key`, de qualquer tipo.
    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.remove_impl(key, true)
    }

    /// Instala ou estende o TTL de uma chave existente. `ttl == 0` é
    /// no-op silencioso (compatibilidade de log e de clientes); TTL
    /// idêntico ao vigente também não gera registro.
    pub fn ttl(&self, key: &str, ttl: Duration) -> Result<(), StorageError> {
        self.ttl_impl(key, ttl, true)
    }

    /// Chaves de todos os shards, sem ordem definida. Consistência
    /// fraca: mutações concorrentes podem ou não aparecer.
    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.shared.keyspace.keys()
    }

    // --- Listas ---

    /// Anexa valores ao fim da lista, na ordem dada, criando-a se não
    /// existir. Devolve o novo comprimento.
    pub fn list_push(&self, key: &str, values: Vec<Bytes>) -> Result<usize, StorageError> {
        self.list_push_impl(key.to_string(), values, true)
    }

    /// Remove um elemento do fim da lista e devolve o comprimento
    /// resultante. Lista vazia devolve 0 sem erro e fica no lugar.
    pub fn list_pop(&self, key: &str) -> Result<usize, StorageError> {
        self.list_pop_impl(key, true)
    }

    pub fn list_len(&self, key: &str) -> Result<usize, StorageError> {
        self.with_list(key, |list| Ok(list.len()))
    }

    /// Elemento na posição `index`.
    pub fn list_index(&self, key: &str, index: i64) -> Result<Bytes, StorageError> {
        self.with_list(key, |list| {
            if index < 0 || index as usize >= list.len() {
                return Err(StorageError::ListIndexError);
            }
            Ok(list[index as usize].clone())
        })
    }

    /// Fatia inclusiva `[from..=to]`. Exige `0 <= from <= to < len`.
    pub fn list_range(&self, key: &str, from: i64, to: i64) -> Result<Vec<Bytes>, StorageError> {
        self.with_list(key, |list| {
            if from < 0 || to < from || to as usize >= list.len() {
                return Err(StorageError::ListOutOfBounds);
            }
            Ok(list[from as usize..=to as usize].to_vec())
        })
    }

    // --- Hashes ---

    /// Grava pares campo/valor alternados, criando o hash se não
    /// existir. Número ímpar de argumentos falha antes de qualquer
    /// mutação.
    pub fn hash_set(&self, key: &str, args: &[Bytes]) -> Result<(), StorageError> {
        if args.is_empty() || args.len() % 2 != 0 {
            return Err(StorageError::HashKeyValueMismatch);
        }
        let pairs = args
            .chunks(2)
            .map(|pair| {
                (
                    String::from_utf8_lossy(&pair[0]).into_owned(),
                    pair[1].clone(),
                )
            })
            .collect();
        self.hash_set_impl(key.to_string(), pairs, true)
    }

    /// Valor de um campo do hash.
    pub fn hash_get(&self, key: &str, field: &str) -> Result<Bytes, StorageError> {
        self.with_hash(key, |map| {
            map.get(field)
                .map(|v| v.value().clone())
                .ok_or(StorageError::HashKeyNotFound)
        })
    }

    /// Todos os pares campo/valor.
    pub fn hash_get_all(&self, key: &str) -> Result<HashMap<String, Bytes>, StorageError> {
        self.with_hash(key, |map| {
            Ok(map
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect())
        })
    }

    /// Nomes dos campos, sem ordem definida.
    pub fn hash_keys(&self, key: &str) -> Result<Vec<String>, StorageError> {
        self.with_hash(key, |map| Ok(map.iter().map(|e| e.key().clone()).collect()))
    }

    /// Remove um campo do hash. Campo ausente é sucesso silencioso.
    pub fn hash_del(&self, key: &str, field: &str) -> Result<(), StorageError> {
        self.hash_del_impl(key, field, true)
    }

    // --- Mutators internos ---
    //
    // Cada operação de escrita aplica a mutação em memória primeiro e só
    // então anexa um registro ao log. O replay chama estas variantes com
    // `log = false`. Falha de log depois do sucesso em memória sobe para
    // o chamador sem rollback.

    fn set_impl(
        &self,
        key: String,
        value: Bytes,
        ttl: Duration,
        log: bool,
    ) -> Result<(), StorageError> {
        let entry = Entry::scalar(value.clone());
        if !ttl.is_zero() {
            let deadline = clock::now() + ttl;
            entry.set_expiry(Expiry { ttl, deadline });
            self.shared.ttl.upsert(TtlItem {
                expire: deadline,
                key: key.clone(),
                ttl,
            });
        }
        self.shared.keyspace.insert(key.clone(), Arc::new(entry));

        if log {
            self.shared.aof.append(&Record::Set { key, ttl, value })?;
        }
        Ok(())
    }

    fn remove_impl(&self, key: &str, log: bool) -> Result<(), StorageError> {
        let entry = self
            .shared
            .keyspace
            .remove(key)
            .ok_or(StorageError::KeyNotFound)?;

        if let Some(exp) = entry.expiry() {
            self.shared.ttl.delete(&TtlItem {
                expire: exp.deadline,
                key: key.to_string(),
                ttl: exp.ttl,
            });
        }

        if log {
            self.shared.aof.append(&Record::Remove {
                key: key.to_string(),
            })?;
        }
        Ok(())
    }

    fn ttl_impl(&self, key: &str, ttl: Duration, log: bool) -> Result<(), StorageError> {
        let entry = self
            .shared
            .keyspace
            .get(key)
            .ok_or(StorageError::KeyNotFound)?;

        if ttl.is_zero() {
            return Ok(());
        }
        if entry.expiry().map(|exp| exp.ttl) == Some(ttl) {
            return Ok(());
        }

        let deadline = clock::now() + ttl;
        entry.set_expiry(Expiry { ttl, deadline });
        self.shared.ttl.upsert(TtlItem {
            expire: deadline,
            key: key.to_string(),
            ttl,
        });

        if log {
            self.shared.aof.append(&Record::Ttl {
                key: key.to_string(),
                ttl,
            })?;
        }
        Ok(())
    }

    fn list_push_impl(
        &self,
        key: String,
        values: Vec<Bytes>,
        log: bool,
    ) -> Result<usize, StorageError> {
        let entry = self.shared.keyspace.get_or_insert_with(&key, Entry::list);
        let len = match &entry.value {
            Value::List(list) => {
                let mut list = list.write().unwrap();
                list.extend(values.iter().cloned());
                list.len()
            }
            _ => return Err(StorageError::KeyTypeError),
        };

        // Trava da lista já liberada; o log serializa só consigo mesmo.
        if log {
            self.shared.aof.append(&Record::ListPush { key, values })?;
        }
        Ok(len)
    }

    fn list_pop_impl(&self, key: &str, log: bool) -> Result<usize, StorageError> {
        let entry = self
            .shared
            .keyspace
            .get(key)
            .ok_or(StorageError::KeyNotFound)?;
        let len = match &entry.value {
            Value::List(list) => {
                let mut list = list.write().unwrap();
                list.pop();
                list.len()
            }
            _ => return Err(StorageError::KeyTypeError),
        };

        if log {
            self.shared.aof.append(&Record::ListPop {
                key: key.to_string(),
            })?;
        }
        Ok(len)
    }

    fn hash_set_impl(
        &self,
        key: String,
        pairs: Vec<(String, Bytes)>,
        log: bool,
    ) -> Result<(), StorageError> {
        let entry = self.shared.keyspace.get_or_insert_with(&key, Entry::hash);
        match &entry.value {
            Value::Hash(map) => {
                for (field, value) in &pairs {
                    map.insert(field.clone(), value.clone());
                }
            }
            _ => return Err(StorageError::KeyTypeError),
        }

        if log {
            self.shared.aof.append(&Record::HashSet { key, pairs })?;
        }
        Ok(())
    }

    fn hash_del_impl(&self, key: &str, field: &str, log: bool) -> Result<(), StorageError> {
        let entry = self
            .shared
            .keyspace
            .get(key)
            .ok_or(StorageError::KeyNotFound)?;
        match &entry.value {
            Value::Hash(map) => {
                map.remove(field);
            }
            _ => return Err(StorageError::KeyTypeError),
        }

        if log {
            self.shared.aof.append(&Record::HashDel {
                key: key.to_string(),
                field: field.to_string(),
            })?;
        }
        Ok(())
    }

    /// Aplica um registro do log (replay).
    fn apply(&self, rec: Record) -> Result<(), StorageError> {
        match rec {
            Record::Set { key, ttl, value } => self.set_impl(key, value, ttl, false),
            Record::Remove { key } => self.remove_impl(&key, false),
            Record::Ttl { key, ttl } => self.ttl_impl(&key, ttl, false),
            Record::ListPush { key, values } => {
                self.list_push_impl(key, values, false).map(|_| ())
            }
            Record::ListPop { key } => self.list_pop_impl(&key, false).map(|_| ()),
            Record::HashDel { key, field } => self.hash_del_impl(&key, &field, false),
            Record::HashSet { key, pairs } => self.hash_set_impl(key, pairs, false),
        }
    }

    // --- Leitura tipada ---

    fn with_list<T>(
        &self,
        key: &str,
        f: impl FnOnce(&[Bytes]) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let entry = self
            .shared
            .keyspace
            .get(key)
            .ok_or(StorageError::KeyNotFound)?;
        match &entry.value {
            Value::List(list) => f(list.read().unwrap().as_slice()),
            _ => Err(StorageError::KeyTypeError),
        }
    }

    fn with_hash<T>(
        &self,
        key: &str,
        f: impl FnOnce(&DashMap<String, Bytes>) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let entry = self
            .shared
            .keyspace
            .get(key)
            .ok_or(StorageError::KeyNotFound)?;
        match &entry.value {
            Value::Hash(map) => f(map),
            _ => Err(StorageError::KeyTypeError),
        }
    }

    // --- Workers ---

    fn spawn_reaper(&self) {
        let shared = self.shared.clone();
        let mut shutdown = self.shared.shutdown.subscribe();
        tokio::spawn(async move {
            let mut tick = interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = tick.tick() => sweep_expired(&shared),
                    _ = shutdown.changed() => return,
                }
            }
        });
    }

    fn spawn_flusher(&self) {
        let shared = self.shared.clone();
        let mut shutdown = self.shared.shutdown.subscribe();
        let period = self.shared.opts.sync_period;
        tokio::spawn(async move {
            let mut tick = interval(period);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        if let Err(e) = shared.aof.flush() {
                            warn!("aol: flush falhou: {e}");
                        }
                    }
                    _ = shutdown.changed() => return,
                }
            }
        });
    }
}

/// Uma passada do reaper: drena os itens vencidos do índice e remove do
/// keyspace as chaves cuja expiração gravada na entrada de fato já
/// passou. Um item obsoleto de um TTL estendido é descartado sem tocar a
/// chave; expiração é best-effort e não gera registro no log.
fn sweep_expired(shared: &Shared) {
    let now = clock::now();
    for item in shared.ttl.sweep(now) {
        let Some(entry) = shared.keyspace.get(&item.key) else {
            continue;
        };
        match entry.expiry() {
            Some(exp) if exp.deadline <= now => {
                shared.keyspace.remove(&item.key);
                debug!("ttl: chave expirada removida: {}", item.key);
            }
            _ => {}
        }
    }
}
