use std::sync::Arc;

use dashmap::DashMap;
use sha1::{Digest, Sha1};

use crate::entry::Entry;

/// Keyspace particionado em shards independentes.
///
/// Cada shard é um mapa concorrente próprio; não há lock cruzando
/// shards. Leituras nunca bloqueiam leituras.
pub struct Keyspace {
    shards: Vec<DashMap<String, Arc<Entry>>>,
}

impl Keyspace {
    pub fn new(shard_count: usize) -> Keyspace {
        let shard_count = shard_count.max(1);
        Keyspace {
            shards: (0..shard_count).map(|_| DashMap::new()).collect(),
        }
    }

    /// Shard responsável pela chave: primeiros 4 bytes do SHA-1 como u32
    /// big-endian, módulo o número de shards. Com um único shard o hash
    /// é dispensado (caminho quente). O algoritmo é contrato: clientes e
    /// réplicas antigas dependem dessa distribuição.
    fn shard(&self, key: &str) -> &DashMap<String, Arc<Entry>> {
        let mut idx = 0usize;

        if self.shards.len() > 1 {
            let digest = Sha1::digest(key.as_bytes());
            let head = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
            idx = (head % self.shards.len() as u32) as usize;
        }

        &self.shards[idx]
    }

    pub fn get(&self, key: &str) -> Option<Arc<Entry>> {
        self.shard(key).get(key).map(|e| e.value().clone())
    }

    pub fn insert(&self, key: String, entry: Arc<Entry>) {
        self.shard(&key).insert(key, entry);
    }

    pub fn remove(&self, key: &str) -> Option<Arc<Entry>> {
        self.shard(key).remove(key).map(|(_, entry)| entry)
    }

    /// Busca a entrada ou cria uma nova atomicamente dentro do shard.
    pub fn get_or_insert_with(
        &self,
        key: &str,
        make: impl FnOnce() -> Entry,
    ) -> Arc<Entry> {
        self.shard(key)
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(make()))
            .value()
            .clone()
    }

    /// Itera as chaves shard a shard, sem ordem definida. Consistência
    /// fraca: mutações durante a varredura podem ou não aparecer.
    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.shards
            .iter()
            .flat_map(|shard| shard.iter().map(|e| e.key().clone()))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.len()).sum()
    }
}
