use std::collections::BTreeSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Item do índice de expiração. A ordem derivada (expire, key, ttl)
/// mantém a árvore ascendente por instante com desempate determinístico.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TtlItem {
    pub expire: Instant,
    pub key: String,
    pub ttl: Duration,
}

/// Conjunto ordenado de expirações pendentes, sob um único mutex.
///
/// O índice não conhece o keyspace: `sweep` devolve os itens vencidos e
/// o chamador decide o que remover. Estender um TTL insere um item novo
/// sem apagar o antigo; o item obsoleto é tolerado porque o chamador
/// reconfere a expiração gravada na entrada antes de agir.
#[derive(Debug, Default)]
pub struct TtlIndex {
    tree: Mutex<BTreeSet<TtlItem>>,
}

impl TtlIndex {
    pub fn upsert(&self, item: TtlItem) {
        self.tree.lock().unwrap().insert(item);
    }

    pub fn delete(&self, item: &TtlItem) {
        self.tree.lock().unwrap().remove(item);
    }

    /// Drena e devolve todos os itens com `expire` estritamente anterior
    /// a `now`.
    pub fn sweep(&self, now: Instant) -> Vec<TtlItem> {
        let mut tree = self.tree.lock().unwrap();
        let mut due = Vec::new();

        loop {
            match tree.first() {
                Some(item) if item.expire < now => {}
                _ => break,
            }
            if let Some(item) = tree.pop_first() {
                due.push(item);
            }
        }

        due
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tree.lock().unwrap().len()
    }
}
