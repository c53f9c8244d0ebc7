use std::sync::RwLock;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;

/// Valor de uma entrada: escalar, lista ou hash.
#[derive(Debug)]
pub enum Value {
    Scalar(Bytes),
    /// Push e pop são mutações multi-passo; cada lista carrega seu
    /// próprio RwLock (leituras concorrentes, escrita exclusiva).
    List(RwLock<Vec<Bytes>>),
    /// Mapa concorrente: campos disjuntos do mesmo hash em paralelo.
    Hash(DashMap<String, Bytes>),
}

/// Expiração instalada numa entrada.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    pub ttl: Duration,
    pub deadline: Instant,
}

/// Entrada do keyspace: valor + expiração opcional.
#[derive(Debug)]
pub struct Entry {
    pub value: Value,
    expiry: RwLock<Option<Expiry>>,
}

impl Entry {
    pub fn scalar(value: Bytes) -> Entry {
        Entry {
            value: Value::Scalar(value),
            expiry: RwLock::new(None),
        }
    }

    pub fn list() -> Entry {
        Entry {
            value: Value::List(RwLock::new(Vec::new())),
            expiry: RwLock::new(None),
        }
    }

    pub fn hash() -> Entry {
        Entry {
            value: Value::Hash(DashMap::new()),
            expiry: RwLock::new(None),
        }
    }

    pub fn expiry(&self) -> Option<Expiry> {
        *self.expiry.read().unwrap()
    }

    pub fn set_expiry(&self, exp: Expiry) {
        *self.expiry.write().unwrap() = Some(exp);
    }
}
