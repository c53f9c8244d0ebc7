//! Relógio injetável do processo.
//!
//! O cálculo de expiração e o reaper consultam `now()`. Testes de TTL
//! substituem a função de tempo para avançar o relógio sem dormir.

use std::sync::{Arc, RwLock};
use std::time::Instant;

type TimeFn = Arc<dyn Fn() -> Instant + Send + Sync>;

static TIME_FN: RwLock<Option<TimeFn>> = RwLock::new(None);

/// Instante atual segundo a função instalada (padrão: `Instant::now`).
pub fn now() -> Instant {
    match TIME_FN.read().unwrap().as_ref() {
        Some(f) => f(),
        None => Instant::now(),
    }
}

/// Instala uma função de tempo. Instalar antes da carga; a troca em si
/// não é sincronizada com operações em andamento.
pub fn set_time_fn<F>(f: F)
where
    F: Fn() -> Instant + Send + Sync + 'static,
{
    *TIME_FN.write().unwrap() = Some(Arc::new(f));
}

/// Volta ao relógio real.
pub fn reset_time_fn() {
    *TIME_FN.write().unwrap() = None;
}
