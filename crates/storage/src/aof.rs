use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use tracing::warn;

use tidedb_common::AofError;

use crate::record::Record;

/// Writer do log append-only.
///
/// Um único mutex cobre a codificação inteira de um registro e também o
/// flush periódico: registros nunca se intercalam e um flush nunca corta
/// um registro ao meio. A ordem total do log é a ordem de aquisição
/// desse mutex.
pub struct AofWriter {
    out: Mutex<AofOut>,
}

enum AofOut {
    /// Escritas acumulam no buffer; o flusher descarrega a cada
    /// `sync_period`. Uma queda entre flushes perde a cauda do log.
    Buffered(BufWriter<File>),
    /// `no_async`: toda escrita vai direto ao arquivo.
    Direct(File),
}

impl AofWriter {
    /// Abre o arquivo em modo append, criando-o se não existir.
    pub fn open(path: &Path, no_async: bool) -> io::Result<AofWriter> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        let out = if no_async {
            AofOut::Direct(file)
        } else {
            AofOut::Buffered(BufWriter::new(file))
        };

        Ok(AofWriter {
            out: Mutex::new(out),
        })
    }

    /// Anexa um registro ao log.
    pub fn append(&self, rec: &Record) -> io::Result<()> {
        let mut out = self.out.lock().unwrap();
        let mut buf = Vec::with_capacity(64);
        rec.encode(&mut buf);
        match &mut *out {
            AofOut::Buffered(w) => w.write_all(&buf),
            AofOut::Direct(f) => f.write_all(&buf),
        }
    }

    /// Descarrega o buffer no arquivo. No modo direto é um no-op.
    pub fn flush(&self) -> io::Result<()> {
        match &mut *self.out.lock().unwrap() {
            AofOut::Buffered(w) => w.flush(),
            AofOut::Direct(_) => Ok(()),
        }
    }
}

/// Lê o log inteiro e aplica cada registro via `apply`. Devolve quantos
/// registros foram aplicados.
///
/// Uma cauda truncada (EOF no meio de um registro) encerra o replay sem
/// erro: é o rastro esperado de uma queda entre flushes, e o registro
/// parcial é descartado. Um opcode desconhecido aborta a abertura.
pub fn replay<F>(path: &Path, mut apply: F) -> Result<usize, AofError>
where
    F: FnMut(Record) -> Result<(), AofError>,
{
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut rdr = BufReader::new(file);
    let mut count = 0usize;

    loop {
        match Record::decode(&mut rdr) {
            Ok(Some(rec)) => {
                apply(rec)?;
                count += 1;
            }
            Ok(None) => break,
            Err(AofError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!("aol: registro truncado no fim do arquivo, replay encerrado");
                break;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(count)
}
