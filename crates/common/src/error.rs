/// Erros do engine de armazenamento.
///
/// As mensagens de `Display` são o contrato de wire: clientes comparam a
/// string exata devolvida num erro RESP. Não reformular.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("key not found")]
    KeyNotFound,
    #[error("wrong key type")]
    KeyTypeError,
    #[error("wrong list index")]
    ListIndexError,
    #[error("list range out of bounds")]
    ListOutOfBounds,
    #[error("hash key not found")]
    HashKeyNotFound,
    #[error("hash keys and values mismatch")]
    HashKeyValueMismatch,
    /// Falha de I/O no log append-only. A mutação em memória já foi
    /// aplicada quando este erro chega ao chamador.
    #[error("aol i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Erros de decodificação do log append-only.
#[derive(Debug, thiserror::Error)]
pub enum AofError {
    #[error("opcode desconhecido no log: {0:#04x}")]
    UnknownOpcode(u8),
    #[error("string inválida no log: {0}")]
    InvalidString(#[from] std::string::FromUtf8Error),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Apply(#[from] StorageError),
}

/// Erros de parsing de frames RESP.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame incompleto")]
    Incomplete,
    #[error("prefixo de frame inválido: {0:#04x}")]
    InvalidPrefix(u8),
    #[error("inteiro inválido: {0}")]
    InvalidInteger(String),
    #[error("comprimento de bulk inválido: {0}")]
    InvalidBulkLength(i64),
    #[error("frame excede o tamanho máximo ({0} bytes)")]
    FrameTooLarge(usize),
    #[error("encoding inválido: {0}")]
    InvalidEncoding(String),
}

/// Erros de validação de comandos.
///
/// `WrongArgNum` e `WrongTtl` também são contrato de wire.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Wrong arguments number")]
    WrongArgNum,
    #[error("Wrong TTL")]
    WrongTtl,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("argumento inválido: {0}")]
    InvalidArgument(String),
}

/// Erros de conexão TCP.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("conexão resetada pelo peer")]
    ConnectionReset,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Erro top-level do TideDB.
#[derive(Debug, thiserror::Error)]
pub enum TideError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Aof(#[from] AofError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Result type alias.
pub type TideResult<T> = Result<T, TideError>;
