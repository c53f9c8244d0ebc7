use bytes::Bytes;

use tidedb_common::CommandError;

use crate::Frame;

/// Cursor sobre um Frame::Array para extrair argumentos na ordem.
pub struct Parse {
    parts: std::vec::IntoIter<Frame>,
}

impl Parse {
    /// Constrói o cursor. Comandos chegam sempre como Array.
    pub fn new(frame: Frame) -> Result<Parse, CommandError> {
        match frame {
            Frame::Array(parts) => Ok(Parse {
                parts: parts.into_iter(),
            }),
            _ => Err(CommandError::InvalidArgument("esperado array".into())),
        }
    }

    /// Próximo argumento como String.
    pub fn next_string(&mut self) -> Result<String, CommandError> {
        match self.next()? {
            Frame::Simple(s) => Ok(s),
            Frame::Bulk(data) => String::from_utf8(data.to_vec())
                .map_err(|_| CommandError::InvalidArgument("string UTF-8 inválida".into())),
            _ => Err(CommandError::InvalidArgument("esperado string".into())),
        }
    }

    /// Próximo argumento como bytes crus.
    pub fn next_bytes(&mut self) -> Result<Bytes, CommandError> {
        match self.next()? {
            Frame::Bulk(data) => Ok(data),
            Frame::Simple(s) => Ok(Bytes::from(s)),
            _ => Err(CommandError::InvalidArgument("esperado bulk".into())),
        }
    }

    /// Próximo argumento como i64.
    pub fn next_int(&mut self) -> Result<i64, CommandError> {
        let s = self.next_string()?;
        s.parse::<i64>()
            .map_err(|_| CommandError::InvalidArgument(format!("'{s}' não é um inteiro")))
    }

    /// Falha se sobrou argumento não consumido.
    pub fn finish(&mut self) -> Result<(), CommandError> {
        if self.parts.len() > 0 {
            return Err(CommandError::WrongArgNum);
        }
        Ok(())
    }

    pub fn has_remaining(&self) -> bool {
        self.parts.len() > 0
    }

    fn next(&mut self) -> Result<Frame, CommandError> {
        self.parts.next().ok_or(CommandError::WrongArgNum)
    }
}
