use std::io::{self, Write};

use bytes::BytesMut;
use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use tidedb_common::{DEFAULT_HOST, DEFAULT_PORT};
use tidedb_protocol::Frame;

#[derive(Parser, Debug)]
#[command(name = "tidedb-cli", about = "TideDB CLI client")]
struct Args {
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,
    #[arg(long, short, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Comando para executar diretamente (modo não interativo)
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    let mut stream = TcpStream::connect(&addr).await?;

    // Modo comando único
    if !args.command.is_empty() {
        let parts: Vec<&str> = args.command.iter().map(|s| s.as_str()).collect();
        execute_request(&mut stream, Frame::array_from_strs(&parts)).await?;
        return Ok(());
    }

    println!("Conectado a {addr}");

    let stdin = io::stdin();
    let mut input = String::new();

    loop {
        print!("tidedb> ");
        io::stdout().flush()?;

        input.clear();
        if stdin.read_line(&mut input)? == 0 {
            break; // EOF
        }

        let line = input.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }

        let tokens = tokenize(line);
        if tokens.is_empty() {
            continue;
        }

        let parts: Vec<&str> = tokens.iter().map(|s| s.as_str()).collect();
        if let Err(e) = execute_request(&mut stream, Frame::array_from_strs(&parts)).await {
            println!("(error) {e}");
        }
    }

    Ok(())
}

async fn execute_request(stream: &mut TcpStream, frame: Frame) -> anyhow::Result<()> {
    let mut buf = BytesMut::new();
    frame.encode(&mut buf);

    stream.write_all(&buf).await?;
    stream.flush().await?;

    let mut response_buf = BytesMut::with_capacity(4096);
    loop {
        let n = stream.read_buf(&mut response_buf).await?;
        if n == 0 {
            return Err(anyhow::anyhow!("servidor fechou a conexão"));
        }

        let mut cursor = std::io::Cursor::new(&response_buf[..]);
        match Frame::parse(&mut cursor) {
            Ok(response) => {
                println!("{}", format_frame(&response, 0));
                break;
            }
            Err(tidedb_common::ProtocolError::Incomplete) => continue,
            Err(e) => return Err(anyhow::anyhow!("resposta inválida: {e}")),
        }
    }
    Ok(())
}

/// Divide a linha em tokens respeitando aspas simples e duplas.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

fn format_frame(frame: &Frame, depth: usize) -> String {
    match frame {
        Frame::Simple(s) => s.clone(),
        Frame::Error(e) => format!("(error) {e}"),
        Frame::Integer(n) => format!("(integer) {n}"),
        Frame::Bulk(data) => format!("\"{}\"", String::from_utf8_lossy(data)),
        Frame::Null => "(nil)".to_string(),
        Frame::Array(items) => {
            if items.is_empty() {
                return "(empty array)".to_string();
            }
            let indent = "  ".repeat(depth);
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    format!("{indent}{}) {}", i + 1, format_frame(item, depth + 1))
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}
