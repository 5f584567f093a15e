use std::{
    io::{self, BufRead, BufReader, BufWriter, Write},
    net::TcpStream,
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use linedb::ServerMessage;

/// Send JSON requests to a linedb server, one per line, and print the
/// responses.
#[derive(Parser, Debug)]
#[command(author, version)]
struct Cli {
    #[arg(short, long, default_value = "127.0.0.1:4000")]
    addr: String,
    /// Requests to send; read from stdin when none are given
    requests: Vec<String>,
}

/// Send one request and wait for one response line.
fn send_request_and_get_response(
    request: &str,
    buf_writer: &mut BufWriter<TcpStream>,
    buf_reader: &mut BufReader<TcpStream>,
) -> Result<ServerMessage> {
    writeln!(buf_writer, "{}", request.trim())?;
    buf_writer.flush()?;
    let mut line = String::new();
    if buf_reader.read_line(&mut line)? == 0 {
        bail!("server closed the connection");
    }
    serde_json::from_str(&line).with_context(|| format!("unexpected response: {}", line.trim()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let stream = TcpStream::connect(&cli.addr)
        .with_context(|| format!("could not connect to {}", cli.addr))?;
    let mut buf_reader = BufReader::new(stream.try_clone()?);
    let mut buf_writer = BufWriter::new(stream);

    let requests: Vec<String> = if cli.requests.is_empty() {
        io::stdin().lock().lines().collect::<io::Result<_>>()?
    } else {
        cli.requests
    };

    let mut failed = false;
    for request in requests.iter().filter(|r| !r.trim().is_empty()) {
        let response = send_request_and_get_response(request, &mut buf_writer, &mut buf_reader)?;
        if let ServerMessage::Error { error } = &response {
            eprintln!("{error}");
            failed = true;
        }
        println!("{}", serde_json::to_string(&response)?);
    }

    if failed {
        bail!("server reported an error");
    }
    Ok(())
}
