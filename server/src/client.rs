//! Interactive line client for the server: reads SQL from stdin, one
//! statement per line, and prints each response envelope.

use std::io::{BufRead, Read, Write};
use std::net::TcpStream;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use clap::Parser;

use common::err::{DbError, DbResult};

#[derive(Parser, Debug, Clone)]
#[command(name = "dbcli")]
#[command(version = "0.1.0")]
#[command(about = "Line client for dbserver", long_about = None)]
struct CliArgs {
    #[arg(long, help = "server host", default_value = "127.0.0.1")]
    host: String,

    #[arg(long, help = "server port", default_value_t = 7878)]
    port: u16,

    #[arg(short, long, help = "authenticate as this user", value_name = "user")]
    username: Option<String>,

    #[arg(short, long, help = "password for --username", value_name = "password")]
    password: Option<String>,

    /// run one statement and exit instead of reading stdin
    #[arg(short, long, help = "execute a single statement", value_name = "SQL")]
    execute: Option<String>,
}

struct FrameChannel {
    stream: TcpStream,
}

impl FrameChannel {
    fn connect(host: &str, port: u16) -> DbResult<Self> {
        let stream = TcpStream::connect((host, port))?;
        Ok(FrameChannel { stream })
    }

    fn read_frame(&mut self) -> DbResult<String> {
        let len = self.stream.read_u32::<BigEndian>()?;
        let mut payload = vec![0u8; len as usize];
        self.stream.read_exact(&mut payload)?;
        String::from_utf8(payload)
            .map_err(|_| DbError::Protocol("response payload is not UTF-8".to_string()))
    }

    fn write_frame(&mut self, payload: &str) -> DbResult<()> {
        self.stream.write_u32::<BigEndian>(payload.len() as u32)?;
        self.stream.write_all(payload.as_bytes())?;
        self.stream.flush()?;
        Ok(())
    }

    fn round_trip(&mut self, sql: &str) -> DbResult<String> {
        self.write_frame(sql)?;
        self.read_frame()
    }
}

fn print_response(raw: &str) {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default()),
        Err(_) => println!("{}", raw),
    }
}

fn main() -> DbResult<()> {
    let args = CliArgs::parse();

    let mut channel = FrameChannel::connect(&args.host, args.port)?;
    let greeting = channel.read_frame()?;
    print_response(&greeting);

    if let (Some(user), Some(password)) = (&args.username, &args.password) {
        let response = channel.round_trip(&format!("AUTH {} {}", user, password))?;
        print_response(&response);
    }

    if let Some(sql) = &args.execute {
        let response = channel.round_trip(sql)?;
        print_response(&response);
        return Ok(());
    }

    let stdin = std::io::stdin();
    print!("> ");
    std::io::stdout().flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        let sql = line.trim();
        if sql.is_empty() {
            print!("> ");
            std::io::stdout().flush()?;
            continue;
        }
        if sql.eq_ignore_ascii_case("exit") || sql.eq_ignore_ascii_case("quit") {
            break;
        }
        let response = channel.round_trip(sql)?;
        print_response(&response);
        print!("> ");
        std::io::stdout().flush()?;
    }
    Ok(())
}
