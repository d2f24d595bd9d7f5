//! Scripted in-process server for driving the client against canned
//! RESP3 traffic.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Once;
use std::thread::{self, JoinHandle};
use std::time::Duration;

static INIT: Once = Once::new();

/// Honor `RUST_LOG` when debugging a failing test.
fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A typical HELLO reply; the client ignores its contents.
pub const HELLO_REPLY: &[u8] =
    b"%3\r\n$6\r\nserver\r\n$5\r\nredis\r\n$5\r\nproto\r\n:3\r\n$7\r\nversion\r\n$5\r\n7.4.0\r\n";

/// One scripted step of a mock connection.
pub enum Action {
    /// Read one client command and record it.
    Recv,
    /// Write raw bytes to the client.
    Send(&'static [u8]),
    /// Sleep without touching the socket.
    Pause(Duration),
}

pub struct MockServer {
    pub addr: SocketAddr,
    handle: JoinHandle<Vec<Vec<String>>>,
}

impl MockServer {
    /// Serve a single scripted connection.
    pub fn start(actions: Vec<Action>) -> Self {
        Self::start_sessions(vec![actions])
    }

    /// Serve several scripted connections, accepted in order.
    pub fn start_sessions(sessions: Vec<Vec<Action>>) -> Self {
        init_logging();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let mut received = Vec::new();
            for actions in sessions {
                let (stream, _) = listener.accept().unwrap();
                received.extend(serve(stream, actions));
            }
            received
        });
        Self { addr, handle }
    }

    /// Client configuration pointing at this server.
    pub fn config(&self) -> nuncio::Config {
        nuncio::Config::new()
            .host("127.0.0.1")
            .port(self.addr.port())
            .timeout(Some(Duration::from_secs(2)))
    }

    /// Join the server thread and return every command it recorded.
    pub fn finish(self) -> Vec<Vec<String>> {
        self.handle.join().unwrap()
    }
}

fn serve(stream: TcpStream, actions: Vec<Action>) -> Vec<Vec<String>> {
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut writer = stream;

    let mut received = Vec::new();
    for action in actions {
        match action {
            Action::Recv => received.push(read_command(&mut reader)),
            Action::Send(bytes) => writer.write_all(bytes).unwrap(),
            Action::Pause(duration) => thread::sleep(duration),
        }
    }
    received
}

/// Parse one `*N` array of bulk strings, lossily decoded for assertions.
fn read_command(reader: &mut impl BufRead) -> Vec<String> {
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    assert!(
        line.starts_with('*'),
        "expected a command array, got {line:?}"
    );
    let argc: usize = line[1..].trim_end().parse().unwrap();

    let mut args = Vec::with_capacity(argc);
    for _ in 0..argc {
        let mut header = String::new();
        reader.read_line(&mut header).unwrap();
        assert!(header.starts_with('$'), "expected a bulk, got {header:?}");
        let len: usize = header[1..].trim_end().parse().unwrap();

        let mut payload = vec![0u8; len + 2];
        reader.read_exact(&mut payload).unwrap();
        payload.truncate(len);
        args.push(String::from_utf8_lossy(&payload).into_owned());
    }
    args
}
