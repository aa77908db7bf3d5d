//! A newline-delimited framed TCP socket with a background reader thread.
//!
//! Grounded on `vcsms/server.py`'s and `vcsms/server_connection.py`'s use
//! of `ImprovedSocket`'s `send`/`recv`/`new`/`connected` contract. The
//! reader loop here exits on an observed EOF or I/O error rather than on a
//! polled flag, and callers blocked in [`FramedSocket::recv`] are woken
//! immediately via a [`Condvar`] rather than spin-polling
//! [`FramedSocket::connected`].

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use crate::error::FramingError;

struct Inbox {
    queue: Mutex<VecDeque<Vec<u8>>>,
    cond: Condvar,
}

/// A framed socket speaking one line per message.
pub struct FramedSocket {
    writer: Mutex<TcpStream>,
    inbox: Arc<Inbox>,
    connected: Arc<AtomicBool>,
    _reader: thread::JoinHandle<()>,
}

impl FramedSocket {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, FramingError> {
        let stream = TcpStream::connect(addr)?;
        Ok(Self::from_stream(stream))
    }

    /// Wrap an already-connected stream, spawning its background reader.
    pub fn from_stream(stream: TcpStream) -> Self {
        let reader_stream = stream.try_clone().expect("tcp stream is always cloneable");
        let inbox = Arc::new(Inbox {
            queue: Mutex::new(VecDeque::new()),
            cond: Condvar::new(),
        });
        let connected = Arc::new(AtomicBool::new(true));

        let reader_inbox = Arc::clone(&inbox);
        let reader_connected = Arc::clone(&connected);
        let reader = thread::spawn(move || {
            let mut lines = BufReader::new(reader_stream).lines();
            loop {
                match lines.next() {
                    Some(Ok(line)) => {
                        let mut queue = reader_inbox.queue.lock().unwrap();
                        queue.push_back(line.into_bytes());
                        reader_inbox.cond.notify_one();
                    }
                    _ => {
                        reader_connected.store(false, Ordering::SeqCst);
                        reader_inbox.cond.notify_all();
                        return;
                    }
                }
            }
        });

        Self {
            writer: Mutex::new(stream),
            inbox,
            connected,
            _reader: reader,
        }
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Whether at least one complete message is queued and unread.
    pub fn new_message(&self) -> bool {
        !self.inbox.queue.lock().unwrap().is_empty()
    }

    pub fn send(&self, line: &[u8]) -> Result<(), FramingError> {
        if !self.connected() {
            return Err(FramingError::Closed);
        }
        let mut writer = self.writer.lock().unwrap();
        writer.write_all(line)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Block until one complete message is available and return it.
    pub fn recv(&self) -> Result<Vec<u8>, FramingError> {
        let mut queue = self.inbox.queue.lock().unwrap();
        loop {
            if let Some(line) = queue.pop_front() {
                return Ok(line);
            }
            if !self.connected() {
                return Err(FramingError::Closed);
            }
            queue = self.inbox.cond.wait(queue).unwrap();
        }
    }

    pub fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Ok(writer) = self.writer.lock() {
            let _ = writer.shutdown(std::net::Shutdown::Both);
        }
        self.inbox.cond.notify_all();
    }
}
