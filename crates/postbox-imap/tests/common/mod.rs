//! Scripted in-memory transport for driving a session in tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use postbox_imap::{Error, Result, Security, SessionConfig, Transport};

/// Serves a fixed server script and records everything the client writes.
///
/// Reads hand out at most one line at a time, the way a server that waits
/// for each command behaves, so nothing past the current line is buffered.
#[derive(Debug)]
pub struct MockStream {
    input: VecDeque<u8>,
    written: Arc<Mutex<Vec<u8>>>,
    secure: bool,
    fail_tls: bool,
    greedy: bool,
    time_out: bool,
    line_start: bool,
    continuations: Arc<Mutex<Vec<String>>>,
}

impl MockStream {
    pub fn new(script: &str) -> Self {
        Self::from_bytes(script.as_bytes())
    }

    pub fn from_bytes(script: &[u8]) -> Self {
        Self {
            input: script.iter().copied().collect(),
            written: Arc::new(Mutex::new(Vec::new())),
            secure: false,
            fail_tls: false,
            greedy: false,
            time_out: false,
            line_start: true,
            continuations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Makes the TLS upgrade fail.
    pub fn failing_tls(mut self) -> Self {
        self.fail_tls = true;
        self
    }

    /// Hands out the whole remaining script on the first read.
    pub fn greedy(mut self) -> Self {
        self.greedy = true;
        self
    }

    /// Reads time out once the script is exhausted, instead of reporting EOF.
    pub fn timing_out(mut self) -> Self {
        self.time_out = true;
        self
    }

    /// What the client had written each time a `+` line was served.
    pub fn continuations(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.continuations)
    }

    /// Shared view of the client's writes.
    pub fn written(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.written)
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.input.is_empty() && self.time_out {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
        }
        if self.line_start && self.input.front() == Some(&b'+') {
            let so_far = String::from_utf8_lossy(&self.written.lock().unwrap()).into_owned();
            self.continuations.lock().unwrap().push(so_far);
        }
        let line_end = if self.greedy {
            self.input.len()
        } else {
            self.input
                .iter()
                .position(|&b| b == b'\n')
                .map_or(self.input.len(), |i| i + 1)
        };
        let n = line_end.min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(self.input.drain(..n)) {
            *slot = byte;
        }
        if n > 0 {
            self.line_start = buf[n - 1] == b'\n';
        }
        Ok(n)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MockStream {
    fn is_secure(&self) -> bool {
        self.secure
    }

    fn start_tls(mut self, _host: &str) -> Result<Self> {
        if self.fail_tls {
            return Err(Error::SecureChannelFailure {
                message: "TLS handshake failed".to_string(),
                source: "certificate rejected".into(),
            });
        }
        self.secure = true;
        Ok(self)
    }

    fn set_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }
}

/// Config for a plaintext mock server.
pub fn plain_config() -> SessionConfig {
    SessionConfig::builder("mock.example.org")
        .security(Security::None)
        .allow_insecure_login(true)
        .build()
}

/// Everything written so far, lossily decoded.
pub fn sent(written: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8_lossy(&written.lock().unwrap()).into_owned()
}
