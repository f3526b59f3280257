//! # Mock Connection for Testing
//!
//! A scripted stand-in for a multiplexed Redis connection. Every command is
//! recorded together with the placement flag it was routed with, and replies
//! are taken from a script in FIFO order. When the script is empty the mock
//! answers `nil` (or `OK` for each queued command of a transaction).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use redis::aio::ConnectionLike;
use redis::{Cmd, ErrorKind, Pipeline, RedisError, RedisFuture, RedisResult, Value};

use redkit_core::{CommandFlags, RoutedConnection};

/// A command observed by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCommand {
    /// Command name followed by its arguments, decoded lossily as UTF-8
    pub args: Vec<String>,
    /// Placement flag the connection was routed with
    pub flags: CommandFlags,
    /// Whether the command was queued inside MULTI/EXEC
    pub in_transaction: bool,
}

impl RecordedCommand {
    /// Upper-cased command name
    pub fn name(&self) -> String {
        self.args
            .first()
            .map(|name| name.to_ascii_uppercase())
            .unwrap_or_default()
    }

    /// Arguments after the command name
    pub fn arguments(&self) -> &[String] {
        self.args.get(1..).unwrap_or(&[])
    }
}

#[derive(Default)]
struct MockState {
    commands: Vec<RecordedCommand>,
    replies: VecDeque<RedisResult<Value>>,
}

/// Scripted connection that records everything it is asked to do
#[derive(Clone, Default)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
    flags: CommandFlags,
}

impl MockConnection {
    /// Create a mock with an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next command
    pub fn with_reply(self, reply: Value) -> Self {
        self.push_reply(reply);
        self
    }

    /// Queue an error for the next command
    pub fn with_error(self, error: RedisError) -> Self {
        self.push_error(error);
        self
    }

    /// Queue a reply for the next command
    pub fn push_reply(&self, reply: Value) {
        self.lock().replies.push_back(Ok(reply));
    }

    /// Queue an error for the next command
    pub fn push_error(&self, error: RedisError) {
        self.lock().replies.push_back(Err(error));
    }

    /// All commands observed so far, transactions expanded
    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.lock().commands.clone()
    }

    /// Number of commands observed so far
    pub fn command_count(&self) -> usize {
        self.lock().commands.len()
    }

    /// The most recent command
    pub fn last_command(&self) -> Option<RecordedCommand> {
        self.lock().commands.last().cloned()
    }

    /// Forget recorded commands and pending replies
    pub fn reset(&self) {
        let mut state = self.lock();
        state.commands.clear();
        state.replies.clear();
    }

    /// Placement flag of this clone
    pub fn flags(&self) -> CommandFlags {
        self.flags
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A poisoned mock means a test already panicked; keep the data usable
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, args: Vec<String>, in_transaction: bool) {
        self.lock().commands.push(RecordedCommand {
            args,
            flags: self.flags,
            in_transaction,
        });
    }

    fn next_reply(&self) -> Option<RedisResult<Value>> {
        self.lock().replies.pop_front()
    }

    fn execute_single(&self, packed: &[u8]) -> RedisResult<Value> {
        let mut commands = decode_commands(packed)?;
        let args = commands
            .pop()
            .ok_or_else(|| RedisError::from((ErrorKind::ClientError, "empty command")))?;
        self.record(args, false);
        self.next_reply().unwrap_or(Ok(Value::Nil))
    }

    fn execute_pipeline(&self, packed: &[u8], count: usize) -> RedisResult<Vec<Value>> {
        let commands = decode_commands(packed)?;
        let atomic = commands
            .first()
            .is_some_and(|first| first.first().is_some_and(|name| name.eq_ignore_ascii_case("MULTI")));

        if atomic {
            let queued: Vec<Vec<String>> = commands
                .into_iter()
                .filter(|args| {
                    args.first().is_some_and(|name| {
                        !name.eq_ignore_ascii_case("MULTI") && !name.eq_ignore_ascii_case("EXEC")
                    })
                })
                .collect();
            let queued_count = queued.len();
            for args in queued {
                self.record(args, true);
            }
            let exec_reply = self
                .next_reply()
                .unwrap_or_else(|| Ok(Value::Array(vec![Value::Okay; queued_count])))?;
            return Ok(vec![exec_reply]);
        }

        let mut replies = Vec::with_capacity(count);
        for args in commands {
            self.record(args, false);
            replies.push(self.next_reply().unwrap_or(Ok(Value::Nil))?);
        }
        Ok(replies)
    }
}

impl RoutedConnection for MockConnection {
    fn routed(&self, flags: CommandFlags) -> Self {
        Self {
            state: Arc::clone(&self.state),
            flags,
        }
    }
}

impl ConnectionLike for MockConnection {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        let result = self.execute_single(&cmd.get_packed_command());
        Box::pin(async move { result })
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        pipeline: &'a Pipeline,
        _offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        let result = self.execute_pipeline(&pipeline.get_packed_pipeline(), count);
        Box::pin(async move { result })
    }

    fn get_db(&self) -> i64 {
        0
    }
}

/// Decode RESP request arrays (`*N\r\n$len\r\narg\r\n...`) back into arguments
fn decode_commands(mut input: &[u8]) -> RedisResult<Vec<Vec<String>>> {
    let mut commands = Vec::new();
    while !input.is_empty() {
        let (count, rest) = read_header(input, b'*')?;
        input = rest;
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            let (len, rest) = read_header(input, b'$')?;
            if rest.len() < len + 2 {
                return Err(malformed());
            }
            args.push(String::from_utf8_lossy(&rest[..len]).into_owned());
            input = &rest[len + 2..];
        }
        commands.push(args);
    }
    Ok(commands)
}

fn read_header(input: &[u8], marker: u8) -> RedisResult<(usize, &[u8])> {
    if input.first() != Some(&marker) {
        return Err(malformed());
    }
    let end = input
        .windows(2)
        .position(|window| window == b"\r\n")
        .ok_or_else(malformed)?;
    let value = std::str::from_utf8(&input[1..end])
        .ok()
        .and_then(|text| text.parse::<usize>().ok())
        .ok_or_else(malformed)?;
    Ok((value, &input[end + 2..]))
}

fn malformed() -> RedisError {
    RedisError::from((ErrorKind::ClientError, "malformed packed command"))
}
