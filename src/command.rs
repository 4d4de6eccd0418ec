//! One small state machine per request kind. Every command sends a
//! length-prefixed ASCII request string, then owns how to interpret the
//! reply once the generic `OKAY`/`FAIL` skeleton has been applied.

use crate::connection::Connection;
use crate::error::AdbResult;

pub mod host_service;
pub mod local_service;

/// A single ADB request/response exchange.
pub trait AdbCommand {
    type Output;

    /// The request string sent after the 4-hex-digit length prefix, e.g.
    /// `"host:version"` or `"shell:getprop"`.
    fn raw_command(&self) -> String;

    /// Interpret the reply once `raw_command` has been sent. Implementors
    /// read the status tag themselves (some commands, like `forward` and
    /// `wait-for-any`, expect two consecutive `OKAY`s rather than the plain
    /// skeleton).
    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output>;

    /// Send the request and interpret the reply.
    fn execute(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        connection.write_request(&self.raw_command())?;
        self.handle_response(connection)
    }
}
