use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

/// A byte stream a [`Connection`](crate::Connection) can run on.
///
/// The engine needs a read half (handed to the receiver thread) and a write
/// half (kept behind the transaction mutex), plus a way to force the read
/// half to unblock during teardown. `try_clone` and `shutdown` give it both
/// without assuming the concrete transport supports splitting.
pub trait Transport: Read + Write + Send + 'static {
    fn try_clone(&self) -> io::Result<Self>
    where
        Self: Sized;

    fn shutdown(&self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn try_clone(&self) -> io::Result<Self> {
        TcpStream::try_clone(self)
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}
