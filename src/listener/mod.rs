//! Listener Loop
//!
//! The server's front door: one acceptor task pulls datagrams off the socket and hands
//! them over a bounded channel to a fixed pool of workers.
//!
//! Each worker decodes the request, runs it through the `Dispatcher`, and sends the
//! response back as one or more fragments. A bad datagram, a failing handler or a send
//! error is logged and never stops the loop.

pub mod server;

pub use server::Listener;

#[cfg(test)]
mod tests;
