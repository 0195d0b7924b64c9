//! Outbound transport seam.

use std::io;

/// Destination for encoded messages.
///
/// Sends are synchronous and expected not to block for long; a failure is
/// fatal for the tick that caused it.
pub trait MessageSink {
    fn send(&mut self, message: &[u8]) -> io::Result<()>;

    /// Name of the remote end, for logs.
    fn peer(&self) -> &str {
        "client"
    }
}

impl<S: MessageSink + ?Sized> MessageSink for &mut S {
    fn send(&mut self, message: &[u8]) -> io::Result<()> {
        (**self).send(message)
    }

    fn peer(&self) -> &str {
        (**self).peer()
    }
}

impl<S: MessageSink + ?Sized> MessageSink for Box<S> {
    fn send(&mut self, message: &[u8]) -> io::Result<()> {
        (**self).send(message)
    }

    fn peer(&self) -> &str {
        (**self).peer()
    }
}

/// Collects messages in memory.
impl MessageSink for Vec<Vec<u8>> {
    fn send(&mut self, message: &[u8]) -> io::Result<()> {
        self.push(message.to_vec());
        Ok(())
    }
}

/// Hands messages to another thread.
impl MessageSink for crossbeam_channel::Sender<Vec<u8>> {
    fn send(&mut self, message: &[u8]) -> io::Result<()> {
        crossbeam_channel::Sender::send(self, message.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "receiver disconnected"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_sink_collects() {
        let mut sink: Vec<Vec<u8>> = Vec::new();
        MessageSink::send(&mut sink, &[1, 2]).unwrap();
        assert_eq!(sink, vec![vec![1, 2]]);
        assert_eq!(sink.peer(), "client");
    }

    #[test]
    fn channel_sink_reports_disconnect() {
        let (mut tx, rx) = crossbeam_channel::unbounded::<Vec<u8>>();
        MessageSink::send(&mut tx, &[7]).unwrap();
        assert_eq!(rx.recv().unwrap(), vec![7]);
        drop(rx);
        let err = MessageSink::send(&mut tx, &[8]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
