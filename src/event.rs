use std::io::{self, BufRead};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

#[derive(Debug, PartialEq, Eq)]
pub enum AppEvent {
    Line(String),
    Tick,
    /// Input closed.
    Eof,
}

/// Pumps input lines, and optionally periodic ticks, into one channel.
///
/// Both pump threads exit on their first failed send after the handler is dropped.
pub struct EventHandler {
    rx: mpsc::Receiver<AppEvent>,
    _tx: mpsc::Sender<AppEvent>,
}

impl EventHandler {
    pub fn stdin(tick_rate: Option<Duration>) -> Self {
        Self::from_reader(io::BufReader::new(io::stdin()), tick_rate)
    }

    pub fn from_reader(reader: impl BufRead + Send + 'static, tick_rate: Option<Duration>) -> Self {
        let (tx, rx) = mpsc::channel();
        let _tx = tx.clone();

        if let Some(rate) = tick_rate {
            let ticks = tx.clone();
            thread::spawn(move || {
                loop {
                    thread::sleep(rate);
                    if ticks.send(AppEvent::Tick).is_err() {
                        return;
                    }
                }
            });
        }

        thread::spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(AppEvent::Line(line.trim().to_string())).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        log::warn!("input read failed: {e}");
                        break;
                    }
                }
            }
            let _ = tx.send(AppEvent::Eof);
        });

        Self { rx, _tx }
    }

    pub fn next(&self) -> anyhow::Result<AppEvent> {
        Ok(self.rx.recv()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn lines_then_eof() {
        let events = EventHandler::from_reader(Cursor::new("a\n  2 \n"), None);
        assert_eq!(events.next().unwrap(), AppEvent::Line("a".into()));
        assert_eq!(events.next().unwrap(), AppEvent::Line("2".into()));
        assert_eq!(events.next().unwrap(), AppEvent::Eof);
    }

    #[test]
    fn ticks_arrive_without_input() {
        let (_keep_open, reader) = blocking_reader();
        let events = EventHandler::from_reader(reader, Some(Duration::from_millis(5)));
        assert_eq!(events.next().unwrap(), AppEvent::Tick);
        assert_eq!(events.next().unwrap(), AppEvent::Tick);
    }

    // A reader that blocks until the returned sender is dropped.
    fn blocking_reader() -> (mpsc::Sender<u8>, impl BufRead + Send + 'static) {
        struct ChannelReader(mpsc::Receiver<u8>);
        impl io::Read for ChannelReader {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                match self.0.recv() {
                    Ok(b) if !buf.is_empty() => {
                        buf[0] = b;
                        Ok(1)
                    }
                    _ => Ok(0),
                }
            }
        }
        let (tx, rx) = mpsc::channel();
        (tx, io::BufReader::new(ChannelReader(rx)))
    }
}
