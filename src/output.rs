//! Output streams shared by the root context and all descendants.
//!
//! Both streams observe a single banner cell: the first write to either
//! stream emits the banner once, and the other stream suppresses it.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

#[derive(Debug, Default)]
pub(crate) struct BannerState {
    text: Option<String>,
    emitted: bool,
}

/// A serial writer wrapping a consumer-supplied sink.
#[derive(Clone)]
pub struct OutputStream {
    sink: Rc<RefCell<Box<dyn Write>>>,
    banner: Rc<RefCell<BannerState>>,
}

impl OutputStream {
    pub(crate) fn new(sink: Box<dyn Write>, banner: Rc<RefCell<BannerState>>) -> Self {
        Self {
            sink: Rc::new(RefCell::new(sink)),
            banner,
        }
    }

    /// Write a string, emitting the pending banner first if this is the
    /// first write on either stream.
    pub fn write_str(&self, text: &str) -> io::Result<()> {
        self.emit_banner()?;
        self.sink.borrow_mut().write_all(text.as_bytes())
    }

    pub fn write_line(&self, text: &str) -> io::Result<()> {
        self.write_str(text)?;
        self.sink.borrow_mut().write_all(b"\n")
    }

    pub fn flush(&self) -> io::Result<()> {
        self.sink.borrow_mut().flush()
    }

    fn emit_banner(&self) -> io::Result<()> {
        let mut banner = self.banner.borrow_mut();
        if banner.emitted {
            return Ok(());
        }
        if let Some(text) = banner.text.take() {
            banner.emitted = true;
            let mut sink = self.sink.borrow_mut();
            sink.write_all(text.as_bytes())?;
            sink.write_all(b"\n\n")?;
        }
        Ok(())
    }
}

impl Write for OutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.emit_banner()?;
        self.sink.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.borrow_mut().flush()
    }
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream").finish_non_exhaustive()
    }
}

/// The pair of streams handed to actions.
#[derive(Debug, Clone)]
pub struct Console {
    out: OutputStream,
    err: OutputStream,
}

impl Console {
    pub(crate) fn new(out: OutputStream, err: OutputStream) -> Self {
        Self { out, err }
    }

    pub fn out(&self) -> &OutputStream {
        &self.out
    }

    pub fn err(&self) -> &OutputStream {
        &self.err
    }

    pub fn flush(&self) -> io::Result<()> {
        self.out.flush()?;
        self.err.flush()
    }
}

/// Create the shared banner cell and the two streams observing it.
pub(crate) fn make_streams(
    stdout: Box<dyn Write>,
    stderr: Box<dyn Write>,
) -> (Console, Rc<RefCell<BannerState>>) {
    let banner = Rc::new(RefCell::new(BannerState::default()));
    let out = OutputStream::new(stdout, banner.clone());
    let err = OutputStream::new(stderr, banner.clone());
    (Console::new(out, err), banner)
}

pub(crate) fn set_banner(cell: &Rc<RefCell<BannerState>>, text: Option<String>) {
    let mut state = cell.borrow_mut();
    state.text = text;
    state.emitted = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.borrow()).to_string()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn banner_goes_to_first_writer_only() {
        let out_buf = SharedBuf::default();
        let err_buf = SharedBuf::default();
        let (console, banner) =
            make_streams(Box::new(out_buf.clone()), Box::new(err_buf.clone()));
        set_banner(&banner, Some("My Tool v1".to_string()));

        console.err().write_str("boom\n").unwrap();
        console.out().write_str("hello\n").unwrap();

        assert_eq!(err_buf.contents(), "My Tool v1\n\nboom\n");
        assert_eq!(out_buf.contents(), "hello\n");
    }

    #[test]
    fn no_banner_when_unset() {
        let out_buf = SharedBuf::default();
        let (console, _banner) =
            make_streams(Box::new(out_buf.clone()), Box::new(std::io::sink()));
        console.out().write_str("plain\n").unwrap();
        assert_eq!(out_buf.contents(), "plain\n");
    }
}
