//! Best-effort clipboard writes.

use std::{thread, time::Duration};

use log::debug;

use crate::error::{Error, Result};

/// How long the written value is held before checking it is still there.
pub const HOLD: Duration = Duration::from_millis(100);

pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> Result<()>;

    /// Current text content, `None` when the clipboard holds no text.
    fn get_text(&mut self) -> Result<Option<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardOutcome {
    Copied,
    /// Another writer replaced our value within [`HOLD`].
    Superseded,
}

/// Writes `text` and reports whether it survived the hold period.
pub fn copy<C: Clipboard>(
    clipboard: &mut C,
    text: &str,
    hold: Duration,
) -> Result<ClipboardOutcome> {
    clipboard.set_text(text)?;
    thread::sleep(hold);

    let outcome = match clipboard.get_text()? {
        Some(current) if current == text => ClipboardOutcome::Copied,
        _ => ClipboardOutcome::Superseded,
    };
    debug!("Clipboard write: {outcome:?}");
    Ok(outcome)
}

/// The desktop clipboard.
pub struct SystemClipboard(arboard::Clipboard);

impl SystemClipboard {
    pub fn new() -> Result<Self> {
        arboard::Clipboard::new()
            .map(Self)
            .map_err(|e| Error::Clipboard(e.to_string()))
    }
}

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        self.0
            .set_text(text)
            .map_err(|e| Error::Clipboard(e.to_string()))
    }

    fn get_text(&mut self) -> Result<Option<String>> {
        match self.0.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(Error::Clipboard(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MemoryClipboard {
        text: Option<String>,
        overwrite_with: Option<String>,
    }

    impl Clipboard for MemoryClipboard {
        fn set_text(&mut self, text: &str) -> Result<()> {
            self.text = Some(text.to_string());
            Ok(())
        }

        fn get_text(&mut self) -> Result<Option<String>> {
            if let Some(other) = self.overwrite_with.take() {
                self.text = Some(other);
            }
            Ok(self.text.clone())
        }
    }

    #[test]
    fn value_still_present_is_copied() {
        let mut clipboard = MemoryClipboard::default();
        let outcome = copy(&mut clipboard, "export AWS_PROFILE=dev", Duration::ZERO).unwrap();
        assert_eq!(outcome, ClipboardOutcome::Copied);
    }

    #[test]
    fn concurrent_write_supersedes() {
        let mut clipboard = MemoryClipboard {
            overwrite_with: Some("something else".to_string()),
            ..Default::default()
        };
        let outcome = copy(&mut clipboard, "export AWS_PROFILE=dev", Duration::ZERO).unwrap();
        assert_eq!(outcome, ClipboardOutcome::Superseded);
    }
}
