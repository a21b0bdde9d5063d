// src/progress.rs

//! Byte-count progress for downloads and file copies

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, IsTerminal};

const BAR_TEMPLATE: &str = "{prefix}: {bytes}/{total_bytes} [{bar:30}] {bytes_per_sec}";
const SPINNER_TEMPLATE: &str = "{prefix}: {spinner} {bytes} {bytes_per_sec}";

/// Progress for a transfer of `len` bytes, or a spinner when the size is unknown
///
/// Only drawn when stderr is a terminal, so logs and pipes stay clean.
pub fn transfer(prefix: &str, len: Option<u64>) -> ProgressBar {
    let bar = match len {
        Some(len) => ProgressBar::new(len).with_style(style(BAR_TEMPLATE)),
        None => ProgressBar::new_spinner().with_style(style(SPINNER_TEMPLATE)),
    };

    if !io::stderr().is_terminal() {
        bar.set_draw_target(ProgressDrawTarget::hidden());
    }

    bar.with_prefix(prefix.to_string())
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_transfer_counts_bytes() {
        let bar = transfer("raylib.zip", Some(11));
        assert_eq!(bar.length(), Some(11));

        let mut data = Vec::new();
        bar.wrap_read(&b"raylib-5.0\n"[..])
            .read_to_end(&mut data)
            .unwrap();
        assert_eq!(bar.position(), 11);
        assert_eq!(data, b"raylib-5.0\n");
        bar.finish_and_clear();
    }

    #[test]
    fn test_unknown_size_uses_spinner() {
        let bar = transfer("index", None);
        assert_eq!(bar.length(), None);
        assert_eq!(bar.position(), 0);
    }
}
