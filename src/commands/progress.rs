use std::io::IsTerminal;

use indicatif::{ProgressBar, ProgressStyle};

/// Spinner on stderr, hidden when stderr is not a terminal.
pub fn spinner(message: &str) -> ProgressBar {
    if !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let s = ProgressBar::new_spinner();
    #[expect(clippy::expect_used, reason = "static template string")]
    s.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("{spinner} {msg}")
            .expect("valid template"),
    );
    s.set_message(message.to_string());
    s.enable_steady_tick(std::time::Duration::from_millis(80));
    s
}
