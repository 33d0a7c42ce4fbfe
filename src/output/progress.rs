use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::bright_green;

/// Spinner shown on stderr while a fetch is in flight. Call
/// [`finish_fetch`] (or drop it) before printing results to stdout.
pub fn fetch_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

pub fn finish_fetch(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(bright_green(format!("{message} ✓")).to_string());
}
