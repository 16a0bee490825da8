//! Progress indicator for the stream command.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner showing frame and capture counts.
pub fn create_stream_spinner(source_name: &str, enabled: bool) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] {source_name}: {{msg}}"
            ))
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Finish a spinner with a message.
pub fn finish_progress(pb: Option<&ProgressBar>, message: &str) {
    if let Some(pb) = pb {
        pb.finish_with_message(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_spinner_is_none() {
        assert!(create_stream_spinner("frames", false).is_none());
    }

    #[test]
    fn test_spinner_finishes() {
        let pb = create_stream_spinner("frames", true);
        assert!(pb.is_some());
        finish_progress(pb.as_ref(), "done");
        assert!(pb.is_some_and(|pb| pb.is_finished()));
    }
}
