use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Shortens a string to at most `max_length` bytes, ending it with `...` when
/// something was cut off. Never splits a UTF-8 codepoint.
#[must_use]
pub fn truncate_string(string: &str, max_length: usize) -> String {
    if string.len() <= max_length {
        return string.to_string();
    }

    let budget = max_length.saturating_sub(3);
    let cut = string
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= budget)
        .last()
        .unwrap_or(0);

    format!("{}...", &string[..cut])
}

/// Spawn a task that watches for CTRL + C signal and cancels a [`CancellationToken`] when caught
pub fn spawn_ct_watcher(ct: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Caught CTRL+C signal, stopping");
            ct.cancel();
        }
    });
}
