/// Log raw wire data.
///
/// `loud` raises the output from trace to debug, used for the config dump flags.
pub(crate) fn log_data(what: &str, data: &[u8], loud: bool) {
    let level = if loud {
        log::Level::Debug
    } else {
        log::Level::Trace
    };

    if !log_enabled!(level) {
        return;
    }

    log!(
        level,
        "{} ({} bytes):\n{}",
        what,
        data.len(),
        String::from_utf8_lossy(data)
    );
}

/// Case insensitive ascii prefix test.
pub(crate) fn starts_with_ignore_case(s: &[u8], prefix: &[u8]) -> bool {
    s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}
