use std::time::Duration;

pub(crate) fn human_size(bytes: impl humansize::ToF64 + humansize::Unsigned) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Formats the duration as `HH:MM:SS`. Hours aren't wrapped at 24.
pub(crate) fn human_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::{expect, Expect};

    #[track_caller]
    fn assert_duration(secs: u64, expected: Expect) {
        expected.assert_eq(&human_duration(Duration::from_secs(secs)));
    }

    #[test]
    fn durations() {
        use assert_duration as test;
        test(0, expect!["00:00:00"]);
        test(59, expect!["00:00:59"]);
        test(61, expect!["00:01:01"]);
        test(3600 * 25 + 5, expect!["25:00:05"]);
    }

    #[test]
    fn sizes() {
        expect!["0 B"].assert_eq(&human_size(0_u64));
        expect!["5.33 KiB"].assert_eq(&human_size(5456_u64));
    }
}
