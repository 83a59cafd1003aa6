use chrono::{DateTime, FixedOffset, Utc};

/// Asia/Shanghai. China has no daylight saving, so a fixed offset is exact.
pub const SHANGHAI: FixedOffset = match FixedOffset::east_opt(8 * 3600) {
    Some(offset) => offset,
    None => panic!("invalid UTC offset"),
};

/// Current time on the ranking site's clock, which decides what "today" is.
pub fn now_shanghai() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&SHANGHAI)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_shanghai_day_boundary() {
        // 16:30 UTC is already the next day in Shanghai
        let utc = Utc.with_ymd_and_hms(2025, 3, 1, 16, 30, 0).unwrap();
        let local = utc.with_timezone(&SHANGHAI);
        assert_eq!(local.date_naive().to_string(), "2025-03-02");
        assert_eq!(local.to_rfc3339(), "2025-03-02T00:30:00+08:00");
    }
}
