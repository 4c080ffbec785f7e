use chrono::{DateTime, Local, TimeZone, Timelike};

pub const NANOS_PER_SEC: i64 = 1_000_000_000;
pub const NANOS_PER_HOUR: i64 = 3_600 * NANOS_PER_SEC;

/// Converts a query-engine second timestamp to the nanosecond timestamps events
/// carry. Spec fixes this conversion at `x1e9`, with no leap-second adjustment.
pub fn sec_to_ns(sec: i64) -> i64 {
    sec * NANOS_PER_SEC
}

/// The local-time hour an event timestamp belongs to, identified the way hour-file
/// names are: `YYYY-MM-DD-HH`. `start_ns`/`end_ns` bound the half-open interval
/// `[start_ns, end_ns)` that an hour-file accepts events for.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HourBucket {
    pub label: String,
    pub start_ns: i64,
    pub end_ns: i64,
}

impl HourBucket {
    pub fn contains(&self, ts_ns: i64) -> bool {
        ts_ns >= self.start_ns && ts_ns < self.end_ns
    }

    pub fn next(&self) -> HourBucket {
        hour_bucket(self.end_ns)
    }

    pub fn prev(&self) -> HourBucket {
        hour_bucket(self.start_ns - 1)
    }
}

/// Computes the hour bucket containing `ts_ns`, using local time as the spec
/// requires for hour-file naming.
pub fn hour_bucket(ts_ns: i64) -> HourBucket {
    let dt = local_datetime(ts_ns);
    let hour_start = dt.date_naive().and_hms_opt(dt.hour(), 0, 0).expect("valid hour");
    let start_local = Local.from_local_datetime(&hour_start).single().expect("unambiguous hour start");
    let start_ns = start_local.timestamp() * NANOS_PER_SEC;

    HourBucket {
        label: start_local.format("%Y-%m-%d-%H").to_string(),
        start_ns,
        end_ns: start_ns + NANOS_PER_HOUR,
    }
}

fn local_datetime(ts_ns: i64) -> DateTime<Local> {
    let secs = ts_ns.div_euclid(NANOS_PER_SEC);
    let nanos = ts_ns.rem_euclid(NANOS_PER_SEC) as u32;
    DateTime::from_timestamp(secs, nanos).expect("valid timestamp").with_timezone(&Local)
}

/// Parses an hour-file label (`YYYY-MM-DD-HH`) back into its bucket, used when
/// rebuilding the file index from a directory listing.
pub fn hour_bucket_from_label(label: &str) -> Option<HourBucket> {
    let dt = chrono::NaiveDateTime::parse_from_str(&format!("{label}:00:00"), "%Y-%m-%d-%H:%M:%S").ok()?;
    let start_local = Local.from_local_datetime(&dt).single()?;
    let start_ns = start_local.timestamp() * NANOS_PER_SEC;
    Some(HourBucket { label: label.to_string(), start_ns, end_ns: start_ns + NANOS_PER_HOUR })
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    fn test_hour_boundaries() {
        let b = hour_bucket(0);
        assert!(b.contains(0));
        assert!(!b.contains(b.end_ns));
        assert!(b.next().contains(b.end_ns));
    }

    #[rstest]
    fn test_roundtrip_label() {
        let b = hour_bucket(1_700_000_000 * NANOS_PER_SEC);
        let parsed = hour_bucket_from_label(&b.label).unwrap();
        assert_eq!(parsed.start_ns, b.start_ns);
    }
}
