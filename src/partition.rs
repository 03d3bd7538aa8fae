use std::fmt;

use chrono::{Duration, NaiveDate};

use crate::{Error, Result, MAX_RANGE_DAYS};

/// Date format the search backend expects, e.g. `2021:06:15`.
pub const DATE_FORMAT: &str = "%Y:%m:%d";

/// Inclusive, immutable query window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days between `start` and `end`.
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn start_param(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Parses `YYYY:MM:DD`. The dashed ISO form is accepted too.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(input, "%Y-%m-%d"))
        .map_err(|_| Error::InvalidDate(input.to_string()))
}

/// Splits `[start, end]` into windows of at most `MAX_RANGE_DAYS`, walking
/// backward from `end`. The result is ordered oldest first, and the first
/// window always starts exactly at `start`.
pub fn partition_backward(start: NaiveDate, end: NaiveDate) -> Result<Vec<DateRange>> {
    if start > end {
        return Err(Error::InvalidRange { start, end });
    }

    let mut ranges = Vec::new();
    let mut chunk_end = end;
    loop {
        let chunk_start = (chunk_end - Duration::days(MAX_RANGE_DAYS)).max(start);
        ranges.push(DateRange {
            start: chunk_start,
            end: chunk_end,
        });
        if chunk_start == start {
            break;
        }
        chunk_end = chunk_start - Duration::days(1);
    }

    ranges.reverse();
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn assert_covers(ranges: &[DateRange], start: NaiveDate, end: NaiveDate) {
        assert_eq!(ranges.first().unwrap().start(), start);
        assert_eq!(ranges.last().unwrap().end(), end);
        for range in ranges {
            assert!(range.start() <= range.end());
            assert!(range.span_days() <= MAX_RANGE_DAYS);
        }
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end() + Duration::days(1), pair[1].start());
        }
    }

    #[test]
    fn single_day_is_one_range() {
        let day = date(2020, 1, 1);
        let ranges = partition_backward(day, day).unwrap();
        assert_eq!(ranges, vec![DateRange::new(day, day).unwrap()]);
    }

    #[test]
    fn short_span_is_returned_unchanged() {
        let ranges = partition_backward(date(2020, 3, 1), date(2021, 3, 1)).unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].start(), date(2020, 3, 1));
        assert_eq!(ranges[0].end(), date(2021, 3, 1));
    }

    #[test]
    fn long_span_is_split_oldest_first() {
        let start = date(2019, 1, 1);
        let end = date(2021, 6, 15);
        let ranges = partition_backward(start, end).unwrap();

        assert_eq!(ranges.len(), 3);
        assert_covers(&ranges, start, end);
        assert_eq!(ranges[2].start(), date(2020, 6, 15));
        assert_eq!(ranges[1].end(), date(2020, 6, 14));
    }

    #[test]
    fn leftover_single_day_gets_its_own_range() {
        // end - 365 days lands one day after start.
        let start = date(2020, 1, 1);
        let end = date(2021, 1, 1);
        let ranges = partition_backward(start, end).unwrap();

        assert_eq!(ranges.len(), 2);
        assert_covers(&ranges, start, end);
        assert_eq!(ranges[0], DateRange::new(start, start).unwrap());
    }

    #[test]
    fn many_spans_cover_exactly() {
        let start = date(2015, 2, 27);
        for extra in [0, 1, 364, 365, 366, 730, 731, 1000, 2500] {
            let end = start + Duration::days(extra);
            let ranges = partition_backward(start, end).unwrap();
            assert_covers(&ranges, start, end);
        }
    }

    #[test]
    fn reversed_dates_are_rejected() {
        let err = partition_backward(date(2021, 1, 2), date(2021, 1, 1)).unwrap_err();
        assert!(matches!(err, Error::InvalidRange { .. }));
    }

    #[test]
    fn parses_both_date_forms() {
        assert_eq!(parse_date("2021:06:15").unwrap(), date(2021, 6, 15));
        assert_eq!(parse_date(" 2021-06-15 ").unwrap(), date(2021, 6, 15));
        assert!(matches!(parse_date("15/06/2021"), Err(Error::InvalidDate(_))));
    }

    #[test]
    fn formats_backend_params() {
        let range = DateRange::new(date(2020, 1, 5), date(2020, 12, 31)).unwrap();
        assert_eq!(range.start_param(), "2020:01:05");
        assert_eq!(range.end_param(), "2020:12:31");
    }
}
