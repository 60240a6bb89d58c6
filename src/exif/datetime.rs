// src/exif/datetime.rs
//
// The date-time value EXIF spreads across three tags (DateTimeOriginal,
// SubSecTimeOriginal, OffsetTimeOriginal), resolved into one value with a
// round-trippable string form `Y:m:d H:i:s.ffffff+HH:MM`.

use crate::error::{ImagemillError, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExifDateTime {
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    microsecond: u32,
    /// UTC offset in minutes, east positive
    offset_minutes: i32,
}

fn parse_component(s: &str, name: &'static str) -> Result<u32> {
    s.parse::<u32>().map_err(|_| {
        ImagemillError::unexpected_value(format!("invalid {name} component '{s}' in EXIF date"))
    })
}

fn check_range(value: u32, min: u32, max: u32, name: &'static str) -> Result<()> {
    if value < min || value > max {
        return Err(ImagemillError::unexpected_value(format!(
            "{name} {value} out of range {min}-{max} in EXIF date"
        )));
    }
    Ok(())
}

impl ExifDateTime {
    /// Build from the tag triple. `subseconds` is the raw SubSecTime digit
    /// string (fractional digits, possibly padded with NUL or space);
    /// a missing `offset` means UTC.
    pub fn from_exif(
        datetime: &str,
        subseconds: Option<&str>,
        offset: Option<&str>,
    ) -> Result<Self> {
        let (date, time) = datetime.split_once(' ').ok_or_else(|| {
            ImagemillError::unexpected_value(format!("invalid EXIF date-time '{datetime}'"))
        })?;

        let mut date_parts = date.splitn(3, ':');
        let year = parse_component(date_parts.next().unwrap_or(""), "year")?;
        let month = parse_component(date_parts.next().unwrap_or(""), "month")?;
        let day = parse_component(date_parts.next().unwrap_or(""), "day")?;

        let mut time_parts = time.splitn(3, ':');
        let hour = parse_component(time_parts.next().unwrap_or(""), "hour")?;
        let minute = parse_component(time_parts.next().unwrap_or(""), "minute")?;
        let second = parse_component(time_parts.next().unwrap_or(""), "second")?;

        check_range(year, 1, 9999, "year")?;
        check_range(month, 1, 12, "month")?;
        check_range(day, 1, 31, "day")?;
        check_range(hour, 0, 23, "hour")?;
        check_range(minute, 0, 59, "minute")?;
        check_range(second, 0, 60, "second")?;

        let microsecond = match subseconds {
            Some(raw) => {
                // cameras pad SubSecTime with NUL or space
                let digits = raw.trim_end_matches(['\0', ' ']);
                if digits.is_empty() {
                    0
                } else {
                    if digits.len() > 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
                        return Err(ImagemillError::unexpected_value(format!(
                            "invalid EXIF subseconds '{digits}'"
                        )));
                    }
                    // fractional digits: "123" means .123000 seconds
                    let padded = format!("{digits:0<6}");
                    padded.parse::<u32>().unwrap_or(0)
                }
            }
            None => 0,
        };

        let offset_minutes = match offset {
            None => 0,
            Some("Z") => 0,
            Some(raw) => Self::parse_offset(raw)?,
        };

        Ok(Self {
            year: year as u16,
            month: month as u8,
            day: day as u8,
            hour: hour as u8,
            minute: minute as u8,
            second: second as u8,
            microsecond,
            offset_minutes,
        })
    }

    /// Parse the full round-trip form produced by `Display`.
    /// The fractional and offset parts are optional on input.
    pub fn parse(s: &str) -> Result<Self> {
        // split the offset first (a sign after the time portion)
        let (rest, offset) = match s.rfind(['+', '-']) {
            Some(idx) if idx > 10 => (&s[..idx], Some(&s[idx..])),
            _ => (s, None),
        };
        let (datetime, subseconds) = match rest.split_once('.') {
            Some((dt, frac)) => (dt, Some(frac)),
            None => (rest, None),
        };
        Self::from_exif(datetime, subseconds, offset)
    }

    fn parse_offset(raw: &str) -> Result<i32> {
        let bad =
            || ImagemillError::unexpected_value(format!("invalid EXIF time offset '{raw}'"));
        let (sign, body) = match raw.bytes().next() {
            Some(b'+') => (1, &raw[1..]),
            Some(b'-') => (-1, &raw[1..]),
            _ => return Err(bad()),
        };
        let (hours, minutes) = body.split_once(':').ok_or_else(bad)?;
        let hours: i32 = hours.parse().map_err(|_| bad())?;
        let minutes: i32 = minutes.parse().map_err(|_| bad())?;
        if !(0..=14).contains(&hours) || !(0..=59).contains(&minutes) {
            return Err(bad());
        }
        Ok(sign * (hours * 60 + minutes))
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day(&self) -> u8 {
        self.day
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn second(&self) -> u8 {
        self.second
    }

    pub fn microsecond(&self) -> u32 {
        self.microsecond
    }

    pub fn offset_minutes(&self) -> i32 {
        self.offset_minutes
    }
}

impl fmt::Display for ExifDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.offset_minutes < 0 { '-' } else { '+' };
        let abs = self.offset_minutes.unsigned_abs();
        write!(
            f,
            "{:04}:{:02}:{:02} {:02}:{:02}:{:02}.{:06}{}{:02}:{:02}",
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.microsecond,
            sign,
            abs / 60,
            abs % 60,
        )
    }
}
