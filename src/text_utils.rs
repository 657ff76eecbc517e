use std::ops::Index;

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

fn to_int<T: std::str::FromStr>(num_str: &str, date_str: &str) -> Result<T, String> {
    match num_str.parse::<T>() {
        Ok(x) => Ok(x),
        Err(_) => Err(format!("Error parsing {} from the date {}", num_str, date_str)),
    }
}

/// Parses `YYYY-M-D`. Month and day may be zero padded or not, nothing
/// else is accepted around the date.
pub fn parse_pub_date(buf: &str) -> Result<NaiveDate, String> {
    lazy_static! {
        static ref DATE_REGEX: Regex = Regex::new(r"^([0-9]{4})-([0-9]{1,2})-([0-9]{1,2})$").unwrap();
    }

    let Some(caps) = DATE_REGEX.captures(buf) else {
        return Err(format!("\"{}\" does not match YYYY-M-D", buf));
    };

    let y: i32 = to_int(caps.index(1), buf)?;
    let m: u32 = to_int(caps.index(2), buf)?;
    let d: u32 = to_int(caps.index(3), buf)?;

    NaiveDate::from_ymd_opt(y, m, d).ok_or_else(|| format!("\"{}\" is not a calendar date", buf))
}

/// Characters allowed in slugs and resource names of a URL.
pub fn is_valid_slug(slug: &str) -> bool {
    slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

/// Base file name without its last extension.
pub fn file_stem(path: &str) -> &str {
    let base = match path.rfind(['/', '\\']) {
        Some(i) => &path[i + 1..],
        None => path,
    };
    match base.rfind('.') {
        Some(i) => &base[..i],
        None => base,
    }
}
