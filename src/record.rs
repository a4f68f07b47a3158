use crate::error::{PartitionError, Result};
use crate::interval::{is_valid_rating, MAX_RATING, MIN_RATING};

/// One (user, item, rating) row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingRecord {
    pub user_id: i32,
    pub item_id: i32,
    pub rating: f64,
}

impl RatingRecord {
    pub fn new(user_id: i32, item_id: i32, rating: f64) -> Self {
        Self {
            user_id,
            item_id,
            rating,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !is_valid_rating(self.rating) {
            return Err(PartitionError::invalid_record(format!(
                "rating {} is outside [{MIN_RATING}, {MAX_RATING}]",
                self.rating
            )));
        }
        Ok(())
    }
}

/// Parse one line of a ratings file.
///
/// Accepts MovieLens `user::item::rating::timestamp` as well as plain
/// comma-separated rows. Fields after the rating are ignored. Returns
/// `Ok(None)` for blank lines.
pub fn parse_rating_line(line: &str, line_no: usize) -> Result<Option<RatingRecord>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let malformed = |reason: String| PartitionError::MalformedRecord {
        line: line_no,
        reason,
    };

    let mut fields: Vec<&str> = if line.contains("::") {
        line.split("::").collect()
    } else {
        line.split(',').collect()
    };
    if fields.len() < 3 {
        return Err(malformed(format!(
            "expected at least 3 fields, found {}",
            fields.len()
        )));
    }
    fields.truncate(3);

    let user_id: i32 = fields[0]
        .trim()
        .parse()
        .map_err(|e| malformed(format!("user id '{}': {e}", fields[0])))?;
    let item_id: i32 = fields[1]
        .trim()
        .parse()
        .map_err(|e| malformed(format!("item id '{}': {e}", fields[1])))?;
    let rating: f64 = fields[2]
        .trim()
        .parse()
        .map_err(|e| malformed(format!("rating '{}': {e}", fields[2])))?;

    if !is_valid_rating(rating) {
        return Err(malformed(format!(
            "rating {rating} is outside [{MIN_RATING}, {MAX_RATING}]"
        )));
    }

    Ok(Some(RatingRecord::new(user_id, item_id, rating)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_movielens_line() {
        let rec = parse_rating_line("1::122::5::838985046", 1).unwrap().unwrap();
        assert_eq!(rec, RatingRecord::new(1, 122, 5.0));
    }

    #[test]
    fn test_parse_csv_line() {
        let rec = parse_rating_line(" 7, 42, 3.5 ", 1).unwrap().unwrap();
        assert_eq!(rec, RatingRecord::new(7, 42, 3.5));
    }

    #[test]
    fn test_blank_line() {
        assert!(parse_rating_line("   ", 3).unwrap().is_none());
    }

    #[test]
    fn test_malformed_lines() {
        for (line, needle) in [
            ("1::2", "at least 3 fields"),
            ("x::2::3", "user id"),
            ("1::y::3", "item id"),
            ("1::2::abc", "rating 'abc'"),
            ("1::2::7.5", "outside"),
        ] {
            match parse_rating_line(line, 9) {
                Err(PartitionError::MalformedRecord { line: 9, reason }) => {
                    assert!(reason.contains(needle), "{line}: {reason}");
                }
                other => panic!("{line}: expected malformed record, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_validate() {
        assert!(RatingRecord::new(1, 1, 0.0).validate().is_ok());
        assert!(RatingRecord::new(1, 1, -1.0).validate().is_err());
        assert!(RatingRecord::new(1, 1, f64::INFINITY).validate().is_err());
    }
}
