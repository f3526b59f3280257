//! Page arithmetic for index-based range reads

use crate::error::{RedkitError, RedkitResult};

/// Inclusive index range `[start, stop]` covering one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: i64,
    pub stop: i64,
}

impl PageRange {
    /// Range of page `page` (1-based) with `page_size` items per page
    ///
    /// `start = (page - 1) * page_size`, `stop = page * page_size - 1`.
    pub fn new(page: i64, page_size: i64) -> RedkitResult<Self> {
        if page < 1 {
            return Err(RedkitError::argument("page", "page must be at least 1"));
        }
        if page_size < 1 {
            return Err(RedkitError::argument(
                "page_size",
                "page size must be at least 1",
            ));
        }

        let overflow = || RedkitError::argument("page", "page range overflows");
        let start = (page - 1).checked_mul(page_size).ok_or_else(overflow)?;
        let stop = page
            .checked_mul(page_size)
            .and_then(|end| end.checked_sub(1))
            .ok_or_else(overflow)?;

        Ok(Self { start, stop })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page() {
        assert_eq!(
            PageRange::new(1, 10).unwrap(),
            PageRange { start: 0, stop: 9 }
        );
    }

    #[test]
    fn test_second_page() {
        assert_eq!(PageRange::new(2, 3).unwrap(), PageRange { start: 3, stop: 5 });
    }

    #[test]
    fn test_invalid_page() {
        let err = PageRange::new(0, 10).unwrap_err();
        assert!(matches!(err, RedkitError::Argument { name: "page", .. }));
    }

    #[test]
    fn test_invalid_page_size() {
        let err = PageRange::new(1, 0).unwrap_err();
        assert!(matches!(err, RedkitError::Argument { name: "page_size", .. }));
    }

    #[test]
    fn test_overflow_is_rejected() {
        assert!(PageRange::new(i64::MAX, 2).is_err());
    }
}
