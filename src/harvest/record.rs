use crate::harvest::extractor::RawRecord;
use crate::harvest::target::Target;
use crate::url::canonicalize_link;
use crate::ExtractionError;
use chrono::{DateTime, Utc};

/// Availability stored when a listing does not state one
pub const UNKNOWN_AVAILABILITY: &str = "Unknown";

/// Accepted price range, inclusive
pub const PRICE_RANGE: std::ops::RangeInclusive<f64> = 0.01..=100_000.0;

/// Longest accepted product name, in characters
pub const MAX_NAME_CHARS: usize = 500;

/// Stock level read from a listing's availability text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityStatus {
    InStock,
    OutOfStock,
    LimitedStock,
    Unknown,
}

impl AvailabilityStatus {
    /// Classifies free availability text, case-insensitively
    ///
    /// Out-of-stock phrases are checked first so "unavailable" never reads
    /// as "available".
    pub fn from_text(text: &str) -> Self {
        let text = text.to_lowercase();
        let has = |terms: &[&str]| terms.iter().any(|t| text.contains(t));

        if has(&["out of stock", "unavailable", "sold out"]) {
            Self::OutOfStock
        } else if has(&["limited", "few left", "low stock"]) {
            Self::LimitedStock
        } else if has(&["in stock", "available", "ready"]) {
            Self::InStock
        } else {
            Self::Unknown
        }
    }

    pub fn to_db_string(self) -> &'static str {
        match self {
            Self::InStock => "in_stock",
            Self::OutOfStock => "out_of_stock",
            Self::LimitedStock => "limited_stock",
            Self::Unknown => "unknown",
        }
    }
}

/// A validated product listing ready to persist
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    /// Price text as shown on the page
    pub price_raw: Option<String>,
    pub price: Option<f64>,
    /// Canonical link, the deduplication key
    pub link: String,
    pub image: Option<String>,
    pub availability: String,
    pub availability_status: AvailabilityStatus,
    pub source: String,
    pub search_term: String,
    pub job_id: i64,
    pub scraped_at: DateTime<Utc>,
}

impl Record {
    /// Validates a raw record scraped from `target`
    ///
    /// The link is resolved against the target URL and canonicalized; a
    /// relative image path is resolved the same way. A price that cannot be
    /// parsed is kept as text only.
    ///
    /// # Errors
    ///
    /// * `ExtractionError::MissingField` - No name or no link
    /// * `ExtractionError::NameTooLong` - Name over `MAX_NAME_CHARS`
    /// * `ExtractionError::BadLink` - The link cannot be canonicalized
    /// * `ExtractionError::PriceOutOfRange` - Parsed price outside `PRICE_RANGE`
    pub fn from_raw(raw: RawRecord, target: &Target, job_id: i64) -> Result<Self, ExtractionError> {
        let name = raw.name.ok_or(ExtractionError::MissingField("name"))?;
        let name_chars = name.chars().count();
        if name_chars > MAX_NAME_CHARS {
            return Err(ExtractionError::NameTooLong(name_chars));
        }

        let href = raw.link.ok_or(ExtractionError::MissingField("link"))?;
        let link = canonicalize_link(&href, &target.url)?;

        let image = raw
            .image
            .map(|src| match target.url.join(&src) {
                Ok(url) => url.to_string(),
                Err(_) => src,
            });

        let price = raw.price.as_deref().and_then(normalize_price);
        if let Some(value) = price {
            if !PRICE_RANGE.contains(&value) {
                return Err(ExtractionError::PriceOutOfRange(value));
            }
        }

        let availability = raw
            .availability
            .unwrap_or_else(|| UNKNOWN_AVAILABILITY.to_string());

        Ok(Self {
            name,
            price_raw: raw.price,
            price,
            link: link.to_string(),
            image,
            availability_status: AvailabilityStatus::from_text(&availability),
            availability,
            source: target.source.clone(),
            search_term: target.search_term.clone(),
            job_id,
            scraped_at: Utc::now(),
        })
    }
}

/// Parses a displayed price into a number
///
/// Everything but ASCII digits and the decimal point is dropped, so currency
/// symbols and thousands separators disappear: `"$1,299.00"` becomes `1299.0`.
///
/// # Returns
///
/// `None` when nothing numeric is left
pub fn normalize_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    cleaned.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn target() -> Target {
        Target {
            source: "books".to_string(),
            search_term: "poetry".to_string(),
            page: 2,
            url: Url::parse("https://www.books.example.com/catalogue/page-2.html").unwrap(),
        }
    }

    fn raw() -> RawRecord {
        RawRecord {
            name: Some("A Light in the Attic".to_string()),
            price: Some("£51.77".to_string()),
            link: Some("a-light-in-the-attic_1000/index.html?utm_source=list".to_string()),
            image: Some("../media/cache/a.jpg".to_string()),
            availability: Some("In stock".to_string()),
        }
    }

    #[test]
    fn test_normalize_price() {
        assert_eq!(normalize_price("$1,299.00"), Some(1299.0));
        assert_eq!(normalize_price("£51.77"), Some(51.77));
        assert_eq!(normalize_price("  19 "), Some(19.0));
        assert_eq!(normalize_price("Currently unavailable"), None);
        assert_eq!(normalize_price(""), None);
        assert_eq!(normalize_price("1.2.3"), None);
    }

    #[test]
    fn test_from_raw() {
        let record = Record::from_raw(raw(), &target(), 7).unwrap();

        assert_eq!(record.name, "A Light in the Attic");
        assert_eq!(record.price, Some(51.77));
        assert_eq!(record.price_raw.as_deref(), Some("£51.77"));
        assert_eq!(
            record.link,
            "https://books.example.com/catalogue/a-light-in-the-attic_1000/index.html"
        );
        assert_eq!(
            record.image.as_deref(),
            Some("https://www.books.example.com/media/cache/a.jpg")
        );
        assert_eq!(record.availability_status, AvailabilityStatus::InStock);
        assert_eq!(record.source, "books");
        assert_eq!(record.search_term, "poetry");
        assert_eq!(record.job_id, 7);
    }

    #[test]
    fn test_missing_availability_defaults() {
        let mut r = raw();
        r.availability = None;
        let record = Record::from_raw(r, &target(), 1).unwrap();
        assert_eq!(record.availability, UNKNOWN_AVAILABILITY);
        assert_eq!(record.availability_status, AvailabilityStatus::Unknown);
    }

    #[test]
    fn test_availability_status() {
        use AvailabilityStatus::*;

        assert_eq!(AvailabilityStatus::from_text("In stock (22 available)"), InStock);
        assert_eq!(AvailabilityStatus::from_text("Ready to ship"), InStock);
        assert_eq!(AvailabilityStatus::from_text("Currently unavailable."), OutOfStock);
        assert_eq!(AvailabilityStatus::from_text("SOLD OUT"), OutOfStock);
        assert_eq!(AvailabilityStatus::from_text("Only a few left"), LimitedStock);
        assert_eq!(AvailabilityStatus::from_text("Ships in 3 weeks"), Unknown);
        assert_eq!(OutOfStock.to_db_string(), "out_of_stock");
    }

    #[test]
    fn test_price_out_of_range() {
        let mut r = raw();
        r.price = Some("$0.00".to_string());
        assert!(matches!(
            Record::from_raw(r, &target(), 1),
            Err(ExtractionError::PriceOutOfRange(_))
        ));

        let mut r = raw();
        r.price = Some("$250,000".to_string());
        assert!(matches!(
            Record::from_raw(r, &target(), 1),
            Err(ExtractionError::PriceOutOfRange(_))
        ));

        let mut r = raw();
        r.price = Some("$100,000.00".to_string());
        assert_eq!(Record::from_raw(r, &target(), 1).unwrap().price, Some(100_000.0));
    }

    #[test]
    fn test_name_too_long() {
        let mut r = raw();
        r.name = Some("é".repeat(MAX_NAME_CHARS));
        assert!(Record::from_raw(r, &target(), 1).is_ok());

        let mut r = raw();
        r.name = Some("a".repeat(MAX_NAME_CHARS + 1));
        assert!(matches!(
            Record::from_raw(r, &target(), 1),
            Err(ExtractionError::NameTooLong(501))
        ));
    }

    #[test]
    fn test_unparsable_price_kept_raw() {
        let mut r = raw();
        r.price = Some("See options".to_string());
        let record = Record::from_raw(r, &target(), 1).unwrap();
        assert_eq!(record.price, None);
        assert_eq!(record.price_raw.as_deref(), Some("See options"));
    }

    #[test]
    fn test_missing_name_or_link() {
        let mut r = raw();
        r.name = None;
        assert!(matches!(
            Record::from_raw(r, &target(), 1),
            Err(ExtractionError::MissingField("name"))
        ));

        let mut r = raw();
        r.link = None;
        assert!(matches!(
            Record::from_raw(r, &target(), 1),
            Err(ExtractionError::MissingField("link"))
        ));
    }

    #[test]
    fn test_bad_link() {
        let mut r = raw();
        r.link = Some("javascript:void(0)".to_string());
        assert!(matches!(
            Record::from_raw(r, &target(), 1),
            Err(ExtractionError::BadLink(_))
        ));
    }
}
