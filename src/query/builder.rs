/// The four searches the API can run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Most recent scrape of every listing
    Latest,
    /// Every scrape on record
    Entire,
    /// Average price per square meter, bucketed by scrape day
    PricesOverTime,
    /// (link, scrape time, price) observations per listing
    PriceChange,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Latest => "latest",
            QueryKind::Entire => "entire",
            QueryKind::PricesOverTime => "prices_over_time",
            QueryKind::PriceChange => "price_change",
        }
    }

    /// SQL for this kind. Parameters: `?1` city, `?2` min size, `?3` max size.
    pub fn sql(&self) -> &'static str {
        match self {
            QueryKind::Latest => LATEST_SQL,
            QueryKind::Entire => ENTIRE_SQL,
            QueryKind::PricesOverTime => PRICES_OVER_TIME_SQL,
            QueryKind::PriceChange => PRICE_CHANGE_SQL,
        }
    }
}

const LATEST_SQL: &str = "
    SELECT l.link, l.city, l.area, l.address, l.price, l.rooms, l.size, l.price_sqm, l.scrap_time
    FROM listings l
    WHERE l.city = ?1
      AND l.size BETWEEN ?2 AND ?3
      AND l.scrap_time = (SELECT MAX(r.scrap_time) FROM listings r WHERE r.link = l.link)
    ORDER BY l.link";

const ENTIRE_SQL: &str = "
    SELECT link, city, area, address, price, rooms, size, price_sqm, scrap_time
    FROM listings
    WHERE city = ?1
      AND size BETWEEN ?2 AND ?3
    ORDER BY scrap_time, link";

const PRICES_OVER_TIME_SQL: &str = "
    SELECT date(scrap_time) AS scrapped_time,
           ROUND(AVG(price_sqm), 2) AS average_price_sqm
    FROM listings
    WHERE city = ?1
      AND size BETWEEN ?2 AND ?3
    GROUP BY date(scrap_time)
    ORDER BY date(scrap_time)";

const PRICE_CHANGE_SQL: &str = "
    SELECT link, scrap_time, price
    FROM listings
    WHERE city = ?1
      AND size BETWEEN ?2 AND ?3
    ORDER BY link, scrap_time";

/// A fully parameterized search, ready for a store to execute
///
/// Size bounds are kept exactly as received from the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub kind: QueryKind,
    pub city: String,
    pub min_size: String,
    pub max_size: String,
}

impl SearchQuery {
    pub fn build(
        kind: QueryKind,
        city: impl Into<String>,
        min_size: impl Into<String>,
        max_size: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            city: city.into(),
            min_size: min_size.into(),
            max_size: max_size.into(),
        }
    }

    pub fn sql(&self) -> &'static str {
        self.kind.sql()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_passes_bounds_through_untouched() {
        let query = SearchQuery::build(QueryKind::Entire, "Warsaw", " 30", "fifty");
        assert_eq!(query.city, "Warsaw");
        assert_eq!(query.min_size, " 30");
        assert_eq!(query.max_size, "fifty");
    }

    #[test]
    fn every_kind_filters_on_city_and_size() {
        for kind in [
            QueryKind::Latest,
            QueryKind::Entire,
            QueryKind::PricesOverTime,
            QueryKind::PriceChange,
        ] {
            let sql = kind.sql();
            assert!(sql.contains("city = ?1"), "{}", kind.as_str());
            assert!(sql.contains("BETWEEN ?2 AND ?3"), "{}", kind.as_str());
        }
    }

    #[test]
    fn aggregate_columns_match_transform_expectations() {
        let sql = QueryKind::PricesOverTime.sql();
        assert!(sql.contains("AS scrapped_time"));
        assert!(sql.contains("AS average_price_sqm"));
        let sql = QueryKind::PriceChange.sql();
        assert!(sql.contains("SELECT link, scrap_time, price"));
    }
}
