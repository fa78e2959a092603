//! Cache keys of the backend resources.

use crate::query::{QueryFilter, QueryKey};

pub const LISTINGS: &str = "listings";
pub const LISTING: &str = "listing";
pub const COMMENTS: &str = "comments";
pub const ME: &str = "me";

/// Top listings, one entry per limit.
#[must_use]
pub fn listings(limit: u32) -> QueryKey {
    QueryKey::new(LISTINGS).with("limit", limit)
}

/// Every cached top-listings page, whatever its limit.
#[must_use]
pub fn all_listings() -> QueryFilter {
    QueryFilter::resource(LISTINGS)
}

#[must_use]
pub fn listing(id: u64) -> QueryKey {
    QueryKey::new(LISTING).with("id", id)
}

#[must_use]
pub fn comments(listing_id: u64) -> QueryKey {
    QueryKey::new(COMMENTS).with("listing_id", listing_id)
}

#[must_use]
pub fn me() -> QueryKey {
    QueryKey::new(ME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_per_parameter() {
        assert_eq!(comments(1), comments(1));
        assert_ne!(comments(1), comments(2));
        assert_ne!(listing(1), comments(1));
        assert_eq!(listings(20).to_string(), "listings{limit=20}");
    }

    #[test]
    fn test_all_listings_ignores_limit() {
        assert!(all_listings().matches(&listings(20)));
        assert!(all_listings().matches(&listings(50)));
        assert!(!all_listings().matches(&listing(20)));
    }
}
