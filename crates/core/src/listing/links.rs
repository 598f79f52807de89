//! Turning listing links into links that open with the search's stay dates.

use url::Url;

/// Stay parameters carried over from a search URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StayParams {
    pub checkin: String,
    pub checkout: String,
    pub adults: String,
    pub children: String,
    pub infants: String,
    pub pets: String,
}

impl StayParams {
    /// Read stay parameters from a search URL. Missing values are empty.
    pub fn from_search_url(search_url: &str) -> Self {
        match Url::parse(search_url) {
            Ok(url) => Self::from_query(url.query_pairs()),
            Err(_) => Self::default(),
        }
    }

    /// Read stay parameters from decoded query pairs.
    pub fn from_query<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "checkin" => &mut params.checkin,
                "checkout" => &mut params.checkout,
                "adults" => &mut params.adults,
                "children" => &mut params.children,
                "infants" => &mut params.infants,
                "pets" => &mut params.pets,
                _ => continue,
            };
            // First occurrence wins, like URLSearchParams::get
            if slot.is_empty() {
                *slot = value.as_ref().to_string();
            }
        }
        params
    }

    /// Fill values missing here from `other`.
    pub fn or_from(mut self, other: &StayParams) -> Self {
        for (slot, fallback) in [
            (&mut self.checkin, &other.checkin),
            (&mut self.checkout, &other.checkout),
            (&mut self.adults, &other.adults),
            (&mut self.children, &other.children),
            (&mut self.infants, &other.infants),
            (&mut self.pets, &other.pets),
        ] {
            if slot.is_empty() {
                slot.clone_from(fallback);
            }
        }
        self
    }

    /// Query pairs to set on a listing URL.
    ///
    /// Dates and guest counts are always present (possibly empty); infants
    /// and pets only when the search specified them.
    pub fn listing_query(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("check_in", self.checkin.clone()),
            ("check_out", self.checkout.clone()),
            ("adults", self.adults.clone()),
            ("children", self.children.clone()),
        ];
        if !self.infants.is_empty() {
            pairs.push(("infants", self.infants.clone()));
        }
        if !self.pets.is_empty() {
            pairs.push(("pets", self.pets.clone()));
        }
        pairs
    }

    /// Rewrite `listing_url` so it carries these stay parameters.
    ///
    /// Existing values for the same keys are replaced. A listing URL that
    /// cannot be parsed is returned unchanged.
    pub fn apply(&self, listing_url: &str) -> String {
        let Ok(mut target) = Url::parse(listing_url) else {
            return listing_url.to_string();
        };

        let overrides = self.listing_query();
        let kept: Vec<(String, String)> = target
            .query_pairs()
            .filter(|(key, _)| !overrides.iter().any(|(name, _)| name == key))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        target
            .query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .extend_pairs(overrides);

        target.to_string()
    }
}

/// Rewrite `listing_url` so it carries the stay parameters of `search_url`.
pub fn actionable_listing_url(listing_url: &str, search_url: &str) -> String {
    StayParams::from_search_url(search_url).apply(listing_url)
}
