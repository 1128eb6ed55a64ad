use super::{INLINE_LIMIT, RICH_LIMIT, SAFETY_MARGIN};

/// How a completed response reaches the user, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeliveryStrategy {
    /// One plain message.
    Inline,
    /// One message with a rich embed.
    Embed,
    /// A primary embed plus the remaining segments inside a thread.
    Threaded,
}

/// Size thresholds used to pick a delivery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryLimits {
    pub inline_limit: usize,
    pub rich_limit: usize,
    pub safety_margin: usize,
}

impl Default for DeliveryLimits {
    fn default() -> Self {
        Self {
            inline_limit: INLINE_LIMIT,
            rich_limit: RICH_LIMIT,
            safety_margin: SAFETY_MARGIN,
        }
    }
}

impl DeliveryLimits {
    /// Largest length delivered as a plain message.
    #[must_use]
    pub const fn inline_max(&self) -> usize {
        self.inline_limit.saturating_sub(self.safety_margin)
    }

    /// Largest length delivered in a single embed; also the threaded segment size.
    #[must_use]
    pub const fn rich_max(&self) -> usize {
        self.rich_limit.saturating_sub(self.safety_margin)
    }

    #[must_use]
    pub const fn select(&self, len: usize) -> DeliveryStrategy {
        select(len, self)
    }
}

/// Picks the delivery tier for a response of `len` characters.
#[must_use]
pub const fn select(len: usize, limits: &DeliveryLimits) -> DeliveryStrategy {
    if len <= limits.inline_max() {
        DeliveryStrategy::Inline
    } else if len <= limits.rich_max() {
        DeliveryStrategy::Embed
    } else {
        DeliveryStrategy::Threaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_land_in_expected_tier() {
        let limits = DeliveryLimits::default();
        assert_eq!(select(0, &limits), DeliveryStrategy::Inline);
        assert_eq!(select(1990, &limits), DeliveryStrategy::Inline);
        assert_eq!(select(1991, &limits), DeliveryStrategy::Embed);
        assert_eq!(select(4086, &limits), DeliveryStrategy::Embed);
        assert_eq!(select(4087, &limits), DeliveryStrategy::Threaded);
        assert_eq!(select(usize::MAX, &limits), DeliveryStrategy::Threaded);
    }

    #[test]
    fn margin_larger_than_limit_saturates() {
        let limits = DeliveryLimits {
            inline_limit: 5,
            rich_limit: 8,
            safety_margin: 10,
        };
        assert_eq!(limits.inline_max(), 0);
        assert_eq!(select(0, &limits), DeliveryStrategy::Inline);
        assert_eq!(select(1, &limits), DeliveryStrategy::Threaded);
    }
}
