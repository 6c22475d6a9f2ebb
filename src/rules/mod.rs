//! Invariant rule set.
//! Every write is checked against an ordered list of named predicates before
//! anything touches the store. The first failing rule decides the violation.
// region:    --- Imports
use crate::auction::model::{Auction, NewAuction, Tick};
use crate::clock;
use crate::error::{EntityKind, Violation};
use tracing::debug;
// endregion: --- Imports

// region:    --- Write Snapshots
/// Proposed bid plus everything read about it inside the transaction.
#[derive(Debug, Clone)]
pub struct BidCheck<'a> {
    pub auction: &'a Auction,
    pub user_id: &'a str,
    pub amount: i64,
    /// Clock reading the bid will be stamped with.
    pub now: Tick,
    pub bidder_exists: bool,
    pub auto_register_bidders: bool,
    /// An accepted bid already holds `(auction, user, now)`.
    pub key_taken: bool,
}

/// Proposed auction plus what the transaction knows about its seller.
#[derive(Debug, Clone)]
pub struct AuctionCheck<'a> {
    pub auction: &'a NewAuction,
    pub seller_exists: bool,
}
// endregion: --- Write Snapshots

// region:    --- Rule Traits
pub trait BidRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, bid: &BidCheck<'_>) -> Result<(), Violation>;
}

pub trait AuctionRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, auction: &AuctionCheck<'_>) -> Result<(), Violation>;
}
// endregion: --- Rule Traits

// region:    --- Bid Rules
pub struct SellerExclusion;

impl BidRule for SellerExclusion {
    fn name(&self) -> &'static str {
        "seller_exclusion"
    }

    fn check(&self, bid: &BidCheck<'_>) -> Result<(), Violation> {
        if bid.user_id == bid.auction.seller_id {
            return Err(Violation::SellerBidConflict {
                auction_id: bid.auction.id,
                user_id: bid.user_id.to_string(),
            });
        }
        Ok(())
    }
}

/// Strictly above the highest bid, or at least the floor for the first bid.
pub struct MonotonicPrice;

impl BidRule for MonotonicPrice {
    fn name(&self) -> &'static str {
        "monotonic_price"
    }

    fn check(&self, bid: &BidCheck<'_>) -> Result<(), Violation> {
        let accepted = match bid.auction.highest_bid {
            Some(highest) => bid.amount > highest,
            None => bid.amount >= bid.auction.first_bid,
        };
        if !accepted {
            return Err(Violation::BidTooLow {
                amount: bid.amount,
                first_bid: bid.auction.first_bid,
                highest_bid: bid.auction.highest_bid,
            });
        }
        Ok(())
    }
}

pub struct TimeWindow;

impl BidRule for TimeWindow {
    fn name(&self) -> &'static str {
        "time_window"
    }

    fn check(&self, bid: &BidCheck<'_>) -> Result<(), Violation> {
        if !bid.auction.is_open_at(bid.now) {
            return Err(Violation::BidOutsideWindow {
                now: bid.now,
                start: bid.auction.start,
                end: bid.auction.end,
            });
        }
        Ok(())
    }
}

pub struct BidderReference;

impl BidRule for BidderReference {
    fn name(&self) -> &'static str {
        "referential_existence"
    }

    fn check(&self, bid: &BidCheck<'_>) -> Result<(), Violation> {
        let blank = bid.user_id.trim().is_empty();
        if blank || (!bid.bidder_exists && !bid.auto_register_bidders) {
            return Err(Violation::UnknownReference {
                kind: EntityKind::User,
                id: bid.user_id.to_string(),
            });
        }
        Ok(())
    }
}

pub struct UniqueBidKey;

impl BidRule for UniqueBidKey {
    fn name(&self) -> &'static str {
        "unique_bid_key"
    }

    fn check(&self, bid: &BidCheck<'_>) -> Result<(), Violation> {
        if bid.key_taken {
            return Err(Violation::DuplicateIdentifier {
                kind: EntityKind::Bid,
                id: format!("{}/{}/{}", bid.auction.id, bid.user_id, bid.now),
            });
        }
        Ok(())
    }
}
// endregion: --- Bid Rules

// region:    --- Auction Rules
pub struct WindowOrdering;

impl AuctionRule for WindowOrdering {
    fn name(&self) -> &'static str {
        "window_ordering"
    }

    fn check(&self, check: &AuctionCheck<'_>) -> Result<(), Violation> {
        if check.auction.start >= check.auction.end {
            return Err(Violation::InvalidAuctionWindow {
                start: check.auction.start,
                end: check.auction.end,
            });
        }
        Ok(())
    }
}

/// Sellers are always eligible for auto-creation; only an empty identifier
/// cannot be referenced.
pub struct SellerReference;

impl AuctionRule for SellerReference {
    fn name(&self) -> &'static str {
        "referential_existence"
    }

    fn check(&self, check: &AuctionCheck<'_>) -> Result<(), Violation> {
        if !check.seller_exists && check.auction.seller_id.trim().is_empty() {
            return Err(Violation::UnknownReference {
                kind: EntityKind::User,
                id: check.auction.seller_id.clone(),
            });
        }
        Ok(())
    }
}
// endregion: --- Auction Rules

// region:    --- Rule Set
pub struct RuleSet {
    bid_rules: Vec<Box<dyn BidRule>>,
    auction_rules: Vec<Box<dyn AuctionRule>>,
}

impl RuleSet {
    /// Marketplace rules in evaluation order.
    pub fn standard() -> Self {
        Self {
            bid_rules: vec![
                Box::new(SellerExclusion),
                Box::new(MonotonicPrice),
                Box::new(TimeWindow),
                Box::new(BidderReference),
                Box::new(UniqueBidKey),
            ],
            auction_rules: vec![Box::new(WindowOrdering), Box::new(SellerReference)],
        }
    }

    pub fn bid_rule_names(&self) -> Vec<&'static str> {
        self.bid_rules.iter().map(|rule| rule.name()).collect()
    }

    pub fn check_bid(&self, bid: &BidCheck<'_>) -> Result<(), Violation> {
        for rule in &self.bid_rules {
            if let Err(violation) = rule.check(bid) {
                debug!(
                    "{:<12} --> rule {} rejected bid on auction {}: {}",
                    "Rules",
                    rule.name(),
                    bid.auction.id,
                    violation
                );
                return Err(violation);
            }
        }
        Ok(())
    }

    pub fn check_auction(&self, auction: &AuctionCheck<'_>) -> Result<(), Violation> {
        for rule in &self.auction_rules {
            if let Err(violation) = rule.check(auction) {
                debug!(
                    "{:<12} --> rule {} rejected auction: {}",
                    "Rules",
                    rule.name(),
                    violation
                );
                return Err(violation);
            }
        }
        Ok(())
    }

    pub fn check_clock(&self, current: Tick, requested: Tick) -> Result<(), Violation> {
        clock::check_forward(current, requested)
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard()
    }
}
// endregion: --- Rule Set

#[cfg(test)]
mod tests {
    use super::*;

    fn auction(highest_bid: Option<i64>) -> Auction {
        let mut auction = NewAuction::new("seller", 100, 200, 10).into_auction(1);
        auction.highest_bid = highest_bid;
        auction
    }

    fn bid<'a>(auction: &'a Auction, user_id: &'a str, amount: i64, now: Tick) -> BidCheck<'a> {
        BidCheck {
            auction,
            user_id,
            amount,
            now,
            bidder_exists: true,
            auto_register_bidders: true,
            key_taken: false,
        }
    }

    #[test]
    fn first_bid_may_equal_the_floor() {
        let rules = RuleSet::standard();
        let auction = auction(None);
        assert!(matches!(
            rules.check_bid(&bid(&auction, "bob", 9, 150)),
            Err(Violation::BidTooLow { amount: 9, .. })
        ));
        assert!(rules.check_bid(&bid(&auction, "bob", 10, 150)).is_ok());
    }

    #[test]
    fn later_bids_must_be_strictly_higher() {
        let rules = RuleSet::standard();
        let auction = auction(Some(10));
        assert!(rules.check_bid(&bid(&auction, "bob", 10, 150)).is_err());
        assert!(rules.check_bid(&bid(&auction, "bob", 11, 150)).is_ok());
    }

    #[test]
    fn first_failing_rule_wins() {
        let rules = RuleSet::standard();
        let auction = auction(Some(10));
        // Seller, too low and outside the window all at once.
        let err = rules
            .check_bid(&bid(&auction, "seller", 1, 500))
            .unwrap_err();
        assert_eq!(err.code(), "SELLER_BID_CONFLICT");

        let err = rules.check_bid(&bid(&auction, "bob", 1, 500)).unwrap_err();
        assert_eq!(err.code(), "BID_TOO_LOW");
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let rules = RuleSet::standard();
        let auction = auction(None);
        assert!(rules.check_bid(&bid(&auction, "bob", 10, 100)).is_ok());
        assert!(rules.check_bid(&bid(&auction, "bob", 10, 200)).is_ok());
        assert!(matches!(
            rules.check_bid(&bid(&auction, "bob", 10, 99)),
            Err(Violation::BidOutsideWindow { now: 99, .. })
        ));
    }

    #[test]
    fn unknown_bidder_depends_on_auto_registration() {
        let rules = RuleSet::standard();
        let auction = auction(None);
        let mut check = bid(&auction, "ghost", 10, 150);
        check.bidder_exists = false;
        assert!(rules.check_bid(&check).is_ok());

        check.auto_register_bidders = false;
        assert!(matches!(
            rules.check_bid(&check),
            Err(Violation::UnknownReference {
                kind: EntityKind::User,
                ..
            })
        ));
    }

    #[test]
    fn blank_bidder_is_never_auto_registered() {
        let rules = RuleSet::standard();
        let auction = auction(None);
        let mut check = bid(&auction, "  ", 10, 150);
        check.bidder_exists = false;
        assert_eq!(
            rules.check_bid(&check),
            Err(Violation::UnknownReference {
                kind: EntityKind::User,
                id: "  ".into()
            })
        );
    }

    #[test]
    fn taken_bid_key_is_a_duplicate() {
        let rules = RuleSet::standard();
        let auction = auction(Some(10));
        let mut check = bid(&auction, "bob", 20, 150);
        check.key_taken = true;
        assert_eq!(
            rules.check_bid(&check),
            Err(Violation::DuplicateIdentifier {
                kind: EntityKind::Bid,
                id: "1/bob/150".into()
            })
        );
    }

    #[test]
    fn auction_window_must_be_ordered() {
        let rules = RuleSet::standard();
        let new = NewAuction::new("seller", 200, 200, 1);
        let check = AuctionCheck {
            auction: &new,
            seller_exists: false,
        };
        assert_eq!(
            rules.check_auction(&check),
            Err(Violation::InvalidAuctionWindow {
                start: 200,
                end: 200
            })
        );
    }

    #[test]
    fn rule_order_is_fixed() {
        assert_eq!(
            RuleSet::standard().bid_rule_names(),
            vec![
                "seller_exclusion",
                "monotonic_price",
                "time_window",
                "referential_existence",
                "unique_bid_key"
            ]
        );
    }
}
