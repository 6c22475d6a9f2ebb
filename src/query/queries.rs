/// Single user
pub const GET_USER: &str = "SELECT id, rating, location, country FROM users WHERE id = $1";

/// Single auction
pub const GET_AUCTION: &str = r#"
    SELECT id, name, seller_id, start_tick, end_tick, buy_price, first_bid,
           highest_bid, number_of_bids, description
    FROM auctions
    WHERE id = $1
"#;

/// Single auction, row-locked for the rest of the transaction
pub const LOCK_AUCTION: &str = r#"
    SELECT id, name, seller_id, start_tick, end_tick, buy_price, first_bid,
           highest_bid, number_of_bids, description
    FROM auctions
    WHERE id = $1
    FOR UPDATE
"#;

/// All auctions
pub const GET_ALL_AUCTIONS: &str = r#"
    SELECT id, name, seller_id, start_tick, end_tick, buy_price, first_bid,
           highest_bid, number_of_bids, description
    FROM auctions
    ORDER BY id
"#;

/// Categories of one auction
pub const GET_AUCTION_CATEGORIES: &str =
    "SELECT category FROM auction_categories WHERE auction_id = $1 ORDER BY category";

/// Categories of every auction
pub const GET_ALL_CATEGORIES: &str =
    "SELECT auction_id, category FROM auction_categories ORDER BY auction_id, category";

/// Bid history, oldest first
pub const GET_AUCTION_BIDS: &str = r#"
    SELECT auction_id, user_id, bid_time, amount, seq
    FROM bids
    WHERE auction_id = $1
    ORDER BY bid_time, seq
"#;

/// Current pseudo time
pub const GET_CLOCK: &str = "SELECT now FROM pseudo_time WHERE id = 1";

/// Current pseudo time, row-locked
pub const LOCK_CLOCK: &str = "SELECT now FROM pseudo_time WHERE id = 1 FOR UPDATE";

/// Bid natural-key lookup
pub const BID_KEY_EXISTS: &str = r#"
    SELECT EXISTS (
        SELECT 1 FROM bids WHERE auction_id = $1 AND user_id = $2 AND bid_time = $3
    )
"#;

/// Auction existence
pub const AUCTION_EXISTS: &str = "SELECT EXISTS (SELECT 1 FROM auctions WHERE id = $1)";
