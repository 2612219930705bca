//! Auctions and bid history.
//!
//! [`Auction::accept_bid`] is the single place bid rules live. Storage
//! backends call it while holding whatever lock or row lock makes the
//! read-check-write atomic, so concurrent bidders cannot both win the same
//! minimum.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use tasfiya_core::{AuctionId, AuctionStatus, BidId, LocalizedText, Money, ProductId, UserId};

/// An auction for a single product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    pub id: AuctionId,
    pub product_id: ProductId,
    pub title: LocalizedText,
    pub starting_price: Money,
    pub reserve_price: Option<Money>,
    pub current_bid: Option<Money>,
    pub bid_increment: Money,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AuctionStatus,
    pub auto_extend: bool,
    /// Current highest bidder.
    #[serde(skip)]
    pub leader_id: Option<UserId>,
    pub winner_id: Option<UserId>,
    pub bid_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A bid attempt, evaluated against an auction.
#[derive(Debug, Clone)]
pub struct BidRequest {
    pub bidder_id: UserId,
    pub bidder_name: String,
    pub amount: Money,
    pub now: DateTime<Utc>,
    /// Auto-extend window: a bid landing this close to the end pushes the
    /// end to `now + extend_window`.
    pub extend_window: Duration,
}

/// Why a bid was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BidRejection {
    #[error("auction is not open for bidding")]
    NotActive,
    #[error("auction has not started yet")]
    NotStarted,
    #[error("auction has ended")]
    Ended,
    #[error("bid must be at least {minimum}")]
    TooLow { minimum: Money },
    #[error("you already hold the highest bid")]
    AlreadyLeading,
    #[error("auction has reached the highest possible bid")]
    AtLimit,
}

/// Result of an accepted bid.
#[derive(Debug, Clone)]
pub struct BidPlacement {
    pub auction: Auction,
    pub bid: Bid,
    /// The bidder who was leading before this bid, if it was someone else.
    pub outbid: Option<UserId>,
}

impl Auction {
    /// Smallest amount the next bid may be.
    ///
    /// With no bids this is the starting price; afterwards it is the current
    /// bid plus the increment. `None` once that sum no longer fits in
    /// [`Money`], which closes the auction to further bids.
    #[must_use]
    pub fn minimum_next_bid(&self) -> Option<Money> {
        match self.current_bid {
            None => Some(self.starting_price),
            Some(current) => current.checked_add(self.bid_increment).ok(),
        }
    }

    /// Whole seconds until the end time, never negative.
    #[must_use]
    pub fn time_remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.end_time - now).num_seconds().max(0)
    }

    /// Whether the current bid satisfies the reserve price.
    #[must_use]
    pub fn reserve_met(&self) -> bool {
        match (self.current_bid, self.reserve_price) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(bid), Some(reserve)) => bid >= reserve,
        }
    }

    /// Check a bid and, if accepted, apply it to `self`.
    ///
    /// On success returns the previous leader when a different bidder was
    /// outbid. The caller persists the updated auction and appends the bid.
    ///
    /// # Errors
    ///
    /// Returns a [`BidRejection`] when the auction is not open, the bidder
    /// already leads, the amount is below [`Self::minimum_next_bid`], or no
    /// higher bid can be represented.
    pub fn accept_bid(&mut self, req: &BidRequest) -> Result<Option<UserId>, BidRejection> {
        if self.status != AuctionStatus::Active {
            return Err(BidRejection::NotActive);
        }
        if req.now < self.start_time {
            return Err(BidRejection::NotStarted);
        }
        if req.now >= self.end_time {
            return Err(BidRejection::Ended);
        }
        if self.leader_id == Some(req.bidder_id) {
            return Err(BidRejection::AlreadyLeading);
        }
        let minimum = self.minimum_next_bid().ok_or(BidRejection::AtLimit)?;
        if req.amount < minimum {
            return Err(BidRejection::TooLow { minimum });
        }

        let previous = self.leader_id.replace(req.bidder_id);
        self.current_bid = Some(req.amount);
        self.bid_count = self.bid_count.saturating_add(1);
        self.updated_at = req.now;

        if self.auto_extend && self.end_time - req.now <= req.extend_window {
            self.end_time = req.now + req.extend_window;
        }

        Ok(previous)
    }

    /// End the auction, awarding it to the leader when the reserve is met.
    pub fn close(&mut self, now: DateTime<Utc>) {
        self.status = AuctionStatus::Ended;
        self.winner_id = if self.reserve_met() {
            self.leader_id
        } else {
            None
        };
        self.updated_at = now;
    }
}

/// Create/update payload for an auction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionInput {
    pub product_id: ProductId,
    pub title: LocalizedText,
    pub starting_price: Money,
    pub reserve_price: Option<Money>,
    pub bid_increment: Money,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub auto_extend: bool,
}

impl AuctionInput {
    /// # Errors
    ///
    /// Returns a message describing the first inconsistent field.
    pub fn normalized(self) -> Result<Self, String> {
        let title = self.title.trimmed();
        if !title.is_complete() {
            return Err("title is required in English and Arabic".to_owned());
        }
        if self.end_time <= self.start_time {
            return Err("endTime must be after startTime".to_owned());
        }
        if self.starting_price.is_negative() {
            return Err("startingPrice cannot be negative".to_owned());
        }
        if self.bid_increment <= Money::ZERO {
            return Err("bidIncrement must be positive".to_owned());
        }
        if self
            .reserve_price
            .is_some_and(|reserve| reserve < self.starting_price)
        {
            return Err("reservePrice cannot be below startingPrice".to_owned());
        }
        Ok(Self { title, ..self })
    }
}

/// An entry in the append-only bid history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub id: BidId,
    pub auction_id: AuctionId,
    #[serde(skip)]
    pub bidder_id: UserId,
    pub bidder_name: String,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

impl Bid {
    /// Copy with the bidder name reduced to its first letter.
    #[must_use]
    pub fn masked(&self) -> Self {
        Self {
            bidder_name: mask_name(&self.bidder_name),
            ..self.clone()
        }
    }
}

/// `"Mona Khalil"` becomes `"M***"`.
#[must_use]
pub fn mask_name(name: &str) -> String {
    name.trim()
        .chars()
        .next()
        .map_or_else(|| "***".to_owned(), |first| format!("{first}***"))
}
