//! Auction bidding, administration and the background closer.

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;

use tasfiya_core::{AuctionId, AuctionStatus, Money, NotificationKind};

use crate::error::{AppError, Result};
use crate::models::setting::keys;
use crate::models::{Auction, AuctionInput, Bid, BidRequest, CurrentUser, NewNotification};
use crate::state::AppState;

/// An auction with the figures a bidder needs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionDetail {
    #[serde(flatten)]
    pub auction: Auction,
    /// `None` when no higher bid can be represented.
    pub minimum_bid: Option<Money>,
    pub time_remaining_secs: i64,
    pub reserve_met: bool,
    /// Newest first, bidder names masked.
    pub bids: Vec<Bid>,
}

impl AuctionDetail {
    fn new(auction: Auction, bids: &[Bid]) -> Self {
        Self {
            minimum_bid: auction.minimum_next_bid(),
            time_remaining_secs: auction.time_remaining_secs(Utc::now()),
            reserve_met: auction.reserve_met(),
            bids: bids.iter().map(Bid::masked).collect(),
            auction,
        }
    }
}

pub struct AuctionService<'a> {
    state: &'a AppState,
}

impl<'a> AuctionService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// # Errors
    ///
    /// Returns `AppError::Database` on storage failure.
    pub async fn list(&self, status: Option<AuctionStatus>) -> Result<Vec<Auction>> {
        Ok(self.state.storage().list_auctions(status).await?)
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id.
    pub async fn detail(&self, id: AuctionId) -> Result<AuctionDetail> {
        let auction = self.get(id).await?;
        let bids = self.state.storage().list_bids(id).await?;
        Ok(AuctionDetail::new(auction, &bids))
    }

    async fn get(&self, id: AuctionId) -> Result<Auction> {
        self.state
            .storage()
            .get_auction(id)
            .await?
            .ok_or_else(|| AppError::NotFound("auction not found".to_owned()))
    }

    /// Place a bid for `bidder`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Conflict` when auctions are switched off or the
    /// auction is not open, `AppError::BadRequest` for a low bid or a bid by
    /// the current leader, `AppError::NotFound` for an unknown auction.
    pub async fn place_bid(
        &self,
        id: AuctionId,
        bidder: &CurrentUser,
        amount: Money,
    ) -> Result<AuctionDetail> {
        let settings = self.state.settings_snapshot().await?;
        if !settings.get_bool(keys::AUCTIONS_ENABLED, true) {
            return Err(AppError::Conflict("auctions are currently disabled".to_owned()));
        }
        let extend_window = chrono::Duration::from_std(self.state.config().auction.extend_window)
            .map_err(|e| AppError::Internal(format!("invalid extend window: {e}")))?;

        let request = BidRequest {
            bidder_id: bidder.id,
            bidder_name: bidder.name.clone(),
            amount,
            now: Utc::now(),
            extend_window,
        };
        let placement = match self.state.storage().place_bid(id, request).await? {
            Ok(placement) => placement,
            Err(rejection) => {
                use crate::models::BidRejection as R;
                let message = rejection.to_string();
                return Err(match rejection {
                    R::TooLow { .. } | R::AlreadyLeading => AppError::BadRequest(message),
                    R::NotActive | R::NotStarted | R::Ended | R::AtLimit => {
                        AppError::Conflict(message)
                    }
                });
            }
        };
        tracing::info!(
            auction_id = %id,
            bidder_id = %bidder.id,
            amount = %amount,
            end_time = %placement.auction.end_time,
            "Bid accepted"
        );

        if let Some(previous) = placement.outbid {
            let title = &placement.auction.title.en;
            self.state
                .notifier()
                .notify_logged(
                    NewNotification::new(
                        previous,
                        NotificationKind::Outbid,
                        format!("You have been outbid on {title}"),
                        format!("The current bid is now {amount}."),
                    )
                    .with_link(format!("/auctions/{id}")),
                )
                .await;
        }

        self.detail(id).await
    }

    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for inconsistent input or an unknown
    /// product.
    pub async fn create(&self, input: AuctionInput) -> Result<Auction> {
        let input = self.validated(input).await?;
        let auction = self.state.storage().create_auction(input).await?;
        tracing::info!(auction_id = %auction.id, "Auction created");
        Ok(auction)
    }

    /// # Errors
    ///
    /// As [`Self::create`], plus `AppError::Database(Conflict)` once the
    /// auction has left the draft state.
    pub async fn update(&self, id: AuctionId, input: AuctionInput) -> Result<Auction> {
        let input = self.validated(input).await?;
        Ok(self.state.storage().update_auction(id, input).await?)
    }

    async fn validated(&self, input: AuctionInput) -> Result<AuctionInput> {
        let input = input.normalized().map_err(AppError::BadRequest)?;
        if self
            .state
            .storage()
            .get_product(input.product_id)
            .await?
            .is_none()
        {
            return Err(AppError::BadRequest("product does not exist".to_owned()));
        }
        Ok(input)
    }

    /// Admin start/end/cancel. Ending settles and notifies the winner.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database(Conflict)` for a move outside the
    /// transition table.
    pub async fn transition(&self, id: AuctionId, to: AuctionStatus) -> Result<Auction> {
        let auction = self
            .state
            .storage()
            .transition_auction(id, to, Utc::now())
            .await?;
        tracing::info!(auction_id = %id, status = %to, "Auction status changed");
        if to == AuctionStatus::Ended {
            self.announce_winner(&auction).await;
        }
        Ok(auction)
    }

    /// End every expired auction. Returns how many were closed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` on storage failure.
    pub async fn close_expired(&self) -> Result<usize> {
        let closed = self
            .state
            .storage()
            .close_expired_auctions(Utc::now())
            .await?;
        for auction in &closed {
            tracing::info!(
                auction_id = %auction.id,
                winner_id = ?auction.winner_id.map(|w| w.as_i32()),
                "Auction closed"
            );
            self.announce_winner(auction).await;
        }
        Ok(closed.len())
    }

    async fn announce_winner(&self, auction: &Auction) {
        let (Some(winner), Some(amount)) = (auction.winner_id, auction.current_bid) else {
            return;
        };
        self.state
            .notifier()
            .notify_logged(
                NewNotification::new(
                    winner,
                    NotificationKind::AuctionWon,
                    format!("You won {}", auction.title.en),
                    format!("Your winning bid was {amount}. We will contact you to arrange payment."),
                )
                .with_link(format!("/auctions/{}", auction.id)),
            )
            .await;
    }
}

/// Run the auction closer until `shutdown` flips to `true`.
pub async fn run_closer(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let period = state.config().auction.sweep_interval;
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tracing::info!(interval_secs = period.as_secs(), "Auction closer started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = AuctionService::new(&state).close_expired().await {
                    tracing::error!(error = %e, "Auction sweep failed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!("Auction closer stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, Duration};
    use tasfiya_core::{LocalizedText, ProductStatus, UserRole};

    use super::*;
    use crate::db::{AuctionRepository, NotificationRepository};
    use crate::services::testing;

    fn input(product: tasfiya_core::ProductId, start: DateTime<Utc>, end: DateTime<Utc>) -> AuctionInput {
        AuctionInput {
            product_id: product,
            title: LocalizedText::new("Vintage radio", "راديو قديم"),
            starting_price: Money::new(10_000),
            reserve_price: Some(Money::new(15_000)),
            bid_increment: Money::new(500),
            start_time: start,
            end_time: end,
            auto_extend: true,
        }
    }

    async fn active_auction(state: &AppState, ends_in: Duration) -> AuctionId {
        let product = testing::product(state, 1, ProductStatus::Available).await;
        let now = Utc::now();
        let service = AuctionService::new(state);
        let auction = service
            .create(input(product, now - Duration::minutes(5), now + ends_in))
            .await
            .unwrap();
        service
            .transition(auction.id, AuctionStatus::Active)
            .await
            .unwrap();
        auction.id
    }

    fn bidder(id: tasfiya_core::UserId, name: &str) -> CurrentUser {
        CurrentUser {
            id,
            name: name.to_owned(),
            role: UserRole::Customer,
        }
    }

    #[tokio::test]
    async fn test_bid_increment_enforced_and_outbid_notified() {
        let state = testing::state();
        let first = testing::user(&state, "0500000001", UserRole::Customer).await;
        let second = testing::user(&state, "0500000002", UserRole::Customer).await;
        let id = active_auction(&state, Duration::hours(2)).await;
        let service = AuctionService::new(&state);

        assert!(matches!(
            service.place_bid(id, &bidder(first, "Ali"), Money::new(9_999)).await,
            Err(AppError::BadRequest(_))
        ));
        let detail = service
            .place_bid(id, &bidder(first, "Ali"), Money::new(10_000))
            .await
            .unwrap();
        assert_eq!(detail.minimum_bid, Some(Money::new(10_500)));

        assert!(matches!(
            service.place_bid(id, &bidder(second, "Sara"), Money::new(10_400)).await,
            Err(AppError::BadRequest(_))
        ));
        let detail = service
            .place_bid(id, &bidder(second, "Sara"), Money::new(10_500))
            .await
            .unwrap();
        assert_eq!(detail.bids.len(), 2);
        assert_eq!(detail.bids.first().unwrap().bidder_name, "S***");
        assert_eq!(state.storage().unread_count(first).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_late_bid_extends_end_time() {
        let state = testing::state();
        let first = testing::user(&state, "0500000001", UserRole::Customer).await;
        let id = active_auction(&state, Duration::seconds(30)).await;

        let detail = AuctionService::new(&state)
            .place_bid(id, &bidder(first, "Ali"), Money::new(10_000))
            .await
            .unwrap();
        // Default window is 120 s.
        assert!(detail.time_remaining_secs > 100);
    }

    #[tokio::test]
    async fn test_closer_awards_when_reserve_met() {
        let state = testing::state();
        let winner = testing::user(&state, "0500000001", UserRole::Customer).await;
        let id = active_auction(&state, Duration::hours(1)).await;
        let service = AuctionService::new(&state);
        service
            .place_bid(id, &bidder(winner, "Ali"), Money::new(15_000))
            .await
            .unwrap();

        // Nothing has expired yet.
        assert_eq!(service.close_expired().await.unwrap(), 0);

        let ended = service.transition(id, AuctionStatus::Ended).await.unwrap();
        assert_eq!(ended.winner_id, Some(winner));
        let notes = state.storage().list_notifications(winner, 10).await.unwrap();
        assert!(notes.iter().any(|n| n.kind == NotificationKind::AuctionWon));
    }

    #[tokio::test]
    async fn test_closer_ends_expired_without_winner_below_reserve() {
        let state = testing::state();
        let product = testing::product(&state, 1, ProductStatus::Available).await;
        let now = Utc::now();
        let service = AuctionService::new(&state);
        let auction = service
            .create(input(product, now - Duration::hours(2), now - Duration::hours(1)))
            .await
            .unwrap();
        service
            .transition(auction.id, AuctionStatus::Active)
            .await
            .unwrap();

        assert_eq!(service.close_expired().await.unwrap(), 1);
        let stored = state.storage().get_auction(auction.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AuctionStatus::Ended);
        assert_eq!(stored.winner_id, None);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_product() {
        let state = testing::state();
        let now = Utc::now();
        let result = AuctionService::new(&state)
            .create(input(
                tasfiya_core::ProductId::new(404),
                now,
                now + Duration::hours(1),
            ))
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
