//! Auctions and bid history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};

use tasfiya_core::{AuctionId, AuctionStatus, BidId, LocalizedText, Money, ProductId, UserId};

use super::{PgStorage, unique_violation};
use crate::db::{AuctionRepository, RepositoryError};
use crate::models::{Auction, AuctionInput, Bid, BidPlacement, BidRejection, BidRequest};

#[derive(sqlx::FromRow)]
struct AuctionRow {
    id: AuctionId,
    product_id: ProductId,
    title_en: String,
    title_ar: String,
    starting_price: Money,
    reserve_price: Option<Money>,
    current_bid: Option<Money>,
    bid_increment: Money,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: AuctionStatus,
    auto_extend: bool,
    leader_id: Option<UserId>,
    winner_id: Option<UserId>,
    bid_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AuctionRow> for Auction {
    fn from(r: AuctionRow) -> Self {
        Self {
            id: r.id,
            product_id: r.product_id,
            title: LocalizedText::new(r.title_en, r.title_ar),
            starting_price: r.starting_price,
            reserve_price: r.reserve_price,
            current_bid: r.current_bid,
            bid_increment: r.bid_increment,
            start_time: r.start_time,
            end_time: r.end_time,
            status: r.status,
            auto_extend: r.auto_extend,
            leader_id: r.leader_id,
            winner_id: r.winner_id,
            bid_count: r.bid_count,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

const AUCTION_COLUMNS: &str = "id, product_id, title_en, title_ar, starting_price, reserve_price, \
     current_bid, bid_increment, start_time, end_time, status, auto_extend, leader_id, winner_id, \
     bid_count, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct BidRow {
    id: BidId,
    auction_id: AuctionId,
    bidder_id: UserId,
    bidder_name: String,
    amount: Money,
    created_at: DateTime<Utc>,
}

impl From<BidRow> for Bid {
    fn from(r: BidRow) -> Self {
        Self {
            id: r.id,
            auction_id: r.auction_id,
            bidder_id: r.bidder_id,
            bidder_name: r.bidder_name,
            amount: r.amount,
            created_at: r.created_at,
        }
    }
}

async fn lock_auction(
    tx: &mut Transaction<'_, Postgres>,
    id: AuctionId,
) -> Result<Auction, RepositoryError> {
    let row: Option<AuctionRow> = sqlx::query_as(&format!(
        "SELECT {AUCTION_COLUMNS} FROM auctions WHERE id = $1 FOR UPDATE"
    ))
    .bind(id.as_i32())
    .fetch_optional(&mut **tx)
    .await?;
    row.map(Into::into).ok_or(RepositoryError::NotFound)
}

/// Write back every field a bid or a state change can touch.
async fn save_auction(
    tx: &mut Transaction<'_, Postgres>,
    auction: &Auction,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE auctions
        SET current_bid = $2, leader_id = $3, winner_id = $4, bid_count = $5, end_time = $6,
            status = $7, updated_at = $8
        WHERE id = $1
        ",
    )
    .bind(auction.id.as_i32())
    .bind(auction.current_bid.map(Money::minor_units))
    .bind(auction.leader_id.map(|u| u.as_i32()))
    .bind(auction.winner_id.map(|u| u.as_i32()))
    .bind(auction.bid_count)
    .bind(auction.end_time)
    .bind(auction.status)
    .bind(auction.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl AuctionRepository for PgStorage {
    async fn list_auctions(
        &self,
        status: Option<AuctionStatus>,
    ) -> Result<Vec<Auction>, RepositoryError> {
        let rows: Vec<AuctionRow> = sqlx::query_as(&format!(
            r"
            SELECT {AUCTION_COLUMNS}
            FROM auctions
            WHERE ($1::auction_status IS NULL OR status = $1)
            ORDER BY end_time, id
            "
        ))
        .bind(status)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_auction(&self, id: AuctionId) -> Result<Option<Auction>, RepositoryError> {
        let row: Option<AuctionRow> =
            sqlx::query_as(&format!("SELECT {AUCTION_COLUMNS} FROM auctions WHERE id = $1"))
                .bind(id.as_i32())
                .fetch_optional(self.pool())
                .await?;
        Ok(row.map(Into::into))
    }

    async fn create_auction(&self, input: AuctionInput) -> Result<Auction, RepositoryError> {
        let row: AuctionRow = sqlx::query_as(&format!(
            r"
            INSERT INTO auctions
                (product_id, title_en, title_ar, starting_price, reserve_price, bid_increment,
                 start_time, end_time, auto_extend)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {AUCTION_COLUMNS}
            "
        ))
        .bind(input.product_id.as_i32())
        .bind(&input.title.en)
        .bind(&input.title.ar)
        .bind(input.starting_price.minor_units())
        .bind(input.reserve_price.map(Money::minor_units))
        .bind(input.bid_increment.minor_units())
        .bind(input.start_time)
        .bind(input.end_time)
        .bind(input.auto_extend)
        .fetch_one(self.pool())
        .await
        .map_err(|e| unique_violation(e, "auction conflicts with an existing record"))?;
        Ok(row.into())
    }

    async fn update_auction(
        &self,
        id: AuctionId,
        input: AuctionInput,
    ) -> Result<Auction, RepositoryError> {
        let mut tx = self.pool().begin().await?;
        let current = lock_auction(&mut tx, id).await?;
        if current.status != AuctionStatus::Draft {
            return Err(RepositoryError::Conflict(
                "only draft auctions can be edited".to_owned(),
            ));
        }

        let row: AuctionRow = sqlx::query_as(&format!(
            r"
            UPDATE auctions
            SET product_id = $2, title_en = $3, title_ar = $4, starting_price = $5,
                reserve_price = $6, bid_increment = $7, start_time = $8, end_time = $9,
                auto_extend = $10, updated_at = NOW()
            WHERE id = $1
            RETURNING {AUCTION_COLUMNS}
            "
        ))
        .bind(id.as_i32())
        .bind(input.product_id.as_i32())
        .bind(&input.title.en)
        .bind(&input.title.ar)
        .bind(input.starting_price.minor_units())
        .bind(input.reserve_price.map(Money::minor_units))
        .bind(input.bid_increment.minor_units())
        .bind(input.start_time)
        .bind(input.end_time)
        .bind(input.auto_extend)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_violation(e, "auction conflicts with an existing record"))?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn transition_auction(
        &self,
        id: AuctionId,
        to: AuctionStatus,
        now: DateTime<Utc>,
    ) -> Result<Auction, RepositoryError> {
        let mut tx = self.pool().begin().await?;
        let mut auction = lock_auction(&mut tx, id).await?;
        if !auction.status.can_transition_to(to) {
            return Err(RepositoryError::Conflict(format!(
                "cannot move auction from {} to {to}",
                auction.status
            )));
        }
        if to == AuctionStatus::Ended {
            auction.close(now);
        } else {
            auction.status = to;
            auction.updated_at = now;
        }
        save_auction(&mut tx, &auction).await?;
        tx.commit().await?;
        Ok(auction)
    }

    async fn place_bid(
        &self,
        id: AuctionId,
        request: BidRequest,
    ) -> Result<Result<BidPlacement, BidRejection>, RepositoryError> {
        let mut tx = self.pool().begin().await?;
        let mut auction = lock_auction(&mut tx, id).await?;

        let outbid = match auction.accept_bid(&request) {
            Ok(previous) => previous,
            // Dropping the transaction rolls back and releases the row lock.
            Err(rejection) => return Ok(Err(rejection)),
        };
        save_auction(&mut tx, &auction).await?;

        let bid: BidRow = sqlx::query_as(
            r"
            INSERT INTO bids (auction_id, bidder_id, bidder_name, amount, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, auction_id, bidder_id, bidder_name, amount, created_at
            ",
        )
        .bind(id.as_i32())
        .bind(request.bidder_id.as_i32())
        .bind(&request.bidder_name)
        .bind(request.amount.minor_units())
        .bind(request.now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Ok(BidPlacement {
            auction,
            bid: bid.into(),
            outbid,
        }))
    }

    async fn list_bids(&self, id: AuctionId) -> Result<Vec<Bid>, RepositoryError> {
        let rows: Vec<BidRow> = sqlx::query_as(
            r"
            SELECT id, auction_id, bidder_id, bidder_name, amount, created_at
            FROM bids
            WHERE auction_id = $1
            ORDER BY id DESC
            ",
        )
        .bind(id.as_i32())
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn close_expired_auctions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Auction>, RepositoryError> {
        let mut tx = self.pool().begin().await?;

        // SKIP LOCKED leaves auctions mid-bid to the next sweep.
        let rows: Vec<AuctionRow> = sqlx::query_as(&format!(
            r"
            SELECT {AUCTION_COLUMNS}
            FROM auctions
            WHERE status = $1 AND end_time <= $2
            ORDER BY id
            FOR UPDATE SKIP LOCKED
            "
        ))
        .bind(AuctionStatus::Active)
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        let mut closed = Vec::with_capacity(rows.len());
        for row in rows {
            let mut auction: Auction = row.into();
            auction.close(now);
            save_auction(&mut tx, &auction).await?;
            closed.push(auction);
        }

        tx.commit().await?;
        Ok(closed)
    }
}
