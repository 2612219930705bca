//! In-process storage, used when no database is configured and in tests.
//!
//! All state sits behind one `RwLock`; every mutating operation takes the
//! write guard once, which makes each call atomic with respect to the others.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use tasfiya_core::{
    AppointmentId, AppointmentStatus, AuctionId, AuctionStatus, BidId, CartItemId, CategoryId,
    ContactId, ContactStatus, LocalizedText, Money, NotificationId, OrderId, OrderItemId, OrderStatus,
    PaymentStatus, Phone, ProductId, ProductImageId, SettingType, SmsMessageId, UserId, UserRole,
};

use super::{
    AuctionRepository, CartRepository, CatalogRepository, IntakeRepository,
    NotificationRepository, OrderRepository, RepositoryError, SettingsRepository, SmsRepository,
    Storage, UserRepository,
};
use crate::models::order::{SnapshotError, snapshot_items};
use crate::models::{
    Appointment, Auction, AuctionInput, Bid, BidPlacement, BidRejection, BidRequest, CartItem,
    CartOwner, Category, CategoryInput, Contact, DashboardStats, MAX_LINE_QUANTITY,
    NewAppointment, NewContact, NewNotification, NewOrder, NewProductImage, NewSmsMessage,
    NewUser, Notification, Order, OrderFilter, OrderItem, Product, ProductFilter, ProductImage,
    ProductInput, Setting, SmsMessage, User,
};

#[derive(Debug, Default)]
struct State {
    last_id: i32,
    users: BTreeMap<UserId, User>,
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    images: BTreeMap<ProductImageId, ProductImage>,
    carts: HashMap<CartOwner, Vec<CartItem>>,
    orders: BTreeMap<OrderId, Order>,
    auctions: BTreeMap<AuctionId, Auction>,
    bids: Vec<Bid>,
    contacts: BTreeMap<ContactId, Contact>,
    appointments: BTreeMap<AppointmentId, Appointment>,
    notifications: BTreeMap<NotificationId, Notification>,
    settings: BTreeMap<String, Setting>,
    sms: Vec<SmsMessage>,
}

impl State {
    /// Ids are drawn from one sequence shared by every table.
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn product_images(&self, product: ProductId) -> Vec<ProductImage> {
        let mut images: Vec<ProductImage> = self
            .images
            .values()
            .filter(|i| i.product_id == product)
            .cloned()
            .collect();
        images.sort_by_key(|i| (i.sort_order, i.id));
        images
    }

    /// Make `image` the single main image of `product` and mirror its URL.
    fn promote_main(&mut self, product: ProductId, image: ProductImageId) {
        let mut url = None;
        for img in self.images.values_mut().filter(|i| i.product_id == product) {
            img.is_main = img.id == image;
            if img.is_main {
                url = Some(img.url.clone());
            }
        }
        if let Some(p) = self.products.get_mut(&product) {
            p.image_url = url;
            p.updated_at = Utc::now();
        }
    }

    fn order_mut(&mut self, id: OrderId) -> Result<&mut Order, RepositoryError> {
        self.orders.get_mut(&id).ok_or(RepositoryError::NotFound)
    }
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn take(limit: i64) -> usize {
    usize::try_from(limit).unwrap_or(0)
}

/// Storage held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: RwLock<State>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStorage {
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.phone == user.phone) {
            return Err(RepositoryError::Conflict(
                "phone number is already registered".to_owned(),
            ));
        }
        let id = UserId::new(state.next_id());
        let created = User {
            id,
            name: user.name,
            phone: user.phone,
            email: user.email,
            role: user.role,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        state.users.insert(id, created.clone());
        Ok(created)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_phone(&self, phone: &Phone) -> Result<Option<User>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| &u.phone == phone).cloned())
    }

    async fn admin_ids(&self) -> Result<Vec<UserId>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .filter(|u| u.role == UserRole::Admin)
            .map(|u| u.id)
            .collect())
    }
}

#[async_trait]
impl CatalogRepository for MemoryStorage {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let state = self.state.read().await;
        let mut categories: Vec<Category> = state.categories.values().cloned().collect();
        categories.sort_by_key(|c| (c.display_order, c.id));
        Ok(categories)
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        Ok(self.state.read().await.categories.get(&id).cloned())
    }

    async fn create_category(&self, input: CategoryInput) -> Result<Category, RepositoryError> {
        let mut state = self.state.write().await;
        if state.categories.values().any(|c| c.slug == input.slug) {
            return Err(RepositoryError::Conflict(format!(
                "slug '{}' is already used",
                input.slug
            )));
        }
        let id = CategoryId::new(state.next_id());
        let category = Category {
            id,
            name: input.name,
            slug: input.slug,
            display_order: input.display_order,
        };
        state.categories.insert(id, category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: CategoryId,
        input: CategoryInput,
    ) -> Result<Category, RepositoryError> {
        let mut state = self.state.write().await;
        if state
            .categories
            .values()
            .any(|c| c.slug == input.slug && c.id != id)
        {
            return Err(RepositoryError::Conflict(format!(
                "slug '{}' is already used",
                input.slug
            )));
        }
        let category = state
            .categories
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        category.name = input.name;
        category.slug = input.slug;
        category.display_order = input.display_order;
        Ok(category.clone())
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state
            .categories
            .remove(&id)
            .ok_or(RepositoryError::NotFound)?;
        for product in state.products.values_mut() {
            if product.category_id == Some(id) {
                product.category_id = None;
            }
        }
        Ok(())
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.read().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        products.sort_by_key(|p| (p.display_order, p.id));
        Ok(products)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn create_product(&self, input: ProductInput) -> Result<Product, RepositoryError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let display_order = input.display_order.unwrap_or_else(|| {
            state
                .products
                .values()
                .map(|p| p.display_order)
                .max()
                .map_or(0, |max| max.saturating_add(1))
        });
        let id = ProductId::new(state.next_id());
        state.products.insert(
            id,
            Product {
                id,
                title: input.title,
                description: input.description,
                category_id: input.category_id,
                price: input.price,
                status: input.status,
                image_url: None,
                display_order,
                created_at: now,
                updated_at: now,
            },
        );
        if let Some(url) = input.image_url {
            let image_id = ProductImageId::new(state.next_id());
            state.images.insert(
                image_id,
                ProductImage {
                    id: image_id,
                    product_id: id,
                    url,
                    alt: LocalizedText::default(),
                    is_main: true,
                    sort_order: 0,
                    created_at: now,
                },
            );
            state.promote_main(id, image_id);
        }
        state
            .products
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn update_product(
        &self,
        id: ProductId,
        input: ProductInput,
    ) -> Result<Product, RepositoryError> {
        let mut state = self.state.write().await;
        let product = state.products.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        product.title = input.title;
        product.description = input.description;
        product.category_id = input.category_id;
        product.price = input.price;
        product.status = input.status;
        if let Some(order) = input.display_order {
            product.display_order = order;
        }
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if !state.products.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        if state.auctions.values().any(|a| a.product_id == id) {
            return Err(RepositoryError::Conflict(
                "product is referenced by an auction".to_owned(),
            ));
        }
        state.products.remove(&id);
        state.images.retain(|_, i| i.product_id != id);
        for lines in state.carts.values_mut() {
            lines.retain(|l| l.product_id != id);
        }
        for order in state.orders.values_mut() {
            for item in &mut order.items {
                if item.product_id == Some(id) {
                    item.product_id = None;
                }
            }
        }
        Ok(())
    }

    async fn reorder_products(&self, ids: &[ProductId]) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if ids.iter().any(|id| !state.products.contains_key(id)) {
            return Err(RepositoryError::NotFound);
        }
        let now = Utc::now();
        for (index, id) in ids.iter().enumerate() {
            if let Some(product) = state.products.get_mut(id) {
                product.display_order = i32::try_from(index).unwrap_or(i32::MAX);
                product.updated_at = now;
            }
        }
        Ok(())
    }

    async fn list_images(&self, product: ProductId) -> Result<Vec<ProductImage>, RepositoryError> {
        Ok(self.state.read().await.product_images(product))
    }

    async fn add_image(
        &self,
        product: ProductId,
        image: NewProductImage,
    ) -> Result<ProductImage, RepositoryError> {
        let mut state = self.state.write().await;
        if !state.products.contains_key(&product) {
            return Err(RepositoryError::NotFound);
        }
        let existing = state.product_images(product);
        let make_main = image.is_main || !existing.iter().any(|i| i.is_main);
        let sort_order = image.sort_order.unwrap_or_else(|| {
            existing
                .iter()
                .map(|i| i.sort_order)
                .max()
                .map_or(0, |max| max.saturating_add(1))
        });
        let id = ProductImageId::new(state.next_id());
        state.images.insert(
            id,
            ProductImage {
                id,
                product_id: product,
                url: image.url,
                alt: image.alt,
                is_main: false,
                sort_order,
                created_at: Utc::now(),
            },
        );
        if make_main {
            state.promote_main(product, id);
        }
        state.images.get(&id).cloned().ok_or(RepositoryError::NotFound)
    }

    async fn set_main_image(
        &self,
        product: ProductId,
        image: ProductImageId,
    ) -> Result<ProductImage, RepositoryError> {
        let mut state = self.state.write().await;
        if !state
            .images
            .get(&image)
            .is_some_and(|i| i.product_id == product)
        {
            return Err(RepositoryError::NotFound);
        }
        state.promote_main(product, image);
        state
            .images
            .get(&image)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn delete_image(
        &self,
        product: ProductId,
        image: ProductImageId,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if !state
            .images
            .get(&image)
            .is_some_and(|i| i.product_id == product)
        {
            return Err(RepositoryError::NotFound);
        }
        let removed = state
            .images
            .remove(&image)
            .ok_or(RepositoryError::NotFound)?;
        if removed.is_main {
            match state.product_images(product).first() {
                Some(next) => {
                    let next = next.id;
                    state.promote_main(product, next);
                }
                None => {
                    if let Some(p) = state.products.get_mut(&product) {
                        p.image_url = None;
                        p.updated_at = Utc::now();
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CartRepository for MemoryStorage {
    async fn cart_items(&self, owner: &CartOwner) -> Result<Vec<CartItem>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.carts.get(owner).cloned().unwrap_or_default())
    }

    async fn add_cart_item(
        &self,
        owner: &CartOwner,
        product: ProductId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        let mut state = self.state.write().await;
        let id = CartItemId::new(state.next_id());
        let lines = state.carts.entry(*owner).or_default();
        if let Some(line) = lines.iter_mut().find(|l| l.product_id == product) {
            let merged = line.quantity.saturating_add(quantity);
            if merged > MAX_LINE_QUANTITY {
                return Err(RepositoryError::Conflict(format!(
                    "a cart line cannot exceed {MAX_LINE_QUANTITY} items"
                )));
            }
            line.quantity = merged;
            return Ok(line.clone());
        }
        let line = CartItem {
            id,
            product_id: product,
            quantity,
            created_at: Utc::now(),
        };
        lines.push(line.clone());
        Ok(line)
    }

    async fn set_cart_quantity(
        &self,
        owner: &CartOwner,
        item: CartItemId,
        quantity: i32,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let mut state = self.state.write().await;
        let lines = state.carts.get_mut(owner).ok_or(RepositoryError::NotFound)?;
        let index = lines
            .iter()
            .position(|l| l.id == item)
            .ok_or(RepositoryError::NotFound)?;
        if quantity == 0 {
            lines.remove(index);
            return Ok(None);
        }
        let line = lines.get_mut(index).ok_or(RepositoryError::NotFound)?;
        line.quantity = quantity;
        Ok(Some(line.clone()))
    }

    async fn remove_cart_item(
        &self,
        owner: &CartOwner,
        item: CartItemId,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let lines = state.carts.get_mut(owner).ok_or(RepositoryError::NotFound)?;
        let before = lines.len();
        lines.retain(|l| l.id != item);
        if lines.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn clear_cart(&self, owner: &CartOwner) -> Result<(), RepositoryError> {
        self.state.write().await.carts.remove(owner);
        Ok(())
    }

    async fn merge_carts(&self, from: &CartOwner, into: &CartOwner) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let Some(incoming) = state.carts.remove(from) else {
            return Ok(());
        };
        let target = state.carts.entry(*into).or_default();
        for line in incoming {
            match target.iter_mut().find(|l| l.product_id == line.product_id) {
                Some(existing) => {
                    existing.quantity = existing
                        .quantity
                        .saturating_add(line.quantity)
                        .min(MAX_LINE_QUANTITY);
                }
                None => target.push(line),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for MemoryStorage {
    async fn create_order(
        &self,
        order: NewOrder,
    ) -> Result<Result<Order, SnapshotError>, RepositoryError> {
        let mut state = self.state.write().await;
        let items = state.carts.get(&order.owner).cloned().unwrap_or_default();
        let products: Vec<Product> = items
            .iter()
            .filter_map(|i| state.products.get(&i.product_id).cloned())
            .collect();
        let (lines, total) = match snapshot_items(&items, &products) {
            Ok(snapshot) => snapshot,
            Err(e) => return Ok(Err(e)),
        };
        if state
            .orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(RepositoryError::Conflict(
                "order number already exists".to_owned(),
            ));
        }

        let now = Utc::now();
        let id = OrderId::new(state.next_id());
        let mut order_items = Vec::with_capacity(lines.len());
        for line in lines {
            order_items.push(OrderItem {
                id: OrderItemId::new(state.next_id()),
                product_id: Some(line.product_id),
                title: line.title,
                unit_price: line.unit_price,
                quantity: line.quantity,
                line_total: line.line_total,
            });
        }
        let details = order.details;
        let created = Order {
            id,
            order_number: order.order_number,
            user_id: order.owner.user_id(),
            customer_name: details.customer_name,
            phone: details.phone,
            address: details.address,
            city: details.city,
            notes: details.notes,
            payment_method: details.payment_method,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            total,
            items: order_items,
            created_at: now,
            updated_at: now,
        };
        state.orders.insert(id, created.clone());
        state.carts.remove(&order.owner);
        Ok(Ok(created))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn get_order_by_number(&self, number: &str) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .find(|o| o.order_number == number)
            .cloned())
    }

    async fn list_user_orders(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .rev()
            .filter(|o| o.user_id == Some(user))
            .cloned()
            .collect())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .rev()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect())
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut state = self.state.write().await;
        let order = state.order_mut(id)?;
        if order.status != from {
            return Err(RepositoryError::Conflict(format!(
                "order status changed to {} concurrently",
                order.status
            )));
        }
        order.status = to;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn update_payment_status(
        &self,
        id: OrderId,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<Order, RepositoryError> {
        let mut state = self.state.write().await;
        let order = state.order_mut(id)?;
        if order.payment_status != from {
            return Err(RepositoryError::Conflict(format!(
                "payment status changed to {} concurrently",
                order.payment_status
            )));
        }
        order.payment_status = to;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }
}

#[async_trait]
impl AuctionRepository for MemoryStorage {
    async fn list_auctions(
        &self,
        status: Option<AuctionStatus>,
    ) -> Result<Vec<Auction>, RepositoryError> {
        let state = self.state.read().await;
        let mut auctions: Vec<Auction> = state
            .auctions
            .values()
            .filter(|a| status.is_none_or(|s| s == a.status))
            .cloned()
            .collect();
        auctions.sort_by_key(|a| (a.end_time, a.id));
        Ok(auctions)
    }

    async fn get_auction(&self, id: AuctionId) -> Result<Option<Auction>, RepositoryError> {
        Ok(self.state.read().await.auctions.get(&id).cloned())
    }

    async fn create_auction(&self, input: AuctionInput) -> Result<Auction, RepositoryError> {
        let mut state = self.state.write().await;
        if !state.products.contains_key(&input.product_id) {
            return Err(RepositoryError::NotFound);
        }
        let now = Utc::now();
        let id = AuctionId::new(state.next_id());
        let auction = Auction {
            id,
            product_id: input.product_id,
            title: input.title,
            starting_price: input.starting_price,
            reserve_price: input.reserve_price,
            current_bid: None,
            bid_increment: input.bid_increment,
            start_time: input.start_time,
            end_time: input.end_time,
            status: AuctionStatus::Draft,
            auto_extend: input.auto_extend,
            leader_id: None,
            winner_id: None,
            bid_count: 0,
            created_at: now,
            updated_at: now,
        };
        state.auctions.insert(id, auction.clone());
        Ok(auction)
    }

    async fn update_auction(
        &self,
        id: AuctionId,
        input: AuctionInput,
    ) -> Result<Auction, RepositoryError> {
        let mut state = self.state.write().await;
        if !state.products.contains_key(&input.product_id) {
            return Err(RepositoryError::NotFound);
        }
        let auction = state.auctions.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if auction.status != AuctionStatus::Draft {
            return Err(RepositoryError::Conflict(
                "only draft auctions can be edited".to_owned(),
            ));
        }
        auction.product_id = input.product_id;
        auction.title = input.title;
        auction.starting_price = input.starting_price;
        auction.reserve_price = input.reserve_price;
        auction.bid_increment = input.bid_increment;
        auction.start_time = input.start_time;
        auction.end_time = input.end_time;
        auction.auto_extend = input.auto_extend;
        auction.updated_at = Utc::now();
        Ok(auction.clone())
    }

    async fn transition_auction(
        &self,
        id: AuctionId,
        to: AuctionStatus,
        now: DateTime<Utc>,
    ) -> Result<Auction, RepositoryError> {
        let mut state = self.state.write().await;
        let auction = state.auctions.get_mut(&id).ok_or(RepositoryError::NotFound)?;
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
        Ok(auction.clone())
    }

    async fn place_bid(
        &self,
        id: AuctionId,
        request: BidRequest,
    ) -> Result<Result<BidPlacement, BidRejection>, RepositoryError> {
        let mut state = self.state.write().await;
        let bid_id = BidId::new(state.next_id());
        let auction = state.auctions.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        let outbid = match auction.accept_bid(&request) {
            Ok(previous) => previous,
            Err(rejection) => return Ok(Err(rejection)),
        };
        let auction = auction.clone();
        let bid = Bid {
            id: bid_id,
            auction_id: id,
            bidder_id: request.bidder_id,
            bidder_name: request.bidder_name,
            amount: request.amount,
            created_at: request.now,
        };
        state.bids.push(bid.clone());
        Ok(Ok(BidPlacement {
            auction,
            bid,
            outbid,
        }))
    }

    async fn list_bids(&self, id: AuctionId) -> Result<Vec<Bid>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .bids
            .iter()
            .rev()
            .filter(|b| b.auction_id == id)
            .cloned()
            .collect())
    }

    async fn close_expired_auctions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Auction>, RepositoryError> {
        let mut state = self.state.write().await;
        let mut closed = Vec::new();
        for auction in state
            .auctions
            .values_mut()
            .filter(|a| a.status == AuctionStatus::Active && a.end_time <= now)
        {
            auction.close(now);
            closed.push(auction.clone());
        }
        Ok(closed)
    }
}

#[async_trait]
impl IntakeRepository for MemoryStorage {
    async fn create_contact(&self, contact: NewContact) -> Result<Contact, RepositoryError> {
        let mut state = self.state.write().await;
        let id = ContactId::new(state.next_id());
        let created = Contact {
            id,
            name: contact.name,
            phone: contact.phone,
            email: contact.email,
            subject: contact.subject,
            message: contact.message,
            status: ContactStatus::New,
            created_at: Utc::now(),
        };
        state.contacts.insert(id, created.clone());
        Ok(created)
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.contacts.values().rev().cloned().collect())
    }

    async fn update_contact_status(
        &self,
        id: ContactId,
        status: ContactStatus,
    ) -> Result<Contact, RepositoryError> {
        let mut state = self.state.write().await;
        let contact = state.contacts.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        contact.status = status;
        Ok(contact.clone())
    }

    async fn delete_contact(&self, id: ContactId) -> Result<(), RepositoryError> {
        self.state
            .write()
            .await
            .contacts
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn create_appointment(
        &self,
        appointment: NewAppointment,
        capacity: i64,
    ) -> Result<Appointment, RepositoryError> {
        let mut state = self.state.write().await;
        let booked = state
            .appointments
            .values()
            .filter(|a| {
                a.date == appointment.date
                    && a.time_slot == appointment.time_slot
                    && a.status.holds_slot()
            })
            .count();
        if count(booked) >= capacity {
            return Err(RepositoryError::Conflict(
                "this time slot is fully booked".to_owned(),
            ));
        }
        let id = AppointmentId::new(state.next_id());
        let created = Appointment {
            id,
            name: appointment.name,
            phone: appointment.phone,
            date: appointment.date,
            time_slot: appointment.time_slot,
            notes: appointment.notes,
            status: AppointmentStatus::Pending,
            created_at: Utc::now(),
        };
        state.appointments.insert(id, created.clone());
        Ok(created)
    }

    async fn appointment_counts(
        &self,
        date: NaiveDate,
    ) -> Result<HashMap<String, i64>, RepositoryError> {
        let state = self.state.read().await;
        let mut counts = HashMap::new();
        for a in state
            .appointments
            .values()
            .filter(|a| a.date == date && a.status.holds_slot())
        {
            *counts.entry(a.time_slot.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn list_appointments(&self) -> Result<Vec<Appointment>, RepositoryError> {
        let state = self.state.read().await;
        let mut appointments: Vec<Appointment> = state.appointments.values().cloned().collect();
        appointments.sort_by(|a, b| (a.date, &a.time_slot, a.id).cmp(&(b.date, &b.time_slot, b.id)));
        Ok(appointments)
    }

    async fn update_appointment_status(
        &self,
        id: AppointmentId,
        status: AppointmentStatus,
    ) -> Result<Appointment, RepositoryError> {
        let mut state = self.state.write().await;
        let appointment = state
            .appointments
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        appointment.status = status;
        Ok(appointment.clone())
    }

    async fn delete_appointment(&self, id: AppointmentId) -> Result<(), RepositoryError> {
        self.state
            .write()
            .await
            .appointments
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl NotificationRepository for MemoryStorage {
    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, RepositoryError> {
        let mut state = self.state.write().await;
        let id = NotificationId::new(state.next_id());
        let created = Notification {
            id,
            user_id: notification.user_id,
            kind: notification.kind,
            title: notification.title,
            message: notification.message,
            link: notification.link,
            is_read: false,
            created_at: Utc::now(),
        };
        state.notifications.insert(id, created.clone());
        Ok(created)
    }

    async fn list_notifications(
        &self,
        user: UserId,
        limit: i64,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .values()
            .rev()
            .filter(|n| n.user_id == user)
            .take(take(limit))
            .cloned()
            .collect())
    }

    async fn unread_count(&self, user: UserId) -> Result<i64, RepositoryError> {
        let state = self.state.read().await;
        Ok(count(
            state
                .notifications
                .values()
                .filter(|n| n.user_id == user && !n.is_read)
                .count(),
        ))
    }

    async fn mark_read(
        &self,
        user: UserId,
        id: NotificationId,
    ) -> Result<Notification, RepositoryError> {
        let mut state = self.state.write().await;
        let notification = state
            .notifications
            .get_mut(&id)
            .filter(|n| n.user_id == user)
            .ok_or(RepositoryError::NotFound)?;
        notification.is_read = true;
        Ok(notification.clone())
    }

    async fn mark_all_read(&self, user: UserId) -> Result<u64, RepositoryError> {
        let mut state = self.state.write().await;
        let mut changed = 0;
        for n in state
            .notifications
            .values_mut()
            .filter(|n| n.user_id == user && !n.is_read)
        {
            n.is_read = true;
            changed += 1;
        }
        Ok(changed)
    }
}

#[async_trait]
impl SettingsRepository for MemoryStorage {
    async fn list_settings(&self) -> Result<Vec<Setting>, RepositoryError> {
        Ok(self.state.read().await.settings.values().cloned().collect())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<Setting>, RepositoryError> {
        Ok(self.state.read().await.settings.get(key).cloned())
    }

    async fn upsert_setting(
        &self,
        key: &str,
        value: &str,
        category: &str,
        setting_type: SettingType,
    ) -> Result<Setting, RepositoryError> {
        let setting = Setting {
            key: key.to_owned(),
            value: value.to_owned(),
            category: category.to_owned(),
            setting_type,
            updated_at: Utc::now(),
        };
        self.state
            .write()
            .await
            .settings
            .insert(key.to_owned(), setting.clone());
        Ok(setting)
    }

    async fn delete_setting(&self, key: &str) -> Result<(), RepositoryError> {
        self.state
            .write()
            .await
            .settings
            .remove(key)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl SmsRepository for MemoryStorage {
    async fn log_sms(&self, message: NewSmsMessage) -> Result<SmsMessage, RepositoryError> {
        let mut state = self.state.write().await;
        let logged = SmsMessage {
            id: SmsMessageId::new(state.next_id()),
            recipient: message.recipient,
            body: message.body,
            status: message.status,
            provider_id: message.provider_id,
            error: message.error,
            created_at: Utc::now(),
        };
        state.sms.push(logged.clone());
        Ok(logged)
    }

    async fn list_sms(&self, limit: i64) -> Result<Vec<SmsMessage>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.sms.iter().rev().take(take(limit)).cloned().collect())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats, RepositoryError> {
        let state = self.state.read().await;
        let revenue = Money::checked_sum(
            state
                .orders
                .values()
                .filter(|o| o.payment_status == PaymentStatus::Paid)
                .map(|o| o.total),
        )
        .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        Ok(DashboardStats {
            product_count: count(state.products.len()),
            orders_by_status: DashboardStats::order_counts(
                state.orders.values().map(|o| (o.status, 1)),
            ),
            unread_contacts: count(
                state
                    .contacts
                    .values()
                    .filter(|c| c.status == ContactStatus::New)
                    .count(),
            ),
            pending_appointments: count(
                state
                    .appointments
                    .values()
                    .filter(|a| a.status == AppointmentStatus::Pending)
                    .count(),
            ),
            active_auctions: count(
                state
                    .auctions
                    .values()
                    .filter(|a| a.status == AuctionStatus::Active)
                    .count(),
            ),
            revenue,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use tasfiya_core::ProductStatus;
    use uuid::Uuid;

    use super::*;
    use crate::models::CheckoutDetails;

    fn product_input(price: i64) -> ProductInput {
        ProductInput {
            title: LocalizedText::new("Desk", "مكتب"),
            description: LocalizedText::default(),
            category_id: None,
            price: Money::new(price),
            status: ProductStatus::Available,
            display_order: None,
            image_url: None,
        }
    }

    fn image(url: &str, is_main: bool) -> NewProductImage {
        NewProductImage {
            url: url.to_owned(),
            alt: LocalizedText::default(),
            is_main,
            sort_order: None,
        }
    }

    #[tokio::test]
    async fn test_first_image_becomes_main() {
        let storage = MemoryStorage::new();
        let product = storage.create_product(product_input(100)).await.unwrap();
        let first = storage.add_image(product.id, image("/a.jpg", false)).await.unwrap();
        let second = storage.add_image(product.id, image("/b.jpg", false)).await.unwrap();
        assert!(first.is_main);
        assert!(!second.is_main);
        let product = storage.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(product.image_url.as_deref(), Some("/a.jpg"));
    }

    #[tokio::test]
    async fn test_set_main_unsets_others() {
        let storage = MemoryStorage::new();
        let product = storage.create_product(product_input(100)).await.unwrap();
        storage.add_image(product.id, image("/a.jpg", false)).await.unwrap();
        let b = storage.add_image(product.id, image("/b.jpg", false)).await.unwrap();
        storage.add_image(product.id, image("/c.jpg", false)).await.unwrap();

        storage.set_main_image(product.id, b.id).await.unwrap();

        let images = storage.list_images(product.id).await.unwrap();
        let mains: Vec<_> = images.iter().filter(|i| i.is_main).collect();
        assert_eq!(mains.len(), 1);
        assert_eq!(mains.first().unwrap().id, b.id);
        let product = storage.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(product.image_url.as_deref(), Some("/b.jpg"));
    }

    #[tokio::test]
    async fn test_deleting_main_promotes_next() {
        let storage = MemoryStorage::new();
        let product = storage.create_product(product_input(100)).await.unwrap();
        let a = storage.add_image(product.id, image("/a.jpg", false)).await.unwrap();
        let b = storage.add_image(product.id, image("/b.jpg", false)).await.unwrap();

        storage.delete_image(product.id, a.id).await.unwrap();

        let images = storage.list_images(product.id).await.unwrap();
        assert_eq!(images.len(), 1);
        assert!(images.first().unwrap().is_main);
        assert_eq!(images.first().unwrap().id, b.id);

        storage.delete_image(product.id, b.id).await.unwrap();
        let product = storage.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(product.image_url, None);
    }

    #[tokio::test]
    async fn test_cart_merge_is_clamped() {
        let storage = MemoryStorage::new();
        let product = storage.create_product(product_input(100)).await.unwrap();
        let guest = CartOwner::Guest(Uuid::new_v4());
        let user = CartOwner::User(UserId::new(42));
        storage.add_cart_item(&guest, product.id, 60).await.unwrap();
        storage.add_cart_item(&user, product.id, 70).await.unwrap();

        storage.merge_carts(&guest, &user).await.unwrap();

        let lines = storage.cart_items(&user).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines.first().unwrap().quantity, MAX_LINE_QUANTITY);
        assert!(storage.cart_items(&guest).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_rejects_merged_overflow() {
        let storage = MemoryStorage::new();
        let product = storage.create_product(product_input(100)).await.unwrap();
        let owner = CartOwner::Guest(Uuid::new_v4());
        storage.add_cart_item(&owner, product.id, 90).await.unwrap();
        let err = storage.add_cart_item(&owner, product.id, 10).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_checkout_clears_cart_and_totals_match() {
        let storage = MemoryStorage::new();
        let a = storage.create_product(product_input(1250)).await.unwrap();
        let b = storage.create_product(product_input(399)).await.unwrap();
        let owner = CartOwner::User(UserId::new(7));
        storage.add_cart_item(&owner, a.id, 2).await.unwrap();
        storage.add_cart_item(&owner, b.id, 3).await.unwrap();

        let order = storage
            .create_order(NewOrder {
                owner,
                order_number: "TS-20261015-000001".to_owned(),
                details: CheckoutDetails {
                    customer_name: "Huda".to_owned(),
                    phone: Phone::parse("0501112222").unwrap(),
                    address: "Street 1".to_owned(),
                    city: "Riyadh".to_owned(),
                    notes: None,
                    payment_method: tasfiya_core::PaymentMethod::CashOnDelivery,
                },
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(order.total, Money::new(1250 * 2 + 399 * 3));
        assert_eq!(order.items_total().unwrap(), order.total);
        assert_eq!(order.user_id, Some(UserId::new(7)));
        assert!(storage.cart_items(&owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_order_status_compare_and_set() {
        let storage = MemoryStorage::new();
        let p = storage.create_product(product_input(100)).await.unwrap();
        let owner = CartOwner::Guest(Uuid::new_v4());
        storage.add_cart_item(&owner, p.id, 1).await.unwrap();
        let order = storage
            .create_order(NewOrder {
                owner,
                order_number: "TS-20261015-000002".to_owned(),
                details: CheckoutDetails {
                    customer_name: "Ali".to_owned(),
                    phone: Phone::parse("0501112222").unwrap(),
                    address: "Street 2".to_owned(),
                    city: "Dammam".to_owned(),
                    notes: None,
                    payment_method: tasfiya_core::PaymentMethod::BankTransfer,
                },
            })
            .await
            .unwrap()
            .unwrap();

        storage
            .update_order_status(order.id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await
            .unwrap();
        let stale = storage
            .update_order_status(order.id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(stale, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_slot_capacity_enforced() {
        let storage = MemoryStorage::new();
        let booking = NewAppointment {
            name: "Reem".to_owned(),
            phone: Phone::parse("0503334444").unwrap(),
            date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            time_slot: "10:00".to_owned(),
            notes: None,
        };
        let first = storage.create_appointment(booking.clone(), 1).await.unwrap();
        assert!(matches!(
            storage.create_appointment(booking.clone(), 1).await,
            Err(RepositoryError::Conflict(_))
        ));

        storage
            .update_appointment_status(first.id, AppointmentStatus::Cancelled)
            .await
            .unwrap();
        assert!(storage.create_appointment(booking, 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_place_bid_appends_history() {
        let storage = MemoryStorage::new();
        let p = storage.create_product(product_input(100)).await.unwrap();
        let now = Utc::now();
        let auction = storage
            .create_auction(AuctionInput {
                product_id: p.id,
                title: LocalizedText::new("Lot", "دفعة"),
                starting_price: Money::new(1000),
                reserve_price: None,
                bid_increment: Money::new(100),
                start_time: now - Duration::minutes(1),
                end_time: now + Duration::hours(1),
                auto_extend: false,
            })
            .await
            .unwrap();
        storage
            .transition_auction(auction.id, AuctionStatus::Active, now)
            .await
            .unwrap();

        let request = |bidder: i32, amount: i64| BidRequest {
            bidder_id: UserId::new(bidder),
            bidder_name: "Bidder".to_owned(),
            amount: Money::new(amount),
            now,
            extend_window: Duration::seconds(120),
        };
        let first = storage.place_bid(auction.id, request(1, 1000)).await.unwrap().unwrap();
        assert_eq!(first.outbid, None);
        let second = storage.place_bid(auction.id, request(2, 1100)).await.unwrap().unwrap();
        assert_eq!(second.outbid, Some(UserId::new(1)));
        let rejected = storage.place_bid(auction.id, request(1, 1150)).await.unwrap();
        assert!(matches!(rejected, Err(BidRejection::TooLow { .. })));

        let bids = storage.list_bids(auction.id).await.unwrap();
        assert_eq!(bids.len(), 2);
        assert_eq!(bids.first().unwrap().amount, Money::new(1100));
    }

    #[tokio::test]
    async fn test_delete_product_blocked_by_auction() {
        let storage = MemoryStorage::new();
        let p = storage.create_product(product_input(100)).await.unwrap();
        let now = Utc::now();
        storage
            .create_auction(AuctionInput {
                product_id: p.id,
                title: LocalizedText::new("Lot", "دفعة"),
                starting_price: Money::new(1000),
                reserve_price: None,
                bid_increment: Money::new(100),
                start_time: now,
                end_time: now + Duration::hours(1),
                auto_extend: false,
            })
            .await
            .unwrap();
        assert!(matches!(
            storage.delete_product(p.id).await,
            Err(RepositoryError::Conflict(_))
        ));
    }
}
