//! Domain models for the storefront and back office.
//!
//! These types double as the JSON shapes of the API (camelCase on the wire).
//! Rules that must hold no matter which storage backend is active live on the
//! models themselves: bid acceptance on [`auction::Auction`], order
//! snapshotting in [`order`], slot parsing in [`intake`].

pub mod auction;
pub mod cart;
pub mod catalog;
pub mod dashboard;
pub mod intake;
pub mod notification;
pub mod order;
pub mod session;
pub mod setting;
pub mod sms;
pub mod user;

pub use auction::{Auction, AuctionInput, Bid, BidPlacement, BidRejection, BidRequest};
pub use cart::{CartItem, CartLine, CartOwner, CartView, MAX_LINE_QUANTITY};
pub use catalog::{
    Category, CategoryInput, NewProductImage, Product, ProductDetail, ProductFilter, ProductImage,
    ProductInput,
};
pub use dashboard::DashboardStats;
pub use intake::{Appointment, Contact, NewAppointment, NewContact, SlotAvailability};
pub use notification::{NewNotification, Notification};
pub use order::{CheckoutDetails, NewOrder, NewOrderItem, Order, OrderFilter, OrderItem};
pub use session::{CurrentUser, session_keys};
pub use setting::{Setting, SettingInput, SettingsSnapshot};
pub use sms::{NewSmsMessage, SmsMessage};
pub use user::{NewUser, User};
