// storefront/src/models/mod.rs

//! Data structures representing database entities.

pub mod customer;
pub mod journal_entry;
pub mod order;
pub mod pagination;
pub mod token;
pub mod transaction;
pub mod user;
pub mod widget;

pub use customer::{Customer, NewCustomer};
pub use journal_entry::JournalEntry;
pub use order::{NewOrder, Order, OrderDetail, OrderKind, OrderStatus};
pub use pagination::{PageRequest, Paginated};
pub use token::{AuthToken, SCOPE_AUTHENTICATION, TOKEN_LENGTH};
pub use transaction::{NewTransaction, Transaction, TransactionStatus};
pub use user::User;
pub use widget::Widget;
