//! # pharma-services: Units of Work
//!
//! Multi-step operations over the back-office database.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  apps/backoffice (config, SMTP, cleanup loop)                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 pharma-services (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │   SalesEngine            ResetCodeService                       │   │
//! │  │   ├ record_sale          ├ issue ──► RateLimiter (trait)        │   │
//! │  │   ├ add/update/remove    │       └─► CodeNotifier (trait)       │   │
//! │  │   │   line item          ├ verify                               │   │
//! │  │   └ apply_line_item_     ├ reset_password                       │   │
//! │  │       change             └ cleanup                              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                           │                                     │
//! │       ▼                           ▼                                     │
//! │  pharma-core (rules)         pharma-db (SQL)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! Nothing here holds an in-process lock. Each operation is one SQLite
//! transaction whose first statement is a write, so concurrent callers
//! queue on the database's write lock and each sees the previous one's
//! committed stock and counters.

pub mod error;
pub mod notify;
pub mod password_reset;
pub mod rate_limit;
pub mod sales;

pub use error::{ServiceError, ServiceResult};
pub use notify::{CodeNotifier, LogNotifier, MemoryNotifier, NotifyError};
pub use password_reset::ResetCodeService;
pub use rate_limit::{Acquire, Permit, RateLimiter, SqlRateLimiter};
pub use sales::{NewSale, NewSaleItem, SaleDetails, SaleUpdate, SalesConfig, SalesEngine};
