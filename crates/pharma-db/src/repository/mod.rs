//! # Repository Module
//!
//! Database repository implementations for the back-office.
//!
//! ## Two Calling Styles
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Reads (own connection from the pool)                                  │
//! │       db.sales().get_by_id(id)                                         │
//! │       db.reset_codes().find_active(email, now)                         │
//! │                                                                         │
//! │  Unit-of-work steps (caller's transaction)                             │
//! │       let mut tx = db.begin().await?;                                  │
//! │       SaleRepository::next_sequence(&mut tx, day)                      │
//! │       ProductRepository::decrement_stock(&mut tx, id, qty, now)        │
//! │       tx.commit().await?;                                              │
//! │                                                                         │
//! │  Steps take `&mut SqliteConnection`, so they run unchanged on a        │
//! │  transaction or a plain pooled connection.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Lookup and stock movement
//! - [`SaleRepository`](sale::SaleRepository) - Sales, line items, sale numbers
//! - [`ResetCodeRepository`](reset_code::ResetCodeRepository) - Password reset codes
//! - [`RateLimitRepository`](rate_limit::RateLimitRepository) - Rolling-window hits
//! - [`UserRepository`](user::UserRepository) - Accounts

pub mod product;
pub mod rate_limit;
pub mod reset_code;
pub mod sale;
pub mod user;
