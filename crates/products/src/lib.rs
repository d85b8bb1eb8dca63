//! Products catalog domain module.
//!
//! This crate contains the canonical `Product` entity, the boundary DTOs,
//! the mapping between them, and the declarative `ProductFilter`. Everything
//! here is deterministic domain logic (no IO, no HTTP, no storage).

pub mod dto;
pub mod filter;
pub mod mapper;
pub mod product;

pub use dto::{ProductCreateDto, ProductResponseDto, ProductSummaryDto, ProductUpdateDto};
pub use filter::ProductFilter;
pub use product::{Product, ProductStatus, StockStatus};
