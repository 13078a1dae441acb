pub mod error;
pub mod types;

#[cfg(feature = "binomial")]
pub mod binomial;

pub use error::DomainError;
pub use types::*;

/// Standard result type for all lattice-pricer operations
pub type PricingResult<T> = Result<T, DomainError>;
