mod money;

pub mod helpers;
pub mod op;
mod secret;

pub use money::{decimal_serde, Money, MoneyConversionError, AMOUNT_TOLERANCE, MICROS_PER_UNIT};
pub use secret::Secret;
