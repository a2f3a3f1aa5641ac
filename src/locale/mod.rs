//! Rule banks for the pattern classifier, one module per locale.

pub mod dutch;
pub mod english;

pub use dutch::DutchRules;
pub use english::EnglishRules;
