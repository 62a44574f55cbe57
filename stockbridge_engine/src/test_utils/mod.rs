//! Helpers for tests that need a real database or a marketplace that answers deterministically.
pub mod fake_marketplace;
pub mod prepare_env;
