pub mod ca;
pub mod health;
pub mod legacy;
pub mod metrics;
pub mod sign;
