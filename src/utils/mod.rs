pub mod errorhandler;
pub mod jwt;
