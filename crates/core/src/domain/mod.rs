pub mod cart;
pub mod customer;
pub mod escalation;
pub mod product;
pub mod tenant;
pub mod trace;
