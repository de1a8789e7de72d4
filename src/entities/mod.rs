pub mod audit_log;
pub mod category;
pub mod customer;
pub mod product;
pub mod sale;
pub mod sale_item;
