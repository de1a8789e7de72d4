pub mod analytics;
pub mod audit;
pub mod categories;
pub mod category_tree;
pub mod customers;
pub mod dashboard;
pub mod order_number;
pub mod products;
pub mod sales;
