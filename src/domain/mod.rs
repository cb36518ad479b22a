pub mod balance;
pub mod closing;
pub mod profit;
pub mod scrap;
pub mod stock_number;
pub mod validation;
