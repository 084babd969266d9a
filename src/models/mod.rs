pub mod black_scholes;
pub mod gbm;
pub mod volatility;
