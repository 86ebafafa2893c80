pub mod basket_lifecycle;
pub mod drawdown;
pub mod recovery;
pub mod risk_controller;
pub mod trailing_stop;
