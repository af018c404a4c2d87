pub mod pnl;
pub mod settlement;
pub mod state_machine;
pub mod validation;

pub use pnl::profit_loss;
pub use settlement::{SettlementEntry, SettlementError};
pub use state_machine::{CopyError, CopyState, Resolution, Transition};
pub use validation::{TradeError, TradeInput, ValidTrade};
