pub mod dispatch;
pub mod energy_supply;
pub mod solar;
pub mod units;
pub mod upsampling;
