pub mod pv;
