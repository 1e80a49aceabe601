pub mod whirlpool;
