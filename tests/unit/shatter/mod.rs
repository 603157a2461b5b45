pub mod composite;
pub mod pieces;
