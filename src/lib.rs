pub mod fetch;
pub mod load;
pub mod normalize;
pub mod portal;
pub mod regions;
pub mod table;
