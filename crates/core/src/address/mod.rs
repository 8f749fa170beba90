pub mod address_space;

pub use address_space::AddressSpace;
