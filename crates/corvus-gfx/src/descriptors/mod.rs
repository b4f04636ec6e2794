pub mod allocator;
pub mod layout_builder;
pub mod writer;
