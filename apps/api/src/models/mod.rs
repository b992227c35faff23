pub mod entity;
pub mod mutation;
pub mod view;
