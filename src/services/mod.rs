pub mod confirmation;
pub mod seatmap;
pub mod tickets;
