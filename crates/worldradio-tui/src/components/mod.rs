pub mod header;
pub mod help_overlay;
pub mod station_list;
