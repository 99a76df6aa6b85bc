pub mod mock;
pub mod nmcli;
