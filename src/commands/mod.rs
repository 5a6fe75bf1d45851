pub mod aggregate;
pub mod compute;
pub mod delete_stock;
pub mod import;
pub mod init;
pub mod maintain;
pub mod status;
