pub mod db;
pub mod table;

pub use db::Db;
pub use table::Table;
