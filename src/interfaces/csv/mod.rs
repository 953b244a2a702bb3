pub mod catalog_reader;
pub mod command_reader;
pub mod purchase_writer;
