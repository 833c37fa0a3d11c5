pub mod csv_source;
pub mod memory_source;

pub use csv_source::{load_csv, read_csv, read_csv_file};
pub use memory_source::{simple_interpreter, FilterInterpreter, InMemoryStore, StoreOperation};
