pub mod fs;
pub mod pem;

pub use fs::read_file_string;
pub use pem::encode_pem;
