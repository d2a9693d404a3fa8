// Pipeline ingestion: input discovery and delimited-file reading

pub mod reader;

pub use reader::{discover_input_files, is_reference_file, sniff_delimiter, DelimitedFile};
