pub mod reader;
pub mod validator;

pub use reader::{has_csv_extension, parse_records, ParsedCsv, ParsedRecord, RawFile};
pub use validator::{
    row_count, validate, validate_file, SchemaFieldSet, ValidationResult, MAX_ROWS,
};
