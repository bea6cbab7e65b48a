use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskbookError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Sheet(#[from] calamine::Error),

    #[cfg(feature = "xlsx")]
    #[error("XLSX write error: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingHeaders(Vec<String>),

    #[error("Sheet has no header row: {0}")]
    EmptySheet(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("These files were already uploaded on {0}")]
    AlreadyUploaded(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TaskbookError>;
