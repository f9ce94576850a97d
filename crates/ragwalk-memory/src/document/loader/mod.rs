mod csv;
mod directory;
#[cfg(feature = "pdf")]
mod pdf;
mod text;

pub use self::csv::CsvLoader;
pub use directory::DirectoryLoader;
#[cfg(feature = "pdf")]
pub use pdf::PdfLoader;
pub use text::TextLoader;
