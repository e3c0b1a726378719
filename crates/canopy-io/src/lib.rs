//! Table loading, encoding and report writing for canopy.

mod domain;
mod encode;
mod error;
mod reader;
mod writer;

pub use domain::{Column, Dataset, EncodedTable};
pub use encode::{Encoder, TargetColumn};
pub use error::TableError;
pub use reader::TableReader;
pub use writer::ReportWriter;
