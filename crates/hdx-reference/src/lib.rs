#![deny(unsafe_code)]

pub mod error;
pub mod index;
pub mod loaders;
pub mod name_index;
pub mod normalize;
pub mod records;

pub use crate::error::ReferenceError;
pub use crate::index::AdminIndex;
pub use crate::loaders::{load_countries_csv, load_reference, load_subdivisions_csv};
pub use crate::name_index::NameIndex;
pub use crate::normalize::normalize_name;
pub use crate::records::{CountryRecord, ReferenceData, SubdivisionRecord};
