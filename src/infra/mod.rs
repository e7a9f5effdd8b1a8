//! Concrete adapters for the collaborator traits in [`crate::services`].

pub mod csv_store;
pub mod keys;
pub mod openweather;

pub use csv_store::CsvReadingStore;
pub use openweather::OpenWeatherClient;
