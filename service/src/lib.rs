pub mod clock;
pub mod config;
pub mod error;
pub mod registry;
pub mod render;
pub mod services;
pub mod source;

pub use clock::PopulationClock;
pub use config::{ClockConfig, RatePolicy, SourceKind};
pub use error::{ClockError, ClockResult, SourceError};
pub use registry::CountryRegistry;
pub use render::{AnimatedRenderer, LogSurface, RenderSurface, Renderer, RowUpdate};
pub use source::{CountryDataSource, PopulationIoSource, PopulationSeed, StaticSource};
