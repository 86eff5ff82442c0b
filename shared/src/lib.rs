pub mod animation;
pub mod country;
pub mod events;
pub mod format;
pub mod projection;
pub mod rates;

pub use animation::{CountAnimation, ease_in_out};
pub use country::{CountryIndex, LookupError, MAX_SUGGESTIONS, SupportedCountry};
pub use events::*;
pub use projection::{Growth, ProjectionEngine, ProjectionError, TrackError, TrackedProjection};
pub use rates::*;
