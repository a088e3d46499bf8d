pub mod clock;
pub mod duration;
pub mod geocoding;
pub mod location;
pub mod log;
pub mod reconcile;
pub mod session;
pub mod timer;

pub use clock::{Clock, SystemClock};
pub use location::{FixedGeolocator, Geolocator, LocationResolver};
pub use session::{CommandOutcome, SessionManager};
pub use timer::Timer;
