//! rollcall-core — classroom attendance matching engine.
//!
//! Matches probe embeddings extracted from session photos against a
//! roster of enrolled students and computes present/absent sets scoped
//! to one class. The face detection/embedding model itself is an
//! external capability behind the [`FaceEncoder`] trait.

pub mod encoder;
pub mod matcher;
pub mod session;
pub mod types;

pub use encoder::{Detection, EncoderError, FaceEncoder, FaceRegion};
pub use matcher::{FirstMatchMatcher, Matcher, DISTANCE_THRESHOLD};
pub use session::build_session;
pub use types::{AttendanceSession, Embedding, Scope, Section, Semester, Student};
