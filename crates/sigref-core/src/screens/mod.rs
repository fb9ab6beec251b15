//! Screen controllers.
//!
//! Each screen renders from local data first and refreshes in the
//! background. [`ScreenController`] holds the shared lifecycle and a
//! [`ScreenSource`] supplies the data for one kind of screen:
//!
//! - [`SchoolSearch`]: school selection
//! - [`QuestionnaireList`]: questionnaires of one school
//! - [`QuestionnaireFormSource`]: the form to answer
//! - [`SchoolDashboardSource`]: school statistics
//!
//! [`QuestionnaireResponse`] collects answers and submits them, queueing
//! the response when the server cannot be reached.

pub mod controller;
pub mod dashboard;
pub mod questionnaires;
pub mod response;
pub mod schools;

pub use controller::{ScreenController, ScreenSource, ScreenState};
pub use dashboard::SchoolDashboardSource;
pub use questionnaires::{QueueAccess, QuestionnaireFormSource, QuestionnaireList};
pub use response::{QuestionnaireResponse, SubmitOutcome, Submitter};
pub use schools::SchoolSearch;
