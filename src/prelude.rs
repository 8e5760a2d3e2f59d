pub use crate::analysis::{run_all, Analysis};
pub use crate::cluster::{ClusterStatus, Member, MemberState};
pub use crate::config::ReportOptions;
pub use crate::error::Error;
pub use crate::readiness::{NotReadyError, ReadinessPoller, StatusProbe};
pub use crate::report::{ListingSource, ReportRunner, ReportSection};
pub use crate::store::ListingStore;
