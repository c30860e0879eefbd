mod desc;
mod results;
mod spec;

pub use desc::{ElectionDescription, ElectionSummary};
pub use results::{ElectionResults, RankedCandidate, ResultsHeader};
pub use spec::{ElectionSpec, StatusUpdate, MAX_NAME_LENGTH};
