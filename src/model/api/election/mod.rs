mod desc;
mod results;
mod spec;

pub use desc::{
    CandidateDescription, ElectionDescription, ElectionDetail, ExceptionDescription,
    TerminationDescription, WindowsDescription,
};
pub use results::{BallotSummary, ElectionResult, ResultDescription};
pub use spec::{
    DraftUpdate, ElectionSpec, OngoingUpdate, StartRequest, TerminateRequest, WindowsSpec,
};
