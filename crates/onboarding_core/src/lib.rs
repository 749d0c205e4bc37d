pub mod access;
pub mod directory;
pub mod domain;
pub mod exchange;
pub mod feed;
pub mod grading;
pub mod memory;
pub mod notifications;
pub mod ports;
pub mod routing;
pub mod session;
pub mod submissions;

pub use domain::{
    AdminDocument, Answers, AuthSession, Grade, GradedSubmission, Identity, Mcq, Module,
    NewModule, Notification, Profile, Role, StudentDocument, Submission, WriteOutcome,
};
pub use ports::{
    AuthService, Collection, DocumentStore, ObjectHandle, ObjectStorage, PortError, PortResult,
};
